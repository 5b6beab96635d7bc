mod commands;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use commands::auth::AuthCommand;
use commands::CommandContext;
use output::{OutputFormat, OutputRenderer};
use redmine_cli_api::{RedmineClient, RetryPolicy};
use redmine_cli_auth::CredentialStore;
use redmine_cli_config::{Config, RetrySettings};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "redmine-cli", version, about = "CLI for the Redmine issue tracker", long_about = None)]
struct Cli {
    /// Profile to use from config file
    #[arg(short, long)]
    profile: Option<String>,

    /// Path to config file (defaults to ~/.redmine-cli/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Enable verbose logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: RedmineCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum RedmineCommand {
    /// Issue commands
    Issues(commands::issues::IssuesArgs),
    /// Attachment commands
    Attachments(commands::attachments::AttachmentsArgs),
    /// Authentication commands
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let config_path = cli.config.clone();
    let mut config = Config::load(config_path.as_ref())?;
    let renderer = OutputRenderer::new(cli.output);
    let credential_store = CredentialStore::new()?;

    match cli.command {
        RedmineCommand::Issues(args) => {
            let profile =
                resolve_active_profile(&config, cli.profile.as_deref(), &credential_store)?;
            let ctx = CommandContext {
                client: build_client(&profile)?,
                renderer: &renderer,
                default_project: profile.default_project,
            };
            commands::issues::execute(args, ctx).await?
        }
        RedmineCommand::Attachments(args) => {
            let profile =
                resolve_active_profile(&config, cli.profile.as_deref(), &credential_store)?;
            let ctx = CommandContext {
                client: build_client(&profile)?,
                renderer: &renderer,
                default_project: profile.default_project,
            };
            commands::attachments::execute(args, ctx).await?
        }
        RedmineCommand::Auth(command) => commands::auth::handle(
            command,
            &mut config,
            config_path.as_deref(),
            &credential_store,
            &renderer,
        )?,
    }

    Ok(())
}

fn init_tracing(debug: bool) -> Result<()> {
    let default = if debug {
        "info,redmine_cli=debug,redmine_cli_api=debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialize logger: {err}"))
}

struct ActiveProfile {
    base_url: String,
    api_key: String,
    default_project: Option<String>,
    retry: RetrySettings,
}

fn resolve_active_profile(
    config: &Config,
    requested: Option<&str>,
    store: &CredentialStore,
) -> Result<ActiveProfile> {
    let (name, profile) = config
        .resolve_profile(requested)
        .ok_or_else(|| anyhow!("No profile configured. Run `redmine-cli auth login` first."))?;

    let base_url = profile
        .base_url
        .clone()
        .ok_or_else(|| anyhow!("Profile '{name}' is missing a base_url."))?;

    // Multi-tier key lookup: profile-specific env var → generic env var → credential store
    let api_key = {
        let profile_env_var = format!("REDMINE_CLI_KEY_{}", name.to_uppercase());
        std::env::var(&profile_env_var)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var("REDMINE_API_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .or_else(|| store.get_key(name).ok().flatten())
            .ok_or_else(|| {
                anyhow!(
                    "No API key found for profile '{name}'. Set {profile_env_var} or run `redmine-cli auth login --profile {name}`"
                )
            })?
    };

    Ok(ActiveProfile {
        base_url,
        api_key,
        default_project: profile.default_project.clone(),
        retry: profile.retry.unwrap_or_default(),
    })
}

fn build_client(profile: &ActiveProfile) -> Result<RedmineClient> {
    let (max_attempts, wait_secs) = profile.retry.or_defaults();
    Ok(
        RedmineClient::new(&profile.base_url, profile.api_key.clone())?
            .with_retry_policy(RetryPolicy::new(max_attempts, Duration::from_secs(wait_secs))),
    )
}
