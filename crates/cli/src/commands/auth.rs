use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use redmine_cli_auth::CredentialStore;
use redmine_cli_config::Config;
use serde::Serialize;

use crate::output::OutputRenderer;

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Store the base URL and API key for a profile
    Login {
        /// Profile name to store the credentials under
        #[arg(long, default_value = "default")]
        profile: String,
        /// Redmine base URL, prompted for when omitted
        #[arg(long)]
        url: Option<String>,
    },

    /// Show configured profiles (keys stay hidden)
    Show,

    /// Remove a profile's stored API key
    Logout {
        /// Profile name to forget
        #[arg(long, default_value = "default")]
        profile: String,
    },
}

pub fn handle(
    command: AuthCommand,
    config: &mut Config,
    config_path: Option<&Path>,
    store: &CredentialStore,
    renderer: &OutputRenderer,
) -> Result<()> {
    match command {
        AuthCommand::Login { profile, url } => login(config, config_path, store, profile, url),
        AuthCommand::Show => show(config, store, renderer),
        AuthCommand::Logout { profile } => logout(store, &profile),
    }
}

fn login(
    config: &mut Config,
    config_path: Option<&Path>,
    store: &CredentialStore,
    profile: String,
    url: Option<String>,
) -> Result<()> {
    let url = match url {
        Some(url) => url,
        None => prompt_line("Redmine base URL: ")?,
    };
    if url.trim().is_empty() {
        bail!("Base URL must not be empty");
    }

    let api_key = rpassword::prompt_password("API key (see /my/account): ")
        .context("Unable to read the API key from the terminal")?;
    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    store.set_key(&profile, api_key.trim())?;

    let mut entry = config.profile(&profile).cloned().unwrap_or_default();
    entry.base_url = Some(url.trim().to_string());
    config.upsert_profile(profile.as_str(), entry);
    config.save(config_path)?;

    println!("{} Stored API key for profile '{profile}'", "✓".green());
    Ok(())
}

fn show(config: &Config, store: &CredentialStore, renderer: &OutputRenderer) -> Result<()> {
    #[derive(Serialize)]
    struct Row {
        profile: String,
        base_url: String,
        default_project: String,
        api_key: &'static str,
    }

    let mut rows: Vec<Row> = config
        .profiles
        .iter()
        .map(|(name, profile)| Row {
            profile: name.clone(),
            base_url: profile.base_url.clone().unwrap_or_default(),
            default_project: profile.default_project.clone().unwrap_or_default(),
            api_key: match store.get_key(name) {
                Ok(Some(_)) => "stored",
                _ => "missing",
            },
        })
        .collect();
    rows.sort_by(|a, b| a.profile.cmp(&b.profile));

    let cells = rows
        .iter()
        .map(|row| {
            vec![
                row.profile.clone(),
                row.base_url.clone(),
                row.default_project.clone(),
                row.api_key.to_string(),
            ]
        })
        .collect();

    renderer.render_rows(
        &rows,
        &["profile", "base_url", "default_project", "api_key"],
        cells,
    )
}

fn logout(store: &CredentialStore, profile: &str) -> Result<()> {
    store.delete_key(profile)?;
    println!("{} Removed API key for profile '{profile}'", "✓".green());
    Ok(())
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
