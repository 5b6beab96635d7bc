use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use redmine_cli_api::{Issue, IssuePager, IssueStatus, IssueUpdate, DEFAULT_ISSUE_LIMIT};

use super::CommandContext;
use crate::output::OutputRenderer;

#[derive(Args, Debug, Clone)]
pub struct IssuesArgs {
    #[command(subcommand)]
    command: IssuesCommands,
}

#[derive(Subcommand, Debug, Clone)]
enum IssuesCommands {
    /// List a project's issues, newest first
    List {
        /// Project identifier (defaults to the profile's default_project)
        #[arg(short, long)]
        project: Option<String>,

        /// Maximum number of issues to return
        #[arg(long, default_value_t = DEFAULT_ISSUE_LIMIT)]
        limit: u32,

        /// Walk every page instead of stopping at --limit
        #[arg(long, conflicts_with = "limit")]
        all: bool,
    },

    /// Fetch a single issue as raw JSON
    Get {
        /// Issue id
        id: u64,
    },

    /// Update notes, status or assignee on an issue
    Update {
        /// Issue id
        id: u64,
        /// Note to append to the issue journal
        #[arg(long)]
        notes: Option<String>,
        /// Status transition (in-progress, resolved, feedback, closed or 2-5)
        #[arg(long)]
        status: Option<IssueStatus>,
        /// User id to assign the issue to
        #[arg(long)]
        assign_to: Option<u64>,
    },

    /// Hand an issue back to whoever opened it
    AssignToAuthor {
        /// Issue id
        id: u64,
        /// Note to append to the issue journal
        #[arg(long)]
        notes: Option<String>,
        /// Status transition (in-progress, resolved, feedback, closed or 2-5)
        #[arg(long)]
        status: Option<IssueStatus>,
    },
}

pub async fn execute(args: IssuesArgs, ctx: CommandContext<'_>) -> Result<()> {
    match args.command {
        IssuesCommands::List {
            project,
            limit,
            all,
        } => list_issues(&ctx, project, limit, all).await,
        IssuesCommands::Get { id } => view_issue(&ctx, id).await,
        IssuesCommands::Update {
            id,
            notes,
            status,
            assign_to,
        } => update_issue(&ctx, id, notes, status, assign_to).await,
        IssuesCommands::AssignToAuthor { id, notes, status } => {
            assign_to_author(&ctx, id, notes, status).await
        }
    }
}

async fn list_issues(
    ctx: &CommandContext<'_>,
    project: Option<String>,
    limit: u32,
    all: bool,
) -> Result<()> {
    let project = project
        .or_else(|| ctx.default_project.clone())
        .ok_or_else(|| {
            anyhow!("No project given. Pass --project or set default_project in the profile.")
        })?;

    let issues = if all {
        ctx.client
            .fetch_all(&project, DEFAULT_ISSUE_LIMIT)
            .await
            .with_context(|| format!("Failed to list issues of project {project}"))?
    } else {
        ctx.client
            .recent_issues(&project, limit)
            .await
            .with_context(|| format!("Failed to list issues of project {project}"))?
            .issues
    };

    if issues.is_empty() {
        tracing::info!(%project, "No open issues found.");
        return Ok(());
    }

    render_issue_rows(ctx.renderer, &issues)
}

fn render_issue_rows(renderer: &OutputRenderer, issues: &[Issue]) -> Result<()> {
    let rows = issues
        .iter()
        .map(|issue| {
            vec![
                issue.id.to_string(),
                issue.subject.clone().unwrap_or_default(),
                issue
                    .status
                    .as_ref()
                    .and_then(|s| s.name.clone())
                    .unwrap_or_default(),
                issue
                    .assigned_to
                    .as_ref()
                    .and_then(|a| a.name.clone())
                    .unwrap_or_default(),
                issue
                    .created_on
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect();

    renderer.render_rows(
        &issues,
        &["id", "subject", "status", "assignee", "created"],
        rows,
    )
}

async fn view_issue(ctx: &CommandContext<'_>, id: u64) -> Result<()> {
    let issue = ctx
        .client
        .issue(id)
        .await
        .with_context(|| format!("Failed to fetch issue {id}"))?;

    ctx.renderer.render_json(&issue)
}

async fn update_issue(
    ctx: &CommandContext<'_>,
    id: u64,
    notes: Option<String>,
    status: Option<IssueStatus>,
    assign_to: Option<u64>,
) -> Result<()> {
    let mut update = IssueUpdate::new();
    if let Some(notes) = notes {
        update = update.notes(notes);
    }
    if let Some(status) = status {
        update = update.status(status);
    }
    if let Some(user_id) = assign_to {
        update = update.assigned_to(user_id);
    }

    ctx.client
        .update_issue(id, &update)
        .await
        .with_context(|| format!("Failed to update issue {id}"))?;

    tracing::info!(id, "Issue updated");
    println!("{} Updated issue {id}", "✓".green());
    Ok(())
}

async fn assign_to_author(
    ctx: &CommandContext<'_>,
    id: u64,
    notes: Option<String>,
    status: Option<IssueStatus>,
) -> Result<()> {
    let mut update = IssueUpdate::new();
    if let Some(notes) = notes {
        update = update.notes(notes);
    }
    if let Some(status) = status {
        update = update.status(status);
    }

    ctx.client
        .assign_to_author(id, update)
        .await
        .with_context(|| format!("Failed to assign issue {id} to its author"))?;

    tracing::info!(id, "Issue assigned to author");
    println!("{} Assigned issue {id} back to its author", "✓".green());
    Ok(())
}
