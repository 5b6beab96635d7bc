use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use redmine_cli_api::{AttachmentUpload, IssueStatus};

use super::CommandContext;

#[derive(Args, Debug, Clone)]
pub struct AttachmentsArgs {
    #[command(subcommand)]
    command: AttachmentsCommands,
}

#[derive(Subcommand, Debug, Clone)]
enum AttachmentsCommands {
    /// Upload a file and attach it to an issue
    Upload {
        /// Issue id to attach the file to
        issue_id: u64,
        /// File to upload
        file: PathBuf,
        /// MIME type of the file
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
        /// Attachment name on the server (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        /// Note to attach alongside the file
        #[arg(long)]
        notes: Option<String>,
        /// Status transition (in-progress, resolved, feedback, closed or 2-5)
        #[arg(long)]
        status: Option<IssueStatus>,
    },

    /// Download attachment content to a local file
    Download {
        /// Absolute content URL of the attachment
        content_url: String,
        /// Destination path
        #[arg(short, long)]
        output: PathBuf,
    },
}

pub async fn execute(args: AttachmentsArgs, ctx: CommandContext<'_>) -> Result<()> {
    match args.command {
        AttachmentsCommands::Upload {
            issue_id,
            file,
            content_type,
            name,
            notes,
            status,
        } => upload(&ctx, issue_id, file, content_type, name, notes, status).await,
        AttachmentsCommands::Download {
            content_url,
            output,
        } => download(&ctx, &content_url, &output).await,
    }
}

async fn upload(
    ctx: &CommandContext<'_>,
    issue_id: u64,
    file: PathBuf,
    content_type: String,
    name: Option<String>,
    notes: Option<String>,
    status: Option<IssueStatus>,
) -> Result<()> {
    let mut upload = AttachmentUpload::new(file, issue_id, content_type);
    if let Some(name) = name {
        upload = upload.file_name(name);
    }
    if let Some(notes) = notes {
        upload = upload.notes(notes);
    }
    if let Some(status) = status {
        upload = upload.status(status);
    }

    let token = ctx
        .client
        .upload_file(&upload)
        .await
        .with_context(|| format!("Failed to upload attachment to issue {issue_id}"))?;

    tracing::info!(issue_id, attachment_id = ?token.id, "Attachment uploaded");
    println!("{} Uploaded attachment to issue {issue_id}", "✓".green());
    Ok(())
}

async fn download(ctx: &CommandContext<'_>, content_url: &str, output: &PathBuf) -> Result<()> {
    let bytes = ctx
        .client
        .download(content_url)
        .await
        .context("Failed to download attachment")?;

    fs::write(output, &bytes)
        .with_context(|| format!("Failed to write file: {}", output.display()))?;

    tracing::info!(url = %content_url, file = %output.display(), "Attachment downloaded");
    println!(
        "{} Downloaded {} bytes to {}",
        "✓".green(),
        bytes.len(),
        output.display()
    );
    Ok(())
}
