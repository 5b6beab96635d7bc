//! Issue operations: listing, fetching, partial updates and the
//! assign-back-to-author shortcut.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, Result};
use crate::types::{IssueList, IssueUpdate, NamedRef};
use crate::RedmineClient;

/// Page size used when the caller does not ask for anything else.
pub const DEFAULT_ISSUE_LIMIT: u32 = 25;

impl RedmineClient {
    /// Open issues of a project, newest first.
    pub async fn recent_issues(&self, project: &str, limit: u32) -> Result<IssueList> {
        let path = format!(
            "projects/{}/issues.json?limit={}&sort=created_on:desc",
            urlencoding::encode(project),
            limit
        );
        self.get(&path).await
    }

    /// A single issue with its attachments, as the raw JSON envelope
    /// (`{"issue": {...}}`). Nothing is stripped or reshaped.
    pub async fn issue(&self, issue_id: u64) -> Result<Value> {
        self.get(&format!("issues/{issue_id}.json?include=attachments"))
            .await
    }

    /// PUT a partial update. Only fields set on `update` are sent; the
    /// update is validated locally before any request goes out.
    pub async fn update_issue(&self, issue_id: u64, update: &IssueUpdate) -> Result<()> {
        update.validate()?;

        let payload = update_payload(update);
        let status = self
            .put(&format!("issues/{issue_id}.json"), &payload)
            .await?;
        debug!(issue_id, status = %status, "Issue updated");
        Ok(())
    }

    /// Hand the issue back to whoever opened it. Looks up the issue's
    /// author and submits `update` with the assignee forced to that author;
    /// any assignee already set on `update` is replaced.
    pub async fn assign_to_author(&self, issue_id: u64, update: IssueUpdate) -> Result<()> {
        #[derive(Deserialize)]
        struct IssueEnvelope {
            issue: AuthoredIssue,
        }

        #[derive(Deserialize)]
        struct AuthoredIssue {
            #[serde(default)]
            author: Option<NamedRef>,
        }

        let envelope: IssueEnvelope = self.get(&format!("issues/{issue_id}.json")).await?;
        let author = envelope.issue.author.ok_or_else(|| {
            ApiError::InvalidResponse(format!("issue {issue_id} has no author field"))
        })?;

        debug!(issue_id, author_id = author.id, "Assigning issue back to author");
        self.update_issue(issue_id, &update.assigned_to(author.id))
            .await
    }
}

fn update_payload(update: &IssueUpdate) -> Value {
    let mut fields = json!({});

    if let Some(notes) = &update.notes {
        fields["notes"] = json!(notes);
    }
    if let Some(status_id) = update.status_change {
        fields["status_id"] = json!(status_id);
    }
    if let Some(user_id) = update.assigned_to {
        fields["assigned_to_id"] = json!(user_id);
    }

    json!({ "issue": fields })
}
