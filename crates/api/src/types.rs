use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

/// Status transitions the client is allowed to request on an issue.
///
/// Redmine installations can define arbitrary statuses; these four ids are
/// the stock workflow codes writes are restricted to. Anything else is
/// rejected locally before a request is built.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IssueStatus {
    InProgress,
    Resolved,
    Feedback,
    Closed,
}

impl IssueStatus {
    pub fn id(self) -> u16 {
        match self {
            IssueStatus::InProgress => 2,
            IssueStatus::Resolved => 3,
            IssueStatus::Feedback => 4,
            IssueStatus::Closed => 5,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            2 => Some(IssueStatus::InProgress),
            3 => Some(IssueStatus::Resolved),
            4 => Some(IssueStatus::Feedback),
            5 => Some(IssueStatus::Closed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IssueStatus::InProgress => "in-progress",
            IssueStatus::Resolved => "resolved",
            IssueStatus::Feedback => "feedback",
            IssueStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for IssueStatus {
    type Err = ApiError;

    /// Accepts the status name or its numeric id.
    fn from_str(s: &str) -> Result<Self> {
        let parsed = match s.to_ascii_lowercase().as_str() {
            "in-progress" | "in_progress" | "inprogress" => Some(IssueStatus::InProgress),
            "resolved" => Some(IssueStatus::Resolved),
            "feedback" => Some(IssueStatus::Feedback),
            "closed" => Some(IssueStatus::Closed),
            other => other.parse::<u16>().ok().and_then(IssueStatus::from_id),
        };
        parsed.ok_or_else(|| ApiError::InvalidArgument {
            message: format!(
                "unknown status '{s}' (expected in-progress, resolved, feedback, closed or 2-5)"
            ),
        })
    }
}

/// `{id, name}` reference embedded throughout Redmine payloads
/// (status, author, assignee, project, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NamedRef {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An issue as returned by the server. The fields the client and CLI
/// actually look at are typed; everything else the server sends is kept
/// verbatim in `extra` so nothing is lost on the way through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: u64,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub author: Option<NamedRef>,
    #[serde(default)]
    pub assigned_to: Option<NamedRef>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Redmine's paged list envelope for `issues.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueList {
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl IssueList {
    pub fn has_next(&self) -> bool {
        if let (Some(offset), Some(limit), Some(total)) = (self.offset, self.limit, self.total_count)
        {
            return offset + limit < total;
        }
        false
    }

    pub fn next_offset(&self) -> Option<u64> {
        if !self.has_next() {
            return None;
        }
        match (self.offset, self.limit) {
            (Some(offset), Some(limit)) => Some(offset + limit),
            _ => None,
        }
    }
}

/// Partial update for an issue. Only fields that were set end up in the
/// request payload.
#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub notes: Option<String>,
    pub status_change: Option<u16>,
    pub assigned_to: Option<u64>,
}

impl IssueUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn status(mut self, status: IssueStatus) -> Self {
        self.status_change = Some(status.id());
        self
    }

    /// Raw status id; validated against the permitted set when the update
    /// is submitted.
    pub fn status_change(mut self, status_id: u16) -> Self {
        self.status_change = Some(status_id);
        self
    }

    pub fn assigned_to(mut self, user_id: u64) -> Self {
        self.assigned_to = Some(user_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.status_change.is_none() && self.assigned_to.is_none()
    }

    /// Local checks, run before any request is built.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ApiError::InvalidArgument {
                message: "update has no fields set; supply notes, a status change or an assignee"
                    .into(),
            });
        }
        if let Some(id) = self.status_change {
            if IssueStatus::from_id(id).is_none() {
                return Err(ApiError::InvalidArgument {
                    message: format!("status id {id} is not one of the permitted transitions 2-5"),
                });
            }
        }
        Ok(())
    }
}

/// A file attachment destined for an issue.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub path: PathBuf,
    pub issue_id: u64,
    pub content_type: String,
    pub file_name: Option<String>,
    pub notes: Option<String>,
    pub status_change: Option<u16>,
}

impl AttachmentUpload {
    pub fn new(path: impl Into<PathBuf>, issue_id: u64, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            issue_id,
            content_type: content_type.into(),
            file_name: None,
            notes: None,
            status_change: None,
        }
    }

    /// Name the attachment will carry on the server, if different from the
    /// local file name.
    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn status(mut self, status: IssueStatus) -> Self {
        self.status_change = Some(status.id());
        self
    }

    pub fn status_change(mut self, status_id: u16) -> Self {
        self.status_change = Some(status_id);
        self
    }

    pub(crate) fn effective_file_name(&self) -> String {
        self.file_name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("attachment")
                .to_string()
        })
    }
}

/// Token handed back by the raw upload, consumed by the attach step.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedToken {
    pub token: String,
    #[serde(default)]
    pub id: Option<u64>,
}
