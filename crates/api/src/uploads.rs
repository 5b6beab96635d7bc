//! Attachment transfer: the two-phase upload protocol and raw content
//! download.

use std::fs;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use crate::error::{ApiError, Result};
use crate::types::{AttachmentUpload, IssueStatus, UploadedToken};
use crate::RedmineClient;

const OCTET_STREAM: &str = "application/octet-stream";

impl RedmineClient {
    /// Attach a local file to an issue.
    ///
    /// Redmine wants this in two phases: the raw bytes go to
    /// `uploads.json` and come back as a token, then the token is bound to
    /// the issue together with filename, content type and any notes or
    /// status change. Both requests run under the retry policy. The status
    /// code and the file are checked before anything touches the network.
    pub async fn upload_file(&self, upload: &AttachmentUpload) -> Result<UploadedToken> {
        if let Some(id) = upload.status_change {
            if IssueStatus::from_id(id).is_none() {
                return Err(ApiError::InvalidArgument {
                    message: format!("status id {id} is not one of the permitted transitions 2-5"),
                });
            }
        }

        let bytes = fs::read(&upload.path).map_err(|source| ApiError::Upload {
            path: upload.path.clone(),
            source,
        })?;

        let file_name = upload.effective_file_name();
        info!(
            path = %upload.path.display(),
            issue_id = upload.issue_id,
            "Uploading attachment"
        );

        #[derive(Deserialize)]
        struct UploadResponse {
            upload: UploadedToken,
        }

        let token_path = format!("uploads.json?filename={}", urlencoding::encode(&file_name));
        let response: UploadResponse = self.post_bytes(&token_path, bytes, OCTET_STREAM).await?;
        let token = response.upload;

        let mut fields = json!({
            "uploads": [{
                "token": token.token,
                "filename": file_name,
                "content_type": upload.content_type,
            }]
        });
        if let Some(notes) = &upload.notes {
            fields["notes"] = json!(notes);
        }
        if let Some(status_id) = upload.status_change {
            fields["status_id"] = json!(status_id);
        }

        self.put(
            &format!("issues/{}.json", upload.issue_id),
            &json!({ "issue": fields }),
        )
        .await?;

        info!(issue_id = upload.issue_id, file = %file_name, "Attachment uploaded");
        Ok(token)
    }

    /// Fetch attachment content from its absolute `content_url`. Returns
    /// the raw bytes; text decoding is up to the caller.
    pub async fn download(&self, content_url: &str) -> Result<Vec<u8>> {
        let url = Url::parse(content_url)?;
        debug!(url = %url, "Downloading attachment content");

        let response = self.get_url(url).await?;
        let bytes = response.bytes().await.map_err(ApiError::RequestFailed)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RedmineClient {
        RedmineClient::new("https://tracker.example.org", "key").unwrap()
    }

    #[tokio::test]
    async fn missing_file_fails_before_any_request() {
        let upload = AttachmentUpload::new("/nonexistent/run42.fastq", 1234, OCTET_STREAM);
        let err = client().upload_file(&upload).await.unwrap_err();
        assert!(matches!(err, ApiError::Upload { .. }));
    }

    #[tokio::test]
    async fn bad_status_fails_before_the_file_is_read() {
        // The path does not exist either; the status check must win.
        let upload =
            AttachmentUpload::new("/nonexistent/run42.fastq", 1234, OCTET_STREAM).status_change(9);
        let err = client().upload_file(&upload).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn download_rejects_relative_urls() {
        let err = client().download("attachments/download/42/x.log").await;
        assert!(matches!(err, Err(ApiError::InvalidUrl(_))));
    }
}
