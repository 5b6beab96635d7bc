pub mod error;
pub mod issues;
pub mod pagination;
pub mod retry;
pub mod types;
pub mod uploads;

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use retry::retry_with_wait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};
use url::Url;

pub use error::{ApiError, Result};
pub use issues::DEFAULT_ISSUE_LIMIT;
pub use pagination::IssuePager;
pub use retry::RetryPolicy;
pub use types::{
    AttachmentUpload, Issue, IssueList, IssueStatus, IssueUpdate, NamedRef, UploadedToken,
};

#[derive(Clone, Debug)]
pub enum AuthMethod {
    /// `X-Redmine-API-Key` header, the usual way in.
    ApiKey { key: String },
    /// Regular account login, for installations with the API key switched off.
    Basic { login: String, password: String },
}

/// Client for a single Redmine installation.
///
/// Holds the validated base URL, the credentials and the retry policy;
/// everything is immutable after construction and the client is cheap to
/// clone.
#[derive(Clone, Debug)]
pub struct RedmineClient {
    client: Client,
    base_url: Url,
    auth: AuthMethod,
    retry_policy: RetryPolicy,
}

impl RedmineClient {
    pub fn new(base_url: impl AsRef<str>, api_key: impl Into<String>) -> Result<Self> {
        let key = api_key.into();
        if key.trim().is_empty() {
            return Err(ApiError::InvalidArgument {
                message: "API key must not be empty".into(),
            });
        }

        let client = Client::builder()
            .user_agent(format!("redmine-cli/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::RequestFailed)?;

        Ok(Self {
            client,
            base_url: parse_base_url(base_url.as_ref())?,
            auth: AuthMethod::ApiKey { key },
            retry_policy: RetryPolicy::default(),
        })
    }

    pub fn with_basic_auth(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            login: login.into(),
            password: password.into(),
        };
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let response = self.execute(Method::GET, url, Option::<&()>::None).await?;
        Self::parse_json(response).await
    }

    /// Redmine answers writes with an empty 200/204, so the body is not
    /// parsed and the status is returned instead.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<StatusCode> {
        let url = self.endpoint(path)?;
        let response = self.execute(Method::PUT, url, Some(body)).await?;
        Ok(response.status())
    }

    /// GET against an absolute URL (attachment content URLs point outside
    /// the JSON API surface), with auth and retry applied as usual.
    pub(crate) async fn get_url(&self, url: Url) -> Result<Response> {
        self.execute(Method::GET, url, Option::<&()>::None).await
    }

    /// Raw byte POST used by the two-phase upload; the body is cloned per
    /// attempt so transient failures can be retried.
    pub(crate) async fn post_bytes<T: DeserializeOwned>(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(method = "POST", url = %url, bytes = bytes.len(), "Sending raw upload");

        let response = retry_with_wait(&self.retry_policy, || async {
            let req = self
                .apply_auth(self.client.post(url.clone()))
                .header(CONTENT_TYPE, content_type)
                .body(bytes.clone());
            let response = req.send().await.map_err(ApiError::RequestFailed)?;
            check_status(response).await
        })
        .await?;

        Self::parse_json(response).await
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<Response> {
        debug!(method = %method, url = %url, "Sending request");

        retry_with_wait(&self.retry_policy, || async {
            let mut req = self.client.request(method.clone(), url.clone());
            req = self.apply_auth(req);

            if let Some(body) = body {
                req = req.json(body);
            }

            let response = req.send().await.map_err(ApiError::RequestFailed)?;
            check_status(response).await
        })
        .await
    }

    fn apply_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthMethod::ApiKey { key } => request.header("X-Redmine-API-Key", key),
            AuthMethod::Basic { login, password } => request.basic_auth(login, Some(password)),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.strip_prefix('/').unwrap_or(path))
            .map_err(ApiError::InvalidUrl)
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse JSON response: {}", e);
            ApiError::InvalidResponse(e.to_string())
        })
    }
}

/// Classify the response by status. Terminal failures map to their own
/// error kinds; only the transient ones survive `is_retryable`.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::AuthenticationFailed {
            message: "invalid or revoked Redmine API key".to_string(),
        }),
        StatusCode::NOT_FOUND => {
            let resource = response.url().path().to_string();
            Err(ApiError::NotFound { resource })
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            Err(ApiError::RateLimitExceeded { retry_after })
        }
        status if status.is_server_error() => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Server error".to_string());
            Err(ApiError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
        status if status.is_client_error() => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Request rejected".to_string());
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
        status if status.is_success() => Ok(response),
        _ => {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| format!("Unexpected status: {}", status));
            Err(ApiError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// The base URL must be absolute http(s) with a host, and joins must treat
/// its path as a directory, so a missing trailing slash is added.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ApiError::InvalidArgument {
            message: format!("base URL '{raw}' must be an absolute http(s) URL"),
        });
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
