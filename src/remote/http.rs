//! HTTP utilities for management-API calls

use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and masks potentially sensitive patterns
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        format!(
            "{}... [truncated, {} bytes total]",
            &body[..MAX_LOG_BODY_LENGTH],
            body.len()
        )
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Typed failure from the remote management API.
///
/// `NotFound` is load-bearing: read and delete operations translate it
/// into the instance's `Gone` transition instead of surfacing an error.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("authentication failed")]
    Unauthorized,

    #[error("permission denied")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("resource conflict")]
    Conflict,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("API request failed: {status} {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to parse response JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("credential error: {0}")]
    Credential(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound)
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => RemoteError::Unauthorized,
            403 => RemoteError::Forbidden,
            404 => RemoteError::NotFound,
            409 => RemoteError::Conflict,
            429 => RemoteError::RateLimited,
            code => RemoteError::Api {
                status: code,
                message: extract_api_message(body),
            },
        }
    }
}

/// Pull the human-readable message out of an error body, falling back to
/// a sanitized excerpt.
fn extract_api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| sanitize_for_log(body))
}

/// HTTP client wrapper for management-API calls
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(format!("strata/{}", crate::VERSION))
            .build()?;

        Ok(Self { client })
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        method: &'static str,
        url: &str,
    ) -> Result<Value, RemoteError> {
        tracing::debug!("{} {}", method, url);

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(RemoteError::from_status(status, &body));
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<Value, RemoteError> {
        self.execute(self.client.get(url).bearer_auth(token), "GET", url)
            .await
    }

    /// Make a POST request
    pub async fn post(
        &self,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value, RemoteError> {
        let mut request = self.client.post(url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(request, "POST", url).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<Value, RemoteError> {
        self.execute(self.client.put(url).bearer_auth(token).json(body), "PUT", url)
            .await
    }

    /// Make a PATCH request. Bodies are sparse: only the fields the caller
    /// intends to change, plus whatever the API requires on every update.
    pub async fn patch(&self, url: &str, token: &str, body: &Value) -> Result<Value, RemoteError> {
        self.execute(
            self.client.patch(url).bearer_auth(token).json(body),
            "PATCH",
            url,
        )
        .await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value, RemoteError> {
        self.execute(self.client.delete(url).bearer_auth(token), "DELETE", url)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_typed_errors() {
        assert!(RemoteError::from_status(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(matches!(
            RemoteError::from_status(StatusCode::UNAUTHORIZED, ""),
            RemoteError::Unauthorized
        ));
        assert!(matches!(
            RemoteError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            RemoteError::RateLimited
        ));
    }

    #[test]
    fn api_errors_carry_the_remote_message() {
        let body = r#"{"error": {"code": 400, "message": "priority out of range"}}"#;
        match RemoteError::from_status(StatusCode::BAD_REQUEST, body) {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "priority out of range");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated"));
        assert!(sanitized.len() < body.len());
    }
}
