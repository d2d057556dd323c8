//! Management-API client
//!
//! Combines credentials and HTTP into the handle that operation work
//! functions receive. The handle is read-only and cheap to clone, so it
//! is safely shared across concurrently-processed resource instances.

use super::auth::{Credentials, TokenProvider};
use super::http::{HttpClient, RemoteError};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Main API client
#[derive(Clone)]
pub struct ApiClient {
    pub credentials: Credentials,
    pub http: HttpClient,
    base: Url,
    pub project: String,
}

impl ApiClient {
    /// Create a new API client scoped to one project.
    pub fn new(
        endpoint: &str,
        project: &str,
        provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, RemoteError> {
        let base =
            Url::parse(endpoint).map_err(|e| RemoteError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            credentials: Credentials::new(provider),
            http: HttpClient::new()?,
            base,
            project: project.to_string(),
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String, RemoteError> {
        self.credentials.get_token().await
    }

    /// Build a project-scoped API URL
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            self.project,
            path
        )
    }

    /// Build an API URL outside the project scope
    pub fn global_url(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<Value, RemoteError> {
        let token = self.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value, RemoteError> {
        let token = self.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a PUT request
    pub async fn put(&self, url: &str, body: &Value) -> Result<Value, RemoteError> {
        let token = self.get_token().await?;
        self.http.put(url, &token, body).await
    }

    /// Make a PATCH request
    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value, RemoteError> {
        let token = self.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<Value, RemoteError> {
        let token = self.get_token().await?;
        self.http.delete(url, &token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::auth::StaticToken;

    fn client(endpoint: &str) -> ApiClient {
        ApiClient::new(endpoint, "acme", Arc::new(StaticToken::new("t"))).unwrap()
    }

    #[test]
    fn url_builders_scope_to_the_project() {
        let client = client("https://api.example.com/v1");
        assert_eq!(
            client.url("firewalls/allow-ssh"),
            "https://api.example.com/v1/projects/acme/firewalls/allow-ssh"
        );
        assert_eq!(
            client.global_url("operations/op-1"),
            "https://api.example.com/v1/operations/op-1"
        );
    }

    #[test]
    fn trailing_slash_on_the_endpoint_is_tolerated() {
        let client = client("https://api.example.com/v1/");
        assert_eq!(
            client.url("firewalls"),
            "https://api.example.com/v1/projects/acme/firewalls"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let err = ApiClient::new("not a url", "acme", Arc::new(StaticToken::new("t")))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidEndpoint(_)));
    }
}
