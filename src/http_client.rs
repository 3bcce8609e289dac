//! HTTP client abstraction for external API communication.
//!
//! This module provides a trait-based abstraction over HTTP clients, enabling
//! dependency injection and easy mocking in tests. The response carries the
//! HTTP status alongside the body so callers can surface upstream failures
//! with their original status code.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

/// An HTTP response: status code plus raw body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for HTTP communication with external APIs.
///
/// This abstraction allows injecting mock HTTP clients for testing without
/// making real network requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with JSON body and returns the response.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to send the request to
    /// * `headers` - Key-value pairs of headers to include
    /// * `body` - The JSON body to send
    ///
    /// # Errors
    ///
    /// Returns an error only for transport-level failures (DNS, connect,
    /// timeout). Non-2xx responses are returned as ordinary `HttpResponse`
    /// values so the caller can decide how to report them.
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;
}

/// HTTP client implementation using reqwest.
///
/// This is the default production implementation that makes real HTTP requests.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Creates a new HTTP client with default configuration.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(*key, *value);
        }

        let response = request.json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}

/// Mock HTTP client returning a predetermined response.
///
/// Lives outside `#[cfg(test)]` so integration tests can drive the full
/// generation pipeline without network access.
pub struct MockHttpClient {
    status: u16,
    body: String,
}

impl MockHttpClient {
    /// Creates a mock client that always answers with the given status and body.
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post_json(
        &self,
        _url: &str,
        _headers: &[(&str, &str)],
        _body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_http_client_returns_response() {
        let client = MockHttpClient::new(200, "test response");
        let response = client
            .post_json("http://unused", &[], &serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.is_success());
        assert_eq!(response.body, "test response");
    }

    #[tokio::test]
    async fn test_mock_http_client_error_status_is_not_success() {
        let client = MockHttpClient::new(429, "rate limited");
        let response = client
            .post_json("http://unused", &[], &serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(response.status, 429);
        assert!(!response.is_success());
    }
}
