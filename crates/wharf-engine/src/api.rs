//! Transport to the remote candidate API.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub const CANDIDATES_PATH: &str = "/api/candidates";
pub const HEALTH_PATH: &str = "/health";

/// Raw HTTP reply: status code plus the JSON body (empty object when the body is not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// String field of the body. Numeric ids are accepted and rendered as text.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.body.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Unreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Connectivity problems (refused, DNS, timeout) as opposed to malformed requests.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Unreachable(_) | TransportError::Timeout)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() {
            TransportError::Unreachable(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// The remote API as seen by the submission client.
#[async_trait]
pub trait CandidateApi: Send + Sync {
    /// `POST {api_url}/api/candidates` with bearer auth.
    async fn create_candidate(
        &self,
        api_url: &str,
        api_key: &str,
        body: &Value,
    ) -> Result<ApiResponse, TransportError>;

    /// `GET {api_url}/health`.
    async fn health(&self, api_url: &str) -> Result<ApiResponse, TransportError>;
}

/// Joins the configured base URL and an API path, tolerating a trailing slash.
pub fn endpoint(api_url: &str, path: &str) -> String {
    format!("{}{}", api_url.trim_end_matches('/'), path)
}

#[derive(Debug, Clone, Default)]
pub struct HttpCandidateApi {
    client: reqwest::Client,
}

impl HttpCandidateApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

async fn read_response(response: reqwest::Response) -> Result<ApiResponse, TransportError> {
    let status = response.status().as_u16();
    // Plain bytes involve no decoding; a failure here is the connection dropping mid-reply.
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransportError::Unreachable(e.to_string()))?;
    let body = serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::Object(Map::new()));
    Ok(ApiResponse { status, body })
}

#[async_trait]
impl CandidateApi for HttpCandidateApi {
    async fn create_candidate(
        &self,
        api_url: &str,
        api_key: &str,
        body: &Value,
    ) -> Result<ApiResponse, TransportError> {
        let response = self
            .client
            .post(endpoint(api_url, CANDIDATES_PATH))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;
        read_response(response).await
    }

    async fn health(&self, api_url: &str) -> Result<ApiResponse, TransportError> {
        let response = self.client.get(endpoint(api_url, HEALTH_PATH)).send().await?;
        read_response(response).await
    }
}
