//! HTTP access layer against the ledger API.

use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use crate::session::Session;

/// Classified request failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// No response reached the caller (connect/DNS/IO failure).
    #[error("network error: {0}")]
    Network(String),
    /// A response arrived with a non-success status.
    #[error("API error ({status}): {body}")]
    Http { status: u16, body: String },
    /// A success response whose body is not JSON.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The `error` string of a `{"error": "..."}` failure body, if present.
    pub fn server_message(&self) -> Option<String> {
        let TransportError::Http { body, .. } = self else {
            return None;
        };
        serde_json::from_str::<Value>(body)
            .ok()?
            .get("error")?
            .as_str()
            .map(str::to_string)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Stateless HTTP client rooted at a fixed base endpoint.
///
/// The only state consulted per call is the `Session` passed in: when it
/// holds a token, the request carries `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct ApiTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ApiTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve an API path against the base endpoint.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Issue one request and return the parsed JSON body.
    ///
    /// An empty success body (e.g. `204 No Content`) yields `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        session: &Session,
    ) -> Result<Value, TransportError> {
        let request_id = Uuid::now_v7();
        let url = self.url(path);

        let mut req = self.http.request(method.clone(), &url);
        if let Some(token) = session.token() {
            req = req.bearer_auth(token.as_str());
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(
            %request_id,
            %method,
            path,
            authenticated = session.is_authenticated(),
            "sending request"
        );

        let resp = req.send().await.map_err(|e| {
            tracing::warn!(%request_id, %method, path, error = %e, "request failed before a response arrived");
            TransportError::Network(e.to_string())
        })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(%request_id, %method, path, status = status.as_u16(), "request rejected");
            return Err(TransportError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        tracing::debug!(%request_id, status = status.as_u16(), bytes = bytes.len(), "response received");

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }

    pub async fn get(&self, path: &str, session: &Session) -> Result<Value, TransportError> {
        self.request(Method::GET, path, None, session).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        session: &Session,
    ) -> Result<Value, TransportError> {
        self.request(Method::POST, path, Some(body), session).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: &Value,
        session: &Session,
    ) -> Result<Value, TransportError> {
        self.request(Method::PUT, path, Some(body), session).await
    }

    pub async fn delete(&self, path: &str, session: &Session) -> Result<Value, TransportError> {
        self.request(Method::DELETE, path, None, session).await
    }
}
