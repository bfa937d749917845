//! Login and registration against the API.

use std::sync::Arc;

use serde::Deserialize;
use tally_core::{Credentials, Token};

use crate::session::{Session, SessionManager};
use crate::storage::StorageError;
use crate::transport::{ApiTransport, TransportError};

pub const LOGIN_PATH: &str = "/api/login";
pub const REGISTER_PATH: &str = "/api/register";

/// Which auth form the view is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        }
    }
}

/// What a successful form submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Logged in; the session now holds a token.
    Authenticated,
    /// Account created; the view should now offer the login form.
    Registered,
}

/// User-visible authentication failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The server refused and explained why.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// The request failed without a server-supplied explanation.
    #[error("authentication failed")]
    Failed(#[source] TransportError),
    /// Login succeeded but the response carried no usable token.
    #[error("server did not return a token")]
    MissingToken,
    /// The token could not be persisted.
    #[error("could not save session: {0}")]
    Storage(#[from] StorageError),
}

impl From<TransportError> for AuthError {
    fn from(err: TransportError) -> Self {
        match (err.status(), err.server_message()) {
            (Some(status), Some(message)) => AuthError::Rejected { status, message },
            _ => AuthError::Failed(err),
        }
    }
}

/// Body of a successful login response: `{token}`, or `{error}` when the
/// server refuses with a success status.
#[derive(Debug, Default, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl LoginResponse {
    fn into_token(self) -> Result<Token, AuthError> {
        if let Some(token) = self.token.and_then(|raw| Token::new(raw).ok()) {
            return Ok(token);
        }
        match self.error {
            Some(message) => Err(AuthError::Rejected {
                status: 200,
                message,
            }),
            None => Err(AuthError::MissingToken),
        }
    }
}

/// Drives login/registration and hands issued tokens to the session.
///
/// Each call is a single request-response round trip; nothing is retried.
pub struct AuthController {
    transport: Arc<ApiTransport>,
    session: Arc<SessionManager>,
    mode: AuthMode,
}

impl AuthController {
    pub fn new(transport: Arc<ApiTransport>, session: Arc<SessionManager>) -> Self {
        Self {
            transport,
            session,
            mode: AuthMode::default(),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
    }

    pub fn toggle_mode(&mut self) -> AuthMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    /// Exchange credentials for a token and store it in the session.
    ///
    /// On any failure the session is left exactly as it was.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let body = serde_json::to_value(credentials)
            .map_err(|e| AuthError::Failed(TransportError::InvalidBody(e.to_string())))?;

        // Login itself never carries a prior token.
        let response = self
            .transport
            .post(LOGIN_PATH, &body, &Session::anonymous())
            .await
            .inspect_err(|e| {
                tracing::warn!(username = %credentials.username, error = %e, "login rejected");
            })?;

        let token = serde_json::from_value::<LoginResponse>(response)
            .unwrap_or_default()
            .into_token()
            .inspect_err(|e| {
                tracing::warn!(username = %credentials.username, error = %e, "login returned no token");
            })?;

        self.session.set_token(token)?;
        tracing::info!(username = %credentials.username, "logged in");
        Ok(())
    }

    /// Create an account. Does not log in; returns the mode the view should
    /// switch to.
    pub async fn register(&self, credentials: &Credentials) -> Result<AuthMode, AuthError> {
        let body = serde_json::to_value(credentials)
            .map_err(|e| AuthError::Failed(TransportError::InvalidBody(e.to_string())))?;

        self.transport
            .post(REGISTER_PATH, &body, &Session::anonymous())
            .await
            .inspect_err(|e| {
                tracing::warn!(username = %credentials.username, error = %e, "registration rejected");
            })?;

        tracing::info!(username = %credentials.username, "registered");
        Ok(AuthMode::Login)
    }

    /// Submit the form for the current mode.
    pub async fn submit(&mut self, credentials: &Credentials) -> Result<AuthOutcome, AuthError> {
        match self.mode {
            AuthMode::Login => {
                self.login(credentials).await?;
                Ok(AuthOutcome::Authenticated)
            }
            AuthMode::Register => {
                let next = self.register(credentials).await?;
                self.mode = next;
                Ok(AuthOutcome::Registered)
            }
        }
    }
}
