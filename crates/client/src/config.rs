//! Client configuration, resolved once at startup.

use std::path::PathBuf;

/// Base endpoint used outside production: the companion server on loopback.
pub const DEVELOPMENT_API_URL: &str = "http://127.0.0.1:5000";

/// Same-origin address of the production deployment (override at compile
/// time via the `TALLY_ORIGIN` env var).
pub const PRODUCTION_API_URL: &str = match option_env!("TALLY_ORIGIN") {
    Some(origin) => origin,
    None => "http://localhost:8080",
};

/// Selects the deployment mode (`production`/`prod`).
pub const ENV_DEPLOYMENT: &str = "TALLY_ENV";
/// Overrides the base endpoint entirely.
pub const ENV_API_URL: &str = "TALLY_API_URL";
/// Overrides the durable token location.
pub const ENV_TOKEN_FILE: &str = "TALLY_TOKEN_FILE";

/// Deployment mode; decides the default base endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployment {
    Production,
    #[default]
    Development,
}

impl Deployment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Deployment::Production,
            _ => Deployment::Development,
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            Deployment::Production => PRODUCTION_API_URL,
            Deployment::Development => DEVELOPMENT_API_URL,
        }
    }
}

/// Static configuration for a client process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub deployment: Deployment,
    pub api_url: String,
    /// Where the bearer token is persisted. `None` keeps the session in
    /// memory only.
    pub token_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Defaults for a deployment mode.
    pub fn for_deployment(deployment: Deployment) -> Self {
        Self {
            deployment,
            api_url: deployment.default_api_url().to_string(),
            token_path: default_token_path(),
        }
    }

    /// Resolve from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let deployment = lookup(ENV_DEPLOYMENT)
            .map(|v| Deployment::parse(&v))
            .unwrap_or_default();

        let mut config = Self::for_deployment(deployment);

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(path) = lookup(ENV_TOKEN_FILE).filter(|v| !v.trim().is_empty()) {
            config.token_path = Some(PathBuf::from(path));
        }

        config
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_token_path(mut self, path: Option<PathBuf>) -> Self {
        self.token_path = path;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_deployment(Deployment::default())
    }
}

/// `<config dir>/tally/session.json`, if the platform has a config dir.
pub fn default_token_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tally").join("session.json"))
}
