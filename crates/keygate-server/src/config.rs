// ABOUTME: Configuration loading and validation for the keygate server.
// ABOUTME: Reads KEYGATE_* environment variables, applies defaults, and builds the gate credential.

use std::net::SocketAddr;
use std::path::PathBuf;

use keygate_core::{Credential, CredentialError, DEFAULT_HEADER, Gate};
use thiserror::Error;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_SECRET: &str = "1234567";
const DEFAULT_UPSTREAM: &str = "http://127.0.0.1:3001";
const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KEYGATE_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("KEYGATE_UPSTREAM_URL must be an absolute http(s) URL: {0}")]
    InvalidUpstream(String),

    #[error("KEYGATE_MAX_BODY_BYTES is not a valid byte count: {0}")]
    InvalidBodyLimit(String),

    #[error("invalid credential: {0}")]
    Credential(#[from] CredentialError),

    #[error("failed to build upstream http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct KeygateConfig {
    pub bind: SocketAddr,
    pub header: String,
    pub secret: String,
    pub upstream_url: String,
    pub static_dir: Option<PathBuf>,
    pub read_only: bool,
    pub cors: bool,
    pub max_body_bytes: usize,
}

impl KeygateConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - KEYGATE_BIND: socket address to bind (default: 0.0.0.0:3000)
    /// - KEYGATE_HEADER: name of the credential header (default: privateKey)
    /// - KEYGATE_SECRET: pre-shared value the header must carry (default: 1234567)
    /// - KEYGATE_UPSTREAM_URL: base URL of the REST service (default: http://127.0.0.1:3001)
    /// - KEYGATE_STATIC_DIR: directory served before the gate (default: ./public if present)
    /// - KEYGATE_READ_ONLY: reject every non-GET request with 403 (default: false)
    /// - KEYGATE_NO_CORS: drop the CORS layer (default: false)
    /// - KEYGATE_MAX_BODY_BYTES: largest request body forwarded upstream (default: 10 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Empty values
    /// are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let bind_str = var("KEYGATE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let header = var("KEYGATE_HEADER").unwrap_or_else(|| DEFAULT_HEADER.to_string());
        let secret = lookup("KEYGATE_SECRET").unwrap_or_else(|| DEFAULT_SECRET.to_string());

        let upstream_url = var("KEYGATE_UPSTREAM_URL")
            .unwrap_or_else(|| DEFAULT_UPSTREAM.to_string());

        let static_dir = match var("KEYGATE_STATIC_DIR") {
            Some(dir) => Some(PathBuf::from(dir)),
            None => {
                let default = PathBuf::from(DEFAULT_STATIC_DIR);
                default.is_dir().then_some(default)
            }
        };

        let read_only = var("KEYGATE_READ_ONLY").is_some_and(|v| parse_flag(&v));
        let cors = !var("KEYGATE_NO_CORS").is_some_and(|v| parse_flag(&v));

        let max_body_bytes = match var("KEYGATE_MAX_BODY_BYTES") {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidBodyLimit(v))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let config = Self {
            bind,
            header,
            secret,
            upstream_url,
            static_dir,
            read_only,
            cors,
            max_body_bytes,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the fields that cannot be checked by parsing alone. Call again
    /// after overriding fields by hand.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.upstream_url)
            .map_err(|_| ConfigError::InvalidUpstream(self.upstream_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidUpstream(self.upstream_url.clone()));
        }

        self.credential()?;
        Ok(())
    }

    pub fn credential(&self) -> Result<Credential, ConfigError> {
        Ok(Credential::new(&self.header, self.secret.clone())?)
    }

    pub fn gate(&self) -> Result<Gate, ConfigError> {
        Ok(Gate::new(self.credential()?))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "true" | "1" | "yes")
}
