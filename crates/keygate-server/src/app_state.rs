// ABOUTME: Shared application state for the keygate HTTP server.
// ABOUTME: Holds the gate, the upstream client, and the default-middleware switches.

use std::path::PathBuf;
use std::sync::Arc;

use keygate_core::Gate;

use crate::config::{ConfigError, KeygateConfig};
use crate::upstream::Upstream;

/// Switches for the cross-cutting middleware installed in front of the gate.
#[derive(Debug, Clone)]
pub struct Defaults {
    /// Directory whose files are served without a credential.
    pub static_dir: Option<PathBuf>,
    /// Answer every non-GET request with 403.
    pub read_only: bool,
    pub cors: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            static_dir: None,
            read_only: false,
            cors: true,
        }
    }
}

/// Shared application state accessible by the router and the forwarding handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub gate: Gate,
    pub upstream: Upstream,
    pub defaults: Defaults,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create a new AppState with default middleware switches.
    pub fn new(gate: Gate, upstream: Upstream) -> Self {
        Self {
            gate,
            upstream,
            defaults: Defaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Build the state a running server needs from validated configuration.
    pub fn from_config(config: &KeygateConfig) -> Result<Self, ConfigError> {
        let gate = config.gate()?;

        // Redirects belong to the caller, not to keygate.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        let upstream = Upstream::new(client, &config.upstream_url, config.max_body_bytes);

        Ok(Self::new(gate, upstream).with_defaults(Defaults {
            static_dir: config.static_dir.clone(),
            read_only: config.read_only,
            cors: config.cors,
        }))
    }
}
