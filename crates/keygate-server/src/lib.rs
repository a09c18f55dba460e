// ABOUTME: HTTP layer for keygate: the header gate middleware in front of an upstream REST service.
// ABOUTME: Uses Axum and tower-http for the default middleware stack and reqwest for forwarding.

pub mod app_state;
pub mod auth;
pub mod config;
pub mod routes;
pub mod upstream;

pub use app_state::{AppState, Defaults, SharedState};
pub use auth::AuthLayer;
pub use config::{ConfigError, KeygateConfig};
pub use routes::create_router;
pub use upstream::{Upstream, UpstreamError};
