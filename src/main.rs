// ABOUTME: Entry point for the keygate binary.
// ABOUTME: Parses CLI arguments, initializes tracing, loads config, and serves the gated router.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use keygate_server::{AppState, KeygateConfig, create_router};

/// Pre-shared header gate in front of a file-backed REST service.
#[derive(Debug, Parser)]
#[command(name = "keygate", version, about)]
struct Cli {
    /// Address to listen on (overrides KEYGATE_BIND).
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Port to listen on; keeps the configured host (overrides the port of KEYGATE_BIND).
    #[arg(long, short)]
    port: Option<u16>,

    /// Credential header name (overrides KEYGATE_HEADER).
    #[arg(long)]
    header: Option<String>,

    /// Base URL of the REST service to forward to (overrides KEYGATE_UPSTREAM_URL).
    #[arg(long)]
    upstream: Option<String>,

    /// Directory of static files served without a credential (overrides KEYGATE_STATIC_DIR).
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Reject every non-GET request with 403.
    #[arg(long)]
    read_only: bool,

    /// Do not add CORS headers.
    #[arg(long)]
    no_cors: bool,
}

impl Cli {
    fn apply(self, config: &mut KeygateConfig) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.bind.set_port(port);
        }
        if let Some(header) = self.header {
            config.header = header;
        }
        if let Some(upstream) = self.upstream {
            config.upstream_url = upstream;
        }
        if let Some(dir) = self.static_dir {
            config.static_dir = Some(dir);
        }
        config.read_only |= self.read_only;
        config.cors &= !self.no_cors;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "keygate=info,keygate_server=info,keygate_core=info,tower_http=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = KeygateConfig::from_env().context("invalid configuration")?;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let state = AppState::from_config(&config).context("failed to initialize server state")?;
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind))?;
    let addr = listener.local_addr().context("failed to read bound address")?;

    tracing::info!(
        %addr,
        header = %config.header,
        upstream = %config.upstream_url,
        read_only = config.read_only,
        "keygate is running with authorization enabled"
    );
    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "serving static files before the gate");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("keygate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested, draining connections");
}
