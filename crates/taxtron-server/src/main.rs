//! # taxtron-server
//!
//! HTTP API for the TaxTron vehicle ownership-transfer workflow.
//!
//! This binary provides:
//! - **Transfer workflow** endpoints under `/ownership-transfer`: vehicle and
//!   recipient lookup, initiation, cancellation, completion and history
//! - **Admin review** endpoints for approving or rejecting pending transfers
//! - **Bearer session tokens** verified against the auth service's Ed25519 key
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod config;
mod error;
mod rate_limit;
mod seed;
mod workflow;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use taxtron_shared::session::generate_signing_key;
use taxtron_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use crate::workflow::TransferService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,taxtron_server=debug")),
        )
        .init();

    info!("Starting TaxTron server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open and seed the database, load the session key
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)
            .with_context(|| format!("opening database at {}", path.display()))?,
        None => Database::new().context("opening database in the data directory")?,
    };
    info!(path = ?db.path(), "Database ready");

    if let Some(path) = &config.seed_file {
        seed::load_seed_file(&db, path)
            .with_context(|| format!("seeding from {}", path.display()))?;
    }

    let signing_key = match config.token_signing_key.clone() {
        Some(key) => key,
        None => {
            warn!("TOKEN_SIGNING_KEY not set, generated an ephemeral key; issued tokens will not survive a restart");
            generate_signing_key()
        }
    };

    let rate_limiter = RateLimiter::from_config(&config);

    let app_state = AppState {
        service: TransferService::new(db, config.default_transfer_fee),
        verifying_key: signing_key.verifying_key(),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Every 5 minutes, forget clients idle for more than 10.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_idle(Duration::from_secs(600)).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
