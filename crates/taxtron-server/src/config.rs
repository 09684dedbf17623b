//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use ed25519_dalek::SigningKey;

use taxtron_shared::constants::{DEFAULT_HTTP_PORT, DEFAULT_TRANSFER_FEE};
use taxtron_shared::session::signing_key_from_hex;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: the platform data directory (see `Database::new`).
    pub database_path: Option<PathBuf>,

    /// JSON file of users and vehicles loaded into the database at startup.
    /// Records that already exist are skipped.
    /// Env: `SEED_FILE`
    /// Default: none
    pub seed_file: Option<PathBuf>,

    /// Ed25519 secret key used to sign and verify session tokens
    /// (hex-encoded, 64 chars).
    /// Env: `TOKEN_SIGNING_KEY`
    /// Default: none, an ephemeral key is generated at startup.
    pub token_signing_key: Option<SigningKey>,

    /// Fee applied when an initiator does not specify one.
    /// Env: `DEFAULT_TRANSFER_FEE`
    /// Default: `5000`
    pub default_transfer_fee: i64,

    /// Sustained requests per second allowed per client IP.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// Burst size of the per-IP token bucket.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("seed_file", &self.seed_file)
            .field(
                "token_signing_key",
                &self.token_signing_key.as_ref().map(|_| "<redacted>"),
            )
            .field("default_transfer_fee", &self.default_transfer_fee)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            seed_file: None,
            token_signing_key: None,
            default_transfer_fee: DEFAULT_TRANSFER_FEE,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which plays the role of the
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(path) = lookup("SEED_FILE") {
            if !path.trim().is_empty() {
                config.seed_file = Some(PathBuf::from(path));
            }
        }

        if let Some(hex_key) = lookup("TOKEN_SIGNING_KEY") {
            match signing_key_from_hex(&hex_key) {
                Ok(key) => config.token_signing_key = Some(key),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid TOKEN_SIGNING_KEY, using an ephemeral key");
                }
            }
        }

        if let Some(val) = lookup("DEFAULT_TRANSFER_FEE") {
            match val.trim().parse::<i64>() {
                Ok(fee) if fee >= 0 => config.default_transfer_fee = fee,
                _ => tracing::warn!(value = %val, "Invalid DEFAULT_TRANSFER_FEE, using default"),
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            if let Ok(n) = val.trim().parse::<f64>() {
                if n > 0.0 {
                    config.rate_limit_per_sec = n;
                }
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            if let Ok(n) = val.trim().parse::<f64>() {
                if n >= 1.0 {
                    config.rate_limit_burst = n;
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
