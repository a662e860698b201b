//! Crate-level error types.
//!
//! Module-specific failures (codec, store, listener close) live next to
//! their modules; this file holds the errors shared across the launcher
//! surface and the binary's configuration loading.

use std::net::SocketAddr;

use thiserror::Error;

use crate::vault::StoreError;

/// Errors starting or running the unlock gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("failed to bind unlock gate to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error(transparent)]
    Vault(#[from] StoreError),

    #[error("launcher startup failed: {0}")]
    Startup(String),

    #[error("launcher shut down before the {0} notification")]
    ChannelClosed(&'static str),
}

/// Errors loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
