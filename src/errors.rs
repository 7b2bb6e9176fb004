//! Centralised error type for process-level failures.
//!
//! Per-request outcomes (malformed request, not found, queue full, soft-ack
//! timeout, insert failure) never reach this type: they are resolved
//! directly into an HTTP status/body by the ingress and writer modules and
//! never escape a connection. `IngestError` only covers failures that can
//! legitimately end the process (`ListenBindFailure`, `FatalConfig`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    ListenBindFailure {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ClickHouse port out of range (0..65535): {0}")]
    FatalConfig(i64),

    #[error("invalid listen address {0}")]
    InvalidListenAddress(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
