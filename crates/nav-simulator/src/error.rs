//! Simulator error types.

use nav_domain::DomainError;
use thiserror::Error;

/// Errors surfaced by the session, store and telemetry layers.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// Registry, route or multiplier validation failure
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Start requested before any route geometry was selected
    #[error("No route selected")]
    NoRoute,

    /// Location id not present in the directory
    #[error("Unknown location: {0}")]
    UnknownLocation(String),

    /// Selection store I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Selection store or route file decoding failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Telemetry transport failure
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] reqwest::Error),

    /// Telemetry endpoint answered with a non-success status
    #[error("Telemetry endpoint returned status {0}")]
    TelemetryRejected(u16),
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimulatorError>;
