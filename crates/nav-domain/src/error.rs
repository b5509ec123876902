//! Domain error types.

use thiserror::Error;

/// Domain-level errors.
///
/// All variants are local and recoverable: they are returned to the caller
/// before any engine state is touched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Registry lookup miss
    #[error("Unknown vehicle type: {0}")]
    UnknownVehicleType(String),

    /// Fewer than two points, or a point outside WGS84 bounds
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    /// Zero, negative or non-finite multiplier
    #[error("Invalid speed multiplier: {0}")]
    InvalidSpeedMultiplier(f64),

    /// Profile that cannot drive a run
    #[error("Invalid vehicle profile: {0}")]
    InvalidVehicleProfile(String),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
