//! # Head-Unit Navigation - Domain Model
//!
//! Core value types shared by the simulation engine and its hosts: WGS84
//! coordinates and great-circle math, validated route geometry, vehicle
//! performance profiles, and the observable simulation snapshot.
//!
//! Nothing in this crate performs I/O or reads a clock; every type is a
//! plain value that can be copied, serialized and compared in tests.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod geo;
pub mod route;
pub mod state;
pub mod vehicle;

pub use error::{DomainError, Result};
pub use geo::{Coordinate, EARTH_RADIUS_KM, bearing, distance, interpolate};
pub use route::Route;
pub use state::{BreakRecord, SimulationPhase, SimulationState};
pub use vehicle::{
    VehicleCategory, VehicleProfile, all_profiles, categories, create, estimate_eta, profile,
};
