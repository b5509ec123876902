//! # Navigation Simulator
//!
//! Route-following vehicle simulation for the head-unit navigation display.
//!
//! ## Features
//!
//! - Frame-driven simulation engine with pause, resume and rest stops
//! - Session layer owning one engine per operator session
//! - Observable state over `watch` and `broadcast` channels
//! - Persisted waypoint and vehicle selection
//! - Telemetry pings to the ingest service

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod locations;
pub mod publisher;
pub mod session;
pub mod store;
pub mod telemetry;

pub use config::SimulatorConfig;
pub use engine::{
    CallbackObserver, EngineConfig, SimulationEngine, SimulationObserver, StartConfig,
};
pub use error::{Result, SimulatorError};
pub use locations::Location;
pub use publisher::{SessionEvent, StatePublisher};
pub use session::{AlternativeRoute, DEFAULT_SPEED_MULTIPLIER, NavigationSession};
pub use store::{JsonFileStore, MemoryStore, PersistedSelection, SelectionStore};
pub use telemetry::{TelemetryPing, TelemetryReporter};
