//! Observable simulation snapshot types.

use crate::geo::Coordinate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationPhase {
    #[default]
    Idle,
    Running,
    Paused,
    OnBreak,
    Completed,
}

impl SimulationPhase {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::OnBreak => "ON_BREAK",
            Self::Completed => "COMPLETED",
        }
    }

    /// True while a run is in progress (not idle, not completed).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::OnBreak)
    }
}

/// A rest stop taken during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakRecord {
    pub position: Coordinate,
    pub duration_min: f64,
    pub timestamp: DateTime<Utc>,
}

/// Externally observable state of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub is_running: bool,
    pub is_paused: bool,
    pub on_break: bool,
    pub current_position: Option<Coordinate>,
    /// 0..=100
    pub progress_pct: f64,
    pub current_speed_kmh: f64,
    pub eta_min: f64,
    pub distance_remaining_km: f64,
    /// Simulated minutes, scaled by the speed multiplier
    pub elapsed_min: f64,
    /// Bearing of the active segment, degrees from north
    pub heading_deg: f64,
    pub breaks: u32,
    pub break_points: Vec<BreakRecord>,
}

impl SimulationState {
    /// The canonical snapshot of an engine with nothing to do.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            is_running: false,
            is_paused: false,
            on_break: false,
            current_position: None,
            progress_pct: 0.0,
            current_speed_kmh: 0.0,
            eta_min: 0.0,
            distance_remaining_km: 0.0,
            elapsed_min: 0.0,
            heading_deg: 0.0,
            breaks: 0,
            break_points: Vec::new(),
        }
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::idle()
    }
}
