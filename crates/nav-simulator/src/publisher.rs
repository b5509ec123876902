//! Republishes engine notifications as observable session state.
//!
//! The latest snapshot is held in a `watch` channel (renderers only ever need
//! the newest value); discrete notifications go out on a `broadcast` channel
//! so every subscriber sees each break and completion.

use crate::engine::SimulationObserver;
use nav_domain::{SimulationState, VehicleCategory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

/// Broadcast channel capacity for session events.
const CHANNEL_CAPACITY: usize = 256;

/// Discrete session notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    Started {
        vehicle: VehicleCategory,
        total_km: f64,
    },
    BreakStarted {
        duration_min: f64,
    },
    RouteSwapped {
        total_km: f64,
    },
    Stopped,
    Completed,
}

/// Cloneable handle onto the session's output channels.
#[derive(Debug, Clone)]
pub struct StatePublisher {
    state_tx: Arc<watch::Sender<SimulationState>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl StatePublisher {
    #[must_use]
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(SimulationState::idle());
        let (event_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state_tx: Arc::new(state_tx),
            event_tx,
        }
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SimulationState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> SimulationState {
        self.state_tx.borrow().clone()
    }

    pub fn publish_state(&self, state: SimulationState) {
        self.state_tx.send_replace(state);
    }

    pub fn publish_event(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationObserver for StatePublisher {
    fn on_update(&mut self, state: &SimulationState) {
        self.publish_state(state.clone());
    }

    fn on_break(&mut self, duration_min: f64) {
        self.publish_event(SessionEvent::BreakStarted { duration_min });
    }

    fn on_complete(&mut self) {
        self.publish_event(SessionEvent::Completed);
    }
}
