//! # Navigation Session
//!
//! Session-scoped owner of one [`SimulationEngine`]. The session holds the
//! operator's selections (waypoints, vehicle, route choice), turns them into
//! a start configuration and republishes every engine notification through a
//! [`StatePublisher`].
//!
//! Mid-session changes follow two policies:
//!
//! - a new route geometry (refined primary route or a chosen alternative) is
//!   hot-swapped into the running engine, keeping the covered fraction;
//! - a new vehicle restarts the run from the beginning of the route.

use crate::engine::{
    EngineConfig, SimulationEngine, StartConfig, validate_speed_multiplier,
};
use crate::error::{Result, SimulatorError};
use crate::publisher::{SessionEvent, StatePublisher};
use crate::store::{PersistedSelection, SelectionStore};
use nav_domain::{
    Coordinate, Route, SimulationPhase, SimulationState, VehicleCategory, VehicleProfile, create,
    profile,
};
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use tracing::{Span, debug, info, info_span, warn};
use uuid::Uuid;

/// Multiplier used for demo runs unless the operator picks another one.
pub const DEFAULT_SPEED_MULTIPLIER: f64 = 50.0;

/// A routing alternative offered next to the primary route.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeRoute {
    pub geometry: Route,
    pub distance_km: f64,
    pub duration_min: f64,
}

impl AlternativeRoute {
    /// Alternative with distance taken from its geometry and duration
    /// estimated at the vehicle's average speed.
    #[must_use]
    pub fn from_geometry(geometry: Route, vehicle: &VehicleProfile) -> Self {
        let distance_km = geometry.total_km();
        Self {
            geometry,
            distance_km,
            duration_min: distance_km / vehicle.avg_speed_kmh * 60.0,
        }
    }
}

/// One operator's navigation session.
pub struct NavigationSession {
    session_id: Uuid,
    span: Span,
    engine: Option<SimulationEngine>,
    engine_config: EngineConfig,
    seed: Option<u64>,
    publisher: StatePublisher,
    store: Box<dyn SelectionStore>,

    start_id: Option<String>,
    end_id: Option<String>,
    vehicle: VehicleProfile,
    primary_route: Option<Route>,
    alternatives: Vec<AlternativeRoute>,
    /// 0 selects the primary route, `n` selects `alternatives[n - 1]`
    selected_route_index: usize,
    is_navigating: bool,
    speed_multiplier: f64,
}

impl NavigationSession {
    /// Fresh session with default selections. Nothing is read from `store`.
    pub fn new(engine_config: EngineConfig, store: Box<dyn SelectionStore>) -> Self {
        let session_id = Uuid::new_v4();
        Self {
            session_id,
            span: info_span!("session", id = %session_id),
            engine: None,
            engine_config,
            seed: None,
            publisher: StatePublisher::new(),
            store,
            start_id: None,
            end_id: None,
            vehicle: profile(VehicleCategory::default()),
            primary_route: None,
            alternatives: Vec::new(),
            selected_route_index: 0,
            is_navigating: false,
            speed_multiplier: DEFAULT_SPEED_MULTIPLIER,
        }
    }

    /// Session seeded from the last saved selection.
    ///
    /// A store that cannot be read is logged and treated as empty. Route
    /// geometry is never persisted and must be supplied again.
    pub fn restore(engine_config: EngineConfig, store: Box<dyn SelectionStore>) -> Self {
        let mut session = Self::new(engine_config, store);
        match session.store.load() {
            Ok(Some(saved)) => {
                info!(
                    start = %saved.start_id,
                    end = %saved.end_id,
                    vehicle = %saved.vehicle,
                    is_navigating = saved.is_navigating,
                    "Restored saved selection"
                );
                session.start_id = non_empty(saved.start_id);
                session.end_id = non_empty(saved.end_id);
                session.vehicle = profile(saved.vehicle);
                session.is_navigating = saved.is_navigating;
            }
            Ok(None) => debug!("No saved selection"),
            Err(e) => warn!(error = %e, "Failed to load saved selection, using defaults"),
        }
        session
    }

    /// Make break rolls reproducible for every run of this session.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    // =========================================================================
    // SELECTIONS
    // =========================================================================

    pub fn set_start_id(&mut self, id: impl Into<String>) {
        self.start_id = non_empty(id.into());
        self.persist();
    }

    pub fn set_end_id(&mut self, id: impl Into<String>) {
        self.end_id = non_empty(id.into());
        self.persist();
    }

    /// Switch vehicle by category name. An active run restarts with the new
    /// vehicle.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVehicleType` for unrecognized names; the current
    /// vehicle is kept.
    pub fn select_vehicle(&mut self, name: &str, now: Instant) -> Result<()> {
        let vehicle = create(name)?;
        let _span = self.span.clone().entered();

        info!(vehicle = %vehicle.category, "Vehicle selected");
        self.vehicle = vehicle;
        self.persist();

        if self.phase().is_active() {
            self.start_simulation(now)?;
        }
        Ok(())
    }

    /// Replace the primary route geometry and select it.
    ///
    /// An active run picks up the new geometry without restarting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRoute` when the points do not form a usable route;
    /// nothing changes in that case.
    pub fn set_road_geometry(&mut self, points: Vec<Coordinate>) -> Result<()> {
        let route = Route::new(points)?;
        let _span = self.span.clone().entered();

        debug!(points = route.point_count(), total_km = route.total_km(), "Primary route set");
        self.primary_route = Some(route);
        self.selected_route_index = 0;
        self.hot_swap();
        Ok(())
    }

    /// Replace the offered alternatives. A selection pointing past the new
    /// list falls back to the primary route. An active run follows whatever
    /// geometry the selection now resolves to.
    pub fn set_alternative_routes(&mut self, alternatives: Vec<AlternativeRoute>) {
        let previous = self.current_route().cloned();
        self.alternatives = alternatives;
        if self.selected_route_index > self.alternatives.len() {
            self.selected_route_index = 0;
        }
        if self.current_route() != previous.as_ref() {
            let _span = self.span.clone().entered();
            self.hot_swap();
        }
    }

    /// Choose the route to drive: 0 for the primary route, `n` for the
    /// n-th alternative.
    ///
    /// Returns false, changing nothing, when no route exists at `index`.
    pub fn select_route(&mut self, index: usize) -> bool {
        let exists = if index == 0 {
            self.primary_route.is_some()
        } else {
            index <= self.alternatives.len()
        };
        if !exists {
            debug!(index, alternatives = self.alternatives.len(), "Route selection ignored");
            return false;
        }

        let _span = self.span.clone().entered();
        info!(index, "Route selected");
        self.selected_route_index = index;
        self.hot_swap();
        true
    }

    // =========================================================================
    // SIMULATION CONTROL
    // =========================================================================

    /// Start a run on the selected route with the selected vehicle.
    ///
    /// Any previous engine is stopped before the new one is built.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::NoRoute`] when no route is selected.
    pub fn start_simulation(&mut self, now: Instant) -> Result<()> {
        let route = self.current_route().cloned().ok_or(SimulatorError::NoRoute)?;
        let _span = self.span.clone().entered();

        self.stop_engine();

        let total_km = route.total_km();
        let mut engine = match self.seed {
            Some(seed) => SimulationEngine::with_seed(self.engine_config, seed),
            None => SimulationEngine::new(self.engine_config),
        };
        engine.start(
            StartConfig::new(
                route,
                self.vehicle.clone(),
                self.speed_multiplier,
                self.publisher.clone(),
            ),
            now,
        )?;
        self.engine = Some(engine);

        self.is_navigating = true;
        self.persist();
        self.publisher.publish_event(SessionEvent::Started {
            vehicle: self.vehicle.category,
            total_km,
        });
        Ok(())
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        let _span = self.span.enter();
        self.engine.as_mut().is_some_and(|e| e.pause(now))
    }

    pub fn resume(&mut self, now: Instant) -> bool {
        let _span = self.span.enter();
        self.engine.as_mut().is_some_and(|e| e.resume(now))
    }

    /// Stop the run. The navigation selection is kept.
    pub fn stop(&mut self) {
        let _span = self.span.clone().entered();
        self.stop_engine();
        self.publisher.publish_state(SimulationState::idle());
    }

    /// Change the multiplier for the current and future runs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSpeedMultiplier` for non-positive or non-finite values.
    pub fn set_speed_multiplier(&mut self, value: f64) -> Result<()> {
        self.speed_multiplier = validate_speed_multiplier(value)?;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_speed_multiplier(value)?;
        }
        Ok(())
    }

    /// Deliver one host frame to the engine.
    pub fn tick(&mut self, now: Instant) {
        if let Some(engine) = self.engine.as_mut() {
            let _span = self.span.enter();
            engine.tick(now);
        }
    }

    /// Drop route, alternatives and navigation flag, stopping any run.
    pub fn clear_navigation(&mut self) {
        let _span = self.span.clone().entered();
        self.stop_engine();
        self.primary_route = None;
        self.alternatives.clear();
        self.selected_route_index = 0;
        self.is_navigating = false;
        self.publisher.publish_state(SimulationState::idle());
        self.persist();
        info!("Navigation cleared");
    }

    // =========================================================================
    // OBSERVATION
    // =========================================================================

    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn phase(&self) -> SimulationPhase {
        self.engine
            .as_ref()
            .map_or(SimulationPhase::Idle, SimulationEngine::phase)
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn state(&self) -> SimulationState {
        self.publisher.latest()
    }

    #[must_use]
    pub fn wants_frame(&self) -> bool {
        self.engine.as_ref().is_some_and(SimulationEngine::wants_frame)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.engine.as_ref().and_then(SimulationEngine::next_deadline)
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<SimulationState> {
        self.publisher.subscribe_state()
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.publisher.subscribe_events()
    }

    #[must_use]
    pub fn start_id(&self) -> Option<&str> {
        self.start_id.as_deref()
    }

    #[must_use]
    pub fn end_id(&self) -> Option<&str> {
        self.end_id.as_deref()
    }

    #[must_use]
    pub const fn vehicle(&self) -> &VehicleProfile {
        &self.vehicle
    }

    #[must_use]
    pub fn alternatives(&self) -> &[AlternativeRoute] {
        &self.alternatives
    }

    #[must_use]
    pub const fn selected_route_index(&self) -> usize {
        self.selected_route_index
    }

    /// The route a run would follow right now.
    #[must_use]
    pub fn current_route(&self) -> Option<&Route> {
        match self.selected_route_index {
            0 => self.primary_route.as_ref(),
            n => self.alternatives.get(n - 1).map(|alt| &alt.geometry),
        }
    }

    #[must_use]
    pub const fn is_navigating(&self) -> bool {
        self.is_navigating
    }

    #[must_use]
    pub const fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier
    }

    // -------------------------------------------------------------------------
    // internals
    // -------------------------------------------------------------------------

    fn stop_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            if engine.phase().is_active() {
                engine.stop();
                self.publisher.publish_event(SessionEvent::Stopped);
            }
        }
    }

    fn hot_swap(&mut self) {
        let Some(route) = self.current_route().cloned() else {
            return;
        };
        let total_km = route.total_km();
        if self.engine.as_mut().is_some_and(|e| e.update_route(route)) {
            self.publisher
                .publish_event(SessionEvent::RouteSwapped { total_km });
        }
    }

    fn persist(&mut self) {
        let selection = PersistedSelection {
            start_id: self.start_id.clone().unwrap_or_default(),
            end_id: self.end_id.clone().unwrap_or_default(),
            vehicle: self.vehicle.category,
            is_navigating: self.is_navigating,
        };
        if let Err(e) = self.store.save(&selection) {
            warn!(error = %e, "Failed to save selection");
        }
    }
}

impl std::fmt::Debug for NavigationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationSession")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase())
            .field("vehicle", &self.vehicle.category)
            .field("selected_route_index", &self.selected_route_index)
            .field("is_navigating", &self.is_navigating)
            .finish_non_exhaustive()
    }
}

fn non_empty(id: String) -> Option<String> {
    if id.trim().is_empty() { None } else { Some(id) }
}
