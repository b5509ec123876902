//! Route-following simulation engine.
//!
//! The engine is a state machine advanced by host-delivered frames. It never
//! reads a clock for distance accounting: every operation that needs "now"
//! takes an [`Instant`] from the host, which keeps the engine independent of
//! any particular frame or timer API and lets tests drive it with synthetic
//! time.
//!
//! ```text
//!            start                 break roll
//!   Idle ───────────▶ Running ─────────────────▶ OnBreak
//!    ▲                 │  ▲  ◀──── timer due ──────┘ │
//!    │ stop       pause│  │resume                    │pause
//!    │ (any)           ▼  │                          ▼
//!    │               Paused ◀────────────────────────┘
//!    │
//!    └──── stop ──── Completed ◀── covered ≥ total (from Running)
//! ```

use chrono::Utc;
use nav_domain::{
    BreakRecord, DomainError, Route, SimulationPhase, SimulationState, VehicleProfile,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

// =============================================================================
// OBSERVER CONTRACT
// =============================================================================

/// Receives engine notifications synchronously from inside the engine's
/// control and tick operations.
pub trait SimulationObserver {
    /// Called on every tick and every discrete transition.
    fn on_update(&mut self, state: &SimulationState);

    /// Called when a rest stop begins, before the matching update.
    fn on_break(&mut self, _duration_min: f64) {}

    /// Called once per run, after the final update, at natural completion.
    fn on_complete(&mut self) {}
}

type UpdateFn = Box<dyn FnMut(&SimulationState)>;
type BreakFn = Box<dyn FnMut(f64)>;
type CompleteFn = Box<dyn FnMut()>;

/// Closure-backed observer.
pub struct CallbackObserver {
    on_update: UpdateFn,
    on_break: Option<BreakFn>,
    on_complete: Option<CompleteFn>,
}

impl CallbackObserver {
    pub fn new(on_update: impl FnMut(&SimulationState) + 'static) -> Self {
        Self {
            on_update: Box::new(on_update),
            on_break: None,
            on_complete: None,
        }
    }

    #[must_use]
    pub fn with_break(mut self, on_break: impl FnMut(f64) + 'static) -> Self {
        self.on_break = Some(Box::new(on_break));
        self
    }

    #[must_use]
    pub fn with_complete(mut self, on_complete: impl FnMut() + 'static) -> Self {
        self.on_complete = Some(Box::new(on_complete));
        self
    }
}

impl SimulationObserver for CallbackObserver {
    fn on_update(&mut self, state: &SimulationState) {
        (self.on_update)(state);
    }

    fn on_break(&mut self, duration_min: f64) {
        if let Some(f) = self.on_break.as_mut() {
            f(duration_min);
        }
    }

    fn on_complete(&mut self) {
        if let Some(f) = self.on_complete.as_mut() {
            f();
        }
    }
}

impl fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("on_break", &self.on_break.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Engine tuning shared by every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound on real time spent in a rest stop, whatever the multiplier
    pub break_ceiling: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            break_ceiling: Duration::from_millis(3000),
        }
    }
}

/// Everything needed to begin a run.
pub struct StartConfig {
    pub route: Route,
    pub vehicle: VehicleProfile,
    pub speed_multiplier: f64,
    pub observer: Box<dyn SimulationObserver>,
}

impl StartConfig {
    pub fn new(
        route: Route,
        vehicle: VehicleProfile,
        speed_multiplier: f64,
        observer: impl SimulationObserver + 'static,
    ) -> Self {
        Self {
            route,
            vehicle,
            speed_multiplier,
            observer: Box::new(observer),
        }
    }
}

/// Reject zero, negative and non-finite multipliers.
///
/// # Errors
///
/// Returns [`DomainError::InvalidSpeedMultiplier`] for any value that is not
/// a finite positive number.
pub fn validate_speed_multiplier(value: f64) -> Result<f64, DomainError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(DomainError::InvalidSpeedMultiplier(value))
    }
}

/// Reject profiles whose numbers would stall a run or poison the snapshot.
///
/// # Errors
///
/// Returns [`DomainError::InvalidVehicleProfile`] when the average speed is
/// not a finite positive number, or the break probability or duration is
/// negative or non-finite.
pub fn validate_vehicle(vehicle: &VehicleProfile) -> Result<(), DomainError> {
    let invalid = |field: &str, value: f64| {
        Err(DomainError::InvalidVehicleProfile(format!(
            "{}: {field} = {value}",
            vehicle.name
        )))
    };
    if !(vehicle.avg_speed_kmh.is_finite() && vehicle.avg_speed_kmh > 0.0) {
        return invalid("avg_speed_kmh", vehicle.avg_speed_kmh);
    }
    if !(vehicle.break_probability.is_finite() && vehicle.break_probability >= 0.0) {
        return invalid("break_probability", vehicle.break_probability);
    }
    if !(vehicle.break_duration_min.is_finite() && vehicle.break_duration_min >= 0.0) {
        return invalid("break_duration_min", vehicle.break_duration_min);
    }
    Ok(())
}

// =============================================================================
// ENGINE
// =============================================================================

/// One-shot deadline owned by the engine. Cancelling means dropping it.
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    due: Instant,
}

impl PendingTimer {
    fn after(now: Instant, wait: Duration) -> Self {
        Self { due: now + wait }
    }

    fn is_due(self, now: Instant) -> bool {
        now >= self.due
    }

    fn remaining(self, now: Instant) -> Duration {
        self.due.saturating_duration_since(now)
    }
}

struct ActiveRun {
    route: Route,
    vehicle: VehicleProfile,
    speed_multiplier: f64,
    observer: Box<dyn SimulationObserver>,
}

/// Advances a vehicle along a route one host frame at a time.
pub struct SimulationEngine {
    config: EngineConfig,
    run: Option<ActiveRun>,
    phase: SimulationPhase,
    state: SimulationState,
    covered_km: f64,
    /// Time reference of the last processed frame; `Some` only while frames
    /// are requested
    frame_anchor: Option<Instant>,
    break_timer: Option<PendingTimer>,
    /// Break time still owed when a rest stop was interrupted by `pause`
    paused_break: Option<Duration>,
    rng: StdRng,
}

impl SimulationEngine {
    /// Create an idle engine with an entropy-seeded RNG.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create an idle engine whose break rolls are reproducible.
    #[must_use]
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: EngineConfig, rng: StdRng) -> Self {
        Self {
            config,
            run: None,
            phase: SimulationPhase::Idle,
            state: SimulationState::idle(),
            covered_km: 0.0,
            frame_anchor: None,
            break_timer: None,
            paused_break: None,
            rng,
        }
    }

    /// Begin a run. A run already in progress is stopped first.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidSpeedMultiplier`] or
    /// [`DomainError::InvalidVehicleProfile`] without touching any state when
    /// the multiplier or the vehicle cannot drive a run.
    pub fn start(&mut self, config: StartConfig, now: Instant) -> Result<(), DomainError> {
        validate_speed_multiplier(config.speed_multiplier)?;
        validate_vehicle(&config.vehicle)?;

        if self.phase.is_active() {
            debug!(phase = self.phase.as_str(), "Stopping active run before restart");
            self.stop();
        }

        let total_km = config.route.total_km();
        let avg_speed = config.vehicle.avg_speed_kmh;

        self.covered_km = 0.0;
        self.break_timer = None;
        self.paused_break = None;
        self.frame_anchor = Some(now);
        self.phase = SimulationPhase::Running;
        self.state = SimulationState {
            is_running: true,
            current_position: Some(config.route.start()),
            eta_min: total_km / avg_speed * 60.0,
            distance_remaining_km: total_km,
            heading_deg: config.route.heading_at(0.0),
            ..SimulationState::idle()
        };

        info!(
            vehicle = %config.vehicle.category,
            total_km,
            points = config.route.point_count(),
            speed_multiplier = config.speed_multiplier,
            "Simulation started"
        );

        self.run = Some(ActiveRun {
            route: config.route,
            vehicle: config.vehicle,
            speed_multiplier: config.speed_multiplier,
            observer: config.observer,
        });
        self.notify_update();
        Ok(())
    }

    /// Process one host frame.
    ///
    /// Frames delivered while no frame is requested are ignored, except that
    /// a due break timer fires and the frame is then processed normally from
    /// the moment the break ended.
    pub fn tick(&mut self, now: Instant) {
        match self.phase {
            SimulationPhase::Running => {}
            SimulationPhase::OnBreak => match self.break_timer {
                Some(timer) if timer.is_due(now) => self.end_break(timer.due),
                _ => return,
            },
            _ => return,
        }
        self.advance(now);
    }

    /// Suspend the run. Valid from `Running` and `OnBreak`.
    ///
    /// Returns whether the transition happened.
    pub fn pause(&mut self, now: Instant) -> bool {
        match self.phase {
            SimulationPhase::Running => {
                self.frame_anchor = None;
            }
            SimulationPhase::OnBreak => {
                self.paused_break = self.break_timer.take().map(|t| t.remaining(now));
            }
            phase => {
                debug!(phase = phase.as_str(), "Pause ignored");
                return false;
            }
        }

        self.phase = SimulationPhase::Paused;
        self.state.is_paused = true;
        info!(progress_pct = self.state.progress_pct, "Simulation paused");
        self.notify_update();
        true
    }

    /// Continue a paused run. Real time spent paused is discarded.
    ///
    /// Returns whether the transition happened.
    pub fn resume(&mut self, now: Instant) -> bool {
        if self.phase != SimulationPhase::Paused {
            debug!(phase = self.phase.as_str(), "Resume ignored");
            return false;
        }

        self.state.is_paused = false;
        if let Some(remaining) = self.paused_break.take() {
            self.phase = SimulationPhase::OnBreak;
            self.break_timer = Some(PendingTimer::after(now, remaining));
        } else {
            self.phase = SimulationPhase::Running;
            self.frame_anchor = Some(now);
        }

        info!(phase = self.phase.as_str(), "Simulation resumed");
        self.notify_update();
        true
    }

    /// Abandon the run from any phase and return to the idle snapshot.
    ///
    /// Pending frames and break timers are cancelled. The completion
    /// notification is never sent from here.
    pub fn stop(&mut self) {
        let previous = self.phase;

        self.frame_anchor = None;
        self.break_timer = None;
        self.paused_break = None;
        self.covered_km = 0.0;
        self.phase = SimulationPhase::Idle;
        self.state = SimulationState::idle();

        if let Some(mut run) = self.run.take() {
            info!(from = previous.as_str(), "Simulation stopped");
            run.observer.on_update(&self.state);
        }
    }

    /// Change the multiplier; it applies from the next frame.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidSpeedMultiplier`] for non-positive or
    /// non-finite values; the current multiplier is kept.
    pub fn set_speed_multiplier(&mut self, value: f64) -> Result<(), DomainError> {
        let value = validate_speed_multiplier(value)?;
        if let Some(run) = self.run.as_mut() {
            debug!(from = run.speed_multiplier, to = value, "Speed multiplier changed");
            run.speed_multiplier = value;
        }
        Ok(())
    }

    /// Replace the route geometry of the active run.
    ///
    /// The fraction of the route already covered is preserved: covered
    /// distance is rescaled against the new total, so progress stays
    /// continuous and the vehicle jumps to the same relative position on the
    /// new polyline. Outside an active run the call has no effect.
    ///
    /// Returns whether the route was applied.
    pub fn update_route(&mut self, route: Route) -> bool {
        if !self.phase.is_active() {
            debug!(phase = self.phase.as_str(), "Route update ignored");
            return false;
        }
        let Some(run) = self.run.as_mut() else {
            return false;
        };

        let old_total = run.route.total_km();
        let fraction = if old_total > 0.0 {
            (self.covered_km / old_total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        run.route = route;
        self.covered_km = fraction * run.route.total_km();
        refresh_route_metrics(run, self.covered_km, &mut self.state);

        info!(
            total_km = run.route.total_km(),
            points = run.route.point_count(),
            progress_pct = self.state.progress_pct,
            "Route geometry replaced"
        );
        self.notify_update();
        true
    }

    /// Immutable copy of the current snapshot.
    #[must_use]
    pub fn get_state(&self) -> SimulationState {
        self.state.clone()
    }

    #[must_use]
    pub const fn phase(&self) -> SimulationPhase {
        self.phase
    }

    /// Whether the host should keep delivering frames.
    #[must_use]
    pub fn wants_frame(&self) -> bool {
        self.phase == SimulationPhase::Running
    }

    /// When the pending break timer fires, if one is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.break_timer.map(|t| t.due)
    }

    #[must_use]
    pub const fn covered_km(&self) -> f64 {
        self.covered_km
    }

    /// Length of the active route, if any.
    #[must_use]
    pub fn total_km(&self) -> Option<f64> {
        self.run.as_ref().map(|r| r.route.total_km())
    }

    #[must_use]
    pub fn speed_multiplier(&self) -> Option<f64> {
        self.run.as_ref().map(|r| r.speed_multiplier)
    }

    // -------------------------------------------------------------------------
    // frame processing
    // -------------------------------------------------------------------------

    fn advance(&mut self, now: Instant) {
        let Some(run) = self.run.as_ref() else {
            return;
        };

        let anchor = self.frame_anchor.unwrap_or(now);
        let delta_ms = now.saturating_duration_since(anchor).as_secs_f64() * 1000.0;
        self.frame_anchor = Some(now);

        let multiplier = run.speed_multiplier;
        let frame_km = run.vehicle.avg_speed_kmh * multiplier * delta_ms / MS_PER_HOUR;

        self.covered_km += frame_km;
        self.state.elapsed_min += delta_ms / MS_PER_MINUTE * multiplier;
        self.state.current_speed_kmh = run.vehicle.avg_speed_kmh * multiplier;
        refresh_route_metrics(run, self.covered_km, &mut self.state);

        debug!(
            delta_ms,
            covered_km = self.covered_km,
            progress_pct = self.state.progress_pct,
            "Frame"
        );

        if self.covered_km >= run.route.total_km() {
            self.complete();
        } else if self.roll_for_break(frame_km) {
            self.begin_break(now);
        } else {
            self.notify_update();
        }
    }

    fn roll_for_break(&mut self, frame_km: f64) -> bool {
        let Some(run) = self.run.as_ref() else {
            return false;
        };
        let p = (run.vehicle.break_probability * frame_km / 10.0).clamp(0.0, 1.0);
        if p.is_nan() || p <= 0.0 {
            return false;
        }
        Bernoulli::new(p).is_ok_and(|d| d.sample(&mut self.rng))
    }

    fn begin_break(&mut self, now: Instant) {
        let Some(run) = self.run.as_mut() else {
            return;
        };

        let duration_min = run.vehicle.break_duration_min;
        let real_ms = duration_min * MS_PER_MINUTE / run.speed_multiplier;
        let wait = break_wait(real_ms, self.config.break_ceiling);

        self.phase = SimulationPhase::OnBreak;
        self.frame_anchor = None;
        self.break_timer = Some(PendingTimer::after(now, wait));

        let position = self
            .state
            .current_position
            .unwrap_or_else(|| run.route.start());
        self.state.on_break = true;
        self.state.breaks += 1;
        self.state.break_points.push(BreakRecord {
            position,
            duration_min,
            timestamp: Utc::now(),
        });

        info!(
            breaks = self.state.breaks,
            duration_min,
            wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
            "Vehicle taking a break"
        );

        run.observer.on_break(duration_min);
        run.observer.on_update(&self.state);
    }

    fn end_break(&mut self, at: Instant) {
        self.break_timer = None;
        self.phase = SimulationPhase::Running;
        self.state.on_break = false;
        self.frame_anchor = Some(at);
        debug!("Break over, resuming");
    }

    fn complete(&mut self) {
        self.phase = SimulationPhase::Completed;
        self.frame_anchor = None;
        self.break_timer = None;

        self.state.is_running = false;
        self.state.progress_pct = 100.0;
        self.state.distance_remaining_km = 0.0;
        self.state.current_speed_kmh = 0.0;
        self.state.eta_min = 0.0;

        info!(
            elapsed_min = self.state.elapsed_min,
            breaks = self.state.breaks,
            "Simulation complete"
        );

        if let Some(run) = self.run.as_mut() {
            run.observer.on_update(&self.state);
            run.observer.on_complete();
        }
    }

    fn notify_update(&mut self) {
        if let Some(run) = self.run.as_mut() {
            run.observer.on_update(&self.state);
        }
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("phase", &self.phase)
            .field("covered_km", &self.covered_km)
            .field("total_km", &self.total_km())
            .field("next_deadline", &self.next_deadline())
            .finish_non_exhaustive()
    }
}

/// Recompute the geometry-derived parts of the snapshot.
fn refresh_route_metrics(run: &ActiveRun, covered_km: f64, state: &mut SimulationState) {
    let total_km = run.route.total_km();
    let remaining_km = (total_km - covered_km).max(0.0);

    state.current_position = Some(run.route.position_at(covered_km));
    state.heading_deg = run.route.heading_at(covered_km);
    state.progress_pct = progress_pct(covered_km, total_km);
    state.distance_remaining_km = remaining_km;
    state.eta_min = remaining_km / run.vehicle.avg_speed_kmh * 60.0;
}

/// Real time to spend in a rest stop, bounded by `ceiling`.
fn break_wait(real_ms: f64, ceiling: Duration) -> Duration {
    let ceiling_ms = ceiling.as_secs_f64() * 1000.0;
    if real_ms.is_nan() || real_ms >= ceiling_ms {
        return ceiling;
    }
    if real_ms <= 0.0 {
        return Duration::ZERO;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let micros = (real_ms * 1000.0).round() as u64;
    Duration::from_micros(micros)
}

/// `100 * covered / total`, clamped; a zero-length route counts as done.
fn progress_pct(covered_km: f64, total_km: f64) -> f64 {
    if total_km > 0.0 {
        (covered_km / total_km * 100.0).clamp(0.0, 100.0)
    } else {
        100.0
    }
}
