//! Navigation Simulator CLI
//!
//! Drives a vehicle along a route between two directory locations, acting as
//! the frame scheduler for the simulation engine and optionally posting
//! telemetry pings.

use anyhow::{Context, Result};
use clap::Parser;
use nav_domain::{Coordinate, Route};
use nav_simulator::telemetry::DEFAULT_PING_INTERVAL;
use nav_simulator::{
    JsonFileStore, MemoryStore, NavigationSession, SelectionStore, SessionEvent, SimulatorConfig,
    TelemetryPing, TelemetryReporter, locations,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Points inserted per leg of the provisional straight-line route.
const PROVISIONAL_STEPS: usize = 19;

#[derive(Parser, Debug)]
#[command(name = "nav-simulator")]
#[command(about = "Simulate a vehicle driving a route for the navigation head unit")]
struct Args {
    /// Start location id (defaults to the saved selection, then "phx")
    #[arg(short, long)]
    from: Option<String>,

    /// Destination location id (defaults to the saved selection, then "tucson")
    #[arg(short, long)]
    to: Option<String>,

    /// Vehicle category: car, truck or motorcycle
    #[arg(short, long)]
    vehicle: Option<String>,

    /// Simulation speed multiplier
    #[arg(short, long)]
    speed: Option<f64>,

    /// Frame interval in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    frame_ms: Option<u64>,

    /// JSON array of [lon, lat] pairs to drive instead of the provisional route
    #[arg(long)]
    route_file: Option<PathBuf>,

    /// Road-following route hot-swapped in after --swap-after-ms
    #[arg(long)]
    refined_route_file: Option<PathBuf>,

    /// Delay before the refined route replaces the initial one
    #[arg(long, default_value = "2000")]
    swap_after_ms: u64,

    /// Telemetry ingest endpoint
    #[arg(long)]
    telemetry_url: Option<String>,

    /// Selection store file
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Seed for reproducible rest stops
    #[arg(long)]
    seed: Option<u64>,

    /// Dry run (don't post telemetry)
    #[arg(long)]
    dry_run: bool,
}

/// Operator command read from stdin.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Pause,
    Resume,
    Stop,
    Speed(f64),
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim() {
        "p" => Some(Command::Pause),
        "r" => Some(Command::Resume),
        "s" => Some(Command::Stop),
        "q" => Some(Command::Quit),
        other => other
            .strip_prefix('x')
            .and_then(|n| n.trim().parse().ok())
            .map(Command::Speed),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = SimulatorConfig::from_env();
    if let Some(speed) = args.speed {
        config.speed_multiplier = speed;
    }
    if let Some(ms) = args.frame_ms {
        config.frame_interval = Duration::from_millis(ms);
    }
    if args.telemetry_url.is_some() {
        config.telemetry_url.clone_from(&args.telemetry_url);
    }
    if args.state_file.is_some() {
        config.state_file.clone_from(&args.state_file);
    }

    // Initialize logging
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("nav_simulator={}", config.log_level).parse()?);
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let store: Box<dyn SelectionStore> = match &config.state_file {
        Some(path) => Box::new(JsonFileStore::new(path)),
        None => Box::new(MemoryStore::new()),
    };
    let mut session = NavigationSession::restore(config.engine_config(), store);
    if let Some(seed) = args.seed {
        session = session.with_seed(seed);
    }

    let from_id = args
        .from
        .clone()
        .or_else(|| session.start_id().map(str::to_string))
        .unwrap_or_else(|| "phx".to_string());
    let to_id = args
        .to
        .clone()
        .or_else(|| session.end_id().map(str::to_string))
        .unwrap_or_else(|| "tucson".to_string());
    let from = locations::find(&from_id)?;
    let to = locations::find(&to_id)?;
    session.set_start_id(from.id);
    session.set_end_id(to.id);

    if let Some(vehicle) = &args.vehicle {
        session.select_vehicle(vehicle, Instant::now())?;
    }
    session.set_speed_multiplier(config.speed_multiplier)?;

    let initial = match &args.route_file {
        Some(path) => load_route(path)?,
        None => Route::interpolated(&[from.coordinate, to.coordinate], PROVISIONAL_STEPS)?.into(),
    };
    session.set_road_geometry(initial)?;

    let mut refined = args
        .refined_route_file
        .as_deref()
        .map(load_route)
        .transpose()?;

    let reporter = config
        .telemetry_url
        .clone()
        .filter(|_| !args.dry_run)
        .map(TelemetryReporter::new);

    info!(
        session_id = %session.session_id(),
        from = from.name,
        to = to.name,
        vehicle = %session.vehicle().name,
        speed_multiplier = session.speed_multiplier(),
        frame_ms = u64::try_from(config.frame_interval.as_millis()).unwrap_or(u64::MAX),
        telemetry = reporter.as_ref().map_or("off", TelemetryReporter::url),
        "Starting navigation simulation"
    );

    let mut events = session.subscribe_events();
    let mut commands = spawn_stdin_reader();
    let mut stdin_open = true;

    let started_at = Instant::now();
    session.start_simulation(started_at)?;
    let swap_at = tokio::time::Instant::from_std(
        started_at + Duration::from_millis(args.swap_after_ms),
    );

    let mut frames = interval(config.frame_interval);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut reports = interval(DEFAULT_PING_INTERVAL);
    reports.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let break_deadline = session.next_deadline().map(tokio::time::Instant::from_std);

        tokio::select! {
            _ = frames.tick(), if session.wants_frame() => {
                session.tick(Instant::now());
            }

            () = sleep_until(break_deadline.unwrap_or(swap_at)), if break_deadline.is_some() => {
                session.tick(Instant::now());
            }

            () = sleep_until(swap_at), if refined.is_some() => {
                if let Some(points) = refined.take() {
                    session.set_road_geometry(points)?;
                }
            }

            _ = reports.tick() => {
                report_status(&session, reporter.as_ref());
            }

            line = commands.recv(), if stdin_open => {
                let Some(line) = line else {
                    debug!("stdin closed");
                    stdin_open = false;
                    continue;
                };
                match parse_command(&line) {
                    Some(Command::Pause) => {
                        session.pause(Instant::now());
                    }
                    Some(Command::Resume) => {
                        session.resume(Instant::now());
                    }
                    Some(Command::Speed(multiplier)) => {
                        if let Err(e) = session.set_speed_multiplier(multiplier) {
                            warn!(error = %e, "Speed change rejected");
                        }
                    }
                    Some(Command::Stop) => {
                        session.stop();
                        break;
                    }
                    Some(Command::Quit) => break,
                    None => warn!(input = %line.trim(), "Unknown command (p, r, s, x<N>, q)"),
                }
            }

            event = events.recv() => {
                match event {
                    Ok(SessionEvent::Completed) => break,
                    Ok(event) => info!(?event, "Session event"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "Session events dropped"),
                    Err(RecvError::Closed) => break,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                session.stop();
                break;
            }
        }
    }

    let state = session.state();
    info!(
        progress_pct = state.progress_pct,
        elapsed_min = state.elapsed_min,
        breaks = state.breaks,
        "Simulation finished"
    );
    for stop in &state.break_points {
        info!(
            lat = stop.position.latitude,
            lon = stop.position.longitude,
            duration_min = stop.duration_min,
            at = %stop.timestamp,
            "Break"
        );
    }

    Ok(())
}

/// Read a JSON array of `[lon, lat]` pairs.
fn load_route(path: &Path) -> Result<Vec<Coordinate>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading route file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing route file {}", path.display()))
}

/// Forward stdin lines from a plain thread so a pending read never blocks
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn report_status(session: &NavigationSession, reporter: Option<&TelemetryReporter>) {
    let state = session.state();
    info!(
        phase = session.phase().as_str(),
        progress_pct = state.progress_pct,
        speed_kmh = state.current_speed_kmh,
        remaining_km = state.distance_remaining_km,
        eta_min = state.eta_min,
        "Status"
    );

    let (Some(reporter), true) = (reporter, state.is_running) else {
        return;
    };
    if let Some(ping) = TelemetryPing::from_state(session.session_id(), &state) {
        let reporter = reporter.clone();
        tokio::spawn(async move {
            if let Err(err) = reporter.report(&ping).await {
                warn!(error = %err, "Failed to post telemetry");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("p"), Some(Command::Pause));
        assert_eq!(parse_command(" r \n"), Some(Command::Resume));
        assert_eq!(parse_command("s"), Some(Command::Stop));
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("x100"), Some(Command::Speed(100.0)));
        assert_eq!(parse_command("x 2.5"), Some(Command::Speed(2.5)));
        assert_eq!(parse_command("x"), None);
        assert_eq!(parse_command("jump"), None);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "nav-simulator",
            "--from",
            "mesa",
            "--vehicle",
            "truck",
            "--speed",
            "200",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.from.as_deref(), Some("mesa"));
        assert_eq!(args.speed, Some(200.0));
        assert_eq!(args.swap_after_ms, 2000);
        assert!(args.dry_run);

        assert!(Args::try_parse_from(["nav-simulator", "--frame-ms", "0"]).is_err());
    }

    #[test]
    fn test_load_route_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route.json");
        std::fs::write(&path, "[[-112.074, 33.4484], [-110.9747, 32.2226]]").unwrap();

        let points = load_route(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[1].latitude - 32.2226).abs() < f64::EPSILON);

        assert!(load_route(&dir.path().join("missing.json")).is_err());
    }
}
