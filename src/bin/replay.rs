use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Env;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, Duration};

use wayfinder_rs::engine::{CameraDirective, NavEvent, NavigationEngine};
use wayfinder_rs::geodesy;
use wayfinder_rs::route::{FixedRouteProvider, Route, RouteResponse};
use wayfinder_rs::runtime::{NavInput, NavigationDriver};
use wayfinder_rs::session::{SessionEvent, SessionState};
use wayfinder_rs::types::{Destination, HeadingSample, PositionSample};
use wayfinder_rs::NavConfig;

#[derive(Parser, Debug)]
#[command(name = "wayfinder")]
#[command(about = "Campus navigation core - trace replay and walk simulation", long_about = None)]
struct Args {
    /// Navigation config JSON (defaults when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded input trace (*.json or *.json.gz)
    Replay {
        #[arg(long)]
        trace: PathBuf,

        /// Also print camera follow directives
        #[arg(long, default_value_t = false)]
        verbose: bool,
    },
    /// Walk along a route and print the guidance it produces
    Simulate {
        /// Route JSON: { "coordinates": [{"x": lon, "y": lat}, ...] }
        #[arg(long)]
        route: PathBuf,

        /// Walking speed (m/s)
        #[arg(long, default_value = "1.4")]
        speed: f64,

        /// Position fixes per second
        #[arg(long, default_value = "1.0")]
        rate: f64,

        /// Pace fixes in wall-clock time instead of as fast as possible
        #[arg(long, default_value_t = false)]
        realtime: bool,
    },
}

#[derive(Deserialize)]
struct TraceEvent {
    /// Seconds since trace start
    t: f64,
    #[serde(flatten)]
    input: NavInput,
}

#[derive(Deserialize)]
struct TraceFile {
    route: RouteResponse,
    /// Routed to and started on the first accepted fix, for traces that
    /// record sensor input only.
    #[serde(default)]
    destination: Option<Destination>,
    events: Vec<TraceEvent>,
}

fn open_json(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<NavConfig> {
    match path {
        Some(path) => Ok(NavConfig::load(path)?),
        None => Ok(NavConfig::default()),
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn event_kind(event: &NavEvent) -> &'static str {
    match event {
        NavEvent::Session(SessionEvent::RoutePreviewed { .. }) => "route_previewed",
        NavEvent::Session(SessionEvent::NavigationStarted) => "navigation_started",
        NavEvent::Session(SessionEvent::Interrupted) => "interrupted",
        NavEvent::Session(SessionEvent::Resumed) => "resumed",
        NavEvent::Session(SessionEvent::Arrived { .. }) => "arrived",
        NavEvent::Session(SessionEvent::Cancelled) => "cancelled",
        NavEvent::Guidance(_) => "guidance",
        NavEvent::Camera(_) => "camera",
        NavEvent::TurnChanged(_) => "turn_changed",
        NavEvent::PositionUnavailable(_) => "position_unavailable",
        NavEvent::RouteFailed { .. } => "route_failed",
    }
}

fn print_events(t: f64, events: &[NavEvent], verbose: bool, counts: &mut BTreeMap<&'static str, u64>) -> Result<()> {
    for event in events {
        *counts.entry(event_kind(event)).or_insert(0) += 1;
        if !verbose && matches!(event, NavEvent::Camera(CameraDirective::Follow { .. })) {
            continue;
        }
        println!("[{}] t={:>7.2}s {}", ts_now(), t, serde_json::to_string(event)?);
    }
    Ok(())
}

fn apply(engine: &mut NavigationEngine, input: NavInput, t: f64) -> Vec<NavEvent> {
    match input {
        NavInput::Position { sample } => engine.on_position(sample, t),
        NavInput::PositionError { kind } => engine.on_position_error(kind),
        NavInput::Heading { sample } => engine.on_heading(sample),
        NavInput::Frame { frame } => engine.on_frame(frame),
        NavInput::CameraInteractionStart => engine.on_camera_interaction_start(t),
        NavInput::CameraInteractionEnd => engine.on_camera_interaction_end(t),
        NavInput::RequestRoute { destination } => match engine.request_route(destination) {
            Ok(events) => events,
            Err(e) => vec![NavEvent::RouteFailed {
                message: e.to_string(),
            }],
        },
        NavInput::StartNavigating => match engine.start_navigating() {
            Ok(events) => events,
            Err(e) => {
                log::warn!("t={:.2}s {}", t, e);
                Vec::new()
            }
        },
        NavInput::Cancel => engine.cancel(),
        NavInput::ToggleSnapToRoad => {
            let on = engine.toggle_snap_to_road();
            log::info!("t={:.2}s snap to road {}", t, if on { "on" } else { "off" });
            Vec::new()
        }
        NavInput::StartAr => engine.start_ar(),
        NavInput::EndAr => engine.end_ar(),
        NavInput::Shutdown => Vec::new(),
    }
}

/// Drive the engine directly on trace time, firing the resume timer
/// between inputs when it falls due.
fn replay(trace_path: &Path, config: NavConfig, verbose: bool) -> Result<serde_json::Value> {
    let trace: TraceFile = serde_json::from_reader(open_json(trace_path)?)
        .with_context(|| format!("parsing {}", trace_path.display()))?;
    println!(
        "[{}] Replaying {} ({} events, {} route points)",
        ts_now(),
        trace_path.display(),
        trace.events.len(),
        trace.route.coordinates.len()
    );
    let mut summary = replay_trace(trace, config, verbose)?;
    summary["trace"] = json!(trace_path.display().to_string());
    Ok(summary)
}

fn replay_trace(trace: TraceFile, config: NavConfig, verbose: bool) -> Result<serde_json::Value> {
    if trace.events.windows(2).any(|w| w[1].t < w[0].t) {
        bail!("trace events must be sorted by time");
    }
    if let Some(destination) = &trace.destination {
        println!("[{}] Destination: {}", ts_now(), destination.name);
    }

    let mut engine = NavigationEngine::new(config, Box::new(FixedRouteProvider::new(trace.route)));
    let mut pending = trace.destination.clone();
    let mut counts = BTreeMap::new();
    let mut last_t = 0.0;

    for TraceEvent { t, input } in trace.events {
        while let Some(deadline) = engine.next_deadline().filter(|d| *d <= t) {
            let events = engine.poll_timers(deadline);
            print_events(deadline, &events, verbose, &mut counts)?;
        }
        let mut events = apply(&mut engine, input, t);
        if engine.session().user_position().is_some() {
            if let Some(destination) = pending.take() {
                events.extend(apply(&mut engine, NavInput::RequestRoute { destination }, t));
                if engine.state() == SessionState::PreviewingRoute {
                    events.extend(apply(&mut engine, NavInput::StartNavigating, t));
                }
            }
        }
        print_events(t, &events, verbose, &mut counts)?;
        last_t = t;
    }
    if let Some(deadline) = engine.next_deadline() {
        let events = engine.poll_timers(deadline);
        print_events(deadline, &events, verbose, &mut counts)?;
    }
    if let Some(destination) = pending {
        log::warn!("No usable fix in trace, never routed to {}", destination.name);
    }

    Ok(json!({
        "destination": trace.destination.map(|d| d.name),
        "duration_s": last_t,
        "event_counts": counts,
        "final": engine.snapshot(),
    }))
}

/// Point `distance` meters along the route and the bearing of its segment.
fn walk_point(route: &Route, distance: f64) -> (geo::Coord<f64>, f64) {
    let coords = route.coords();
    let distance = distance.clamp(0.0, route.length_m());
    let seg = (0..coords.len() - 1)
        .find(|&i| route.cumulative_distance(i + 1) >= distance)
        .unwrap_or(coords.len() - 2);
    let (a, b) = (coords[seg], coords[seg + 1]);
    let start = route.cumulative_distance(seg);
    let len = route.cumulative_distance(seg + 1) - start;
    let f = if len > 0.0 { (distance - start) / len } else { 0.0 };
    let point = geo::Coord {
        x: a.x + (b.x - a.x) * f,
        y: a.y + (b.y - a.y) * f,
    };
    (point, geodesy::bearing_deg(a, b))
}

/// Walk the route through the async driver, one fix per `1/rate` seconds of
/// simulated time.
async fn simulate(
    route_path: &Path,
    config: NavConfig,
    speed: f64,
    rate: f64,
    realtime: bool,
) -> Result<serde_json::Value> {
    if !(speed > 0.0 && rate > 0.0) {
        bail!("--speed and --rate must be positive");
    }
    let response: RouteResponse = serde_json::from_reader(open_json(route_path)?)
        .with_context(|| format!("parsing {}", route_path.display()))?;
    let route = Route::from_response(response.clone())?;
    let end = route.destination();
    println!(
        "[{}] Simulating {:.0} m walk at {:.1} m/s ({} points)",
        ts_now(),
        route.length_m(),
        speed,
        route.len()
    );

    let engine = NavigationEngine::new(config, Box::new(FixedRouteProvider::new(response)));
    let mut handle = NavigationDriver::spawn(engine, 64);
    let mut counts = BTreeMap::new();

    let (start, _) = walk_point(&route, 0.0);
    let mut inputs = vec![
        NavInput::Position {
            sample: PositionSample::new(0.0, start.x, start.y, 5.0),
        },
        NavInput::RequestRoute {
            destination: Destination::new("route end", end.x, end.y),
        },
        NavInput::StartNavigating,
    ];

    let step_m = speed / rate;
    let steps = (route.length_m() / step_m).ceil() as usize + 2;
    for i in 1..=steps {
        let t = i as f64 / rate;
        let (point, bearing) = walk_point(&route, i as f64 * step_m);
        inputs.push(NavInput::Heading {
            sample: HeadingSample::Compass(bearing),
        });
        inputs.push(NavInput::Position {
            sample: PositionSample::new(t, point.x, point.y, 5.0),
        });
    }

    let mut arrived = false;
    let mut last_instruction = None;
    for input in inputs {
        let is_fix = matches!(input, NavInput::Position { .. });
        handle.inputs.send(input).await?;
        let output = handle
            .outputs
            .recv()
            .await
            .context("navigation driver stopped")?;
        print_events(output.time, &output.events, false, &mut counts)?;

        if output.snapshot.instruction != last_instruction {
            if let Some(instruction) = output.snapshot.instruction.as_deref() {
                println!("[{}] {}", ts_now(), instruction);
            }
            last_instruction = output.snapshot.instruction.clone();
        }
        if output
            .events
            .iter()
            .any(|e| matches!(e, NavEvent::Session(SessionEvent::Arrived { .. })))
        {
            arrived = true;
        }
        if arrived && output.snapshot.state == SessionState::Idle {
            break;
        }
        if realtime && is_fix {
            sleep(Duration::from_secs_f64(1.0 / rate)).await;
        }
    }

    handle.inputs.send(NavInput::Shutdown).await?;
    let engine = handle.task.await?;

    Ok(json!({
        "route": route_path.display().to_string(),
        "route_length_m": route.length_m(),
        "arrived": arrived,
        "event_counts": counts,
        "final": engine.snapshot(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let summary = match args.command {
        Command::Replay { trace, verbose } => replay(&trace, config, verbose)?,
        Command::Simulate {
            route,
            speed,
            rate,
            realtime,
        } => simulate(&route, config, speed, rate, realtime).await?,
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
