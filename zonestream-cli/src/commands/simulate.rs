//! Simulated hand-off command.
//!
//! Builds a [`ZoneManager`] over simulated collaborators, enters the start
//! zone and drives a transition to the destination frame by frame, walking
//! the player through the sequence the way a player would.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;
use zonestream::coord::Vec2;
use zonestream::debug::format_size;
use zonestream::host::simulated::{
    RecordingPresenter, RecordingSpawner, ScriptedInput, SimulatedLoader, StaticInventory,
};
use zonestream::host::FrameInput;
use zonestream::registry::TransitionKind;
use zonestream::transition::HandoffEvent;
use zonestream::{
    DebugSnapshot, StreamingConfig, TransitionStart, WorldDefinition, ZoneId, ZoneManager,
};

use crate::error::CliError;

/// Simulated frame length.
const FRAME: Duration = Duration::from_millis(16);

/// Walking speed through corridors and vents, in units per second.
const WALK_SPEED: f32 = 4.0;

/// Frame on which `--cancel` presses cancel.
const CANCEL_FRAME: u64 = 3;

/// Arguments for `simulate`.
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// World definition file (JSON)
    #[arg(short, long)]
    pub world: PathBuf,

    /// Zone to enter first
    #[arg(short, long)]
    pub start: String,

    /// Destination zone
    #[arg(short, long)]
    pub to: String,

    /// Press cancel shortly after the transition starts
    #[arg(long)]
    pub cancel: bool,

    /// Override the memory budget (megabytes)
    #[arg(long)]
    pub budget_mb: Option<u64>,

    /// Simulated load latency per zone (milliseconds)
    #[arg(long, default_value = "120")]
    pub latency_ms: u64,

    /// Give up after this many frames
    #[arg(long, default_value = "1200")]
    pub frames: u64,

    /// Log a status line every N frames
    #[arg(long, default_value = "30")]
    pub report_every: u64,

    /// Items in the player's inventory (repeatable)
    #[arg(long = "item")]
    pub items: Vec<String>,

    /// Print the final debug snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

/// How a simulation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No transition linked the zones; the destination was loaded directly.
    Direct,
    /// The hand-off ended with this event.
    Finished(HandoffEvent),
    /// The frame limit ran out mid hand-off.
    TimedOut,
}

/// Result of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub outcome: Outcome,
    pub frames: u64,
    pub snapshot: DebugSnapshot,
}

/// Run the `simulate` command.
pub fn run(args: SimulateArgs, config: StreamingConfig) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let json = args.json;
    let summary = runtime.block_on(simulate(args, config))?;
    print_summary(&summary);

    if json {
        let text = summary
            .snapshot
            .to_json()
            .map_err(|e| CliError::Output(e.to_string()))?;
        println!("{}", text);
    }
    Ok(())
}

/// Enter `args.start` and drive a transition to `args.to`.
pub async fn simulate(
    args: SimulateArgs,
    config: StreamingConfig,
) -> Result<SimulationSummary, CliError> {
    let registry = Arc::new(WorldDefinition::from_path(&args.world)?.into_registry()?);
    let config = match args.budget_mb {
        Some(mb) => config.with_budget_limit_mb(mb),
        None => config,
    };

    let input = Arc::new(ScriptedInput::new());
    let mut manager = ZoneManager::builder(registry.clone())
        .config(config)
        .loader(Arc::new(
            SimulatedLoader::new().with_latency(Duration::from_millis(args.latency_ms)),
        ))
        .spawner(Arc::new(RecordingSpawner::new()))
        .presenter(Arc::new(RecordingPresenter::new()))
        .input(input.clone())
        .inventory(Arc::new(StaticInventory::new(args.items.iter().cloned())))
        .build()?;

    let start = ZoneId::from(args.start.as_str());
    let to = ZoneId::from(args.to.as_str());

    manager.enter_zone(&start).await?;
    info!(
        zone = %start,
        memory = %manager.debug_snapshot().memory_usage_human(),
        "Entered start zone"
    );

    let kind = match manager.request_transition(&start, &to).await? {
        TransitionStart::Direct => {
            return Ok(SimulationSummary {
                outcome: Outcome::Direct,
                frames: 0,
                snapshot: manager.debug_snapshot(),
            });
        }
        TransitionStart::Interactive(id) => match registry.transition(&id) {
            Some(definition) => definition.kind,
            None => return Err(CliError::Runtime(format!("transition {} vanished", id))),
        },
    };
    info!(kind = kind.name(), from = %start, to = %to, "Transition started");

    let mut walker = Walker::new(kind, args.cancel);
    let report_every = args.report_every.max(1);

    for frame in 0..args.frames {
        if let Some(input_frame) = walker.input_for(frame) {
            input.push(input_frame);
        }

        let report = manager.tick(FRAME, walker.position());
        if frame % report_every == 0 {
            let snapshot = manager.debug_snapshot();
            info!(
                frame,
                memory = %snapshot.memory_usage_human(),
                phase = ?snapshot.active_transition.as_ref().map(|t| t.phase),
                progress = snapshot.active_transition.as_ref().map(|t| t.progress).unwrap_or(0.0),
                background_loads = snapshot.background_loads,
                "Simulation status"
            );
        }

        if let Some(event) = report.handoff {
            return Ok(SimulationSummary {
                outcome: Outcome::Finished(event),
                frames: frame + 1,
                snapshot: manager.debug_snapshot(),
            });
        }

        walker.advance(FRAME);
        tokio::time::sleep(FRAME).await;
    }

    Ok(SimulationSummary {
        outcome: Outcome::TimedOut,
        frames: args.frames,
        snapshot: manager.debug_snapshot(),
    })
}

fn print_summary(summary: &SimulationSummary) {
    let outcome = match &summary.outcome {
        Outcome::Direct => "No transition links the zones; loaded the destination directly".to_string(),
        Outcome::Finished(HandoffEvent::Completed { to, pruned, .. }) => {
            let pruned: Vec<&str> = pruned.iter().map(|z| z.as_str()).collect();
            if pruned.is_empty() {
                format!("Arrived in {}", to)
            } else {
                format!("Arrived in {} (pruned {})", to, pruned.join(", "))
            }
        }
        Outcome::Finished(HandoffEvent::Cancelled { from, .. }) => {
            format!("Cancelled, stayed in {}", from)
        }
        Outcome::Finished(HandoffEvent::Failed { from, error, .. }) => {
            format!("Failed ({}), stayed in {}", error, from)
        }
        Outcome::TimedOut => "Frame limit reached before the hand-off ended".to_string(),
    };
    let snapshot = &summary.snapshot;

    println!("{} after {} frame(s)", outcome, summary.frames);
    println!("Memory: {}", snapshot.memory_usage_human());
    println!();
    println!("  {:<16} {:<11} {:>10}  active", "zone", "state", "size");
    for zone in &snapshot.zones {
        println!(
            "  {:<16} {:<11} {:>10}  {}",
            zone.zone.as_str(),
            zone.state.to_string(),
            format_size(zone.size_bytes),
            if zone.is_active { "*" } else { "" }
        );
    }
    println!();
    println!(
        "Loads issued {}, coalesced {}, failed {}; evictions {}; overruns {}",
        snapshot.lifecycle.loads_issued,
        snapshot.lifecycle.loads_coalesced,
        snapshot.lifecycle.loads_failed,
        snapshot.lifecycle.evictions,
        snapshot.lifecycle.overruns
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted player
// ─────────────────────────────────────────────────────────────────────────────

/// Moves a simulated player through a transition sequence.
#[derive(Debug)]
struct Walker {
    kind: TransitionKind,
    cancel: bool,
    distance: f32,
    confirmed: bool,
}

impl Walker {
    fn new(kind: TransitionKind, cancel: bool) -> Self {
        Self {
            kind,
            cancel,
            distance: 0.0,
            confirmed: false,
        }
    }

    /// Sequence-local position.
    fn position(&self) -> Vec2 {
        Vec2::new(self.distance, 0.0)
    }

    fn input_for(&mut self, frame: u64) -> Option<FrameInput> {
        if self.cancel {
            return (frame == CANCEL_FRAME).then(FrameInput::cancel);
        }
        if self.confirmed {
            return None;
        }

        let at_exit = match self.kind.length() {
            Some(length) => self.distance >= length,
            // Elevators take the proposed stop straight away
            None => true,
        };
        let wants_confirm = match self.kind {
            TransitionKind::Corridor(_) | TransitionKind::Elevator(_) => at_exit,
            TransitionKind::Vent(_) => false,
        };
        if wants_confirm {
            self.confirmed = true;
            Some(FrameInput::confirm())
        } else {
            None
        }
    }

    fn advance(&mut self, dt: Duration) {
        if let Some(length) = self.kind.length() {
            self.distance = (self.distance + WALK_SPEED * dt.as_secs_f32()).min(length);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonestream::registry::{CorridorParams, ElevatorParams, VentParams};

    const WORLD: &str = r#"{
        "zones": [
            { "id": "atrium", "size": "large" },
            { "id": "lab", "size": "medium" },
            { "id": "vault", "size": "small" },
            { "id": "island", "size": "tiny" }
        ],
        "transitions": [
            { "id": "hall", "kind": "corridor", "length": 1.0, "zones": ["atrium", "lab"] },
            { "id": "shaft", "kind": "vent", "length": 1.0, "zones": ["lab", "vault"] }
        ]
    }"#;

    fn args(dir: &tempfile::TempDir, start: &str, to: &str) -> SimulateArgs {
        let world = dir.path().join("world.json");
        std::fs::write(&world, WORLD).unwrap();
        SimulateArgs {
            world,
            start: start.to_string(),
            to: to.to_string(),
            cancel: false,
            budget_mb: None,
            latency_ms: 0,
            frames: 400,
            report_every: 30,
            items: Vec::new(),
            json: false,
        }
    }

    fn block_on(args: SimulateArgs) -> Result<SimulationSummary, CliError> {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
            .block_on(simulate(args, StreamingConfig::default()))
    }

    #[test]
    fn test_walker_corridor_confirms_at_exit() {
        let mut walker = Walker::new(TransitionKind::Corridor(CorridorParams::new(0.1)), false);
        assert_eq!(walker.input_for(0), None);

        walker.advance(Duration::from_secs(1));
        assert_eq!(walker.position(), Vec2::new(0.1, 0.0));
        assert_eq!(walker.input_for(1), Some(FrameInput::confirm()));
        assert_eq!(walker.input_for(2), None);
    }

    #[test]
    fn test_walker_elevator_confirms_immediately() {
        let mut walker = Walker::new(TransitionKind::Elevator(ElevatorParams::default()), false);
        assert_eq!(walker.input_for(0), Some(FrameInput::confirm()));
    }

    #[test]
    fn test_walker_vent_never_confirms() {
        let mut walker = Walker::new(TransitionKind::Vent(VentParams::new(1.0)), false);
        walker.advance(Duration::from_secs(5));
        assert_eq!(walker.input_for(10), None);
    }

    #[test]
    fn test_walker_cancel() {
        let mut walker = Walker::new(TransitionKind::Corridor(CorridorParams::new(5.0)), true);
        assert_eq!(walker.input_for(0), None);
        assert_eq!(walker.input_for(CANCEL_FRAME), Some(FrameInput::cancel()));
    }

    #[test]
    fn test_simulate_corridor_arrives() {
        let dir = tempfile::tempdir().unwrap();
        let summary = block_on(args(&dir, "atrium", "lab")).unwrap();

        assert!(matches!(
            summary.outcome,
            Outcome::Finished(HandoffEvent::Completed { .. })
        ));
        assert_eq!(summary.snapshot.active_zone, Some(ZoneId::from("lab")));
    }

    #[test]
    fn test_simulate_cancel_stays() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir, "atrium", "lab");
        args.cancel = true;

        let summary = block_on(args).unwrap();

        assert!(matches!(
            summary.outcome,
            Outcome::Finished(HandoffEvent::Cancelled { .. })
        ));
        assert_eq!(summary.snapshot.active_zone, Some(ZoneId::from("atrium")));
    }

    #[test]
    fn test_simulate_unlinked_zones_load_directly() {
        let dir = tempfile::tempdir().unwrap();
        let summary = block_on(args(&dir, "atrium", "island")).unwrap();

        assert_eq!(summary.outcome, Outcome::Direct);
        assert_eq!(summary.snapshot.active_zone, Some(ZoneId::from("island")));
    }

    #[test]
    fn test_simulate_unknown_zone() {
        let dir = tempfile::tempdir().unwrap();
        let err = block_on(args(&dir, "nowhere", "lab")).unwrap_err();
        assert!(matches!(err, CliError::Zone(_)));
    }
}
