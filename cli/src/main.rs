#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use rigpose::camera::Point;
use rigpose::config::PoseConfig;
use rigpose::engine::{Action, PoseEngine};
use rigpose::error::{LocomotionError, PoseError, SolveError};
use rigpose::fk::LengthOverrides;
use rigpose::ik::{self, Rig};
use rigpose::input::{ControlMode, PointerEvent};
use rigpose::locomotion::constants::DEFAULT_MIN_CONFIDENCE;
use rigpose::locomotion::{self, LocomotionAction, LocomotionTuning, MotionConstants};
use rigpose::pose::{RootTransform, RotationMap};
use rigpose::skeleton::{Skeleton, SkeletonDef};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error(transparent)]
    Pose(#[from] PoseError),
    #[error(transparent)]
    Locomotion(#[from] LocomotionError),
    #[error("solve failed: {0}")]
    Solve(#[from] SolveError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "rigpose-cli", about = "Pose engine tooling: solves, replays and locomotion tuning")]
struct Cli {
    /// Engine config JSON; RIGPOSE_* variables override it.
    #[arg(long, env = "RIGPOSE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Skeleton definition JSON; defaults to the built-in humanoid.
    #[arg(long, env = "RIGPOSE_SKELETON", global = true)]
    skeleton: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the movement payload for a locomotion shortcut.
    Blueprint(BlueprintArgs),
    /// Derive locomotion constants from OpenPose-style keypoint frames.
    Constants(ConstantsArgs),
    /// Solve one chain toward a world-space target from the rest pose.
    Solve(SolveArgs),
    /// Replay a pointer event script through the engine.
    Replay(ReplayArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Ik,
    Fk,
}

impl From<ModeArg> for ControlMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Ik => Self::Ik,
            ModeArg::Fk => Self::Fk,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    /// A TypeScript `LOCOMOTION_TUNING` module.
    Ts,
    Table,
}

#[derive(Args, Debug)]
struct BlueprintArgs {
    #[arg(long, value_parser = parse_action)]
    action: LocomotionAction,

    #[arg(long, value_enum, default_value = "ik")]
    mode: ModeArg,

    /// Start from constants derived from these keypoint frames.
    #[arg(long)]
    from_frames: Option<PathBuf>,

    #[arg(long)]
    stride: Option<f64>,
    #[arg(long)]
    lift: Option<f64>,
    #[arg(long)]
    jump_height: Option<f64>,
    #[arg(long)]
    nudge_step: Option<f64>,
    #[arg(long)]
    crouch_drop: Option<f64>,
    #[arg(long)]
    dash_distance: Option<f64>,
}

#[derive(Args, Debug)]
struct ConstantsArgs {
    input: PathBuf,

    #[arg(long, default_value_t = DEFAULT_MIN_CONFIDENCE)]
    min_confidence: f64,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct SolveArgs {
    #[arg(long)]
    chain: String,
    #[arg(long)]
    x: f64,
    #[arg(long)]
    y: f64,
    #[arg(long, default_value_t = 0.0)]
    root_x: f64,
    #[arg(long, default_value_t = 0.0)]
    root_y: f64,
}

#[derive(Args, Debug)]
struct ReplayArgs {
    script: PathBuf,
}

/// One step of a replay script.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayEvent {
    Down { x: f64, y: f64, t: f64 },
    Move { x: f64, y: f64, t: f64 },
    Up { x: f64, y: f64, t: f64 },
    Leave { x: f64, y: f64, t: f64 },
    Jump,
    Mode { mode: ControlMode, t: f64 },
    Root {
        x: f64,
        y: f64,
        #[serde(default)]
        angle: f64,
    },
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    events: usize,
    pose_updates: usize,
    root: RootTransform,
    rotations: BTreeMap<String, f64>,
    resolved_targets: BTreeMap<String, Point>,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Blueprint(args) => print_json(&run_blueprint(&args)?),
        Command::Constants(args) => {
            let constants = derive_constants(&args.input, args.min_confidence)?;
            match args.format {
                OutputFormat::Json => print_json(&serde_json::to_value(constants)?),
                OutputFormat::Ts => {
                    println!("{}", render_ts(&constants));
                    Ok(())
                }
                OutputFormat::Table => {
                    println!("{}", render_table(&constants));
                    Ok(())
                }
            }
        }
        Command::Solve(args) => {
            let skeleton = load_skeleton(cli.skeleton.as_deref())?;
            let config = load_config(cli.config.as_deref())?;
            print_json(&run_solve(&skeleton, &config, &args)?)
        }
        Command::Replay(args) => {
            let skeleton = load_skeleton(cli.skeleton.as_deref())?;
            let config = load_config(cli.config.as_deref())?;
            let events: Vec<ReplayEvent> = serde_json::from_str(&read(&args.script)?)?;
            let mut engine = PoseEngine::new(skeleton, config)?;
            print_json(&serde_json::to_value(replay(&mut engine, &events))?)
        }
    }
}

// =============================================================================
// COMMANDS
// =============================================================================

fn run_blueprint(args: &BlueprintArgs) -> Result<Value, CliError> {
    let base = match &args.from_frames {
        Some(path) => LocomotionTuning::from_constants(&derive_constants(path, DEFAULT_MIN_CONFIDENCE)?),
        None => LocomotionTuning::default(),
    };
    let tuning = LocomotionTuning {
        stride: args.stride.unwrap_or(base.stride),
        lift: args.lift.unwrap_or(base.lift),
        jump_height: args.jump_height.unwrap_or(base.jump_height),
        nudge_step: args.nudge_step.unwrap_or(base.nudge_step),
        crouch_drop: args.crouch_drop.unwrap_or(base.crouch_drop),
        dash_distance: args.dash_distance.unwrap_or(base.dash_distance),
    };
    let blueprint = locomotion::blueprint(args.action, args.mode.into(), &tuning);
    Ok(serde_json::to_value(blueprint)?)
}

fn derive_constants(path: &Path, min_confidence: f64) -> Result<MotionConstants, CliError> {
    let frames = locomotion::parse_frames(&read(path)?)?;
    Ok(locomotion::derive_motion_constants(&frames, min_confidence)?)
}

fn run_solve(skeleton: &Skeleton, config: &PoseConfig, args: &SolveArgs) -> Result<Value, CliError> {
    let id = skeleton.require_chain(&args.chain)?;
    let chain = skeleton.chain(id).ok_or(SolveError::UnknownChain(id))?;
    let overrides = LengthOverrides::new();
    let rig = Rig { skeleton, root: RootTransform::new(args.root_x, args.root_y, 0.0), overrides: &overrides };
    let rest = RotationMap::zeroed(skeleton.joint_count());
    let solution = ik::solve(&rig, chain, Point::new(args.x, args.y), &rest, &config.solver)?;
    tracing::info!(chain = %chain.name, iterations = solution.iterations, residual = solution.residual, "solved");
    Ok(json!({
        "chain": chain.name,
        "rotations": solution.rotations.named(skeleton),
        "resolved_target": solution.resolved_target,
        "iterations": solution.iterations,
        "residual": solution.residual,
    }))
}

fn replay(engine: &mut PoseEngine, events: &[ReplayEvent]) -> ReplayReport {
    let mut pose_updates = 0;
    for event in events {
        let actions = match *event {
            ReplayEvent::Down { x, y, t } => engine.on_pointer_down(PointerEvent::new(x, y, t)),
            ReplayEvent::Move { x, y, t } => engine.on_pointer_move(PointerEvent::new(x, y, t)),
            ReplayEvent::Up { x, y, t } => engine.on_pointer_up(PointerEvent::new(x, y, t)),
            ReplayEvent::Leave { x, y, t } => engine.on_pointer_leave(PointerEvent::new(x, y, t)),
            ReplayEvent::Jump => {
                engine.trigger_jump();
                Vec::new()
            }
            ReplayEvent::Mode { mode, t } => engine.set_control_mode(mode, t),
            ReplayEvent::Root { x, y, angle } => {
                engine.set_root(RootTransform::new(x, y, angle));
                Vec::new()
            }
        };
        pose_updates += actions.iter().filter(|a| matches!(a, Action::PoseUpdated(_))).count();
    }
    tracing::info!(events = events.len(), pose_updates, "replay finished");

    let skeleton = engine.skeleton();
    let resolved_targets = engine
        .resolved_targets()
        .iter()
        .filter_map(|(&id, &target)| skeleton.chain(id).map(|c| (c.name.clone(), target)))
        .collect();
    ReplayReport {
        events: events.len(),
        pose_updates,
        root: engine.root(),
        rotations: engine.named_rotations(),
        resolved_targets,
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_action(raw: &str) -> Result<LocomotionAction, String> {
    raw.parse().map_err(|err: LocomotionError| err.to_string())
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })
}

fn load_config(path: Option<&Path>) -> Result<PoseConfig, CliError> {
    let config = match path {
        Some(path) => PoseConfig::from_json_str(&read(path)?)?,
        None => PoseConfig::default(),
    };
    Ok(config.with_env()?)
}

fn load_skeleton(path: Option<&Path>) -> Result<Skeleton, CliError> {
    match path {
        Some(path) => Ok(Skeleton::from_def(&SkeletonDef::from_json_str(&read(path)?)?)?),
        None => Ok(Skeleton::humanoid()),
    }
}

fn render_table(constants: &MotionConstants) -> String {
    constants.entries().iter().map(|(name, value)| format!("{name:<24} {value:>8.2}")).collect::<Vec<_>>().join("\n")
}

fn render_ts(constants: &MotionConstants) -> String {
    let mut lines = vec!["// Generated from OpenPose-style frames".to_owned(), "export const LOCOMOTION_TUNING = {".to_owned()];
    lines.extend(constants.entries().iter().map(|(name, value)| format!("  {name}: {value:?},")));
    lines.push("} as const;".to_owned());
    lines.join("\n")
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
