#![allow(clippy::float_cmp)]

use super::*;

fn blueprint_args(action: LocomotionAction) -> BlueprintArgs {
    BlueprintArgs {
        action,
        mode: ModeArg::Ik,
        from_frames: None,
        stride: None,
        lift: None,
        jump_height: None,
        nudge_step: None,
        crouch_drop: None,
        dash_distance: None,
    }
}

fn humanoid_engine() -> PoseEngine {
    PoseEngine::new(Skeleton::humanoid(), PoseConfig::default()).unwrap()
}

// =============================================================
// Argument parsing
// =============================================================

#[test]
fn cli_parses_blueprint_flags() {
    let cli = Cli::try_parse_from(["rigpose-cli", "blueprint", "--action", "run_left", "--mode", "fk", "--stride", "40"])
        .unwrap();
    let Command::Blueprint(args) = cli.command else { panic!("expected blueprint") };
    assert_eq!(args.action, LocomotionAction::RunLeft);
    assert!(matches!(args.mode, ModeArg::Fk));
    assert_eq!(args.stride, Some(40.0));
}

#[test]
fn cli_rejects_unknown_action() {
    assert!(Cli::try_parse_from(["rigpose-cli", "blueprint", "--action", "moonwalk"]).is_err());
}

#[test]
fn cli_parses_global_config_after_subcommand() {
    let cli = Cli::try_parse_from(["rigpose-cli", "solve", "--chain", "l_leg", "--x", "1", "--y", "2", "--config", "c.json"])
        .unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("c.json")));
}

// =============================================================
// Commands
// =============================================================

#[test]
fn blueprint_flags_override_defaults() {
    let mut args = blueprint_args(LocomotionAction::WalkRight);
    args.stride = Some(50.0);
    let json = run_blueprint(&args).unwrap();
    assert_eq!(json["payload"]["ik_targets"]["swing_foot"]["dx"], 50.0);
    assert_eq!(json["payload"]["ik_targets"]["swing_foot"]["dy"], -26.0);
}

#[test]
fn solve_reaches_target_from_rest() {
    let args = SolveArgs { chain: "l_leg".into(), x: 130.0, y: 280.0, root_x: 100.0, root_y: 200.0 };
    let json = run_solve(&Skeleton::humanoid(), &PoseConfig::default(), &args).unwrap();
    assert_eq!(json["chain"], "l_leg");
    assert!(json["residual"].as_f64().unwrap() < 2.0);
    assert!(json["rotations"]["l_knee"].as_f64().unwrap() != 0.0);
}

#[test]
fn solve_unknown_chain_is_an_error() {
    let args = SolveArgs { chain: "tail".into(), x: 0.0, y: 0.0, root_x: 0.0, root_y: 0.0 };
    assert!(matches!(
        run_solve(&Skeleton::humanoid(), &PoseConfig::default(), &args),
        Err(CliError::Pose(PoseError::UnknownChain(_)))
    ));
}

#[test]
fn replay_script_drives_engine() {
    let script = r#"[
        { "type": "root", "x": 100, "y": 200 },
        { "type": "down", "x": 110, "y": 304, "t": 0 },
        { "type": "move", "x": 125, "y": 290, "t": 16 },
        { "type": "move", "x": 125, "y": 290, "t": 32 },
        { "type": "up", "x": 125, "y": 290, "t": 48 }
    ]"#;
    let events: Vec<ReplayEvent> = serde_json::from_str(script).unwrap();
    assert_eq!(events[0], ReplayEvent::Root { x: 100.0, y: 200.0, angle: 0.0 });

    let mut engine = humanoid_engine();
    let report = replay(&mut engine, &events);
    assert_eq!(report.events, 5);
    assert_eq!(report.pose_updates, 2);
    assert!(report.resolved_targets.contains_key("l_leg"));
    assert!(report.rotations.values().any(|deg| *deg != 0.0));
    assert!(engine.input().is_idle());
}

#[test]
fn replay_mode_and_jump_events_parse() {
    let events: Vec<ReplayEvent> =
        serde_json::from_str(r#"[{ "type": "mode", "mode": "fk", "t": 5 }, { "type": "jump" }]"#).unwrap();
    assert_eq!(events, vec![ReplayEvent::Mode { mode: ControlMode::Fk, t: 5.0 }, ReplayEvent::Jump]);
    let mut engine = humanoid_engine();
    replay(&mut engine, &events);
    assert_eq!(engine.config().control_mode, ControlMode::Fk);
}

fn sample_constants() -> MotionConstants {
    MotionConstants {
        walk_swing_forward_px: 35.28,
        walk_swing_lift_px: 14.0,
        run_swing_forward_px: 58.21,
        run_swing_lift_px: 20.0,
        jump_height_px: 25.2,
        crouch_root_drop_px: 25.2,
        dash_root_advance_px: 75.6,
        dash_foot_drive_px: 37.8,
        root_nudge_step_px: 8.0,
        reference_body_span_px: 150.0,
    }
}

#[test]
fn table_lists_every_constant() {
    let table = render_table(&sample_constants());
    assert_eq!(table.lines().count(), 10);
    assert!(table.lines().next().unwrap().starts_with("WALK_SWING_FORWARD_PX"));
    assert!(table.contains("35.28"));
}

#[test]
fn ts_output_is_a_const_module() {
    let ts = render_ts(&sample_constants());
    let lines: Vec<&str> = ts.lines().collect();
    assert_eq!(lines.len(), 13);
    assert_eq!(lines[1], "export const LOCOMOTION_TUNING = {");
    assert_eq!(lines[2], "  WALK_SWING_FORWARD_PX: 35.28,");
    assert_eq!(lines[3], "  WALK_SWING_LIFT_PX: 14.0,");
    assert_eq!(lines[12], "} as const;");
}

#[test]
fn cli_accepts_ts_format() {
    let cli = Cli::try_parse_from(["rigpose-cli", "constants", "frames.json", "--format", "ts"]).unwrap();
    let Command::Constants(args) = cli.command else { panic!("expected constants") };
    assert!(matches!(args.format, OutputFormat::Ts));
}
