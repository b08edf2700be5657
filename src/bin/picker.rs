//! Pick objects off the table and drop them at the drop pose.
//!
//! 1. Connect the arm and open the gripper port (falling back to a simulated gripper)
//! 2. Move home and open the gripper
//! 3. For every requested target, locate and pick one unit at a time
//!
//! Objects are located through a scripted scene file standing in for the camera and detector.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};

use abb_picker::config::PickerConfig;
use abb_picker::gripper_hal::GripperMode;
use abb_picker::gripper_hal_factory::GripperHalFactory;
use abb_picker::intent::{Intent, PickTarget};
use abb_picker::pick_orchestrator::{prepare_cell, PickOrchestrator, PickOrchestratorArgs};
use abb_picker::robot_hal_factory::RobotHalFactory;
use abb_picker::scripted_scene::Scene;

#[derive(Parser, Debug)]
#[clap(name = "picker")]
struct Opts {
    /// TOML config file; built-in cell defaults are used when omitted.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Simulate the arm and the gripper.
    #[clap(long)]
    fake_hw: bool,

    /// Scene file driving the camera and detector.
    #[clap(long)]
    scene: Option<PathBuf>,

    /// Object to pick, as LABEL or LABEL:COUNT.  May be repeated.
    #[clap(short, long = "target")]
    targets: Vec<PickTarget>,

    /// Intent JSON as produced by the language front end, e.g.
    /// '{"action": "pick", "targets": [{"object": "apple", "count": 2}]}'.
    #[clap(long, conflicts_with = "targets")]
    intent: Option<String>,

    /// Move home and open the gripper, then exit.
    #[clap(long)]
    prepare_only: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts: Opts = Opts::parse();

    let config = match &opts.config {
        Some(path) => PickerConfig::load(path)?,
        None => PickerConfig::default(),
    };

    let intent = if let Some(reply) = &opts.intent {
        Intent::parse_reply(reply).context("parsing --intent")?
    } else {
        Intent::pick(opts.targets.clone())
    };
    if !opts.prepare_only && intent.targets.is_empty() {
        bail!("Nothing to pick, pass --target or --intent");
    }

    let mut robot = RobotHalFactory::new_maybe_mock(opts.fake_hw).create_hal(&config.robot)?;
    let mut gripper = GripperHalFactory::new_maybe_mock(opts.fake_hw).create_gripper(&config.gripper, &config.settle);
    if gripper.mode() == GripperMode::Simulated {
        warn!("Gripper is simulated: {}", gripper.degraded_reason().unwrap_or("unknown"));
    }

    if opts.prepare_only {
        prepare_cell(robot.as_mut(), &mut gripper, &config.home_pose).context("preparing the cell")?;
        info!("Cell prepared");
        return Ok(());
    }

    let scene = match &opts.scene {
        Some(path) => Scene::load(path)?,
        None => bail!("No camera backend available, pass --scene"),
    };

    let mut orchestrator = PickOrchestrator::new(PickOrchestratorArgs {
        config,
        camera: Box::new(scene.camera()),
        detector: Box::new(scene.detector()),
        robot,
        gripper,
    });
    orchestrator.prepare().context("preparing the cell")?;

    let reports = orchestrator.run_intent(&intent);
    for report in &reports {
        print!("{report}");
    }
    let picked: usize = reports.iter().map(|r| r.succeeded()).sum();
    let requested: usize = reports.iter().map(|r| r.requested()).sum();
    println!("Done, {picked}/{requested} picked");
    Ok(())
}
