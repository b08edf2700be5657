use std::fmt;

use log::{info, warn};
use thiserror::Error;

use crate::config::PickerConfig;
use crate::coordinate_mapper::{CoordinateMapper, InvalidDepthError};
use crate::geometry::{Pose, RobotTarget};
use crate::gripper_hal::{Gripper, GripperCommand, GripperMode};
use crate::intent::Intent;
use crate::perception::{DepthCamera, Detection, Detector};
use crate::pick_cycle::{CycleAbort, CycleError, CycleState, MotionProfile, PickCycle};
use crate::robot_hal::RobotHal;
use crate::safety_clamp::SafetyClamp;

#[derive(Error, Debug)]
pub enum SkipReason {
    #[error("no matching object in view")]
    NothingFound,
    #[error(transparent)]
    InvalidDepth(#[from] InvalidDepthError),
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
    #[error("detector failed: {0}")]
    DetectorFailed(String),
}

#[derive(Debug)]
pub enum PickOutcome {
    Success { target: RobotTarget },
    NoDetection(SkipReason),
    Aborted { state: CycleState, error: CycleError },
}

impl PickOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PickOutcome::Success { .. })
    }
}

impl fmt::Display for PickOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PickOutcome::Success { target } => {
                write!(f, "picked at ({:.1}, {:.1}, {:.1})", target.x, target.y, target.z)
            }
            PickOutcome::NoDetection(reason) => write!(f, "skipped: {reason}"),
            PickOutcome::Aborted { state, error } => write!(f, "aborted in {state:?}: {error}"),
        }
    }
}

impl From<CycleAbort> for PickOutcome {
    fn from(abort: CycleAbort) -> Self {
        PickOutcome::Aborted { state: abort.failed_in, error: abort.error }
    }
}

#[derive(Debug)]
pub struct PickReport {
    pub label: String,
    pub outcomes: Vec<PickOutcome>,
}

impl PickReport {
    pub fn requested(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }
}

impl fmt::Display for PickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}/{} picked", self.label, self.succeeded(), self.requested())?;
        for (i, outcome) in self.outcomes.iter().enumerate() {
            writeln!(f, "  #{}: {outcome}", i + 1)?;
        }
        Ok(())
    }
}

/// Bring the cell to its starting condition: arm home, gripper open.
pub fn prepare_cell(robot: &mut dyn RobotHal, gripper: &mut Gripper, home_pose: &Pose) -> anyhow::Result<()> {
    info!("Moving to home pose");
    robot.move_to(home_pose)?;
    info!("Opening gripper");
    gripper.actuate_or_simulate(GripperCommand::Open)?;
    Ok(())
}

pub struct PickOrchestratorArgs {
    pub config: PickerConfig,
    pub camera: Box<dyn DepthCamera>,
    pub detector: Box<dyn Detector>,
    pub robot: Box<dyn RobotHal>,
    pub gripper: Gripper,
}

pub struct PickOrchestrator {
    camera: Box<dyn DepthCamera>,
    detector: Box<dyn Detector>,
    robot: Box<dyn RobotHal>,
    gripper: Gripper,
    mapper: CoordinateMapper,
    clamp: SafetyClamp,
    profile: MotionProfile,
    confidence_threshold: f32,
}

impl PickOrchestrator {
    pub fn new(args: PickOrchestratorArgs) -> Self {
        let config = args.config;
        Self {
            camera: args.camera,
            detector: args.detector,
            robot: args.robot,
            gripper: args.gripper,
            mapper: CoordinateMapper::new(config.calibration),
            clamp: SafetyClamp::new(&config.heights),
            profile: MotionProfile::from_config(&config),
            confidence_threshold: config.detector.confidence_threshold,
        }
    }

    pub fn gripper_mode(&self) -> GripperMode {
        self.gripper.mode()
    }

    pub fn prepare(&mut self) -> anyhow::Result<()> {
        prepare_cell(self.robot.as_mut(), &mut self.gripper, &self.profile.home_pose)
    }

    pub fn run(&mut self, label: &str, count: u32) -> PickReport {
        info!("Picking {count} x {label:?}");
        let mut outcomes = Vec::with_capacity(count as usize);
        for unit in 1..=count {
            let outcome = match self.locate(label) {
                Ok(target) => match PickCycle::new(target, &self.profile).run(self.robot.as_mut(), &mut self.gripper) {
                    Ok(()) => PickOutcome::Success { target },
                    Err(abort) => abort.into(),
                },
                Err(reason) => PickOutcome::NoDetection(reason),
            };
            if outcome.is_success() {
                info!("{label} #{unit}: {outcome}");
            } else {
                warn!("{label} #{unit}: {outcome}");
            }
            outcomes.push(outcome);
        }
        PickReport { label: label.to_owned(), outcomes }
    }

    pub fn run_intent(&mut self, intent: &Intent) -> Vec<PickReport> {
        intent
            .pick_targets()
            .iter()
            .map(|target| self.run(&target.object, target.count))
            .collect()
    }

    fn locate(&mut self, label: &str) -> Result<RobotTarget, SkipReason> {
        let capture = self
            .camera
            .capture_aligned()
            .map_err(|e| SkipReason::CaptureFailed(format!("{e:#}")))?;
        let hits = self
            .detector
            .detect(&capture.color, Some(label), self.confidence_threshold)
            .map_err(|e| SkipReason::DetectorFailed(format!("{e:#}")))?;
        let best = hits.into_iter().next().ok_or(SkipReason::NothingFound)?;

        let detection = Detection::from_box(best, &capture.depth);
        info!(
            "Found {} ({:.2}) at pixel {:?}, depth {:.3} m",
            detection.label, detection.confidence, detection.pixel_center, detection.depth_meters);
        let point = self
            .camera
            .deproject_pixel(&capture.intrinsics, detection.pixel_center, detection.depth_meters);
        let target = self.mapper.map(point)?;
        Ok(self.clamp.clamp(target))
    }
}
