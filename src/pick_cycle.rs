use std::thread;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PickerConfig;
use crate::geometry::{Pose, RobotTarget};
use crate::gripper_hal::{Gripper, GripperCommand, GripperError};
use crate::robot_hal::{MotionError, RobotHal};

const DEBUG_NAME: &str = "PickCycle";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickStrategy {
    /// Straight to the configured pick height; the depth-derived height is not used.
    #[default]
    ConstantHeight,
    /// Stop above the object at the depth-derived height, then descend to the pick height.
    ApproachThenDescend,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    #[default]
    LeaveInPlace,
    /// One best-effort move to the home pose.
    ReturnHome,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum CycleState {
    Home,
    AboveTarget,
    Descended,
    Grasped,
    Retracted,
    AtDrop,
    Released,
    Aborted,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Action {
    MoveTo(Pose),
    Actuate(GripperCommand),
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub struct Transition {
    pub from: CycleState,
    pub action: Action,
    pub to: CycleState,
}

#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Motion(#[from] MotionError),
    #[error(transparent)]
    Gripper(#[from] GripperError),
}

#[derive(Error, Debug)]
#[error("pick cycle aborted in {failed_in:?}: {error}")]
pub struct CycleAbort {
    /// State the cycle was leaving when the command failed.
    pub failed_in: CycleState,
    #[source]
    pub error: CycleError,
}

#[derive(Debug, Clone, Copy)]
pub struct MotionProfile {
    pub pick_height: f64,
    pub home_pose: Pose,
    pub drop_pose: Pose,
    pub strategy: PickStrategy,
    pub fault_policy: FaultPolicy,
    pub motion_settle: Duration,
}

impl MotionProfile {
    pub fn from_config(config: &PickerConfig) -> Self {
        Self {
            pick_height: config.heights.pick_height,
            home_pose: config.home_pose,
            drop_pose: config.drop_pose,
            strategy: config.strategy,
            fault_policy: config.fault_policy,
            motion_settle: config.settle.motion(),
        }
    }
}

pub struct PickCycle {
    target: RobotTarget,
    home_pose: Pose,
    transitions: Vec<Transition>,
    next: usize,
    state: CycleState,
    fault_policy: FaultPolicy,
    motion_settle: Duration,
}

impl PickCycle {
    pub fn new(target: RobotTarget, profile: &MotionProfile) -> Self {
        Self {
            target,
            home_pose: profile.home_pose,
            transitions: plan(&target, profile),
            next: 0,
            state: CycleState::Home,
            fault_policy: profile.fault_policy,
            motion_settle: profile.motion_settle,
        }
    }

    pub fn target(&self) -> &RobotTarget {
        &self.target
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn is_complete(&self) -> bool {
        self.state == CycleState::Home && self.next == self.transitions.len()
    }

    pub fn step(&mut self, robot: &mut dyn RobotHal, gripper: &mut Gripper) -> Result<CycleState, CycleError> {
        if self.state == CycleState::Aborted || self.is_complete() {
            return Ok(self.state);
        }

        let transition = self.transitions[self.next];
        if let Err(e) = self.execute(&transition.action, robot, gripper) {
            error!("{DEBUG_NAME}: [{:?}] failed: {e}", transition.from);
            self.state = CycleState::Aborted;
            return Err(e);
        }
        info!("{DEBUG_NAME}: [{:?}] => [{:?}]", transition.from, transition.to);
        self.state = transition.to;
        self.next += 1;
        Ok(self.state)
    }

    /// Drive the cycle to completion, or stop at the first failed command.
    pub fn run(mut self, robot: &mut dyn RobotHal, gripper: &mut Gripper) -> Result<(), CycleAbort> {
        while !self.is_complete() {
            let failed_in = self.state;
            if let Err(error) = self.step(robot, gripper) {
                self.apply_fault_policy(robot);
                return Err(CycleAbort { failed_in, error });
            }
        }
        Ok(())
    }

    fn execute(&self, action: &Action, robot: &mut dyn RobotHal, gripper: &mut Gripper) -> Result<(), CycleError> {
        match action {
            Action::MoveTo(pose) => {
                robot.move_to(pose)?;
                if !self.motion_settle.is_zero() {
                    thread::sleep(self.motion_settle);
                }
            }
            Action::Actuate(command) => gripper.actuate_or_simulate(*command)?,
        }
        Ok(())
    }

    fn apply_fault_policy(&self, robot: &mut dyn RobotHal) {
        match self.fault_policy {
            FaultPolicy::LeaveInPlace => warn!("{DEBUG_NAME}: arm left where the failed command stopped it"),
            FaultPolicy::ReturnHome => match robot.move_to(&self.home_pose) {
                Ok(()) => info!("{DEBUG_NAME}: returned home after abort"),
                Err(e) => error!("{DEBUG_NAME}: could not return home after abort: {e}"),
            },
        }
    }
}

fn plan(target: &RobotTarget, profile: &MotionProfile) -> Vec<Transition> {
    use CycleState::*;

    let t = |from, action, to| Transition { from, action, to };
    let pick_pose = target.at_height(profile.pick_height);

    let mut transitions = match profile.strategy {
        PickStrategy::ConstantHeight => vec![
            t(Home, Action::MoveTo(pick_pose), Descended),
            t(Descended, Action::Actuate(GripperCommand::Close), Grasped),
            t(Grasped, Action::MoveTo(profile.home_pose), Retracted),
        ],
        PickStrategy::ApproachThenDescend => vec![
            t(Home, Action::MoveTo(target.pose()), AboveTarget),
            t(AboveTarget, Action::MoveTo(pick_pose), Descended),
            t(Descended, Action::Actuate(GripperCommand::Close), Grasped),
            t(Grasped, Action::MoveTo(target.pose()), Retracted),
        ],
    };
    transitions.extend([
        t(Retracted, Action::MoveTo(profile.drop_pose), AtDrop),
        t(AtDrop, Action::Actuate(GripperCommand::Open), Released),
        t(Released, Action::MoveTo(profile.home_pose), Home),
    ]);
    transitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Position, Quaternion};
    use crate::gripper_hal::tests::RecordingLink;
    use crate::gripper_hal::{CLOSE_FRAME, OPEN_FRAME};
    use crate::robot_hal_mock::RobotHalMock;

    /// Fails the `fail_at`-th move (0-based); every attempt is recorded.
    #[derive(Default)]
    struct FailingRobot {
        attempts: Vec<Pose>,
        fail_at: usize,
    }

    impl RobotHal for FailingRobot {
        fn move_to(&mut self, pose: &Pose) -> Result<(), MotionError> {
            self.attempts.push(*pose);
            if self.attempts.len() - 1 == self.fail_at {
                return Err(MotionError::Fault("joint 3 overload".to_owned()));
            }
            Ok(())
        }
    }

    fn profile(strategy: PickStrategy, fault_policy: FaultPolicy) -> MotionProfile {
        MotionProfile {
            strategy,
            fault_policy,
            motion_settle: Duration::ZERO,
            ..MotionProfile::from_config(&PickerConfig::default())
        }
    }

    fn target(x: f64, y: f64) -> RobotTarget {
        RobotTarget { x, y, z: 600.0, orientation: Quaternion::GRIPPER_DOWN }
    }

    fn pose(x: f64, y: f64, z: f64) -> Pose {
        Pose::new(Position::new(x, y, z), Quaternion::GRIPPER_DOWN)
    }

    fn hardware_gripper() -> (Gripper, RecordingLink) {
        let link = RecordingLink::default();
        (Gripper::with_link(Box::new(link.clone()), Duration::ZERO), link)
    }

    #[test]
    fn test_constant_height_sequence() {
        let profile = profile(PickStrategy::ConstantHeight, FaultPolicy::LeaveInPlace);
        let mut robot = RobotHalMock::default();
        let (mut gripper, link) = hardware_gripper();

        PickCycle::new(target(500.0, 20.0), &profile).run(&mut robot, &mut gripper).unwrap();

        assert_eq!(robot.moves(), &[
            pose(500.0, 20.0, 490.0),
            profile.home_pose,
            profile.drop_pose,
            profile.home_pose,
        ]);
        assert_eq!(*link.frames.borrow(), vec![CLOSE_FRAME.to_vec(), OPEN_FRAME.to_vec()]);
    }

    #[test]
    fn test_approach_then_descend_sequence() {
        let profile = profile(PickStrategy::ApproachThenDescend, FaultPolicy::LeaveInPlace);
        let mut robot = RobotHalMock::default();
        let (mut gripper, _link) = hardware_gripper();

        PickCycle::new(target(500.0, 20.0), &profile).run(&mut robot, &mut gripper).unwrap();

        assert_eq!(robot.moves(), &[
            pose(500.0, 20.0, 600.0),
            pose(500.0, 20.0, 490.0),
            pose(500.0, 20.0, 600.0),
            profile.drop_pose,
            profile.home_pose,
        ]);
    }

    #[test]
    fn test_states_visited_in_order() {
        let profile = profile(PickStrategy::ApproachThenDescend, FaultPolicy::LeaveInPlace);
        let mut robot = RobotHalMock::default();
        let mut gripper = Gripper::simulated("test");
        let mut cycle = PickCycle::new(target(0.0, 0.0), &profile);

        let mut visited = vec![cycle.state()];
        while !cycle.is_complete() {
            visited.push(cycle.step(&mut robot, &mut gripper).unwrap());
        }
        use CycleState::*;
        assert_eq!(visited, vec![Home, AboveTarget, Descended, Grasped, Retracted, AtDrop, Released, Home]);
    }

    #[test]
    fn test_cycle_always_ends_home() {
        for strategy in [PickStrategy::ConstantHeight, PickStrategy::ApproachThenDescend] {
            let profile = profile(strategy, FaultPolicy::LeaveInPlace);
            for (x, y) in [(0.0, 0.0), (-1e4, 1e4), (482.16, -37.84), (1e-9, f64::MAX)] {
                let mut robot = RobotHalMock::default();
                let mut gripper = Gripper::simulated("test");
                let mut cycle = PickCycle::new(target(x, y), &profile);
                while !cycle.is_complete() {
                    cycle.step(&mut robot, &mut gripper).unwrap();
                }
                assert_eq!(cycle.state(), CycleState::Home);
                assert_eq!(robot.moves().last(), Some(&profile.home_pose));
            }
        }
    }

    #[test]
    fn test_motion_error_aborts_at_every_move() {
        use CycleState::*;
        let expectations = [
            (PickStrategy::ConstantHeight, vec![Home, Grasped, Retracted, Released]),
            (PickStrategy::ApproachThenDescend, vec![Home, AboveTarget, Grasped, Retracted, Released]),
        ];
        for (strategy, failing_states) in expectations {
            let profile = profile(strategy, FaultPolicy::LeaveInPlace);
            for (fail_at, expected_state) in failing_states.into_iter().enumerate() {
                let mut robot = FailingRobot { fail_at, ..Default::default() };
                let (mut gripper, _link) = hardware_gripper();
                let abort = PickCycle::new(target(400.0, 0.0), &profile)
                    .run(&mut robot, &mut gripper)
                    .unwrap_err();
                assert_eq!(abort.failed_in, expected_state);
                assert!(matches!(abort.error, CycleError::Motion(_)));
                assert_eq!(robot.attempts.len(), fail_at + 1, "no moves after the fault");
            }
        }
    }

    #[test]
    fn test_aborted_cycle_does_not_step_further() {
        let profile = profile(PickStrategy::ConstantHeight, FaultPolicy::LeaveInPlace);
        let mut robot = FailingRobot { fail_at: 0, ..Default::default() };
        let (mut gripper, link) = hardware_gripper();
        let mut cycle = PickCycle::new(target(400.0, 0.0), &profile);

        assert!(cycle.step(&mut robot, &mut gripper).is_err());
        assert_eq!(cycle.state(), CycleState::Aborted);
        assert_eq!(cycle.step(&mut robot, &mut gripper).unwrap(), CycleState::Aborted);
        assert_eq!(robot.attempts.len(), 1);
        assert!(link.frames.borrow().is_empty());
        assert!(!cycle.is_complete());
    }

    #[test]
    fn test_return_home_policy_moves_home_once() {
        let profile = profile(PickStrategy::ConstantHeight, FaultPolicy::ReturnHome);
        let mut robot = FailingRobot { fail_at: 2, ..Default::default() };
        let (mut gripper, _link) = hardware_gripper();

        let abort = PickCycle::new(target(400.0, 0.0), &profile)
            .run(&mut robot, &mut gripper)
            .unwrap_err();
        assert_eq!(abort.failed_in, CycleState::Retracted);
        assert_eq!(robot.attempts.len(), 4);
        assert_eq!(robot.attempts.last(), Some(&profile.home_pose));
    }

    #[test]
    fn test_gripper_write_failure_aborts() {
        let profile = profile(PickStrategy::ConstantHeight, FaultPolicy::LeaveInPlace);
        let mut robot = RobotHalMock::default();
        let link = RecordingLink { fail_from: Some(0), ..Default::default() };
        let mut gripper = Gripper::with_link(Box::new(link), Duration::ZERO);

        let abort = PickCycle::new(target(400.0, 0.0), &profile)
            .run(&mut robot, &mut gripper)
            .unwrap_err();
        assert_eq!(abort.failed_in, CycleState::Descended);
        assert!(matches!(abort.error, CycleError::Gripper(GripperError::Write { .. })));
        assert_eq!(robot.moves().len(), 1);
    }

    #[test]
    fn test_simulated_gripper_completes_cycle() {
        let profile = profile(PickStrategy::ConstantHeight, FaultPolicy::LeaveInPlace);
        let mut robot = RobotHalMock::default();
        let mut gripper = Gripper::simulated("no port");
        assert!(PickCycle::new(target(1.0, 2.0), &profile).run(&mut robot, &mut gripper).is_ok());
        assert_eq!(robot.moves().len(), 4);
    }
}
