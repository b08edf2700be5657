use log::info;

use crate::geometry::Pose;
use crate::robot_hal::{MotionError, RobotHal};

/// Arm stand-in for fake hardware runs: remembers where it was told to go.
#[derive(Debug, Default)]
pub struct RobotHalMock {
    moves: Vec<Pose>,
}

impl RobotHalMock {
    pub fn moves(&self) -> &[Pose] {
        &self.moves
    }
}

impl RobotHal for RobotHalMock {
    fn move_to(&mut self, pose: &Pose) -> Result<(), MotionError> {
        let p = pose.position;
        info!("move_to: [{:.1}, {:.1}, {:.1}] (simulated)", p.x, p.y, p.z);
        self.moves.push(*pose);
        Ok(())
    }
}
