use anyhow::Context;

use crate::config::RobotConfig;
use crate::hw::abb_robot_hal::AbbRobotHal;
use crate::robot_hal::RobotHal;
use crate::robot_hal_mock::RobotHalMock;

#[derive(Default)]
pub struct RobotHalFactory {
    force_mock: bool,
}

impl RobotHalFactory {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn new_maybe_mock(force_mock: bool) -> Self {
        Self { force_mock }
    }

    /// Unlike the gripper there is no degraded mode for the arm: if the controller can't be
    /// reached nothing can be picked.
    pub fn create_hal(&self, config: &RobotConfig) -> anyhow::Result<Box<dyn RobotHal>> {
        if self.force_mock {
            Ok(Box::new(RobotHalMock::default()))
        } else {
            let hal = AbbRobotHal::connect(config)
                .with_context(|| format!("connecting to robot controller at {}", config.address))?;
            Ok(Box::new(hal))
        }
    }
}
