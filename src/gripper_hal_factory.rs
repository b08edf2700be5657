use log::warn;

use crate::config::{GripperConfig, SettleDelays};
use crate::gripper_hal::Gripper;
use crate::hw::serial_gripper_link::SerialGripperLink;

#[derive(Default)]
pub struct GripperHalFactory {
    force_mock: bool,
}

impl GripperHalFactory {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn new_maybe_mock(force_mock: bool) -> Self {
        Self { force_mock }
    }

    /// Never fails: a port that cannot be opened yields a simulated gripper instead.
    pub fn create_gripper(&self, config: &GripperConfig, settle: &SettleDelays) -> Gripper {
        if self.force_mock {
            return Gripper::simulated("fake hardware requested");
        }
        match SerialGripperLink::open(config) {
            Ok(link) => Gripper::with_link(Box::new(link), settle.gripper()),
            Err(e) => {
                warn!("Gripper port {} unavailable ({e}), continuing with a simulated gripper", config.port);
                Gripper::simulated(format!("{}: {e}", config.port))
            }
        }
    }
}
