use std::io;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use thiserror::Error;

pub const OPEN_FRAME: [u8; 9] = [0x48, 0x49, 0x74, 0x01, 0x01, 0xA0, 0x01, 0x55, 0xC6];
pub const CLOSE_FRAME: [u8; 17] = [
    0x48, 0x49, 0x74, 0x01, 0x01, 0x60, 0x09, 0x64, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x09,
];

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum GripperCommand {
    Open,
    Close,
}

impl GripperCommand {
    pub fn frame(&self) -> &'static [u8] {
        match self {
            GripperCommand::Open => &OPEN_FRAME,
            GripperCommand::Close => &CLOSE_FRAME,
        }
    }
}

#[derive(Error, Debug)]
pub enum GripperError {
    #[error("gripper channel was never opened")]
    ChannelUnavailable,
    #[error("failed to send {command:?} to gripper: {source}")]
    Write {
        command: GripperCommand,
        #[source]
        source: io::Error,
    },
}

/// Write-only byte channel to the gripper actuator.  The actuator never acknowledges.
pub trait GripperLink {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum GripperMode {
    Hardware,
    /// Commands are logged and dropped.
    Simulated,
}

pub struct Gripper {
    link: Option<Box<dyn GripperLink>>,
    settle: Duration,
    degraded_reason: Option<String>,
}

impl Gripper {
    pub fn with_link(link: Box<dyn GripperLink>, settle: Duration) -> Self {
        Self { link: Some(link), settle, degraded_reason: None }
    }

    pub fn simulated(reason: impl Into<String>) -> Self {
        Self { link: None, settle: Duration::ZERO, degraded_reason: Some(reason.into()) }
    }

    pub fn mode(&self) -> GripperMode {
        if self.link.is_some() {
            GripperMode::Hardware
        } else {
            GripperMode::Simulated
        }
    }

    /// Why the gripper is simulated, if it is.
    pub fn degraded_reason(&self) -> Option<&str> {
        self.degraded_reason.as_deref()
    }

    /// Send `command` and block for the settle delay.
    pub fn actuate(&mut self, command: GripperCommand) -> Result<(), GripperError> {
        let link = self.link.as_mut().ok_or(GripperError::ChannelUnavailable)?;
        debug!("actuate: {command:?} {:02X?}", command.frame());
        link.write_frame(command.frame())
            .map_err(|source| GripperError::Write { command, source })?;
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        Ok(())
    }

    /// Like [`Gripper::actuate`], but a missing channel is logged instead of reported.
    pub fn actuate_or_simulate(&mut self, command: GripperCommand) -> Result<(), GripperError> {
        match self.actuate(command) {
            Err(GripperError::ChannelUnavailable) => {
                info!("Gripper simulated: {command:?} (no physical effect)");
                Ok(())
            }
            other => other,
        }
    }
}
