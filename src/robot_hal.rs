use std::io;

use thiserror::Error;

use crate::geometry::Pose;

#[derive(Error, Debug)]
pub enum MotionError {
    #[error("robot link failure: {0}")]
    Io(#[from] io::Error),
    #[error("controller rejected `{command}` (reply: {reply:?})")]
    Rejected { command: String, reply: String },
    #[error("malformed controller reply: {0:?}")]
    MalformedReply(String),
    #[error("{0}")]
    Fault(String),
}

/// The arm's motion controller.  Calls block until the controller reports the move done.
pub trait RobotHal {
    fn move_to(&mut self, pose: &Pose) -> Result<(), MotionError>;
}
