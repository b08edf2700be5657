use thiserror::Error;

use crate::config::Calibration;
use crate::geometry::{CameraPoint, Quaternion, RobotTarget};

#[derive(Error, Debug, PartialEq, Clone, Copy)]
#[error("invalid depth reading: {0} m")]
pub struct InvalidDepthError(pub f64);

/// Camera image axes are swapped relative to the base frame.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    calibration: Calibration,
    orientation: Quaternion,
}

impl CoordinateMapper {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            calibration,
            orientation: Quaternion::GRIPPER_DOWN,
        }
    }

    pub fn map(&self, point: CameraPoint) -> Result<RobotTarget, InvalidDepthError> {
        let depth = point.z;
        if !depth.is_finite() || depth <= 0.0 {
            return Err(InvalidDepthError(depth));
        }

        let c = &self.calibration;
        Ok(RobotTarget {
            x: c.scale_x * point.y + c.offset_x,
            y: c.scale_y * point.x + c.offset_y,
            z: c.depth_slope * depth_cm(depth) + c.depth_intercept,
            orientation: self.orientation,
        })
    }
}

/// The height regression was fitted against centimetres at 0.01 cm resolution.
fn depth_cm(depth_m: f64) -> f64 {
    (depth_m * 100.0 * 100.0).round() / 100.0
}
