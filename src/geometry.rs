use derive_new::new;
use serde::{Deserialize, Serialize};

#[derive(new, Debug, PartialEq, Copy, Clone)]
pub struct CameraPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Cartesian position in the robot base frame, in millimetres.
#[derive(new, Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<[f64; 3]> for Position {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        [p.x, p.y, p.z]
    }
}

/// Orientation in the controller's `[q1, q2, q3, q4]` convention, q1 being the scalar part.
#[derive(new, Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Tool flange rotated 180 degrees about y: gripper pointing straight down.
    pub const GRIPPER_DOWN: Quaternion = Quaternion { w: 0.0, x: 0.0, y: 1.0, z: 0.0 };
}

impl From<[f64; 4]> for Quaternion {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Quaternion> for [f64; 4] {
    fn from(q: Quaternion) -> Self {
        [q.w, q.x, q.y, q.z]
    }
}

#[derive(new, Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub orientation: Quaternion,
}

/// `z` is the approach height derived from the depth reading.
#[derive(Debug, PartialEq, Copy, Clone)]
pub struct RobotTarget {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub orientation: Quaternion,
}

impl RobotTarget {
    pub fn pose(&self) -> Pose {
        self.at_height(self.z)
    }

    pub fn at_height(&self, z: f64) -> Pose {
        Pose::new(Position::new(self.x, self.y, z), self.orientation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_deserializes_from_bare_arrays() {
        let pose: Pose = serde_json::from_str(
            r#"{"position": [264.88, -10.7, 708.8], "orientation": [0, 0, 1, 0]}"#).unwrap();
        assert_eq!(pose.position, Position::new(264.88, -10.7, 708.8));
        assert_eq!(pose.orientation, Quaternion::GRIPPER_DOWN);
    }

    #[test]
    fn test_target_at_height_keeps_xy_and_orientation() {
        let target = RobotTarget { x: 1.0, y: 2.0, z: 600.0, orientation: Quaternion::GRIPPER_DOWN };
        let pose = target.at_height(490.0);
        assert_eq!(pose.position, Position::new(1.0, 2.0, 490.0));
        assert_eq!(pose.orientation, Quaternion::GRIPPER_DOWN);
        assert_eq!(target.pose().position.z, 600.0);
    }
}
