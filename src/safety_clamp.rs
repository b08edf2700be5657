use log::debug;

use crate::config::Heights;
use crate::geometry::RobotTarget;

/// x and y are not bounded.
#[derive(Debug, Clone, Copy)]
pub struct SafetyClamp {
    floor: f64,
    ceiling: Option<f64>,
}

impl SafetyClamp {
    pub fn new(heights: &Heights) -> Self {
        Self {
            floor: heights.safety_floor_height,
            ceiling: heights.max_height,
        }
    }

    pub fn clamp(&self, target: RobotTarget) -> RobotTarget {
        let mut z = target.z;
        if z < self.floor {
            debug!("Raising target z {z:.1} to safety floor {:.1}", self.floor);
            z = self.floor;
        }
        if let Some(ceiling) = self.ceiling {
            if z > ceiling {
                debug!("Lowering target z {z:.1} to ceiling {ceiling:.1}");
                z = ceiling;
            }
        }
        RobotTarget { z, ..target }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Quaternion;

    fn target_at(z: f64) -> RobotTarget {
        RobotTarget { x: 400.0, y: -20.0, z, orientation: Quaternion::GRIPPER_DOWN }
    }

    fn floor_only() -> SafetyClamp {
        SafetyClamp::new(&Heights { safety_floor_height: 520.0, ..Heights::default() })
    }

    #[test]
    fn test_below_floor_is_raised_exactly_to_floor() {
        let clamp = floor_only();
        for z in [519.999, 300.0, 0.0, -1000.0] {
            let clamped = clamp.clamp(target_at(z));
            assert_eq!(clamped.z, 520.0);
            assert_eq!(clamped.x, 400.0);
            assert_eq!(clamped.y, -20.0);
        }
    }

    #[test]
    fn test_at_or_above_floor_is_identity() {
        let clamp = floor_only();
        for z in [520.0, 520.001, 967.161, 5000.0] {
            assert_eq!(clamp.clamp(target_at(z)), target_at(z));
        }
    }

    #[test]
    fn test_ceiling_lowers_high_targets() {
        let clamp = SafetyClamp::new(&Heights {
            safety_floor_height: 520.0,
            max_height: Some(900.0),
            ..Heights::default()
        });
        assert_eq!(clamp.clamp(target_at(967.161)).z, 900.0);
        assert_eq!(clamp.clamp(target_at(700.0)).z, 700.0);
        assert_eq!(clamp.clamp(target_at(100.0)).z, 520.0);
    }
}
