//! Defaults are the values the cell was tuned with.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{Pose, Position, Quaternion};
use crate::pick_cycle::{FaultPolicy, PickStrategy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickerConfig {
    pub calibration: Calibration,
    pub heights: Heights,
    pub home_pose: Pose,
    pub drop_pose: Pose,
    pub strategy: PickStrategy,
    pub fault_policy: FaultPolicy,
    pub settle: SettleDelays,
    pub detector: DetectorConfig,
    pub gripper: GripperConfig,
    pub robot: RobotConfig,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
            heights: Heights::default(),
            home_pose: Pose::new(Position::new(264.88, -10.7, 708.8), Quaternion::GRIPPER_DOWN),
            drop_pose: Pose::new(Position::new(264.88, -10.7, 580.0), Quaternion::GRIPPER_DOWN),
            strategy: PickStrategy::default(),
            fault_policy: FaultPolicy::default(),
            settle: SettleDelays::default(),
            detector: DetectorConfig::default(),
            gripper: GripperConfig::default(),
            robot: RobotConfig::default(),
        }
    }
}

impl PickerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: PickerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.calibration;
        let calibration_values = [
            ("scale_x", c.scale_x),
            ("offset_x", c.offset_x),
            ("scale_y", c.scale_y),
            ("offset_y", c.offset_y),
            ("depth_slope", c.depth_slope),
            ("depth_intercept", c.depth_intercept),
        ];
        for (name, value) in calibration_values {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("calibration.{name} must be finite, got {value}")));
            }
        }

        let h = &self.heights;
        if !h.pick_height.is_finite() || !h.safety_floor_height.is_finite() {
            return Err(ConfigError::Invalid("heights must be finite".to_owned()));
        }
        if let Some(max) = h.max_height {
            if !(max >= h.safety_floor_height) {
                return Err(ConfigError::Invalid(format!(
                    "heights.max_height ({max}) is below safety_floor_height ({})",
                    h.safety_floor_height)));
            }
        }

        if self.gripper.baud_rate == 0 {
            return Err(ConfigError::Invalid("gripper.baud_rate must be positive".to_owned()));
        }
        if self.robot.connect_timeout_ms == 0 || self.robot.io_timeout_ms == 0 {
            return Err(ConfigError::Invalid("robot timeouts must be positive".to_owned()));
        }

        let threshold = self.detector.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(format!(
                "detector.confidence_threshold must be within [0, 1], got {threshold}")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub scale_x: f64,
    pub offset_x: f64,
    pub scale_y: f64,
    pub offset_y: f64,
    /// Slope of the depth (cm) to approach height (mm) regression.
    pub depth_slope: f64,
    pub depth_intercept: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            scale_x: 970.51,
            offset_x: 482.16222,
            scale_y: 991.56,
            offset_y: -37.83813,
            depth_slope: -9.6542,
            depth_intercept: 1401.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Heights {
    /// Height the gripper descends to for the grasp, determined empirically.
    pub pick_height: f64,
    pub safety_floor_height: f64,
    pub max_height: Option<f64>,
}

impl Default for Heights {
    fn default() -> Self {
        Self {
            pick_height: 490.0,
            safety_floor_height: 520.0,
            max_height: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleDelays {
    pub motion_ms: u64,
    pub gripper_ms: u64,
}

impl SettleDelays {
    pub const NONE: SettleDelays = SettleDelays { motion_ms: 0, gripper_ms: 0 };

    pub fn motion(&self) -> Duration {
        Duration::from_millis(self.motion_ms)
    }

    pub fn gripper(&self) -> Duration {
        Duration::from_millis(self.gripper_ms)
    }
}

impl Default for SettleDelays {
    fn default() -> Self {
        Self { motion_ms: 1000, gripper_ms: 1000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub confidence_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { confidence_threshold: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GripperConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for GripperConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_owned(),
            baud_rate: 115200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// `host:port` of the controller's motion server.
    pub address: String,
    pub connect_timeout_ms: u64,
    /// Upper bound on a single command round trip, including the motion itself.
    pub io_timeout_ms: u64,
}

impl RobotConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            address: "192.168.125.1:5000".to_owned(),
            connect_timeout_ms: 5000,
            io_timeout_ms: 60000,
        }
    }
}
