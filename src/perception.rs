use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::geometry::CameraPoint;

/// Axis-aligned box in colour image pixels, `(x1, y1)` top-left, `(x2, y2)` bottom-right.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl PixelBox {
    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

#[derive(new, Debug, Clone, PartialEq)]
pub struct LabeledBox {
    pub bbox: PixelBox,
    pub label: String,
    pub confidence: f32,
}

#[derive(new, Debug, Clone, PartialEq)]
pub struct Detection {
    pub pixel_center: (i32, i32),
    pub depth_meters: f64,
    pub label: String,
    pub confidence: f32,
}

impl Detection {
    pub fn from_box(hit: LabeledBox, depth: &DepthFrame) -> Self {
        let pixel_center = hit.bbox.center();
        let depth_meters = depth.distance_at(pixel_center);
        Self::new(pixel_center, depth_meters, hit.label, hit.confidence)
    }
}

#[derive(new, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    /// Principal point, pixels.
    pub ppx: f64,
    pub ppy: f64,
    /// Focal lengths, pixels.
    pub fx: f64,
    pub fy: f64,
}

impl CameraIntrinsics {
    /// Back-project `pixel` at `depth` metres into the optical frame (no lens distortion).
    pub fn deproject(&self, pixel: (i32, i32), depth: f64) -> CameraPoint {
        let x = (f64::from(pixel.0) - self.ppx) / self.fx;
        let y = (f64::from(pixel.1) - self.ppy) / self.fy;
        CameraPoint::new(depth * x, depth * y, depth)
    }
}

#[derive(Debug, Clone)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    /// Packed BGR8.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    /// Metres per raw depth unit.
    pub depth_scale: f64,
    pub data: Vec<u16>,
}

impl DepthFrame {
    /// Distance in metres at `pixel`; 0.0 means no return (including out-of-image pixels).
    pub fn distance_at(&self, pixel: (i32, i32)) -> f64 {
        let (x, y) = pixel;
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return 0.0;
        }
        let index = y as usize * self.width as usize + x as usize;
        self.data.get(index).map_or(0.0, |raw| f64::from(*raw) * self.depth_scale)
    }
}

#[derive(Debug, Clone)]
pub struct AlignedCapture {
    pub intrinsics: CameraIntrinsics,
    pub color: ColorFrame,
    pub depth: DepthFrame,
}

pub trait DepthCamera {
    fn capture_aligned(&mut self) -> anyhow::Result<AlignedCapture>;

    fn deproject_pixel(&self, intrinsics: &CameraIntrinsics, pixel: (i32, i32), depth: f64) -> CameraPoint {
        intrinsics.deproject(pixel, depth)
    }
}

pub trait Detector {
    fn detect(
        &mut self,
        frame: &ColorFrame,
        want_label: Option<&str>,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<LabeledBox>>;
}

/// Labels compare case-insensitively.
pub fn rank_hits(mut hits: Vec<LabeledBox>, want_label: Option<&str>, confidence_threshold: f32) -> Vec<LabeledBox> {
    let want_label = want_label.map(str::to_lowercase);
    hits.retain(|hit| {
        hit.confidence >= confidence_threshold
            && want_label.as_ref().map_or(true, |want| hit.label.to_lowercase() == *want)
    });
    hits.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    hits
}
