//! Camera and detector stand-ins driven by a JSON scene.  Each capture consumes one frame;
//! once the script runs out every capture is empty.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::perception::{
    rank_hits, AlignedCapture, CameraIntrinsics, ColorFrame, DepthCamera, DepthFrame, Detector, LabeledBox, PixelBox,
};

const DEFAULT_DEPTH_SCALE: f64 = 0.001;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub intrinsics: CameraIntrinsics,
    #[serde(default = "default_depth_scale")]
    pub depth_scale: f64,
    #[serde(default)]
    pub frames: Vec<SceneFrame>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneFrame {
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneObject {
    pub label: String,
    pub confidence: f32,
    pub bbox: PixelBox,
    /// Depth painted over the whole box; 0.0 simulates a missing return.
    pub depth_meters: f64,
}

fn default_depth_scale() -> f64 {
    DEFAULT_DEPTH_SCALE
}

impl Scene {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening scene {}", path.display()))?;
        let scene: Scene = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing scene {}", path.display()))?;
        Ok(scene)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn camera(&self) -> ScriptedCamera {
        ScriptedCamera { scene: self.clone(), next_frame: 0 }
    }

    pub fn detector(&self) -> ScriptedDetector {
        ScriptedDetector { frames: self.frames.clone() }
    }
}

pub struct ScriptedCamera {
    scene: Scene,
    next_frame: u64,
}

impl ScriptedCamera {
    fn paint_depth(&self, frame: Option<&SceneFrame>) -> DepthFrame {
        let (width, height) = (self.scene.intrinsics.width, self.scene.intrinsics.height);
        let mut data = vec![0u16; width as usize * height as usize];
        let objects: &[SceneObject] = if data.is_empty() { &[] } else { frame.map(|f| f.objects.as_slice()).unwrap_or_default() };
        for object in objects {
            let raw = (object.depth_meters / self.scene.depth_scale).round().clamp(0.0, f64::from(u16::MAX)) as u16;
            let b = object.bbox;
            let (x1, x2) = (b.x1.max(0) as u32, (b.x2.max(0) as u32).min(width.saturating_sub(1)));
            let (y1, y2) = (b.y1.max(0) as u32, (b.y2.max(0) as u32).min(height.saturating_sub(1)));
            for y in y1..=y2 {
                for x in x1..=x2 {
                    data[(y * width + x) as usize] = raw;
                }
            }
        }
        DepthFrame { width, height, depth_scale: self.scene.depth_scale, data }
    }
}

impl DepthCamera for ScriptedCamera {
    fn capture_aligned(&mut self) -> anyhow::Result<AlignedCapture> {
        let sequence = self.next_frame;
        self.next_frame += 1;
        let frame = usize::try_from(sequence).ok().and_then(|i| self.scene.frames.get(i));
        trace!("capture_aligned: frame {sequence} ({} objects)", frame.map_or(0, |f| f.objects.len()));

        let intrinsics = self.scene.intrinsics;
        let color = ColorFrame {
            width: intrinsics.width,
            height: intrinsics.height,
            sequence,
            data: vec![0u8; intrinsics.width as usize * intrinsics.height as usize * 3],
        };
        Ok(AlignedCapture { intrinsics, color, depth: self.paint_depth(frame) })
    }
}

pub struct ScriptedDetector {
    frames: Vec<SceneFrame>,
}

impl Detector for ScriptedDetector {
    fn detect(
        &mut self,
        frame: &ColorFrame,
        want_label: Option<&str>,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<LabeledBox>> {
        let objects = usize::try_from(frame.sequence)
            .ok()
            .and_then(|i| self.frames.get(i))
            .map(|f| f.objects.as_slice())
            .unwrap_or_default();
        let hits = objects
            .iter()
            .map(|o| LabeledBox::new(o.bbox, o.label.clone(), o.confidence))
            .collect();
        let ranked = rank_hits(hits, want_label, confidence_threshold);
        debug!("detect: frame {} want {:?} -> {} hits", frame.sequence, want_label, ranked.len());
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FRAME_SCENE: &str = r#"{
        "intrinsics": {"width": 64, "height": 48, "ppx": 32.0, "ppy": 24.0, "fx": 60.0, "fy": 60.0},
        "frames": [
            {"objects": [
                {"label": "Apple", "confidence": 0.7, "bbox": {"x1": 10, "y1": 10, "x2": 20, "y2": 20}, "depth_meters": 0.45},
                {"label": "apple", "confidence": 0.9, "bbox": {"x1": 30, "y1": 20, "x2": 34, "y2": 28}, "depth_meters": 0.5}
            ]},
            {}
        ]
    }"#;

    #[test]
    fn test_capture_paints_depth_over_boxes() {
        let scene = Scene::from_json(TWO_FRAME_SCENE).unwrap();
        let mut camera = scene.camera();
        let capture = camera.capture_aligned().unwrap();
        assert_eq!(capture.color.sequence, 0);
        assert!((capture.depth.distance_at((15, 15)) - 0.45).abs() < 1e-9);
        assert!((capture.depth.distance_at((32, 24)) - 0.5).abs() < 1e-9);
        assert_eq!(capture.depth.distance_at((0, 0)), 0.0);
    }

    #[test]
    fn test_detector_ranks_hits_for_frame() {
        let scene = Scene::from_json(TWO_FRAME_SCENE).unwrap();
        let mut camera = scene.camera();
        let mut detector = scene.detector();

        let first = camera.capture_aligned().unwrap();
        let hits = detector.detect(&first.color, Some("apple"), 0.5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].bbox.center(), (32, 24));

        let second = camera.capture_aligned().unwrap();
        assert!(detector.detect(&second.color, Some("apple"), 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_exhausted_script_yields_empty_frames() {
        let scene = Scene::from_json(TWO_FRAME_SCENE).unwrap();
        let mut camera = scene.camera();
        let mut detector = scene.detector();
        for _ in 0..2 {
            camera.capture_aligned().unwrap();
        }
        let third = camera.capture_aligned().unwrap();
        assert_eq!(third.color.sequence, 2);
        assert!(detector.detect(&third.color, None, 0.0).unwrap().is_empty());
        assert_eq!(third.depth.distance_at((15, 15)), 0.0);
    }

    #[test]
    fn test_boxes_outside_image_are_clipped() {
        let scene = Scene::from_json(r#"{
            "intrinsics": {"width": 4, "height": 4, "ppx": 2.0, "ppy": 2.0, "fx": 1.0, "fy": 1.0},
            "frames": [{"objects": [{"label": "x", "confidence": 1.0, "bbox": {"x1": -5, "y1": -5, "x2": 50, "y2": 50}, "depth_meters": 1.0}]}]
        }"#).unwrap();
        let capture = scene.camera().capture_aligned().unwrap();
        assert!(capture.depth.data.iter().all(|raw| *raw == 1000));
    }
}
