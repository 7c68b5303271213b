use std::collections::HashMap;
use std::sync::Arc;

use crate::detection::domain::face_detector::{DetectedFace, DetectionError, FaceDetector};
use crate::shared::frame::Frame;

/// Replays pre-computed detection results by frame index.
///
/// Frames missing from the script yield no faces. Used to drive the tracker
/// offline from recorded detections.
pub struct ReplayFaceDetector {
    script: Arc<HashMap<usize, Vec<DetectedFace>>>,
}

impl ReplayFaceDetector {
    pub fn new(script: Arc<HashMap<usize, Vec<DetectedFace>>>) -> Self {
        Self { script }
    }

    pub fn frame_count(&self) -> usize {
        self.script.keys().max().map_or(0, |last| last + 1)
    }
}

impl FaceDetector for ReplayFaceDetector {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError> {
        Ok(self
            .script
            .get(&frame.index())
            .cloned()
            .unwrap_or_default())
    }
}
