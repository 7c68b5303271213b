use thiserror::Error;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::feature_vector::FeatureVector;
use crate::shared::frame::Frame;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    /// Transient: the model or the remote detection service could not
    /// produce a result for this frame.
    #[error("face detection unavailable: {0}")]
    Unavailable(String),
}

/// One face found in a frame, with its descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub vector: FeatureVector,
}

/// Domain interface for face detection and embedding.
///
/// Shared between the caller's frame loop and the identification worker,
/// hence `&self` and `Sync`. Stateful implementations guard their state
/// internally.
pub trait FaceDetector: Send + Sync {
    /// Full pass: boxes plus descriptors.
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError>;

    /// Boxes only. Runs on every frame, so implementations with a cheaper
    /// box-only path should override it.
    fn locate(&self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
        Ok(self.detect(frame)?.into_iter().map(|f| f.bbox).collect())
    }
}
