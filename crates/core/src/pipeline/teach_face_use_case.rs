use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::identity::domain::identity::{Identity, IdentityId};
use crate::identity::domain::identity_error::IdentityError;
use crate::identity::domain::identity_resolver::IdentityResolver;
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum TeachError {
    #[error("teaching needs exactly one face in the frame, found {0}")]
    AmbiguousFaceCount(usize),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

/// Teaches the single face visible in a frame to the resolver.
pub struct TeachFaceUseCase {
    detector: Arc<dyn FaceDetector>,
    resolver: Arc<dyn IdentityResolver>,
}

impl TeachFaceUseCase {
    pub fn new(detector: Arc<dyn FaceDetector>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { detector, resolver }
    }

    pub fn execute(
        &self,
        frame: &Frame,
        name: Option<&str>,
        id: Option<IdentityId>,
        weight: f64,
    ) -> Result<Identity, TeachError> {
        let mut faces = self.detector.detect(frame)?;
        if faces.len() != 1 {
            return Err(TeachError::AmbiguousFaceCount(faces.len()));
        }
        let face = faces.remove(0);
        let identity = self.resolver.teach(&face.vector, name, id, weight)?;
        log::info!(
            "Taught frame {} face at {} as {} '{}'",
            frame.index(),
            face.bbox,
            identity.id,
            identity.name
        );
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::DetectedFace;
    use crate::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
    use crate::identity::domain::identity_resolver::DEFAULT_TEACH_WEIGHT;
    use crate::identity::infrastructure::identity_store::IdentityStore;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::config::IdentityStoreConfig;
    use crate::shared::constants::FEATURE_DIMENSION;
    use crate::shared::feature_vector::FeatureVector;
    use rstest::rstest;
    use std::collections::HashMap;

    struct OfflineDetector;

    impl FaceDetector for OfflineDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, DetectionError> {
            Err(DetectionError::Unavailable("camera unplugged".into()))
        }
    }

    fn face(left: i32, value: f64) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox::new(left, 0, left + 40, 40),
            vector: FeatureVector::new(vec![value; FEATURE_DIMENSION]).unwrap(),
        }
    }

    /// Frame `n` shows `n` faces.
    fn use_case() -> (TeachFaceUseCase, Arc<IdentityStore>) {
        let script: HashMap<usize, Vec<DetectedFace>> = (0..4)
            .map(|n| (n, (0..n).map(|i| face(i as i32 * 100, i as f64)).collect()))
            .collect();
        let store = Arc::new(IdentityStore::in_memory(IdentityStoreConfig::default()).unwrap());
        let use_case = TeachFaceUseCase::new(
            Arc::new(ReplayFaceDetector::new(Arc::new(script))),
            store.clone(),
        );
        (use_case, store)
    }

    #[test]
    fn test_teaches_single_face() {
        let (use_case, store) = use_case();

        let identity = use_case
            .execute(&Frame::placeholder(1), Some("Ada"), None, DEFAULT_TEACH_WEIGHT)
            .unwrap();

        assert_eq!(identity.name, "Ada");
        assert_eq!(store.lookup(Some("Ada"), None).unwrap().id, identity.id);
    }

    #[rstest]
    #[case::no_face(0)]
    #[case::two_faces(2)]
    #[case::three_faces(3)]
    fn test_rejects_ambiguous_frames(#[case] frame: usize) {
        let (use_case, store) = use_case();

        let result = use_case.execute(&Frame::placeholder(frame), Some("Ada"), None, 1.0);

        assert!(matches!(result, Err(TeachError::AmbiguousFaceCount(n)) if n == frame));
        assert!(store.is_empty());
    }

    #[test]
    fn test_resolver_errors_pass_through() {
        let (use_case, _) = use_case();
        assert!(matches!(
            use_case.execute(&Frame::placeholder(1), None, None, 1.0),
            Err(TeachError::Identity(IdentityError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_detection_errors_pass_through() {
        let store = Arc::new(IdentityStore::in_memory(IdentityStoreConfig::default()).unwrap());
        let use_case = TeachFaceUseCase::new(Arc::new(OfflineDetector), store);
        assert!(matches!(
            use_case.execute(&Frame::placeholder(0), Some("Ada"), None, 1.0),
            Err(TeachError::Detection(DetectionError::Unavailable(_)))
        ));
    }
}
