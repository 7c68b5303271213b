use std::sync::Arc;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::identity::domain::identity::Identity;
use crate::identity::domain::identity_error::IdentityError;
use crate::identity::domain::identity_resolver::IdentityResolver;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Outcome for one face of a frame.
#[derive(Debug)]
pub struct IdentifiedFace {
    pub bbox: BoundingBox,
    pub identity: Result<Identity, IdentityError>,
}

/// Detects every face in a frame and resolves each to an identity.
///
/// A failed lookup is reported on its own face and does not stop the rest.
pub struct IdentifyFacesUseCase {
    detector: Arc<dyn FaceDetector>,
    resolver: Arc<dyn IdentityResolver>,
}

impl IdentifyFacesUseCase {
    pub fn new(detector: Arc<dyn FaceDetector>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self { detector, resolver }
    }

    pub fn execute(&self, frame: &Frame) -> Result<Vec<IdentifiedFace>, DetectionError> {
        let faces = self.detector.detect(frame)?;
        log::debug!("Frame {}: {} faces to identify", frame.index(), faces.len());

        Ok(faces
            .into_iter()
            .map(|face| IdentifiedFace {
                bbox: face.bbox,
                identity: self.resolver.identify(&face.vector),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_detector::DetectedFace;
    use crate::detection::infrastructure::replay_face_detector::ReplayFaceDetector;
    use crate::identity::domain::identity::IdentityId;
    use crate::identity::infrastructure::identity_store::IdentityStore;
    use crate::shared::config::IdentityStoreConfig;
    use crate::shared::constants::FEATURE_DIMENSION;
    use crate::shared::feature_vector::FeatureVector;
    use std::collections::HashMap;

    fn axis(k: usize) -> FeatureVector {
        let mut values = vec![0.0; FEATURE_DIMENSION];
        values[k] = 1.0;
        FeatureVector::new(values).unwrap()
    }

    fn face(left: i32, vector: FeatureVector) -> DetectedFace {
        DetectedFace {
            bbox: BoundingBox::new(left, 0, left + 50, 50),
            vector,
        }
    }

    /// Resolves everything except axis 1, which the "server" rejects.
    struct PickyResolver(IdentityStore);

    impl IdentityResolver for PickyResolver {
        fn identify(&self, vector: &FeatureVector) -> Result<Identity, IdentityError> {
            if *vector == axis(1) {
                return Err(IdentityError::RemoteStatus {
                    status: 503,
                    message: "busy".into(),
                });
            }
            self.0.identify(vector)
        }

        fn teach(
            &self,
            vector: &FeatureVector,
            name: Option<&str>,
            id: Option<IdentityId>,
            weight: f64,
        ) -> Result<Identity, IdentityError> {
            self.0.teach(vector, name, id, weight)
        }

        fn lookup(&self, name: Option<&str>, id: Option<IdentityId>) -> Result<Identity, IdentityError> {
            self.0.lookup(name, id)
        }

        fn list(&self) -> Result<Vec<Identity>, IdentityError> {
            self.0.list()
        }

        fn rename(&self, id: IdentityId, name: &str) -> Result<Identity, IdentityError> {
            self.0.rename(id, name)
        }

        fn delete(&self, id: IdentityId) -> Result<Identity, IdentityError> {
            self.0.delete(id)
        }
    }

    fn detector(faces: Vec<DetectedFace>) -> Arc<dyn FaceDetector> {
        Arc::new(ReplayFaceDetector::new(Arc::new(HashMap::from([(0, faces)]))))
    }

    #[test]
    fn test_identifies_every_face() {
        let store = Arc::new(IdentityStore::in_memory(IdentityStoreConfig::default()).unwrap());
        store.teach(&axis(0), Some("Ada"), None, 1.0).unwrap();
        let use_case = IdentifyFacesUseCase::new(
            detector(vec![face(0, axis(0)), face(100, axis(2))]),
            store,
        );

        let results = use_case.execute(&Frame::placeholder(0)).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].bbox, BoundingBox::new(0, 0, 50, 50));
        assert_eq!(results[0].identity.as_ref().unwrap().name, "Ada");
        assert_eq!(results[1].identity.as_ref().unwrap().name, "unknown");
    }

    #[test]
    fn test_one_failure_does_not_abort_others() {
        let store = IdentityStore::in_memory(IdentityStoreConfig::default()).unwrap();
        let use_case = IdentifyFacesUseCase::new(
            detector(vec![face(0, axis(1)), face(100, axis(2))]),
            Arc::new(PickyResolver(store)),
        );

        let results = use_case.execute(&Frame::placeholder(0)).unwrap();

        assert!(matches!(
            results[0].identity,
            Err(IdentityError::RemoteStatus { status: 503, .. })
        ));
        assert!(results[1].identity.is_ok());
    }

    #[test]
    fn test_frame_without_faces() {
        let store = Arc::new(IdentityStore::in_memory(IdentityStoreConfig::default()).unwrap());
        let use_case = IdentifyFacesUseCase::new(detector(Vec::new()), store);
        assert!(use_case.execute(&Frame::placeholder(7)).unwrap().is_empty());
    }
}
