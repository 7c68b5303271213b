use std::sync::Arc;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::identity::domain::identity_resolver::IdentityResolver;
use crate::pipeline::identify_faces_use_case::IdentifyFacesUseCase;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::{ConfigError, TrackerConfig};
use crate::shared::frame::Frame;
use crate::tracking::domain::track::Track;
use crate::tracking::domain::track_associator::AssociationParams;
use crate::tracking::domain::track_event::{TrackCallbacks, TrackEvent};
use crate::tracking::infrastructure::event_dispatcher::{EventDispatcher, EventSink};
use crate::tracking::infrastructure::identification_scheduler::{
    IdentificationContext, IdentificationScheduler,
};
use crate::tracking::infrastructure::track_registry::TrackRegistry;

/// Tracks faces frame by frame and names them in the background.
///
/// `update` only locates and associates faces; detection with descriptors
/// and identity lookup run on the identification worker, and callbacks on
/// the event dispatcher. Both threads are joined by [`FaceTracker::stop`]
/// or on drop.
pub struct FaceTracker {
    config: TrackerConfig,
    detector: Arc<dyn FaceDetector>,
    registry: Arc<TrackRegistry>,
    events: EventSink,
    scheduler: IdentificationScheduler,
    dispatcher: EventDispatcher,
    stopped: bool,
}

impl FaceTracker {
    pub fn start(
        config: TrackerConfig,
        detector: Arc<dyn FaceDetector>,
        resolver: Arc<dyn IdentityResolver>,
        callbacks: TrackCallbacks,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(TrackRegistry::new());
        let dispatcher = EventDispatcher::start(callbacks, config.event_queue_capacity);
        let events = dispatcher.sink();
        let scheduler = IdentificationScheduler::start(
            IdentificationContext {
                registry: registry.clone(),
                identify: IdentifyFacesUseCase::new(detector.clone(), resolver),
                events: events.clone(),
                max_relative_shift: config.max_relative_shift,
            },
            config.identification_interval(),
        );

        log::info!(
            "Face tracker started (shift {}, tolerance {} frames, interval {:?})",
            config.max_relative_shift,
            config.missing_frames_tolerance,
            config.identification_interval()
        );

        Ok(Self {
            config,
            detector,
            registry,
            events,
            scheduler,
            dispatcher,
            stopped: false,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Locates faces in `frame` and returns the tracks after association.
    pub fn update(&self, frame: Frame) -> Result<Vec<Track>, DetectionError> {
        let boxes = self.detector.locate(&frame)?;
        Ok(self.track(frame, &boxes))
    }

    /// Same as [`FaceTracker::update`] for boxes the caller already has.
    pub fn track(&self, frame: Frame, boxes: &[BoundingBox]) -> Vec<Track> {
        let index = frame.index();
        self.registry.set_frame(Arc::new(frame));
        let params = AssociationParams::from(&self.config);
        // Published under the registry lock, so no identification of a
        // track can be queued before its appearance or after its eviction.
        let association = self.registry.apply_detections_with(boxes, params, |association| {
            for track in &association.created {
                self.events.publish(TrackEvent::Appeared(track.clone()));
            }
            for track in &association.evicted {
                log::debug!("Frame {index}: track {} left", track.id());
                self.events.publish(TrackEvent::Disappeared(track.clone()));
            }
        });

        if association.newly_created() {
            log::debug!(
                "Frame {index}: {} new tracks, identifying early",
                association.created.len()
            );
            self.scheduler.trigger();
        }
        association.tracks
    }

    /// Current tracks without advancing a frame.
    pub fn tracks(&self) -> Vec<Track> {
        self.registry.snapshot()
    }

    pub fn trigger_identification(&self) {
        self.scheduler.trigger();
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    /// Stops identification, then delivers pending events. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.scheduler.stop();
        self.dispatcher.stop();
        log::info!("Face tracker stopped");
    }
}

impl Drop for FaceTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
