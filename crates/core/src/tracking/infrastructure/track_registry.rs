use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::tracking::domain::track::{Track, TrackId};
use crate::tracking::domain::track_associator::{associate, Association, AssociationParams};

/// Live tracks shared between the frame loop and the identification worker.
///
/// Tracks and the latest frame sit behind separate locks so that handing
/// over a frame never waits on a track scan.
#[derive(Default)]
pub struct TrackRegistry {
    tracks: RwLock<HashMap<TrackId, Track>>,
    frame: Mutex<Option<Arc<Frame>>>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TrackId, Track>> {
        self.tracks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TrackId, Track>> {
        self.tracks.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upsert(&self, track: Track) -> Option<Track> {
        self.write().insert(track.id(), track)
    }

    pub fn remove(&self, id: TrackId) -> Option<Track> {
        self.write().remove(&id)
    }

    pub fn get(&self, id: TrackId) -> Option<Track> {
        self.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every live track, oldest first.
    pub fn snapshot(&self) -> Vec<Track> {
        let mut tracks: Vec<Track> = self.read().values().cloned().collect();
        tracks.sort_by_key(Track::ordinal);
        tracks
    }

    /// Overwrites the frame slot; only the most recent frame is kept.
    pub fn set_frame(&self, frame: Arc<Frame>) {
        *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs association against the current tracks as one atomic update.
    pub fn apply_detections(
        &self,
        detections: &[BoundingBox],
        params: AssociationParams,
    ) -> Association {
        self.apply_detections_with(detections, params, |_| {})
    }

    /// As [`TrackRegistry::apply_detections`], calling `on_applied` before
    /// the write lock is released. Anything `on_applied` publishes is
    /// ordered against writes made through [`TrackRegistry::modify`].
    pub fn apply_detections_with(
        &self,
        detections: &[BoundingBox],
        params: AssociationParams,
        on_applied: impl FnOnce(&Association),
    ) -> Association {
        let mut tracks = self.write();
        let mut existing: Vec<Track> = tracks.drain().map(|(_, track)| track).collect();
        existing.sort_by_key(Track::ordinal);

        let association = associate(existing, detections, params);
        tracks.extend(
            association
                .tracks
                .iter()
                .map(|track| (track.id(), track.clone())),
        );
        on_applied(&association);
        association
    }

    /// Runs `f` over all tracks, oldest first, under the write lock.
    pub fn modify<R>(&self, f: impl FnOnce(&mut [&mut Track]) -> R) -> R {
        let mut tracks = self.write();
        let mut ordered: Vec<&mut Track> = tracks.values_mut().collect();
        ordered.sort_by_key(|track| track.ordinal());
        f(&mut ordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::domain::track::TrackIdentity;
    use std::time::SystemTime;

    fn bbox(l: i32, t: i32, r: i32, b: i32) -> BoundingBox {
        BoundingBox::new(l, t, r, b)
    }

    fn params() -> AssociationParams {
        AssociationParams {
            max_relative_shift: 0.8,
            missing_frames_tolerance: 0,
        }
    }

    #[test]
    fn test_upsert_get_remove() {
        let registry = TrackRegistry::new();
        let track = Track::new(bbox(0, 0, 10, 10));
        let id = track.id();

        assert!(registry.upsert(track.clone()).is_none());
        assert_eq!(registry.get(id), Some(track.clone()));
        assert_eq!(registry.remove(id), Some(track));
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_in_creation_order() {
        let registry = TrackRegistry::new();
        let tracks: Vec<Track> = (0..6).map(|i| Track::new(bbox(i * 100, 0, i * 100 + 50, 50))).collect();
        for track in tracks.iter().rev() {
            registry.upsert(track.clone());
        }

        let ids: Vec<TrackId> = registry.snapshot().iter().map(Track::id).collect();
        let expected: Vec<TrackId> = tracks.iter().map(Track::id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_latest_frame_wins() {
        let registry = TrackRegistry::new();
        assert!(registry.latest_frame().is_none());

        registry.set_frame(Arc::new(Frame::placeholder(1)));
        registry.set_frame(Arc::new(Frame::placeholder(2)));

        assert_eq!(registry.latest_frame().map(|f| f.index()), Some(2));
    }

    #[test]
    fn test_apply_detections_replaces_track_set() {
        let registry = TrackRegistry::new();
        let first = registry.apply_detections(&[bbox(0, 0, 100, 100)], params());
        let id = first.tracks[0].id();

        let second = registry.apply_detections(&[bbox(5, 0, 105, 100), bbox(400, 0, 500, 100)], params());

        assert_eq!(second.created.len(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.snapshot()[0].id(), id);

        let third = registry.apply_detections(&[], params());
        assert_eq!(third.evicted.len(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_modify_preserves_identity_across_association() {
        let registry = TrackRegistry::new();
        registry.apply_detections(&[bbox(0, 0, 100, 100)], params());

        registry.modify(|tracks| {
            tracks[0].identify_as(
                TrackIdentity {
                    person_id: 3,
                    name: "Ada".into(),
                },
                SystemTime::now(),
            );
        });
        let result = registry.apply_detections(&[bbox(2, 2, 102, 102)], params());

        assert_eq!(result.tracks[0].name(), Some("Ada"));
        assert_eq!(registry.snapshot()[0].name(), Some("Ada"));
    }

    #[test]
    fn test_apply_detections_with_runs_under_write_lock() {
        let registry = TrackRegistry::new();
        registry.apply_detections(&[bbox(0, 0, 100, 100)], params());

        let mut seen = None;
        let result = registry.apply_detections_with(&[], params(), |association| {
            seen = Some(association.evicted.len());
            assert!(registry.tracks.try_read().is_err());
        });

        assert_eq!(seen, Some(1));
        assert_eq!(result.evicted.len(), 1);
    }

    #[test]
    fn test_concurrent_readers_see_whole_updates() {
        let registry = Arc::new(TrackRegistry::new());
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let shift = i % 10;
                    registry.apply_detections(
                        &[bbox(shift, 0, shift + 100, 100), bbox(300 + shift, 0, 400 + shift, 100)],
                        params(),
                    );
                }
            })
        };
        for _ in 0..200 {
            let snapshot = registry.snapshot();
            assert!(snapshot.is_empty() || snapshot.len() == 2);
        }
        writer.join().unwrap();
        assert_eq!(registry.len(), 2);
    }
}
