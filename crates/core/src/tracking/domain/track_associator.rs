//! Greedy first-fit association of detections to tracks.
//!
//! Each detection claims the first unclaimed track, in creation order,
//! whose smoothed box passes the same-face test. There is no global
//! optimisation and no backtracking: an earlier detection may take a track
//! a later one fits better. Tracks created this frame are not matchable
//! until the next frame.

use std::time::SystemTime;

use crate::shared::bounding_box::BoundingBox;
use crate::shared::config::TrackerConfig;
use crate::tracking::domain::track::Track;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AssociationParams {
    pub max_relative_shift: f64,
    pub missing_frames_tolerance: u32,
}

impl From<&TrackerConfig> for AssociationParams {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            max_relative_shift: config.max_relative_shift,
            missing_frames_tolerance: config.missing_frames_tolerance,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Association {
    /// Every live track after this frame, in creation order.
    pub tracks: Vec<Track>,
    /// Tracks opened this frame (also present in `tracks`).
    pub created: Vec<Track>,
    /// Tracks dropped this frame, stamped with their disappearance time.
    pub evicted: Vec<Track>,
}

impl Association {
    pub fn newly_created(&self) -> bool {
        !self.created.is_empty()
    }
}

/// `existing` must be in creation order.
pub fn associate(
    mut existing: Vec<Track>,
    detections: &[BoundingBox],
    params: AssociationParams,
) -> Association {
    let mut claimed = vec![false; existing.len()];
    let mut created = Vec::new();

    for detection in detections {
        let candidate = existing
            .iter()
            .enumerate()
            .position(|(i, track)| {
                !claimed[i] && track.is_same_face(detection, params.max_relative_shift)
            });
        match candidate {
            Some(i) => {
                claimed[i] = true;
                existing[i].observe(*detection);
            }
            None => created.push(Track::new(*detection)),
        }
    }

    let now = SystemTime::now();
    let mut tracks = Vec::with_capacity(existing.len() + created.len());
    let mut evicted = Vec::new();
    for (mut track, matched) in existing.into_iter().zip(claimed) {
        if matched || track.mark_missing() < params.missing_frames_tolerance {
            tracks.push(track);
        } else {
            track.mark_disappeared(now);
            evicted.push(track);
        }
    }
    tracks.extend(created.iter().cloned());

    Association {
        tracks,
        created,
        evicted,
    }
}
