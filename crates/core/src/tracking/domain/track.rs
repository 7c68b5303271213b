use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use uuid::Uuid;

use crate::identity::domain::identity::{Identity, IdentityId};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::BOX_HISTORY_LEN;

pub type TrackId = Uuid;

static NEXT_ORDINAL: AtomicU64 = AtomicU64::new(0);

/// The person a track has been resolved to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackIdentity {
    pub person_id: IdentityId,
    pub name: String,
}

impl From<&Identity> for TrackIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            person_id: identity.id,
            name: identity.name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentificationStatus {
    Pending,
    Identified,
}

/// One physically persistent face across consecutive frames.
///
/// The position is the mean of the last [`BOX_HISTORY_LEN`] observed boxes.
/// `ordinal` increases with creation time and fixes the scan order of
/// association.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    id: TrackId,
    ordinal: u64,
    history: VecDeque<BoundingBox>,
    smoothed: BoundingBox,
    frames_missing: u32,
    identity: Option<TrackIdentity>,
    identified_at: Option<SystemTime>,
    appeared_at: SystemTime,
    disappeared_at: Option<SystemTime>,
}

impl Track {
    pub fn new(bbox: BoundingBox) -> Self {
        let mut history = VecDeque::with_capacity(BOX_HISTORY_LEN);
        history.push_back(bbox);
        Self {
            id: Uuid::new_v4(),
            ordinal: NEXT_ORDINAL.fetch_add(1, Ordering::Relaxed),
            history,
            smoothed: bbox,
            frames_missing: 0,
            identity: None,
            identified_at: None,
            appeared_at: SystemTime::now(),
            disappeared_at: None,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn smoothed_box(&self) -> BoundingBox {
        self.smoothed
    }

    pub fn history(&self) -> impl Iterator<Item = &BoundingBox> {
        self.history.iter()
    }

    pub fn frames_missing(&self) -> u32 {
        self.frames_missing
    }

    pub fn identity(&self) -> Option<&TrackIdentity> {
        self.identity.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.name.as_str())
    }

    pub fn status(&self) -> IdentificationStatus {
        match self.identity {
            Some(_) => IdentificationStatus::Identified,
            None => IdentificationStatus::Pending,
        }
    }

    pub fn identified_at(&self) -> Option<SystemTime> {
        self.identified_at
    }

    pub fn appeared_at(&self) -> SystemTime {
        self.appeared_at
    }

    pub fn disappeared_at(&self) -> Option<SystemTime> {
        self.disappeared_at
    }

    /// Whether `bbox` continues this track, judged against the smoothed box.
    pub fn is_same_face(&self, bbox: &BoundingBox, max_relative_shift: f64) -> bool {
        self.smoothed.is_same_face(bbox, max_relative_shift)
    }

    /// Records a detection in this frame.
    pub fn observe(&mut self, bbox: BoundingBox) {
        if self.history.len() == BOX_HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(bbox);
        self.frames_missing = 0;
        if let Some(mean) = BoundingBox::mean(&self.history) {
            self.smoothed = mean;
        }
    }

    /// Counts one more frame without a detection and returns the new total.
    pub fn mark_missing(&mut self) -> u32 {
        self.frames_missing = self.frames_missing.saturating_add(1);
        self.frames_missing
    }

    pub fn mark_disappeared(&mut self, at: SystemTime) {
        self.disappeared_at = Some(at);
    }

    /// Replaces the resolved identity, returning the previous one.
    pub fn identify_as(&mut self, identity: TrackIdentity, at: SystemTime) -> Option<TrackIdentity> {
        self.identified_at = Some(at);
        self.identity.replace(identity)
    }
}
