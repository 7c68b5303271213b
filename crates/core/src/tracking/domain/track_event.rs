use thiserror::Error;

use crate::tracking::domain::track::{Track, TrackId};

/// Lifecycle change of a tracked face.
///
/// `Disappeared` is also raised for a track whose identity is replaced; the
/// payload then still carries the stale identity.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackEvent {
    Appeared(Track),
    Identified(Track),
    Disappeared(Track),
}

impl TrackEvent {
    pub fn track(&self) -> &Track {
        match self {
            TrackEvent::Appeared(track)
            | TrackEvent::Identified(track)
            | TrackEvent::Disappeared(track) => track,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TrackEvent::Appeared(_) => "appearance",
            TrackEvent::Identified(_) => "identification",
            TrackEvent::Disappeared(_) => "disappearance",
        }
    }
}

#[derive(Error, Debug)]
#[error("{event} callback for track {track} failed: {message}")]
pub struct CallbackFailure {
    pub event: &'static str,
    pub track: TrackId,
    pub message: String,
}

pub type CallbackResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type TrackCallback = Box<dyn Fn(&Track) -> CallbackResult + Send + Sync>;

/// Optional user hooks, run on the event dispatcher thread.
#[derive(Default)]
pub struct TrackCallbacks {
    pub on_appearance: Option<TrackCallback>,
    pub on_identification: Option<TrackCallback>,
    pub on_disappearance: Option<TrackCallback>,
}

impl TrackCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_appearance<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Track) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_appearance = Some(Box::new(callback));
        self
    }

    pub fn with_identification<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Track) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_identification = Some(Box::new(callback));
        self
    }

    pub fn with_disappearance<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Track) -> CallbackResult + Send + Sync + 'static,
    {
        self.on_disappearance = Some(Box::new(callback));
        self
    }

    /// Runs the hook matching `event`, if one is registered.
    pub fn dispatch(&self, event: &TrackEvent) -> Result<(), CallbackFailure> {
        let callback = match event {
            TrackEvent::Appeared(_) => &self.on_appearance,
            TrackEvent::Identified(_) => &self.on_identification,
            TrackEvent::Disappeared(_) => &self.on_disappearance,
        };
        let Some(callback) = callback else {
            return Ok(());
        };
        callback(event.track()).map_err(|e| CallbackFailure {
            event: event.kind(),
            track: event.track().id(),
            message: e.to_string(),
        })
    }
}
