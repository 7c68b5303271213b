use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::identify_faces_use_case::{IdentifiedFace, IdentifyFacesUseCase};
use crate::tracking::domain::track::{Track, TrackIdentity};
use crate::tracking::domain::track_event::TrackEvent;
use crate::tracking::infrastructure::event_dispatcher::EventSink;
use crate::tracking::infrastructure::track_registry::TrackRegistry;

/// What one identification cycle needs, moved into the worker thread.
pub struct IdentificationContext {
    pub registry: Arc<TrackRegistry>,
    pub identify: IdentifyFacesUseCase,
    pub events: EventSink,
    pub max_relative_shift: f64,
}

/// Background worker that resolves tracked faces to identities.
///
/// Runs one cycle per interval, or earlier when triggered. Cycles never
/// overlap, and triggers raised while a cycle runs coalesce into one extra
/// run.
pub struct IdentificationScheduler {
    trigger: Sender<()>,
    shutdown: Option<Sender<()>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl IdentificationScheduler {
    pub fn start(context: IdentificationContext, interval: Duration) -> Self {
        let (trigger_tx, trigger_rx) = crossbeam_channel::bounded::<()>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = cancelled.clone();
        let handle = std::thread::spawn(move || {
            run_loop(&context, interval, trigger_rx, shutdown_rx, flag)
        });

        Self {
            trigger: trigger_tx,
            shutdown: Some(shutdown_tx),
            cancelled,
            handle: Some(handle),
        }
    }

    /// Requests a cycle before the next interval elapses.
    pub fn trigger(&self) {
        // Full means a run is already pending.
        let _ = self.trigger.try_send(());
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancels the loop and waits for the current cycle to finish.
    pub fn stop(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Identification worker panicked");
            }
        }
    }
}

impl Drop for IdentificationScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    context: &IdentificationContext,
    interval: Duration,
    trigger: Receiver<()>,
    shutdown: Receiver<()>,
    cancelled: Arc<AtomicBool>,
) {
    log::debug!("Identification worker started (interval {interval:?})");
    loop {
        crossbeam_channel::select! {
            recv(trigger) -> msg => if msg.is_err() { break },
            recv(shutdown) -> _ => break,
            default(interval) => {},
        }
        if cancelled.load(Ordering::Relaxed) {
            break;
        }
        run_cycle(context);
    }
    log::debug!("Identification worker stopped");
}

/// One pass: detect on the latest frame, resolve each face, then write the
/// results into the tracks that still match. Events are published before
/// the registry lock is released.
pub fn run_cycle(context: &IdentificationContext) {
    let Some(frame) = context.registry.latest_frame() else {
        log::debug!("No frame yet, skipping identification");
        return;
    };

    let results = match context.identify.execute(&frame) {
        Ok(results) => results,
        Err(e) => {
            log::warn!("Identification skipped for frame {}: {e}", frame.index());
            return;
        }
    };

    let now = SystemTime::now();
    let shift = context.max_relative_shift;
    let events = &context.events;
    context.registry.modify(|tracks| {
        let mut claimed = vec![false; tracks.len()];

        for IdentifiedFace { bbox, identity } in results {
            let identity = match identity {
                Ok(identity) => identity,
                Err(e) => {
                    log::warn!("Could not identify face at {bbox}: {e}");
                    continue;
                }
            };
            let candidate = tracks
                .iter()
                .enumerate()
                .position(|(i, track)| !claimed[i] && track.is_same_face(&bbox, shift));
            let Some(i) = candidate else {
                log::debug!("No track matches face at {bbox} identified as '{}'", identity.name);
                continue;
            };
            claimed[i] = true;

            let resolved = TrackIdentity::from(&identity);
            let track: &mut Track = &mut *tracks[i];
            if track.identity() == Some(&resolved) {
                continue;
            }
            if track.identity().is_some() {
                events.publish(TrackEvent::Disappeared(track.clone()));
            }
            track.identify_as(resolved, now);
            log::info!("Track {} identified as {} '{}'", track.id(), identity.id, identity.name);
            events.publish(TrackEvent::Identified(track.clone()));
        }
    });
}
