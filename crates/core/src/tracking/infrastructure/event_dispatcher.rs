use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::tracking::domain::track_event::{CallbackFailure, TrackCallbacks, TrackEvent};

/// Producer side of the event queue.
///
/// Publishing never blocks: when the queue is full the event is dropped
/// and a warning logged, so a slow callback cannot stall frame updates.
#[derive(Clone)]
pub struct EventSink {
    sender: Sender<TrackEvent>,
}

impl EventSink {
    pub fn publish(&self, event: TrackEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!(
                    "Event queue full, dropping {} event for track {}",
                    event.kind(),
                    event.track().id()
                );
            }
            Err(TrySendError::Disconnected(event)) => {
                log::debug!(
                    "Event dispatcher stopped, discarding {} event for track {}",
                    event.kind(),
                    event.track().id()
                );
            }
        }
    }
}

/// Runs user callbacks on a dedicated thread, in FIFO order.
pub struct EventDispatcher {
    sink: EventSink,
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    pub fn start(callbacks: TrackCallbacks, capacity: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded::<TrackEvent>(capacity.max(1));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = std::thread::spawn(move || run_loop(callbacks, receiver, shutdown_rx));

        Self {
            sink: EventSink { sender },
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Delivers every event already queued, then joins the worker.
    pub fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Event dispatcher thread panicked");
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(callbacks: TrackCallbacks, events: Receiver<TrackEvent>, shutdown: Receiver<()>) {
    loop {
        crossbeam_channel::select! {
            recv(events) -> event => match event {
                Ok(event) => deliver(&callbacks, &event),
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                for event in events.try_iter() {
                    deliver(&callbacks, &event);
                }
                break;
            }
        }
    }
    log::debug!("Event dispatcher stopped");
}

fn deliver(callbacks: &TrackCallbacks, event: &TrackEvent) {
    match panic::catch_unwind(AssertUnwindSafe(|| callbacks.dispatch(event))) {
        Ok(Ok(())) => {}
        Ok(Err(failure)) => log::warn!("{failure}"),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "callback panicked".to_string());
            let failure = CallbackFailure {
                event: event.kind(),
                track: event.track().id(),
                message,
            };
            log::error!("{failure}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::BoundingBox;
    use crate::tracking::domain::track::Track;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn track() -> Track {
        Track::new(BoundingBox::new(0, 0, 10, 10))
    }

    #[test]
    fn test_events_delivered_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let callbacks = TrackCallbacks::new().with_appearance(move |track| {
            recorder.lock().unwrap().push(track.id());
            Ok(())
        });
        let mut dispatcher = EventDispatcher::start(callbacks, 16);
        let tracks: Vec<Track> = (0..10).map(|_| track()).collect();

        let sink = dispatcher.sink();
        for track in &tracks {
            sink.publish(TrackEvent::Appeared(track.clone()));
        }
        dispatcher.stop();

        let expected: Vec<_> = tracks.iter().map(Track::id).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn test_failing_and_panicking_callbacks_do_not_stop_worker() {
        let delivered = Arc::new(Mutex::new(0));
        let counter = delivered.clone();
        let callbacks = TrackCallbacks::new()
            .with_appearance(|_| Err("boom".into()))
            .with_identification(|_| panic!("callback bug"))
            .with_disappearance(move |_| {
                *counter.lock().unwrap() += 1;
                Ok(())
            });
        let mut dispatcher = EventDispatcher::start(callbacks, 8);

        let sink = dispatcher.sink();
        sink.publish(TrackEvent::Appeared(track()));
        sink.publish(TrackEvent::Identified(track()));
        sink.publish(TrackEvent::Disappeared(track()));
        dispatcher.stop();

        assert_eq!(*delivered.lock().unwrap(), 1);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let delivered = Arc::new(Mutex::new(0));
        let counter = delivered.clone();
        let callbacks = TrackCallbacks::new().with_appearance(move |_| {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
            *counter.lock().unwrap() += 1;
            Ok(())
        });
        let mut dispatcher = EventDispatcher::start(callbacks, 1);

        let sink = dispatcher.sink();
        for _ in 0..20 {
            sink.publish(TrackEvent::Appeared(track()));
        }
        drop(release_tx);
        dispatcher.stop();

        // At most one in the callback plus one queued.
        let count = *delivered.lock().unwrap();
        assert!((1..=2).contains(&count), "delivered {count}");
    }

    #[test]
    fn test_publish_after_stop_is_ignored() {
        let mut dispatcher = EventDispatcher::start(TrackCallbacks::new(), 4);
        let sink = dispatcher.sink();
        dispatcher.stop();
        assert!(!dispatcher.is_running());
        sink.publish(TrackEvent::Appeared(track()));
    }
}
