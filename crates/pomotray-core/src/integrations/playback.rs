//! Single-slot playback dispatcher.
//!
//! Playback calls are slow and some are delayed on purpose, so they run on
//! one background thread. There is at most one pending request: a new
//! submission replaces it, and a request that is superseded while waiting
//! out its delay is dropped.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use super::traits::PlaybackGateway;

struct Request {
    uri: Option<String>,
    due: Instant,
}

#[derive(Default)]
struct Slot {
    pending: Option<Request>,
    shutdown: bool,
}

struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct PlaybackDispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackDispatcher {
    pub fn new(gateway: Arc<dyn PlaybackGateway>) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::default()),
            wake: Condvar::new(),
        });
        let worker = std::thread::Builder::new()
            .name("pomotray-playback".into())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(&shared, gateway.as_ref())
            })?;
        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queue a switch to `uri` (`None` pauses) after `delay`.
    pub fn submit(&self, uri: Option<String>, delay: Duration) {
        let mut slot = self.shared.lock();
        if slot.shutdown {
            warn!("playback dispatcher already shut down, dropping request");
            return;
        }
        if slot.pending.is_some() {
            debug!("superseding pending playback request");
        }
        slot.pending = Some(Request {
            uri,
            due: Instant::now() + delay,
        });
        self.shared.wake.notify_all();
    }

    /// Drop any pending request and wait for the worker to finish.
    pub fn shutdown(&self) {
        {
            let mut slot = self.shared.lock();
            slot.shutdown = true;
            slot.pending = None;
            self.shared.wake.notify_all();
        }
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("playback worker panicked");
            }
        }
    }
}

impl Drop for PlaybackDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, gateway: &dyn PlaybackGateway) {
    let mut slot = shared.lock();
    loop {
        if slot.shutdown {
            return;
        }
        let Some(due) = slot.pending.as_ref().map(|r| r.due) else {
            slot = shared
                .wake
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            continue;
        };

        let now = Instant::now();
        if due > now {
            // A newer submission replaces the request while we wait.
            slot = shared
                .wake
                .wait_timeout(slot, due - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
            continue;
        }

        let Some(request) = slot.pending.take() else {
            continue;
        };
        drop(slot);

        match gateway.switch_to(request.uri.as_deref()) {
            Ok(()) => debug!(uri = ?request.uri, "playback switched"),
            Err(e) => error!(error = %e, uri = ?request.uri, "playback request failed"),
        }
        slot = shared.lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl PlaybackGateway for Recorder {
        fn play_playlist(&self, uri: &str) -> Result<(), GatewayError> {
            self.calls.lock().unwrap().push(format!("play {uri}"));
            Ok(())
        }

        fn pause_playback(&self) -> Result<(), GatewayError> {
            self.calls.lock().unwrap().push("pause".into());
            Ok(())
        }

        fn currently_playing(&self) -> Result<bool, GatewayError> {
            Ok(false)
        }
    }

    fn wait_for(recorder: &Recorder, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let calls = recorder.calls.lock().unwrap().clone();
            if calls.len() >= count || Instant::now() > deadline {
                return calls;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn runs_submitted_request() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = PlaybackDispatcher::new(recorder.clone()).unwrap();
        dispatcher.submit(Some("spotify:playlist:a".into()), Duration::ZERO);
        assert_eq!(wait_for(&recorder, 1), vec!["play spotify:playlist:a"]);
        dispatcher.shutdown();
    }

    #[test]
    fn empty_uri_pauses() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = PlaybackDispatcher::new(recorder.clone()).unwrap();
        dispatcher.submit(Some("  ".into()), Duration::ZERO);
        assert_eq!(wait_for(&recorder, 1), vec!["pause"]);
    }

    #[test]
    fn newer_submission_supersedes_delayed_one() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = PlaybackDispatcher::new(recorder.clone()).unwrap();
        dispatcher.submit(None, Duration::from_millis(300));
        dispatcher.submit(Some("spotify:playlist:b".into()), Duration::from_millis(20));
        assert_eq!(wait_for(&recorder, 1), vec!["play spotify:playlist:b"]);
        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(recorder.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn shutdown_drops_pending_request() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = PlaybackDispatcher::new(recorder.clone()).unwrap();
        dispatcher.submit(None, Duration::from_secs(10));
        dispatcher.shutdown();
        dispatcher.submit(None, Duration::ZERO);
        assert!(recorder.calls.lock().unwrap().is_empty());
    }
}
