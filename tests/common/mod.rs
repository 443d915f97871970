//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use crossbeam_channel::{unbounded, Receiver};
use pipectl::controller::ThreadContext;
use pipectl::types::SurfaceHandle;
use pipectl::{Controller, MediaEngine, PlayerEvent, RunState};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Upper bound for waiting on a single notification
pub fn test_timeout() -> Duration {
    Duration::from_secs(2)
}

/// How long a channel must stay silent to count as drained
pub fn quiet_period() -> Duration {
    Duration::from_millis(100)
}

/// Controller wired to a channel, with the leading `Loaded` already consumed
pub fn start(engine: impl MediaEngine + 'static) -> (Controller, Receiver<PlayerEvent>) {
    let (tx, rx) = unbounded();
    let controller = Controller::new("test", engine, tx).expect("controller should start");
    expect_loaded(&rx);
    (controller, rx)
}

pub fn expect_loaded(rx: &Receiver<PlayerEvent>) {
    let first = rx
        .recv_timeout(test_timeout())
        .expect("worker should announce itself");
    assert_eq!(first, PlayerEvent::Loaded, "Loaded must be the first notification");
}

/// Receive until `pred` matches, returning every event seen including the match
pub fn wait_for(
    rx: &Receiver<PlayerEvent>,
    mut pred: impl FnMut(&PlayerEvent) -> bool,
) -> Vec<PlayerEvent> {
    let deadline = Instant::now() + test_timeout();
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(event) => {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(_) => panic!("timed out waiting for event; saw {:?}", seen),
        }
    }
}

pub fn wait_for_state(rx: &Receiver<PlayerEvent>, state: RunState) -> Vec<PlayerEvent> {
    wait_for(rx, |e| matches!(e, PlayerEvent::StateChanged { new, .. } if *new == state))
}

/// Collect everything that arrives until the channel goes quiet
pub fn drain(rx: &Receiver<PlayerEvent>) -> Vec<PlayerEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.recv_timeout(quiet_period()) {
        seen.push(event);
    }
    seen
}

pub fn errors(events: &[PlayerEvent]) -> Vec<(String, String, String)> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::Error {
                source,
                message,
                debug,
            } => Some((source.clone(), message.clone(), debug.clone())),
            _ => None,
        })
        .collect()
}

pub fn surface(raw: usize) -> SurfaceHandle {
    SurfaceHandle::from_raw(raw).expect("non-zero handle")
}

/// Shared log for releasers and thread contexts
#[derive(Debug, Clone)]
pub struct Recorder<T>(Arc<Mutex<Vec<T>>>);

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }
}

impl<T: Clone> Recorder<T> {
    pub fn push(&self, item: T) {
        self.0.lock().unwrap().push(item);
    }

    pub fn items(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }
}

/// Thread context that logs attach and detach with the calling thread's name
pub struct RecordingContext(pub Recorder<(String, Option<String>)>);

impl ThreadContext for RecordingContext {
    fn attach(&mut self) {
        let thread = std::thread::current().name().map(str::to_string);
        self.0.push(("attach".to_string(), thread));
    }

    fn detach(&mut self) {
        let thread = std::thread::current().name().map(str::to_string);
        self.0.push(("detach".to_string(), thread));
    }
}
