//! Caller-facing capability traits
//!
//! - [`PlayerCallbacks`] - Receives the five notifications of a controller
//! - [`SurfaceReleaser`] - Hands surface handles back to their owner
//! - [`ThreadContext`] - Attaches the worker thread to a host runtime
//!
//! Every method is invoked on the controller's worker thread.

use crate::types::{RunState, SurfaceHandle};
use crossbeam_channel::Sender;

/// Notifications delivered by a controller
///
/// All methods default to doing nothing, so an implementation only
/// overrides the slots it cares about.
#[cfg_attr(test, mockall::automock)]
pub trait PlayerCallbacks: Send {
    /// The worker is running. Always the first notification.
    fn on_loaded(&mut self) {}

    /// The pipeline itself changed state
    fn on_state_changed(&mut self, _new: RunState, _old: RunState) {}

    fn on_end_of_stream(&mut self) {}

    /// `source` is the name of the reporting object, `"pipeline"` for
    /// controller-level failures
    fn on_error(&mut self, _source: &str, _message: &str, _debug: &str) {}

    /// A component posted a structured message, serialized as a JSON object
    fn on_element_message(&mut self, _element: &str, _json: &str) {}
}

/// Callback set with every slot unset
impl PlayerCallbacks for () {}

/// Notification as a value, for callers that prefer a channel
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Loaded,
    StateChanged {
        new: RunState,
        old: RunState,
    },
    EndOfStream,
    Error {
        source: String,
        message: String,
        debug: String,
    },
    ElementMessage {
        element: String,
        json: String,
    },
}

/// Forwards every notification into the channel
///
/// Events are dropped once the receiving side is gone.
impl PlayerCallbacks for Sender<PlayerEvent> {
    fn on_loaded(&mut self) {
        let _ = self.send(PlayerEvent::Loaded);
    }

    fn on_state_changed(&mut self, new: RunState, old: RunState) {
        let _ = self.send(PlayerEvent::StateChanged { new, old });
    }

    fn on_end_of_stream(&mut self) {
        let _ = self.send(PlayerEvent::EndOfStream);
    }

    fn on_error(&mut self, source: &str, message: &str, debug: &str) {
        let _ = self.send(PlayerEvent::Error {
            source: source.to_string(),
            message: message.to_string(),
            debug: debug.to_string(),
        });
    }

    fn on_element_message(&mut self, element: &str, json: &str) {
        let _ = self.send(PlayerEvent::ElementMessage {
            element: element.to_string(),
            json: json.to_string(),
        });
    }
}

/// Returns surface handles to the platform layer that owns them
///
/// Called with the previous handle when a different one replaces it, and
/// with the current handle when the controller is destroyed.
pub trait SurfaceReleaser: Send {
    fn release(&mut self, handle: SurfaceHandle);
}

impl<F> SurfaceReleaser for F
where
    F: FnMut(SurfaceHandle) + Send,
{
    fn release(&mut self, handle: SurfaceHandle) {
        self(handle)
    }
}

/// Host-runtime registration for the worker thread
///
/// `attach` runs on the worker before the first callback, `detach` after
/// the last one.
pub trait ThreadContext: Send {
    fn attach(&mut self);
    fn detach(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_sender_forwards_events() {
        let (mut tx, rx) = unbounded();
        tx.on_loaded();
        tx.on_state_changed(RunState::Playing, RunState::Paused);
        tx.on_error("src", "boom", "");

        assert_eq!(rx.try_recv(), Ok(PlayerEvent::Loaded));
        assert_eq!(
            rx.try_recv(),
            Ok(PlayerEvent::StateChanged {
                new: RunState::Playing,
                old: RunState::Paused,
            })
        );
        assert!(matches!(rx.try_recv(), Ok(PlayerEvent::Error { source, .. }) if source == "src"));
    }

    #[test]
    fn test_sender_ignores_closed_channel() {
        let (mut tx, rx) = unbounded::<PlayerEvent>();
        drop(rx);
        tx.on_end_of_stream();
    }

    #[test]
    fn test_closure_releaser() {
        let mut released = Vec::new();
        {
            let mut releaser = |h: SurfaceHandle| released.push(h.as_raw());
            releaser.release(SurfaceHandle::from_raw(7).unwrap());
        }
        assert_eq!(released, vec![7]);
    }
}
