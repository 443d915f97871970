//! Pipeline controller
//!
//! A [`Controller`] owns one pipeline session on a dedicated worker thread.
//! Callers issue control operations from any thread; each one becomes a
//! message on a bounded crossbeam channel, so operations are serialized in
//! the order they were sent. Pipeline events come back through the
//! [`PlayerCallbacks`] supplied at construction, always on the worker.
//!
//! # Architecture
//!
//! - [`Controller`] - Caller-side handle; sends commands, joins the worker
//! - [`ControllerBuilder`] - Optional surface releaser, thread context, config
//! - [`ControllerWorker`] - Worker loop that owns the pipeline
//! - [`PlayerCallbacks`] / [`PlayerEvent`] - Notification contract
//!
//! # Example
//!
//! ```ignore
//! use pipectl::controller::{Controller, PlayerEvent};
//! use pipectl::engine::SimEngine;
//! use pipectl::types::RunState;
//!
//! let (events_tx, events_rx) = crossbeam_channel::unbounded();
//! let controller = Controller::new("demo", SimEngine::new(), events_tx)?;
//!
//! controller.set_description("videotestsrc name=v ! fakesink name=s")?;
//! controller.set_properties(r#"{"v": {"pattern": 1}}"#)?;
//! controller.set_desired_state(RunState::Playing)?;
//!
//! for event in events_rx.iter() {
//!     if let PlayerEvent::StateChanged { new: RunState::Playing, .. } = event {
//!         break;
//!     }
//! }
//! controller.destroy();
//! ```

pub mod callbacks;
pub mod worker;

pub use callbacks::{PlayerCallbacks, PlayerEvent, SurfaceReleaser, ThreadContext};
pub use worker::{Command, ControllerSnapshot, ControllerWorker, PIPELINE_SOURCE};

use crate::config::ControllerConfig;
use crate::engine::MediaEngine;
use crate::error::{PlayerError, Result};
use crate::types::{PropertyValue, RunState, SurfaceHandle};
use crossbeam_channel::{bounded, Sender};
use std::thread::{JoinHandle, ThreadId};

/// Builder for a [`Controller`] with optional capabilities
pub struct ControllerBuilder {
    tag: String,
    config: ControllerConfig,
    releaser: Option<Box<dyn SurfaceReleaser>>,
    context: Option<Box<dyn ThreadContext>>,
}

impl ControllerBuilder {
    /// Use these controller settings
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Hand replaced and final surface handles to `releaser`
    pub fn surface_releaser(mut self, releaser: impl SurfaceReleaser + 'static) -> Self {
        self.releaser = Some(Box::new(releaser));
        self
    }

    /// Attach the worker thread to a host runtime while it runs
    pub fn thread_context(mut self, context: impl ThreadContext + 'static) -> Self {
        self.context = Some(Box::new(context));
        self
    }

    /// Spawn the worker and return the controller
    ///
    /// Fails only when the worker thread cannot be created.
    pub fn build(
        self,
        engine: impl MediaEngine + 'static,
        callbacks: impl PlayerCallbacks + 'static,
    ) -> Result<Controller> {
        let (cmd_tx, cmd_rx) = bounded(self.config.command_capacity.max(1));

        let mut worker = ControllerWorker::new(
            self.tag.clone(),
            Box::new(engine),
            Box::new(callbacks),
            self.releaser,
            self.context,
            cmd_rx,
        );

        let thread = std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(PlayerError::ThreadSpawn)?;

        tracing::debug!(tag = %self.tag, thread = %self.config.thread_name, "Controller created");
        Ok(Controller {
            tag: self.tag,
            commands: cmd_tx,
            worker_thread: thread.thread().id(),
            thread: Some(thread),
        })
    }
}

/// Handle to one pipeline session
///
/// Dropping the handle destroys the session.
pub struct Controller {
    tag: String,
    commands: Sender<Command>,
    worker_thread: ThreadId,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    /// Start building a controller with the display tag `tag`
    pub fn builder(tag: impl Into<String>) -> ControllerBuilder {
        ControllerBuilder {
            tag: tag.into(),
            config: ControllerConfig::default(),
            releaser: None,
            context: None,
        }
    }

    /// Create a controller with default settings
    pub fn new(
        tag: impl Into<String>,
        engine: impl MediaEngine + 'static,
        callbacks: impl PlayerCallbacks + 'static,
    ) -> Result<Self> {
        Self::builder(tag).build(engine, callbacks)
    }

    /// Display tag given at construction
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn on_worker_thread(&self) -> bool {
        std::thread::current().id() == self.worker_thread
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).map_err(PlayerError::from)
    }

    /// Replace the pipeline with one built from `description`
    ///
    /// Returns once the previous pipeline has been released and the new one
    /// built. A description the engine rejects is reported through
    /// [`PlayerCallbacks::on_error`] and leaves the controller without a
    /// pipeline.
    pub fn set_description(&self, description: impl Into<String>) -> Result<()> {
        let description = description.into();
        if self.on_worker_thread() {
            return self.send(Command::SetDescription {
                description,
                done: None,
            });
        }

        let (done_tx, done_rx) = bounded(1);
        self.send(Command::SetDescription {
            description,
            done: Some(done_tx),
        })?;
        done_rx.recv()?;
        Ok(())
    }

    /// Store the desired run-state and request it from the current pipeline
    pub fn set_desired_state(&self, state: RunState) -> Result<()> {
        self.send(Command::SetDesiredState(state))
    }

    /// Bind a rendering surface, or unbind with `None`
    pub fn set_surface(&self, surface: Option<SurfaceHandle>) -> Result<()> {
        self.send(Command::SetSurface(surface))
    }

    /// Apply a JSON properties document to the current pipeline
    pub fn set_properties(&self, document: impl Into<String>) -> Result<()> {
        self.send(Command::SetProperties(document.into()))
    }

    /// Read a component property from the current pipeline
    pub fn property(&self, component: &str, property: &str) -> Result<PropertyValue> {
        if self.on_worker_thread() {
            return Err(PlayerError::Reentrant);
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Command::Property {
            component: component.to_string(),
            property: property.to_string(),
            reply: reply_tx,
        })?;
        reply_rx.recv()?
    }

    /// Current controller state as seen by the worker
    pub fn snapshot(&self) -> Result<ControllerSnapshot> {
        if self.on_worker_thread() {
            return Err(PlayerError::Reentrant);
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Command::Snapshot { reply: reply_tx })?;
        Ok(reply_rx.recv()?)
    }

    /// Tear the session down: pipeline to NULL, surface released, worker joined
    pub fn destroy(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Worker may already be gone
        let _ = self.commands.send(Command::Shutdown);

        if self.on_worker_thread() {
            tracing::debug!(tag = %self.tag, "Destroyed from worker thread, not joining");
            return;
        }
        if thread.join().is_err() {
            tracing::error!(tag = %self.tag, "Controller worker panicked");
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("tag", &self.tag)
            .field("running", &self.thread.is_some())
            .finish()
    }
}
