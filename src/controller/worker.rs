//! Controller Worker Thread Implementation
//!
//! This module contains the loop that runs on a controller's dedicated
//! thread. It owns the pipeline, waits on the command channel and the
//! pipeline's event channel at the same time, and invokes every callback.
//!
//! # Responsibilities
//!
//! - **Lifecycle**: builds, replaces and tears down the pipeline
//! - **Desired state**: remembers it and applies it to every new pipeline
//! - **Surface**: binds it, rebinds it above READY, releases replaced handles
//! - **Properties**: resolves documents and reports each failed assignment
//! - **Events**: demultiplexes engine events into callbacks
//!
//! # Ordering
//!
//! `on_loaded` runs before the loop starts, so it precedes every other
//! callback. Commands are handled in the order they were sent and engine
//! events in the order the engine posted them.

use crate::controller::callbacks::{PlayerCallbacks, SurfaceReleaser, ThreadContext};
use crate::engine::{EngineEvent, EnginePipeline, MediaEngine};
use crate::error::{PlayerError, Result};
use crate::events::{classify, Dispatch};
use crate::properties;
use crate::types::{PropertyValue, RunState, SurfaceHandle};
use crossbeam_channel::{never, select, Receiver, Sender};

/// Error source reported for controller-level failures
pub const PIPELINE_SOURCE: &str = "pipeline";

/// Messages sent from a [`super::Controller`] to its worker
#[derive(Debug)]
pub enum Command {
    /// Replace the pipeline; `done` is signalled once the new one is in place
    SetDescription {
        description: String,
        done: Option<Sender<()>>,
    },
    SetDesiredState(RunState),
    SetSurface(Option<SurfaceHandle>),
    SetProperties(String),
    /// Read a property back from the live pipeline
    Property {
        component: String,
        property: String,
        reply: Sender<Result<PropertyValue>>,
    },
    Snapshot {
        reply: Sender<ControllerSnapshot>,
    },
    Shutdown,
}

/// Point-in-time view of a controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub tag: String,
    pub description: Option<String>,
    pub desired_state: RunState,
    pub surface: Option<SurfaceHandle>,
    pub has_pipeline: bool,
    /// Engine-side state of the pipeline, if one exists
    pub pipeline_state: Option<RunState>,
}

/// State owned by the worker thread
pub struct ControllerWorker {
    tag: String,
    engine: Box<dyn MediaEngine>,
    callbacks: Box<dyn PlayerCallbacks>,
    releaser: Option<Box<dyn SurfaceReleaser>>,
    context: Option<Box<dyn ThreadContext>>,
    commands: Receiver<Command>,
    /// Current pipeline's events, or `never()` when there is none
    events: Receiver<EngineEvent>,
    pipeline: Option<Box<dyn EnginePipeline>>,
    description: Option<String>,
    desired_state: RunState,
    surface: Option<SurfaceHandle>,
    running: bool,
}

impl ControllerWorker {
    /// Create a new worker
    pub fn new(
        tag: String,
        engine: Box<dyn MediaEngine>,
        callbacks: Box<dyn PlayerCallbacks>,
        releaser: Option<Box<dyn SurfaceReleaser>>,
        context: Option<Box<dyn ThreadContext>>,
        commands: Receiver<Command>,
    ) -> Self {
        Self {
            tag,
            engine,
            callbacks,
            releaser,
            context,
            commands,
            events: never(),
            pipeline: None,
            description: None,
            desired_state: RunState::VoidPending,
            surface: None,
            running: true,
        }
    }

    /// Run the worker loop until shutdown or until every sender is gone
    pub fn run(&mut self) {
        let span = tracing::info_span!("player", tag = %self.tag);
        let _enter = span.enter();

        if let Some(context) = self.context.as_mut() {
            context.attach();
        }
        tracing::info!(engine = self.engine.name(), "Controller worker started");
        self.callbacks.on_loaded();

        while self.running {
            let commands = self.commands.clone();
            let events = self.events.clone();
            select! {
                recv(commands) -> cmd => match cmd {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(_) => {
                        tracing::debug!("Controller handle dropped");
                        self.running = false;
                    }
                },
                recv(events) -> event => match event {
                    Ok(event) => self.handle_event(&event),
                    Err(_) => self.events = never(),
                },
            }
        }

        self.teardown();
        if let Some(context) = self.context.as_mut() {
            context.detach();
        }
        tracing::info!("Controller worker stopped");
    }

    /// Handle a single command
    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SetDescription { description, done } => {
                self.set_description(description);
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Command::SetDesiredState(state) => self.set_desired_state(state),
            Command::SetSurface(surface) => self.set_surface(surface),
            Command::SetProperties(document) => self.set_properties(&document),
            Command::Property {
                component,
                property,
                reply,
            } => {
                let _ = reply.send(self.property(&component, &property));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {
                tracing::debug!("Shutdown requested");
                self.running = false;
            }
        }
    }

    /// Drain engine events that are already queued
    pub fn process_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(&event);
        }
    }

    fn set_description(&mut self, description: String) {
        self.release_pipeline();

        tracing::info!(%description, "Building pipeline");
        match self.engine.launch(&description) {
            Ok(mut pipeline) => {
                self.events = pipeline.attach_events();
                self.pipeline = Some(pipeline);
                self.apply_desired_state();
            }
            Err(e) => {
                tracing::warn!("Pipeline build failed: {}", e);
                self.callbacks
                    .on_error(PIPELINE_SOURCE, "failed to build pipeline", &e.to_string());
            }
        }
        self.description = Some(description);
    }

    /// Stop and drop the current pipeline, if any
    fn release_pipeline(&mut self) {
        let Some(mut pipeline) = self.pipeline.take() else {
            return;
        };
        pipeline.detach_events();
        self.events = never();
        if let Err(e) = pipeline.set_state(RunState::Null) {
            tracing::warn!(pipeline = pipeline.name(), "Failed to reach NULL: {}", e);
        }
        tracing::debug!(pipeline = pipeline.name(), "Pipeline released");
    }

    fn set_desired_state(&mut self, state: RunState) {
        tracing::debug!(%state, "Desired state");
        self.desired_state = state;
        self.apply_desired_state();
    }

    fn apply_desired_state(&mut self) {
        let state = self.desired_state;
        if state == RunState::VoidPending {
            return;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };
        match pipeline.set_state(state) {
            Ok(outcome) => tracing::debug!(%state, ?outcome, "State change requested"),
            // The engine reports the cause through its own error event
            Err(e) => tracing::warn!("State change refused: {}", e),
        }
    }

    fn set_surface(&mut self, surface: Option<SurfaceHandle>) {
        if let Some(previous) = self.surface {
            if Some(previous) != surface {
                self.release_surface(previous);
            }
        }
        self.surface = surface;
        self.bind_surface();
    }

    fn bind_surface(&mut self) {
        let surface = self.surface;
        if let Some(pipeline) = self.pipeline.as_mut() {
            if pipeline.bind_surface(surface) {
                tracing::debug!(surface = ?surface, "Surface bound");
            }
        }
    }

    fn release_surface(&mut self, handle: SurfaceHandle) {
        tracing::debug!(%handle, "Releasing surface");
        if let Some(releaser) = self.releaser.as_mut() {
            releaser.release(handle);
        }
    }

    fn set_properties(&mut self, document: &str) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            tracing::debug!("Ignoring properties: no pipeline");
            return;
        };

        let document = match properties::parse_document(document) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Unable to parse properties document: {}", e);
                self.callbacks.on_error(
                    PIPELINE_SOURCE,
                    "invalid properties document",
                    &e.to_string(),
                );
                return;
            }
        };

        let assignments = properties::collect_assignments(&document);
        let report = properties::apply(pipeline.as_mut(), &assignments);
        tracing::debug!(
            applied = report.applied,
            failed = report.failures.len(),
            "Properties applied"
        );
        for failure in &report.failures {
            self.callbacks
                .on_error(PIPELINE_SOURCE, failure.kind.message(), &failure.detail);
        }
    }

    fn property(&self, component: &str, property: &str) -> Result<PropertyValue> {
        let pipeline = self.pipeline.as_ref().ok_or(PlayerError::NoPipeline)?;
        Ok(pipeline.property(component, property)?)
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            tag: self.tag.clone(),
            description: self.description.clone(),
            desired_state: self.desired_state,
            surface: self.surface,
            has_pipeline: self.pipeline.is_some(),
            pipeline_state: self.pipeline.as_ref().map(|p| p.current_state()),
        }
    }

    fn handle_event(&mut self, event: &EngineEvent) {
        match classify(event) {
            Dispatch::Error {
                source,
                message,
                debug,
            } => {
                tracing::warn!(%source, "Error received: {}", message);
                self.callbacks.on_error(&source, &message, &debug);
            }
            Dispatch::EndOfStream => {
                tracing::info!("End of stream");
                self.callbacks.on_end_of_stream();
            }
            Dispatch::StateChanged {
                old,
                new,
                rebind_surface,
            } => {
                tracing::info!(%old, %new, "Pipeline state changed");
                if rebind_surface {
                    self.bind_surface();
                }
                self.callbacks.on_state_changed(new, old);
            }
            Dispatch::ElementMessage { element, json } => {
                tracing::trace!(%element, %json, "Element message");
                self.callbacks.on_element_message(&element, &json);
            }
            Dispatch::Ignored | Dispatch::Dropped => {}
        }
    }

    fn teardown(&mut self) {
        self.release_pipeline();
        if let Some(surface) = self.surface.take() {
            self.release_surface(surface);
        }
    }
}

#[cfg(all(test, feature = "sim-engine"))]
mod tests {
    use super::*;
    use crate::controller::callbacks::MockPlayerCallbacks;
    use crate::engine::{SimEngine, SimStatsHandle};
    use crossbeam_channel::{bounded, unbounded};
    use mockall::predicate::eq;
    use std::sync::{Arc, Mutex};

    fn create_test_worker(
        callbacks: MockPlayerCallbacks,
    ) -> (ControllerWorker, Sender<Command>, SimStatsHandle) {
        let (cmd_tx, cmd_rx) = bounded(16);
        let engine = SimEngine::new();
        let stats = engine.stats_handle();
        let worker = ControllerWorker::new(
            "test".to_string(),
            Box::new(engine),
            Box::new(callbacks),
            None,
            None,
            cmd_rx,
        );
        (worker, cmd_tx, stats)
    }

    fn describe(worker: &mut ControllerWorker, description: &str) {
        worker.handle_command(Command::SetDescription {
            description: description.to_string(),
            done: None,
        });
    }

    #[test]
    fn test_worker_creation() {
        let (worker, _, _) = create_test_worker(MockPlayerCallbacks::new());
        assert!(worker.pipeline.is_none());
        assert_eq!(worker.desired_state, RunState::VoidPending);
        assert!(worker.running);
    }

    #[test]
    fn test_build_failure_reports_error() {
        let mut callbacks = MockPlayerCallbacks::new();
        callbacks
            .expect_on_error()
            .withf(|source, message, debug| {
                source == "pipeline"
                    && message == "failed to build pipeline"
                    && debug.contains("nosuchsrc")
            })
            .times(1)
            .return_const(());
        let (mut worker, _, _) = create_test_worker(callbacks);

        describe(&mut worker, "nosuchsrc ! fakesink");
        assert!(worker.pipeline.is_none());

        // Operations without a pipeline are no-ops
        worker.handle_command(Command::SetDesiredState(RunState::Playing));
        worker.handle_command(Command::SetProperties("{\"a\":{\"b\":1}}".to_string()));
    }

    #[test]
    fn test_replacement_keeps_one_pipeline() {
        let (mut worker, _, stats) = create_test_worker(MockPlayerCallbacks::new());

        describe(&mut worker, "videotestsrc ! fakesink");
        describe(&mut worker, "audiotestsrc ! fakesink");

        let stats = stats.snapshot();
        assert_eq!(stats.pipelines_built, 2);
        assert_eq!(stats.pipelines_live, 1);
        assert!(worker.pipeline.as_ref().unwrap().has_component("audiotestsrc0"));
    }

    #[test]
    fn test_desired_state_applies_to_later_pipeline() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let mut callbacks = MockPlayerCallbacks::new();
        callbacks
            .expect_on_state_changed()
            .returning(move |new, old| log.lock().unwrap().push((new, old)));
        let (mut worker, _, _) = create_test_worker(callbacks);

        worker.handle_command(Command::SetDesiredState(RunState::Playing));
        describe(&mut worker, "videotestsrc ! fakesink");
        worker.process_events();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (RunState::Ready, RunState::Null),
                (RunState::Paused, RunState::Ready),
                (RunState::Playing, RunState::Paused),
            ]
        );
        assert_eq!(
            worker.pipeline.as_ref().unwrap().current_state(),
            RunState::Playing
        );
    }

    #[test]
    fn test_child_state_changes_are_not_surfaced() {
        let mut callbacks = MockPlayerCallbacks::new();
        callbacks
            .expect_on_state_changed()
            .with(eq(RunState::Ready), eq(RunState::Null))
            .times(1)
            .return_const(());
        let (mut worker, _, _) = create_test_worker(callbacks);

        describe(&mut worker, "videotestsrc ! queue ! fakesink");
        worker.handle_command(Command::SetDesiredState(RunState::Ready));
        worker.process_events();
    }

    #[test]
    fn test_invalid_document_reports_once() {
        let mut callbacks = MockPlayerCallbacks::new();
        callbacks
            .expect_on_error()
            .withf(|source, message, _| source == "pipeline" && message == "invalid properties document")
            .times(1)
            .return_const(());
        let (mut worker, _, _) = create_test_worker(callbacks);

        describe(&mut worker, "videotestsrc name=v ! fakesink");
        worker.handle_command(Command::SetProperties("{\"v\": {".to_string()));
    }

    #[test]
    fn test_surface_release_rules() {
        let released = Arc::new(Mutex::new(Vec::new()));
        let (mut worker, _, stats) = create_test_worker(MockPlayerCallbacks::new());
        let sink = released.clone();
        worker.releaser = Some(Box::new(move |h: SurfaceHandle| {
            sink.lock().unwrap().push(h.as_raw())
        }));

        describe(&mut worker, "videotestsrc ! autovideosink");
        let first = SurfaceHandle::from_raw(0x100);
        let second = SurfaceHandle::from_raw(0x200);

        worker.handle_command(Command::SetSurface(first));
        worker.handle_command(Command::SetSurface(first));
        assert!(released.lock().unwrap().is_empty());

        worker.handle_command(Command::SetSurface(second));
        assert_eq!(*released.lock().unwrap(), vec![0x100]);

        worker.teardown();
        assert_eq!(*released.lock().unwrap(), vec![0x100, 0x200]);
        assert_eq!(stats.snapshot().pipelines_live, 0);
    }

    #[test]
    fn test_surface_rebound_above_ready() {
        let mut callbacks = MockPlayerCallbacks::new();
        callbacks.expect_on_state_changed().times(3).return_const(());
        let (mut worker, _, stats) = create_test_worker(callbacks);
        let handle = SurfaceHandle::from_raw(0x42);

        describe(&mut worker, "videotestsrc ! autovideosink");
        worker.handle_command(Command::SetSurface(handle));
        worker.handle_command(Command::SetDesiredState(RunState::Playing));
        worker.process_events();

        // Initial bind, then PAUSED and PLAYING
        assert_eq!(stats.snapshot().surface_binds, vec![handle; 3]);
    }

    #[test]
    fn test_shutdown_command() {
        let (mut worker, cmd_tx, _) = create_test_worker(MockPlayerCallbacks::new());
        cmd_tx.send(Command::Shutdown).unwrap();
        let cmd = worker.commands.try_recv().unwrap();
        worker.handle_command(cmd);
        assert!(!worker.running);
    }

    #[test]
    fn test_property_and_snapshot_replies() {
        let (mut worker, _, _) = create_test_worker(MockPlayerCallbacks::new());
        let (reply_tx, reply_rx) = unbounded();

        worker.handle_command(Command::Property {
            component: "s".to_string(),
            property: "sync".to_string(),
            reply: reply_tx.clone(),
        });
        assert!(matches!(reply_rx.recv().unwrap(), Err(PlayerError::NoPipeline)));

        describe(&mut worker, "fakesink name=s");
        worker.handle_command(Command::Property {
            component: "s".to_string(),
            property: "sync".to_string(),
            reply: reply_tx,
        });
        assert_eq!(reply_rx.recv().unwrap().unwrap(), PropertyValue::Bool(false));

        let (snap_tx, snap_rx) = unbounded();
        worker.handle_command(Command::Snapshot { reply: snap_tx });
        let snapshot = snap_rx.recv().unwrap();
        assert!(snapshot.has_pipeline);
        assert_eq!(snapshot.pipeline_state, Some(RunState::Null));
        assert_eq!(snapshot.description.as_deref(), Some("fakesink name=s"));
    }
}
