//! Simulated Media Engine
//!
//! This module provides an in-process engine that behaves like a small
//! GStreamer: it parses launch descriptions, instantiates elements from a
//! registry of common factories with typed properties, and walks state
//! transitions one step at a time while posting events.
//!
//! # Behaviour
//!
//! - **State changes**: every step posts a state-changed event from each
//!   component (sinks first) and then from the pipeline itself
//! - **Bounded sources**: a source with `num-buffers >= 0` posts
//!   end-of-stream when the pipeline reaches PLAYING
//! - **Level meters**: `level` elements with `post-messages=true` post a
//!   `level` element message when the pipeline reaches PLAYING
//! - **File sources**: `filesrc` posts a resource error and refuses
//!   NULL → READY when its `location` does not exist
//! - **Surfaces**: the first overlay-capable sink receives bound surfaces
//!
//! # Observation
//!
//! [`SimStats`] counts built and live pipelines and records every surface
//! binding, which makes ownership and rebinding behaviour checkable from
//! tests through a [`SimStatsHandle`].
//!
//! # Enabling
//!
//! Available with the `sim-engine` feature (on by default).

pub mod elements;
pub mod parse;

use crate::engine::{
    EngineError, EngineEvent, EngineEventKind, EnginePipeline, EngineResult, EventOrigin,
    MediaEngine, MessageStructure, MessageValue, StateChangeOutcome,
};
use crate::types::{PropertyKind, PropertyValue, RunState, SurfaceHandle};
use crossbeam_channel::{unbounded, Receiver, Sender};
use elements::{ElementRole, FactoryInfo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Counters shared between a [`SimEngine`] and every pipeline it built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimStats {
    /// Pipelines successfully built
    pub pipelines_built: u64,
    /// Pipelines currently alive (built and not yet dropped)
    pub pipelines_live: usize,
    /// Descriptions that failed to build
    pub failed_builds: u64,
    /// Every surface binding, in order
    pub surface_binds: Vec<Option<SurfaceHandle>>,
    /// Every state requested on any pipeline, in order
    pub state_requests: Vec<RunState>,
}

/// Shared, cloneable view of a simulated engine's statistics
#[derive(Debug, Clone, Default)]
pub struct SimStatsHandle(Arc<Mutex<SimStats>>);

impl SimStatsHandle {
    /// Copy of the current statistics
    pub fn snapshot(&self) -> SimStats {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimStats> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process simulated engine
#[derive(Debug, Default)]
pub struct SimEngine {
    stats: SimStatsHandle,
    next_pipeline: AtomicU32,
}

impl SimEngine {
    /// Create a new simulated engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for observing this engine after it has been moved away
    pub fn stats_handle(&self) -> SimStatsHandle {
        self.stats.clone()
    }

    /// Current statistics
    pub fn stats(&self) -> SimStats {
        self.stats.snapshot()
    }

    fn build(&self, description: &str) -> EngineResult<SimPipeline> {
        let graph = parse::parse_description(description)?;

        let mut per_factory: HashMap<&'static str, u32> = HashMap::new();
        let mut elements: Vec<SimElement> = Vec::with_capacity(graph.elements.len());

        for parsed in &graph.elements {
            let info = elements::factory(&parsed.factory).ok_or_else(|| {
                EngineError::Build(format!("no element \"{}\"", parsed.factory))
            })?;

            let counter = per_factory.entry(info.name).or_insert(0);
            let name = match parsed.explicit_name() {
                Some(name) => name.to_string(),
                None => format!("{}{}", info.name, counter),
            };
            *counter += 1;

            if elements.iter().any(|e| e.name == name) {
                return Err(EngineError::Build(format!(
                    "duplicate element name \"{}\"",
                    name
                )));
            }

            let mut element = SimElement::new(name, info);
            for (key, text) in parsed.properties.iter().filter(|(k, _)| k != "name") {
                let spec = element.info.property(key).ok_or_else(|| {
                    EngineError::Build(format!(
                        "no property \"{}\" in element \"{}\"",
                        key, element.name
                    ))
                })?;
                let value = PropertyValue::parse_as(text, &spec.kind).ok_or_else(|| {
                    EngineError::Build(format!(
                        "could not set property \"{}\" in element \"{}\" to \"{}\"",
                        key, element.name, text
                    ))
                })?;
                element.values.insert(key.clone(), value);
            }
            elements.push(element);
        }

        for &(from, to) in &graph.links {
            let (src, sink) = (&elements[from], &elements[to]);
            if src.info.role == ElementRole::Sink || sink.info.role == ElementRole::Source {
                return Err(EngineError::Build(format!(
                    "could not link {} to {}",
                    src.name, sink.name
                )));
            }
        }

        let index = self.next_pipeline.fetch_add(1, Ordering::Relaxed);
        Ok(SimPipeline {
            name: format!("pipeline{}", index),
            elements,
            state: RunState::Null,
            events: None,
            stats: self.stats.clone(),
        })
    }
}

impl MediaEngine for SimEngine {
    fn name(&self) -> &str {
        "sim"
    }

    fn version(&self) -> String {
        format!("Simulated engine {}", env!("CARGO_PKG_VERSION"))
    }

    fn launch(&self, description: &str) -> EngineResult<Box<dyn EnginePipeline>> {
        match self.build(description) {
            Ok(pipeline) => {
                let mut stats = self.stats.lock();
                stats.pipelines_built += 1;
                stats.pipelines_live += 1;
                Ok(Box::new(pipeline))
            }
            Err(e) => {
                self.stats.lock().failed_builds += 1;
                Err(e)
            }
        }
    }
}

#[derive(Debug)]
struct SimElement {
    name: String,
    info: FactoryInfo,
    values: HashMap<String, PropertyValue>,
    state: RunState,
    window: Option<SurfaceHandle>,
}

impl SimElement {
    fn new(name: String, info: FactoryInfo) -> Self {
        let values = info
            .properties
            .iter()
            .map(|spec| (spec.name.to_string(), spec.default.clone()))
            .collect();
        Self {
            name,
            info,
            values,
            state: RunState::Null,
            window: None,
        }
    }

    fn value(&self, property: &str) -> Option<&PropertyValue> {
        self.values.get(property)
    }

    fn is_bounded_source(&self) -> bool {
        self.info.role == ElementRole::Source
            && matches!(self.value("num-buffers"), Some(PropertyValue::Int(n)) if *n >= 0)
    }

    fn is_live_source(&self) -> bool {
        self.info.role == ElementRole::Source
            && matches!(self.value("is-live"), Some(PropertyValue::Bool(true)))
    }

    /// Reason this element cannot leave NULL, if any
    fn open_failure(&self) -> Option<(String, String)> {
        if self.info.name != "filesrc" {
            return None;
        }
        let location = match self.value("location") {
            Some(PropertyValue::String(location)) => location.clone(),
            _ => String::new(),
        };
        if location.is_empty() {
            return Some((
                "No file name specified for reading.".to_string(),
                format!("/{}: location property is empty", self.name),
            ));
        }
        if !std::path::Path::new(&location).exists() {
            return Some((
                format!("Could not open file \"{}\" for reading.", location),
                format!("/{}: No such file or directory", self.name),
            ));
        }
        None
    }

    fn level_message(&self) -> Option<MessageStructure> {
        if self.info.name != "level"
            || !matches!(self.value("post-messages"), Some(PropertyValue::Bool(true)))
        {
            return None;
        }
        let interval = match self.value("interval") {
            Some(PropertyValue::UInt64(n)) => *n,
            _ => 0,
        };
        let channels = |db: f64| MessageValue::List(vec![MessageValue::Double(db); 2]);
        Some(
            MessageStructure::new("level")
                .field("endtime", MessageValue::UInt64(interval))
                .field("timestamp", MessageValue::UInt64(0))
                .field("stream-time", MessageValue::UInt64(0))
                .field("running-time", MessageValue::UInt64(0))
                .field("duration", MessageValue::UInt64(interval))
                .field("rms", channels(-20.0))
                .field("peak", channels(-12.0))
                .field("decay", channels(-12.0)),
        )
    }
}

/// Pipeline built by [`SimEngine`]
#[derive(Debug)]
pub struct SimPipeline {
    name: String,
    elements: Vec<SimElement>,
    state: RunState,
    events: Option<Sender<EngineEvent>>,
    stats: SimStatsHandle,
}

impl SimPipeline {
    fn post(&self, origin: EventOrigin, kind: EngineEventKind) {
        if let Some(tx) = &self.events {
            // Receiver may already be gone during teardown
            let _ = tx.send(EngineEvent::new(origin, kind));
        }
    }

    fn element(&self, component: &str) -> EngineResult<&SimElement> {
        self.elements
            .iter()
            .find(|e| e.name == component)
            .ok_or_else(|| EngineError::ComponentNotFound(component.to_string()))
    }

    fn step(&mut self, next: RunState, target: RunState) -> EngineResult<()> {
        let old = self.state;
        let pending = if next == target {
            RunState::VoidPending
        } else {
            target
        };

        if old == RunState::Null && next == RunState::Ready {
            if let Some((element, (message, debug))) = self
                .elements
                .iter()
                .find_map(|e| e.open_failure().map(|f| (e.name.clone(), f)))
            {
                self.post(
                    EventOrigin::Component(element.clone()),
                    EngineEventKind::Error {
                        message: message.clone(),
                        debug: Some(debug),
                    },
                );
                return Err(EngineError::StateChange {
                    target,
                    reason: format!("{}: {}", element, message),
                });
            }
        }

        // Downstream elements change state before upstream ones
        for index in (0..self.elements.len()).rev() {
            self.elements[index].state = next;
            let name = self.elements[index].name.clone();
            self.post(
                EventOrigin::Component(name),
                EngineEventKind::StateChanged { old, new: next, pending },
            );
        }

        self.state = next;
        if old == RunState::Ready && next == RunState::Paused {
            self.post(
                EventOrigin::Pipeline(self.name.clone()),
                EngineEventKind::AsyncDone,
            );
        }
        self.post(
            EventOrigin::Pipeline(self.name.clone()),
            EngineEventKind::StateChanged { old, new: next, pending },
        );

        if next == RunState::Playing {
            self.start_streaming();
        }
        Ok(())
    }

    fn start_streaming(&self) {
        for element in &self.elements {
            if let Some(structure) = element.level_message() {
                self.post(
                    EventOrigin::Component(element.name.clone()),
                    EngineEventKind::Element(structure),
                );
            }
        }
        if self.elements.iter().any(SimElement::is_bounded_source) {
            self.post(
                EventOrigin::Pipeline(self.name.clone()),
                EngineEventKind::EndOfStream,
            );
        }
    }
}

impl EnginePipeline for SimPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach_events(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.events = Some(tx);
        rx
    }

    fn detach_events(&mut self) {
        self.events = None;
    }

    fn set_state(&mut self, state: RunState) -> EngineResult<StateChangeOutcome> {
        if state == RunState::VoidPending {
            return Err(EngineError::StateChange {
                target: state,
                reason: "cannot request VOID_PENDING".to_string(),
            });
        }
        self.stats.lock().state_requests.push(state);

        while let Some(next) = self.state.step_towards(state) {
            self.step(next, state)?;
        }

        if state == RunState::Paused && self.elements.iter().any(SimElement::is_live_source) {
            Ok(StateChangeOutcome::NoPreroll)
        } else {
            Ok(StateChangeOutcome::Success)
        }
    }

    fn current_state(&self) -> RunState {
        self.state
    }

    fn has_component(&self, component: &str) -> bool {
        self.element(component).is_ok()
    }

    fn property_kind(&self, component: &str, property: &str) -> EngineResult<PropertyKind> {
        let element = self.element(component)?;
        if property == "name" {
            return Ok(PropertyKind::String);
        }
        element
            .info
            .property(property)
            .map(|spec| spec.kind.clone())
            .ok_or_else(|| EngineError::PropertyNotFound {
                component: component.to_string(),
                property: property.to_string(),
            })
    }

    fn set_property(
        &mut self,
        component: &str,
        property: &str,
        value: PropertyValue,
    ) -> EngineResult<()> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.name == component)
            .ok_or_else(|| EngineError::ComponentNotFound(component.to_string()))?;

        let not_writable = || EngineError::PropertyNotWritable {
            component: component.to_string(),
            property: property.to_string(),
        };
        if property == "name" {
            return Err(not_writable());
        }
        let spec = element
            .info
            .property(property)
            .ok_or_else(|| EngineError::PropertyNotFound {
                component: component.to_string(),
                property: property.to_string(),
            })?;
        if !spec.writable {
            return Err(not_writable());
        }
        if !value.matches(&spec.kind) {
            return Err(EngineError::TypeMismatch {
                component: component.to_string(),
                property: property.to_string(),
                expected: spec.kind.clone(),
            });
        }
        if value.as_f64().is_some_and(|n| !spec.in_range(n)) {
            return Err(EngineError::OutOfRange {
                component: component.to_string(),
                property: property.to_string(),
                value: value.to_string(),
            });
        }

        element.values.insert(property.to_string(), value);
        Ok(())
    }

    fn property(&self, component: &str, property: &str) -> EngineResult<PropertyValue> {
        let element = self.element(component)?;
        if property == "name" {
            return Ok(PropertyValue::String(element.name.clone()));
        }
        element
            .value(property)
            .cloned()
            .ok_or_else(|| EngineError::PropertyNotFound {
                component: component.to_string(),
                property: property.to_string(),
            })
    }

    fn bind_surface(&mut self, surface: Option<SurfaceHandle>) -> bool {
        let Some(sink) = self.elements.iter_mut().find(|e| e.info.video_overlay) else {
            return false;
        };
        sink.window = surface;
        self.stats.lock().surface_binds.push(surface);
        true
    }
}

impl Drop for SimPipeline {
    fn drop(&mut self) {
        let mut stats = self.stats.lock();
        stats.pipelines_live = stats.pipelines_live.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_engine_identity() {
        let engine = SimEngine::new();
        assert_eq!(engine.name(), "sim");
        assert!(engine.version().ends_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_launch_rejects_impossible_links() {
        let engine = SimEngine::new();
        let err = engine.launch("fakesink name=s ! videotestsrc").err();
        assert_eq!(
            err,
            Some(EngineError::Build("could not link s to videotestsrc0".to_string()))
        );
        assert!(engine.launch("videotestsrc ! fakesink  audiotestsrc ! fakesink").is_ok());
        assert_eq!(engine.stats().failed_builds, 1);
    }

    #[test]
    fn test_out_of_range_value_rejected() {
        let engine = SimEngine::new();
        let mut pipeline = engine
            .launch("audiotestsrc ! volume name=vol ! fakesink")
            .unwrap();
        assert!(matches!(
            pipeline.set_property("vol", "volume", PropertyValue::Double(20.0)),
            Err(EngineError::OutOfRange { .. })
        ));
        assert_eq!(pipeline.property("vol", "volume"), Ok(PropertyValue::Double(1.0)));

        pipeline
            .set_property("vol", "volume", PropertyValue::Double(10.0))
            .unwrap();
        assert_eq!(pipeline.property("vol", "volume"), Ok(PropertyValue::Double(10.0)));
        assert!(pipeline
            .set_property("audiotestsrc0", "num-buffers", PropertyValue::Int(-5))
            .is_err());
    }

    #[test]
    fn test_launch_assigns_default_names() {
        let engine = SimEngine::new();
        let pipeline = engine
            .launch("videotestsrc ! queue ! queue ! fakesink")
            .unwrap();
        assert!(pipeline.has_component("videotestsrc0"));
        assert!(pipeline.has_component("queue0"));
        assert!(pipeline.has_component("queue1"));
        assert!(pipeline.has_component("fakesink0"));
        assert_eq!(pipeline.current_state(), RunState::Null);
    }

    #[test]
    fn test_launch_applies_description_properties() {
        let engine = SimEngine::new();
        let pipeline = engine
            .launch("videotestsrc name=v pattern=snow is-live=true ! fakesink name=s sync=true")
            .unwrap();
        assert_eq!(pipeline.property("v", "pattern"), Ok(PropertyValue::Enum(1)));
        assert_eq!(pipeline.property("v", "is-live"), Ok(PropertyValue::Bool(true)));
        assert_eq!(pipeline.property("s", "sync"), Ok(PropertyValue::Bool(true)));
        assert_eq!(
            pipeline.property("s", "name"),
            Ok(PropertyValue::String("s".to_string()))
        );
    }

    #[test]
    fn test_launch_failures_are_counted() {
        let engine = SimEngine::new();
        assert!(matches!(
            engine.launch("nosuchsrc ! fakesink"),
            Err(EngineError::Build(_))
        ));
        assert!(engine.launch("videotestsrc bogus=1 ! fakesink").is_err());
        assert!(engine.launch("videotestsrc pattern=plaid ! fakesink").is_err());
        assert!(engine.launch("fakesink name=a fakesink name=a").is_err());
        let stats = engine.stats();
        assert_eq!(stats.failed_builds, 4);
        assert_eq!(stats.pipelines_built, 0);
    }

    #[test]
    fn test_live_count_follows_drop() {
        let engine = SimEngine::new();
        let first = engine.launch("fakesink").unwrap();
        let second = engine.launch("fakesink").unwrap();
        assert_eq!(engine.stats().pipelines_live, 2);
        drop(first);
        assert_eq!(engine.stats().pipelines_live, 1);
        drop(second);
        assert_eq!(engine.stats().pipelines_live, 0);
        assert_eq!(engine.stats().pipelines_built, 2);
    }

    #[test]
    fn test_state_walk_posts_child_then_pipeline_events() {
        let engine = SimEngine::new();
        let mut pipeline = engine.launch("videotestsrc name=v ! fakesink name=s").unwrap();
        let rx = pipeline.attach_events();

        assert_eq!(
            pipeline.set_state(RunState::Playing),
            Ok(StateChangeOutcome::Success)
        );
        assert_eq!(pipeline.current_state(), RunState::Playing);

        let events = drain(&rx);
        let pipeline_transitions: Vec<_> = events
            .iter()
            .filter(|e| e.origin.is_pipeline())
            .filter_map(|e| match e.kind {
                EngineEventKind::StateChanged { old, new, .. } => Some((old, new)),
                _ => None,
            })
            .collect();
        assert_eq!(
            pipeline_transitions,
            vec![
                (RunState::Null, RunState::Ready),
                (RunState::Ready, RunState::Paused),
                (RunState::Paused, RunState::Playing),
            ]
        );

        // Sink reports before source on each step
        assert_eq!(events[0].origin, EventOrigin::Component("s".to_string()));
        assert_eq!(events[1].origin, EventOrigin::Component("v".to_string()));
        assert!(events.iter().any(|e| e.kind == EngineEventKind::AsyncDone));
    }

    #[test]
    fn test_bounded_source_posts_eos() {
        let engine = SimEngine::new();
        let mut pipeline = engine
            .launch("audiotestsrc num-buffers=10 ! fakesink")
            .unwrap();
        let rx = pipeline.attach_events();
        pipeline.set_state(RunState::Playing).unwrap();
        assert!(drain(&rx)
            .iter()
            .any(|e| e.kind == EngineEventKind::EndOfStream));
    }

    #[test]
    fn test_level_posts_element_message() {
        let engine = SimEngine::new();
        let mut pipeline = engine
            .launch("audiotestsrc ! level name=meter interval=1000000000 ! fakesink")
            .unwrap();
        let rx = pipeline.attach_events();
        pipeline.set_state(RunState::Playing).unwrap();

        let message = drain(&rx)
            .into_iter()
            .find_map(|e| match e.kind {
                EngineEventKind::Element(s) => Some((e.origin, s)),
                _ => None,
            })
            .expect("level should post a message");
        assert_eq!(message.0, EventOrigin::Component("meter".to_string()));
        assert_eq!(message.1.name, "level");
        assert_eq!(
            message.1.get("endtime"),
            Some(&MessageValue::UInt64(1_000_000_000))
        );
    }

    #[test]
    fn test_missing_file_fails_ready() {
        let engine = SimEngine::new();
        let mut pipeline = engine
            .launch("filesrc name=src location=/definitely/not/here.mp4 ! fakesink")
            .unwrap();
        let rx = pipeline.attach_events();

        assert!(matches!(
            pipeline.set_state(RunState::Playing),
            Err(EngineError::StateChange { .. })
        ));
        assert_eq!(pipeline.current_state(), RunState::Null);
        let events = drain(&rx);
        assert!(events.iter().any(|e| matches!(
            &e.kind,
            EngineEventKind::Error { message, .. } if message.contains("/definitely/not/here.mp4")
        ) && e.origin.name() == "src"));
    }

    #[test]
    fn test_live_source_reports_no_preroll() {
        let engine = SimEngine::new();
        let mut pipeline = engine.launch("videotestsrc is-live=true ! fakesink").unwrap();
        assert_eq!(
            pipeline.set_state(RunState::Paused),
            Ok(StateChangeOutcome::NoPreroll)
        );
    }

    #[test]
    fn test_detached_pipeline_posts_nothing() {
        let engine = SimEngine::new();
        let mut pipeline = engine.launch("fakesink").unwrap();
        let rx = pipeline.attach_events();
        pipeline.detach_events();
        pipeline.set_state(RunState::Ready).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_property_checks() {
        let engine = SimEngine::new();
        let mut pipeline = engine.launch("queue name=q ! fakesink").unwrap();

        assert_eq!(
            pipeline.set_property("q", "leaky", PropertyValue::Enum(2)),
            Ok(())
        );
        assert!(matches!(
            pipeline.set_property("q", "leaky", PropertyValue::Enum(9)),
            Err(EngineError::TypeMismatch { .. })
        ));
        assert!(matches!(
            pipeline.set_property("q", "current-level-buffers", PropertyValue::UInt(1)),
            Err(EngineError::PropertyNotWritable { .. })
        ));
        assert!(matches!(
            pipeline.set_property("q", "nope", PropertyValue::UInt(1)),
            Err(EngineError::PropertyNotFound { .. })
        ));
        assert!(matches!(
            pipeline.set_property("missing", "leaky", PropertyValue::Enum(0)),
            Err(EngineError::ComponentNotFound(_))
        ));
    }

    #[test]
    fn test_surface_binding_needs_overlay_sink() {
        let engine = SimEngine::new();
        let handle = SurfaceHandle::from_raw(0x10);

        let mut headless = engine.launch("videotestsrc ! fakesink").unwrap();
        assert!(!headless.bind_surface(handle));

        let mut windowed = engine.launch("videotestsrc ! autovideosink").unwrap();
        assert!(windowed.bind_surface(handle));
        assert_eq!(engine.stats().surface_binds, vec![handle]);
    }
}
