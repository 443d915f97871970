//! Media engine seam
//!
//! The controller never talks to a concrete media framework directly. It
//! builds pipelines through a [`MediaEngine`] and drives each one through an
//! [`EnginePipeline`], so the same controller runs against the simulated
//! engine in tests and against GStreamer in production.
//!
//! # Components
//!
//! - [`MediaEngine`] - Builds pipelines from a textual description
//! - [`EnginePipeline`] - One live pipeline: state, properties, surface, events
//! - [`EngineEvent`] - Asynchronous notification posted by a pipeline
//! - [`SimEngine`] - In-process simulated engine (feature-gated)
//! - [`GstEngine`] - GStreamer-backed engine (feature-gated)
//!
//! # Events
//!
//! A pipeline posts events into a crossbeam channel handed out by
//! [`EnginePipeline::attach_events`]. Only one receiver is attached at a
//! time; attaching again replaces it and [`EnginePipeline::detach_events`]
//! drops the sending side so nothing is posted afterwards.

pub mod error;
#[cfg(feature = "gstreamer")]
pub mod gst;
#[cfg(feature = "sim-engine")]
pub mod sim;

pub use error::{EngineError, EngineResult};
#[cfg(feature = "gstreamer")]
pub use gst::GstEngine;
#[cfg(feature = "sim-engine")]
pub use sim::{SimEngine, SimStats, SimStatsHandle};

use crate::types::{PropertyKind, PropertyValue, RunState, SurfaceHandle};
use crossbeam_channel::Receiver;

/// Outcome of a successful state change request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChangeOutcome {
    /// The pipeline reached the requested state
    Success,
    /// The change continues in the background; completion arrives as an event
    Async,
    /// Live source: the pipeline cannot preroll in PAUSED
    NoPreroll,
}

/// Builds pipelines from a textual description
///
/// Implementations must be `Send` so the controller can move them onto its
/// worker thread.
pub trait MediaEngine: Send {
    /// Short engine name for logs
    fn name(&self) -> &str;

    /// Engine version string
    fn version(&self) -> String;

    /// Build a pipeline from `description`
    ///
    /// The returned pipeline is in the NULL state with no events attached.
    fn launch(&self, description: &str) -> EngineResult<Box<dyn EnginePipeline>>;
}

impl<E: MediaEngine + ?Sized> MediaEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn version(&self) -> String {
        (**self).version()
    }

    fn launch(&self, description: &str) -> EngineResult<Box<dyn EnginePipeline>> {
        (**self).launch(description)
    }
}

/// One live pipeline
pub trait EnginePipeline: Send {
    /// Pipeline object name
    fn name(&self) -> &str;

    /// Create a fresh event channel and return its receiving side
    fn attach_events(&mut self) -> Receiver<EngineEvent>;

    /// Stop posting events
    fn detach_events(&mut self);

    /// Request a state transition
    ///
    /// The engine walks intermediate states itself. A NULL request completes
    /// before returning.
    fn set_state(&mut self, state: RunState) -> EngineResult<StateChangeOutcome>;

    /// Current engine-side state
    fn current_state(&self) -> RunState;

    /// Whether a component with this name exists in the pipeline
    fn has_component(&self, component: &str) -> bool;

    /// Declared kind of a component property
    fn property_kind(&self, component: &str, property: &str) -> EngineResult<PropertyKind>;

    /// Assign a property. The value must already match the declared kind.
    fn set_property(
        &mut self,
        component: &str,
        property: &str,
        value: PropertyValue,
    ) -> EngineResult<()>;

    /// Read a property back
    fn property(&self, component: &str, property: &str) -> EngineResult<PropertyValue>;

    /// Bind a rendering surface to the first render-capable component
    ///
    /// Returns `false` when the pipeline currently has no such component.
    fn bind_surface(&mut self, surface: Option<SurfaceHandle>) -> bool;
}

/// Where an event came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOrigin {
    /// The pipeline object itself
    Pipeline(String),
    /// A named component inside the pipeline
    Component(String),
}

impl EventOrigin {
    /// Name of the originating object
    pub fn name(&self) -> &str {
        match self {
            EventOrigin::Pipeline(name) | EventOrigin::Component(name) => name,
        }
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self, EventOrigin::Pipeline(_))
    }
}

/// Field value inside an element message structure
#[derive(Debug, Clone, PartialEq)]
pub enum MessageValue {
    Null,
    Int(i32),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Enum(i32),
    List(Vec<MessageValue>),
    Structure(MessageStructure),
    /// A field type with no JSON form; carries the engine's type name
    Unsupported(String),
}

/// Named structure carried by element messages
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageStructure {
    pub name: String,
    pub fields: Vec<(String, MessageValue)>,
}

impl MessageStructure {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style field append
    pub fn field(mut self, name: impl Into<String>, value: MessageValue) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&MessageValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Kind and payload of an engine event
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    StateChanged {
        old: RunState,
        new: RunState,
        pending: RunState,
    },
    EndOfStream,
    Error {
        message: String,
        debug: Option<String>,
    },
    Element(MessageStructure),
    AsyncDone,
    /// Anything else; carries the engine's message type name
    Other(String),
}

/// Asynchronous notification posted by a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub origin: EventOrigin,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(origin: EventOrigin, kind: EngineEventKind) -> Self {
        Self { origin, kind }
    }
}
