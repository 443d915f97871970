//! # pipectl: Media Pipeline Controller
//!
//! A controller that sits between an application shell and a media-pipeline
//! engine. It owns one pipeline on a dedicated worker thread, injects typed
//! per-component properties from JSON documents, and turns the pipeline's
//! asynchronous events into callbacks.
//!
//! ## Architecture
//!
//! - **Controller**: Caller handle plus worker thread that owns the pipeline
//! - **Properties**: Resolves JSON documents into typed property assignments
//! - **Events**: Classifies engine events into callbacks
//! - **Engine**: Trait seam with a simulated engine and a GStreamer backend
//! - **Communication**: Crossbeam channels for commands, replies and events
//!
//! ## Configuration
//!
//! Controller and logging settings are read from `config.toml` in the
//! platform config directory under `dev.hxyulin.pipectl` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use pipectl::{Controller, PlayerEvent, RunState, SimEngine};
//!
//! let (events_tx, events_rx) = crossbeam_channel::unbounded();
//! let controller = Controller::new("demo", SimEngine::new(), events_tx)?;
//!
//! controller.set_description("videotestsrc name=v ! fakesink name=s")?;
//! controller.set_properties(r#"{"v": {"pattern": 1}, "s": {"sync": false}}"#)?;
//! controller.set_desired_state(RunState::Playing)?;
//!
//! while let Ok(event) = events_rx.recv() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod properties;
pub mod types;

// Re-export commonly used types
pub use config::{ControllerConfig, PlayerConfig};
pub use controller::{Controller, ControllerBuilder, PlayerCallbacks, PlayerEvent};
pub use engine::{EngineError, EnginePipeline, MediaEngine};
#[cfg(feature = "gstreamer")]
pub use engine::GstEngine;
#[cfg(feature = "sim-engine")]
pub use engine::SimEngine;
pub use error::{PlayerError, Result};
pub use types::{PropertyValue, RunState, SurfaceHandle};
