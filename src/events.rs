//! Event demultiplexing
//!
//! Classifies engine events into the callback they should produce and
//! extracts the payload. Classification is pure; the controller worker owns
//! delivery.
//!
//! | Engine event | Dispatch |
//! |---|---|
//! | error | [`Dispatch::Error`] with origin name, message and debug detail |
//! | end-of-stream | [`Dispatch::EndOfStream`] |
//! | state-changed from the pipeline | [`Dispatch::StateChanged`] |
//! | state-changed from a component | [`Dispatch::Dropped`] |
//! | element message | [`Dispatch::ElementMessage`] with the fields as JSON |
//! | async-done | [`Dispatch::Ignored`] |
//! | anything else | [`Dispatch::Dropped`] |

use crate::engine::{EngineEvent, EngineEventKind, MessageStructure, MessageValue};
use crate::types::RunState;
use serde_json::{Map, Number, Value};

/// What the controller should do with an engine event
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Error {
        source: String,
        message: String,
        debug: String,
    },
    EndOfStream,
    StateChanged {
        old: RunState,
        new: RunState,
        /// Render-capable components may have been recreated
        rebind_surface: bool,
    },
    ElementMessage {
        element: String,
        json: String,
    },
    /// Recognised but reserved
    Ignored,
    /// Not surfaced to callers
    Dropped,
}

/// Classify one engine event
pub fn classify(event: &EngineEvent) -> Dispatch {
    match &event.kind {
        EngineEventKind::Error { message, debug } => Dispatch::Error {
            source: event.origin.name().to_string(),
            message: message.clone(),
            debug: debug.clone().unwrap_or_default(),
        },
        EngineEventKind::EndOfStream => Dispatch::EndOfStream,
        EngineEventKind::StateChanged { old, new, .. } if event.origin.is_pipeline() => {
            Dispatch::StateChanged {
                old: *old,
                new: *new,
                rebind_surface: new.is_above_ready(),
            }
        }
        EngineEventKind::StateChanged { .. } => Dispatch::Dropped,
        EngineEventKind::Element(structure) => Dispatch::ElementMessage {
            element: event.origin.name().to_string(),
            json: Value::Object(structure_to_json(structure)).to_string(),
        },
        EngineEventKind::AsyncDone => Dispatch::Ignored,
        EngineEventKind::Other(_) => Dispatch::Dropped,
    }
}

/// Flat JSON object of a structure's fields
///
/// Fields whose type has no JSON form are omitted.
pub fn structure_to_json(structure: &MessageStructure) -> Map<String, Value> {
    structure
        .fields
        .iter()
        .filter_map(|(name, value)| value_to_json(value).map(|v| (name.clone(), v)))
        .collect()
}

fn value_to_json(value: &MessageValue) -> Option<Value> {
    let json = match value {
        MessageValue::Null => Value::Null,
        MessageValue::Int(n) | MessageValue::Enum(n) => Value::from(*n),
        MessageValue::UInt(n) => Value::from(*n),
        MessageValue::Int64(n) => Value::from(*n),
        MessageValue::UInt64(n) => Value::from(*n),
        MessageValue::Float(n) => float(f64::from(*n)),
        MessageValue::Double(n) => float(*n),
        MessageValue::Bool(b) => Value::Bool(*b),
        MessageValue::String(s) => Value::String(s.clone()),
        MessageValue::List(items) => Value::Array(items.iter().filter_map(value_to_json).collect()),
        MessageValue::Structure(inner) => Value::Object(structure_to_json(inner)),
        MessageValue::Unsupported(_) => return None,
    };
    Some(json)
}

// NaN and infinities have no JSON number form
fn float(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
