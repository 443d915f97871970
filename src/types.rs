//! Core data types for pipectl
//!
//! This module contains the value types shared by the controller, the
//! property resolver and the engine implementations.
//!
//! # Main Types
//!
//! - [`RunState`] - Ordered pipeline run-states (VoidPending < Null < Ready < Paused < Playing)
//! - [`SurfaceHandle`] - Opaque, caller-owned rendering surface handle
//! - [`PropertyKind`] - Declared type of a component property
//! - [`PropertyValue`] - Typed value assigned to (or read from) a component property
//!
//! # Run-State Numbering
//!
//! The numeric values of [`RunState`] match the ones used by the media engine
//! and by the platform bridges, so a bridge can pass a plain integer and
//! convert it with `RunState::try_from`.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::str::FromStr;

/// Pipeline run-state
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum RunState {
    /// No state requested yet
    #[default]
    VoidPending = 0,
    /// Lowest state, all resources released
    Null = 1,
    /// Resources allocated, not streaming
    Ready = 2,
    /// Prerolled, clock stopped
    Paused = 3,
    /// Streaming
    Playing = 4,
}

impl RunState {
    /// All states in ascending order
    pub const ALL: [RunState; 5] = [
        RunState::VoidPending,
        RunState::Null,
        RunState::Ready,
        RunState::Paused,
        RunState::Playing,
    ];

    /// Lowercase name, as used in logs and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            RunState::VoidPending => "void-pending",
            RunState::Null => "null",
            RunState::Ready => "ready",
            RunState::Paused => "paused",
            RunState::Playing => "playing",
        }
    }

    /// Numeric value shared with the engine and the bridges
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Whether rendering components may exist in this state
    pub fn is_above_ready(self) -> bool {
        self > RunState::Ready
    }

    /// The next state one step from `self` towards `target`, if any
    pub fn step_towards(self, target: RunState) -> Option<RunState> {
        let current = self.as_i32();
        let target = target.as_i32();
        let next = match current.cmp(&target) {
            std::cmp::Ordering::Less => current + 1,
            std::cmp::Ordering::Greater => current - 1,
            std::cmp::Ordering::Equal => return None,
        };
        RunState::try_from(next).ok()
    }
}

impl TryFrom<i32> for RunState {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RunState::VoidPending),
            1 => Ok(RunState::Null),
            2 => Ok(RunState::Ready),
            3 => Ok(RunState::Paused),
            4 => Ok(RunState::Playing),
            other => Err(other),
        }
    }
}

impl FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "void-pending" | "void_pending" | "pending" => Ok(RunState::VoidPending),
            "null" => Ok(RunState::Null),
            "ready" => Ok(RunState::Ready),
            "paused" => Ok(RunState::Paused),
            "playing" => Ok(RunState::Playing),
            other => other
                .parse::<i32>()
                .ok()
                .and_then(|n| RunState::try_from(n).ok())
                .ok_or_else(|| format!("unknown run-state '{}'", s)),
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque rendering surface handle supplied by the platform layer
///
/// The controller never allocates or frees the underlying surface; it only
/// binds the handle to a render-capable component and hands previous
/// handles back through [`crate::controller::SurfaceReleaser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(NonZeroUsize);

impl SurfaceHandle {
    /// Wrap a raw platform handle. Returns `None` for a null handle.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(SurfaceHandle)
    }

    /// The raw platform handle
    pub fn as_raw(&self) -> usize {
        self.0.get()
    }
}

impl std::fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:x}", self.as_raw())
    }
}

/// One allowed value of an enumerated property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumVariant {
    /// Integer value
    pub value: i32,
    /// Short name accepted in documents and descriptions
    pub nick: String,
}

impl EnumVariant {
    pub fn new(value: i32, nick: impl Into<String>) -> Self {
        Self {
            value,
            nick: nick.into(),
        }
    }
}

/// Declared type of a component property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Int,
    UInt,
    Int64,
    UInt64,
    Float,
    Double,
    Bool,
    String,
    /// Enumerated integer with its allowed variants
    Enum(Vec<EnumVariant>),
    /// Ordered sequence of a single element kind
    Array(Box<PropertyKind>),
    /// Named fields with inferred kinds
    Structure,
}

impl PropertyKind {
    /// Find an enum variant by integer value or nick
    pub fn enum_variant(&self, key: EnumKey<'_>) -> Option<&EnumVariant> {
        let PropertyKind::Enum(variants) = self else {
            return None;
        };
        variants.iter().find(|v| match key {
            EnumKey::Value(n) => v.value == n,
            EnumKey::Nick(nick) => v.nick == nick,
        })
    }
}

/// Lookup key for [`PropertyKind::enum_variant`]
#[derive(Debug, Clone, Copy)]
pub enum EnumKey<'a> {
    Value(i32),
    Nick(&'a str),
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyKind::Int => write!(f, "int"),
            PropertyKind::UInt => write!(f, "uint"),
            PropertyKind::Int64 => write!(f, "int64"),
            PropertyKind::UInt64 => write!(f, "uint64"),
            PropertyKind::Float => write!(f, "float"),
            PropertyKind::Double => write!(f, "double"),
            PropertyKind::Bool => write!(f, "boolean"),
            PropertyKind::String => write!(f, "string"),
            PropertyKind::Enum(_) => write!(f, "enum"),
            PropertyKind::Array(inner) => write!(f, "array<{}>", inner),
            PropertyKind::Structure => write!(f, "structure"),
        }
    }
}

/// Typed property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i32),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    Enum(i32),
    Array(Vec<PropertyValue>),
    Structure(Vec<(String, PropertyValue)>),
}

impl PropertyValue {
    /// Numeric value widened to `f64`, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(v) => Some(f64::from(*v)),
            PropertyValue::UInt(v) => Some(f64::from(*v)),
            PropertyValue::Int64(v) => Some(*v as f64),
            PropertyValue::UInt64(v) => Some(*v as f64),
            PropertyValue::Float(v) => Some(f64::from(*v)),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this value can be stored in a property of kind `kind`
    pub fn matches(&self, kind: &PropertyKind) -> bool {
        match (self, kind) {
            (PropertyValue::Int(_), PropertyKind::Int)
            | (PropertyValue::UInt(_), PropertyKind::UInt)
            | (PropertyValue::Int64(_), PropertyKind::Int64)
            | (PropertyValue::UInt64(_), PropertyKind::UInt64)
            | (PropertyValue::Float(_), PropertyKind::Float)
            | (PropertyValue::Double(_), PropertyKind::Double)
            | (PropertyValue::Bool(_), PropertyKind::Bool)
            | (PropertyValue::String(_), PropertyKind::String)
            | (PropertyValue::Structure(_), PropertyKind::Structure) => true,
            (PropertyValue::Enum(n), kind @ PropertyKind::Enum(_)) => {
                kind.enum_variant(EnumKey::Value(*n)).is_some()
            }
            (PropertyValue::Array(items), PropertyKind::Array(inner)) => {
                items.iter().all(|item| item.matches(inner))
            }
            _ => false,
        }
    }

    /// Parse a value from its textual form in a pipeline description
    ///
    /// Arrays and structures have no textual form here and are rejected.
    pub fn parse_as(text: &str, kind: &PropertyKind) -> Option<PropertyValue> {
        let text = text.trim();
        match kind {
            PropertyKind::Int => text.parse().ok().map(PropertyValue::Int),
            PropertyKind::UInt => text.parse().ok().map(PropertyValue::UInt),
            PropertyKind::Int64 => text.parse().ok().map(PropertyValue::Int64),
            PropertyKind::UInt64 => text.parse().ok().map(PropertyValue::UInt64),
            PropertyKind::Float => text.parse().ok().map(PropertyValue::Float),
            PropertyKind::Double => text.parse().ok().map(PropertyValue::Double),
            PropertyKind::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(PropertyValue::Bool(true)),
                "false" | "no" | "0" => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            PropertyKind::String => Some(PropertyValue::String(text.to_string())),
            PropertyKind::Enum(_) => {
                let variant = match text.parse::<i32>() {
                    Ok(n) => kind.enum_variant(EnumKey::Value(n)),
                    Err(_) => kind.enum_variant(EnumKey::Nick(text)),
                };
                variant.map(|v| PropertyValue::Enum(v.value))
            }
            PropertyKind::Array(_) | PropertyKind::Structure => None,
        }
    }
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::UInt(v) => write!(f, "{}", v),
            PropertyValue::Int64(v) => write!(f, "{}", v),
            PropertyValue::UInt64(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::String(v) => write!(f, "\"{}\"", v),
            PropertyValue::Enum(v) => write!(f, "{}", v),
            PropertyValue::Array(items) => {
                write!(f, "<")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ">")
            }
            PropertyValue::Structure(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}
