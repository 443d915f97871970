//! JSON leaf to typed property value conversion.
//!
//! Integers are range-checked against the declared width, floating point
//! kinds accept integers, enums accept either the integer value or the nick,
//! and arrays convert element-wise. Objects inside arrays become structures
//! whose field kinds are inferred from the JSON values.

use crate::types::{EnumKey, PropertyKind, PropertyValue};
use serde_json::Value;
use thiserror::Error;

/// Why a JSON leaf could not be converted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoerceError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: PropertyKind,
        found: &'static str,
    },

    #[error("{value} is out of range for {kind}")]
    OutOfRange { kind: PropertyKind, value: String },

    #[error("{value} is not a valid enum value")]
    UnknownVariant { value: String },
}

/// JSON type name used in mismatch reports
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert `value` into a property value of kind `kind`
pub fn coerce(value: &Value, kind: &PropertyKind) -> Result<PropertyValue, CoerceError> {
    let mismatch = || CoerceError::Mismatch {
        expected: kind.clone(),
        found: json_type_name(value),
    };
    let out_of_range = || CoerceError::OutOfRange {
        kind: kind.clone(),
        value: value.to_string(),
    };

    match kind {
        PropertyKind::Int => {
            let n = integer(value).ok_or_else(mismatch)?;
            i32::try_from(n).map(PropertyValue::Int).map_err(|_| out_of_range())
        }
        PropertyKind::UInt => {
            let n = integer(value).ok_or_else(mismatch)?;
            u32::try_from(n).map(PropertyValue::UInt).map_err(|_| out_of_range())
        }
        PropertyKind::Int64 => {
            let n = integer(value).ok_or_else(mismatch)?;
            i64::try_from(n).map(PropertyValue::Int64).map_err(|_| out_of_range())
        }
        PropertyKind::UInt64 => {
            let n = integer(value).ok_or_else(mismatch)?;
            u64::try_from(n).map(PropertyValue::UInt64).map_err(|_| out_of_range())
        }
        PropertyKind::Float => {
            let n = value.as_f64().ok_or_else(mismatch)?;
            if n.is_finite() && n.abs() <= f32::MAX as f64 {
                Ok(PropertyValue::Float(n as f32))
            } else {
                Err(out_of_range())
            }
        }
        PropertyKind::Double => value.as_f64().map(PropertyValue::Double).ok_or_else(mismatch),
        PropertyKind::Bool => value.as_bool().map(PropertyValue::Bool).ok_or_else(mismatch),
        PropertyKind::String => value
            .as_str()
            .map(|s| PropertyValue::String(s.to_string()))
            .ok_or_else(mismatch),
        PropertyKind::Enum(_) => {
            let variant = match value {
                Value::Number(_) => {
                    let n = integer(value)
                        .and_then(|n| i32::try_from(n).ok())
                        .ok_or_else(|| CoerceError::UnknownVariant {
                            value: value.to_string(),
                        })?;
                    kind.enum_variant(EnumKey::Value(n))
                }
                Value::String(nick) => kind.enum_variant(EnumKey::Nick(nick)),
                _ => return Err(mismatch()),
            };
            variant
                .map(|v| PropertyValue::Enum(v.value))
                .ok_or_else(|| CoerceError::UnknownVariant {
                    value: value.to_string(),
                })
        }
        PropertyKind::Array(inner) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .map(|item| coerce(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(PropertyValue::Array)
        }
        PropertyKind::Structure => {
            let object = value.as_object().ok_or_else(mismatch)?;
            Ok(PropertyValue::Structure(
                object
                    .iter()
                    .filter_map(|(name, field)| infer(field).map(|v| (name.clone(), v)))
                    .collect(),
            ))
        }
    }
}

/// Best-fitting property value for a JSON value with no declared kind
///
/// Nulls have no property form and yield `None`; inside arrays and
/// structures they are dropped.
pub fn infer(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(match i32::try_from(i) {
                    Ok(small) => PropertyValue::Int(small),
                    Err(_) => PropertyValue::Int64(i),
                })
            } else if let Some(u) = n.as_u64() {
                Some(PropertyValue::UInt64(u))
            } else {
                n.as_f64().map(PropertyValue::Double)
            }
        }
        Value::String(s) => Some(PropertyValue::String(s.clone())),
        Value::Array(items) => Some(PropertyValue::Array(
            items.iter().filter_map(infer).collect(),
        )),
        Value::Object(object) => Some(PropertyValue::Structure(
            object
                .iter()
                .filter_map(|(name, field)| infer(field).map(|v| (name.clone(), v)))
                .collect(),
        )),
    }
}

/// Integer content of a JSON number, widened so both signs fit
fn integer(value: &Value) -> Option<i128> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}
