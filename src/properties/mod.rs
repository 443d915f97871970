//! Property resolution
//!
//! Turns a configuration document into property assignments on named
//! pipeline components.
//!
//! # Document Shape
//!
//! ```json
//! {
//!   "videoSrc": { "pattern": "snow", "is-live": true },
//!   "mixer":    { "matrix": [[1.0, 0.0], [0.0, 1.0]] }
//! }
//! ```
//!
//! First-level keys name components, second-level keys name properties, and
//! the values are scalars or arrays. Assignments are produced in document
//! order. Shapes with no assignment form (null leaves, objects where a value
//! is expected, non-object component blocks, a non-object root) produce
//! nothing.
//!
//! # Failure Isolation
//!
//! [`apply`] resolves every assignment independently. A missing component,
//! unknown property, incompatible value or engine refusal is recorded in the
//! returned [`ApplyReport`] and the remaining assignments still run.

pub mod coerce;
pub mod diff;

pub use coerce::{coerce, CoerceError};
pub use diff::diff_documents;

use crate::engine::{EngineError, EnginePipeline};
use serde_json::Value;

/// One `(component, property, value)` triple extracted from a document
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub component: String,
    pub property: String,
    pub value: Value,
}

/// Why an assignment was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ComponentNotFound,
    PropertyNotFound,
    TypeMismatch,
    SetFailed,
}

impl FailureKind {
    /// Short message reported through the error callback
    pub fn message(&self) -> &'static str {
        match self {
            FailureKind::ComponentNotFound => "component not found",
            FailureKind::PropertyNotFound => "property not found",
            FailureKind::TypeMismatch => "type mismatch",
            FailureKind::SetFailed => "failed to set property",
        }
    }
}

/// A rejected assignment
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentFailure {
    pub component: String,
    pub property: String,
    pub kind: FailureKind,
    /// Human-readable detail
    pub detail: String,
}

/// Outcome of applying a batch of assignments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub applied: usize,
    pub failures: Vec<AssignmentFailure>,
}

/// Parse a configuration document
pub fn parse_document(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// Extract assignments from a parsed document
pub fn collect_assignments(document: &Value) -> Vec<Assignment> {
    let Value::Object(components) = document else {
        return Vec::new();
    };

    let mut assignments = Vec::new();
    for (component, block) in components {
        let Value::Object(properties) = block else {
            continue;
        };
        for (property, value) in properties {
            match value {
                Value::Null | Value::Object(_) => continue,
                _ => assignments.push(Assignment {
                    component: component.clone(),
                    property: property.clone(),
                    value: value.clone(),
                }),
            }
        }
    }
    assignments
}

/// Resolve and apply one assignment
pub fn apply_one(
    pipeline: &mut dyn EnginePipeline,
    assignment: &Assignment,
) -> Result<(), AssignmentFailure> {
    let fail = |kind: FailureKind, detail: String| AssignmentFailure {
        component: assignment.component.clone(),
        property: assignment.property.clone(),
        kind,
        detail,
    };

    if !pipeline.has_component(&assignment.component) {
        return Err(fail(
            FailureKind::ComponentNotFound,
            format!("Element {} doesn't exist", assignment.component),
        ));
    }

    let kind = pipeline
        .property_kind(&assignment.component, &assignment.property)
        .map_err(|e| match e {
            EngineError::ComponentNotFound(_) => fail(FailureKind::ComponentNotFound, e.to_string()),
            _ => fail(FailureKind::PropertyNotFound, e.to_string()),
        })?;

    let value = coerce(&assignment.value, &kind).map_err(|e| {
        fail(
            FailureKind::TypeMismatch,
            format!("{}.{}: {}", assignment.component, assignment.property, e),
        )
    })?;

    pipeline
        .set_property(&assignment.component, &assignment.property, value)
        .map_err(|e| fail(FailureKind::SetFailed, e.to_string()))
}

/// Apply every assignment, isolating failures
pub fn apply(pipeline: &mut dyn EnginePipeline, assignments: &[Assignment]) -> ApplyReport {
    let mut report = ApplyReport::default();
    for assignment in assignments {
        match apply_one(pipeline, assignment) {
            Ok(()) => {
                tracing::debug!(
                    component = %assignment.component,
                    property = %assignment.property,
                    value = %assignment.value,
                    "Property applied"
                );
                report.applied += 1;
            }
            Err(failure) => {
                tracing::warn!(
                    component = %failure.component,
                    property = %failure.property,
                    "{}: {}",
                    failure.kind.message(),
                    failure.detail
                );
                report.failures.push(failure);
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collect_in_document_order() {
        let doc = parse_document(
            r#"{"v": {"pattern": 1, "is-live": true}, "s": {"sync": false}}"#,
        )
        .unwrap();
        let found: Vec<_> = collect_assignments(&doc)
            .into_iter()
            .map(|a| (a.component, a.property))
            .collect();
        assert_eq!(
            found,
            vec![
                ("v".to_string(), "pattern".to_string()),
                ("v".to_string(), "is-live".to_string()),
                ("s".to_string(), "sync".to_string()),
            ]
        );
    }

    #[test]
    fn test_unsupported_shapes_are_skipped() {
        assert!(collect_assignments(&json!([1, 2])).is_empty());
        assert!(collect_assignments(&json!("text")).is_empty());
        let doc = json!({
            "a": 5,
            "b": {"nested": {"deep": 1}, "gone": null},
            "c": {"kept": [1, 2]}
        });
        let assignments = collect_assignments(&doc);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].component, "c");
        assert_eq!(assignments[0].value, json!([1, 2]));
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(FailureKind::ComponentNotFound.message(), "component not found");
        assert_eq!(FailureKind::TypeMismatch.message(), "type mismatch");
    }

    #[cfg(feature = "sim-engine")]
    mod with_sim {
        use super::*;
        use crate::engine::{MediaEngine, SimEngine};
        use crate::types::PropertyValue;

        #[test]
        fn test_apply_isolates_failures() {
            let engine = SimEngine::new();
            let mut pipeline = engine
                .launch("videotestsrc name=v ! fakesink name=s")
                .unwrap();
            let doc = json!({
                "v": {"pattern": "ball"},
                "ghost": {"sync": true},
                "s": {"sync": true, "bogus": 1, "num-buffers": "ten"}
            });

            let report = apply(pipeline.as_mut(), &collect_assignments(&doc));

            assert_eq!(report.applied, 2);
            let kinds: Vec<_> = report.failures.iter().map(|f| f.kind).collect();
            assert_eq!(
                kinds,
                vec![
                    FailureKind::ComponentNotFound,
                    FailureKind::PropertyNotFound,
                    FailureKind::TypeMismatch,
                ]
            );
            assert!(report.failures[0].detail.contains("ghost"));
            assert_eq!(pipeline.property("v", "pattern"), Ok(PropertyValue::Enum(18)));
            assert_eq!(pipeline.property("s", "sync"), Ok(PropertyValue::Bool(true)));
        }

        #[test]
        fn test_read_only_property_is_a_set_failure() {
            let engine = SimEngine::new();
            let mut pipeline = engine.launch("queue name=q ! fakesink").unwrap();
            let doc = json!({"q": {"current-level-buffers": 3}});
            let report = apply(pipeline.as_mut(), &collect_assignments(&doc));
            assert_eq!(report.applied, 0);
            assert_eq!(report.failures[0].kind, FailureKind::SetFailed);
        }
    }
}
