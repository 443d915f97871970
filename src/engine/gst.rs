//! GStreamer-backed engine
//!
//! Pipelines are built with `gst::parse::launch`. Bus messages are forwarded
//! from a bus sync handler straight into the controller's crossbeam event
//! channel, so no GLib main loop is needed on the worker thread.
//!
//! # Property Kinds
//!
//! Declared kinds come from each element's `ParamSpec`. Enum properties
//! carry their registered `(value, nick)` pairs. For `GstValueArray`
//! properties the element kind is taken from the current value; an empty
//! array is assumed to hold floats.
//!
//! # Enabling
//!
//! Available with the `gstreamer` feature; needs the GStreamer development
//! libraries at build time.

use crate::engine::{
    EngineError, EngineEvent, EngineEventKind, EnginePipeline, EngineResult, EventOrigin,
    MediaEngine, MessageStructure, MessageValue, StateChangeOutcome,
};
use crate::types::{EnumVariant, PropertyKind, PropertyValue, RunState, SurfaceHandle};
use crossbeam_channel::{unbounded, Receiver};
use gstreamer as gst;
use gstreamer::glib;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;

/// Engine backed by the system GStreamer installation
#[derive(Debug)]
pub struct GstEngine {
    _private: (),
}

impl GstEngine {
    /// Initialise GStreamer
    pub fn new() -> EngineResult<Self> {
        gst::init().map_err(|e| EngineError::Unavailable(format!("gst::init failed: {}", e)))?;
        tracing::info!("GStreamer initialised: {}", gst::version_string());
        Ok(Self { _private: () })
    }
}

impl MediaEngine for GstEngine {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn version(&self) -> String {
        gst::version_string().to_string()
    }

    fn launch(&self, description: &str) -> EngineResult<Box<dyn EnginePipeline>> {
        let element =
            gst::parse::launch(description).map_err(|e| EngineError::Build(e.to_string()))?;

        // A single element description yields a bare element
        let pipeline = match element.downcast::<gst::Pipeline>() {
            Ok(pipeline) => pipeline,
            Err(element) => {
                let pipeline = gst::Pipeline::new();
                pipeline
                    .add(&element)
                    .map_err(|e| EngineError::Build(e.to_string()))?;
                pipeline
            }
        };

        let name = pipeline.name().to_string();
        tracing::debug!(pipeline = %name, "Pipeline built");
        Ok(Box::new(GstPipeline { pipeline, name }))
    }
}

/// Pipeline built by [`GstEngine`]
pub struct GstPipeline {
    pipeline: gst::Pipeline,
    name: String,
}

impl GstPipeline {
    fn element(&self, component: &str) -> EngineResult<gst::Element> {
        self.pipeline
            .by_name(component)
            .ok_or_else(|| EngineError::ComponentNotFound(component.to_string()))
    }

    fn param_spec(
        &self,
        component: &str,
        property: &str,
    ) -> EngineResult<(gst::Element, glib::ParamSpec)> {
        let element = self.element(component)?;
        let pspec = element
            .find_property(property)
            .ok_or_else(|| EngineError::PropertyNotFound {
                component: component.to_string(),
                property: property.to_string(),
            })?;
        Ok((element, pspec))
    }
}

fn to_gst_state(state: RunState) -> gst::State {
    match state {
        RunState::VoidPending => gst::State::VoidPending,
        RunState::Null => gst::State::Null,
        RunState::Ready => gst::State::Ready,
        RunState::Paused => gst::State::Paused,
        RunState::Playing => gst::State::Playing,
    }
}

fn from_gst_state(state: gst::State) -> RunState {
    match state {
        gst::State::Null => RunState::Null,
        gst::State::Ready => RunState::Ready,
        gst::State::Paused => RunState::Paused,
        gst::State::Playing => RunState::Playing,
        _ => RunState::VoidPending,
    }
}

fn enum_kind(type_: glib::Type) -> Option<PropertyKind> {
    let class = glib::EnumClass::with_type(type_)?;
    Some(PropertyKind::Enum(
        class
            .values()
            .iter()
            .map(|v| EnumVariant::new(v.value(), v.nick()))
            .collect(),
    ))
}

/// Kind of a runtime value, used for array elements
fn value_kind(value: &glib::Value) -> PropertyKind {
    let type_ = value.type_();
    if type_ == gst::Array::static_type() {
        let inner = value
            .get::<gst::Array>()
            .ok()
            .and_then(|array| array.as_slice().first().map(|v| value_kind(v)))
            .unwrap_or(PropertyKind::Float);
        return PropertyKind::Array(Box::new(inner));
    }
    scalar_kind(type_).unwrap_or(PropertyKind::Structure)
}

fn scalar_kind(type_: glib::Type) -> Option<PropertyKind> {
    let kind = match type_ {
        t if t == glib::Type::I32 => PropertyKind::Int,
        t if t == glib::Type::U32 => PropertyKind::UInt,
        t if t == glib::Type::I64 => PropertyKind::Int64,
        t if t == glib::Type::U64 => PropertyKind::UInt64,
        t if t == glib::Type::F32 => PropertyKind::Float,
        t if t == glib::Type::F64 => PropertyKind::Double,
        t if t == glib::Type::BOOL => PropertyKind::Bool,
        t if t == glib::Type::STRING => PropertyKind::String,
        t if t == gst::Structure::static_type() => PropertyKind::Structure,
        t if t.is_a(glib::Type::ENUM) => return enum_kind(t),
        _ => return None,
    };
    Some(kind)
}

fn to_send_value(value: &PropertyValue) -> Option<glib::SendValue> {
    let send = match value {
        PropertyValue::Int(v) => v.to_send_value(),
        PropertyValue::UInt(v) => v.to_send_value(),
        PropertyValue::Int64(v) => v.to_send_value(),
        PropertyValue::UInt64(v) => v.to_send_value(),
        PropertyValue::Float(v) => v.to_send_value(),
        PropertyValue::Double(v) => v.to_send_value(),
        PropertyValue::Bool(v) => v.to_send_value(),
        PropertyValue::String(v) => v.to_send_value(),
        PropertyValue::Array(items) => {
            gst::Array::from_values(items.iter().filter_map(to_send_value)).to_send_value()
        }
        PropertyValue::Structure(fields) => {
            let mut structure = gst::Structure::new_empty("properties");
            for (name, field) in fields {
                if let Some(field) = to_send_value(field) {
                    structure.set_value(name.as_str(), field);
                }
            }
            structure.to_send_value()
        }
        // Needs the property's enum type
        PropertyValue::Enum(_) => return None,
    };
    Some(send)
}

fn to_glib_value(value: &PropertyValue, pspec: &glib::ParamSpec) -> Option<glib::Value> {
    match value {
        PropertyValue::Enum(n) => glib::EnumClass::with_type(pspec.value_type())?.to_value(*n),
        other => to_send_value(other).map(Into::into),
    }
}

fn from_glib_value(value: &glib::Value) -> Option<PropertyValue> {
    let type_ = value.type_();
    let converted = match scalar_kind(type_) {
        Some(PropertyKind::Int) => PropertyValue::Int(value.get().ok()?),
        Some(PropertyKind::UInt) => PropertyValue::UInt(value.get().ok()?),
        Some(PropertyKind::Int64) => PropertyValue::Int64(value.get().ok()?),
        Some(PropertyKind::UInt64) => PropertyValue::UInt64(value.get().ok()?),
        Some(PropertyKind::Float) => PropertyValue::Float(value.get().ok()?),
        Some(PropertyKind::Double) => PropertyValue::Double(value.get().ok()?),
        Some(PropertyKind::Bool) => PropertyValue::Bool(value.get().ok()?),
        Some(PropertyKind::String) => {
            PropertyValue::String(value.get::<Option<String>>().ok()?.unwrap_or_default())
        }
        Some(PropertyKind::Enum(_)) => {
            PropertyValue::Enum(value.transform::<i32>().ok()?.get().ok()?)
        }
        Some(PropertyKind::Structure) => {
            let structure = value.get::<gst::Structure>().ok()?;
            PropertyValue::Structure(
                structure
                    .iter()
                    .filter_map(|(name, v)| from_glib_value(v).map(|v| (name.to_string(), v)))
                    .collect(),
            )
        }
        _ if type_ == gst::Array::static_type() => {
            let array = value.get::<gst::Array>().ok()?;
            PropertyValue::Array(array.iter().filter_map(|v| from_glib_value(v)).collect())
        }
        _ => return None,
    };
    Some(converted)
}

fn message_value(value: &glib::Value) -> MessageValue {
    let type_ = value.type_();
    if type_ == gst::List::static_type() {
        if let Ok(list) = value.get::<gst::List>() {
            return MessageValue::List(list.iter().map(|v| message_value(v)).collect());
        }
    }
    if type_ == gst::Array::static_type() {
        if let Ok(array) = value.get::<gst::Array>() {
            return MessageValue::List(array.iter().map(|v| message_value(v)).collect());
        }
    }
    if type_ == gst::Structure::static_type() {
        if let Ok(structure) = value.get::<gst::Structure>() {
            return MessageValue::Structure(message_structure(&structure));
        }
    }
    match from_glib_value(value) {
        Some(PropertyValue::Int(v)) => MessageValue::Int(v),
        Some(PropertyValue::UInt(v)) => MessageValue::UInt(v),
        Some(PropertyValue::Int64(v)) => MessageValue::Int64(v),
        Some(PropertyValue::UInt64(v)) => MessageValue::UInt64(v),
        Some(PropertyValue::Float(v)) => MessageValue::Float(v),
        Some(PropertyValue::Double(v)) => MessageValue::Double(v),
        Some(PropertyValue::Bool(v)) => MessageValue::Bool(v),
        Some(PropertyValue::String(v)) => MessageValue::String(v),
        Some(PropertyValue::Enum(v)) => MessageValue::Enum(v),
        _ => MessageValue::Unsupported(type_.name().to_string()),
    }
}

fn message_structure(structure: &gst::StructureRef) -> MessageStructure {
    MessageStructure {
        name: structure.name().to_string(),
        fields: structure
            .iter()
            .map(|(name, value)| (name.to_string(), message_value(value)))
            .collect(),
    }
}

fn convert_message(message: &gst::Message, pipeline_addr: usize) -> EngineEvent {
    use gst::MessageView;

    let origin = match message.src() {
        Some(src) if src.as_ptr() as usize == pipeline_addr => {
            EventOrigin::Pipeline(src.name().to_string())
        }
        Some(src) => EventOrigin::Component(src.name().to_string()),
        None => EventOrigin::Component(String::new()),
    };

    let kind = match message.view() {
        MessageView::Error(err) => EngineEventKind::Error {
            message: err.error().message().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        },
        MessageView::Eos(_) => EngineEventKind::EndOfStream,
        MessageView::StateChanged(change) => EngineEventKind::StateChanged {
            old: from_gst_state(change.old()),
            new: from_gst_state(change.current()),
            pending: from_gst_state(change.pending()),
        },
        MessageView::Element(_) => match message.structure() {
            Some(structure) => EngineEventKind::Element(message_structure(structure)),
            None => EngineEventKind::Other("element".to_string()),
        },
        MessageView::AsyncDone(_) => EngineEventKind::AsyncDone,
        _ => EngineEventKind::Other(format!("{:?}", message.type_())),
    };
    EngineEvent::new(origin, kind)
}

impl EnginePipeline for GstPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach_events(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        let Some(bus) = self.pipeline.bus() else {
            tracing::warn!(pipeline = %self.name, "Pipeline has no bus");
            return rx;
        };
        let pipeline_addr = self.pipeline.as_ptr() as usize;
        bus.set_sync_handler(move |_bus, message| {
            let _ = tx.send(convert_message(message, pipeline_addr));
            gst::BusSyncReply::Drop
        });
        rx
    }

    fn detach_events(&mut self) {
        if let Some(bus) = self.pipeline.bus() {
            bus.unset_sync_handler();
        }
    }

    fn set_state(&mut self, state: RunState) -> EngineResult<StateChangeOutcome> {
        match self.pipeline.set_state(to_gst_state(state)) {
            Ok(gst::StateChangeSuccess::Success) => Ok(StateChangeOutcome::Success),
            Ok(gst::StateChangeSuccess::Async) => Ok(StateChangeOutcome::Async),
            Ok(gst::StateChangeSuccess::NoPreroll) => Ok(StateChangeOutcome::NoPreroll),
            Err(e) => Err(EngineError::StateChange {
                target: state,
                reason: e.to_string(),
            }),
        }
    }

    fn current_state(&self) -> RunState {
        from_gst_state(self.pipeline.current_state())
    }

    fn has_component(&self, component: &str) -> bool {
        self.pipeline.by_name(component).is_some()
    }

    fn property_kind(&self, component: &str, property: &str) -> EngineResult<PropertyKind> {
        let (element, pspec) = self.param_spec(component, property)?;
        let type_ = pspec.value_type();
        if type_ == gst::Array::static_type() {
            return Ok(value_kind(&element.property_value(property)));
        }
        scalar_kind(type_).ok_or_else(|| EngineError::TypeMismatch {
            component: component.to_string(),
            property: property.to_string(),
            expected: PropertyKind::Structure,
        })
    }

    fn set_property(
        &mut self,
        component: &str,
        property: &str,
        value: PropertyValue,
    ) -> EngineResult<()> {
        let (element, pspec) = self.param_spec(component, property)?;
        let flags = pspec.flags();
        if !flags.contains(glib::ParamFlags::WRITABLE)
            || flags.contains(glib::ParamFlags::CONSTRUCT_ONLY)
        {
            return Err(EngineError::PropertyNotWritable {
                component: component.to_string(),
                property: property.to_string(),
            });
        }
        let expected = self.property_kind(component, property)?;
        let converted = to_glib_value(&value, &pspec)
            .filter(|v| v.type_().is_a(pspec.value_type()) && value.matches(&expected))
            .ok_or_else(|| EngineError::TypeMismatch {
                component: component.to_string(),
                property: property.to_string(),
                expected,
            })?;
        // glib panics on values its validator would clamp
        if !pspec.value_is_valid(&converted) {
            return Err(EngineError::OutOfRange {
                component: component.to_string(),
                property: property.to_string(),
                value: value.to_string(),
            });
        }
        element.set_property_from_value(property, &converted);
        Ok(())
    }

    fn property(&self, component: &str, property: &str) -> EngineResult<PropertyValue> {
        let (element, pspec) = self.param_spec(component, property)?;
        from_glib_value(&element.property_value(property)).ok_or_else(|| {
            EngineError::TypeMismatch {
                component: component.to_string(),
                property: property.to_string(),
                expected: scalar_kind(pspec.value_type()).unwrap_or(PropertyKind::Structure),
            }
        })
    }

    fn bind_surface(&mut self, surface: Option<SurfaceHandle>) -> bool {
        let Some(overlay) = self
            .pipeline
            .by_interface(gst_video::VideoOverlay::static_type())
            .and_then(|e| e.dynamic_cast::<gst_video::VideoOverlay>().ok())
        else {
            return false;
        };
        // SAFETY: the handle is a live native window owned by the caller,
        // which keeps it valid until it is handed back through the releaser.
        unsafe {
            overlay.set_window_handle(surface.map(|s| s.as_raw()).unwrap_or(0));
        }
        true
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        self.detach_events();
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
