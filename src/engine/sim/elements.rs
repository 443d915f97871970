//! Element factory registry for the simulated engine.
//!
//! Each factory declares its role, whether it can render to a surface, and
//! the typed properties it exposes with their defaults. The property sets
//! follow the real plugins closely enough for configuration documents
//! written against GStreamer to resolve the same way here.

use crate::types::{EnumVariant, PropertyKind, PropertyValue};

/// What an element does in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    Source,
    Filter,
    Sink,
}

/// Declared property of a factory
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub default: PropertyValue,
    pub writable: bool,
    /// Inclusive bounds for numeric properties
    pub range: Option<(f64, f64)>,
}

impl PropertySpec {
    fn new(name: &'static str, kind: PropertyKind, default: PropertyValue) -> Self {
        Self {
            name,
            kind,
            default,
            writable: true,
            range: None,
        }
    }

    fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Whether a numeric `value` lies inside the declared bounds
    pub fn in_range(&self, value: f64) -> bool {
        self.range
            .map_or(true, |(min, max)| value >= min && value <= max)
    }
}

/// Static description of an element factory
#[derive(Debug, Clone)]
pub struct FactoryInfo {
    pub name: &'static str,
    pub role: ElementRole,
    /// Implements the video overlay interface
    pub video_overlay: bool,
    pub properties: Vec<PropertySpec>,
}

impl FactoryInfo {
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.name == name)
    }
}

fn variants(pairs: &[(i32, &str)]) -> PropertyKind {
    PropertyKind::Enum(
        pairs
            .iter()
            .map(|(value, nick)| EnumVariant::new(*value, *nick))
            .collect(),
    )
}

fn video_test_patterns() -> PropertyKind {
    variants(&[
        (0, "smpte"),
        (1, "snow"),
        (2, "black"),
        (3, "white"),
        (4, "red"),
        (5, "green"),
        (6, "blue"),
        (7, "checkers-1"),
        (8, "checkers-2"),
        (9, "checkers-4"),
        (10, "checkers-8"),
        (11, "circular"),
        (12, "blink"),
        (13, "smpte75"),
        (14, "zone-plate"),
        (15, "gamut"),
        (16, "chroma-zone-plate"),
        (17, "solid-color"),
        (18, "ball"),
    ])
}

fn num_buffers() -> PropertySpec {
    PropertySpec::new("num-buffers", PropertyKind::Int, PropertyValue::Int(-1))
        .range(-1.0, f64::from(i32::MAX))
}

fn is_live() -> PropertySpec {
    PropertySpec::new("is-live", PropertyKind::Bool, PropertyValue::Bool(false))
}

fn sync(default: bool) -> PropertySpec {
    PropertySpec::new("sync", PropertyKind::Bool, PropertyValue::Bool(default))
}

fn video_sink(name: &'static str) -> FactoryInfo {
    FactoryInfo {
        name,
        role: ElementRole::Sink,
        video_overlay: true,
        properties: vec![
            sync(true),
            PropertySpec::new(
                "force-aspect-ratio",
                PropertyKind::Bool,
                PropertyValue::Bool(true),
            ),
        ],
    }
}

fn plain(name: &'static str, role: ElementRole, properties: Vec<PropertySpec>) -> FactoryInfo {
    FactoryInfo {
        name,
        role,
        video_overlay: false,
        properties,
    }
}

/// Look up a factory by name
pub fn factory(name: &str) -> Option<FactoryInfo> {
    let name: &'static str = FACTORY_NAMES.iter().copied().find(|n| *n == name)?;
    let info = match name {
        "videotestsrc" => plain(
            name,
            ElementRole::Source,
            vec![
                PropertySpec::new("pattern", video_test_patterns(), PropertyValue::Enum(0)),
                is_live(),
                num_buffers(),
                PropertySpec::new(
                    "foreground-color",
                    PropertyKind::UInt,
                    PropertyValue::UInt(0xffff_ffff),
                ),
            ],
        ),
        "gltestsrc" => plain(
            name,
            ElementRole::Source,
            vec![
                PropertySpec::new("pattern", video_test_patterns(), PropertyValue::Enum(0)),
                is_live(),
                num_buffers(),
            ],
        ),
        "audiotestsrc" => plain(
            name,
            ElementRole::Source,
            vec![
                PropertySpec::new("freq", PropertyKind::Double, PropertyValue::Double(440.0))
                    .range(0.0, 20_000.0),
                PropertySpec::new("volume", PropertyKind::Double, PropertyValue::Double(0.8))
                    .range(0.0, 1.0),
                PropertySpec::new(
                    "wave",
                    variants(&[
                        (0, "sine"),
                        (1, "square"),
                        (2, "saw"),
                        (3, "triangle"),
                        (4, "silence"),
                        (5, "white-noise"),
                        (6, "pink-noise"),
                        (7, "sine-table"),
                        (8, "ticks"),
                    ]),
                    PropertyValue::Enum(0),
                ),
                is_live(),
                num_buffers(),
            ],
        ),
        "filesrc" => plain(
            name,
            ElementRole::Source,
            vec![
                PropertySpec::new(
                    "location",
                    PropertyKind::String,
                    PropertyValue::String(String::new()),
                ),
                num_buffers(),
            ],
        ),
        "uridecodebin" => plain(
            name,
            ElementRole::Source,
            vec![PropertySpec::new(
                "uri",
                PropertyKind::String,
                PropertyValue::String(String::new()),
            )],
        ),
        "queue" => plain(
            name,
            ElementRole::Filter,
            vec![
                PropertySpec::new(
                    "max-size-buffers",
                    PropertyKind::UInt,
                    PropertyValue::UInt(200),
                ),
                PropertySpec::new(
                    "max-size-bytes",
                    PropertyKind::UInt,
                    PropertyValue::UInt(10_485_760),
                ),
                PropertySpec::new(
                    "max-size-time",
                    PropertyKind::UInt64,
                    PropertyValue::UInt64(1_000_000_000),
                ),
                PropertySpec::new(
                    "leaky",
                    variants(&[(0, "no"), (1, "upstream"), (2, "downstream")]),
                    PropertyValue::Enum(0),
                ),
                PropertySpec::new(
                    "current-level-buffers",
                    PropertyKind::UInt,
                    PropertyValue::UInt(0),
                )
                .read_only(),
            ],
        ),
        "capsfilter" => plain(
            name,
            ElementRole::Filter,
            vec![PropertySpec::new(
                "caps",
                PropertyKind::String,
                PropertyValue::String("ANY".to_string()),
            )],
        ),
        "videoconvert" | "audioconvert" | "audioresample" | "tee" => {
            plain(name, ElementRole::Filter, Vec::new())
        }
        "identity" => plain(
            name,
            ElementRole::Filter,
            vec![
                sync(false),
                PropertySpec::new("silent", PropertyKind::Bool, PropertyValue::Bool(true)),
            ],
        ),
        "volume" => plain(
            name,
            ElementRole::Filter,
            vec![
                PropertySpec::new("volume", PropertyKind::Double, PropertyValue::Double(1.0))
                    .range(0.0, 10.0),
                PropertySpec::new("mute", PropertyKind::Bool, PropertyValue::Bool(false)),
            ],
        ),
        "level" => plain(
            name,
            ElementRole::Filter,
            vec![
                PropertySpec::new(
                    "interval",
                    PropertyKind::UInt64,
                    PropertyValue::UInt64(100_000_000),
                ),
                PropertySpec::new(
                    "post-messages",
                    PropertyKind::Bool,
                    PropertyValue::Bool(true),
                ),
                PropertySpec::new(
                    "peak-ttl",
                    PropertyKind::UInt64,
                    PropertyValue::UInt64(300_000_000),
                ),
            ],
        ),
        "textoverlay" => plain(
            name,
            ElementRole::Filter,
            vec![
                PropertySpec::new(
                    "text",
                    PropertyKind::String,
                    PropertyValue::String(String::new()),
                ),
                PropertySpec::new(
                    "font-desc",
                    PropertyKind::String,
                    PropertyValue::String(String::new()),
                ),
                PropertySpec::new(
                    "valignment",
                    variants(&[
                        (0, "baseline"),
                        (1, "bottom"),
                        (2, "top"),
                        (3, "position"),
                        (4, "center"),
                        (5, "absolute"),
                    ]),
                    PropertyValue::Enum(0),
                ),
                PropertySpec::new(
                    "halignment",
                    variants(&[
                        (0, "left"),
                        (1, "center"),
                        (2, "right"),
                        (4, "position"),
                        (5, "absolute"),
                    ]),
                    PropertyValue::Enum(1),
                ),
            ],
        ),
        "audiomixmatrix" => plain(
            name,
            ElementRole::Filter,
            vec![
                PropertySpec::new("in-channels", PropertyKind::UInt, PropertyValue::UInt(0)),
                PropertySpec::new("out-channels", PropertyKind::UInt, PropertyValue::UInt(0)),
                PropertySpec::new(
                    "matrix",
                    PropertyKind::Array(Box::new(PropertyKind::Array(Box::new(
                        PropertyKind::Float,
                    )))),
                    PropertyValue::Array(Vec::new()),
                ),
            ],
        ),
        "fakesink" => plain(
            name,
            ElementRole::Sink,
            vec![
                sync(false),
                PropertySpec::new("async", PropertyKind::Bool, PropertyValue::Bool(true)),
                PropertySpec::new("silent", PropertyKind::Bool, PropertyValue::Bool(true)),
                PropertySpec::new(
                    "signal-handoffs",
                    PropertyKind::Bool,
                    PropertyValue::Bool(false),
                ),
                num_buffers(),
            ],
        ),
        "autoaudiosink" => plain(name, ElementRole::Sink, vec![sync(true)]),
        "autovideosink" | "glimagesink" | "xvimagesink" | "waylandsink" => {
            video_sink(name)
        }
        "fpsdisplaysink" => {
            let mut info = video_sink(name);
            info.properties.push(PropertySpec::new(
                "text-overlay",
                PropertyKind::Bool,
                PropertyValue::Bool(true),
            ));
            info.properties.push(
                PropertySpec::new(
                    "frames-rendered",
                    PropertyKind::UInt,
                    PropertyValue::UInt(0),
                )
                .read_only(),
            );
            info
        }
        _ => return None,
    };
    Some(info)
}

/// Every factory the simulated engine can instantiate
pub const FACTORY_NAMES: &[&str] = &[
    "videotestsrc",
    "gltestsrc",
    "audiotestsrc",
    "filesrc",
    "uridecodebin",
    "queue",
    "capsfilter",
    "videoconvert",
    "audioconvert",
    "audioresample",
    "tee",
    "identity",
    "volume",
    "level",
    "textoverlay",
    "audiomixmatrix",
    "fakesink",
    "autoaudiosink",
    "autovideosink",
    "glimagesink",
    "xvimagesink",
    "waylandsink",
    "fpsdisplaysink",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_factory_resolves() {
        for name in FACTORY_NAMES {
            let info = factory(name).unwrap_or_else(|| panic!("missing factory {}", name));
            assert_eq!(info.name, *name);
        }
        assert!(factory("nosuchelement").is_none());
    }

    #[test]
    fn test_defaults_match_kinds() {
        for name in FACTORY_NAMES {
            let info = factory(name).unwrap();
            for spec in &info.properties {
                assert!(
                    spec.default.matches(&spec.kind),
                    "{}.{} default does not match its kind",
                    name,
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_overlay_capable_sinks() {
        assert!(factory("autovideosink").unwrap().video_overlay);
        assert!(factory("fpsdisplaysink").unwrap().video_overlay);
        assert!(!factory("fakesink").unwrap().video_overlay);
    }
}
