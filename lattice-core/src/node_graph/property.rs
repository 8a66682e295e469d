//! Property values, their UI hints, and validator/observer plumbing.

use serde::{Deserialize, Serialize};

/// A 3x3 matrix stored row-major, the value backing `NodeProperty::Matrix3x3`.
pub type Matrix3x3 = [f64; 9];

pub const MATRIX3X3_IDENTITY: Matrix3x3 = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
pub const MATRIX3X3_ZERO: Matrix3x3 = [0.0; 9];

/// Closed set of property value kinds a node config can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Boolean,
    Integer,
    Double,
    Enum,
    Matrix3x3,
    Filepath,
    String,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Boolean => "boolean",
            PropertyKind::Integer => "integer",
            PropertyKind::Double => "double",
            PropertyKind::Enum => "enum",
            PropertyKind::Matrix3x3 => "matrix3x3",
            PropertyKind::Filepath => "filepath",
            PropertyKind::String => "string",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "boolean" => PropertyKind::Boolean,
            "integer" => PropertyKind::Integer,
            "double" => PropertyKind::Double,
            "enum" => PropertyKind::Enum,
            "matrix3x3" => PropertyKind::Matrix3x3,
            "filepath" => PropertyKind::Filepath,
            "string" => PropertyKind::String,
            _ => return None,
        })
    }
}

/// A concrete property value. Closed enum matching [`PropertyKind`] one to one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeProperty {
    Boolean(bool),
    Integer(i32),
    Double(f64),
    Enum(i32),
    Matrix3x3(Matrix3x3),
    Filepath(String),
    String(String),
}

impl NodeProperty {
    pub fn kind(&self) -> PropertyKind {
        match self {
            NodeProperty::Boolean(_) => PropertyKind::Boolean,
            NodeProperty::Integer(_) => PropertyKind::Integer,
            NodeProperty::Double(_) => PropertyKind::Double,
            NodeProperty::Enum(_) => PropertyKind::Enum,
            NodeProperty::Matrix3x3(_) => PropertyKind::Matrix3x3,
            NodeProperty::Filepath(_) => PropertyKind::Filepath,
            NodeProperty::String(_) => PropertyKind::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NodeProperty::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NodeProperty::Integer(v) => Some(*v),
            NodeProperty::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NodeProperty::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix3x3(&self) -> Option<&Matrix3x3> {
        match self {
            NodeProperty::Matrix3x3(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeProperty::Filepath(v) | NodeProperty::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Type-specific metadata a node config publishes for a property, consumed
/// only by a hypothetical GUI; the engine stores and round-trips it but
/// assigns it no execution semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiHint {
    Integer {
        min: i32,
        max: i32,
        step: i32,
        wrap: bool,
    },
    Double {
        min: f64,
        max: f64,
        step: f64,
        decimals: u8,
    },
    Enum {
        items: Vec<String>,
    },
    Filepath {
        filter: String,
        is_save: bool,
    },
    None,
}

impl Default for UiHint {
    fn default() -> Self {
        UiHint::None
    }
}

/// Returns `false` to reject a write; invoked before the value is stored.
pub type PropertyValidator = Box<dyn Fn(&NodeProperty) -> bool + Send + Sync>;

/// Invoked after a write is accepted.
pub type PropertyObserver = Box<dyn Fn(&NodeProperty) + Send + Sync>;

/// Immutable per-property descriptor, carried inside a [`NodeConfig`](crate::node_graph::NodeConfig).
pub struct PropertyConfig {
    pub id: super::ids::PropertyId,
    pub name: String,
    pub kind: PropertyKind,
    pub default_value: NodeProperty,
    pub ui_hint: UiHint,
    pub description: String,
    pub validator: Option<PropertyValidator>,
    pub observer: Option<PropertyObserver>,
}

impl std::fmt::Debug for PropertyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default_value", &self.default_value)
            .field("ui_hint", &self.ui_hint)
            .field("description", &self.description)
            .field("validator", &self.validator.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl PropertyConfig {
    pub fn new(
        id: super::ids::PropertyId,
        name: impl Into<String>,
        default_value: NodeProperty,
    ) -> Self {
        let kind = default_value.kind();
        Self {
            id,
            name: name.into(),
            kind,
            default_value,
            ui_hint: UiHint::None,
            description: String::new(),
            validator: None,
            observer: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_ui_hint(mut self, hint: UiHint) -> Self {
        self.ui_hint = hint;
        self
    }

    pub fn with_validator(mut self, validator: PropertyValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_observer(mut self, observer: PropertyObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs the validator (if any); a missing validator always accepts.
    pub fn validate(&self, value: &NodeProperty) -> bool {
        match &self.validator {
            Some(validator) => validator(value),
            None => true,
        }
    }

    pub fn notify(&self, value: &NodeProperty) {
        if let Some(observer) = &self.observer {
            observer(value);
        }
    }
}

/// Range-combinator validators, generalizing `original_source`'s
/// `RangePropertyValidator<T>` template family into boxed closures.
pub mod validators {
    use super::{NodeProperty, PropertyValidator};

    fn numeric(value: &NodeProperty) -> Option<f64> {
        match value {
            NodeProperty::Integer(v) => Some(*v as f64),
            NodeProperty::Double(v) => Some(*v),
            NodeProperty::Enum(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// `min <= value <= max` (original's `InclRangePropertyValidator`).
    pub fn in_range_inclusive(min: f64, max: f64) -> PropertyValidator {
        Box::new(move |value| numeric(value).is_some_and(|v| v >= min && v <= max))
    }

    /// `min < value < max` (original's `ExclRangePropertyValidator`).
    pub fn in_range_exclusive(min: f64, max: f64) -> PropertyValidator {
        Box::new(move |value| numeric(value).is_some_and(|v| v > min && v < max))
    }

    /// `value >= min` (original's `MinPropertyValidator`).
    pub fn at_least(min: f64) -> PropertyValidator {
        Box::new(move |value| numeric(value).is_some_and(|v| v >= min))
    }

    /// `value > min` (original's `GreaterPropertyValidator`).
    pub fn greater_than(min: f64) -> PropertyValidator {
        Box::new(move |value| numeric(value).is_some_and(|v| v > min))
    }

    /// `value <= max` (original's `MaxPropertyValidator`).
    pub fn at_most(max: f64) -> PropertyValidator {
        Box::new(move |value| numeric(value).is_some_and(|v| v <= max))
    }

    /// `value < max` (original's `LessPropertyValidator`).
    pub fn less_than(max: f64) -> PropertyValidator {
        Box::new(move |value| numeric(value).is_some_and(|v| v < max))
    }
}
