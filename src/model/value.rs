//! Property values.

use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::schema::{PropertyKind, XuPropertyDefinition};
use crate::util::{Error, Result};

/// Three-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct XuVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl XuVector {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Rotation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct XuQuaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl XuQuaternion {
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for XuQuaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 8-bit ARGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct XuColour {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl XuColour {
    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Unpack from `0xAARRGGBB`.
    pub const fn from_argb(argb: u32) -> Self {
        Self {
            a: (argb >> 24) as u8,
            r: (argb >> 16) as u8,
            g: (argb >> 8) as u8,
            b: argb as u8,
        }
    }

    /// Pack to `0xAARRGGBB`.
    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// 2D point used by figures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct XuPoint {
    pub x: f32,
    pub y: f32,
}

impl XuPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Bezier point with its two control points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct XuBezierPoint {
    pub point: XuPoint,
    pub control1: XuPoint,
    pub control2: XuPoint,
}

/// Bezier figure (`Custom` property type).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct XuFigure {
    /// Bounding point (width, height).
    pub bounds: XuPoint,
    pub points: Vec<XuBezierPoint>,
}

/// A single value of one of the property kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum XuValue {
    Bool(bool),
    Integer(i32),
    Unsigned(u32),
    String(String),
    Float(f32),
    Vector(XuVector),
    /// Compound value; properties come from the sub-schema named by the outer property.
    Object(Vec<XuProperty>),
    Colour(XuColour),
    Custom(XuFigure),
    Quaternion(XuQuaternion),
}

impl XuValue {
    /// Kind of this value.
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::Integer(_) => PropertyKind::Integer,
            Self::Unsigned(_) => PropertyKind::Unsigned,
            Self::String(_) => PropertyKind::String,
            Self::Float(_) => PropertyKind::Float,
            Self::Vector(_) => PropertyKind::Vector,
            Self::Object(_) => PropertyKind::Object,
            Self::Colour(_) => PropertyKind::Colour,
            Self::Custom(_) => PropertyKind::Custom,
            Self::Quaternion(_) => PropertyKind::Quaternion,
        }
    }

    /// Zero value of a kind, used to fill array slots with no base value.
    pub fn default_for(kind: PropertyKind) -> Self {
        match kind {
            PropertyKind::Bool => Self::Bool(false),
            PropertyKind::Integer => Self::Integer(0),
            PropertyKind::Unsigned => Self::Unsigned(0),
            PropertyKind::String => Self::String(String::new()),
            PropertyKind::Float => Self::Float(0.0),
            PropertyKind::Vector => Self::Vector(XuVector::default()),
            PropertyKind::Object => Self::Object(Vec::new()),
            PropertyKind::Colour => Self::Colour(XuColour::default()),
            PropertyKind::Custom => Self::Custom(XuFigure::default()),
            PropertyKind::Quaternion => Self::Quaternion(XuQuaternion::default()),
        }
    }

    /// Nested property list of a compound value.
    pub fn as_object(&self) -> Option<&[XuProperty]> {
        match self {
            Self::Object(props) => Some(props),
            _ => None,
        }
    }
}

/// Scalar or array payload of a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum XuPropertyValue {
    Single(XuValue),
    Indexed(Vec<XuValue>),
}

impl XuPropertyValue {
    /// Iterate scalar values (one for `Single`, every slot for `Indexed`).
    pub fn values(&self) -> impl Iterator<Item = &XuValue> + '_ {
        let slice: &[XuValue] = match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Indexed(vs) => vs,
        };
        slice.iter()
    }
}

/// A property value bound to its schema definition.
#[derive(Debug, Clone, PartialEq)]
pub struct XuProperty {
    pub definition: Arc<XuPropertyDefinition>,
    pub value: XuPropertyValue,
}

impl XuProperty {
    /// Scalar property.
    pub fn new(definition: Arc<XuPropertyDefinition>, value: XuValue) -> Self {
        Self { definition, value: XuPropertyValue::Single(value) }
    }

    /// Indexed (array) property.
    pub fn indexed(definition: Arc<XuPropertyDefinition>, values: Vec<XuValue>) -> Self {
        Self { definition, value: XuPropertyValue::Indexed(values) }
    }

    /// Property name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Scalar value, if not indexed.
    pub fn single(&self) -> Option<&XuValue> {
        match &self.value {
            XuPropertyValue::Single(v) => Some(v),
            XuPropertyValue::Indexed(_) => None,
        }
    }

    /// Array slots, if indexed.
    pub fn slots(&self) -> Option<&[XuValue]> {
        match &self.value {
            XuPropertyValue::Indexed(vs) => Some(vs),
            XuPropertyValue::Single(_) => None,
        }
    }

    /// Check that the value shape matches the definition.
    pub fn validate(&self) -> Result<()> {
        let def = &self.definition;
        let mismatch = |actual: String| Error::TypeMismatch {
            property: def.qualified_name(),
            expected: if def.is_indexed() { format!("{}[]", def.kind) } else { def.kind.to_string() },
            actual,
        };
        match (&self.value, def.is_indexed()) {
            (XuPropertyValue::Single(v), false) if v.kind() == def.kind => Ok(()),
            (XuPropertyValue::Single(v), _) => Err(mismatch(v.kind().to_string())),
            (XuPropertyValue::Indexed(vs), true) => match vs.iter().find(|v| v.kind() != def.kind) {
                Some(v) => Err(mismatch(format!("{}[]", v.kind()))),
                None => Ok(()),
            },
            (XuPropertyValue::Indexed(_), false) => Err(mismatch(format!("{}[]", def.kind))),
        }
    }
}

impl Serialize for XuProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("XuProperty", 2)?;
        state.serialize_field("name", &self.definition.name)?;
        state.serialize_field("value", &self.value)?;
        state.end()
    }
}

/// Find a property by definition in a list.
pub fn find_property<'a>(
    properties: &'a [XuProperty],
    def: &XuPropertyDefinition,
) -> Option<&'a XuProperty> {
    properties.iter().find(|p| p.definition.same_as(def))
}
