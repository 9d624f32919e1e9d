//! Property definitions, classes and class hierarchies.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// Declared type of a property definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PropertyKind {
    Bool,
    Integer,
    Unsigned,
    String,
    Float,
    Vector,
    /// Compound value: a nested property list drawn from a fixed sub-schema.
    Object,
    Colour,
    /// Bezier figure.
    Custom,
    Quaternion,
}

impl PropertyKind {
    /// All kinds, in wire tag order.
    pub const ALL: [PropertyKind; 10] = [
        Self::Bool,
        Self::Integer,
        Self::Unsigned,
        Self::String,
        Self::Float,
        Self::Vector,
        Self::Object,
        Self::Colour,
        Self::Custom,
        Self::Quaternion,
    ];

    /// Parse a schema type name (case-insensitive, accepts common aliases).
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Self::Bool,
            "integer" | "int" => Self::Integer,
            "unsigned" | "uint" => Self::Unsigned,
            "string" => Self::String,
            "float" => Self::Float,
            "vector" => Self::Vector,
            "object" => Self::Object,
            "colour" | "color" => Self::Colour,
            "custom" => Self::Custom,
            "quaternion" => Self::Quaternion,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::Integer => "Integer",
            Self::Unsigned => "Unsigned",
            Self::String => "String",
            Self::Float => "Float",
            Self::Vector => "Vector",
            Self::Object => "Object",
            Self::Colour => "Colour",
            Self::Custom => "Custom",
            Self::Quaternion => "Quaternion",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Flag set attached to a property definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    pub const NONE: Self = Self(0);
    /// Value is an array rather than a scalar.
    pub const INDEXED: Self = Self(0x1);
    /// Hidden from designers.
    pub const HIDDEN: Self = Self(0x2);
    /// String is localizable.
    pub const LOCALIZE: Self = Self(0x4);

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether all bits of `other` are set.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Parse a `|`, `,` or whitespace separated flag list.
    pub fn parse(text: &str) -> Option<Self> {
        let mut flags = Self::NONE;
        for token in text.split(|c: char| c == '|' || c == ',' || c.is_whitespace()) {
            let flag = match token.to_ascii_lowercase().as_str() {
                "" | "none" => Self::NONE,
                "indexed" => Self::INDEXED,
                "hidden" => Self::HIDDEN,
                "localize" => Self::LOCALIZE,
                _ => return None,
            };
            flags = flags.union(flag);
        }
        Some(flags)
    }
}

/// A property definition owned by the schema and referenced by properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XuPropertyDefinition {
    pub name: String,
    pub kind: PropertyKind,
    /// Class that declares this property.
    pub parent_class_name: String,
    pub flags: PropertyFlags,
}

impl XuPropertyDefinition {
    /// Create a definition declared by `parent_class_name`.
    pub fn new(
        name: impl Into<String>,
        kind: PropertyKind,
        parent_class_name: impl Into<String>,
        flags: PropertyFlags,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            parent_class_name: parent_class_name.into(),
            flags,
        }
    }

    /// Whether values are arrays.
    #[inline]
    pub fn is_indexed(&self) -> bool {
        self.flags.contains(PropertyFlags::INDEXED)
    }

    /// `Class.Property` display name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.parent_class_name, self.name)
    }

    /// Same definition, compared by declaring class and name.
    #[inline]
    pub fn same_as(&self, other: &XuPropertyDefinition) -> bool {
        self.name == other.name && self.parent_class_name == other.parent_class_name
    }
}

/// One class of the schema with its own (not inherited) property definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct XuClass {
    pub name: String,
    pub base_class_name: Option<String>,
    pub properties: Vec<Arc<XuPropertyDefinition>>,
}

impl XuClass {
    /// Create an empty class.
    pub fn new(name: impl Into<String>, base_class_name: Option<&str>) -> Self {
        Self {
            name: name.into(),
            base_class_name: base_class_name.map(str::to_string),
            properties: Vec::new(),
        }
    }

    /// Append a scalar property definition.
    pub fn with_property(self, name: &str, kind: PropertyKind) -> Self {
        self.with_flagged_property(name, kind, PropertyFlags::NONE)
    }

    /// Append an indexed (array) property definition.
    pub fn with_indexed_property(self, name: &str, kind: PropertyKind) -> Self {
        self.with_flagged_property(name, kind, PropertyFlags::INDEXED)
    }

    /// Append a property definition with explicit flags.
    pub fn with_flagged_property(mut self, name: &str, kind: PropertyKind, flags: PropertyFlags) -> Self {
        let def = XuPropertyDefinition::new(name, kind, self.name.clone(), flags);
        self.properties.push(Arc::new(def));
        self
    }

    /// Look up an own property definition by name.
    pub fn property(&self, name: &str) -> Option<&Arc<XuPropertyDefinition>> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Index of an own property definition.
    pub fn property_index(&self, def: &XuPropertyDefinition) -> Option<usize> {
        self.properties.iter().position(|p| p.same_as(def))
    }

    /// Number of presence-mask bytes this class contributes.
    #[inline]
    pub fn mask_len(&self) -> usize {
        self.properties.len().div_ceil(8)
    }
}

/// Resolved inheritance chain, most-derived class first.
#[derive(Debug, Clone)]
pub struct ClassHierarchy {
    classes: Arc<[Arc<XuClass>]>,
}

impl ClassHierarchy {
    /// Build from classes ordered most-derived first.
    pub fn new(classes: Vec<Arc<XuClass>>) -> Self {
        Self { classes: classes.into() }
    }

    /// Hierarchy containing a single class (compound sub-schemas).
    pub fn single(class: Arc<XuClass>) -> Self {
        Self::new(vec![class])
    }

    /// Number of levels.
    #[inline]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The class the hierarchy was resolved for.
    pub fn most_derived(&self) -> Option<&Arc<XuClass>> {
        self.classes.first()
    }

    /// Level `depth`, 0 being the most-derived class.
    pub fn level(&self, depth: usize) -> Option<&Arc<XuClass>> {
        self.classes.get(depth)
    }

    /// Levels, most-derived first.
    pub fn derived_first(&self) -> impl DoubleEndedIterator<Item = &Arc<XuClass>> + '_ {
        self.classes.iter()
    }

    /// Levels, base class first.
    pub fn base_first(&self) -> impl DoubleEndedIterator<Item = &Arc<XuClass>> + '_ {
        self.classes.iter().rev()
    }

    /// Find where a definition lives: `(depth, index within level)`.
    pub fn locate(&self, def: &XuPropertyDefinition) -> Option<(usize, usize)> {
        self.classes
            .iter()
            .enumerate()
            .find_map(|(depth, class)| class.property_index(def).map(|i| (depth, i)))
    }

    /// Find a definition by name, searching from the most-derived class.
    pub fn property(&self, name: &str) -> Option<&Arc<XuPropertyDefinition>> {
        self.classes.iter().find_map(|c| c.property(name))
    }

    /// Number of definitions across all levels.
    pub fn property_count(&self) -> usize {
        self.classes.iter().map(|c| c.properties.len()).sum()
    }
}
