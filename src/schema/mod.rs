//! Class and property schema used by the codec.
//!
//! The codec never hard-codes class layouts: every property set is decoded
//! against a [`SchemaProvider`] passed in by the caller. [`Schema`] is the
//! stock provider, built programmatically, from extension XML, or from the
//! bundled XUI class set via [`Schema::builtin`].

mod types;
mod xml;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::util::{Error, Result};

pub use types::*;
pub use xml::parse_extension_xml;

/// Bundled XUI class definitions in extension XML form.
const BUILTIN_XML: &str = include_str!("builtin.xml");

/// Upper bound on inheritance depth; deeper chains are treated as cycles.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Compound sub-schemas, keyed by the *outer* property name.
pub const COMPOUND_SUBSCHEMAS: [(&str, &str); 3] = [
    ("Fill", "XuiFigureFill"),
    ("Gradient", "XuiFigureFillGradient"),
    ("Stroke", "XuiFigureStroke"),
];

/// Sub-schema class name for a compound property name.
pub fn compound_class_name(property_name: &str) -> Option<&'static str> {
    COMPOUND_SUBSCHEMAS
        .iter()
        .find(|(prop, _)| *prop == property_name)
        .map(|(_, class)| *class)
}

/// Resolves class names to property layouts.
///
/// Implementations must tolerate concurrent read-only lookups: batch tools
/// share one provider across files decoded in parallel.
pub trait SchemaProvider: Send + Sync {
    /// Inheritance chain of `name`, most-derived class first.
    fn resolve_class(&self, name: &str) -> Result<ClassHierarchy>;

    /// A single class without its bases.
    fn resolve_class_by_name(&self, name: &str) -> Result<Arc<XuClass>>;

    /// Sub-schema for a compound (Object-typed) property.
    fn compound_class(&self, property: &XuPropertyDefinition) -> Result<Arc<XuClass>> {
        let class_name = compound_class_name(&property.name)
            .ok_or_else(|| Error::CompoundSchemaNotFound(property.name.clone()))?;
        self.resolve_class_by_name(class_name)
            .map_err(|_| Error::CompoundSchemaNotFound(property.name.clone()))
    }
}

/// In-memory class registry with a hierarchy cache.
#[derive(Default)]
pub struct Schema {
    classes: HashMap<String, Arc<XuClass>>,
    hierarchies: RwLock<HashMap<String, ClassHierarchy>>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema holding the bundled XUI classes.
    pub fn builtin() -> Result<Self> {
        Self::from_xml(BUILTIN_XML)
    }

    /// Schema from extension XML text.
    pub fn from_xml(text: &str) -> Result<Self> {
        let mut schema = Self::new();
        schema.load_xml(text)?;
        Ok(schema)
    }

    /// Add every class from extension XML text.
    pub fn load_xml(&mut self, text: &str) -> Result<()> {
        for class in parse_extension_xml(text)? {
            self.add_class(class)?;
        }
        Ok(())
    }

    /// Register a class. Names must be unique.
    pub fn add_class(&mut self, class: XuClass) -> Result<()> {
        if self.classes.contains_key(&class.name) {
            return Err(Error::SchemaLoad(format!("class {} defined twice", class.name)));
        }
        tracing::trace!(class = %class.name, properties = class.properties.len(), "registered class");
        self.classes.insert(class.name.clone(), Arc::new(class));
        self.hierarchies.write().clear();
        Ok(())
    }

    /// Builder form of [`Schema::add_class`].
    pub fn with_class(mut self, class: XuClass) -> Result<Self> {
        self.add_class(class)?;
        Ok(self)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn build_hierarchy(&self, name: &str) -> Result<ClassHierarchy> {
        let mut chain = Vec::new();
        let mut current = Some(name.to_string());
        while let Some(class_name) = current {
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                return Err(Error::SchemaLoad(format!("inheritance cycle through {name}")));
            }
            let class = self
                .classes
                .get(&class_name)
                .ok_or_else(|| Error::ClassNotFound(class_name.clone()))?;
            current = class.base_class_name.clone().filter(|b| !b.is_empty());
            chain.push(class.clone());
        }
        Ok(ClassHierarchy::new(chain))
    }
}

impl SchemaProvider for Schema {
    fn resolve_class(&self, name: &str) -> Result<ClassHierarchy> {
        if let Some(hierarchy) = self.hierarchies.read().get(name) {
            return Ok(hierarchy.clone());
        }
        let hierarchy = self.build_hierarchy(name)?;
        self.hierarchies.write().insert(name.to_string(), hierarchy.clone());
        Ok(hierarchy)
    }

    fn resolve_class_by_name(&self, name: &str) -> Result<Arc<XuClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ClassNotFound(name.to_string()))
    }
}

impl<T: SchemaProvider + ?Sized> SchemaProvider for Arc<T> {
    fn resolve_class(&self, name: &str) -> Result<ClassHierarchy> {
        (**self).resolve_class(name)
    }

    fn resolve_class_by_name(&self, name: &str) -> Result<Arc<XuClass>> {
        (**self).resolve_class_by_name(name)
    }

    fn compound_class(&self, property: &XuPropertyDefinition) -> Result<Arc<XuClass>> {
        (**self).compound_class(property)
    }
}
