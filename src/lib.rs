//! # XUR
//!
//! Rust implementation of the XUR compiled UI resource format, generations
//! 5 and 8.
//!
//! ## Modules
//!
//! - [`util`] - Errors and the failure taxonomy
//! - [`model`] - In-memory object tree (objects, properties, timelines)
//! - [`schema`] - Class definitions the property codec is driven by
//! - [`xur`] - Binary format: header, pools, object tree, count header
//!
//! ## Example
//!
//! ```ignore
//! use xur::prelude::*;
//!
//! let schema = Schema::builtin()?;
//! let doc = XurReader::new(&schema).read_file("menu.xur")?;
//! for child in &doc.root.children {
//!     println!("{}", child.class_name);
//! }
//! let v5 = xur::xur::encode(&doc.root, &schema, Generation::V5)?;
//! ```

pub mod model;
pub mod schema;
pub mod util;
pub mod xur;

// Re-export commonly used types
pub use util::{Error, ErrorKind, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::model::{
        Interpolation, NamedFrameCommand, XuAnimatedProperty, XuColour, XuKeyframe, XuNamedFrame, XuObject,
        XuProperty, XuPropertyValue, XuTimeline, XuValue, XuVector,
    };
    pub use crate::schema::{ClassHierarchy, PropertyKind, Schema, SchemaProvider, XuClass, XuPropertyDefinition};
    pub use crate::util::{Error, ErrorKind, Result};
    pub use crate::xur::{
        Generation, ReadOptions, VerifyMode, WriteOptions, XurDocument, XurReader, XurWriter,
    };
}
