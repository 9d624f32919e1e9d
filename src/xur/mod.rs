//! XUR binary format.
//!
//! A XUR file is a fixed header, an optional count header, a section table
//! and section payloads:
//!
//! - `STRN` - string pool (UTF-16 in V5, NUL-terminated UTF-8 in V8)
//! - `VECT` / `QUAT` / `COLR` / `FLOT` / `CUST` - value pools (V8)
//! - `KEYP` / `KEYD` / `NAME` - keyframe values, descriptors, named frames (V8)
//! - `DATA` - the object tree
//!
//! [`XurReader`] and [`XurWriter`] drive the whole file; the lower modules
//! are public for tools that inspect individual sections.

pub mod animation;
pub mod codec;
pub mod counts;
pub mod format;
pub mod header;
pub mod pools;
pub mod reader;
pub mod sniff;
pub mod stream;
pub mod wire;
pub mod writer;

pub use counts::{CountField, CountHeader};
pub use format::{Generation, SectionKind};
pub use header::{SectionEntry, SectionTable, XurHeader};
pub use reader::{OpaqueSection, ReadOptions, VerifyMode, XurDocument, XurReader};
pub use sniff::{is_current_generation, is_xui12_text, sniff_bytes, sniff_file, Sniffed};
pub use writer::{WriteOptions, XurWriter};

use crate::model::XuObject;
use crate::schema::SchemaProvider;
use crate::util::Result;

/// Decode a file image with default options.
pub fn decode(data: &[u8], schema: &dyn SchemaProvider) -> Result<XurDocument> {
    XurReader::new(schema).read_bytes(data)
}

/// Encode a tree as `generation` with default options.
pub fn encode(root: &XuObject, schema: &dyn SchemaProvider, generation: Generation) -> Result<Vec<u8>> {
    XurWriter::with_options(schema, WriteOptions::new().generation(generation)).write(root)
}
