//! XUR file writer.
//!
//! Encoding is two-pass: every section payload (and the count header) is
//! built in memory first, then offsets are laid out and the file image is
//! assembled in one buffer.

use std::path::Path;

use serde::Serialize;

use super::animation::AnimationPools;
use super::codec::ObjectTreeCodec;
use super::counts::CountHeader;
use super::format::*;
use super::header::{SectionEntry, SectionTable, XurHeader};
use super::pools::ValuePools;
use super::reader::{OpaqueSection, ReadOptions, VerifyMode, XurDocument, XurReader};
use super::stream::{to_u32, ByteWriter};
use super::wire::{V5, V8};
use crate::model::XuObject;
use crate::schema::SchemaProvider;
use crate::util::{Error, Result};

/// Writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WriteOptions {
    pub generation: Generation,
    pub tool_version: u16,
    pub write_count_header: bool,
    /// Re-decode the result with strict count verification.
    pub verify: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            generation: Generation::V8,
            tool_version: DEFAULT_TOOL_VERSION,
            write_count_header: true,
            verify: false,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }

    pub fn tool_version(mut self, tool_version: u16) -> Self {
        self.tool_version = tool_version;
        self
    }

    pub fn write_count_header(mut self, enabled: bool) -> Self {
        self.write_count_header = enabled;
        self
    }

    pub fn verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }
}

/// Encodes object trees against a class schema.
pub struct XurWriter<'s> {
    schema: &'s dyn SchemaProvider,
    options: WriteOptions,
}

impl<'s> XurWriter<'s> {
    pub fn new(schema: &'s dyn SchemaProvider) -> Self {
        Self::with_options(schema, WriteOptions::default())
    }

    pub fn with_options(schema: &'s dyn SchemaProvider, options: WriteOptions) -> Self {
        Self { schema, options }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    /// Encode a tree into a complete file image.
    pub fn write(&self, root: &XuObject) -> Result<Vec<u8>> {
        self.encode(root, 0, &[])
    }

    /// Encode a decoded document, keeping its extra header flags and
    /// unknown sections. The generation comes from the writer options.
    pub fn write_document(&self, doc: &XurDocument) -> Result<Vec<u8>> {
        self.encode(&doc.root, doc.header.flags & !FLAG_COUNT_HEADER, &doc.opaque)
    }

    /// Encode a tree and write it to `path`.
    pub fn write_file(&self, path: impl AsRef<Path>, root: &XuObject) -> Result<()> {
        let bytes = self.write(root)?;
        std::fs::write(path.as_ref(), &bytes)?;
        tracing::debug!(path = %path.as_ref().display(), bytes = bytes.len(), "written");
        Ok(())
    }

    fn encode(&self, root: &XuObject, extra_flags: u32, opaque: &[OpaqueSection]) -> Result<Vec<u8>> {
        let generation = self.options.generation;

        // Pass 1: payloads.
        let values = ValuePools::build(root, generation)?;
        let animation = match generation {
            Generation::V5 => AnimationPools::new(),
            Generation::V8 => AnimationPools::build(root, &values)?,
        };
        let data = match generation {
            Generation::V5 => ObjectTreeCodec::<V5>::new(self.schema, &values, &animation).write_tree(root)?,
            Generation::V8 => ObjectTreeCodec::<V8>::new(self.schema, &values, &animation).write_tree(root)?,
        };

        let mut payloads: Vec<(u32, Vec<u8>)> = values
            .write_sections(generation)?
            .into_iter()
            .chain(animation.write_sections()?)
            .map(|(kind, bytes)| (kind.magic(), bytes))
            .collect();
        for section in opaque {
            if SectionKind::from_magic(section.magic).is_some() {
                return Err(Error::invalid(format!("opaque section {} shadows a known section", section.name())));
            }
            payloads.push((section.magic, section.data.clone()));
        }
        payloads.push((SectionKind::Data.magic(), data));

        let mut counts = ByteWriter::new();
        if self.options.write_count_header {
            CountHeader::compute(root, self.schema, generation, &animation)?.write(&mut counts, generation)?;
        }

        // Pass 2: layout.
        let section_count = u16::try_from(payloads.len())
            .map_err(|_| Error::ValueOutOfRange { field: "section count", value: payloads.len() as u64 })?;
        let mut offset = HEADER_SIZE + counts.position() + payloads.len() * SECTION_ENTRY_SIZE;
        let mut table = SectionTable::new();
        for (magic, bytes) in &payloads {
            table.push(SectionEntry {
                magic: *magic,
                offset: to_u32("section offset", offset)?,
                length: to_u32("section length", bytes.len())?,
            })?;
            offset += bytes.len();
        }

        let mut header = XurHeader::new(generation, self.options.tool_version);
        header.flags = extra_flags;
        if self.options.write_count_header {
            header.flags |= FLAG_COUNT_HEADER;
        }
        header.file_size = to_u32("file size", offset)?;
        header.section_count = section_count;

        let mut w = ByteWriter::with_capacity(offset);
        header.write(&mut w)?;
        w.write_bytes(counts.as_slice());
        table.write(&mut w)?;
        for (_, bytes) in &payloads {
            w.write_bytes(bytes);
        }
        let bytes = w.into_bytes();
        tracing::debug!(%generation, sections = table.len(), bytes = bytes.len(), "encoded");

        if self.options.verify {
            let options = ReadOptions::new().verify(VerifyMode::Strict).strict_strings(true);
            XurReader::with_options(self.schema, options).read_bytes(&bytes)?;
            tracing::debug!("re-decode verified");
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn minimal() -> XuObject {
        XuObject::new("Root").with_child(XuObject::new("Child"))
    }

    #[test]
    fn test_minimal_v8_layout() {
        let schema = Schema::new();
        let options = WriteOptions::new().write_count_header(false);
        let bytes = XurWriter::with_options(&schema, options).write(&minimal()).unwrap();
        // header + 2 entries + STRN (8 + 11) + DATA (5)
        assert_eq!(bytes.len(), 20 + 24 + 19 + 5);
        assert_eq!(&bytes[0..4], b"XUIB");
        assert_eq!(&bytes[20..24], b"STRN");
        assert_eq!(&bytes[32..36], b"DATA");
        assert_eq!(&bytes[bytes.len() - 5..], [0x01, 0x02, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn test_count_header_written_and_verified() {
        let schema = Schema::new();
        for generation in [Generation::V5, Generation::V8] {
            let options = WriteOptions::new().generation(generation).verify(true);
            let bytes = XurWriter::with_options(&schema, options).write(&minimal()).unwrap();
            let doc = XurReader::new(&schema).read_bytes(&bytes).unwrap();
            assert_eq!(doc.generation, generation);
            assert_eq!(doc.counts.unwrap().objects, 2);
            assert_eq!(doc.root, minimal());
        }
    }

    #[test]
    fn test_opaque_sections_kept() {
        let schema = Schema::new();
        let bytes = XurWriter::new(&schema).write(&minimal()).unwrap();
        let mut doc = XurReader::new(&schema).read_bytes(&bytes).unwrap();
        doc.opaque.push(OpaqueSection { magic: tag(b"XTRA"), data: vec![1, 2, 3] });
        doc.header.flags |= 0x100;

        let bytes = XurWriter::new(&schema).write_document(&doc).unwrap();
        let back = XurReader::new(&schema).read_bytes(&bytes).unwrap();
        assert_eq!(back.opaque, doc.opaque);
        assert_eq!(back.header.flags, 0x100 | FLAG_COUNT_HEADER);
        // Unknown sections go right before DATA.
        let names: Vec<String> = back.sections.entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, ["STRN", "XTRA", "DATA"]);
    }

    #[test]
    fn test_timeline_without_children_rejected() {
        let schema = Schema::new();
        let mut root = XuObject::new("Root");
        root.timelines.push(crate::model::XuTimeline::new("ghost"));
        let err = XurWriter::new(&schema).write(&root).unwrap_err();
        assert!(matches!(err, Error::TimelineTargetNotFound(ref id) if id == "ghost"));
    }
}
