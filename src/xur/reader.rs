//! XUR file reader.
//!
//! Decoding runs as a fixed sequence of stages; any failure aborts the whole
//! file and no partial tree is returned:
//!
//! ```text
//! Unopened -> HeaderRead -> SectionTableRead -> PoolsRead
//!          -> TreeDecoded -> CountsVerified -> Ready
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memmap2::Mmap;
use serde::Serialize;

use super::animation::AnimationPools;
use super::codec::ObjectTreeCodec;
use super::counts::CountHeader;
use super::format::*;
use super::header::{SectionTable, XurHeader};
use super::pools::ValuePools;
use super::stream::ByteReader;
use super::wire::{V5, V8};
use crate::model::XuObject;
use crate::schema::SchemaProvider;
use crate::util::{Error, Result};

// ============================================================================
// Options
// ============================================================================

/// What to do with the stored count header after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VerifyMode {
    /// Skip recomputation.
    Off,
    /// Log mismatches and keep the tree.
    #[default]
    Warn,
    /// Fail on the first mismatch.
    Strict,
}

/// Reader configuration.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub verify: VerifyMode,
    /// Treat a V8 STRN length mismatch as an error instead of a warning.
    pub strict_strings: bool,
    /// Memory-map files instead of reading them into a buffer.
    pub use_mmap: bool,
    /// Polled between stages; set to abort with [`Error::Cancelled`].
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { verify: VerifyMode::Warn, strict_strings: false, use_mmap: true, cancel: None }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify(mut self, mode: VerifyMode) -> Self {
        self.verify = mode;
        self
    }

    pub fn strict_strings(mut self, strict: bool) -> Self {
        self.strict_strings = strict;
        self
    }

    pub fn use_mmap(mut self, use_mmap: bool) -> Self {
        self.use_mmap = use_mmap;
        self
    }

    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

// ============================================================================
// Document
// ============================================================================

/// A section this crate does not interpret, kept for rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueSection {
    pub magic: u32,
    pub data: Vec<u8>,
}

impl OpaqueSection {
    pub fn name(&self) -> String {
        magic_name(self.magic)
    }
}

/// A fully decoded file.
#[derive(Debug, Clone)]
pub struct XurDocument {
    pub header: XurHeader,
    pub generation: Generation,
    /// Stored count header, if the file carries one.
    pub counts: Option<CountHeader>,
    pub sections: SectionTable,
    pub values: ValuePools,
    pub animation: AnimationPools,
    pub root: XuObject,
    pub opaque: Vec<OpaqueSection>,
}

// ============================================================================
// Reader
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadStage {
    Unopened,
    HeaderRead,
    SectionTableRead,
    PoolsRead,
    TreeDecoded,
    CountsVerified,
    Ready,
}

impl fmt::Display for ReadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

struct ReadState<'o> {
    stage: ReadStage,
    cancel: Option<&'o AtomicBool>,
}

impl ReadState<'_> {
    fn advance(&mut self, stage: ReadStage) -> Result<()> {
        if let Some(flag) = self.cancel {
            if flag.load(Ordering::Relaxed) {
                tracing::debug!(stage = %self.stage, "read cancelled");
                return Err(Error::Cancelled);
            }
        }
        tracing::debug!(from = %self.stage, to = %stage, "read stage");
        self.stage = stage;
        Ok(())
    }
}

/// Decodes XUR bytes against a class schema.
pub struct XurReader<'s> {
    schema: &'s dyn SchemaProvider,
    options: ReadOptions,
}

impl<'s> XurReader<'s> {
    pub fn new(schema: &'s dyn SchemaProvider) -> Self {
        Self::with_options(schema, ReadOptions::default())
    }

    pub fn with_options(schema: &'s dyn SchemaProvider, options: ReadOptions) -> Self {
        Self { schema, options }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Read and decode a file.
    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<XurDocument> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata()?.len();
        tracing::debug!(path = %path.display(), size, mmap = self.options.use_mmap, "opening");

        if self.options.use_mmap && size > 0 {
            // Safety: the map is read-only and dropped before this call returns.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            self.read_bytes(&mmap)
        } else {
            let mut data = Vec::with_capacity(size as usize);
            file.read_to_end(&mut data)?;
            self.read_bytes(&data)
        }
    }

    /// Decode a complete file image.
    pub fn read_bytes(&self, data: &[u8]) -> Result<XurDocument> {
        let mut state = ReadState { stage: ReadStage::Unopened, cancel: self.options.cancel.as_deref() };
        let mut r = ByteReader::new(data);

        let header = XurHeader::read(&mut r)?;
        header.check_size(data.len())?;
        let generation = header.generation()?;
        let counts = if header.has_count_header() {
            Some(CountHeader::read(&mut r, generation)?)
        } else {
            None
        };
        state.advance(ReadStage::HeaderRead)?;

        let sections = SectionTable::read(&mut r, header.section_count, data.len())?;
        for entry in sections.entries() {
            if let Some(kind) = entry.kind() {
                if !kind.used_by(generation) {
                    return Err(Error::invalid(format!("{} section in a {generation} file", kind.name())));
                }
            }
        }
        state.advance(ReadStage::SectionTableRead)?;

        let values = ValuePools::read_sections(data, &sections, generation, self.options.strict_strings)?;
        let animation = AnimationPools::read_sections(data, &sections)?;
        state.advance(ReadStage::PoolsRead)?;

        let entry = sections.get(SectionKind::Data).ok_or(Error::MissingSection("DATA"))?;
        let payload = &data[entry.range()];
        let base = entry.offset as usize;
        let root = match generation {
            Generation::V5 => ObjectTreeCodec::<V5>::new(self.schema, &values, &animation).read_tree(payload, base)?,
            Generation::V8 => ObjectTreeCodec::<V8>::new(self.schema, &values, &animation).read_tree(payload, base)?,
        };
        state.advance(ReadStage::TreeDecoded)?;

        if let Some(stored) = &counts {
            self.verify_counts(stored, &root, generation, &animation)?;
        }
        state.advance(ReadStage::CountsVerified)?;

        let opaque = sections
            .entries()
            .iter()
            .filter(|e| e.kind().is_none())
            .map(|e| OpaqueSection { magic: e.magic, data: data[e.range()].to_vec() })
            .collect::<Vec<_>>();
        for section in &opaque {
            tracing::debug!(section = %section.name(), bytes = section.data.len(), "keeping unknown section");
        }
        state.advance(ReadStage::Ready)?;

        tracing::debug!(
            %generation,
            objects = root.object_count(),
            sections = sections.len(),
            "decoded"
        );
        Ok(XurDocument { header, generation, counts, sections, values, animation, root, opaque })
    }

    fn verify_counts(
        &self,
        stored: &CountHeader,
        root: &XuObject,
        generation: Generation,
        animation: &AnimationPools,
    ) -> Result<()> {
        if self.options.verify == VerifyMode::Off {
            return Ok(());
        }
        let computed = CountHeader::compute(root, self.schema, generation, animation)?;
        match self.options.verify {
            VerifyMode::Strict => stored.verify(&computed, generation),
            _ => {
                for (field, stored, computed) in stored.mismatches(&computed, generation) {
                    tracing::warn!(field = field.name(), stored, computed, "count header mismatch");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use crate::xur::stream::ByteWriter;

    /// Minimal V8 image: STRN ["Root", "Child"], DATA with one child.
    fn minimal_v8(counts: Option<[u8; 12]>) -> Vec<u8> {
        let strn: &[u8] = &[0, 0, 0, 11, 0, 0, 0, 2, b'R', b'o', b'o', b't', 0, b'C', b'h', b'i', b'l', b'd', 0];
        let data: &[u8] = &[0x01, 0x02, 0x01, 0x02, 0x00];
        let prefix = HEADER_SIZE + counts.map_or(0, |c| c.len()) + 2 * SECTION_ENTRY_SIZE;
        let total = prefix + strn.len() + data.len();

        let mut w = ByteWriter::new();
        let mut header = XurHeader::new(Generation::V8, DEFAULT_TOOL_VERSION);
        header.flags = if counts.is_some() { FLAG_COUNT_HEADER } else { 0 };
        header.file_size = total as u32;
        header.section_count = 2;
        header.write(&mut w).unwrap();
        if let Some(c) = counts {
            w.write_bytes(&c);
        }
        for (kind, offset, len) in [
            (SectionKind::Strn, prefix, strn.len()),
            (SectionKind::Data, prefix + strn.len(), data.len()),
        ] {
            w.write_u32(kind.magic()).unwrap();
            w.write_u32(offset as u32).unwrap();
            w.write_u32(len as u32).unwrap();
        }
        w.write_bytes(strn);
        w.write_bytes(data);
        w.into_bytes()
    }

    #[test]
    fn test_minimal_v8() {
        let schema = Schema::new();
        let doc = XurReader::new(&schema).read_bytes(&minimal_v8(None)).unwrap();
        assert_eq!(doc.generation, Generation::V8);
        assert_eq!(doc.root.class_name, "Root");
        assert_eq!(doc.root.children.len(), 1);
        assert_eq!(doc.root.children[0].class_name, "Child");
        assert!(doc.counts.is_none());
    }

    #[test]
    fn test_count_header_modes() {
        let schema = Schema::new();
        let good = [2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let strict = ReadOptions::new().verify(VerifyMode::Strict);
        let doc = XurReader::with_options(&schema, strict.clone()).read_bytes(&minimal_v8(Some(good))).unwrap();
        let counts = doc.counts.unwrap();
        assert_eq!(counts.objects, 2);
        assert_eq!(counts.objects_with_children, 1);

        let bad = [3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let err = XurReader::with_options(&schema, strict).read_bytes(&minimal_v8(Some(bad))).unwrap_err();
        assert!(matches!(err, Error::CountMismatch { field: "objects", stored: 3, computed: 2 }));
        // Lenient mode keeps the tree.
        assert!(XurReader::new(&schema).read_bytes(&minimal_v8(Some(bad))).is_ok());
    }

    #[test]
    fn test_v5_extended_header() {
        // STRN ["Root", "Child"] as UTF-16, DATA with one child.
        let strn: &[u8] = &[
            0, 4, 0, b'R', 0, b'o', 0, b'o', 0, b't',
            0, 5, 0, b'C', 0, b'h', 0, b'i', 0, b'l', 0, b'd',
        ];
        let data: &[u8] = &[0, 1, 0x02, 0, 0, 0, 1, 0, 2, 0x00];
        let mut block = ByteWriter::new();
        for v in [2u32, 0, 0, 0, 0, 0, 0, 0, 1] {
            block.write_u32(v).unwrap();
        }
        let block = block.into_bytes();
        assert_eq!(block.len(), 36);

        let prefix = HEADER_SIZE + block.len() + 2 * SECTION_ENTRY_SIZE;
        let mut w = ByteWriter::new();
        let mut header = XurHeader::new(Generation::V5, DEFAULT_TOOL_VERSION);
        header.flags = FLAG_COUNT_HEADER;
        header.file_size = (prefix + strn.len() + data.len()) as u32;
        header.section_count = 2;
        header.write(&mut w).unwrap();
        w.write_bytes(&block);
        for (kind, offset, len) in [
            (SectionKind::Strn, prefix, strn.len()),
            (SectionKind::Data, prefix + strn.len(), data.len()),
        ] {
            w.write_u32(kind.magic()).unwrap();
            w.write_u32(offset as u32).unwrap();
            w.write_u32(len as u32).unwrap();
        }
        w.write_bytes(strn);
        w.write_bytes(data);

        let schema = Schema::new();
        let reader = XurReader::with_options(&schema, ReadOptions::new().verify(VerifyMode::Strict));
        let doc = reader.read_bytes(w.as_slice()).unwrap();
        assert_eq!(doc.root.children[0].class_name, "Child");
        assert_eq!(doc.sections.len(), 2);

        // The block survives as decoded counts and re-encodes byte for byte.
        let counts = doc.counts.unwrap();
        let mut again = ByteWriter::new();
        counts.write(&mut again, Generation::V5).unwrap();
        assert_eq!(again.as_slice(), block.as_slice());
    }

    #[test]
    fn test_missing_data_section() {
        let mut w = ByteWriter::new();
        let mut header = XurHeader::new(Generation::V5, DEFAULT_TOOL_VERSION);
        header.file_size = HEADER_SIZE as u32;
        header.write(&mut w).unwrap();
        let schema = Schema::new();
        let err = XurReader::new(&schema).read_bytes(w.as_slice()).unwrap_err();
        assert!(matches!(err, Error::MissingSection("DATA")));
    }

    #[test]
    fn test_size_mismatch() {
        let mut bytes = minimal_v8(None);
        bytes.push(0);
        let schema = Schema::new();
        assert!(matches!(
            XurReader::new(&schema).read_bytes(&bytes),
            Err(Error::FileSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_cancelled() {
        let schema = Schema::new();
        let flag = Arc::new(AtomicBool::new(true));
        let reader = XurReader::with_options(&schema, ReadOptions::new().cancel(flag));
        assert!(matches!(reader.read_bytes(&minimal_v8(None)), Err(Error::Cancelled)));
    }

    #[test]
    fn test_missing_file() {
        let schema = Schema::new();
        let err = XurReader::new(&schema).read_file("/nonexistent/dir/file.xur").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }
}
