//! File header and section table.
//!
//! ```text
//! +----------------------+
//! | magic "XUIB"     u32 |
//! | version          u32 |  5 or 8
//! | flags            u32 |  bit 0: count header present
//! | tool version     u16 |
//! | file size        u32 |
//! | section count    u16 |
//! +----------------------+
//! | count header         |  optional (9 x u32 for V5, 12 packed for V8)
//! +----------------------+
//! | section table        |  count x {magic u32, offset u32, length u32}
//! +----------------------+
//! | section payloads ... |
//! +----------------------+
//! ```

use std::collections::HashMap;
use std::ops::Range;

use serde::Serialize;

use super::format::*;
use super::stream::{ByteReader, ByteWriter};
use crate::util::{Error, Result};

/// Fixed-layout file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XurHeader {
    pub magic: u32,
    pub version: u32,
    pub flags: u32,
    pub tool_version: u16,
    pub file_size: u32,
    pub section_count: u16,
}

impl XurHeader {
    /// Header for a new file; size and section count are filled in later.
    pub fn new(generation: Generation, tool_version: u16) -> Self {
        Self {
            magic: XUR_MAGIC,
            version: generation.version(),
            flags: 0,
            tool_version,
            file_size: 0,
            section_count: 0,
        }
    }

    /// Read and validate magic and version.
    pub fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let magic = r.read_u32()?;
        if magic != XUR_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        let version = r.read_u32()?;
        if Generation::from_version(version).is_none() {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(Self {
            magic,
            version,
            flags: r.read_u32()?,
            tool_version: r.read_u16()?,
            file_size: r.read_u32()?,
            section_count: r.read_u16()?,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u32(self.magic)?;
        w.write_u32(self.version)?;
        w.write_u32(self.flags)?;
        w.write_u16(self.tool_version)?;
        w.write_u32(self.file_size)?;
        w.write_u16(self.section_count)
    }

    /// Generation named by the version field.
    pub fn generation(&self) -> Result<Generation> {
        Generation::from_version(self.version).ok_or(Error::UnsupportedVersion(self.version))
    }

    /// Whether a count header follows.
    #[inline]
    pub fn has_count_header(&self) -> bool {
        self.flags & FLAG_COUNT_HEADER != 0
    }

    /// Check the declared size against the real stream length.
    pub fn check_size(&self, actual: usize) -> Result<()> {
        if self.file_size as u64 != actual as u64 {
            return Err(Error::FileSizeMismatch { header: self.file_size as u64, actual: actual as u64 });
        }
        Ok(())
    }
}

/// One section table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionEntry {
    pub magic: u32,
    pub offset: u32,
    pub length: u32,
}

impl SectionEntry {
    /// Known kind of this section.
    pub fn kind(&self) -> Option<SectionKind> {
        SectionKind::from_magic(self.magic)
    }

    /// Printable tag.
    pub fn name(&self) -> String {
        magic_name(self.magic)
    }

    /// Byte range inside the file.
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// Ordered section table with O(1) lookup by magic.
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    entries: Vec<SectionEntry>,
    by_magic: HashMap<u32, usize>,
}

impl SectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; magics must be unique.
    pub fn push(&mut self, entry: SectionEntry) -> Result<()> {
        if self.by_magic.contains_key(&entry.magic) {
            return Err(Error::DuplicateSection(entry.name()));
        }
        self.by_magic.insert(entry.magic, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    /// Read `count` entries and check each lies inside a file of `file_len` bytes.
    pub fn read(r: &mut ByteReader<'_>, count: u16, file_len: usize) -> Result<Self> {
        let mut table = Self::new();
        for _ in 0..count {
            let entry = SectionEntry {
                magic: r.read_u32()?,
                offset: r.read_u32()?,
                length: r.read_u32()?,
            };
            if entry.range().end > file_len {
                return Err(Error::invalid(format!(
                    "section {} at {:#x}+{} extends past end of file ({file_len} bytes)",
                    entry.name(),
                    entry.offset,
                    entry.length
                )));
            }
            tracing::trace!(section = %entry.name(), offset = entry.offset, length = entry.length, "section entry");
            table.push(entry)?;
        }
        Ok(table)
    }

    pub fn write(&self, w: &mut ByteWriter) -> Result<()> {
        for entry in &self.entries {
            w.write_u32(entry.magic)?;
            w.write_u32(entry.offset)?;
            w.write_u32(entry.length)?;
        }
        Ok(())
    }

    /// Entries in table order.
    pub fn entries(&self) -> &[SectionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a magic.
    pub fn find(&self, magic: u32) -> Option<&SectionEntry> {
        self.by_magic.get(&magic).map(|&i| &self.entries[i])
    }

    /// Entry for a known section kind.
    pub fn get(&self, kind: SectionKind) -> Option<&SectionEntry> {
        self.find(kind.magic())
    }

    /// Payload bytes of a known section, empty if absent.
    pub fn payload<'a>(&self, data: &'a [u8], kind: SectionKind) -> &'a [u8] {
        self.get(kind).map(|e| &data[e.range()]).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(magic: u32, version: u32) -> Vec<u8> {
        let mut w = ByteWriter::new();
        let mut h = XurHeader::new(Generation::V8, 1);
        h.magic = magic;
        h.version = version;
        h.file_size = 20;
        h.write(&mut w).unwrap();
        w.into_bytes()
    }

    #[test]
    fn test_header_layout() {
        let bytes = header_bytes(XUR_MAGIC, VERSION_8);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"XUIB");
        let h = XurHeader::read(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(h.generation().unwrap(), Generation::V8);
        assert!(h.check_size(20).is_ok());
        assert!(matches!(h.check_size(21), Err(Error::FileSizeMismatch { header: 20, actual: 21 })));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let bytes = header_bytes(0x1234_5678, VERSION_8);
        assert!(matches!(XurHeader::read(&mut ByteReader::new(&bytes)), Err(Error::InvalidMagic(0x1234_5678))));
        let bytes = header_bytes(XUR_MAGIC, 6);
        assert!(matches!(XurHeader::read(&mut ByteReader::new(&bytes)), Err(Error::UnsupportedVersion(6))));
    }

    #[test]
    fn test_duplicate_section() {
        let mut table = SectionTable::new();
        let entry = SectionEntry { magic: SectionKind::Strn.magic(), offset: 0, length: 0 };
        table.push(entry).unwrap();
        assert!(matches!(table.push(entry), Err(Error::DuplicateSection(ref n)) if n == "STRN"));
    }

    #[test]
    fn test_section_out_of_bounds() {
        let mut w = ByteWriter::new();
        w.write_u32(SectionKind::Data.magic()).unwrap();
        w.write_u32(30).unwrap();
        w.write_u32(10).unwrap();
        let bytes = w.into_bytes();
        assert!(SectionTable::read(&mut ByteReader::new(&bytes), 1, 39).is_err());
        let table = SectionTable::read(&mut ByteReader::new(&bytes), 1, 40).unwrap();
        assert_eq!(table.get(SectionKind::Data).unwrap().range(), 30..40);
        assert!(table.get(SectionKind::Strn).is_none());
    }
}
