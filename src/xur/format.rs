//! XUR format constants and structures.

use std::fmt;

use serde::Serialize;

/// Magic value at the start of every XUR file (`"XUIB"`).
pub const XUR_MAGIC: u32 = 0x5855_4942;

/// Version field of V5 files.
pub const VERSION_5: u32 = 5;

/// Version field of V8 files.
pub const VERSION_8: u32 = 8;

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 20;

/// Size of one section table entry in bytes.
pub const SECTION_ENTRY_SIZE: usize = 12;

/// Header flag: a count header follows the fixed header. In V5 this is the
/// 36-byte extended header block.
pub const FLAG_COUNT_HEADER: u32 = 0x1;

/// Tool version stamped into files written by this crate.
pub const DEFAULT_TOOL_VERSION: u16 = 0x0100;

/// Object flag: property list follows inline.
pub const OBJECT_HAS_PROPERTIES: u8 = 0x01;

/// Object flag: child count and children follow.
pub const OBJECT_HAS_CHILDREN: u8 = 0x02;

/// Object flag: named frames (and timelines) follow.
pub const OBJECT_HAS_ANIMATION: u8 = 0x04;

/// Object flag: index into previously decoded property lists (V8 only).
pub const OBJECT_SHARED_PROPERTIES: u8 = 0x08;

/// Root element prefix identifying XUI12 XML source files.
pub const XUI12_ROOT_MARKER: &str = "<XuiCanvas version=\"000c\"";

/// Build a section magic from its ASCII tag.
pub const fn tag(name: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*name)
}

/// Render a section magic as its ASCII tag, or hex when not printable.
pub fn magic_name(magic: u32) -> String {
    let bytes = magic.to_be_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic()) {
        bytes.iter().map(|&b| b as char).collect()
    } else {
        format!("{magic:#010x}")
    }
}

/// On-disk generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Generation {
    /// Fixed-width big-endian fields, values inline.
    V5,
    /// Packed integers, values in dedup pools.
    #[default]
    V8,
}

impl Generation {
    /// Version field value.
    pub const fn version(self) -> u32 {
        match self {
            Self::V5 => VERSION_5,
            Self::V8 => VERSION_8,
        }
    }

    /// Generation for a version field value.
    pub const fn from_version(version: u32) -> Option<Self> {
        match version {
            VERSION_5 => Some(Self::V5),
            VERSION_8 => Some(Self::V8),
            _ => None,
        }
    }

    /// Number of count header fields.
    pub const fn count_fields(self) -> usize {
        match self {
            Self::V5 => 9,
            Self::V8 => 12,
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V5 => f.write_str("XUR5"),
            Self::V8 => f.write_str("XUR8"),
        }
    }
}

/// Section kinds this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SectionKind {
    Strn,
    Vect,
    Quat,
    Cust,
    Flot,
    Colr,
    Keyp,
    Keyd,
    Name,
    Data,
}

impl SectionKind {
    /// Write order; DATA last since it references every pool.
    pub const WRITE_ORDER: [SectionKind; 10] = [
        Self::Strn,
        Self::Vect,
        Self::Quat,
        Self::Cust,
        Self::Flot,
        Self::Colr,
        Self::Keyp,
        Self::Keyd,
        Self::Name,
        Self::Data,
    ];

    /// Section magic.
    pub const fn magic(self) -> u32 {
        match self {
            Self::Strn => tag(b"STRN"),
            Self::Vect => tag(b"VECT"),
            Self::Quat => tag(b"QUAT"),
            Self::Cust => tag(b"CUST"),
            Self::Flot => tag(b"FLOT"),
            Self::Colr => tag(b"COLR"),
            Self::Keyp => tag(b"KEYP"),
            Self::Keyd => tag(b"KEYD"),
            Self::Name => tag(b"NAME"),
            Self::Data => tag(b"DATA"),
        }
    }

    /// ASCII tag.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strn => "STRN",
            Self::Vect => "VECT",
            Self::Quat => "QUAT",
            Self::Cust => "CUST",
            Self::Flot => "FLOT",
            Self::Colr => "COLR",
            Self::Keyp => "KEYP",
            Self::Keyd => "KEYD",
            Self::Name => "NAME",
            Self::Data => "DATA",
        }
    }

    /// Kind for a magic, `None` for sections this crate keeps opaque.
    pub fn from_magic(magic: u32) -> Option<Self> {
        Self::WRITE_ORDER.into_iter().find(|k| k.magic() == magic)
    }

    /// Whether a generation stores this section.
    pub const fn used_by(self, generation: Generation) -> bool {
        match generation {
            Generation::V5 => matches!(self, Self::Strn | Self::Data),
            Generation::V8 => true,
        }
    }
}
