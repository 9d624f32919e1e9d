//! Error types for the XUR library.

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure class of an [`Error`].
///
/// Batch callers use this to decide whether to skip a file and continue;
/// none of these are transient, so nothing is ever retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong magic/version/size, truncated stream, malformed layout.
    FormatViolation,
    /// A pool index points past the end of its pool.
    IndexOutOfRange,
    /// The loaded schema does not match what the file references.
    SchemaResolution,
    /// Count header disagrees with the decoded structure.
    VerificationMismatch,
    /// Filesystem or host failure.
    Io,
}

/// Main error type for XUR operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Header magic is not `XUIB`
    #[error("Invalid XUR file: bad magic {0:#010x}")]
    InvalidMagic(u32),

    /// Version field is neither 5 nor 8 (or not the one requested)
    #[error("Unsupported XUR version: {0}")]
    UnsupportedVersion(u32),

    /// Header file size disagrees with the stream length
    #[error("File size mismatch: header says {header} bytes, stream has {actual}")]
    FileSizeMismatch { header: u64, actual: u64 },

    /// Stream ended early
    #[error("Unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof { offset: usize, need: usize, have: usize },

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Bool byte other than 0 or 1
    #[error("Invalid bool byte {value:#04x} at offset {offset:#x}")]
    InvalidBool { offset: usize, value: u8 },

    /// Section magic listed twice in the section table
    #[error("Duplicate section {0} in section table")]
    DuplicateSection(String),

    /// A section required to decode the file is absent
    #[error("Missing required section {0}")]
    MissingSection(&'static str),

    /// V8 string table byte length disagrees with its content
    #[error("String table length mismatch: header says {declared} bytes, read {actual}")]
    StringTableMismatch { declared: u32, actual: u32 },

    /// A section decoder stopped before the section's end
    #[error("{section} section has {remaining} trailing bytes")]
    TrailingBytes { section: &'static str, remaining: usize },

    /// A value does not fit the field the generation stores it in
    #[error("Value {value} does not fit in {field}")]
    ValueOutOfRange { field: &'static str, value: u64 },

    /// Pool index beyond pool bounds
    #[error("{pool} index {index} out of bounds (count: {len})")]
    IndexOutOfRange { pool: &'static str, index: usize, len: usize },

    /// Class name not known to the schema
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// Property definition not found in a class
    #[error("Property not found: {class}.{property}")]
    PropertyNotFound { class: String, property: String },

    /// No sub-schema for a compound property name
    #[error("No compound sub-schema for property {0}")]
    CompoundSchemaNotFound(String),

    /// Timeline names an element that no child carries as Id
    #[error("Timeline target {0:?} not found among children")]
    TimelineTargetNotFound(String),

    /// Value shape does not match the property definition
    #[error("Type mismatch for {property}: expected {expected}, got {actual}")]
    TypeMismatch { property: String, expected: String, actual: String },

    /// Same property definition set twice on one object
    #[error("Property {0} set more than once")]
    DuplicateProperty(String),

    /// Schema source could not be parsed
    #[error("Schema load failed: {0}")]
    SchemaLoad(String),

    /// Count header field disagrees with recomputed value
    #[error("Count header mismatch for {field}: stored {stored}, computed {computed}")]
    CountMismatch { field: &'static str, stored: u32, computed: u32 },

    /// Caller requested cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create an index error for the named pool.
    pub fn index(pool: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { pool, index, len }
    }

    /// Failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic(_)
            | Self::UnsupportedVersion(_)
            | Self::FileSizeMismatch { .. }
            | Self::UnexpectedEof { .. }
            | Self::InvalidStructure(_)
            | Self::InvalidBool { .. }
            | Self::DuplicateSection(_)
            | Self::MissingSection(_)
            | Self::StringTableMismatch { .. }
            | Self::TrailingBytes { .. }
            | Self::ValueOutOfRange { .. }
            | Self::Utf8(_) => ErrorKind::FormatViolation,
            Self::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Self::ClassNotFound(_)
            | Self::PropertyNotFound { .. }
            | Self::CompoundSchemaNotFound(_)
            | Self::TimelineTargetNotFound(_)
            | Self::TypeMismatch { .. }
            | Self::DuplicateProperty(_)
            | Self::SchemaLoad(_) => ErrorKind::SchemaResolution,
            Self::CountMismatch { .. } => ErrorKind::VerificationMismatch,
            Self::FileNotFound(_) | Self::Cancelled | Self::MmapFailed(_) | Self::Io(_) => {
                ErrorKind::Io
            }
        }
    }
}

/// Result type alias for XUR operations.
pub type Result<T> = std::result::Result<T, Error>;
