//! Cheap format detection without decoding.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;

use super::format::*;
use super::stream::ByteReader;
use crate::util::{Error, Result};

/// Bytes inspected when sniffing a file.
const SNIFF_LEN: usize = 512;

/// What a byte stream looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sniffed {
    /// Binary XUR of a supported generation.
    Xur(Generation),
    /// XUR magic with a version this crate does not decode.
    XurUnsupported(u32),
    /// XUI 12 source text.
    Xui12,
    Unknown,
}

impl Sniffed {
    pub fn generation(self) -> Option<Generation> {
        match self {
            Self::Xur(generation) => Some(generation),
            _ => None,
        }
    }
}

/// Classify the start of a file.
pub fn sniff_bytes(data: &[u8]) -> Sniffed {
    let mut r = ByteReader::new(data);
    if let (Ok(XUR_MAGIC), Ok(version)) = (r.read_u32(), r.read_u32()) {
        return match Generation::from_version(version) {
            Some(generation) => Sniffed::Xur(generation),
            None => Sniffed::XurUnsupported(version),
        };
    }
    match std::str::from_utf8(data) {
        Ok(text) if is_xui12_text(text) => Sniffed::Xui12,
        // A truncated read may split a multi-byte character.
        Err(e) if is_xui12_text(&String::from_utf8_lossy(&data[..e.valid_up_to()])) => Sniffed::Xui12,
        _ => Sniffed::Unknown,
    }
}

/// Sniff the first bytes of a file.
pub fn sniff_file(path: impl AsRef<Path>) -> Result<Sniffed> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    let sniffed = sniff_bytes(&head);
    tracing::trace!(path = %path.display(), ?sniffed, "sniffed");
    Ok(sniffed)
}

/// Whether `text` is XUI 12 source (root `<XuiCanvas version="000c"`).
pub fn is_xui12_text(text: &str) -> bool {
    text.trim_start_matches('\u{feff}').contains(XUI12_ROOT_MARKER)
}

/// Whether `data` is XUR of the newest generation this crate writes.
pub fn is_current_generation(data: &[u8]) -> bool {
    sniff_bytes(data) == Sniffed::Xur(Generation::V8)
}
