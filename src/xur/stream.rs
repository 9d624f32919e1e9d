//! Byte streams for XUR sections.
//!
//! All fixed-width fields are big-endian. V8 additionally uses a packed
//! unsigned integer:
//!
//! ```text
//! 0x00..=0xEF            1 byte   value
//! 0xF0..=0xFE, lo        2 bytes  ((b0 & 0x0F) << 8) | lo      (< 0xF00)
//! 0xFF, u32 BE           5 bytes  any u32
//! ```

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::util::{Error, Result};

/// Largest value stored in a single packed byte.
const PACKED_1_MAX: u32 = 0xEF;

/// Largest value stored in two packed bytes.
const PACKED_2_MAX: u32 = 0xEFF;

/// Prefix of the 5-byte packed form.
const PACKED_WIDE: u8 = 0xFF;

/// Read cursor over a section's bytes.
///
/// `base` is the absolute file offset of `data[0]`, used in error messages.
#[derive(Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> ByteReader<'a> {
    /// Reader over a whole buffer.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Reader over a section located at `base` in the file.
    pub fn at(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Current position relative to the start of the buffer.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Current absolute file offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Remaining bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether the reader is exhausted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::UnexpectedEof {
                offset: self.offset(),
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }

    /// Read `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(BigEndian::read_f32(self.read_bytes(4)?))
    }

    /// Read a strict bool byte (0 or 1).
    pub fn read_bool(&mut self) -> Result<bool> {
        let offset = self.offset();
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(Error::InvalidBool { offset, value }),
        }
    }

    /// Read a packed unsigned integer.
    pub fn read_packed(&mut self) -> Result<u32> {
        let first = self.read_u8()?;
        match first {
            0x00..=0xEF => Ok(first as u32),
            PACKED_WIDE => self.read_u32(),
            _ => {
                let lo = self.read_u8()?;
                Ok(((first as u32 & 0x0F) << 8) | lo as u32)
            }
        }
    }
}

/// Growable big-endian output buffer.
#[derive(Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    /// Bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.buf.write_u8(v)?;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.buf.write_u16::<BigEndian>(v)?;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.buf.write_u32::<BigEndian>(v)?;
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.buf.write_f32::<BigEndian>(v)?;
        Ok(())
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Write a packed unsigned integer in its shortest form.
    pub fn write_packed(&mut self, v: u32) -> Result<()> {
        if v <= PACKED_1_MAX {
            self.write_u8(v as u8)
        } else if v <= PACKED_2_MAX {
            self.write_u8(0xF0 | (v >> 8) as u8)?;
            self.write_u8(v as u8)
        } else {
            self.write_u8(PACKED_WIDE)?;
            self.write_u32(v)
        }
    }

    /// Overwrite a u32 at `pos` (back-patching offsets and sizes).
    pub fn patch_u32(&mut self, pos: usize, v: u32) -> Result<()> {
        let slot = self
            .buf
            .get_mut(pos..pos + 4)
            .ok_or_else(|| Error::invalid(format!("patch position {pos} past end of buffer")))?;
        BigEndian::write_u32(slot, v);
        Ok(())
    }
}

/// Encoded size of a packed integer.
pub const fn packed_len(v: u32) -> usize {
    if v <= PACKED_1_MAX {
        1
    } else if v <= PACKED_2_MAX {
        2
    } else {
        5
    }
}

/// Convert a length or index to the u32 the wire stores.
pub fn to_u32(field: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::ValueOutOfRange { field, value: value as u64 })
}
