//! Dedup pools: STRN, VECT, QUAT, COLR, FLOT and CUST.
//!
//! Every pool is a flat list of unique values referenced elsewhere by index.
//! Uniqueness is by value (floats compare by bit pattern) and the first
//! occurrence of a value owns its index.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use super::format::{Generation, SectionKind};
use super::header::SectionTable;
use super::stream::{to_u32, ByteReader, ByteWriter};
use crate::model::{
    XuBezierPoint, XuColour, XuFigure, XuObject, XuPoint, XuProperty, XuPropertyValue, XuQuaternion, XuValue,
    XuVector,
};
use crate::util::{Error, Result};

/// Size of a CUST record header: point count plus bounding point.
const FIGURE_HEADER_SIZE: usize = 12;

/// Size of one bezier point in a CUST record.
const BEZIER_POINT_SIZE: usize = 24;

/// Value-equality key of a pooled type.
pub trait PoolKey {
    type Key: Hash + Eq + Clone + Debug;

    /// Section tag used in error messages.
    const POOL: &'static str;

    fn pool_key(&self) -> Self::Key;
}

/// Fixed-layout record stored in its own section.
pub trait PoolRecord: PoolKey + Sized {
    const SECTION: SectionKind;

    fn read_record(r: &mut ByteReader<'_>) -> Result<Self>;
    fn write_record(&self, w: &mut ByteWriter) -> Result<()>;
}

impl PoolKey for f32 {
    type Key = u32;
    const POOL: &'static str = "FLOT";

    fn pool_key(&self) -> u32 {
        self.to_bits()
    }
}

impl PoolRecord for f32 {
    const SECTION: SectionKind = SectionKind::Flot;

    fn read_record(r: &mut ByteReader<'_>) -> Result<Self> {
        r.read_f32()
    }

    fn write_record(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_f32(*self)
    }
}

impl PoolKey for XuVector {
    type Key = [u32; 3];
    const POOL: &'static str = "VECT";

    fn pool_key(&self) -> [u32; 3] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits()]
    }
}

impl PoolRecord for XuVector {
    const SECTION: SectionKind = SectionKind::Vect;

    fn read_record(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self::new(r.read_f32()?, r.read_f32()?, r.read_f32()?))
    }

    fn write_record(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_f32(self.x)?;
        w.write_f32(self.y)?;
        w.write_f32(self.z)
    }
}

impl PoolKey for XuQuaternion {
    type Key = [u32; 4];
    const POOL: &'static str = "QUAT";

    fn pool_key(&self) -> [u32; 4] {
        [self.x.to_bits(), self.y.to_bits(), self.z.to_bits(), self.w.to_bits()]
    }
}

impl PoolRecord for XuQuaternion {
    const SECTION: SectionKind = SectionKind::Quat;

    fn read_record(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self::new(r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?))
    }

    fn write_record(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_f32(self.x)?;
        w.write_f32(self.y)?;
        w.write_f32(self.z)?;
        w.write_f32(self.w)
    }
}

impl PoolKey for XuColour {
    type Key = u32;
    const POOL: &'static str = "COLR";

    fn pool_key(&self) -> u32 {
        self.to_argb()
    }
}

impl PoolRecord for XuColour {
    const SECTION: SectionKind = SectionKind::Colr;

    fn read_record(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self::from_argb(r.read_u32()?))
    }

    fn write_record(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_u32(self.to_argb())
    }
}

impl PoolKey for String {
    type Key = String;
    const POOL: &'static str = "STRN";

    fn pool_key(&self) -> String {
        self.clone()
    }
}

impl PoolKey for XuFigure {
    type Key = Vec<u32>;
    const POOL: &'static str = "CUST";

    fn pool_key(&self) -> Vec<u32> {
        let mut key = Vec::with_capacity(2 + self.points.len() * 6);
        key.extend([self.bounds.x.to_bits(), self.bounds.y.to_bits()]);
        for p in &self.points {
            for q in [p.point, p.control1, p.control2] {
                key.extend([q.x.to_bits(), q.y.to_bits()]);
            }
        }
        key
    }
}

/// Ordered list of unique values with index lookup.
#[derive(Debug, Clone)]
pub struct Pool<T: PoolKey> {
    items: Vec<T>,
    lookup: HashMap<T::Key, u32>,
}

impl<T: PoolKey> Default for Pool<T> {
    fn default() -> Self {
        Self { items: Vec::new(), lookup: HashMap::new() }
    }
}

impl<T: PoolKey> Pool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value unless an equal one is present; returns its index.
    pub fn insert(&mut self, value: T) -> Result<u32> {
        let key = value.pool_key();
        if let Some(&index) = self.lookup.get(&key) {
            return Ok(index);
        }
        let index = to_u32(T::POOL, self.items.len())?;
        self.lookup.insert(key, index);
        self.items.push(value);
        Ok(index)
    }

    /// Append a value read from a file. Duplicates keep their own slot but
    /// lookups resolve to the first one.
    fn push_raw(&mut self, value: T) -> Result<()> {
        let index = to_u32(T::POOL, self.items.len())?;
        self.lookup.entry(value.pool_key()).or_insert(index);
        self.items.push(value);
        Ok(())
    }

    /// Index of a value, if pooled.
    pub fn index_of(&self, value: &T) -> Option<u32> {
        self.lookup.get(&value.pool_key()).copied()
    }

    /// Index of a value that the build pass must have pooled.
    pub fn require(&self, value: &T) -> Result<u32> {
        self.index_of(value)
            .ok_or_else(|| Error::invalid(format!("value missing from {} pool", T::POOL)))
    }

    /// Value at `index`.
    pub fn get(&self, index: u32) -> Result<&T> {
        self.items
            .get(index as usize)
            .ok_or_else(|| Error::index(T::POOL, index as usize, self.items.len()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T: PoolRecord> Pool<T> {
    /// Read records until the section is exhausted.
    pub fn read_section(bytes: &[u8], base: usize) -> Result<Self> {
        let mut pool = Self::new();
        let mut r = ByteReader::at(bytes, base);
        while !r.is_empty() {
            pool.push_raw(T::read_record(&mut r)?)?;
        }
        tracing::debug!(section = T::POOL, entries = pool.len(), "pool read");
        Ok(pool)
    }

    pub fn write_section(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        for item in &self.items {
            item.write_record(&mut w)?;
        }
        Ok(w.into_bytes())
    }
}

// ============================================================================
// STRN
// ============================================================================

impl Pool<String> {
    /// Add a string; empty strings are never pooled.
    pub fn intern(&mut self, s: &str) -> Result<()> {
        if !s.is_empty() {
            self.insert(s.to_string())?;
        }
        Ok(())
    }

    /// String reference: `0` for empty, otherwise pool index + 1.
    pub fn reference(&self, s: &str) -> Result<u32> {
        if s.is_empty() {
            return Ok(0);
        }
        self.lookup
            .get(s)
            .map(|&i| i + 1)
            .ok_or_else(|| Error::invalid(format!("string {s:?} missing from STRN pool")))
    }

    /// Resolve a string reference.
    pub fn resolve(&self, reference: u32) -> Result<&str> {
        match reference {
            0 => Ok(""),
            n => self.get(n - 1).map(String::as_str),
        }
    }

    /// V5 layout: repeated `{len u16, UTF-16 BE units}`.
    pub fn read_v5(bytes: &[u8], base: usize) -> Result<Self> {
        let mut pool = Self::new();
        let mut r = ByteReader::at(bytes, base);
        while !r.is_empty() {
            let len = r.read_u16()? as usize;
            let raw = r.read_bytes(len * 2)?;
            let units: Vec<u16> = raw.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
            let s = String::from_utf16(&units)
                .map_err(|_| Error::invalid(format!("invalid UTF-16 string at STRN entry {}", pool.len())))?;
            pool.push_raw(s)?;
        }
        tracing::debug!(section = "STRN", entries = pool.len(), "string table read (V5)");
        Ok(pool)
    }

    pub fn write_v5(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        for s in &self.items {
            let units: Vec<u16> = s.encode_utf16().collect();
            let len = u16::try_from(units.len())
                .map_err(|_| Error::ValueOutOfRange { field: "STRN string length", value: units.len() as u64 })?;
            w.write_u16(len)?;
            for unit in units {
                w.write_u16(unit)?;
            }
        }
        Ok(w.into_bytes())
    }

    /// V8 layout: `{byte_len u32, count u32}` then NUL-terminated UTF-8.
    ///
    /// With `strict`, a `byte_len` that disagrees with the bytes actually
    /// consumed is an error; otherwise it is logged.
    pub fn read_v8(bytes: &[u8], base: usize, strict: bool) -> Result<Self> {
        let mut pool = Self::new();
        let mut r = ByteReader::at(bytes, base);
        if r.is_empty() {
            return Ok(pool);
        }
        let declared = r.read_u32()?;
        let count = r.read_u32()?;
        let start = r.position();
        for _ in 0..count {
            let rest = &bytes[r.position()..];
            let end = rest.iter().position(|&b| b == 0).ok_or(Error::UnexpectedEof {
                offset: r.offset(),
                need: rest.len() + 1,
                have: rest.len(),
            })?;
            let raw = r.read_bytes(end + 1)?;
            pool.push_raw(String::from_utf8(raw[..end].to_vec())?)?;
        }
        let actual = to_u32("STRN byte length", r.position() - start)?;
        if actual != declared {
            if strict {
                return Err(Error::StringTableMismatch { declared, actual });
            }
            tracing::warn!(declared, actual, "STRN byte length mismatch");
        }
        if !r.is_empty() {
            return Err(Error::TrailingBytes { section: "STRN", remaining: r.remaining() });
        }
        tracing::debug!(section = "STRN", entries = pool.len(), "string table read (V8)");
        Ok(pool)
    }

    pub fn write_v8(&self) -> Result<Vec<u8>> {
        let mut body = ByteWriter::new();
        for s in &self.items {
            if s.as_bytes().contains(&0) {
                return Err(Error::invalid(format!("string {s:?} contains NUL")));
            }
            body.write_bytes(s.as_bytes());
            body.write_u8(0)?;
        }
        let mut w = ByteWriter::with_capacity(body.position() + 8);
        w.write_u32(to_u32("STRN byte length", body.position())?)?;
        w.write_u32(to_u32("STRN count", self.items.len())?)?;
        w.write_bytes(body.as_slice());
        Ok(w.into_bytes())
    }
}

// ============================================================================
// CUST
// ============================================================================

/// Encoded size of a figure record.
pub fn figure_record_len(figure: &XuFigure) -> usize {
    FIGURE_HEADER_SIZE + figure.points.len() * BEZIER_POINT_SIZE
}

fn read_point(r: &mut ByteReader<'_>) -> Result<XuPoint> {
    Ok(XuPoint::new(r.read_f32()?, r.read_f32()?))
}

fn write_point(w: &mut ByteWriter, p: XuPoint) -> Result<()> {
    w.write_f32(p.x)?;
    w.write_f32(p.y)
}

/// Read one figure record (CUST entry or V5 inline value).
pub fn read_figure(r: &mut ByteReader<'_>) -> Result<XuFigure> {
    let count = r.read_u32()? as usize;
    let bounds = read_point(r)?;
    let need = count.saturating_mul(BEZIER_POINT_SIZE);
    if need > r.remaining() {
        return Err(Error::UnexpectedEof { offset: r.offset(), need, have: r.remaining() });
    }
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        points.push(XuBezierPoint {
            point: read_point(r)?,
            control1: read_point(r)?,
            control2: read_point(r)?,
        });
    }
    Ok(XuFigure { bounds, points })
}

/// Write one figure record.
pub fn write_figure(w: &mut ByteWriter, figure: &XuFigure) -> Result<()> {
    w.write_u32(to_u32("figure point count", figure.points.len())?)?;
    write_point(w, figure.bounds)?;
    for p in &figure.points {
        write_point(w, p.point)?;
        write_point(w, p.control1)?;
        write_point(w, p.control2)?;
    }
    Ok(())
}

/// Figure pool addressed by record byte offset.
#[derive(Debug, Clone, Default)]
pub struct FigurePool {
    figures: Pool<XuFigure>,
    offsets: Vec<u32>,
    by_offset: HashMap<u32, usize>,
    byte_len: usize,
}

impl FigurePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, figure: XuFigure, dedup: bool) -> Result<u32> {
        let offset = to_u32("CUST offset", self.byte_len)?;
        let record_len = figure_record_len(&figure);
        if dedup {
            let before = self.figures.len();
            let index = self.figures.insert(figure)?;
            if (index as usize) < before {
                return Ok(self.offsets[index as usize]);
            }
        } else {
            self.figures.push_raw(figure)?;
        }
        self.by_offset.insert(offset, self.offsets.len());
        self.offsets.push(offset);
        self.byte_len += record_len;
        Ok(offset)
    }

    /// Add a figure unless an equal one is present; returns its record offset.
    pub fn insert(&mut self, figure: &XuFigure) -> Result<u32> {
        if let Some(index) = self.figures.index_of(figure) {
            return Ok(self.offsets[index as usize]);
        }
        self.append(figure.clone(), true)
    }

    /// Record offset of a pooled figure.
    pub fn offset_of(&self, figure: &XuFigure) -> Result<u32> {
        let index = self.figures.require(figure)?;
        Ok(self.offsets[index as usize])
    }

    /// Figure whose record starts at `offset`.
    pub fn get(&self, offset: u32) -> Result<&XuFigure> {
        let index = self
            .by_offset
            .get(&offset)
            .ok_or_else(|| Error::index("CUST", offset as usize, self.byte_len))?;
        self.figures.get(*index as u32)
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    /// Total size of the section in bytes.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn read_section(bytes: &[u8], base: usize) -> Result<Self> {
        let mut pool = Self::new();
        let mut r = ByteReader::at(bytes, base);
        while !r.is_empty() {
            let figure = read_figure(&mut r)?;
            pool.append(figure, false)?;
        }
        tracing::debug!(section = "CUST", entries = pool.len(), bytes = pool.byte_len, "figure pool read");
        Ok(pool)
    }

    pub fn write_section(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(self.byte_len);
        for figure in self.figures.iter() {
            write_figure(&mut w, figure)?;
        }
        Ok(w.into_bytes())
    }
}

// ============================================================================
// Pool set
// ============================================================================

/// All value pools of one file.
#[derive(Debug, Clone, Default)]
pub struct ValuePools {
    pub strings: Pool<String>,
    pub vectors: Pool<XuVector>,
    pub quaternions: Pool<XuQuaternion>,
    pub colours: Pool<XuColour>,
    pub floats: Pool<f32>,
    pub figures: FigurePool,
}

impl ValuePools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pass: collect every value of `root` in first-seen order.
    ///
    /// Strings are always pooled; the other pools are filled only for
    /// generations that store values out of line.
    pub fn build(root: &XuObject, generation: Generation) -> Result<Self> {
        let mut pools = Self::new();
        let pooled = generation == Generation::V8;
        pools.collect_object(root, pooled)?;
        tracing::debug!(
            strings = pools.strings.len(),
            vectors = pools.vectors.len(),
            quaternions = pools.quaternions.len(),
            colours = pools.colours.len(),
            floats = pools.floats.len(),
            figures = pools.figures.len(),
            "value pools built"
        );
        Ok(pools)
    }

    fn collect_object(&mut self, obj: &XuObject, pooled: bool) -> Result<()> {
        self.strings.intern(&obj.class_name)?;
        self.collect_properties(&obj.properties, pooled)?;
        for child in &obj.children {
            self.collect_object(child, pooled)?;
        }
        for frame in &obj.named_frames {
            self.strings.intern(&frame.name)?;
            if let Some(target) = &frame.target {
                self.strings.intern(target)?;
            }
        }
        for timeline in &obj.timelines {
            self.strings.intern(&timeline.element_name)?;
            for keyframe in &timeline.keyframes {
                for (i, prop) in keyframe.properties.iter().enumerate() {
                    // Only the animated slot of an indexed property is stored.
                    let slot = timeline.properties.get(i).and_then(|d| d.index);
                    match (slot, &prop.value) {
                        (Some(slot), XuPropertyValue::Indexed(values)) => {
                            if let Some(v) = values.get(slot as usize) {
                                self.collect_value(v, pooled)?;
                            }
                        }
                        _ => self.collect_property(prop, pooled)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_properties(&mut self, props: &[XuProperty], pooled: bool) -> Result<()> {
        for prop in props {
            self.collect_property(prop, pooled)?;
        }
        Ok(())
    }

    fn collect_property(&mut self, prop: &XuProperty, pooled: bool) -> Result<()> {
        for value in prop.value.values() {
            self.collect_value(value, pooled)?;
        }
        Ok(())
    }

    fn collect_value(&mut self, value: &XuValue, pooled: bool) -> Result<()> {
        match value {
            XuValue::String(s) => self.strings.intern(s)?,
            XuValue::Object(nested) => self.collect_properties(nested, pooled)?,
            _ if !pooled => {}
            XuValue::Float(f) => {
                self.floats.insert(*f)?;
            }
            XuValue::Vector(v) => {
                self.vectors.insert(*v)?;
            }
            XuValue::Quaternion(q) => {
                self.quaternions.insert(*q)?;
            }
            XuValue::Colour(c) => {
                self.colours.insert(*c)?;
            }
            XuValue::Custom(fig) => {
                self.figures.insert(fig)?;
            }
            XuValue::Bool(_) | XuValue::Integer(_) | XuValue::Unsigned(_) => {}
        }
        Ok(())
    }

    /// Read every value pool present in the table.
    pub fn read_sections(data: &[u8], table: &SectionTable, generation: Generation, strict_strings: bool) -> Result<Self> {
        let mut pools = Self::new();
        for entry in table.entries() {
            let Some(kind) = entry.kind() else { continue };
            let bytes = &data[entry.range()];
            let base = entry.offset as usize;
            match kind {
                SectionKind::Strn => {
                    pools.strings = match generation {
                        Generation::V5 => Pool::read_v5(bytes, base)?,
                        Generation::V8 => Pool::read_v8(bytes, base, strict_strings)?,
                    }
                }
                SectionKind::Vect => pools.vectors = Pool::read_section(bytes, base)?,
                SectionKind::Quat => pools.quaternions = Pool::read_section(bytes, base)?,
                SectionKind::Colr => pools.colours = Pool::read_section(bytes, base)?,
                SectionKind::Flot => pools.floats = Pool::read_section(bytes, base)?,
                SectionKind::Cust => pools.figures = FigurePool::read_section(bytes, base)?,
                SectionKind::Keyp | SectionKind::Keyd | SectionKind::Name | SectionKind::Data => {}
            }
        }
        Ok(pools)
    }

    /// Encoded non-empty pool sections in write order.
    pub fn write_sections(&self, generation: Generation) -> Result<Vec<(SectionKind, Vec<u8>)>> {
        let mut out = Vec::new();
        for kind in SectionKind::WRITE_ORDER {
            if !kind.used_by(generation) {
                continue;
            }
            let bytes = match kind {
                SectionKind::Strn if self.strings.is_empty() => continue,
                SectionKind::Strn => match generation {
                    Generation::V5 => self.strings.write_v5()?,
                    Generation::V8 => self.strings.write_v8()?,
                },
                SectionKind::Vect if !self.vectors.is_empty() => self.vectors.write_section()?,
                SectionKind::Quat if !self.quaternions.is_empty() => self.quaternions.write_section()?,
                SectionKind::Cust if !self.figures.is_empty() => self.figures.write_section()?,
                SectionKind::Flot if !self.floats.is_empty() => self.floats.write_section()?,
                SectionKind::Colr if !self.colours.is_empty() => self.colours.write_section()?,
                _ => continue,
            };
            out.push((kind, bytes));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::XuObject;
    use crate::schema::{PropertyFlags, PropertyKind, XuPropertyDefinition};
    use std::sync::Arc;

    fn prop(name: &str, value: XuValue) -> XuProperty {
        let def = XuPropertyDefinition::new(name, value.kind(), "XuiElement", PropertyFlags::NONE);
        XuProperty::new(Arc::new(def), value)
    }

    #[test]
    fn test_first_seen_wins() {
        let mut pool = Pool::<f32>::new();
        assert_eq!(pool.insert(1.5).unwrap(), 0);
        assert_eq!(pool.insert(2.0).unwrap(), 1);
        assert_eq!(pool.insert(1.5).unwrap(), 0);
        assert_eq!(pool.len(), 2);
        assert!(matches!(pool.get(2), Err(Error::IndexOutOfRange { pool: "FLOT", index: 2, len: 2 })));
    }

    #[test]
    fn test_float_bit_equality() {
        let mut pool = Pool::<f32>::new();
        assert_eq!(pool.insert(0.0).unwrap(), 0);
        assert_eq!(pool.insert(-0.0).unwrap(), 1);
        assert_eq!(pool.insert(f32::NAN).unwrap(), 2);
        assert_eq!(pool.insert(f32::NAN).unwrap(), 2);
    }

    #[test]
    fn test_string_refs() {
        let mut pool = Pool::<String>::new();
        pool.intern("").unwrap();
        pool.intern("Root").unwrap();
        pool.intern("Child").unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.reference("").unwrap(), 0);
        assert_eq!(pool.reference("Child").unwrap(), 2);
        assert_eq!(pool.resolve(0).unwrap(), "");
        assert_eq!(pool.resolve(1).unwrap(), "Root");
        assert!(pool.resolve(3).is_err());
        assert!(pool.reference("Missing").is_err());
    }

    #[test]
    fn test_strn_v8_layout() {
        let mut pool = Pool::<String>::new();
        pool.intern("Root").unwrap();
        pool.intern("Child").unwrap();
        let bytes = pool.write_v8().unwrap();
        assert_eq!(&bytes[0..8], [0, 0, 0, 11, 0, 0, 0, 2]);
        assert_eq!(&bytes[8..], b"Root\0Child\0");
        let back = Pool::<String>::read_v8(&bytes, 0, true).unwrap();
        assert_eq!(back.as_slice(), pool.as_slice());
    }

    #[test]
    fn test_strn_v8_length_mismatch() {
        let mut bytes = vec![0, 0, 0, 9, 0, 0, 0, 1];
        bytes.extend_from_slice(b"Root\0");
        let lenient = Pool::<String>::read_v8(&bytes, 0, false).unwrap();
        assert_eq!(lenient.resolve(1).unwrap(), "Root");
        let strict = Pool::<String>::read_v8(&bytes, 0, true);
        assert!(matches!(strict, Err(Error::StringTableMismatch { declared: 9, actual: 5 })));
    }

    #[test]
    fn test_strn_v5_utf16() {
        let mut pool = Pool::<String>::new();
        pool.intern("Grüße").unwrap();
        let bytes = pool.write_v5().unwrap();
        assert_eq!(&bytes[0..2], [0, 5]);
        assert_eq!(bytes.len(), 2 + 10);
        let back = Pool::<String>::read_v5(&bytes, 0).unwrap();
        assert_eq!(back.resolve(1).unwrap(), "Grüße");
    }

    #[test]
    fn test_figure_offsets() {
        let small = XuFigure { bounds: XuPoint::new(1.0, 1.0), points: vec![XuBezierPoint::default()] };
        let empty = XuFigure::default();
        let mut pool = FigurePool::new();
        assert_eq!(pool.insert(&small).unwrap(), 0);
        assert_eq!(pool.insert(&empty).unwrap(), 36);
        assert_eq!(pool.insert(&small).unwrap(), 0);
        assert_eq!(pool.byte_len(), 48);

        let bytes = pool.write_section().unwrap();
        assert_eq!(bytes.len(), 48);
        let back = FigurePool::read_section(&bytes, 0).unwrap();
        assert_eq!(back.get(36).unwrap(), &empty);
        assert_eq!(back.get(0).unwrap(), &small);
        assert!(matches!(back.get(12), Err(Error::IndexOutOfRange { pool: "CUST", .. })));
    }

    #[test]
    fn test_build_is_deterministic() {
        let v = XuVector::new(1.0, 2.0, 3.0);
        let child = XuObject::new("XuiText")
            .with_property(prop("Position", XuValue::Vector(v)))
            .with_property(prop("Text", XuValue::String("hello".into())));
        let root = XuObject::new("XuiCanvas")
            .with_property(prop("Position", XuValue::Vector(v)))
            .with_child(child)
            .with_child(XuObject::new("XuiText").with_property(prop("Opacity", XuValue::Float(0.5))));

        let a = ValuePools::build(&root, Generation::V8).unwrap();
        let b = ValuePools::build(&root, Generation::V8).unwrap();
        assert_eq!(a.strings.as_slice(), ["XuiCanvas", "XuiText", "hello"]);
        assert_eq!(a.strings.as_slice(), b.strings.as_slice());
        assert_eq!(a.vectors.as_slice(), [v]);
        assert_eq!(a.floats.as_slice(), b.floats.as_slice());

        let v5 = ValuePools::build(&root, Generation::V5).unwrap();
        assert!(v5.vectors.is_empty());
        assert_eq!(v5.strings.len(), 3);
        let sections = v5.write_sections(Generation::V5).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].0, SectionKind::Strn);
    }

    #[test]
    fn test_indexed_values_unpacked() {
        let def = XuPropertyDefinition::new("StopColor", PropertyKind::Colour, "XuiFigureFillGradient", PropertyFlags::INDEXED);
        let colours = [0xFF00_0000, 0xFFFF_FFFF, 0xFF00_0000];
        let indexed = XuProperty::indexed(
            Arc::new(def),
            colours.iter().map(|&c| XuValue::Colour(XuColour::from_argb(c))).collect(),
        );
        let root = XuObject::new("XuiFigure").with_property(indexed);
        let pools = ValuePools::build(&root, Generation::V8).unwrap();
        assert_eq!(pools.colours.len(), 2);
    }
}
