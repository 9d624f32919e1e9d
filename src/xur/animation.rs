//! Keyframe animation pools: KEYP, KEYD and NAME.
//!
//! V8 splits timeline data three ways so identical runs can be shared:
//!
//! - KEYP holds raw keyframe values, one per animated property per keyframe.
//!   The meaning of a raw value depends on the leaf property kind (pool
//!   index, string reference, integer, bool or CUST offset).
//! - KEYD holds keyframe descriptors; each points at its run of KEYP values.
//! - NAME holds named-frame descriptors.
//!
//! Timelines and objects store only a count and a base index. Runs are
//! deduplicated by searching the pool for an identical sub-sequence before
//! appending.

use serde::Serialize;

use super::format::SectionKind;
use super::header::SectionTable;
use super::pools::ValuePools;
use super::stream::{to_u32, ByteReader, ByteWriter};
use crate::model::{
    Interpolation, NamedFrameCommand, XuKeyframe, XuNamedFrame, XuObject, XuProperty, XuTimeline, XuValue,
};
use crate::schema::PropertyKind;
use crate::util::{Error, Result};

/// One KEYD entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyframeDescriptor {
    pub frame: u32,
    pub interpolation: Interpolation,
    pub ease_in: u8,
    pub ease_out: u8,
    pub ease_scale: u8,
    /// First KEYP entry of this keyframe's values.
    pub keyp_base: u32,
}

impl KeyframeDescriptor {
    /// Descriptor for a keyframe whose values start at `keyp_base`.
    /// Ease bytes are only kept for eased keyframes.
    pub fn new(keyframe: &XuKeyframe, keyp_base: u32) -> Self {
        let [ease_in, ease_out, ease_scale] = keyframe.stored_easing();
        Self { frame: keyframe.frame, interpolation: keyframe.interpolation, ease_in, ease_out, ease_scale, keyp_base }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let frame = r.read_packed()?;
        let (interpolation, ease_in, ease_out, ease_scale) = read_interpolation(r)?;
        Ok(Self {
            frame,
            interpolation,
            ease_in,
            ease_out,
            ease_scale,
            keyp_base: r.read_packed()?,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_packed(self.frame)?;
        write_interpolation(w, self.interpolation, [self.ease_in, self.ease_out, self.ease_scale])?;
        w.write_packed(self.keyp_base)
    }

    /// Keyframe without property values.
    pub fn to_keyframe(&self) -> XuKeyframe {
        XuKeyframe {
            frame: self.frame,
            interpolation: self.interpolation,
            ease_in: self.ease_in,
            ease_out: self.ease_out,
            ease_scale: self.ease_scale,
            properties: Vec::new(),
        }
    }
}

/// Read an interpolation byte plus ease triple when eased.
pub fn read_interpolation(r: &mut ByteReader<'_>) -> Result<(Interpolation, u8, u8, u8)> {
    let offset = r.offset();
    let tag = r.read_u8()?;
    let interpolation = Interpolation::from_u8(tag)
        .ok_or_else(|| Error::invalid(format!("unknown interpolation {tag} at {offset:#x}")))?;
    if interpolation == Interpolation::Ease {
        Ok((interpolation, r.read_u8()?, r.read_u8()?, r.read_u8()?))
    } else {
        Ok((interpolation, 0, 0, 0))
    }
}

/// Write an interpolation byte plus ease triple when eased.
pub fn write_interpolation(w: &mut ByteWriter, interpolation: Interpolation, ease: [u8; 3]) -> Result<()> {
    w.write_u8(interpolation.to_u8())?;
    if interpolation == Interpolation::Ease {
        for b in ease {
            w.write_u8(b)?;
        }
    }
    Ok(())
}

/// One NAME entry. String fields are STRN references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NamedFrameDescriptor {
    pub name: u32,
    pub frame: u32,
    pub command: NamedFrameCommand,
    /// Zero unless the command is GoTo-family.
    pub target: u32,
}

impl NamedFrameDescriptor {
    pub fn new(frame: &XuNamedFrame, values: &ValuePools) -> Result<Self> {
        frame.validate()?;
        Ok(Self {
            name: values.strings.reference(&frame.name)?,
            frame: frame.frame,
            command: frame.command,
            target: match &frame.target {
                Some(target) => values.strings.reference(target)?,
                None => 0,
            },
        })
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let name = r.read_packed()?;
        let frame = r.read_packed()?;
        let command = read_command(r)?;
        let target = if command.has_target() { r.read_packed()? } else { 0 };
        Ok(Self { name, frame, command, target })
    }

    pub fn write(&self, w: &mut ByteWriter) -> Result<()> {
        w.write_packed(self.name)?;
        w.write_packed(self.frame)?;
        w.write_u8(self.command.to_u8())?;
        if self.command.has_target() {
            w.write_packed(self.target)?;
        }
        Ok(())
    }

    /// Resolve string references.
    pub fn to_named_frame(&self, values: &ValuePools) -> Result<XuNamedFrame> {
        let target = if self.command.has_target() {
            Some(values.strings.resolve(self.target)?.to_string())
        } else {
            None
        };
        Ok(XuNamedFrame {
            name: values.strings.resolve(self.name)?.to_string(),
            frame: self.frame,
            command: self.command,
            target,
        })
    }
}

/// Read a named-frame command byte.
pub fn read_command(r: &mut ByteReader<'_>) -> Result<NamedFrameCommand> {
    let offset = r.offset();
    let tag = r.read_u8()?;
    NamedFrameCommand::from_u8(tag)
        .ok_or_else(|| Error::invalid(format!("unknown named frame command {tag} at {offset:#x}")))
}

/// Position of the first occurrence of `run` inside `pool`.
///
/// An empty run matches at 0.
pub fn find_run<T: PartialEq>(pool: &[T], run: &[T]) -> Option<usize> {
    if run.is_empty() {
        return Some(0);
    }
    pool.windows(run.len()).position(|window| window == run)
}

/// Base index of `run` in `pool`, appending it when not already present.
pub fn intern_run<T: PartialEq + Clone>(pool: &mut Vec<T>, run: &[T]) -> Result<u32> {
    let base = match find_run(pool, run) {
        Some(base) => base,
        None => {
            let base = pool.len();
            pool.extend_from_slice(run);
            base
        }
    };
    to_u32("run base", base)
}

/// Slice `pool[base..base + count]`, bounds-checked.
pub fn run_at<'a, T>(pool: &'a [T], name: &'static str, base: u32, count: u32) -> Result<&'a [T]> {
    let start = base as usize;
    let end = start.saturating_add(count as usize);
    pool.get(start..end)
        .ok_or_else(|| Error::index(name, end.saturating_sub(1), pool.len()))
}

// ============================================================================
// Raw keyframe values
// ============================================================================

/// Encode a keyframe leaf value as a KEYP entry.
pub fn raw_value(value: &XuValue, values: &ValuePools) -> Result<u32> {
    match value {
        XuValue::Bool(b) => Ok(*b as u32),
        XuValue::Integer(i) => Ok(*i as u32),
        XuValue::Unsigned(u) => Ok(*u),
        XuValue::String(s) => values.strings.reference(s),
        XuValue::Float(f) => values.floats.require(f),
        XuValue::Vector(v) => values.vectors.require(v),
        XuValue::Colour(c) => values.colours.require(c),
        XuValue::Quaternion(q) => values.quaternions.require(q),
        XuValue::Custom(fig) => values.figures.offset_of(fig),
        XuValue::Object(_) => Err(Error::invalid("compound values cannot be keyframed directly")),
    }
}

/// Decode a KEYP entry for a leaf of the given kind.
pub fn value_from_raw(kind: PropertyKind, raw: u32, values: &ValuePools) -> Result<XuValue> {
    Ok(match kind {
        PropertyKind::Bool => match raw {
            0 => XuValue::Bool(false),
            1 => XuValue::Bool(true),
            _ => return Err(Error::ValueOutOfRange { field: "keyframe bool", value: raw as u64 }),
        },
        PropertyKind::Integer => XuValue::Integer(raw as i32),
        PropertyKind::Unsigned => XuValue::Unsigned(raw),
        PropertyKind::String => XuValue::String(values.strings.resolve(raw)?.to_string()),
        PropertyKind::Float => XuValue::Float(*values.floats.get(raw)?),
        PropertyKind::Vector => XuValue::Vector(*values.vectors.get(raw)?),
        PropertyKind::Colour => XuValue::Colour(*values.colours.get(raw)?),
        PropertyKind::Quaternion => XuValue::Quaternion(*values.quaternions.get(raw)?),
        PropertyKind::Custom => XuValue::Custom(values.figures.get(raw)?.clone()),
        PropertyKind::Object => return Err(Error::invalid("compound values cannot be keyframed directly")),
    })
}

/// The stored value of one keyframe property: the animated slot of an
/// indexed property, or the scalar.
pub fn leaf_value<'a>(index: Option<u32>, prop: &'a XuProperty) -> Result<&'a XuValue> {
    let value = match index {
        Some(slot) => prop.slots().and_then(|slots| slots.get(slot as usize)),
        None => prop.single(),
    };
    let value = value.ok_or_else(|| {
        Error::invalid(format!(
            "keyframe value for {} does not match its declaration (slot {:?})",
            prop.definition.qualified_name(),
            index
        ))
    })?;
    if value.kind() != prop.definition.kind {
        return Err(Error::TypeMismatch {
            property: prop.definition.qualified_name(),
            expected: prop.definition.kind.to_string(),
            actual: value.kind().to_string(),
        });
    }
    Ok(value)
}

/// Stored leaf values of one keyframe, parallel to the timeline declarations.
pub fn keyframe_leaves<'a>(timeline: &XuTimeline, keyframe: &'a XuKeyframe) -> Result<Vec<&'a XuValue>> {
    if keyframe.properties.len() != timeline.properties.len() {
        return Err(Error::invalid(format!(
            "timeline {:?}: keyframe {} has {} values for {} animated properties",
            timeline.element_name,
            keyframe.frame,
            keyframe.properties.len(),
            timeline.properties.len()
        )));
    }
    timeline
        .properties
        .iter()
        .zip(&keyframe.properties)
        .map(|(decl, prop)| match decl.leaf() {
            Some(leaf) if leaf.same_as(&prop.definition) => leaf_value(decl.index, prop),
            _ => Err(Error::invalid(format!(
                "timeline {:?}: keyframe {} sets {} where {} is declared",
                timeline.element_name,
                keyframe.frame,
                prop.definition.qualified_name(),
                decl.display_path()
            ))),
        })
        .collect()
}

// ============================================================================
// Pools
// ============================================================================

/// KEYP, KEYD and NAME contents of one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnimationPools {
    pub keyframe_values: Vec<u32>,
    pub keyframes: Vec<KeyframeDescriptor>,
    pub named_frames: Vec<NamedFrameDescriptor>,
}

impl AnimationPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build pass over the whole tree. `values` must already be built.
    pub fn build(root: &XuObject, values: &ValuePools) -> Result<Self> {
        let mut pools = Self::new();
        pools.collect(root, values)?;
        tracing::debug!(
            keyp = pools.keyframe_values.len(),
            keyd = pools.keyframes.len(),
            name = pools.named_frames.len(),
            "animation pools built"
        );
        Ok(pools)
    }

    fn collect(&mut self, obj: &XuObject, values: &ValuePools) -> Result<()> {
        let frames = Self::named_frame_run(&obj.named_frames, values)?;
        intern_run(&mut self.named_frames, &frames)?;
        for timeline in &obj.timelines {
            for keyframe in &timeline.keyframes {
                let raw = Self::raw_run(timeline, keyframe, values)?;
                intern_run(&mut self.keyframe_values, &raw)?;
            }
            let descriptors = self.describe_keyframes(timeline, values)?;
            intern_run(&mut self.keyframes, &descriptors)?;
        }
        for child in &obj.children {
            self.collect(child, values)?;
        }
        Ok(())
    }

    fn raw_run(timeline: &XuTimeline, keyframe: &XuKeyframe, values: &ValuePools) -> Result<Vec<u32>> {
        keyframe_leaves(timeline, keyframe)?
            .into_iter()
            .map(|v| raw_value(v, values))
            .collect()
    }

    fn named_frame_run(frames: &[XuNamedFrame], values: &ValuePools) -> Result<Vec<NamedFrameDescriptor>> {
        frames.iter().map(|f| NamedFrameDescriptor::new(f, values)).collect()
    }

    /// KEYD descriptors of a timeline, pointing at runs already in KEYP.
    pub fn describe_keyframes(&self, timeline: &XuTimeline, values: &ValuePools) -> Result<Vec<KeyframeDescriptor>> {
        timeline
            .keyframes
            .iter()
            .map(|keyframe| {
                let raw = Self::raw_run(timeline, keyframe, values)?;
                let base = find_run(&self.keyframe_values, &raw)
                    .ok_or_else(|| Error::invalid(format!("keyframe {} values missing from KEYP", keyframe.frame)))?;
                Ok(KeyframeDescriptor::new(keyframe, to_u32("KEYP base", base)?))
            })
            .collect()
    }

    /// KEYD base of a timeline's descriptor run.
    pub fn timeline_base(&self, timeline: &XuTimeline, values: &ValuePools) -> Result<u32> {
        let descriptors = self.describe_keyframes(timeline, values)?;
        let base = find_run(&self.keyframes, &descriptors).ok_or_else(|| {
            Error::invalid(format!("timeline {:?} missing from KEYD", timeline.element_name))
        })?;
        to_u32("KEYD base", base)
    }

    /// NAME base of an object's named-frame run.
    pub fn named_frame_base(&self, frames: &[XuNamedFrame], values: &ValuePools) -> Result<u32> {
        let run = Self::named_frame_run(frames, values)?;
        let base = find_run(&self.named_frames, &run)
            .ok_or_else(|| Error::invalid("named frames missing from NAME"))?;
        to_u32("NAME base", base)
    }

    /// Read KEYP, KEYD and NAME when present.
    pub fn read_sections(data: &[u8], table: &SectionTable) -> Result<Self> {
        let mut pools = Self::new();
        if let Some(entry) = table.get(SectionKind::Keyp) {
            let mut r = ByteReader::at(&data[entry.range()], entry.offset as usize);
            while !r.is_empty() {
                pools.keyframe_values.push(r.read_packed()?);
            }
        }
        if let Some(entry) = table.get(SectionKind::Keyd) {
            let mut r = ByteReader::at(&data[entry.range()], entry.offset as usize);
            while !r.is_empty() {
                pools.keyframes.push(KeyframeDescriptor::read(&mut r)?);
            }
        }
        if let Some(entry) = table.get(SectionKind::Name) {
            let mut r = ByteReader::at(&data[entry.range()], entry.offset as usize);
            while !r.is_empty() {
                pools.named_frames.push(NamedFrameDescriptor::read(&mut r)?);
            }
        }
        tracing::debug!(
            keyp = pools.keyframe_values.len(),
            keyd = pools.keyframes.len(),
            name = pools.named_frames.len(),
            "animation pools read"
        );
        Ok(pools)
    }

    /// Encoded non-empty sections in write order.
    pub fn write_sections(&self) -> Result<Vec<(SectionKind, Vec<u8>)>> {
        let mut out = Vec::new();
        if !self.keyframe_values.is_empty() {
            let mut w = ByteWriter::new();
            for &v in &self.keyframe_values {
                w.write_packed(v)?;
            }
            out.push((SectionKind::Keyp, w.into_bytes()));
        }
        if !self.keyframes.is_empty() {
            let mut w = ByteWriter::new();
            for d in &self.keyframes {
                d.write(&mut w)?;
            }
            out.push((SectionKind::Keyd, w.into_bytes()));
        }
        if !self.named_frames.is_empty() {
            let mut w = ByteWriter::new();
            for d in &self.named_frames {
                d.write(&mut w)?;
            }
            out.push((SectionKind::Name, w.into_bytes()));
        }
        Ok(out)
    }
}
