//! Per-generation wire strategies.
//!
//! The DATA codec is written once against [`WireFormat`]; [`V5`] and [`V8`]
//! supply the choices that differ between generations: integer widths,
//! inline versus pooled values, mask order, shared lists and where
//! keyframes and named frames live.

use super::animation::{
    keyframe_leaves, read_command, read_interpolation, run_at, value_from_raw, write_interpolation, AnimationPools,
};
use super::format::Generation;
use super::pools::{read_figure, write_figure, ValuePools};
use super::stream::{ByteReader, ByteWriter};
use crate::model::{XuColour, XuKeyframe, XuNamedFrame, XuQuaternion, XuTimeline, XuValue, XuVector};
use crate::schema::PropertyKind;
use crate::util::{Error, Result};

/// Encoding choices of one on-disk generation.
pub trait WireFormat {
    const GENERATION: Generation;

    /// Presence masks are written base class first.
    const MASKS_BASE_FIRST: bool;

    /// Whole property lists and compound values may be shared by index.
    const SHARED_LISTS: bool;

    fn read_count(r: &mut ByteReader<'_>) -> Result<u32>;
    fn write_count(w: &mut ByteWriter, value: u32) -> Result<()>;

    fn read_string_ref(r: &mut ByteReader<'_>) -> Result<u32>;
    fn write_string_ref(w: &mut ByteWriter, reference: u32) -> Result<()>;

    /// Read a non-compound value.
    fn read_value(r: &mut ByteReader<'_>, kind: PropertyKind, values: &ValuePools) -> Result<XuValue>;

    /// Write a non-compound value.
    fn write_value(w: &mut ByteWriter, value: &XuValue, values: &ValuePools) -> Result<()>;

    /// Named frames after their count.
    fn read_named_frames(
        r: &mut ByteReader<'_>,
        count: u32,
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<Vec<XuNamedFrame>>;

    fn write_named_frames(
        w: &mut ByteWriter,
        frames: &[XuNamedFrame],
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<()>;

    /// Keyframes after their count. Each keyframe comes back with its stored
    /// leaf values, parallel to `leaves`.
    fn read_keyframes(
        r: &mut ByteReader<'_>,
        count: u32,
        leaves: &[PropertyKind],
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<Vec<(XuKeyframe, Vec<XuValue>)>>;

    fn write_keyframes(
        w: &mut ByteWriter,
        timeline: &XuTimeline,
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<()>;

    /// Read a string reference and resolve it.
    fn read_string(r: &mut ByteReader<'_>, values: &ValuePools) -> Result<String> {
        let reference = Self::read_string_ref(r)?;
        Ok(values.strings.resolve(reference)?.to_string())
    }

    /// Write a reference to a pooled string.
    fn write_string(w: &mut ByteWriter, s: &str, values: &ValuePools) -> Result<()> {
        Self::write_string_ref(w, values.strings.reference(s)?)
    }
}

fn compound_not_allowed() -> Error {
    Error::invalid("compound value passed to scalar codec")
}

// ============================================================================
// V5
// ============================================================================

/// Fixed-width big-endian fields with values inline.
#[derive(Debug, Clone, Copy, Default)]
pub struct V5;

impl V5 {
    fn read_vector(r: &mut ByteReader<'_>) -> Result<XuVector> {
        Ok(XuVector::new(r.read_f32()?, r.read_f32()?, r.read_f32()?))
    }

    fn read_quaternion(r: &mut ByteReader<'_>) -> Result<XuQuaternion> {
        Ok(XuQuaternion::new(r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?))
    }
}

impl WireFormat for V5 {
    const GENERATION: Generation = Generation::V5;
    const MASKS_BASE_FIRST: bool = false;
    const SHARED_LISTS: bool = false;

    fn read_count(r: &mut ByteReader<'_>) -> Result<u32> {
        r.read_u32()
    }

    fn write_count(w: &mut ByteWriter, value: u32) -> Result<()> {
        w.write_u32(value)
    }

    fn read_string_ref(r: &mut ByteReader<'_>) -> Result<u32> {
        Ok(r.read_u16()? as u32)
    }

    fn write_string_ref(w: &mut ByteWriter, reference: u32) -> Result<()> {
        let narrow = u16::try_from(reference)
            .map_err(|_| Error::ValueOutOfRange { field: "V5 string reference", value: reference as u64 })?;
        w.write_u16(narrow)
    }

    fn read_value(r: &mut ByteReader<'_>, kind: PropertyKind, values: &ValuePools) -> Result<XuValue> {
        Ok(match kind {
            PropertyKind::Bool => XuValue::Bool(r.read_bool()?),
            PropertyKind::Integer => XuValue::Integer(r.read_u32()? as i32),
            PropertyKind::Unsigned => XuValue::Unsigned(r.read_u32()?),
            PropertyKind::String => XuValue::String(Self::read_string(r, values)?),
            PropertyKind::Float => XuValue::Float(r.read_f32()?),
            PropertyKind::Vector => XuValue::Vector(Self::read_vector(r)?),
            PropertyKind::Colour => XuValue::Colour(XuColour::from_argb(r.read_u32()?)),
            PropertyKind::Custom => XuValue::Custom(read_figure(r)?),
            PropertyKind::Quaternion => XuValue::Quaternion(Self::read_quaternion(r)?),
            PropertyKind::Object => return Err(compound_not_allowed()),
        })
    }

    fn write_value(w: &mut ByteWriter, value: &XuValue, values: &ValuePools) -> Result<()> {
        match value {
            XuValue::Bool(b) => w.write_bool(*b),
            XuValue::Integer(i) => w.write_u32(*i as u32),
            XuValue::Unsigned(u) => w.write_u32(*u),
            XuValue::String(s) => Self::write_string(w, s, values),
            XuValue::Float(f) => w.write_f32(*f),
            XuValue::Vector(v) => {
                w.write_f32(v.x)?;
                w.write_f32(v.y)?;
                w.write_f32(v.z)
            }
            XuValue::Colour(c) => w.write_u32(c.to_argb()),
            XuValue::Custom(fig) => write_figure(w, fig),
            XuValue::Quaternion(q) => {
                w.write_f32(q.x)?;
                w.write_f32(q.y)?;
                w.write_f32(q.z)?;
                w.write_f32(q.w)
            }
            XuValue::Object(_) => Err(compound_not_allowed()),
        }
    }

    fn read_named_frames(
        r: &mut ByteReader<'_>,
        count: u32,
        values: &ValuePools,
        _animation: &AnimationPools,
    ) -> Result<Vec<XuNamedFrame>> {
        let mut frames = Vec::new();
        for _ in 0..count {
            let name = Self::read_string(r, values)?;
            let frame = r.read_u32()?;
            let command = read_command(r)?;
            let target = if command.has_target() { Some(Self::read_string(r, values)?) } else { None };
            frames.push(XuNamedFrame { name, frame, command, target });
        }
        Ok(frames)
    }

    fn write_named_frames(
        w: &mut ByteWriter,
        frames: &[XuNamedFrame],
        values: &ValuePools,
        _animation: &AnimationPools,
    ) -> Result<()> {
        for frame in frames {
            frame.validate()?;
            Self::write_string(w, &frame.name, values)?;
            w.write_u32(frame.frame)?;
            w.write_u8(frame.command.to_u8())?;
            if let Some(target) = &frame.target {
                Self::write_string(w, target, values)?;
            }
        }
        Ok(())
    }

    fn read_keyframes(
        r: &mut ByteReader<'_>,
        count: u32,
        leaves: &[PropertyKind],
        values: &ValuePools,
        _animation: &AnimationPools,
    ) -> Result<Vec<(XuKeyframe, Vec<XuValue>)>> {
        let mut keyframes = Vec::new();
        for _ in 0..count {
            let frame = r.read_u32()?;
            let (interpolation, ease_in, ease_out, ease_scale) = read_interpolation(r)?;
            let keyframe = XuKeyframe { frame, interpolation, ease_in, ease_out, ease_scale, properties: Vec::new() };
            let stored = leaves
                .iter()
                .map(|&kind| Self::read_value(r, kind, values))
                .collect::<Result<Vec<_>>>()?;
            keyframes.push((keyframe, stored));
        }
        Ok(keyframes)
    }

    fn write_keyframes(
        w: &mut ByteWriter,
        timeline: &XuTimeline,
        values: &ValuePools,
        _animation: &AnimationPools,
    ) -> Result<()> {
        for keyframe in &timeline.keyframes {
            let leaves = keyframe_leaves(timeline, keyframe)?;
            w.write_u32(keyframe.frame)?;
            write_interpolation(w, keyframe.interpolation, keyframe.stored_easing())?;
            for value in leaves {
                Self::write_value(w, value, values)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// V8
// ============================================================================

/// Packed integers with values in dedup pools.
#[derive(Debug, Clone, Copy, Default)]
pub struct V8;

impl WireFormat for V8 {
    const GENERATION: Generation = Generation::V8;
    const MASKS_BASE_FIRST: bool = true;
    const SHARED_LISTS: bool = true;

    fn read_count(r: &mut ByteReader<'_>) -> Result<u32> {
        r.read_packed()
    }

    fn write_count(w: &mut ByteWriter, value: u32) -> Result<()> {
        w.write_packed(value)
    }

    fn read_string_ref(r: &mut ByteReader<'_>) -> Result<u32> {
        r.read_packed()
    }

    fn write_string_ref(w: &mut ByteWriter, reference: u32) -> Result<()> {
        w.write_packed(reference)
    }

    fn read_value(r: &mut ByteReader<'_>, kind: PropertyKind, values: &ValuePools) -> Result<XuValue> {
        Ok(match kind {
            PropertyKind::Bool => XuValue::Bool(r.read_bool()?),
            PropertyKind::Integer => XuValue::Integer(r.read_packed()? as i32),
            PropertyKind::Unsigned => XuValue::Unsigned(r.read_packed()?),
            PropertyKind::String => XuValue::String(Self::read_string(r, values)?),
            PropertyKind::Float => XuValue::Float(*values.floats.get(r.read_packed()?)?),
            PropertyKind::Vector => XuValue::Vector(*values.vectors.get(r.read_packed()?)?),
            PropertyKind::Colour => XuValue::Colour(*values.colours.get(r.read_packed()?)?),
            PropertyKind::Custom => XuValue::Custom(values.figures.get(r.read_packed()?)?.clone()),
            PropertyKind::Quaternion => XuValue::Quaternion(*values.quaternions.get(r.read_packed()?)?),
            PropertyKind::Object => return Err(compound_not_allowed()),
        })
    }

    fn write_value(w: &mut ByteWriter, value: &XuValue, values: &ValuePools) -> Result<()> {
        match value {
            XuValue::Bool(b) => w.write_bool(*b),
            XuValue::Integer(i) => w.write_packed(*i as u32),
            XuValue::Unsigned(u) => w.write_packed(*u),
            XuValue::String(s) => Self::write_string(w, s, values),
            XuValue::Float(f) => w.write_packed(values.floats.require(f)?),
            XuValue::Vector(v) => w.write_packed(values.vectors.require(v)?),
            XuValue::Colour(c) => w.write_packed(values.colours.require(c)?),
            XuValue::Custom(fig) => w.write_packed(values.figures.offset_of(fig)?),
            XuValue::Quaternion(q) => w.write_packed(values.quaternions.require(q)?),
            XuValue::Object(_) => Err(compound_not_allowed()),
        }
    }

    fn read_named_frames(
        r: &mut ByteReader<'_>,
        count: u32,
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<Vec<XuNamedFrame>> {
        let base = r.read_packed()?;
        run_at(&animation.named_frames, "NAME", base, count)?
            .iter()
            .map(|d| d.to_named_frame(values))
            .collect()
    }

    fn write_named_frames(
        w: &mut ByteWriter,
        frames: &[XuNamedFrame],
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<()> {
        w.write_packed(animation.named_frame_base(frames, values)?)
    }

    fn read_keyframes(
        r: &mut ByteReader<'_>,
        count: u32,
        leaves: &[PropertyKind],
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<Vec<(XuKeyframe, Vec<XuValue>)>> {
        let base = r.read_packed()?;
        let width = u32::try_from(leaves.len())
            .map_err(|_| Error::ValueOutOfRange { field: "animated property count", value: leaves.len() as u64 })?;
        run_at(&animation.keyframes, "KEYD", base, count)?
            .iter()
            .map(|descriptor| {
                let raw = run_at(&animation.keyframe_values, "KEYP", descriptor.keyp_base, width)?;
                let stored = leaves
                    .iter()
                    .zip(raw)
                    .map(|(&kind, &raw)| value_from_raw(kind, raw, values))
                    .collect::<Result<Vec<_>>>()?;
                Ok((descriptor.to_keyframe(), stored))
            })
            .collect()
    }

    fn write_keyframes(
        w: &mut ByteWriter,
        timeline: &XuTimeline,
        values: &ValuePools,
        animation: &AnimationPools,
    ) -> Result<()> {
        w.write_packed(animation.timeline_base(timeline, values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_widths() {
        let mut w5 = ByteWriter::new();
        V5::write_count(&mut w5, 3).unwrap();
        assert_eq!(w5.as_slice(), [0, 0, 0, 3]);
        let mut w8 = ByteWriter::new();
        V8::write_count(&mut w8, 3).unwrap();
        assert_eq!(w8.as_slice(), [3]);
    }

    #[test]
    fn test_v5_string_ref_range() {
        let mut w = ByteWriter::new();
        V5::write_string_ref(&mut w, 0xFFFF).unwrap();
        assert!(matches!(
            V5::write_string_ref(&mut w, 0x1_0000),
            Err(Error::ValueOutOfRange { field: "V5 string reference", .. })
        ));
    }

    #[test]
    fn test_v5_inline_values() {
        let pools = ValuePools::new();
        let mut w = ByteWriter::new();
        V5::write_value(&mut w, &XuValue::Vector(XuVector::new(1.0, 0.0, -1.0)), &pools).unwrap();
        V5::write_value(&mut w, &XuValue::Colour(XuColour::from_argb(0xFF10_2030)), &pools).unwrap();
        V5::write_value(&mut w, &XuValue::Integer(-1), &pools).unwrap();
        assert_eq!(w.position(), 12 + 4 + 4);

        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(
            V5::read_value(&mut r, PropertyKind::Vector, &pools).unwrap(),
            XuValue::Vector(XuVector::new(1.0, 0.0, -1.0))
        );
        assert_eq!(
            V5::read_value(&mut r, PropertyKind::Colour, &pools).unwrap(),
            XuValue::Colour(XuColour::from_argb(0xFF10_2030))
        );
        assert_eq!(V5::read_value(&mut r, PropertyKind::Integer, &pools).unwrap(), XuValue::Integer(-1));
    }

    #[test]
    fn test_v8_pooled_values() {
        let mut pools = ValuePools::new();
        pools.floats.insert(0.25).unwrap();
        pools.floats.insert(0.5).unwrap();
        let mut w = ByteWriter::new();
        V8::write_value(&mut w, &XuValue::Float(0.5), &pools).unwrap();
        assert_eq!(w.as_slice(), [1]);
        let mut r = ByteReader::new(w.as_slice());
        assert_eq!(V8::read_value(&mut r, PropertyKind::Float, &pools).unwrap(), XuValue::Float(0.5));
        assert!(V8::write_value(&mut w, &XuValue::Float(2.0), &pools).is_err());
    }

    #[test]
    fn test_bool_bytes() {
        let pools = ValuePools::new();
        for (byte, expected) in [(0u8, false), (1, true)] {
            let bytes = [byte];
            let v = V8::read_value(&mut ByteReader::new(&bytes), PropertyKind::Bool, &pools).unwrap();
            assert_eq!(v, XuValue::Bool(expected));
        }
        let bytes = [7u8];
        let err = V8::read_value(&mut ByteReader::new(&bytes), PropertyKind::Bool, &pools).unwrap_err();
        assert!(matches!(err, Error::InvalidBool { value: 7, .. }));
    }
}
