//! DATA section codec: object tree, property lists and timelines.
//!
//! ```text
//! object   := class string-ref, flags u8,
//!             [props | shared-index], [child-count, object*],
//!             [named-frames, [timeline-count, timeline*]]
//! props    := presence masks, values (base class first, definition order)
//! timeline := element string-ref, declaration-count, declaration*,
//!             keyframe-count, keyframes
//! ```
//!
//! One codec serves both generations; [`WireFormat`] supplies the
//! per-generation field encodings.

use std::marker::PhantomData;

use smallvec::SmallVec;

use super::animation::AnimationPools;
use super::format::*;
use super::pools::{PoolKey, ValuePools};
use super::stream::{to_u32, ByteReader, ByteWriter};
use super::wire::WireFormat;
use crate::model::{
    XuAnimatedProperty, XuObject, XuProperty, XuPropertyValue, XuTimeline, XuValue,
};
use crate::schema::{ClassHierarchy, PropertyKind, SchemaProvider, XuPropertyDefinition};
use crate::util::{Error, Result};

/// Deepest object nesting accepted on read.
const MAX_TREE_DEPTH: usize = 256;

/// Deepest compound nesting (values and animated paths).
const MAX_COMPOUND_DEPTH: usize = 16;

/// Largest array slot an animated declaration may name.
const MAX_ARRAY_SLOT: u32 = 0xFFFF;

/// Every object flag this codec understands.
const KNOWN_OBJECT_FLAGS: u8 =
    OBJECT_HAS_PROPERTIES | OBJECT_HAS_CHILDREN | OBJECT_HAS_ANIMATION | OBJECT_SHARED_PROPERTIES;

/// Presence mask of one class level.
type Mask = SmallVec<[u8; 4]>;

#[inline]
fn bit_set(mask: &[u8], i: usize) -> bool {
    mask[i / 8] & (1 << (i % 8)) != 0
}

/// Fail early when `count` items of at least `min_size` bytes cannot fit.
fn ensure_fits(r: &ByteReader<'_>, count: u32, min_size: usize) -> Result<()> {
    let need = (count as usize).saturating_mul(min_size);
    if need > r.remaining() {
        return Err(Error::UnexpectedEof { offset: r.offset(), need, have: r.remaining() });
    }
    Ok(())
}

// ============================================================================
// Property layout
// ============================================================================

/// Presence masks and canonically ordered values of one property list.
pub(crate) struct PropertyLayout<'p> {
    /// One mask per class level, most-derived first.
    masks: Vec<Mask>,
    /// Base class first, definition order within a level.
    ordered: Vec<&'p XuProperty>,
}

impl<'p> PropertyLayout<'p> {
    /// Place every property of `props` in `hierarchy`.
    pub(crate) fn new(hierarchy: &ClassHierarchy, props: &'p [XuProperty]) -> Result<Self> {
        let mut slots: Vec<Vec<Option<&'p XuProperty>>> =
            hierarchy.derived_first().map(|class| vec![None; class.properties.len()]).collect();
        for prop in props {
            let (depth, index) = hierarchy.locate(&prop.definition).ok_or_else(|| Error::PropertyNotFound {
                class: hierarchy.most_derived().map(|c| c.name.clone()).unwrap_or_default(),
                property: prop.definition.qualified_name(),
            })?;
            prop.validate()?;
            let slot = &mut slots[depth][index];
            if slot.is_some() {
                return Err(Error::DuplicateProperty(prop.definition.qualified_name()));
            }
            *slot = Some(prop);
        }

        let masks = slots
            .iter()
            .map(|level| {
                let mut mask = Mask::from_elem(0, level.len().div_ceil(8));
                for (i, slot) in level.iter().enumerate() {
                    if slot.is_some() {
                        mask[i / 8] |= 1 << (i % 8);
                    }
                }
                mask
            })
            .collect();
        let ordered = slots.iter().rev().flat_map(|level| level.iter().flatten().copied()).collect();
        Ok(Self { masks, ordered })
    }

    pub(crate) fn ordered(&self) -> &[&'p XuProperty] {
        &self.ordered
    }

    pub(crate) fn to_owned_list(&self) -> Vec<XuProperty> {
        self.ordered.iter().map(|&p| p.clone()).collect()
    }
}

/// Hierarchy of a compound sub-schema.
pub(crate) fn compound_hierarchy(schema: &dyn SchemaProvider, def: &XuPropertyDefinition) -> Result<ClassHierarchy> {
    Ok(ClassHierarchy::single(schema.compound_class(def)?))
}

/// Wire codes of an animated declaration: depth, property index, one
/// sub-index per compound descent, then the array slot for indexed leaves.
pub(crate) fn encode_declaration(
    schema: &dyn SchemaProvider,
    hierarchy: &ClassHierarchy,
    decl: &XuAnimatedProperty,
) -> Result<SmallVec<[u32; 6]>> {
    let (first, rest) = decl
        .path
        .split_first()
        .ok_or_else(|| Error::invalid("animated property with empty path"))?;
    let class_name = || hierarchy.most_derived().map(|c| c.name.clone()).unwrap_or_default();
    let (depth, index) = hierarchy
        .locate(first)
        .ok_or_else(|| Error::PropertyNotFound { class: class_name(), property: first.qualified_name() })?;

    let mut codes = SmallVec::new();
    codes.push(to_u32("class depth", depth)?);
    codes.push(to_u32("property index", index)?);
    let mut current = first;
    for def in rest {
        if current.kind != PropertyKind::Object {
            return Err(Error::invalid(format!(
                "animated path {}: {} is not a compound",
                decl.display_path(),
                current.name
            )));
        }
        let sub = schema.compound_class(current)?;
        let i = sub.property_index(def).ok_or_else(|| Error::PropertyNotFound {
            class: sub.name.clone(),
            property: def.qualified_name(),
        })?;
        codes.push(to_u32("property index", i)?);
        current = def;
    }
    if current.kind == PropertyKind::Object {
        return Err(Error::invalid(format!("animated path {} ends at a compound", decl.display_path())));
    }
    match (current.is_indexed(), decl.index) {
        (true, Some(slot)) if slot <= MAX_ARRAY_SLOT => codes.push(slot),
        (true, Some(slot)) => return Err(Error::ValueOutOfRange { field: "array slot", value: slot as u64 }),
        (false, None) => {}
        (true, None) => {
            return Err(Error::invalid(format!("animated path {} needs an array slot", decl.display_path())))
        }
        (false, Some(_)) => {
            return Err(Error::invalid(format!(
                "animated path {} has a slot but is not indexed",
                decl.display_path()
            )))
        }
    }
    Ok(codes)
}

// ============================================================================
// Shared lists
// ============================================================================

/// Value equality as the pools see it: floats compare by bit pattern.
fn same_value(a: &XuValue, b: &XuValue) -> bool {
    match (a, b) {
        (XuValue::Float(a), XuValue::Float(b)) => a.pool_key() == b.pool_key(),
        (XuValue::Vector(a), XuValue::Vector(b)) => a.pool_key() == b.pool_key(),
        (XuValue::Quaternion(a), XuValue::Quaternion(b)) => a.pool_key() == b.pool_key(),
        (XuValue::Custom(a), XuValue::Custom(b)) => a.pool_key() == b.pool_key(),
        (XuValue::Object(a), XuValue::Object(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_property(a, b))
        }
        (a, b) => a == b,
    }
}

fn same_property(a: &XuProperty, b: &XuProperty) -> bool {
    a.definition == b.definition
        && match (&a.value, &b.value) {
            (XuPropertyValue::Single(a), XuPropertyValue::Single(b)) => same_value(a, b),
            (XuPropertyValue::Indexed(a), XuPropertyValue::Indexed(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_value(a, b))
            }
            _ => false,
        }
}

fn same_list(entry: &[XuProperty], list: &[&XuProperty]) -> bool {
    entry.len() == list.len() && entry.iter().zip(list).all(|(a, b)| same_property(a, b))
}

/// Running lists of one DATA pass: whole object property lists and compound
/// values, each addressable by index once written (V8).
#[derive(Debug, Default)]
pub struct SharedLists {
    property_lists: Vec<Vec<XuProperty>>,
    /// `None` marks a slot reserved for a compound still being decoded.
    compounds: Vec<Option<Vec<XuProperty>>>,
}

impl SharedLists {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_property_list(&self, list: &[&XuProperty]) -> Option<usize> {
        self.property_lists.iter().position(|entry| same_list(entry, list))
    }

    pub fn push_property_list(&mut self, list: Vec<XuProperty>) {
        self.property_lists.push(list);
    }

    pub fn property_list(&self, index: usize) -> Result<&[XuProperty]> {
        self.property_lists
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::index("shared property lists", index, self.property_lists.len()))
    }

    pub fn find_compound(&self, list: &[&XuProperty]) -> Option<usize> {
        self.compounds
            .iter()
            .position(|entry| entry.as_deref().is_some_and(|entry| same_list(entry, list)))
    }

    /// Reserve the next compound slot before its nested values are coded.
    pub fn reserve_compound(&mut self) -> usize {
        self.compounds.push(None);
        self.compounds.len() - 1
    }

    pub fn fill_compound(&mut self, slot: usize, list: Vec<XuProperty>) {
        self.compounds[slot] = Some(list);
    }

    pub fn compound(&self, index: usize) -> Result<&[XuProperty]> {
        match self.compounds.get(index) {
            Some(Some(list)) => Ok(list),
            Some(None) => Err(Error::invalid(format!("compound {index} referenced while being defined"))),
            None => Err(Error::index("shared compounds", index, self.compounds.len())),
        }
    }

    /// Number of unique object property lists.
    pub fn property_list_count(&self) -> usize {
        self.property_lists.len()
    }

    /// Properties across unique object property lists.
    pub fn property_count(&self) -> usize {
        self.property_lists.iter().map(Vec::len).sum()
    }

    /// Number of unique compound values (including reserved slots).
    pub fn compound_count(&self) -> usize {
        self.compounds.len()
    }

    /// Properties across unique compound values.
    pub fn compound_property_count(&self) -> usize {
        self.compounds.iter().flatten().map(Vec::len).sum()
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Object tree codec for one generation.
pub struct ObjectTreeCodec<'a, W: WireFormat> {
    schema: &'a dyn SchemaProvider,
    values: &'a ValuePools,
    animation: &'a AnimationPools,
    wire: PhantomData<W>,
}

impl<'a, W: WireFormat> ObjectTreeCodec<'a, W> {
    pub fn new(schema: &'a dyn SchemaProvider, values: &'a ValuePools, animation: &'a AnimationPools) -> Self {
        Self { schema, values, animation, wire: PhantomData }
    }

    // ------------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------------

    /// Decode a DATA section located at `base` in the file.
    pub fn read_tree(&self, bytes: &[u8], base: usize) -> Result<XuObject> {
        let mut r = ByteReader::at(bytes, base);
        let mut shared = SharedLists::new();
        let root = self.read_object(&mut r, &mut shared, 0)?;
        if !r.is_empty() {
            return Err(Error::TrailingBytes { section: "DATA", remaining: r.remaining() });
        }
        tracing::debug!(
            generation = %W::GENERATION,
            objects = root.object_count(),
            shared_lists = shared.property_list_count(),
            compounds = shared.compound_count(),
            "object tree decoded"
        );
        Ok(root)
    }

    fn read_object(&self, r: &mut ByteReader<'_>, shared: &mut SharedLists, depth: usize) -> Result<XuObject> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::invalid(format!("object tree deeper than {MAX_TREE_DEPTH} at {:#x}", r.offset())));
        }
        let mut obj = XuObject::new(W::read_string(r, self.values)?);
        let flags_offset = r.offset();
        let flags = r.read_u8()?;
        if flags & !KNOWN_OBJECT_FLAGS != 0
            || (flags & OBJECT_SHARED_PROPERTIES != 0 && !W::SHARED_LISTS)
            || (flags & OBJECT_SHARED_PROPERTIES != 0 && flags & OBJECT_HAS_PROPERTIES != 0)
        {
            return Err(Error::invalid(format!("invalid object flags {flags:#04x} at {flags_offset:#x}")));
        }
        tracing::trace!(class = %obj.class_name, flags, depth, offset = flags_offset, "object");

        if flags & OBJECT_HAS_PROPERTIES != 0 {
            let hierarchy = self.schema.resolve_class(&obj.class_name)?;
            obj.properties = self.read_property_list(r, &hierarchy, shared, 0)?;
            if W::SHARED_LISTS {
                shared.push_property_list(obj.properties.clone());
            }
        } else if flags & OBJECT_SHARED_PROPERTIES != 0 {
            let index = W::read_count(r)? as usize;
            obj.properties = shared.property_list(index)?.to_vec();
        }

        if flags & OBJECT_HAS_CHILDREN != 0 {
            let count = W::read_count(r)?;
            ensure_fits(r, count, 2)?;
            obj.children.reserve(count as usize);
            for _ in 0..count {
                let child = self.read_object(r, shared, depth + 1)?;
                obj.children.push(child);
            }
        }

        if flags & OBJECT_HAS_ANIMATION != 0 {
            let count = W::read_count(r)?;
            obj.named_frames = W::read_named_frames(r, count, self.values, self.animation)?;
            // Timelines only animate children.
            if !obj.children.is_empty() {
                let count = W::read_count(r)?;
                ensure_fits(r, count, 3)?;
                for _ in 0..count {
                    let timeline = self.read_timeline(r, &obj)?;
                    obj.timelines.push(timeline);
                }
            }
        }
        Ok(obj)
    }

    fn read_property_list(
        &self,
        r: &mut ByteReader<'_>,
        hierarchy: &ClassHierarchy,
        shared: &mut SharedLists,
        nesting: usize,
    ) -> Result<Vec<XuProperty>> {
        let mut masks: Vec<Mask> = Vec::with_capacity(hierarchy.len());
        if W::MASKS_BASE_FIRST {
            for class in hierarchy.base_first() {
                masks.push(Mask::from_slice(r.read_bytes(class.mask_len())?));
            }
        } else {
            for class in hierarchy.derived_first() {
                masks.push(Mask::from_slice(r.read_bytes(class.mask_len())?));
            }
            masks.reverse();
        }

        let mut props = Vec::new();
        for (class, mask) in hierarchy.base_first().zip(&masks) {
            let defined = class.properties.len();
            if (defined..mask.len() * 8).any(|i| bit_set(mask, i)) {
                return Err(Error::invalid(format!(
                    "presence mask of {} selects undefined properties at {:#x}",
                    class.name,
                    r.offset()
                )));
            }
            for (i, def) in class.properties.iter().enumerate() {
                if bit_set(mask, i) {
                    let value = self.read_property_value(r, def, shared, nesting)?;
                    props.push(XuProperty { definition: def.clone(), value });
                }
            }
        }
        Ok(props)
    }

    fn read_property_value(
        &self,
        r: &mut ByteReader<'_>,
        def: &XuPropertyDefinition,
        shared: &mut SharedLists,
        nesting: usize,
    ) -> Result<XuPropertyValue> {
        if def.is_indexed() {
            let count = W::read_count(r)?;
            ensure_fits(r, count, 1)?;
            let values = (0..count)
                .map(|_| self.read_element(r, def, shared, nesting))
                .collect::<Result<Vec<_>>>()?;
            Ok(XuPropertyValue::Indexed(values))
        } else {
            Ok(XuPropertyValue::Single(self.read_element(r, def, shared, nesting)?))
        }
    }

    fn read_element(
        &self,
        r: &mut ByteReader<'_>,
        def: &XuPropertyDefinition,
        shared: &mut SharedLists,
        nesting: usize,
    ) -> Result<XuValue> {
        if def.kind == PropertyKind::Object {
            self.read_compound(r, def, shared, nesting)
        } else {
            W::read_value(r, def.kind, self.values)
        }
    }

    fn read_compound(
        &self,
        r: &mut ByteReader<'_>,
        def: &XuPropertyDefinition,
        shared: &mut SharedLists,
        nesting: usize,
    ) -> Result<XuValue> {
        if nesting >= MAX_COMPOUND_DEPTH {
            return Err(Error::invalid(format!("compound values nested deeper than {MAX_COMPOUND_DEPTH}")));
        }
        let hierarchy = compound_hierarchy(self.schema, def)?;
        if !W::SHARED_LISTS {
            return Ok(XuValue::Object(self.read_property_list(r, &hierarchy, shared, nesting + 1)?));
        }

        let index = W::read_count(r)? as usize;
        let len = shared.compound_count();
        if index < len {
            return Ok(XuValue::Object(shared.compound(index)?.to_vec()));
        }
        if index > len {
            return Err(Error::index("shared compounds", index, len));
        }
        let slot = shared.reserve_compound();
        let list = self.read_property_list(r, &hierarchy, shared, nesting + 1)?;
        shared.fill_compound(slot, list.clone());
        Ok(XuValue::Object(list))
    }

    fn read_timeline(&self, r: &mut ByteReader<'_>, parent: &XuObject) -> Result<XuTimeline> {
        let element_name = W::read_string(r, self.values)?;
        let target = parent
            .child_by_id(&element_name)
            .ok_or_else(|| Error::TimelineTargetNotFound(element_name.clone()))?;
        let hierarchy = self.schema.resolve_class(&target.class_name)?;

        let count = W::read_count(r)?;
        ensure_fits(r, count, 2)?;
        let properties = (0..count)
            .map(|_| self.read_declaration(r, &hierarchy))
            .collect::<Result<Vec<_>>>()?;
        let leaves: Vec<PropertyKind> = properties
            .iter()
            .map(|d| d.leaf().map(|leaf| leaf.kind))
            .collect::<Option<_>>()
            .ok_or_else(|| Error::invalid("animated property with empty path"))?;

        let count = W::read_count(r)?;
        let keyframes = W::read_keyframes(r, count, &leaves, self.values, self.animation)?
            .into_iter()
            .map(|(mut keyframe, stored)| {
                keyframe.properties = properties
                    .iter()
                    .zip(stored)
                    .map(|(decl, value)| expand_keyframe_value(target, decl, value))
                    .collect::<Result<_>>()?;
                Ok(keyframe)
            })
            .collect::<Result<Vec<_>>>()?;
        tracing::trace!(
            element = %element_name,
            properties = properties.len(),
            keyframes = keyframes.len(),
            "timeline"
        );
        Ok(XuTimeline { element_name, properties, keyframes })
    }

    fn read_declaration(&self, r: &mut ByteReader<'_>, hierarchy: &ClassHierarchy) -> Result<XuAnimatedProperty> {
        let depth = W::read_count(r)? as usize;
        let index = W::read_count(r)? as usize;
        let class = hierarchy
            .level(depth)
            .ok_or_else(|| Error::index("class hierarchy", depth, hierarchy.len()))?;
        let mut def = class
            .properties
            .get(index)
            .ok_or_else(|| Error::index("property definitions", index, class.properties.len()))?
            .clone();
        let mut path = vec![def.clone()];
        while def.kind == PropertyKind::Object {
            if path.len() > MAX_COMPOUND_DEPTH {
                return Err(Error::invalid(format!("animated path nested deeper than {MAX_COMPOUND_DEPTH}")));
            }
            let sub = self.schema.compound_class(&def)?;
            let i = W::read_count(r)? as usize;
            def = sub
                .properties
                .get(i)
                .ok_or_else(|| Error::index("property definitions", i, sub.properties.len()))?
                .clone();
            path.push(def.clone());
        }
        let slot = if def.is_indexed() {
            let slot = W::read_count(r)?;
            if slot > MAX_ARRAY_SLOT {
                return Err(Error::ValueOutOfRange { field: "array slot", value: slot as u64 });
            }
            Some(slot)
        } else {
            None
        };
        Ok(XuAnimatedProperty { path, index: slot })
    }

    // ------------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------------

    /// Encode the DATA section. Pools must have been built from `root`.
    pub fn write_tree(&self, root: &XuObject) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        let mut shared = SharedLists::new();
        self.write_object(&mut w, root, &mut shared)?;
        tracing::debug!(
            generation = %W::GENERATION,
            bytes = w.position(),
            shared_lists = shared.property_list_count(),
            compounds = shared.compound_count(),
            "object tree encoded"
        );
        Ok(w.into_bytes())
    }

    fn write_object(&self, w: &mut ByteWriter, obj: &XuObject, shared: &mut SharedLists) -> Result<()> {
        W::write_string(w, &obj.class_name, self.values)?;

        let layout = if obj.properties.is_empty() {
            None
        } else {
            let hierarchy = self.schema.resolve_class(&obj.class_name)?;
            Some(PropertyLayout::new(&hierarchy, &obj.properties)?)
        };
        let shared_index = match &layout {
            Some(layout) if W::SHARED_LISTS => shared.find_property_list(layout.ordered()),
            _ => None,
        };
        if let (Some(timeline), true) = (obj.timelines.first(), obj.children.is_empty()) {
            return Err(Error::TimelineTargetNotFound(timeline.element_name.clone()));
        }

        let mut flags = 0u8;
        if layout.is_some() {
            flags |= if shared_index.is_some() { OBJECT_SHARED_PROPERTIES } else { OBJECT_HAS_PROPERTIES };
        }
        if !obj.children.is_empty() {
            flags |= OBJECT_HAS_CHILDREN;
        }
        if obj.has_animation() {
            flags |= OBJECT_HAS_ANIMATION;
        }
        w.write_u8(flags)?;

        match (shared_index, layout) {
            (Some(index), _) => W::write_count(w, to_u32("shared property list", index)?)?,
            (None, Some(layout)) => {
                self.write_layout(w, &layout, shared)?;
                if W::SHARED_LISTS {
                    shared.push_property_list(layout.to_owned_list());
                }
            }
            (None, None) => {}
        }

        if !obj.children.is_empty() {
            W::write_count(w, to_u32("child count", obj.children.len())?)?;
            for child in &obj.children {
                self.write_object(w, child, shared)?;
            }
        }

        if obj.has_animation() {
            W::write_count(w, to_u32("named frame count", obj.named_frames.len())?)?;
            W::write_named_frames(w, &obj.named_frames, self.values, self.animation)?;
            if !obj.children.is_empty() {
                W::write_count(w, to_u32("timeline count", obj.timelines.len())?)?;
                for timeline in &obj.timelines {
                    self.write_timeline(w, obj, timeline)?;
                }
            }
        }
        Ok(())
    }

    fn write_layout(&self, w: &mut ByteWriter, layout: &PropertyLayout<'_>, shared: &mut SharedLists) -> Result<()> {
        if W::MASKS_BASE_FIRST {
            for mask in layout.masks.iter().rev() {
                w.write_bytes(mask);
            }
        } else {
            for mask in &layout.masks {
                w.write_bytes(mask);
            }
        }
        for prop in layout.ordered() {
            self.write_property_value(w, prop, shared)?;
        }
        Ok(())
    }

    fn write_property_value(&self, w: &mut ByteWriter, prop: &XuProperty, shared: &mut SharedLists) -> Result<()> {
        match &prop.value {
            XuPropertyValue::Single(value) => self.write_element(w, &prop.definition, value, shared),
            XuPropertyValue::Indexed(values) => {
                W::write_count(w, to_u32("array length", values.len())?)?;
                for value in values {
                    self.write_element(w, &prop.definition, value, shared)?;
                }
                Ok(())
            }
        }
    }

    fn write_element(
        &self,
        w: &mut ByteWriter,
        def: &XuPropertyDefinition,
        value: &XuValue,
        shared: &mut SharedLists,
    ) -> Result<()> {
        match value {
            XuValue::Object(nested) => self.write_compound(w, def, nested, shared),
            _ => W::write_value(w, value, self.values),
        }
    }

    fn write_compound(
        &self,
        w: &mut ByteWriter,
        def: &XuPropertyDefinition,
        nested: &[XuProperty],
        shared: &mut SharedLists,
    ) -> Result<()> {
        let hierarchy = compound_hierarchy(self.schema, def)?;
        let layout = PropertyLayout::new(&hierarchy, nested)?;
        if !W::SHARED_LISTS {
            return self.write_layout(w, &layout, shared);
        }
        if let Some(index) = shared.find_compound(layout.ordered()) {
            return W::write_count(w, to_u32("shared compound", index)?);
        }
        let slot = shared.reserve_compound();
        W::write_count(w, to_u32("shared compound", slot)?)?;
        self.write_layout(w, &layout, shared)?;
        shared.fill_compound(slot, layout.to_owned_list());
        Ok(())
    }

    fn write_timeline(&self, w: &mut ByteWriter, parent: &XuObject, timeline: &XuTimeline) -> Result<()> {
        W::write_string(w, &timeline.element_name, self.values)?;
        let target = parent
            .child_by_id(&timeline.element_name)
            .ok_or_else(|| Error::TimelineTargetNotFound(timeline.element_name.clone()))?;
        let hierarchy = self.schema.resolve_class(&target.class_name)?;

        W::write_count(w, to_u32("animated property count", timeline.properties.len())?)?;
        for decl in &timeline.properties {
            for code in encode_declaration(self.schema, &hierarchy, decl)? {
                W::write_count(w, code)?;
            }
        }
        W::write_count(w, to_u32("keyframe count", timeline.keyframes.len())?)?;
        W::write_keyframes(w, timeline, self.values, self.animation)
    }
}

/// Rebuild a keyframe property from its stored leaf value.
///
/// An indexed leaf comes back as the full array: the target's own value at
/// the animated path, with only the animated slot replaced. Slots the target
/// does not define are filled with the kind's zero value.
fn expand_keyframe_value(target: &XuObject, decl: &XuAnimatedProperty, value: XuValue) -> Result<XuProperty> {
    let leaf = decl
        .leaf()
        .ok_or_else(|| Error::invalid("animated property with empty path"))?
        .clone();
    let Some(slot) = decl.index else {
        return Ok(XuProperty::new(leaf, value));
    };
    let mut slots = match target.value_at_path(&decl.path) {
        Some(XuPropertyValue::Indexed(values)) => values.clone(),
        _ => Vec::new(),
    };
    let slot = slot as usize;
    if slots.len() <= slot {
        slots.resize(slot + 1, XuValue::default_for(leaf.kind));
    }
    slots[slot] = value;
    Ok(XuProperty::indexed(leaf, slots))
}
