//! Count header: redundant structural counters recomputed from the tree.
//!
//! The stored header is never trusted for decoding. It is compared against
//! an independent walk of the decoded tree (and the KEYP/KEYD/NAME pools) to
//! catch codec bugs on either side.

use serde::Serialize;

use super::animation::AnimationPools;
use super::codec::{compound_hierarchy, encode_declaration, PropertyLayout, SharedLists};
use super::format::Generation;
use super::stream::{to_u32, ByteReader, ByteWriter};
use crate::model::{XuObject, XuProperty, XuValue};
use crate::schema::SchemaProvider;
use crate::util::{Error, Result};

/// One counter of the count header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountField {
    Objects,
    Properties,
    SharedPropertyLists,
    SharedCompoundLists,
    SharedCompoundProperties,
    KeyframePropertyClassDepth,
    TimelinePropertyClassDepth,
    Timelines,
    KeyframeProperties,
    KeyframeData,
    NamedFrames,
    ObjectsWithChildren,
}

impl CountField {
    /// V5 on-disk order.
    pub const V5_ORDER: [CountField; 9] = [
        Self::Objects,
        Self::Properties,
        Self::Timelines,
        Self::TimelinePropertyClassDepth,
        Self::KeyframePropertyClassDepth,
        Self::KeyframeProperties,
        Self::KeyframeData,
        Self::NamedFrames,
        Self::ObjectsWithChildren,
    ];

    /// V8 on-disk order.
    pub const V8_ORDER: [CountField; 12] = [
        Self::Objects,
        Self::Properties,
        Self::SharedPropertyLists,
        Self::SharedCompoundLists,
        Self::SharedCompoundProperties,
        Self::KeyframePropertyClassDepth,
        Self::TimelinePropertyClassDepth,
        Self::Timelines,
        Self::KeyframeProperties,
        Self::KeyframeData,
        Self::NamedFrames,
        Self::ObjectsWithChildren,
    ];

    /// Fields stored by `generation`, in file order.
    pub fn order(generation: Generation) -> &'static [CountField] {
        match generation {
            Generation::V5 => &Self::V5_ORDER,
            Generation::V8 => &Self::V8_ORDER,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Objects => "objects",
            Self::Properties => "properties",
            Self::SharedPropertyLists => "shared_property_lists",
            Self::SharedCompoundLists => "shared_compound_lists",
            Self::SharedCompoundProperties => "shared_compound_properties",
            Self::KeyframePropertyClassDepth => "keyframe_property_class_depth",
            Self::TimelinePropertyClassDepth => "timeline_property_class_depth",
            Self::Timelines => "timelines",
            Self::KeyframeProperties => "keyframe_properties",
            Self::KeyframeData => "keyframe_data",
            Self::NamedFrames => "named_frames",
            Self::ObjectsWithChildren => "objects_with_children",
        }
    }
}

/// Structural counters of one file. Fields a generation does not store stay 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CountHeader {
    pub objects: u32,
    pub properties: u32,
    pub shared_property_lists: u32,
    pub shared_compound_lists: u32,
    pub shared_compound_properties: u32,
    pub keyframe_property_class_depth: u32,
    pub timeline_property_class_depth: u32,
    pub timelines: u32,
    pub keyframe_properties: u32,
    pub keyframe_data: u32,
    pub named_frames: u32,
    pub objects_with_children: u32,
}

impl CountHeader {
    pub fn get(&self, field: CountField) -> u32 {
        match field {
            CountField::Objects => self.objects,
            CountField::Properties => self.properties,
            CountField::SharedPropertyLists => self.shared_property_lists,
            CountField::SharedCompoundLists => self.shared_compound_lists,
            CountField::SharedCompoundProperties => self.shared_compound_properties,
            CountField::KeyframePropertyClassDepth => self.keyframe_property_class_depth,
            CountField::TimelinePropertyClassDepth => self.timeline_property_class_depth,
            CountField::Timelines => self.timelines,
            CountField::KeyframeProperties => self.keyframe_properties,
            CountField::KeyframeData => self.keyframe_data,
            CountField::NamedFrames => self.named_frames,
            CountField::ObjectsWithChildren => self.objects_with_children,
        }
    }

    fn get_mut(&mut self, field: CountField) -> &mut u32 {
        match field {
            CountField::Objects => &mut self.objects,
            CountField::Properties => &mut self.properties,
            CountField::SharedPropertyLists => &mut self.shared_property_lists,
            CountField::SharedCompoundLists => &mut self.shared_compound_lists,
            CountField::SharedCompoundProperties => &mut self.shared_compound_properties,
            CountField::KeyframePropertyClassDepth => &mut self.keyframe_property_class_depth,
            CountField::TimelinePropertyClassDepth => &mut self.timeline_property_class_depth,
            CountField::Timelines => &mut self.timelines,
            CountField::KeyframeProperties => &mut self.keyframe_properties,
            CountField::KeyframeData => &mut self.keyframe_data,
            CountField::NamedFrames => &mut self.named_frames,
            CountField::ObjectsWithChildren => &mut self.objects_with_children,
        }
    }

    /// `(name, value)` pairs in file order.
    pub fn fields(&self, generation: Generation) -> Vec<(&'static str, u32)> {
        CountField::order(generation).iter().map(|&f| (f.name(), self.get(f))).collect()
    }

    /// Read the stored header (V5 u32 BE, V8 packed).
    pub fn read(r: &mut ByteReader<'_>, generation: Generation) -> Result<Self> {
        let mut counts = Self::default();
        for &field in CountField::order(generation) {
            *counts.get_mut(field) = match generation {
                Generation::V5 => r.read_u32()?,
                Generation::V8 => r.read_packed()?,
            };
        }
        Ok(counts)
    }

    pub fn write(&self, w: &mut ByteWriter, generation: Generation) -> Result<()> {
        for &field in CountField::order(generation) {
            match generation {
                Generation::V5 => w.write_u32(self.get(field))?,
                Generation::V8 => w.write_packed(self.get(field))?,
            }
        }
        Ok(())
    }

    /// Fields where `self` (stored) disagrees with `computed`, in file order.
    pub fn mismatches(&self, computed: &CountHeader, generation: Generation) -> Vec<(CountField, u32, u32)> {
        CountField::order(generation)
            .iter()
            .filter(|&&f| self.get(f) != computed.get(f))
            .map(|&f| (f, self.get(f), computed.get(f)))
            .collect()
    }

    /// Fail on the first field where stored and computed counts differ.
    pub fn verify(&self, computed: &CountHeader, generation: Generation) -> Result<()> {
        match self.mismatches(computed, generation).first() {
            Some(&(field, stored, computed)) => Err(Error::CountMismatch { field: field.name(), stored, computed }),
            None => Ok(()),
        }
    }

    /// Recompute every counter from a tree and the animation pools it was
    /// written with (or read from).
    pub fn compute(
        root: &XuObject,
        schema: &dyn SchemaProvider,
        generation: Generation,
        animation: &AnimationPools,
    ) -> Result<Self> {
        let mut walk = CountWalk {
            schema,
            generation,
            shared: SharedLists::new(),
            totals: Totals::default(),
        };
        walk.object(root)?;
        let t = walk.totals;

        let mut counts = Self {
            objects: to_u32("objects", t.objects)?,
            timelines: to_u32("timelines", t.timelines)?,
            keyframe_property_class_depth: to_u32("keyframe property class depth", t.keyframe_class_depth)?,
            timeline_property_class_depth: to_u32("timeline property class depth", t.timeline_class_depth)?,
            objects_with_children: to_u32("objects with children", t.objects_with_children)?,
            ..Self::default()
        };
        match generation {
            Generation::V5 => {
                counts.properties = to_u32("properties", t.properties)?;
                counts.keyframe_properties = to_u32("keyframe properties", t.keyframe_values)?;
                counts.keyframe_data = to_u32("keyframe data", t.keyframes)?;
                counts.named_frames = to_u32("named frames", t.named_frames)?;
            }
            Generation::V8 => {
                let shared = &walk.shared;
                counts.properties = to_u32("properties", shared.property_count())?;
                counts.shared_property_lists = to_u32("shared property lists", shared.property_list_count())?;
                counts.shared_compound_lists = to_u32("shared compound lists", shared.compound_count())?;
                counts.shared_compound_properties =
                    to_u32("shared compound properties", shared.compound_property_count())?;
                counts.keyframe_properties = to_u32("keyframe properties", animation.keyframe_values.len())?;
                counts.keyframe_data = to_u32("keyframe data", animation.keyframes.len())?;
                counts.named_frames = to_u32("named frames", animation.named_frames.len())?;
            }
        }
        tracing::debug!(?counts, %generation, "count header computed");
        Ok(counts)
    }
}

#[derive(Default)]
struct Totals {
    objects: usize,
    objects_with_children: usize,
    properties: usize,
    timelines: usize,
    keyframe_class_depth: usize,
    timeline_class_depth: usize,
    keyframe_values: usize,
    keyframes: usize,
    named_frames: usize,
}

/// Pre-order walk mirroring the DATA write order, so shared lists are
/// discovered in the same sequence the writer emits them.
struct CountWalk<'a> {
    schema: &'a dyn SchemaProvider,
    generation: Generation,
    shared: SharedLists,
    totals: Totals,
}

impl CountWalk<'_> {
    fn object(&mut self, obj: &XuObject) -> Result<()> {
        let t = &mut self.totals;
        t.objects += 1;
        t.properties += obj.properties.len();
        t.named_frames += obj.named_frames.len();
        if !obj.children.is_empty() {
            t.objects_with_children += 1;
        }

        if self.generation == Generation::V8 && !obj.properties.is_empty() {
            let hierarchy = self.schema.resolve_class(&obj.class_name)?;
            let layout = PropertyLayout::new(&hierarchy, &obj.properties)?;
            if self.shared.find_property_list(layout.ordered()).is_none() {
                self.compounds_in(layout.ordered())?;
                self.shared.push_property_list(layout.to_owned_list());
            }
        }

        for child in &obj.children {
            self.object(child)?;
        }

        for timeline in &obj.timelines {
            let target = obj
                .child_by_id(&timeline.element_name)
                .ok_or_else(|| Error::TimelineTargetNotFound(timeline.element_name.clone()))?;
            let hierarchy = self.schema.resolve_class(&target.class_name)?;
            let t = &mut self.totals;
            t.timelines += 1;
            t.keyframes += timeline.keyframes.len();
            t.keyframe_values += timeline.keyframes.len() * timeline.properties.len();
            for decl in &timeline.properties {
                let codes = encode_declaration(self.schema, &hierarchy, decl)?;
                t.keyframe_class_depth += codes[0] as usize + 1;
                t.timeline_class_depth += decl.path.len();
            }
        }
        Ok(())
    }

    fn compounds_in(&mut self, props: &[&XuProperty]) -> Result<()> {
        for prop in props {
            for value in prop.value.values() {
                if let XuValue::Object(nested) = value {
                    let hierarchy = compound_hierarchy(self.schema, &prop.definition)?;
                    let layout = PropertyLayout::new(&hierarchy, nested)?;
                    if self.shared.find_compound(layout.ordered()).is_none() {
                        let slot = self.shared.reserve_compound();
                        self.compounds_in(layout.ordered())?;
                        self.shared.fill_compound(slot, layout.to_owned_list());
                    }
                }
            }
        }
        Ok(())
    }
}
