//! UI element tree: objects, named frames and timelines.

use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use super::value::{find_property, XuProperty, XuPropertyValue, XuValue};
use crate::schema::XuPropertyDefinition;
use crate::util::{Error, Result};

/// Name of the property that identifies an element to its parent's timelines.
pub const ID_PROPERTY: &str = "Id";

/// Keyframe interpolation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Interpolation {
    #[default]
    None,
    Linear,
    Ease,
}

impl Interpolation {
    /// Wire tag.
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Linear => 1,
            Self::Ease => 2,
        }
    }

    /// Parse a wire tag.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Linear),
            2 => Some(Self::Ease),
            _ => None,
        }
    }
}

/// Playback command attached to a named frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NamedFrameCommand {
    Play,
    Stop,
    GoTo,
    GoToAndPlay,
    GoToAndStop,
}

impl NamedFrameCommand {
    /// Wire tag.
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Play => 0,
            Self::Stop => 1,
            Self::GoTo => 2,
            Self::GoToAndPlay => 3,
            Self::GoToAndStop => 4,
        }
    }

    /// Parse a wire tag.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Play),
            1 => Some(Self::Stop),
            2 => Some(Self::GoTo),
            3 => Some(Self::GoToAndPlay),
            4 => Some(Self::GoToAndStop),
            _ => None,
        }
    }

    /// GoTo-family commands carry a target frame name.
    pub const fn has_target(self) -> bool {
        matches!(self, Self::GoTo | Self::GoToAndPlay | Self::GoToAndStop)
    }
}

/// Labelled frame with a playback command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XuNamedFrame {
    pub name: String,
    pub frame: u32,
    pub command: NamedFrameCommand,
    /// Present exactly when the command is GoTo-family.
    pub target: Option<String>,
}

impl XuNamedFrame {
    /// Named frame with a Play/Stop command.
    pub fn new(name: impl Into<String>, frame: u32, command: NamedFrameCommand) -> Self {
        Self { name: name.into(), frame, command, target: None }
    }

    /// Named frame with a GoTo-family command.
    pub fn goto(name: impl Into<String>, frame: u32, command: NamedFrameCommand, target: impl Into<String>) -> Self {
        Self { name: name.into(), frame, command, target: Some(target.into()) }
    }

    /// Target presence must follow the command.
    pub fn validate(&self) -> Result<()> {
        if self.command.has_target() != self.target.is_some() {
            return Err(Error::invalid(format!(
                "named frame {:?}: command {:?} {} a target",
                self.name,
                self.command,
                if self.command.has_target() { "requires" } else { "does not take" }
            )));
        }
        Ok(())
    }
}

/// A property driven by a timeline.
///
/// `path` starts at a definition of the target element's class and descends
/// through compound sub-schemas, e.g. `Fill → Gradient → StopColor`.
#[derive(Debug, Clone, PartialEq)]
pub struct XuAnimatedProperty {
    pub path: Vec<Arc<XuPropertyDefinition>>,
    /// Animated slot when the leaf definition is indexed.
    pub index: Option<u32>,
}

impl XuAnimatedProperty {
    /// Animate a scalar property of the element itself.
    pub fn new(definition: Arc<XuPropertyDefinition>) -> Self {
        Self { path: vec![definition], index: None }
    }

    /// Animate through a compound path.
    pub fn path(path: Vec<Arc<XuPropertyDefinition>>) -> Self {
        Self { path, index: None }
    }

    /// Animate one slot of an indexed leaf.
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Leaf definition that keyframe values belong to.
    pub fn leaf(&self) -> Option<&Arc<XuPropertyDefinition>> {
        self.path.last()
    }

    /// Dotted path, e.g. `Fill.Gradient.StopColor[2]`.
    pub fn display_path(&self) -> String {
        let mut out = self.path.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(".");
        if let Some(i) = self.index {
            out.push_str(&format!("[{i}]"));
        }
        out
    }
}

impl Serialize for XuAnimatedProperty {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("XuAnimatedProperty", 2)?;
        let names: Vec<&str> = self.path.iter().map(|d| d.name.as_str()).collect();
        state.serialize_field("path", &names)?;
        state.serialize_field("index", &self.index)?;
        state.end()
    }
}

/// One keyframe; `properties` runs parallel to the timeline's declarations.
///
/// The ease bytes are only stored for [`Interpolation::Ease`]. Any other
/// interpolation writes none, so they read back as zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct XuKeyframe {
    pub frame: u32,
    pub interpolation: Interpolation,
    pub ease_in: u8,
    pub ease_out: u8,
    pub ease_scale: u8,
    pub properties: Vec<XuProperty>,
}

impl XuKeyframe {
    /// Keyframe without easing.
    pub fn new(frame: u32, interpolation: Interpolation) -> Self {
        Self { frame, interpolation, ..Default::default() }
    }

    /// Ease bytes as stored on disk: zero unless the keyframe is eased.
    pub fn stored_easing(&self) -> [u8; 3] {
        match self.interpolation {
            Interpolation::Ease => [self.ease_in, self.ease_out, self.ease_scale],
            _ => [0; 3],
        }
    }

    /// Eased keyframe.
    pub fn eased(frame: u32, ease_in: u8, ease_out: u8, ease_scale: u8) -> Self {
        Self {
            frame,
            interpolation: Interpolation::Ease,
            ease_in,
            ease_out,
            ease_scale,
            properties: Vec::new(),
        }
    }
}

/// Animation of one child element.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct XuTimeline {
    /// `Id` of the animated child.
    pub element_name: String,
    pub properties: Vec<XuAnimatedProperty>,
    pub keyframes: Vec<XuKeyframe>,
}

impl XuTimeline {
    pub fn new(element_name: impl Into<String>) -> Self {
        Self { element_name: element_name.into(), ..Default::default() }
    }
}

/// A UI element and everything it owns.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct XuObject {
    /// Empty for the root sentinel.
    pub class_name: String,
    pub properties: Vec<XuProperty>,
    pub children: Vec<XuObject>,
    pub named_frames: Vec<XuNamedFrame>,
    pub timelines: Vec<XuTimeline>,
}

impl XuObject {
    /// Create an object of the given class.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self { class_name: class_name.into(), ..Default::default() }
    }

    /// Root sentinel object.
    pub fn root() -> Self {
        Self::default()
    }

    /// Add a property (builder form).
    pub fn with_property(mut self, property: XuProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Add a child (builder form).
    pub fn with_child(mut self, child: XuObject) -> Self {
        self.children.push(child);
        self
    }

    /// Add a child and return it.
    pub fn add_child(&mut self, child: XuObject) -> &mut XuObject {
        let index = self.children.len();
        self.children.push(child);
        &mut self.children[index]
    }

    /// Property by name.
    pub fn property(&self, name: &str) -> Option<&XuProperty> {
        self.properties.iter().find(|p| p.name() == name)
    }

    /// Value of the `Id` property.
    pub fn id(&self) -> Option<&str> {
        match self.property(ID_PROPERTY)?.single()? {
            XuValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Child whose `Id` equals `id`.
    pub fn child_by_id(&self, id: &str) -> Option<&XuObject> {
        self.children.iter().find(|c| c.id() == Some(id))
    }

    /// Whether the object carries named frames or timelines.
    pub fn has_animation(&self) -> bool {
        !self.named_frames.is_empty() || !self.timelines.is_empty()
    }

    /// Value at a definition path, descending through compound values.
    pub fn value_at_path(&self, path: &[Arc<XuPropertyDefinition>]) -> Option<&XuPropertyValue> {
        let (first, rest) = path.split_first()?;
        let mut current = find_property(&self.properties, first)?;
        for def in rest {
            let nested = current.single()?.as_object()?;
            current = find_property(nested, def)?;
        }
        Some(&current.value)
    }

    /// Number of objects in this subtree, including `self`.
    pub fn object_count(&self) -> usize {
        1 + self.children.iter().map(XuObject::object_count).sum::<usize>()
    }

    /// Depth-first pre-order traversal.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a XuObject)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}
