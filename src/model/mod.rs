//! In-memory object tree shared by the binary codec and its callers.
//!
//! - [`XuObject`] - UI element with properties, children and animation
//! - [`XuProperty`] / [`XuValue`] - Typed property values
//! - [`XuTimeline`] / [`XuKeyframe`] - Keyframe animation of children
//! - [`XuNamedFrame`] - Labelled frames with playback commands

mod object;
mod value;

pub use object::*;
pub use value::*;
