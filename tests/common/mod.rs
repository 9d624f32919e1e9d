//! Scene builders shared by the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use xur::model::{
    Interpolation, NamedFrameCommand, XuAnimatedProperty, XuBezierPoint, XuColour, XuFigure, XuKeyframe,
    XuNamedFrame, XuObject, XuPoint, XuProperty, XuQuaternion, XuTimeline, XuValue, XuVector,
};
use xur::schema::{Schema, SchemaProvider, XuPropertyDefinition};

pub fn schema() -> Schema {
    Schema::builtin().expect("built-in schema")
}

/// Definition `name` as seen from `class` (searching base classes too).
pub fn def(schema: &Schema, class: &str, name: &str) -> Arc<XuPropertyDefinition> {
    schema
        .resolve_class(class)
        .expect("class")
        .property(name)
        .unwrap_or_else(|| panic!("{class}.{name}"))
        .clone()
}

pub fn prop(schema: &Schema, class: &str, name: &str, value: XuValue) -> XuProperty {
    XuProperty::new(def(schema, class, name), value)
}

pub fn element(schema: &Schema, class: &str, props: Vec<(&str, XuValue)>) -> XuObject {
    let mut obj = XuObject::new(class);
    for (name, value) in props {
        obj.properties.push(prop(schema, class, name, value));
    }
    obj
}

pub fn id(s: &str) -> XuValue {
    XuValue::String(s.to_string())
}

pub fn colour(argb: u32) -> XuValue {
    XuValue::Colour(XuColour::from_argb(argb))
}

pub fn stop_colours() -> Vec<XuValue> {
    [0xFF00_0000, 0xFF11_1111, 0xFF22_2222, 0xFF33_3333, 0xFF44_4444, 0xFF55_5555]
        .into_iter()
        .map(colour)
        .collect()
}

pub fn figure_points() -> XuFigure {
    let p = |x: f32, y: f32| XuBezierPoint {
        point: XuPoint::new(x, y),
        control1: XuPoint::new(x - 1.0, y),
        control2: XuPoint::new(x + 1.0, y),
    };
    XuFigure { bounds: XuPoint::new(100.0, 20.0), points: vec![p(0.0, 0.0), p(100.0, 0.0), p(100.0, 20.0)] }
}

/// Gradient compound with the given stop colours.
pub fn gradient(schema: &Schema, stops: Vec<XuValue>) -> XuValue {
    let g = "XuiFigureFillGradient";
    let count = stops.len();
    XuValue::Object(vec![
        prop(schema, g, "Radial", XuValue::Bool(false)),
        prop(schema, g, "NumStops", XuValue::Integer(count as i32)),
        XuProperty::indexed(def(schema, g, "StopPos"), (0..count).map(|i| XuValue::Float(i as f32 / 5.0)).collect()),
        XuProperty::indexed(def(schema, g, "StopColor"), stops),
    ])
}

pub fn fill(schema: &Schema, stops: Vec<XuValue>) -> XuValue {
    let f = "XuiFigureFill";
    XuValue::Object(vec![
        prop(schema, f, "FillType", XuValue::Integer(2)),
        prop(schema, f, "FillColor", colour(0xFF80_4020)),
        prop(schema, f, "Gradient", gradient(schema, stops)),
    ])
}

pub fn stroke(schema: &Schema) -> XuValue {
    let s = "XuiFigureStroke";
    XuValue::Object(vec![
        prop(schema, s, "LineWidth", XuValue::Float(2.0)),
        prop(schema, s, "LineColor", colour(0xFFFF_FFFF)),
    ])
}

pub fn text(schema: &Schema, name: &str, caption: &str) -> XuObject {
    element(
        schema,
        "XuiText",
        vec![
            ("Id", id(name)),
            ("Width", XuValue::Float(200.0)),
            ("Height", XuValue::Float(24.0)),
            ("Position", XuValue::Vector(XuVector::new(10.0, 20.0, 0.0))),
            ("Opacity", XuValue::Float(1.0)),
            ("Text", id(caption)),
            ("TextColor", colour(0xFFEE_EEEE)),
            ("PointSize", XuValue::Float(14.0)),
        ],
    )
}

/// A figure with a filled gradient of six stops.
pub fn bar(schema: &Schema) -> XuObject {
    element(
        schema,
        "XuiFigure",
        vec![
            ("Id", id("bar")),
            ("Width", XuValue::Float(100.0)),
            ("Fill", fill(schema, stop_colours())),
            ("Stroke", stroke(schema)),
            ("Closed", XuValue::Bool(true)),
            ("Points", XuValue::Custom(figure_points())),
        ],
    )
}

pub fn icon(schema: &Schema) -> XuObject {
    element(
        schema,
        "XuiImage",
        vec![
            ("Id", id("icon")),
            ("Scale", XuValue::Vector(XuVector::new(1.0, 1.0, 1.0))),
            ("Rotation", XuValue::Quaternion(XuQuaternion::IDENTITY)),
            ("ColorWriteFlags", XuValue::Unsigned(0xF)),
            ("BlendMode", XuValue::Integer(-1)),
            ("ImagePath", id("icons/star.png")),
        ],
    )
}

pub fn spacer(schema: &Schema) -> XuObject {
    element(schema, "XuiGroup", vec![("Width", XuValue::Float(8.0)), ("Show", XuValue::Bool(false))])
}

fn keyframe(frame: u32, interpolation: Interpolation, properties: Vec<XuProperty>) -> XuKeyframe {
    let mut kf = XuKeyframe::new(frame, interpolation);
    kf.properties = properties;
    kf
}

/// Animate `slots` of the bar's gradient stop colours.
pub fn stop_colour_timeline(schema: &Schema, slots: &[u32]) -> XuTimeline {
    let path = vec![
        def(schema, "XuiFigure", "Fill"),
        def(schema, "XuiFigureFill", "Gradient"),
        def(schema, "XuiFigureFillGradient", "StopColor"),
    ];
    let leaf = path[2].clone();
    let mut tl = XuTimeline::new("bar");
    for &slot in slots {
        tl.properties.push(XuAnimatedProperty::path(path.clone()).with_index(slot));
    }
    for (frame, argb) in [(0, 0xFF00_00FF), (45, 0xFF00_FF00)] {
        let props = slots
            .iter()
            .map(|&slot| {
                let mut stops = stop_colours();
                stops[slot as usize] = colour(argb);
                XuProperty::indexed(leaf.clone(), stops)
            })
            .collect();
        let mut kf = keyframe(frame, Interpolation::Ease, props);
        kf.ease_in = 10;
        kf.ease_out = 90;
        kf.ease_scale = 50;
        tl.keyframes.push(kf);
    }
    tl
}

pub fn fade_timeline(schema: &Schema, target: &str) -> XuTimeline {
    let opacity = def(schema, "XuiText", "Opacity");
    let position = def(schema, "XuiText", "Position");
    let mut tl = XuTimeline::new(target);
    tl.properties.push(XuAnimatedProperty::new(opacity.clone()));
    tl.properties.push(XuAnimatedProperty::new(position.clone()));
    for (frame, alpha, x) in [(0, 0.0, 10.0), (30, 1.0, 40.0)] {
        tl.keyframes.push(keyframe(
            frame,
            Interpolation::Linear,
            vec![
                XuProperty::new(opacity.clone(), XuValue::Float(alpha)),
                XuProperty::new(position.clone(), XuValue::Vector(XuVector::new(x, 20.0, 0.0))),
            ],
        ));
    }
    tl
}

pub fn spin_timeline(schema: &Schema) -> XuTimeline {
    let rotation = def(schema, "XuiImage", "Rotation");
    let mut tl = XuTimeline::new("icon");
    tl.properties.push(XuAnimatedProperty::new(rotation.clone()));
    for (frame, w) in [(0, 1.0), (60, 0.0)] {
        tl.keyframes.push(keyframe(
            frame,
            Interpolation::None,
            vec![XuProperty::new(rotation.clone(), XuValue::Quaternion(XuQuaternion::new(0.0, 0.0, 1.0 - w, w)))],
        ));
    }
    tl
}

/// Canvas -> scene -> {texts, figure, image, spacers}, animated.
pub fn scene(schema: &Schema) -> XuObject {
    let mut main = element(schema, "XuiScene", vec![("Id", id("main")), ("DefaultFocus", id("title"))]);
    main.children.push(text(schema, "title", "Hello"));
    main.children.push(text(schema, "subtitle", "World"));
    main.children.push(bar(schema));
    main.children.push(icon(schema));
    main.children.push(spacer(schema));
    main.children.push(spacer(schema));

    main.named_frames.push(XuNamedFrame::new("intro", 0, NamedFrameCommand::Play));
    main.named_frames.push(XuNamedFrame::goto("loop", 60, NamedFrameCommand::GoToAndPlay, "intro"));
    main.named_frames.push(XuNamedFrame::new("end", 90, NamedFrameCommand::Stop));

    main.timelines.push(fade_timeline(schema, "title"));
    main.timelines.push(fade_timeline(schema, "subtitle"));
    main.timelines.push(stop_colour_timeline(schema, &[2, 5]));
    main.timelines.push(spin_timeline(schema));

    element(
        schema,
        "XuiCanvas",
        vec![("Id", id("canvas")), ("Width", XuValue::Float(1280.0)), ("Height", XuValue::Float(720.0))],
    )
    .with_child(main)
}
