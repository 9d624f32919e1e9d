//! Integration tests for encoding and decoding whole documents.

mod common;

use std::collections::HashSet;

use common::*;
use xur::model::{XuObject, XuProperty, XuPropertyValue, XuValue};
use xur::xur::{
    CountHeader, Generation, ReadOptions, SectionKind, VerifyMode, WriteOptions, XurReader, XurWriter,
};
use xur::Error;

fn encode(schema: &xur::schema::Schema, root: &XuObject, generation: Generation) -> Vec<u8> {
    let options = WriteOptions::new().generation(generation).verify(true);
    XurWriter::with_options(schema, options).write(root).expect("encode")
}

fn strict_reader(schema: &xur::schema::Schema) -> XurReader<'_> {
    XurReader::with_options(schema, ReadOptions::new().verify(VerifyMode::Strict).strict_strings(true))
}

#[test]
fn test_roundtrip_both_generations() {
    let schema = schema();
    let root = scene(&schema);
    for generation in [Generation::V5, Generation::V8] {
        let bytes = encode(&schema, &root, generation);
        let doc = strict_reader(&schema).read_bytes(&bytes).expect("decode");
        assert_eq!(doc.generation, generation);
        assert_eq!(doc.root, root, "{generation} round-trip changed the tree");
    }
}

#[test]
fn test_convert_between_generations() {
    let schema = schema();
    let root = scene(&schema);
    let v5 = encode(&schema, &root, Generation::V5);
    let doc = strict_reader(&schema).read_bytes(&v5).unwrap();

    let v8 = XurWriter::with_options(&schema, WriteOptions::new().generation(Generation::V8).verify(true))
        .write_document(&doc)
        .unwrap();
    let doc = strict_reader(&schema).read_bytes(&v8).unwrap();
    assert_eq!(doc.generation, Generation::V8);
    assert_eq!(doc.root, root);

    let back = XurWriter::with_options(&schema, WriteOptions::new().generation(Generation::V5))
        .write_document(&doc)
        .unwrap();
    assert_eq!(back, v5);
}

#[test]
fn test_reencode_is_stable() {
    let schema = schema();
    let root = scene(&schema);
    for generation in [Generation::V5, Generation::V8] {
        let first = encode(&schema, &root, generation);
        let doc = strict_reader(&schema).read_bytes(&first).unwrap();
        let second = encode(&schema, &doc.root, generation);
        assert_eq!(first, second, "{generation} output is not a fixed point");
    }
}

#[test]
fn test_v5_uses_only_strings_and_data() {
    let schema = schema();
    let bytes = encode(&schema, &scene(&schema), Generation::V5);
    let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
    let kinds: Vec<_> = doc.sections.entries().iter().filter_map(|e| e.kind()).collect();
    assert_eq!(kinds, [SectionKind::Strn, SectionKind::Data]);
}

#[test]
fn test_v8_pools_are_deduplicated() {
    let schema = schema();
    let bytes = encode(&schema, &scene(&schema), Generation::V8);
    let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
    let v = &doc.values;

    let strings: HashSet<&String> = v.strings.iter().collect();
    assert_eq!(strings.len(), v.strings.len());
    assert!(v.strings.iter().all(|s| !s.is_empty()));
    let floats: HashSet<u32> = v.floats.iter().map(|f| f.to_bits()).collect();
    assert_eq!(floats.len(), v.floats.len());
    let colours: HashSet<u32> = v.colours.iter().map(|c| c.to_argb()).collect();
    assert_eq!(colours.len(), v.colours.len());
    assert_eq!(v.figures.len(), 1);

    // The two fades differ only in their target, so they share one KEYD run.
    let a = &doc.root.children[0].timelines[0];
    let b = &doc.root.children[0].timelines[1];
    assert_eq!(a.keyframes, b.keyframes);
    assert_eq!(doc.animation.keyframes.len(), 2 + 2 + 2);
}

#[test]
fn test_every_pool_index_resolves() {
    let schema = schema();
    let bytes = encode(&schema, &scene(&schema), Generation::V8);
    let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
    let keyp = doc.animation.keyframe_values.len();
    for d in &doc.animation.keyframes {
        assert!((d.keyp_base as usize) < keyp);
    }
    for d in &doc.animation.named_frames {
        assert!(doc.values.strings.resolve(d.name).is_ok());
        assert!(doc.values.strings.resolve(d.target).is_ok());
    }
}

#[test]
fn test_count_header_soundness() {
    let schema = schema();
    for generation in [Generation::V5, Generation::V8] {
        let bytes = encode(&schema, &scene(&schema), generation);
        let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
        let computed = CountHeader::compute(&doc.root, &schema, generation, &doc.animation).unwrap();
        assert_eq!(doc.counts, Some(computed));
        assert_eq!(computed.objects, 8);
        assert_eq!(computed.objects_with_children, 2);
        assert_eq!(computed.timelines, 4);
        // V8 counts KEYD entries, where the two fades share a run.
        let keyframe_data = if generation == Generation::V5 { 8 } else { 6 };
        assert_eq!(computed.keyframe_data, keyframe_data);
    }
}

#[test]
fn test_v8_shared_lists_counted() {
    let schema = schema();
    let bytes = encode(&schema, &scene(&schema), Generation::V8);
    let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
    let counts = doc.counts.unwrap();
    // canvas, scene, two texts, figure, image, spacer (the second spacer is shared)
    assert_eq!(counts.shared_property_lists, 7);
    // fill, gradient, stroke
    assert_eq!(counts.shared_compound_lists, 3);
    assert_eq!(counts.shared_compound_properties, 3 + 4 + 2);
}

fn float_bits(value: Option<&XuValue>) -> u32 {
    match value {
        Some(XuValue::Float(v)) => v.to_bits(),
        other => panic!("float expected, got {other:?}"),
    }
}

/// First gradient stop position of a figure's fill.
fn first_stop_pos(figure: &XuObject) -> u32 {
    let fill = figure.property("Fill").and_then(XuProperty::single).and_then(XuValue::as_object).unwrap();
    let gradient = fill.iter().find(|p| p.name() == "Gradient").and_then(XuProperty::single).unwrap();
    let stops = gradient.as_object().unwrap().iter().find(|p| p.name() == "StopPos").unwrap();
    float_bits(stops.slots().and_then(|s| s.first()))
}

#[test]
fn test_signed_zero_survives_sharing() {
    let schema = schema();
    let group = |width: f32| element(&schema, "XuiGroup", vec![("Width", XuValue::Float(width))]);
    let figure = |name: &str, stop: f32| {
        let g = "XuiFigureFillGradient";
        let gradient = XuValue::Object(vec![
            prop(&schema, g, "Radial", XuValue::Bool(false)),
            prop(&schema, g, "NumStops", XuValue::Integer(2)),
            XuProperty::indexed(def(&schema, g, "StopPos"), vec![XuValue::Float(stop), XuValue::Float(1.0)]),
            XuProperty::indexed(def(&schema, g, "StopColor"), vec![colour(0xFF00_0000), colour(0xFFFF_FFFF)]),
        ]);
        let fill = XuValue::Object(vec![
            prop(&schema, "XuiFigureFill", "FillType", XuValue::Integer(2)),
            prop(&schema, "XuiFigureFill", "Gradient", gradient),
        ]);
        element(&schema, "XuiFigure", vec![("Id", id(name)), ("Fill", fill)])
    };
    let root = XuObject::new("XuiGroup")
        .with_child(group(0.0))
        .with_child(group(-0.0))
        .with_child(figure("a", 0.0))
        .with_child(figure("b", -0.0));

    for generation in [Generation::V5, Generation::V8] {
        let bytes = encode(&schema, &root, generation);
        let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
        let kids = &doc.root.children;
        let width = |i: usize| float_bits(kids[i].property("Width").and_then(XuProperty::single));
        assert_eq!(width(0), 0.0f32.to_bits(), "{generation}");
        assert_eq!(width(1), (-0.0f32).to_bits(), "{generation}");
        assert_eq!(first_stop_pos(&kids[2]), 0.0f32.to_bits(), "{generation}");
        assert_eq!(first_stop_pos(&kids[3]), (-0.0f32).to_bits(), "{generation}");
    }

    let bytes = encode(&schema, &root, Generation::V8);
    let counts = strict_reader(&schema).read_bytes(&bytes).unwrap().counts.unwrap();
    // Two fills and two gradients, none shared.
    assert_eq!(counts.shared_compound_lists, 4);
}

#[test]
fn test_indexed_partial_animation() {
    let schema = schema();
    let root = scene(&schema);
    let bytes = encode(&schema, &root, Generation::V8);
    let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();

    let tl = &doc.root.children[0].timelines[2];
    assert_eq!(tl.element_name, "bar");
    let slots: Vec<_> = tl.properties.iter().map(|p| p.index).collect();
    assert_eq!(slots, [Some(2), Some(5)]);
    assert_eq!(tl.properties[0].display_path(), "Fill.Gradient.StopColor[2]");

    let base = stop_colours();
    let frame_45 = &tl.keyframes[1];
    for (prop, animated) in frame_45.properties.iter().zip([2usize, 5]) {
        let XuPropertyValue::Indexed(values) = &prop.value else {
            panic!("indexed keyframe value expected");
        };
        assert_eq!(values.len(), 6);
        for (i, v) in values.iter().enumerate() {
            if i == animated {
                assert_eq!(v, &colour(0xFF00_FF00));
            } else {
                assert_eq!(v, &base[i], "slot {i} must keep the base value");
            }
        }
    }
}

#[test]
fn test_indexed_slot_without_base_value() {
    let schema = schema();
    let stop_pos = def(&schema, "XuiFigureFillGradient", "StopPos");
    let mut figure = element(&schema, "XuiFigure", vec![("Id", id("bare"))]);
    figure.properties.push(prop(&schema, "XuiFigure", "Closed", XuValue::Bool(false)));

    let mut tl = xur::model::XuTimeline::new("bare");
    tl.properties.push(
        xur::model::XuAnimatedProperty::path(vec![
            def(&schema, "XuiFigure", "Fill"),
            def(&schema, "XuiFigureFill", "Gradient"),
            stop_pos.clone(),
        ])
        .with_index(3),
    );
    let mut kf = xur::model::XuKeyframe::new(0, xur::model::Interpolation::Linear);
    kf.properties.push(XuProperty::indexed(
        stop_pos,
        vec![XuValue::Float(0.0), XuValue::Float(0.0), XuValue::Float(0.0), XuValue::Float(0.75)],
    ));
    tl.keyframes.push(kf);

    let mut root = XuObject::new("XuiGroup").with_child(figure);
    root.timelines.push(tl);
    for generation in [Generation::V5, Generation::V8] {
        let bytes = encode(&schema, &root, generation);
        let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
        assert_eq!(doc.root, root);
    }
}

#[test]
fn test_ease_bytes_only_kept_when_eased() {
    let schema = schema();
    let mut main = element(&schema, "XuiScene", vec![("Id", id("main"))]).with_child(text(&schema, "title", "x"));
    let mut tl = fade_timeline(&schema, "title");
    tl.keyframes[0].ease_in = 40;
    tl.keyframes[0].ease_scale = 5;
    main.timelines.push(tl);

    for generation in [Generation::V5, Generation::V8] {
        let bytes = encode(&schema, &main, generation);
        let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
        let kf = &doc.root.timelines[0].keyframes[0];
        assert_eq!(kf.interpolation, xur::model::Interpolation::Linear);
        assert_eq!([kf.ease_in, kf.ease_out, kf.ease_scale], [0, 0, 0], "{generation}");
        assert_eq!(kf.stored_easing(), main.timelines[0].keyframes[0].stored_easing());
    }
}

#[test]
fn test_minimal_tree() {
    let schema = schema();
    let root = XuObject::new("Root").with_child(XuObject::new("Child"));
    let bytes = encode(&schema, &root, Generation::V8);
    let doc = strict_reader(&schema).read_bytes(&bytes).unwrap();
    let strings: Vec<&str> = doc.values.strings.iter().map(String::as_str).collect();
    assert_eq!(strings, ["Root", "Child"]);
    assert_eq!(doc.root.children.len(), 1);
    assert_eq!(doc.root.children[0].class_name, "Child");
    let counts = doc.counts.unwrap();
    assert_eq!(counts.objects, 2);
    assert_eq!(counts.objects_with_children, 1);
    let kinds: Vec<_> = doc.sections.entries().iter().filter_map(|e| e.kind()).collect();
    assert_eq!(kinds, [SectionKind::Strn, SectionKind::Data]);
}

#[test]
fn test_invalid_bool_byte() {
    let schema = schema();
    let root = element(&schema, "XuiCanvas", vec![("ClipChildren", XuValue::Bool(true))]);
    let options = WriteOptions::new().write_count_header(false);
    let mut bytes = XurWriter::with_options(&schema, options).write(&root).unwrap();
    // DATA is last and the bool is its last byte.
    let last = bytes.len() - 1;
    assert_eq!(bytes[last], 1);
    bytes[last] = 2;
    let err = XurReader::new(&schema).read_bytes(&bytes).unwrap_err();
    assert!(matches!(err, Error::InvalidBool { value: 2, .. }));
}

#[test]
fn test_write_errors() {
    let schema = schema();

    let mut orphan = XuObject::new("XuiGroup").with_child(text(&schema, "title", "x"));
    orphan.timelines.push(fade_timeline(&schema, "missing"));
    let err = XurWriter::new(&schema).write(&orphan).unwrap_err();
    assert!(matches!(err, Error::TimelineTargetNotFound(ref id) if id == "missing"));

    let mut wrong = icon(&schema);
    wrong.properties.push(prop(&schema, "XuiText", "PointSize", XuValue::Float(9.0)));
    let err = XurWriter::new(&schema).write(&wrong).unwrap_err();
    assert!(matches!(err, Error::PropertyNotFound { .. }));

    let unknown = element(&schema, "XuiGroup", vec![]).with_child(XuObject::new("NoSuchClass"));
    assert!(XurWriter::new(&schema).write(&unknown).is_ok());
    let mut unknown = unknown;
    unknown.children[0].properties.push(prop(&schema, "XuiGroup", "Width", XuValue::Float(1.0)));
    let err = XurWriter::new(&schema).write(&unknown).unwrap_err();
    assert!(matches!(err, Error::ClassNotFound(ref c) if c == "NoSuchClass"));
}
