//! File-level tests: writing to disk, reading back, sniffing.

mod common;

use std::fs;

use common::*;
use tempfile::TempDir;
use xur::xur::{
    sniff_file, Generation, OpaqueSection, ReadOptions, Sniffed, VerifyMode, WriteOptions, XurReader, XurWriter,
};
use xur::{Error, ErrorKind};

#[test]
fn test_write_then_read_file() {
    let schema = schema();
    let root = scene(&schema);
    let dir = TempDir::new().unwrap();

    for generation in [Generation::V5, Generation::V8] {
        let path = dir.path().join(format!("scene_{generation}.xur"));
        XurWriter::with_options(&schema, WriteOptions::new().generation(generation))
            .write_file(&path, &root)
            .unwrap();

        for use_mmap in [true, false] {
            let options = ReadOptions::new().use_mmap(use_mmap).verify(VerifyMode::Strict);
            let doc = XurReader::with_options(&schema, options).read_file(&path).unwrap();
            assert_eq!(doc.generation, generation);
            assert_eq!(doc.root, root, "mmap={use_mmap}");
            assert_eq!(doc.header.file_size as u64, fs::metadata(&path).unwrap().len());
        }
    }
}

#[test]
fn test_convert_keeps_unknown_sections() {
    let schema = schema();
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("in.xur");
    let dst = dir.path().join("out.xur");

    XurWriter::with_options(&schema, WriteOptions::new().generation(Generation::V8))
        .write_file(&src, &scene(&schema))
        .unwrap();
    let mut doc = XurReader::new(&schema).read_file(&src).unwrap();
    assert!(doc.opaque.is_empty());
    doc.opaque.push(OpaqueSection { magic: u32::from_be_bytes(*b"XTRA"), data: vec![1, 2, 3, 4] });

    let bytes = XurWriter::with_options(&schema, WriteOptions::new().generation(Generation::V5).verify(true))
        .write_document(&doc)
        .unwrap();
    fs::write(&dst, bytes).unwrap();

    let converted = XurReader::new(&schema).read_file(&dst).unwrap();
    assert_eq!(converted.generation, Generation::V5);
    assert_eq!(converted.root, doc.root);
    assert_eq!(converted.opaque.len(), 1);
    assert_eq!(converted.opaque[0].name(), "XTRA");
    assert_eq!(converted.opaque[0].data, [1, 2, 3, 4]);
}

#[test]
fn test_sniff_written_file() {
    let schema = schema();
    let dir = TempDir::new().unwrap();

    let v5 = dir.path().join("menu.xur");
    XurWriter::with_options(&schema, WriteOptions::new().generation(Generation::V5))
        .write_file(&v5, &scene(&schema))
        .unwrap();
    assert_eq!(sniff_file(&v5).unwrap(), Sniffed::Xur(Generation::V5));

    let source = dir.path().join("menu.xui");
    fs::write(&source, "<?xml version=\"1.0\"?>\n<XuiCanvas version=\"000c\">\n</XuiCanvas>\n").unwrap();
    assert_eq!(sniff_file(&source).unwrap(), Sniffed::Xui12);

    let err = sniff_file(dir.path().join("missing.xur")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_truncated_and_padded_files() {
    let schema = schema();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("scene.xur");
    XurWriter::new(&schema).write_file(&path, &scene(&schema)).unwrap();
    let good = fs::read(&path).unwrap();

    let mut padded = good.clone();
    padded.push(0);
    fs::write(&path, &padded).unwrap();
    let err = XurReader::new(&schema).read_file(&path).unwrap_err();
    assert!(matches!(err, Error::FileSizeMismatch { actual, .. } if actual == good.len() as u64 + 1));

    fs::write(&path, &good[..10]).unwrap();
    assert!(XurReader::new(&schema).read_file(&path).is_err());

    fs::write(&path, b"").unwrap();
    assert!(XurReader::new(&schema).read_file(&path).is_err());
}
