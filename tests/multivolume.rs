//! Multi-volume archive integration tests.
//!
//! These tests verify:
//! - A split archive reads identically to its unsplit original
//! - Files spanning a volume boundary extract intact
//! - Part discovery and ordering follow each tool's naming scheme

mod common;

use arcfs::volume::MultiVolumeReader;
use arcfs::{
    ArchiveArgs, ArchiveInnerArgs, ExtractOptions, NoProgress, Tool, ToolRegistry, Volume,
    sevenzip::SevenZipTool, zipfile::ZipTool,
};
use std::io::{Read, Seek, SeekFrom};

/// Data size that spans every volume when split into a handful of parts.
const SPANNING_DATA_SIZE: usize = 50_000;

fn seven_zip_name(index: usize) -> String {
    format!("data.7z.{index:03}")
}

fn sample_members(big: &[u8]) -> Vec<common::Member<'_>> {
    vec![
        ("big.bin", Some(big)),
        ("dir/small.txt", Some(b"small".as_slice())),
        ("dir/empty/", None),
    ]
}

#[test]
fn test_7z_split_matches_single() {
    let big = common::payload(7, SPANNING_DATA_SIZE);
    let archive = common::seven_zip(&sample_members(&big), None);
    let tool = SevenZipTool::new(ExtractOptions::default()).unwrap();

    let single = vec![Volume::from_bytes("data.7z", archive.clone())];
    let reference = tool.get_meta(&single, &ArchiveArgs::default()).unwrap();

    for parts in [2, 3, 7] {
        let volumes = common::split(&archive, parts, seven_zip_name);
        assert_eq!(volumes.len(), parts);

        let meta = tool.get_meta(&volumes, &ArchiveArgs::default()).unwrap();
        assert_eq!(meta.tree, reference.tree, "{parts} parts");

        let stream = tool
            .extract(&volumes, &ArchiveInnerArgs::new("", "big.bin"))
            .unwrap();
        assert_eq!(stream.size, big.len() as u64);
        assert_eq!(stream.into_bytes().unwrap(), big, "{parts} parts");
    }
}

#[test]
fn test_7z_split_decompress() {
    let big = common::payload(11, SPANNING_DATA_SIZE);
    let archive = common::seven_zip(&sample_members(&big), None);
    let volumes = common::split(&archive, 4, seven_zip_name);
    let out = tempfile::tempdir().unwrap();

    SevenZipTool::new(ExtractOptions::default())
        .unwrap()
        .decompress(&volumes, out.path(), &ArchiveInnerArgs::new("", "/"), &mut NoProgress)
        .unwrap();
    assert_eq!(std::fs::read(out.path().join("big.bin")).unwrap(), big);
    assert_eq!(
        std::fs::read(out.path().join("dir/small.txt")).unwrap(),
        b"small"
    );
    assert!(out.path().join("dir/empty").is_dir());
}

#[test]
fn test_zip_split_matches_single() {
    let big = common::payload(3, SPANNING_DATA_SIZE);
    let archive = common::zip_archive(&sample_members(&big), None);
    let volumes = common::split(&archive, 3, |i| format!("data.z{i:02}"));

    let stream = ZipTool::new(ExtractOptions::default())
        .extract(&volumes, &ArchiveInnerArgs::new("", "big.bin"))
        .unwrap();
    assert_eq!(stream.into_bytes().unwrap(), big);
}

#[test]
fn test_joined_reader_seeks_across_boundaries() {
    let data = common::payload(5, 1000);
    let volumes = common::split(&data, 3, |i| format!("p{i}"));
    let mut reader = MultiVolumeReader::new(&volumes);
    assert_eq!(reader.total_size(), 1000);

    // 334-byte chunks: offset 330 starts in the first volume and ends in the second
    reader.seek(SeekFrom::Start(330)).unwrap();
    let mut buf = [0u8; 10];
    reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, &data[330..340]);

    reader.seek(SeekFrom::End(-5)).unwrap();
    let mut tail = Vec::new();
    reader.read_to_end(&mut tail).unwrap();
    assert_eq!(tail, &data[995..]);
}

#[test]
fn test_registry_schemes_discover_parts() {
    let registry = ToolRegistry::with_defaults(ExtractOptions::default()).unwrap();

    let (scheme, tool) = registry.lookup_name("movie.7z.001").unwrap();
    assert_eq!(tool.name(), "7z");
    let scheme = scheme.unwrap();
    let present = ["movie.7z.001", "movie.7z.002", "movie.7z.003"];
    let found = scheme.discover("movie", |name| present.contains(&name));
    assert_eq!(found, present);

    let shuffled = ["movie.7z.003", "readme.txt", "movie.7z.001", "movie.7z.002"];
    assert_eq!(scheme.order_parts(&shuffled), present);
}

#[cfg(feature = "rar")]
#[test]
fn test_registry_rar_scheme() {
    let registry = ToolRegistry::with_defaults(ExtractOptions::default()).unwrap();
    let (scheme, tool) = registry.lookup_name("show.part1.rar").unwrap();
    assert_eq!(tool.name(), "rar");
    let scheme = scheme.unwrap();
    assert_eq!(scheme.part_name("show", 2), "show.part2.rar");
    assert_eq!(
        scheme.order_parts(&["show.part10.rar", "show.part2.rar", "show.part1.rar"]),
        ["show.part1.rar", "show.part2.rar", "show.part10.rar"]
    );
}

#[test]
fn test_plain_tool_has_no_scheme() {
    let registry = ToolRegistry::with_defaults(ExtractOptions::default()).unwrap();
    let (scheme, tool) = registry.lookup_name("data.zip").unwrap();
    assert!(scheme.is_none());
    assert!(tool.accepted_multipart_extensions().is_empty());
    let _: &dyn Tool = tool.as_ref();
}
