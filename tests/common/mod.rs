//! Shared test utilities for integration tests.
//!
//! Archive builders for every supported format, producing in-memory
//! [`Volume`]s.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use arcfs::Volume;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// One archive member: a file with content, or a directory (`None`).
pub type Member<'a> = (&'a str, Option<&'a [u8]>);

/// Creates a zip archive, AES-256 encrypting file data when `password` is
/// set.
pub fn zip_archive(members: &[Member<'_>], password: Option<&str>) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let mut options = SimpleFileOptions::default();
    if let Some(pw) = password {
        options = options.with_aes_encryption(zip::AesMode::Aes256, pw);
    }
    for (name, content) in members {
        match content {
            Some(data) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            None => writer.add_directory(*name, SimpleFileOptions::default()).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Creates a gzip-compressed tar archive.
pub fn tar_gz(members: &[Member<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in members {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(1_700_000_000);
        match content {
            Some(data) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(data.len() as u64);
                header.set_cksum();
                builder.append_data(&mut header, name, *data).unwrap();
            }
            None => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                header.set_cksum();
                builder.append_data(&mut header, name, std::io::empty()).unwrap();
            }
        }
    }
    let tar = builder.into_inner().unwrap();
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// Creates a 7z archive, AES-256 encrypting the content when `password` is
/// set.
pub fn seven_zip(members: &[Member<'_>], password: Option<&str>) -> Vec<u8> {
    use sevenz_rust::{AesEncoderOptions, SevenZArchiveEntry, SevenZMethod, SevenZWriter};

    let mut writer = SevenZWriter::new(Cursor::new(Vec::new())).unwrap();
    if let Some(pw) = password {
        writer.set_content_methods(vec![
            AesEncoderOptions::new(pw.into()).into(),
            SevenZMethod::LZMA2.into(),
        ]);
    }
    for (name, content) in members {
        let mut entry = SevenZArchiveEntry::new();
        entry.name = name.trim_end_matches('/').to_string();
        match content {
            Some(data) if !data.is_empty() => {
                entry.has_stream = true;
                entry.size = data.len() as u64;
                writer.push_archive_entry(entry, Some(*data)).unwrap();
            }
            Some(_) => {
                writer.push_archive_entry::<&[u8]>(entry, None).unwrap();
            }
            None => {
                entry.is_directory = true;
                writer.push_archive_entry::<&[u8]>(entry, None).unwrap();
            }
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Cuts `data` into `count` volumes named by `name(index)` (1-based).
pub fn split(data: &[u8], count: usize, name: impl Fn(usize) -> String) -> Vec<Volume> {
    let chunk = data.len().div_ceil(count).max(1);
    data.chunks(chunk)
        .enumerate()
        .map(|(i, part)| Volume::from_bytes(name(i + 1), part.to_vec()))
        .collect()
}

/// Deterministic pseudo-random payload.
pub fn payload(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.r#gen()).collect()
}

// ============================================================================
// ISO9660
// ============================================================================

const SECTOR: usize = 2048;

/// A node of a hand-built ISO image.
pub enum IsoNode<'a> {
    /// A file and its content.
    File(&'a str, &'a [u8]),
    /// A directory and its children.
    Dir(&'a str, Vec<IsoNode<'a>>),
}

/// Builds a Joliet ISO9660 image (one sector per directory).
pub fn iso_image(tree: &[IsoNode<'_>]) -> Vec<u8> {
    let mut sectors: Vec<Vec<u8>> = vec![vec![0u8; SECTOR]; 20];
    let root = place_dir(&mut sectors, tree);

    // The primary hierarchy is an empty directory; Joliet carries the names
    sectors[19] = dir_sector(19, &[]);
    let mut pvd = descriptor(1);
    pvd[156..190].copy_from_slice(&iso_record(&[0], 19, SECTOR as u32, true));
    let mut svd = descriptor(2);
    svd[88..91].copy_from_slice(b"%/E");
    svd[156..190].copy_from_slice(&iso_record(&[0], root, SECTOR as u32, true));
    sectors[16] = pvd;
    sectors[17] = svd;
    sectors[18] = descriptor(255);
    sectors.concat()
}

fn descriptor(kind: u8) -> Vec<u8> {
    let mut sector = vec![0u8; SECTOR];
    sector[0] = kind;
    sector[1..6].copy_from_slice(b"CD001");
    sector[6] = 1;
    sector
}

fn place_dir(sectors: &mut Vec<Vec<u8>>, nodes: &[IsoNode<'_>]) -> u32 {
    let lba = sectors.len() as u32;
    sectors.push(Vec::new());
    let mut records = Vec::new();
    for node in nodes {
        let (name, at, len, is_dir) = match node {
            IsoNode::File(name, data) => {
                let at = sectors.len() as u32;
                for chunk in data.chunks(SECTOR) {
                    let mut sector = chunk.to_vec();
                    sector.resize(SECTOR, 0);
                    sectors.push(sector);
                }
                (*name, at, data.len() as u32, false)
            }
            IsoNode::Dir(name, children) => (*name, place_dir(sectors, children), SECTOR as u32, true),
        };
        let id: Vec<u8> = name.encode_utf16().flat_map(u16::to_be_bytes).collect();
        records.extend(iso_record(&id, at, len, is_dir));
    }
    sectors[lba as usize] = dir_sector(lba, &records);
    lba
}

fn dir_sector(lba: u32, records: &[u8]) -> Vec<u8> {
    let mut sector = iso_record(&[0], lba, SECTOR as u32, true);
    sector.extend(iso_record(&[1], lba, SECTOR as u32, true));
    sector.extend_from_slice(records);
    assert!(sector.len() <= SECTOR, "directory does not fit one sector");
    sector.resize(SECTOR, 0);
    sector
}

fn iso_record(id: &[u8], lba: u32, len: u32, is_dir: bool) -> Vec<u8> {
    let pad = (id.len() + 1) % 2;
    let total = 33 + id.len() + pad;
    let mut raw = vec![0u8; total];
    raw[0] = total as u8;
    raw[2..6].copy_from_slice(&lba.to_le_bytes());
    raw[6..10].copy_from_slice(&lba.to_be_bytes());
    raw[10..14].copy_from_slice(&len.to_le_bytes());
    raw[14..18].copy_from_slice(&len.to_be_bytes());
    raw[18..25].copy_from_slice(&[124, 6, 15, 8, 30, 0, 0]);
    raw[25] = if is_dir { 0x02 } else { 0 };
    raw[28] = 1;
    raw[32] = id.len() as u8;
    raw[33..33 + id.len()].copy_from_slice(id);
    raw
}
