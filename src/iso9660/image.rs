//! ISO9660 volume descriptors and directory records.
//!
//! # Layout
//!
//! ```text
//! sector 0..16   system area (ignored)
//! sector 16..    volume descriptors, 2048 bytes each:
//!                  [type:1]["CD001":5][version:1][body...]
//!                  type 1 = primary, 2 = supplementary (Joliet), 255 = end
//! ```
//!
//! A directory is an extent of variable-length records. Records never cross
//! a sector boundary: a zero length byte means "skip to the next sector".
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | record length |
//! | 2 | 4 | extent LBA (little-endian half of a both-endian pair) |
//! | 10 | 4 | data length |
//! | 18 | 7 | recording date |
//! | 25 | 1 | flags (0x02 directory, 0x80 more extents follow) |
//! | 32 | 1 | identifier length |
//! | 33 | n | identifier, padded to an even offset, then System Use |

use std::io::{self, Read};
use std::sync::Arc;
use std::time::SystemTime;

use crate::timestamp::from_iso_recording;
use crate::volume::{MultiVolumeReader, ReadAt, Volume};
use crate::{Error, Result};

/// Logical sector size.
pub const SECTOR_SIZE: u64 = 2048;

/// First volume descriptor sector.
const DESCRIPTOR_START: u64 = 16;

/// Upper bound on descriptors scanned before the terminator.
const MAX_DESCRIPTORS: u64 = 64;

/// Directories deeper than this are treated as a cycle.
pub const MAX_DEPTH: usize = 64;

const STANDARD_ID: &[u8; 5] = b"CD001";
const TYPE_PRIMARY: u8 = 1;
const TYPE_SUPPLEMENTARY: u8 = 2;
const TYPE_TERMINATOR: u8 = 255;

/// Offset of the root directory record inside a volume descriptor.
const ROOT_RECORD_OFFSET: usize = 156;

const FLAG_DIRECTORY: u8 = 0x02;
const FLAG_MULTI_EXTENT: u8 = 0x80;

/// Smallest valid directory record.
const MIN_RECORD_LEN: usize = 34;

/// One contiguous run of file data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// Absolute byte offset in the image.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
}

/// A file or directory decoded from a directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Display name: Rock Ridge or Joliet name when present, otherwise the
    /// ISO identifier without its version suffix.
    pub name: String,
    /// Data extents; files written with multi-extent records have several.
    pub extents: Vec<Extent>,
    /// Recording date.
    pub modified: Option<SystemTime>,
    /// Whether this is a directory.
    pub is_dir: bool,
}

impl Record {
    /// Total data length.
    pub fn size(&self) -> u64 {
        self.extents.iter().map(|e| e.len).sum()
    }
}

/// An opened ISO9660 image.
pub struct Image {
    source: Arc<MultiVolumeReader>,
    size: u64,
    root: Record,
    joliet: bool,
}

impl Image {
    /// Reads the volume descriptors and picks the directory hierarchy to
    /// expose: Joliet when the image has it, the primary one otherwise.
    pub fn open(volumes: &[Volume]) -> Result<Self> {
        let source = Arc::new(MultiVolumeReader::new(volumes));
        let size = source.total_size();

        let mut primary = None;
        let mut joliet = None;
        let mut sector = [0u8; SECTOR_SIZE as usize];
        for index in DESCRIPTOR_START..DESCRIPTOR_START + MAX_DESCRIPTORS {
            let offset = index * SECTOR_SIZE;
            if offset + SECTOR_SIZE > size {
                break;
            }
            source.read_exact_at(&mut sector, offset)?;
            if &sector[1..6] != STANDARD_ID {
                if index == DESCRIPTOR_START {
                    return Err(Error::UnknownArchiveFormat);
                }
                return Err(corrupt(offset, "missing descriptor signature"));
            }
            match sector[0] {
                TYPE_PRIMARY if primary.is_none() => {
                    primary = Some(root_record(&sector, offset)?);
                }
                TYPE_SUPPLEMENTARY if joliet.is_none() && is_joliet(&sector) => {
                    joliet = Some(root_record(&sector, offset)?);
                }
                TYPE_TERMINATOR => break,
                other => log::trace!("skipping volume descriptor type {}", other),
            }
        }

        let (root, is_joliet) = match (joliet, primary) {
            (Some(root), _) => (root, true),
            (None, Some(root)) => (root, false),
            (None, None) if size < (DESCRIPTOR_START + 1) * SECTOR_SIZE => {
                return Err(Error::UnknownArchiveFormat);
            }
            (None, None) => {
                return Err(corrupt(
                    DESCRIPTOR_START * SECTOR_SIZE,
                    "no primary volume descriptor",
                ));
            }
        };
        log::debug!(
            "iso9660 image of {} bytes, {} hierarchy",
            size,
            if is_joliet { "joliet" } else { "primary" }
        );
        Ok(Self {
            source,
            size,
            root,
            joliet: is_joliet,
        })
    }

    /// The root directory.
    pub fn root(&self) -> &Record {
        &self.root
    }

    /// Whether names come from the Joliet hierarchy.
    pub fn is_joliet(&self) -> bool {
        self.joliet
    }

    /// Reads the records of a directory, without `.` and `..`.
    pub fn children(&self, dir: &Record) -> Result<Vec<Record>> {
        let Some(extent) = dir.extents.first() else {
            return Ok(Vec::new());
        };
        if extent.offset.saturating_add(extent.len) > self.size {
            return Err(corrupt(extent.offset, "directory extent past end of image"));
        }
        let mut data = vec![0u8; usize::try_from(extent.len).unwrap_or(usize::MAX)];
        self.source.read_exact_at(&mut data, extent.offset)?;

        let mut children: Vec<Record> = Vec::new();
        let mut pending: Option<Record> = None;
        let mut pos = 0usize;
        while pos < data.len() {
            let len = usize::from(data[pos]);
            if len == 0 {
                // Padding up to the next sector
                pos = (pos / SECTOR_SIZE as usize + 1) * SECTOR_SIZE as usize;
                continue;
            }
            let at = extent.offset + pos as u64;
            if len < MIN_RECORD_LEN || pos + len > data.len() {
                return Err(corrupt(at, "directory record overruns its extent"));
            }
            let raw = &data[pos..pos + len];
            pos += len;

            let Some((record, more)) = self.parse_record(raw, at)? else {
                continue;
            };
            if let Some(head) = pending.as_mut().filter(|h| h.name == record.name) {
                head.extents.extend(record.extents);
            } else {
                children.extend(pending.replace(record));
            }
            if !more {
                children.extend(pending.take());
            }
        }
        children.extend(pending);
        Ok(children)
    }

    /// Resolves a slash-separated path from the root.
    ///
    /// Walking through a file yields [`Error::ObjectNotFound`].
    pub fn resolve(&self, path: &str) -> Result<Record> {
        let mut current = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.is_dir {
                return Err(Error::not_found(path));
            }
            current = self
                .children(&current)?
                .into_iter()
                .find(|child| child.name == component)
                .ok_or_else(|| Error::not_found(path))?;
        }
        Ok(current)
    }

    /// Opens a reader over a file's data.
    pub fn open_file(&self, file: &Record) -> Result<ExtentReader> {
        for extent in &file.extents {
            if extent.offset.saturating_add(extent.len) > self.size {
                return Err(corrupt(extent.offset, "file extent past end of image"));
            }
        }
        Ok(ExtentReader {
            source: Arc::clone(&self.source),
            extents: file.extents.clone(),
            index: 0,
            pos: 0,
        })
    }

    /// Decodes one record. Returns `None` for `.` and `..`, and the
    /// record with its multi-extent flag otherwise.
    fn parse_record(&self, raw: &[u8], at: u64) -> Result<Option<(Record, bool)>> {
        let id_len = usize::from(raw[32]);
        let id_end = 33 + id_len;
        if id_end > raw.len() {
            return Err(corrupt(at, "identifier overruns record"));
        }
        let id = &raw[33..id_end];
        if id_len == 1 && (id[0] == 0 || id[0] == 1) {
            return Ok(None);
        }

        let flags = raw[25];
        let is_dir = flags & FLAG_DIRECTORY != 0;
        let name = if self.joliet {
            decode_ucs2(id)
        } else {
            let system_use_start = id_end + (id_len + 1) % 2;
            match raw.get(system_use_start..).and_then(rock_ridge_name) {
                Some(name) => name,
                None => String::from_utf8_lossy(id).into_owned(),
            }
        };

        let record = Record {
            name: clean_name(&name, is_dir),
            extents: vec![extent_of(raw)],
            modified: recording_date(raw),
            is_dir,
        };
        Ok(Some((record, flags & FLAG_MULTI_EXTENT != 0)))
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("size", &self.size)
            .field("joliet", &self.joliet)
            .finish_non_exhaustive()
    }
}

/// Sequential reader over a file's extents.
pub struct ExtentReader {
    source: Arc<MultiVolumeReader>,
    extents: Vec<Extent>,
    index: usize,
    pos: u64,
}

impl Read for ExtentReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while let Some(extent) = self.extents.get(self.index) {
            let remaining = extent.len - self.pos;
            if remaining == 0 {
                self.index += 1;
                self.pos = 0;
                continue;
            }
            let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            let n = self.source.read_at(&mut buf[..want], extent.offset + self.pos)?;
            if n == 0 && want > 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "image ended inside a file extent",
                ));
            }
            self.pos += n as u64;
            return Ok(n);
        }
        Ok(0)
    }
}

fn corrupt(offset: u64, reason: &str) -> Error {
    Error::CorruptImage {
        offset,
        reason: reason.to_string(),
    }
}

fn root_record(sector: &[u8], offset: u64) -> Result<Record> {
    let raw = &sector[ROOT_RECORD_OFFSET..ROOT_RECORD_OFFSET + MIN_RECORD_LEN];
    if usize::from(raw[0]) < MIN_RECORD_LEN || raw[25] & FLAG_DIRECTORY == 0 {
        return Err(corrupt(
            offset + ROOT_RECORD_OFFSET as u64,
            "bad root directory record",
        ));
    }
    Ok(Record {
        name: String::new(),
        extents: vec![extent_of(raw)],
        modified: recording_date(raw),
        is_dir: true,
    })
}

/// Joliet descriptors carry a UCS-2 escape sequence at offset 88.
fn is_joliet(sector: &[u8]) -> bool {
    matches!(&sector[88..91], b"%/@" | b"%/C" | b"%/E")
}

fn extent_of(raw: &[u8]) -> Extent {
    let lba = u32::from_le_bytes([raw[2], raw[3], raw[4], raw[5]]);
    let len = u32::from_le_bytes([raw[10], raw[11], raw[12], raw[13]]);
    Extent {
        offset: u64::from(lba) * SECTOR_SIZE,
        len: u64::from(len),
    }
}

fn recording_date(raw: &[u8]) -> Option<SystemTime> {
    let date: &[u8; 7] = raw[18..25].try_into().ok()?;
    from_iso_recording(date)
}

fn decode_ucs2(id: &[u8]) -> String {
    let units = id
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

/// Extracts a Rock Ridge `NM` alternate name from a System Use area.
///
/// Continued `NM` entries are concatenated. Returns `None` when the area has
/// no usable name.
fn rock_ridge_name(mut area: &[u8]) -> Option<String> {
    let mut name = Vec::new();
    let mut found = false;
    while area.len() >= 4 {
        let len = usize::from(area[2]);
        if len < 4 || len > area.len() {
            break;
        }
        let (entry, rest) = area.split_at(len);
        if &entry[..2] == b"NM" && len >= 5 {
            let flags = entry[4];
            // CURRENT and PARENT carry no name
            if flags & 0x06 == 0 {
                name.extend_from_slice(&entry[5..]);
                found = true;
            }
            if flags & 0x01 == 0 && found {
                break;
            }
        }
        area = rest;
    }
    (found && !name.is_empty()).then(|| String::from_utf8_lossy(&name).into_owned())
}

/// Strips the `;N` version suffix and, for files, a trailing dot.
fn clean_name(name: &str, is_dir: bool) -> String {
    let name = match name.rfind(';') {
        Some(i) if name[i + 1..].bytes().all(|b| b.is_ascii_digit()) => &name[..i],
        _ => name,
    };
    let name = if is_dir {
        name
    } else {
        name.strip_suffix('.').unwrap_or(name)
    };
    name.to_string()
}
