//! Stream format detection.
//!
//! Containers handled by the generic tool are identified by their magic
//! bytes, with the tar USTAR marker checked at offset 257 of the decoded
//! stream. Brotli has no signature, so it can only be picked from the file
//! name.

use std::io::Read;

use super::codec::decoder;
use crate::volume::ReadAt;
use crate::{Error, Result};

/// Compression wrapping a generic container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Stored as is.
    None,
    /// gzip.
    Gzip,
    /// bzip2.
    Bzip2,
    /// XZ.
    Xz,
    /// Zstandard.
    Zstd,
    /// LZ4 frame format.
    Lz4,
    /// Brotli.
    Brotli,
    /// zlib.
    Zlib,
    /// lzip.
    Lzip,
    /// Snappy framing format.
    Snappy,
}

impl Compression {
    /// Returns the file extension for this compression, with leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Xz => ".xz",
            Compression::Zstd => ".zst",
            Compression::Lz4 => ".lz4",
            Compression::Brotli => ".br",
            Compression::Zlib => ".zz",
            Compression::Lzip => ".lz",
            Compression::Snappy => ".sz",
        }
    }

    /// Returns a human-readable name for this compression.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "XZ",
            Compression::Zstd => "Zstandard",
            Compression::Lz4 => "LZ4",
            Compression::Brotli => "Brotli",
            Compression::Zlib => "zlib",
            Compression::Lzip => "lzip",
            Compression::Snappy => "Snappy",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What a volume turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container {
    /// Outer compression.
    pub compression: Compression,
    /// Whether the decoded stream is a tar archive.
    pub tar: bool,
}

/// Known compression signatures.
const SIGNATURES: &[(&[u8], Compression)] = &[
    // gzip: 0x1F 0x8B
    (&[0x1F, 0x8B], Compression::Gzip),
    // XZ: 0xFD '7' 'z' 'X' 'Z' 0x00
    (&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], Compression::Xz),
    // bzip2: 'B' 'Z' 'h'
    (&[0x42, 0x5A, 0x68], Compression::Bzip2),
    // Zstd: 0x28 0xB5 0x2F 0xFD
    (&[0x28, 0xB5, 0x2F, 0xFD], Compression::Zstd),
    // LZ4: 0x04 0x22 0x4D 0x18 (frame format)
    (&[0x04, 0x22, 0x4D, 0x18], Compression::Lz4),
    // lzip: 'L' 'Z' 'I' 'P'
    (b"LZIP", Compression::Lzip),
    // Snappy: stream identifier chunk
    (b"\xFF\x06\x00\x00sNaPpY", Compression::Snappy),
];

/// TAR USTAR signature at offset 257.
const TAR_USTAR_SIGNATURE: &[u8] = b"ustar";

/// Size of a tar header block.
const TAR_BLOCK: usize = 512;

/// Identifies the compression from the first bytes of a stream.
///
/// Returns `None` if no signature matches; the stream may still be a plain
/// tar or a brotli stream.
pub fn detect_compression(header: &[u8]) -> Option<Compression> {
    for (signature, compression) in SIGNATURES {
        if header.starts_with(signature) {
            return Some(*compression);
        }
    }
    if is_zlib_header(header) {
        return Some(Compression::Zlib);
    }
    None
}

/// Picks a compression from the file name alone.
pub fn compression_from_name(name: &str) -> Option<Compression> {
    let name = name.to_ascii_lowercase();
    let ext = name.rsplit('.').next()?;
    match ext {
        "gz" | "tgz" => Some(Compression::Gzip),
        "bz2" | "tbz2" | "tbz" => Some(Compression::Bzip2),
        "xz" | "txz" => Some(Compression::Xz),
        "zst" | "tzst" => Some(Compression::Zstd),
        "lz4" | "tlz4" => Some(Compression::Lz4),
        "br" => Some(Compression::Brotli),
        "zz" => Some(Compression::Zlib),
        "lz" | "tlz" => Some(Compression::Lzip),
        "sz" => Some(Compression::Snappy),
        "tar" => Some(Compression::None),
        _ => None,
    }
}

/// Returns `true` if a decoded block looks like a tar header.
///
/// Accepts the USTAR marker, or failing that a valid header checksum, so
/// pre-POSIX archives are recognized too.
pub fn is_tar_header(block: &[u8]) -> bool {
    if block.len() < TAR_BLOCK {
        return false;
    }
    if &block[257..262] == TAR_USTAR_SIGNATURE {
        return true;
    }
    let Some(stored) = parse_octal(&block[148..156]) else {
        return false;
    };
    let computed: u64 = block[..TAR_BLOCK]
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { 0x20 } else { u64::from(b) })
        .sum();
    // An all-zero block is the end-of-archive marker, not a header
    stored == computed && block[0] != 0
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(field).ok()?;
    let text = text.trim_matches(|c: char| c == '\0' || c == ' ');
    if text.is_empty() {
        return None;
    }
    u64::from_str_radix(text, 8).ok()
}

/// zlib CMF/FLG check: deflate method and a header divisible by 31.
fn is_zlib_header(header: &[u8]) -> bool {
    header.len() >= 2
        && header[0] & 0x0F == 8
        && header[0] >> 4 <= 7
        && (u16::from(header[0]) << 8 | u16::from(header[1])) % 31 == 0
}

/// Identifies what a volume contains.
///
/// A raw tar header wins, then magic bytes; brotli is only considered
/// when the name says so. A stream of zero blocks is an empty tar.
pub fn detect(source: &dyn ReadAt, size: u64, name: &str) -> Result<Container> {
    let mut block = [0u8; TAR_BLOCK];
    let n = read_prefix(source, &mut block, 0)?;
    let block = &block[..n];

    if is_tar_header(block) || is_empty_tar(source, block)? {
        log::debug!("{}: plain tar", name);
        return Ok(Container {
            compression: Compression::None,
            tar: true,
        });
    }

    let compression = detect_compression(block)
        .or_else(|| compression_from_name(name).filter(|c| *c == Compression::Brotli))
        .ok_or(Error::UnknownArchiveFormat)?;
    let tar = sniff_tar(source, size, compression)?;
    log::debug!("{}: {} compression, tar={}", name, compression, tar);
    Ok(Container { compression, tar })
}

fn read_prefix(source: &dyn ReadAt, buf: &mut [u8], offset: u64) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read_at(&mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Returns `true` if the stream opens with the two zero blocks that end a
/// tar archive.
fn is_empty_tar(source: &dyn ReadAt, first: &[u8]) -> Result<bool> {
    if first.len() < TAR_BLOCK || first.iter().any(|&b| b != 0) {
        return Ok(false);
    }
    let mut second = [0u8; TAR_BLOCK];
    let n = read_prefix(source, &mut second, TAR_BLOCK as u64)?;
    Ok(n == TAR_BLOCK && second.iter().all(|&b| b == 0))
}

/// Decodes the first block and checks for a tar header.
fn sniff_tar(source: &dyn ReadAt, size: u64, compression: Compression) -> Result<bool> {
    let reader = super::codec::SourceReader::new(source, size);
    let mut stream = match decoder(compression, reader) {
        Ok(stream) => stream,
        Err(_) => return Ok(false),
    };
    let mut block = [0u8; TAR_BLOCK];
    let mut filled = 0;
    while filled < TAR_BLOCK {
        match stream.read(&mut block[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            // A bad stream is reported by the decoding pass, not here
            Err(_) => return Ok(false),
        }
    }
    Ok(is_tar_header(&block[..filled]))
}
