//! Stream decoders for the generic container tool.
//!
//! Each [`Compression`] maps to a streaming decoder from its codec crate.
//! Concatenated members (multi-member gzip, bzip2, XZ and lzip) decode as
//! one stream.

use std::io::{self, BufReader, Read};

use super::detect::Compression;
use crate::Result;
use crate::volume::ReadAt;

/// Brotli decoder window buffer size.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// Read buffer for uncompressed containers.
const STORED_BUFFER_SIZE: usize = 64 * 1024;

/// Wraps `reader` in the decoder for `compression`.
pub fn decoder<'a, R: Read + Send + 'a>(
    compression: Compression,
    reader: R,
) -> Result<Box<dyn Read + Send + 'a>> {
    Ok(match compression {
        Compression::None => Box::new(BufReader::with_capacity(STORED_BUFFER_SIZE, reader)),
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
        Compression::Zlib => Box::new(flate2::read::ZlibDecoder::new(reader)),
        Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
        Compression::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        Compression::Lz4 => Box::new(lz4_flex::frame::FrameDecoder::new(reader)),
        Compression::Brotli => Box::new(brotli::Decompressor::new(reader, BROTLI_BUFFER_SIZE)),
        Compression::Lzip => Box::new(lzma_rust2::LzipReader::new(reader)),
        Compression::Snappy => Box::new(snap::read::FrameDecoder::new(reader)),
    })
}

/// A sequential reader over a borrowed positioned-read source.
pub(crate) struct SourceReader<'a> {
    source: &'a dyn ReadAt,
    size: u64,
    position: u64,
}

impl<'a> SourceReader<'a> {
    pub(crate) fn new(source: &'a dyn ReadAt, size: u64) -> Self {
        Self {
            source,
            size,
            position: 0,
        }
    }
}

impl Read for SourceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.size.saturating_sub(self.position);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let n = self.source.read_at(&mut buf[..want], self.position)?;
        self.position += n as u64;
        Ok(n)
    }
}
