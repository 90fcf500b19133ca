//! The uniform contract every archive adapter implements.
//!
//! A [`Tool`] owns one family of extensions and answers four questions
//! about an archive given as a slice of [`Volume`]s:
//!
//! | Operation | Returns | Typical failure |
//! |-----------|---------|-----------------|
//! | [`get_meta`](Tool::get_meta) | comment, encryption flag, tree | `WrongArchivePassword`, `UnknownArchiveFormat` |
//! | [`list`](Tool::list) | immediate children of a directory | `NotSupport` for flat-list adapters |
//! | [`extract`](Tool::extract) | a reader and size for one file | `ObjectNotFound` |
//! | [`decompress`](Tool::decompress) | files written under an output directory | `PathTraversal`, I/O |
//!
//! Adapters over decoders that only expose a flat entry sequence implement
//! [`ArchiveReader`] and delegate tree building to [`TreeBuilder`] and
//! decompression to [`decompress_from_traversal`].

mod registry;
mod traversal;
mod tree;
mod write;

pub use registry::ToolRegistry;
pub use traversal::{ArchiveReader, SubFile, Visit, decompress_from_traversal, extract_from_traversal};
pub use tree::{TreeBuilder, tree_from_traversal};
pub(crate) use traversal::visit_member;
pub(crate) use write::{Output, Report};
#[cfg(feature = "rar")]
pub(crate) use write::remove_staged;

use std::io::Read;
use std::path::Path;

use crate::model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry};
use crate::progress::UpdateProgress;
use crate::volume::{MultipartExtension, Volume};
use crate::Result;

/// A streamed archive entry returned by [`Tool::extract`].
pub struct EntryStream {
    /// Reader over the entry's uncompressed bytes.
    pub reader: Box<dyn Read + Send>,
    /// Declared uncompressed size.
    pub size: u64,
}

impl EntryStream {
    /// Creates a stream from a reader and its declared size.
    pub fn new(reader: impl Read + Send + 'static, size: u64) -> Self {
        Self {
            reader: Box::new(reader),
            size,
        }
    }

    /// Reads the whole entry into memory.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(usize::try_from(self.size).unwrap_or(0).min(1 << 20));
        self.reader.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for EntryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// An archive adapter.
///
/// Tools are stateless: every call works only over the volumes it is given,
/// and decoder resources that must outlive the call are registered with the
/// first volume's closers.
pub trait Tool: Send + Sync {
    /// Short adapter name, for logs.
    fn name(&self) -> &'static str;

    /// Extensions (with leading dot) this tool owns.
    fn accepted_extensions(&self) -> &[&'static str];

    /// First-part extensions of split archives this tool decodes, with the
    /// naming scheme of their sibling parts.
    fn accepted_multipart_extensions(&self) -> &[MultipartExtension] {
        &[]
    }

    /// Reads archive metadata: comment, encryption and, where the tool builds
    /// one, the full directory tree.
    fn get_meta(&self, volumes: &[Volume], args: &ArchiveArgs) -> Result<ArchiveMeta>;

    /// Lists the immediate children of `args.inner_path`.
    fn list(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<Vec<Entry>>;

    /// Opens the file at `args.inner_path` for streamed reading.
    fn extract(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<EntryStream>;

    /// Writes the file or subtree at `args.inner_path` under `output`.
    fn decompress(
        &self,
        volumes: &[Volume],
        output: &Path,
        args: &ArchiveInnerArgs,
        progress: &mut dyn UpdateProgress,
    ) -> Result<()>;
}
