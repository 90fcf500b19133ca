//! Volumes: the caller-supplied byte sources an archive is read from.
//!
//! An archive is an ordered slice of one or more [`Volume`]s in ascending
//! part order. Each volume exposes positioned reads through [`ReadAt`], a
//! name, a declared size, and a closer registry ([`Closers`]) to which tools
//! attach resources that must live exactly as long as the volume.
//!
//! # Adapting volumes to decoders
//!
//! Decoders want different shapes:
//!
//! - a single seekable reader: [`VolumeReader`]
//! - one continuous address space over split parts (7-Zip `.7z.001`,
//!   `.7z.002`, ...): [`MultiVolumeReader`]
//! - named part files on disk (RAR `file.part1.rar`, ...): [`PartDir`]
//!
//! # Example
//!
//! ```rust
//! use arcfs::volume::{MultiVolumeReader, Volume};
//! use std::io::Read;
//!
//! let parts = vec![
//!     Volume::from_bytes("data.7z.001", b"hello ".to_vec()),
//!     Volume::from_bytes("data.7z.002", b"world".to_vec()),
//! ];
//! let mut reader = MultiVolumeReader::new(&parts);
//! let mut text = String::new();
//! reader.read_to_string(&mut text).unwrap();
//! assert_eq!(text, "hello world");
//! ```

mod multipart;
mod parts;
mod reader;

pub use multipart::MultipartExtension;
pub use parts::PartDir;
pub use reader::{MultiVolumeReader, VolumeReader};

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::{Error, Result};

/// Positioned reads that do not move a shared cursor.
///
/// Implementations must be safe to call concurrently; every engine call
/// builds its own cursor on top.
pub trait ReadAt: Send + Sync {
    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; zero means end of source.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, offset) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ));
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ReadAt for File {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(self.len());
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

/// Objects released together with a volume.
///
/// Tools register decoder resources (spooled part directories, staged
/// files) here; they are dropped in reverse registration order when the
/// volume is closed or dropped.
#[derive(Default)]
pub struct Closers {
    items: Mutex<Vec<Box<dyn Send>>>,
}

impl Closers {
    /// Registers an object to be released with the volume.
    pub fn add<T: Send + 'static>(&self, item: T) {
        self.lock().push(Box::new(item));
    }

    /// Returns the number of registered objects.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases every registered object, most recent first.
    pub fn close_all(&self) {
        let items = std::mem::take(&mut *self.lock());
        for item in items.into_iter().rev() {
            drop(item);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Box<dyn Send>>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Closers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closers").field("len", &self.len()).finish()
    }
}

/// One physical byte source of an archive.
pub struct Volume {
    name: String,
    size: u64,
    modified: Option<SystemTime>,
    source: Arc<dyn ReadAt>,
    closers: Closers,
}

impl Volume {
    /// Creates a volume over an arbitrary positioned-read source.
    pub fn new(name: impl Into<String>, size: u64, source: Arc<dyn ReadAt>) -> Self {
        Self {
            name: name.into(),
            size,
            modified: None,
            source,
            closers: Closers::default(),
        }
    }

    /// Creates an in-memory volume.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self::new(name, size, Arc::new(data))
    }

    /// Opens a local file as a volume, named after its file name.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let meta = file.metadata()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut volume = Self::new(name, meta.len(), Arc::new(file));
        volume.modified = meta.modified().ok();
        Ok(volume)
    }

    /// Sets the modification time reported for this volume.
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Returns the volume name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the modification time, if known.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Returns the shared positioned-read source.
    pub fn source(&self) -> &Arc<dyn ReadAt> {
        &self.source
    }

    /// Returns the closer registry.
    pub fn closers(&self) -> &Closers {
        &self.closers
    }

    /// Releases every resource registered against this volume.
    pub fn close(&self) {
        self.closers.close_all();
    }

    /// Returns a fresh single-volume cursor.
    pub fn reader(&self) -> VolumeReader {
        VolumeReader::new(self)
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("modified", &self.modified)
            .field("closers", &self.closers)
            .finish_non_exhaustive()
    }
}

/// Returns the first volume, which carries the archive name and closers.
pub(crate) fn first(volumes: &[Volume]) -> Result<&Volume> {
    volumes.first().ok_or(Error::NoVolumes)
}
