//! Filesystem writes for decompression.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::progress::{UpdateProgress, percent};
use crate::safety::join_contained;
use crate::{Error, ExtractOptions, Result};

/// How a copy reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Report {
    /// Report bytes written over the entry size.
    Bytes,
    /// Only poll for cancellation.
    Silent,
}

/// An output directory that every destination must stay inside.
pub(crate) struct Output<'a> {
    root: PathBuf,
    options: &'a ExtractOptions,
}

impl<'a> Output<'a> {
    /// Creates an output rooted at `root`, which must already exist.
    pub(crate) fn new(root: &Path, options: &'a ExtractOptions) -> Self {
        Self {
            root: root.to_path_buf(),
            options,
        }
    }

    /// Resolves an entry name under the root.
    pub(crate) fn resolve(&self, name: &str) -> Result<PathBuf> {
        join_contained(&self.root, name)
    }

    /// Creates the single new directory `name` under the root and returns an
    /// output rooted at it.
    ///
    /// Fails if the directory already exists.
    pub(crate) fn create_subdir(&self, name: &str) -> Result<Output<'a>> {
        let path = self.resolve(name)?;
        self.dir_builder(false).create(&path)?;
        log::trace!("created {}", path.display());
        Ok(Output {
            root: path,
            options: self.options,
        })
    }

    /// Creates directory `name` and any missing parents.
    pub(crate) fn create_dir_all(&self, name: &str) -> Result<PathBuf> {
        let path = self.resolve(name)?;
        self.dir_builder(true).create(&path)?;
        Ok(path)
    }

    /// Writes one file, creating missing parent directories.
    ///
    /// The file is created exclusively: an existing file at the destination
    /// fails the call instead of being overwritten.
    pub(crate) fn write_file(
        &self,
        name: &str,
        reader: &mut dyn Read,
        size: u64,
        modified: Option<SystemTime>,
        progress: &mut dyn UpdateProgress,
        report: Report,
    ) -> Result<u64> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                self.dir_builder(true).create(parent)?;
            }
        }
        copy_to_file(reader, &path, size, modified, self.options, progress, report)
    }

    fn dir_builder(&self, recursive: bool) -> DirBuilder {
        let mut builder = DirBuilder::new();
        builder.recursive(recursive);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.options.dir_mode);
        }
        builder
    }
}

/// Copies `reader` into a newly created file at `dest`.
///
/// Cancellation is polled before every buffer; a cancelled copy leaves the
/// partial file in place and returns [`Error::Cancelled`]. Returns the number
/// of bytes written.
fn copy_to_file(
    reader: &mut dyn Read,
    dest: &Path,
    size: u64,
    modified: Option<SystemTime>,
    options: &ExtractOptions,
    progress: &mut dyn UpdateProgress,
    report: Report,
) -> Result<u64> {
    let file = create_exclusive(dest, options)?;
    let mut out = BufWriter::with_capacity(options.buffer_size, file);
    let mut buf = vec![0u8; options.buffer_size.max(1)];
    let mut written = 0u64;

    loop {
        if progress.should_cancel() {
            out.flush()?;
            return Err(Error::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        out.write_all(&buf[..n])?;
        written += n as u64;
        if report == Report::Bytes {
            progress.update(percent(written, size));
        }
    }
    out.flush()?;
    drop(out);

    if report == Report::Bytes && size == 0 {
        progress.update(100.0);
    }
    if options.preserve_mtime {
        if let Some(modified) = modified {
            let mtime = filetime::FileTime::from_system_time(modified);
            if let Err(e) = filetime::set_file_mtime(dest, mtime) {
                log::warn!("Failed to set mtime on '{}': {}", dest.display(), e);
            }
        }
    }
    log::trace!("wrote {} bytes to {}", written, dest.display());
    Ok(written)
}

fn create_exclusive(path: &Path, options: &ExtractOptions) -> Result<File> {
    let mut open = OpenOptions::new();
    open.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open.mode(options.file_mode);
    }
    #[cfg(not(unix))]
    let _ = options;
    Ok(open.open(path)?)
}

/// Removes a staged file, logging failures.
#[cfg(feature = "rar")]
pub(crate) fn remove_staged(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        log::warn!("Failed to clean up staged file '{}': {}", path.display(), e);
    }
}
