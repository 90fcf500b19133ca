//! Synthetic part directory for path-based multi-file decoders.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use super::{Volume, VolumeReader, first};
use crate::{ExtractOptions, Result};

/// Volumes laid out on disk under canonical part names.
///
/// A single volume becomes `file.rar`; N volumes become `file.part1.rar`
/// through `file.partN.rar`, so single- and multi-volume archives share one
/// decoding path. The directory is registered with the first volume's
/// [`Closers`](super::Closers) and removed when that volume is released.
#[derive(Clone)]
pub struct PartDir {
    dir: Arc<TempDir>,
    main: PathBuf,
    parts: usize,
}

impl PartDir {
    /// Copies `volumes` into a fresh temporary directory.
    pub fn spool(volumes: &[Volume], options: &ExtractOptions) -> Result<Self> {
        let top = first(volumes)?;
        let dir = Arc::new(options.make_temp_dir()?);
        let count = volumes.len();

        for (index, volume) in volumes.iter().enumerate() {
            let path = dir.path().join(Self::part_name(count, index + 1));
            let mut out = BufWriter::new(File::create(&path)?);
            io::copy(&mut VolumeReader::new(volume), &mut out)?;
            out.flush()?;
        }
        log::debug!(
            "spooled {} volume(s) of {} into {}",
            count,
            top.name(),
            dir.path().display()
        );

        top.closers().add(Arc::clone(&dir));
        Ok(Self {
            main: dir.path().join(Self::part_name(count, 1)),
            dir,
            parts: count,
        })
    }

    /// Canonical file name of part `index` (1-based) out of `count`.
    pub fn part_name(count: usize, index: usize) -> String {
        if count == 1 {
            "file.rar".to_string()
        } else {
            format!("file.part{index}.rar")
        }
    }

    /// Path of the first part, which decoders open.
    pub fn main_path(&self) -> &Path {
        &self.main
    }

    /// Directory holding the parts.
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.parts
    }

    /// Returns `true` if there are no parts.
    pub fn is_empty(&self) -> bool {
        self.parts == 0
    }
}

impl std::fmt::Debug for PartDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartDir")
            .field("dir", &self.dir.path())
            .field("parts", &self.parts)
            .finish()
    }
}
