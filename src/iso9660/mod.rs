//! ISO9660 disk images.
//!
//! Images are parsed in-house (see [`image`]): the directory hierarchy is
//! walked on demand one directory at a time, so `get_meta` builds no tree and
//! callers browse with `list`. ISO9660 has no encryption.

pub mod image;

use std::path::Path;

use image::{Image, MAX_DEPTH, Record};

use crate::model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry};
use crate::progress::{UpdateProgress, percent};
use crate::tool::{EntryStream, Output, Report, Tool};
use crate::volume::{Volume, first};
use crate::{Error, ExtractOptions, Result};

/// Tool for ISO9660 images.
#[derive(Debug, Clone, Default)]
pub struct IsoTool {
    options: ExtractOptions,
}

impl IsoTool {
    /// Creates the tool.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

impl Tool for IsoTool {
    fn name(&self) -> &'static str {
        "iso9660"
    }

    fn accepted_extensions(&self) -> &[&'static str] {
        &[".iso"]
    }

    fn get_meta(&self, volumes: &[Volume], _args: &ArchiveArgs) -> Result<ArchiveMeta> {
        first(volumes)?;
        Image::open(volumes)?;
        Ok(ArchiveMeta {
            comment: String::new(),
            encrypted: false,
            tree: None,
        })
    }

    fn list(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<Vec<Entry>> {
        first(volumes)?;
        let image = Image::open(volumes)?;
        let inner = args.relative_path();
        let dir = image.resolve(inner)?;
        if !dir.is_dir {
            return Err(Error::NotFolder {
                path: inner.to_string(),
            });
        }
        Ok(image.children(&dir)?.iter().map(to_entry).collect())
    }

    fn extract(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<EntryStream> {
        first(volumes)?;
        let image = Image::open(volumes)?;
        let inner = args.relative_path();
        let file = image.resolve(inner)?;
        if file.is_dir {
            return Err(Error::NotFile {
                path: inner.to_string(),
            });
        }
        Ok(EntryStream::new(image.open_file(&file)?, file.size()))
    }

    fn decompress(
        &self,
        volumes: &[Volume],
        output: &Path,
        args: &ArchiveInnerArgs,
        progress: &mut dyn UpdateProgress,
    ) -> Result<()> {
        first(volumes)?;
        let image = Image::open(volumes)?;
        let out = Output::new(output, &self.options);
        let target = image.resolve(args.relative_path())?;

        if !target.is_dir {
            let mut reader = image.open_file(&target)?;
            out.write_file(
                &target.name,
                &mut reader,
                target.size(),
                target.modified,
                progress,
                Report::Bytes,
            )?;
            return Ok(());
        }

        let out = if args.is_root() {
            out
        } else {
            out.create_subdir(&target.name)?
        };
        let mut walk = Walk {
            image: &image,
            progress,
            total: count_files(&image, &target, 0)?,
            done: 0,
        };
        walk.write_dir(&target, &out, "", 0)?;
        if walk.total == 0 {
            walk.progress.update(100.0);
        }
        Ok(())
    }
}

fn to_entry(record: &Record) -> Entry {
    if record.is_dir {
        Entry::dir(&record.name, record.modified)
    } else {
        Entry::file(&record.name, record.size(), record.modified)
    }
}

fn count_files(image: &Image, dir: &Record, depth: usize) -> Result<u64> {
    check_depth(dir, depth)?;
    let mut total = 0;
    for child in image.children(dir)? {
        total += if child.is_dir {
            count_files(image, &child, depth + 1)?
        } else {
            1
        };
    }
    Ok(total)
}

fn check_depth(dir: &Record, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::CorruptImage {
            offset: dir.extents.first().map_or(0, |e| e.offset),
            reason: "directory nesting too deep".to_string(),
        });
    }
    Ok(())
}

/// Recursive subtree writer with per-file progress.
struct Walk<'a> {
    image: &'a Image,
    progress: &'a mut dyn UpdateProgress,
    total: u64,
    done: u64,
}

impl Walk<'_> {
    fn write_dir(&mut self, dir: &Record, out: &Output<'_>, prefix: &str, depth: usize) -> Result<()> {
        check_depth(dir, depth)?;
        for child in self.image.children(dir)? {
            if self.progress.should_cancel() {
                return Err(Error::Cancelled);
            }
            let name = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{prefix}/{}", child.name)
            };
            if child.is_dir {
                out.create_dir_all(&name)?;
                self.write_dir(&child, out, &name, depth + 1)?;
                continue;
            }
            let mut reader = self.image.open_file(&child)?;
            out.write_file(
                &name,
                &mut reader,
                child.size(),
                child.modified,
                &mut *self.progress,
                Report::Silent,
            )?;
            self.done += 1;
            self.progress.update(percent(self.done, self.total));
        }
        Ok(())
    }
}
