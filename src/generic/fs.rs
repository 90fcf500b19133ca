//! Indexed view of a generic container.

use std::io::{self, Read, Seek, SeekFrom};

use super::codec::decoder;
use super::detect::{Compression, Container, detect};
use crate::model::{Entry, TreeNode, find_in};
use crate::timestamp::from_unix_secs;
use crate::tool::{ArchiveReader, EntryStream, SubFile, TreeBuilder, Visit};
use crate::volume::{MultiVolumeReader, Volume, first};
use crate::{Error, Result};

/// A tar (possibly compressed) or a single compressed file, indexed by one
/// decoding pass.
///
/// Every later read decodes the stream again from the start; members can
/// only be visited in stream order.
pub(crate) struct ContainerFs<'a> {
    volumes: &'a [Volume],
    container: Container,
    files: Vec<SubFile>,
    /// For each raw tar record, the index of its member in `files`, or
    /// `None` for records that are not exposed (links, devices).
    records: Vec<Option<usize>>,
    /// For each member, where its data starts in an uncompressed tar.
    offsets: Vec<Option<u64>>,
}

impl<'a> ContainerFs<'a> {
    /// Detects the container and indexes its members.
    pub(crate) fn open(volumes: &'a [Volume]) -> Result<Self> {
        let top = first(volumes)?;
        let joined = MultiVolumeReader::new(volumes);
        let container = detect(&joined, joined.total_size(), top.name())?;

        let mut fs = Self {
            volumes,
            container,
            files: Vec::new(),
            records: Vec::new(),
            offsets: Vec::new(),
        };
        if container.tar {
            fs.index_tar()?;
        } else {
            fs.index_single(top)?;
        }
        log::debug!(
            "{}: indexed {} members ({} records)",
            top.name(),
            fs.files.len(),
            fs.records.len()
        );
        Ok(fs)
    }

    /// Returns what the volumes contain.
    pub(crate) fn container(&self) -> Container {
        self.container
    }

    /// Opens a fresh decoded stream.
    pub(crate) fn stream(&self) -> Result<Box<dyn Read + Send + 'static>> {
        decoder(self.container.compression, MultiVolumeReader::new(self.volumes))
    }

    fn index_tar(&mut self) -> Result<()> {
        let stored = self.container.compression == Compression::None;
        let mut archive = tar::Archive::new(self.stream()?);
        for entry in archive.entries()? {
            let entry = entry?;
            let header = entry.header();
            let kind = header.entry_type();
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let modified = header.mtime().ok().map(|secs| from_unix_secs(secs as i64));

            let member = if kind.is_dir() {
                Some(SubFile::new(&name, 0, modified, true, false))
            } else if kind.is_file() || kind == tar::EntryType::Continuous || kind.is_gnu_sparse() {
                Some(SubFile::new(&name, entry.size(), modified, false, false))
            } else {
                log::debug!("skipping tar record {:?} of type {:?}", name, kind);
                None
            };

            // Sparse members are not laid out contiguously
            let contiguous = kind.is_file() || kind == tar::EntryType::Continuous;
            let offset = (stored && contiguous).then(|| entry.raw_file_position());

            match member {
                Some(file) if !file.path.is_empty() => {
                    self.records.push(Some(self.files.len()));
                    self.files.push(file);
                    self.offsets.push(offset);
                }
                _ => self.records.push(None),
            }
        }
        Ok(())
    }

    /// Opens a member of an uncompressed tar straight from the volumes.
    ///
    /// Returns `None` when the member has to be decoded in stream order.
    pub(crate) fn stored_member(&self, path: &str) -> Result<Option<EntryStream>> {
        let Some(index) = self.files.iter().position(|f| f.path == path) else {
            return Ok(None);
        };
        let Some(offset) = self.offsets.get(index).copied().flatten() else {
            return Ok(None);
        };
        let size = self.files[index].entry.size;
        let mut reader = MultiVolumeReader::new(self.volumes);
        reader.seek(SeekFrom::Start(offset))?;
        log::trace!("{}: reading {} bytes at offset {}", path, size, offset);
        Ok(Some(EntryStream::new(reader.take(size), size)))
    }

    /// Indexes a bare compressed file as one member.
    ///
    /// The size is only known after decoding the whole stream.
    fn index_single(&mut self, top: &Volume) -> Result<()> {
        let size = io::copy(&mut self.stream()?, &mut io::sink())?;
        let name = single_member_name(top.name(), self.container.compression);
        self.files
            .push(SubFile::new(&name, size, top.modified(), false, false));
        self.offsets.push(None);
        Ok(())
    }

    /// Builds the full directory tree.
    pub(crate) fn tree(&self) -> Vec<TreeNode> {
        let mut builder = TreeBuilder::new();
        for file in &self.files {
            builder.add_file(file);
        }
        builder.build().1
    }

    /// Lists one directory level.
    pub(crate) fn read_dir(&self, path: &str) -> Result<Vec<Entry>> {
        let tree = self.tree();
        if path.is_empty() {
            return Ok(tree.into_iter().map(|n| n.entry).collect());
        }
        let node = find_in(&tree, path).ok_or_else(|| Error::not_found(path))?;
        if !node.entry.is_dir {
            return Err(Error::NotFolder {
                path: path.to_string(),
            });
        }
        Ok(node.children.iter().map(|n| n.entry.clone()).collect())
    }
}

impl ArchiveReader for ContainerFs<'_> {
    fn files(&self) -> &[SubFile] {
        &self.files
    }

    fn for_each_file(
        &mut self,
        select: &dyn Fn(&SubFile) -> bool,
        visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
    ) -> Result<()> {
        let mut stream = self.stream()?;
        if !self.container.tar {
            if let Some(file) = self.files.first() {
                if select(file) {
                    visit(file, &mut stream)?;
                }
            }
            return Ok(());
        }

        let mut archive = tar::Archive::new(stream);
        for (entry, record) in archive.entries()?.zip(&self.records) {
            let mut entry = entry?;
            let Some(index) = *record else {
                continue;
            };
            let file = &self.files[index];
            if !select(file) {
                continue;
            }
            if visit(file, &mut entry)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }
}

/// Name of the single member of a bare compressed file: the volume name
/// without its compression suffix.
pub(crate) fn single_member_name(volume_name: &str, compression: Compression) -> String {
    let lower = volume_name.to_ascii_lowercase();
    let ext = compression.extension();
    if !ext.is_empty() && lower.ends_with(ext) && lower.len() > ext.len() {
        return volume_name[..volume_name.len() - ext.len()].to_string();
    }
    match volume_name.rfind('.') {
        Some(dot) if dot > 0 => volume_name[..dot].to_string(),
        _ => format!("{volume_name}.out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_member_name() {
        assert_eq!(single_member_name("notes.txt.gz", Compression::Gzip), "notes.txt");
        assert_eq!(single_member_name("LOG.BZ2", Compression::Bzip2), "LOG");
        assert_eq!(single_member_name("dump.bin.brotli", Compression::Brotli), "dump.bin");
        assert_eq!(single_member_name("blob", Compression::Zstd), "blob.out");
    }
}
