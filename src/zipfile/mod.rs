//! Zip archives.
//!
//! The central directory is a flat list of names, so the tree is rebuilt by
//! [`TreeBuilder`](crate::tool::TreeBuilder). Entries may be encrypted
//! individually (ZipCrypto or WinZip AES); when any is, `get_meta` and a root
//! `list` check the password against the first encrypted entry so a wrong
//! password is reported before the caller starts reading.

pub mod charset;

use std::io::Read;
use std::path::Path;

use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::filter_password;
use crate::model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry, find_in};
use crate::progress::UpdateProgress;
use crate::timestamp::from_civil;
use crate::tool::{
    ArchiveReader, EntryStream, SubFile, Tool, TreeBuilder, Visit, decompress_from_traversal,
    extract_from_traversal, visit_member,
};
use crate::volume::{MultiVolumeReader, Volume, first};
use crate::{Error, ExtractOptions, Result};

/// Bytes decoded from the first encrypted entry to check a password.
const PASSWORD_CHECK_LEN: usize = 4096;

/// Tool for zip archives.
#[derive(Debug, Clone, Default)]
pub struct ZipTool {
    options: ExtractOptions,
}

impl ZipTool {
    /// Creates the tool.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

impl Tool for ZipTool {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn accepted_extensions(&self) -> &[&'static str] {
        &[".zip"]
    }

    fn get_meta(&self, volumes: &[Volume], args: &ArchiveArgs) -> Result<ArchiveMeta> {
        let mut reader = ZipReader::open(volumes, args)?;
        reader.verify_password()?;

        let mut builder = TreeBuilder::new();
        for file in &reader.files {
            builder.add_file(file);
        }
        let (encrypted, tree) = builder.build();
        Ok(ArchiveMeta {
            comment: charset::decode(reader.archive.comment()).into_owned(),
            encrypted,
            tree: Some(tree),
        })
    }

    fn list(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<Vec<Entry>> {
        let mut reader = ZipReader::open(volumes, &args.args)?;
        let inner = args.relative_path();
        if inner.is_empty() {
            reader.verify_password()?;
        }

        let mut builder = TreeBuilder::new();
        for file in &reader.files {
            builder.add_file(file);
        }
        let (_, tree) = builder.build();
        if inner.is_empty() {
            return Ok(tree.into_iter().map(|n| n.entry).collect());
        }
        let node = find_in(&tree, inner).ok_or_else(|| Error::not_found(inner))?;
        if !node.entry.is_dir {
            return Err(Error::NotFolder {
                path: inner.to_string(),
            });
        }
        Ok(node.children.iter().map(|n| n.entry.clone()).collect())
    }

    fn extract(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<EntryStream> {
        let mut reader = ZipReader::open(volumes, &args.args)?;
        extract_from_traversal(&mut reader, args, &self.options)
    }

    fn decompress(
        &self,
        volumes: &[Volume],
        output: &Path,
        args: &ArchiveInnerArgs,
        progress: &mut dyn UpdateProgress,
    ) -> Result<()> {
        let mut reader = ZipReader::open(volumes, &args.args)?;
        decompress_from_traversal(&mut reader, output, args, progress, &self.options)
    }
}

/// An opened zip archive and its decoded member list.
struct ZipReader {
    archive: ZipArchive<MultiVolumeReader>,
    files: Vec<SubFile>,
    password: Option<String>,
}

impl ZipReader {
    fn open(volumes: &[Volume], args: &ArchiveArgs) -> Result<Self> {
        let top = first(volumes)?;
        let mut archive =
            ZipArchive::new(MultiVolumeReader::new(volumes)).map_err(classify_open)?;

        let mut files = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive.by_index_raw(index).map_err(classify)?;
            let name = charset::decode(file.name_raw()).into_owned();
            let last_modified: Option<zip::DateTime> = file.last_modified().into();
            let modified = last_modified.and_then(|dt| {
                from_civil(
                    i32::from(dt.year()),
                    u32::from(dt.month()),
                    u32::from(dt.day()),
                    u32::from(dt.hour()),
                    u32::from(dt.minute()),
                    u32::from(dt.second()),
                    0,
                )
            });
            files.push(SubFile::new(
                &name,
                file.size(),
                modified,
                file.is_dir(),
                file.encrypted(),
            ));
        }
        log::debug!("{}: {} zip entries", top.name(), files.len());

        Ok(Self {
            archive,
            files,
            password: args.password().map(str::to_string),
        })
    }

    /// Decodes the start of the first encrypted entry, if any.
    fn verify_password(&mut self) -> Result<()> {
        let Some(index) = self.files.iter().position(|f| f.encrypted && !f.entry.is_dir) else {
            return Ok(());
        };
        let password = self
            .password
            .as_deref()
            .ok_or(Error::WrongArchivePassword)?;
        let file = self
            .archive
            .by_index_decrypt(index, password.as_bytes())
            .map_err(classify)?;
        let mut head = [0u8; PASSWORD_CHECK_LEN];
        // Garbage from a wrong key surfaces as a decompression error
        file.take(PASSWORD_CHECK_LEN as u64)
            .read(&mut head)
            .map_err(|_| Error::WrongArchivePassword)?;
        Ok(())
    }
}

impl ArchiveReader for ZipReader {
    fn files(&self) -> &[SubFile] {
        &self.files
    }

    fn for_each_file(
        &mut self,
        select: &dyn Fn(&SubFile) -> bool,
        visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
    ) -> Result<()> {
        for (index, file) in self.files.iter().enumerate() {
            if !select(file) {
                continue;
            }
            if file.entry.is_dir {
                if visit(file, &mut std::io::empty())? == Visit::Stop {
                    break;
                }
                continue;
            }

            let mut entry = if file.encrypted {
                let password = self
                    .password
                    .as_deref()
                    .ok_or(Error::WrongArchivePassword)?;
                self.archive
                    .by_index_decrypt(index, password.as_bytes())
                    .map_err(classify)?
            } else {
                self.archive.by_index(index).map_err(classify)?
            };
            if visit_member(file, &mut entry, true, &mut *visit)? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }
}

/// Maps errors from opening the archive; a missing central directory means
/// the content is not a zip at all.
fn classify_open(err: ZipError) -> Error {
    match err {
        ZipError::InvalidArchive(_) => Error::UnknownArchiveFormat,
        other => classify(other),
    }
}

/// Maps decoder errors, separating password failures.
fn classify(err: ZipError) -> Error {
    match err {
        ZipError::InvalidPassword => Error::WrongArchivePassword,
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => {
            Error::WrongArchivePassword
        }
        ZipError::Io(e) => Error::Io(e),
        other => filter_password(Error::Zip(other)),
    }
}
