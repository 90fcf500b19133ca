//! RAR archives, including `.partN.rar` multi-volume sets.
//!
//! The RAR decoder only opens archives by path and finds sibling volumes by
//! name, so the volumes are first spooled into a [`PartDir`] under canonical
//! part names. Entries come out in decoder order, which is not parent-first;
//! the tree is built from the member list sorted by path length.
//!
//! Members are decoded to a staging file inside the part directory and
//! handed to the visitor from there. The part directory lives until the
//! first volume is closed.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use unrar::Archive;
use unrar::error::{Code, UnrarError};

use crate::error::filter_password;
use crate::model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry};
use crate::progress::UpdateProgress;
use crate::timestamp::from_dos_datetime;
use crate::tool::{
    ArchiveReader, EntryStream, SubFile, Tool, TreeBuilder, Visit, decompress_from_traversal,
    extract_from_traversal, remove_staged,
};
use crate::volume::{MultipartExtension, PartDir, Volume, first};
use crate::{Error, ExtractOptions, Result};

/// Tool for RAR archives.
#[derive(Debug, Clone)]
pub struct RarTool {
    options: ExtractOptions,
    multipart: [MultipartExtension; 1],
}

impl RarTool {
    /// Creates the tool.
    pub fn new(options: ExtractOptions) -> Result<Self> {
        Ok(Self {
            options,
            multipart: [MultipartExtension::new(
                ".part1.rar",
                r"^.*\.part(\d+)\.rar$",
                1,
                2,
                |i| format!(".part{i}.rar"),
            )?],
        })
    }
}

impl Tool for RarTool {
    fn name(&self) -> &'static str {
        "rar"
    }

    fn accepted_extensions(&self) -> &[&'static str] {
        &[".rar"]
    }

    fn accepted_multipart_extensions(&self) -> &[MultipartExtension] {
        &self.multipart
    }

    fn get_meta(&self, volumes: &[Volume], args: &ArchiveArgs) -> Result<ArchiveMeta> {
        let mut reader = RarReader::open(volumes, args, &self.options)?;
        reader.verify_password()?;

        let mut sorted: Vec<&SubFile> = reader.files.iter().collect();
        sorted.sort_by_key(|f| f.path.len());
        let mut builder = TreeBuilder::new();
        for file in sorted {
            builder.add_file(file);
        }
        let (encrypted, tree) = builder.build();
        Ok(ArchiveMeta {
            comment: String::new(),
            encrypted,
            tree: Some(tree),
        })
    }

    fn list(&self, _volumes: &[Volume], _args: &ArchiveInnerArgs) -> Result<Vec<Entry>> {
        Err(Error::not_supported("list"))
    }

    fn extract(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<EntryStream> {
        let mut reader = RarReader::open(volumes, &args.args, &self.options)?;
        extract_from_traversal(&mut reader, args, &self.options)
    }

    fn decompress(
        &self,
        volumes: &[Volume],
        output: &Path,
        args: &ArchiveInnerArgs,
        progress: &mut dyn UpdateProgress,
    ) -> Result<()> {
        let mut reader = RarReader::open(volumes, &args.args, &self.options)?;
        decompress_from_traversal(&mut reader, output, args, progress, &self.options)
    }
}

/// A spooled RAR archive and its member list.
struct RarReader {
    parts: PartDir,
    files: Vec<SubFile>,
    password: Option<String>,
}

impl RarReader {
    fn open(volumes: &[Volume], args: &ArchiveArgs, options: &ExtractOptions) -> Result<Self> {
        let top = first(volumes)?;
        let parts = PartDir::spool(volumes, options)?;
        let password = args.password().map(str::to_string);

        let listing = archive(&parts, password.as_deref())
            .open_for_listing()
            .map_err(classify_open)?;
        let mut files = Vec::new();
        let mut seen = HashSet::new();
        for header in listing {
            let header = header.map_err(classify_open)?;
            let name = header.filename.to_string_lossy();
            let file = SubFile::new(
                &name,
                header.unpacked_size,
                from_dos_datetime(header.file_time),
                header.is_directory(),
                header.is_encrypted(),
            );
            // Entries continued from a previous volume repeat their header
            if file.path.is_empty() || !seen.insert(file.path.clone()) {
                continue;
            }
            files.push(file);
        }
        log::debug!(
            "{}: {} rar entries over {} volume(s)",
            top.name(),
            files.len(),
            parts.len()
        );

        Ok(Self {
            parts,
            files,
            password,
        })
    }

    /// Fully decodes the first encrypted file, if any. RAR4 archives only
    /// detect a wrong key through the CRC check at the end of the file.
    fn verify_password(&mut self) -> Result<()> {
        let Some(target) = self
            .files
            .iter()
            .find(|f| f.encrypted && !f.entry.is_dir)
            .map(|f| f.path.clone())
        else {
            return Ok(());
        };
        if self.password.is_none() {
            return Err(Error::WrongArchivePassword);
        }
        self.for_each_file(&|f| f.path == target, &mut |_, data| {
            io::copy(data, &mut io::sink())?;
            Ok(Visit::Stop)
        })
    }
}

impl ArchiveReader for RarReader {
    fn files(&self) -> &[SubFile] {
        &self.files
    }

    fn for_each_file(
        &mut self,
        select: &dyn Fn(&SubFile) -> bool,
        visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
    ) -> Result<()> {
        if self.password.is_none() && self.files.iter().any(|f| f.encrypted && select(f)) {
            return Err(Error::WrongArchivePassword);
        }
        let by_path: HashMap<&str, usize> = self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| (f.path.as_str(), i))
            .collect();
        let mut done = HashSet::new();
        let keyed = self.password.is_some();

        let mut cursor = archive(&self.parts, self.password.as_deref())
            .open_for_processing()
            .map_err(classify)?;
        while let Some(header) = cursor.read_header().map_err(classify)? {
            let name = header.entry().filename.to_string_lossy().replace('\\', "/");
            let index = by_path
                .get(name.trim_matches('/'))
                .copied()
                .filter(|&i| done.insert(i));
            let Some(file) = index.map(|i| &self.files[i]).filter(|f| select(f)) else {
                cursor = header.skip().map_err(classify)?;
                continue;
            };

            if file.entry.is_dir {
                cursor = header.skip().map_err(classify)?;
                if visit(file, &mut io::empty())? == Visit::Stop {
                    break;
                }
                continue;
            }

            let staged = self.parts.dir().join(format!("entry-{}", done.len()));
            cursor = header
                .extract_to(&staged)
                .map_err(|e| classify_member(e, file, keyed))?;
            let outcome = File::open(&staged)
                .map_err(Error::from)
                .and_then(|f| visit(file, &mut BufReader::new(f)));
            remove_staged(&staged);
            if outcome? == Visit::Stop {
                break;
            }
        }
        Ok(())
    }
}

fn archive<'a>(parts: &'a PartDir, password: Option<&'a str>) -> Archive<'a> {
    match password {
        Some(pw) => Archive::with_password(parts.main_path(), pw),
        None => Archive::new(parts.main_path()),
    }
}

/// Maps errors from opening the archive; a missing or damaged signature
/// means the content is not RAR at all.
fn classify_open(err: UnrarError) -> Error {
    match err.code {
        Code::UnknownFormat | Code::BadArchive => Error::UnknownArchiveFormat,
        _ => classify(err),
    }
}

/// Maps a failure to decode one member. With a key supplied, corrupt data
/// in an encrypted member means the key was wrong.
fn classify_member(err: UnrarError, file: &SubFile, keyed: bool) -> Error {
    if keyed && file.encrypted && matches!(err.code, Code::BadData) {
        return Error::WrongArchivePassword;
    }
    classify(err)
}

/// Maps decoder errors, separating password failures.
fn classify(err: UnrarError) -> Error {
    match err.code {
        Code::MissingPassword | Code::BadPassword => Error::WrongArchivePassword,
        _ => filter_password(Error::Rar(err)),
    }
}
