//! 7-Zip archives, including split `.7z.001` sets.
//!
//! Split parts are plain byte-level cuts of one archive, so the volumes are
//! joined with [`MultiVolumeReader`] and handed to the decoder as a single
//! seekable stream. The decoder only yields entries in folder order, which
//! makes this a flat-list tool: `list` is not supported and callers browse
//! the tree returned by `get_meta`.
//!
//! Encryption is a property of the folder an entry is packed into: an entry
//! is encrypted when its folder's coder chain contains AES-256.

use std::collections::HashMap;
use std::io::{self, Read};
use std::path::Path;

use sevenz_rust::{Password, SevenZArchiveEntry, SevenZReader};

use crate::error::filter_password;
use crate::model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry};
use crate::progress::UpdateProgress;
use crate::timestamp::Timestamp;
use crate::tool::{
    ArchiveReader, EntryStream, SubFile, Tool, Visit, decompress_from_traversal,
    extract_from_traversal, tree_from_traversal, visit_member,
};
use crate::volume::{MultiVolumeReader, MultipartExtension, Volume, first};
use crate::{Error, ExtractOptions, Result};

/// Method id of the 7zAES coder.
const AES_METHOD_ID: &[u8] = &[0x06, 0xF1, 0x07, 0x01];

/// Tool for 7-Zip archives.
#[derive(Debug, Clone)]
pub struct SevenZipTool {
    options: ExtractOptions,
    multipart: [MultipartExtension; 1],
}

impl SevenZipTool {
    /// Creates the tool.
    pub fn new(options: ExtractOptions) -> Result<Self> {
        Ok(Self {
            options,
            multipart: [MultipartExtension::new(
                ".7z.001",
                r"^.*\.7z\.(\d+)$",
                1,
                2,
                |i| format!(".7z.{i:03}"),
            )?],
        })
    }
}

impl Tool for SevenZipTool {
    fn name(&self) -> &'static str {
        "7z"
    }

    fn accepted_extensions(&self) -> &[&'static str] {
        &[".7z"]
    }

    fn accepted_multipart_extensions(&self) -> &[MultipartExtension] {
        &self.multipart
    }

    fn get_meta(&self, volumes: &[Volume], args: &ArchiveArgs) -> Result<ArchiveMeta> {
        let mut reader = SevenZipReader::open(volumes, args)?;
        reader.verify_password()?;
        let (encrypted, tree) = tree_from_traversal(&reader);
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
        let mut reader = SevenZipReader::open(volumes, &args.args)?;
        extract_from_traversal(&mut reader, args, &self.options)
    }

    fn decompress(
        &self,
        volumes: &[Volume],
        output: &Path,
        args: &ArchiveInnerArgs,
        progress: &mut dyn UpdateProgress,
    ) -> Result<()> {
        let mut reader = SevenZipReader::open(volumes, &args.args)?;
        decompress_from_traversal(&mut reader, output, args, progress, &self.options)
    }
}

/// An opened 7z archive with its member list.
struct SevenZipReader {
    decoder: SevenZReader<MultiVolumeReader>,
    files: Vec<SubFile>,
    /// Member indices by raw entry name, in archive order.
    by_name: HashMap<String, Vec<usize>>,
    has_password: bool,
}

impl SevenZipReader {
    fn open(volumes: &[Volume], args: &ArchiveArgs) -> Result<Self> {
        let top = first(volumes)?;
        let joined = MultiVolumeReader::new(volumes);
        let len = joined.total_size();
        let password = match args.password() {
            Some(pw) => Password::from(pw),
            None => Password::empty(),
        };
        let decoder = SevenZReader::new(joined, len, password)
            .map_err(|e| classify_open_failure(volumes, args, e))?;

        let archive = decoder.archive();
        let mut files = Vec::with_capacity(archive.files.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, entry) in archive.files.iter().enumerate() {
            let encrypted = archive
                .stream_map
                .file_folder_index
                .get(index)
                .copied()
                .flatten()
                .and_then(|folder| archive.folders.get(folder))
                .is_some_and(|folder| {
                    folder
                        .coders
                        .iter()
                        .any(|c| c.decompression_method_id() == AES_METHOD_ID)
                });
            files.push(SubFile::new(
                &entry.name,
                entry.size,
                modified(entry),
                entry.is_directory,
                encrypted,
            ));
            by_name.entry(entry.name.clone()).or_default().push(index);
        }
        log::debug!(
            "{}: {} 7z entries over {} volume(s)",
            top.name(),
            files.len(),
            volumes.len()
        );

        Ok(Self {
            decoder,
            files,
            by_name,
            has_password: args.password().is_some(),
        })
    }

    /// Fully decodes the first encrypted file, if any; a wrong key fails
    /// either in the decompressor or in the CRC check.
    fn verify_password(&mut self) -> Result<()> {
        let Some(target) = self
            .files
            .iter()
            .find(|f| f.encrypted && !f.entry.is_dir)
            .map(|f| f.path.clone())
        else {
            return Ok(());
        };
        if !self.has_password {
            return Err(Error::WrongArchivePassword);
        }
        self.for_each_file(&|f| f.path == target, &mut |_, data| {
            io::copy(data, &mut io::sink())?;
            Ok(Visit::Stop)
        })
    }
}

impl ArchiveReader for SevenZipReader {
    fn files(&self) -> &[SubFile] {
        &self.files
    }

    fn for_each_file(
        &mut self,
        select: &dyn Fn(&SubFile) -> bool,
        visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
    ) -> Result<()> {
        if !self.has_password && self.files.iter().any(|f| f.encrypted && select(f)) {
            return Err(Error::WrongArchivePassword);
        }
        let keyed = self.has_password;
        let files = &self.files;
        let by_name = &self.by_name;
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut current = None;
        let mut failure = None;

        let result = self.decoder.for_each_entries(|entry, data| {
            let occurrence = seen.entry(entry.name.clone()).or_insert(0);
            let index = by_name
                .get(&entry.name)
                .and_then(|indices| indices.get(*occurrence))
                .copied();
            *occurrence += 1;
            // Unselected members are drained after this returns
            current = index;
            let Some(file) = index.map(|i| &files[i]) else {
                return Ok(true);
            };
            if !select(file) {
                return Ok(true);
            }
            match visit_member(file, data, keyed, &mut *visit) {
                Ok(Visit::Continue) => Ok(true),
                Ok(Visit::Stop) => Ok(false),
                Err(e) => {
                    failure = Some(e);
                    Ok(false)
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }
        result.map_err(|e| {
            // Draining or checksumming an encrypted member with the wrong key
            if keyed && current.is_some_and(|i| files[i].encrypted) {
                Error::WrongArchivePassword
            } else {
                classify(e)
            }
        })
    }
}

fn modified(entry: &SevenZArchiveEntry) -> Option<std::time::SystemTime> {
    entry
        .has_last_modified_date
        .then(|| Timestamp::from_filetime(u64::from(entry.last_modified_date)).as_system_time())
}

/// Maps a failure to open the archive.
///
/// With an encrypted header, a wrong password only shows up as a corrupt
/// header. If the header turns out to need a password at all, the supplied
/// one was wrong.
fn classify_open_failure(volumes: &[Volume], args: &ArchiveArgs, err: sevenz_rust::Error) -> Error {
    let err = classify(err);
    if args.password().is_some() && !err.is_password_error() {
        let joined = MultiVolumeReader::new(volumes);
        let len = joined.total_size();
        if let Err(sevenz_rust::Error::PasswordRequired) =
            SevenZReader::new(joined, len, Password::empty())
        {
            return Error::WrongArchivePassword;
        }
    }
    err
}

/// Maps decoder errors, separating password failures.
fn classify(err: sevenz_rust::Error) -> Error {
    match err {
        sevenz_rust::Error::PasswordRequired | sevenz_rust::Error::MaybeBadPassword(_) => {
            Error::WrongArchivePassword
        }
        sevenz_rust::Error::BadSignature(..) => Error::UnknownArchiveFormat,
        other => filter_password(Error::SevenZip(other)),
    }
}
