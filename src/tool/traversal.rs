//! Shared extraction over flat entry sequences.
//!
//! Decoders for zip, 7z and RAR expose archive members as a flat list that
//! can only be read in the decoder's own order. [`ArchiveReader`] captures
//! that capability; [`decompress_from_traversal`] and
//! [`extract_from_traversal`] implement the inner-path semantics of
//! [`Tool::decompress`](super::Tool::decompress) and
//! [`Tool::extract`](super::Tool::extract) once on top of it.
//!
//! # Inner path resolution
//!
//! | Inner path | Behaviour |
//! |------------|-----------|
//! | root | every entry once, progress by entry count |
//! | exact file | that file written as `output/<basename>`, progress by bytes |
//! | directory prefix | `output/<basename>` created, then every entry below it |
//! | anything else | [`Error::ObjectNotFound`] |

use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use super::EntryStream;
use super::write::{Output, Report};
use crate::model::{ArchiveInnerArgs, Entry, base_name};
use crate::progress::{UpdateProgress, percent};
use crate::{Error, ExtractOptions, Result};

/// Entries up to this size are staged in memory by `extract_from_traversal`.
const MEMORY_STAGE_LIMIT: u64 = 1 << 20;

/// One archive member in a flat listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubFile {
    /// Full path inside the archive, without leading or trailing slashes.
    pub path: String,
    /// Metadata; `entry.name` is the base name.
    pub entry: Entry,
    /// Whether the member is encrypted.
    pub encrypted: bool,
}

impl SubFile {
    /// Creates a member from a raw archive name.
    ///
    /// Backslashes are treated as separators and surrounding slashes are
    /// dropped.
    pub fn new(raw_name: &str, size: u64, modified: Option<std::time::SystemTime>, is_dir: bool, encrypted: bool) -> Self {
        let path = raw_name.replace('\\', "/").trim_matches('/').to_string();
        let name = base_name(&path).to_string();
        let entry = if is_dir {
            Entry::dir(name, modified)
        } else {
            Entry::file(name, size, modified)
        };
        Self {
            path,
            entry,
            encrypted,
        }
    }
}

/// Whether a traversal keeps going after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Read the next selected member.
    Continue,
    /// Stop the traversal.
    Stop,
}

/// Hands one member's decoded content to `visit`.
///
/// A wrong key only shows up as corrupt data or a checksum mismatch while
/// an encrypted member is read. When `keyed` is set and reading the member
/// failed, the visitor's error becomes [`Error::WrongArchivePassword`].
/// Errors the visitor raises on its own, such as a failed write, pass
/// through unchanged.
pub(crate) fn visit_member(
    file: &SubFile,
    data: &mut dyn Read,
    keyed: bool,
    visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
) -> Result<Visit> {
    let mut data = TrackedRead {
        inner: data,
        failed: false,
    };
    match visit(file, &mut data) {
        Err(_) if keyed && file.encrypted && data.failed => Err(Error::WrongArchivePassword),
        other => other,
    }
}

/// Remembers whether the wrapped decoder ever failed a read.
struct TrackedRead<'a> {
    inner: &'a mut dyn Read,
    failed: bool,
}

impl Read for TrackedRead<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|e| {
            if e.kind() != io::ErrorKind::Interrupted {
                self.failed = true;
            }
        })
    }
}

/// A decoder exposing its members as a flat, decoder-ordered sequence.
pub trait ArchiveReader {
    /// All members, in decoder order.
    fn files(&self) -> &[SubFile];

    /// Decodes every member `select` accepts, in decoder order, handing its
    /// content to `visit`.
    ///
    /// Directories are visited with an empty reader. An error from `visit`
    /// ends the traversal and is returned unchanged.
    fn for_each_file(
        &mut self,
        select: &dyn Fn(&SubFile) -> bool,
        visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
    ) -> Result<()>;
}

/// Writes the member or subtree named by `args.inner_path` under `output`.
pub fn decompress_from_traversal(
    reader: &mut dyn ArchiveReader,
    output: &Path,
    args: &ArchiveInnerArgs,
    progress: &mut dyn UpdateProgress,
    options: &ExtractOptions,
) -> Result<()> {
    let inner = args.relative_path();
    let out = Output::new(output, options);

    if inner.is_empty() {
        let total = reader.files().len() as u64;
        return write_all(reader, &out, "", total, &|_| true, progress);
    }

    let exact = reader
        .files()
        .iter()
        .any(|f| f.path == inner && !f.entry.is_dir);
    if exact {
        let mut written = false;
        reader.for_each_file(&|f| f.path == inner && !f.entry.is_dir, &mut |file, data| {
            if progress.should_cancel() {
                return Err(Error::Cancelled);
            }
            out.write_file(
                &file.entry.name,
                data,
                file.entry.size,
                file.entry.modified,
                progress,
                Report::Bytes,
            )?;
            written = true;
            Ok(Visit::Stop)
        })?;
        return if written {
            Ok(())
        } else {
            Err(Error::not_found(inner))
        };
    }

    let prefix = format!("{inner}/");
    let below = |f: &SubFile| f.path.starts_with(&prefix);
    let total = reader.files().iter().filter(|f| below(f)).count() as u64;
    let is_dir = total > 0 || reader.files().iter().any(|f| f.path == inner);
    if !is_dir {
        return Err(Error::not_found(inner));
    }

    let sub = out.create_subdir(base_name(inner))?;
    log::debug!("decompressing {} entries below {}", total, inner);
    write_all(reader, &sub, &prefix, total, &below, progress)
}

/// Writes every selected member relative to `strip`, reporting progress per
/// entry.
fn write_all(
    reader: &mut dyn ArchiveReader,
    out: &Output<'_>,
    strip: &str,
    total: u64,
    select: &dyn Fn(&SubFile) -> bool,
    progress: &mut dyn UpdateProgress,
) -> Result<()> {
    let mut done = 0u64;
    reader.for_each_file(select, &mut |file, data| {
        if progress.should_cancel() {
            return Err(Error::Cancelled);
        }
        let name = file.path.strip_prefix(strip).unwrap_or(&file.path);
        if file.entry.is_dir {
            out.create_dir_all(name)?;
        } else {
            out.write_file(
                name,
                data,
                file.entry.size,
                file.entry.modified,
                progress,
                Report::Silent,
            )?;
        }
        done += 1;
        progress.update(percent(done, total));
        Ok(Visit::Continue)
    })?;
    if total == 0 {
        progress.update(100.0);
    }
    Ok(())
}

/// Opens the member at `args.inner_path` for reading.
///
/// The decoder cannot hand out a reader that outlives the traversal, so the
/// member is staged: small members in memory, larger ones in an anonymous
/// temporary file.
pub fn extract_from_traversal(
    reader: &mut dyn ArchiveReader,
    args: &ArchiveInnerArgs,
    options: &ExtractOptions,
) -> Result<EntryStream> {
    let inner = args.relative_path();
    let file = reader
        .files()
        .iter()
        .find(|f| f.path == inner)
        .ok_or_else(|| Error::not_found(inner))?;
    if file.entry.is_dir {
        return Err(Error::NotFile {
            path: inner.to_string(),
        });
    }

    let mut staged = None;
    reader.for_each_file(&|f| f.path == inner && !f.entry.is_dir, &mut |file, data| {
        staged = Some(stage(data, file.entry.size, options)?);
        Ok(Visit::Stop)
    })?;
    staged.ok_or_else(|| Error::not_found(inner))
}

fn stage(data: &mut dyn Read, size: u64, options: &ExtractOptions) -> Result<EntryStream> {
    if size <= MEMORY_STAGE_LIMIT {
        let mut buf = Vec::with_capacity(size as usize);
        data.read_to_end(&mut buf)?;
        return Ok(EntryStream::new(Cursor::new(buf), size));
    }
    let mut file = options.make_temp_file()?;
    io::copy(data, &mut file)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(EntryStream::new(file, size))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;

    /// In-memory reader used to exercise the engine without a decoder.
    pub(crate) struct MemoryArchive {
        files: Vec<SubFile>,
        data: Vec<Vec<u8>>,
    }

    impl MemoryArchive {
        pub(crate) fn new(members: &[(&str, Option<&[u8]>)]) -> Self {
            let mut files = Vec::new();
            let mut data = Vec::new();
            for (name, content) in members {
                match content {
                    Some(bytes) => {
                        files.push(SubFile::new(name, bytes.len() as u64, None, false, false));
                        data.push(bytes.to_vec());
                    }
                    None => {
                        files.push(SubFile::new(name, 0, None, true, false));
                        data.push(Vec::new());
                    }
                }
            }
            Self { files, data }
        }
    }

    impl ArchiveReader for MemoryArchive {
        fn files(&self) -> &[SubFile] {
            &self.files
        }

        fn for_each_file(
            &mut self,
            select: &dyn Fn(&SubFile) -> bool,
            visit: &mut dyn FnMut(&SubFile, &mut dyn Read) -> Result<Visit>,
        ) -> Result<()> {
            for (file, data) in self.files.iter().zip(&self.data) {
                if !select(file) {
                    continue;
                }
                if visit(file, &mut data.as_slice())? == Visit::Stop {
                    break;
                }
            }
            Ok(())
        }
    }

    fn sample() -> MemoryArchive {
        MemoryArchive::new(&[
            ("docs/", None),
            ("docs/readme.txt", Some(b"read me".as_slice())),
            ("docs/img/logo.png", Some(b"png".as_slice())),
            ("top.txt", Some(b"top".as_slice())),
        ])
    }

    #[test]
    fn test_decompress_root() {
        let tmp = tempfile::tempdir().unwrap();
        let mut seen = Vec::new();
        decompress_from_traversal(
            &mut sample(),
            tmp.path(),
            &ArchiveInnerArgs::new("", "/"),
            &mut |p: f64| seen.push(p),
            &ExtractOptions::default(),
        )
        .unwrap();

        assert_eq!(fs::read(tmp.path().join("docs/readme.txt")).unwrap(), b"read me");
        assert_eq!(fs::read(tmp.path().join("docs/img/logo.png")).unwrap(), b"png");
        assert_eq!(fs::read(tmp.path().join("top.txt")).unwrap(), b"top");
        assert_eq!(seen, vec![25.0, 50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_decompress_exact_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut last = 0.0;
        decompress_from_traversal(
            &mut sample(),
            tmp.path(),
            &ArchiveInnerArgs::new("", "/docs/img/logo.png"),
            &mut |p: f64| last = p,
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(fs::read(tmp.path().join("logo.png")).unwrap(), b"png");
        assert_eq!(last, 100.0);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_decompress_subtree() {
        let tmp = tempfile::tempdir().unwrap();
        decompress_from_traversal(
            &mut sample(),
            tmp.path(),
            &ArchiveInnerArgs::new("", "docs"),
            &mut NoProgress,
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(fs::read(tmp.path().join("docs/readme.txt")).unwrap(), b"read me");
        assert_eq!(fs::read(tmp.path().join("docs/img/logo.png")).unwrap(), b"png");
        assert!(!tmp.path().join("top.txt").exists());
    }

    #[test]
    fn test_decompress_subtree_without_directory_records() {
        let mut archive = MemoryArchive::new(&[("a/b/c.txt", Some(b"c".as_slice())), ("a/d.txt", Some(b"d".as_slice()))]);
        let tmp = tempfile::tempdir().unwrap();
        decompress_from_traversal(
            &mut archive,
            tmp.path(),
            &ArchiveInnerArgs::new("", "a/b"),
            &mut NoProgress,
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(fs::read(tmp.path().join("b/c.txt")).unwrap(), b"c");
        assert!(!tmp.path().join("b/d.txt").exists());
    }

    #[test]
    fn test_decompress_subtree_dir_already_present() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("docs")).unwrap();
        let err = decompress_from_traversal(
            &mut sample(),
            tmp.path(),
            &ArchiveInnerArgs::new("", "docs"),
            &mut NoProgress,
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::AlreadyExists));
    }

    #[test]
    fn test_decompress_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let err = decompress_from_traversal(
            &mut sample(),
            tmp.path(),
            &ArchiveInnerArgs::new("", "doc"),
            &mut NoProgress,
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_decompress_rejects_traversal() {
        let mut archive = MemoryArchive::new(&[("ok.txt", Some(b"ok".as_slice())), ("../../evil.txt", Some(b"x".as_slice()))]);
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir(&out).unwrap();
        let err = decompress_from_traversal(
            &mut archive,
            &out,
            &ArchiveInnerArgs::new("", ""),
            &mut NoProgress,
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(err.is_security_error());
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_decompress_cancelled_before_first_entry() {
        struct Cancelled;
        impl UpdateProgress for Cancelled {
            fn update(&mut self, _percent: f64) {}
            fn should_cancel(&self) -> bool {
                true
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let err = decompress_from_traversal(
            &mut sample(),
            tmp.path(),
            &ArchiveInnerArgs::new("", ""),
            &mut Cancelled,
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extract_file() {
        let stream = extract_from_traversal(
            &mut sample(),
            &ArchiveInnerArgs::new("", "/docs/readme.txt"),
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(stream.size, 7);
        assert_eq!(stream.into_bytes().unwrap(), b"read me");
    }

    #[test]
    fn test_extract_directory_is_not_file() {
        let err = extract_from_traversal(
            &mut sample(),
            &ArchiveInnerArgs::new("", "docs"),
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFile { .. }));
    }

    #[test]
    fn test_extract_missing() {
        let err = extract_from_traversal(
            &mut sample(),
            &ArchiveInnerArgs::new("", "nope"),
            &ExtractOptions::default(),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_extract_large_member_is_spooled() {
        let big = vec![7u8; (MEMORY_STAGE_LIMIT + 10) as usize];
        let mut archive = MemoryArchive::new(&[("big.bin", Some(big.as_slice()))]);
        let stream = extract_from_traversal(
            &mut archive,
            &ArchiveInnerArgs::new("", "big.bin"),
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(stream.into_bytes().unwrap(), big);
    }

    struct Garbled;

    impl Read for Garbled {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::InvalidData, "Corrupted input data"))
        }
    }

    fn drain(_: &SubFile, data: &mut dyn Read) -> Result<Visit> {
        io::copy(data, &mut io::sink())?;
        Ok(Visit::Continue)
    }

    #[test]
    fn test_visit_member_read_failure_on_encrypted() {
        let locked = SubFile::new("secret.txt", 4, None, false, true);
        let err = visit_member(&locked, &mut Garbled, true, &mut drain).unwrap_err();
        assert!(err.is_password_error());

        // Without a key or on a plain member the decoder error stays as is
        let err = visit_member(&locked, &mut Garbled, false, &mut drain).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        let plain = SubFile::new("plain.txt", 4, None, false, false);
        let err = visit_member(&plain, &mut Garbled, true, &mut drain).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_visit_member_keeps_visitor_errors() {
        let locked = SubFile::new("secret.txt", 4, None, false, true);
        let err = visit_member(&locked, &mut b"data".as_slice(), true, &mut |_, _| {
            Err(Error::Io(io::Error::new(io::ErrorKind::AlreadyExists, "exists")))
        })
        .unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::AlreadyExists));
    }

    #[test]
    fn test_sub_file_normalizes_names() {
        let file = SubFile::new("\\win\\path.txt", 1, None, false, true);
        assert_eq!(file.path, "win/path.txt");
        assert_eq!(file.entry.name, "path.txt");
        assert!(file.encrypted);
        let dir = SubFile::new("a/b/", 0, None, true, false);
        assert_eq!(dir.path, "a/b");
        assert!(dir.entry.is_dir);
    }
}
