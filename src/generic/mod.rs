//! Tar archives and single-file compressed streams.
//!
//! The generic tool handles every container that is a plain byte stream
//! after decompression: tar, optionally wrapped in gzip, bzip2, XZ,
//! Zstandard, LZ4, lzip, Snappy, brotli or zlib, and bare compressed files,
//! which expose one member named after the volume without its compression
//! suffix.
//!
//! The container is sniffed from its content (see [`detect`]), indexed in
//! one decoding pass, and exposed as a hierarchical filesystem.

pub mod codec;
pub mod detect;
mod fs;

pub use detect::{Compression, Container};

use std::path::Path;

use fs::ContainerFs;

use crate::model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry};
use crate::progress::UpdateProgress;
use crate::tool::{
    ArchiveReader, EntryStream, Tool, decompress_from_traversal, extract_from_traversal,
};
use crate::volume::Volume;
use crate::{Error, ExtractOptions, Result};

/// Extensions owned by the generic tool.
const EXTENSIONS: &[&str] = &[
    ".tar", ".tgz", ".tbz2", ".tbz", ".txz", ".tzst", ".tlz4", ".tlz", ".gz", ".bz2", ".xz", ".zst",
    ".lz4", ".lz", ".sz", ".br", ".zz", ".tar.gz", ".tar.bz2", ".tar.xz", ".tar.zst", ".tar.lz4",
    ".tar.lz", ".tar.sz", ".tar.br", ".tar.zz",
];

/// Tool for tar and stream-compressed containers.
#[derive(Debug, Clone, Default)]
pub struct GenericTool {
    options: ExtractOptions,
}

impl GenericTool {
    /// Creates the tool.
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }
}

impl Tool for GenericTool {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn accepted_extensions(&self) -> &[&'static str] {
        EXTENSIONS
    }

    fn get_meta(&self, volumes: &[Volume], _args: &ArchiveArgs) -> Result<ArchiveMeta> {
        let fs = ContainerFs::open(volumes)?;
        Ok(ArchiveMeta {
            comment: String::new(),
            encrypted: false,
            tree: Some(fs.tree()),
        })
    }

    fn list(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<Vec<Entry>> {
        ContainerFs::open(volumes)?.read_dir(args.relative_path())
    }

    fn extract(&self, volumes: &[Volume], args: &ArchiveInnerArgs) -> Result<EntryStream> {
        let mut fs = ContainerFs::open(volumes)?;
        if fs.container().tar {
            if let Some(stream) = fs.stored_member(args.relative_path())? {
                return Ok(stream);
            }
            return extract_from_traversal(&mut fs, args, &self.options);
        }

        // A bare compressed file streams straight from the decoder
        let inner = args.relative_path();
        let member = fs
            .files()
            .first()
            .filter(|f| f.path == inner)
            .ok_or_else(|| Error::not_found(inner))?;
        Ok(EntryStream {
            reader: fs.stream()?,
            size: member.entry.size,
        })
    }

    fn decompress(
        &self,
        volumes: &[Volume],
        output: &Path,
        args: &ArchiveInnerArgs,
        progress: &mut dyn UpdateProgress,
    ) -> Result<()> {
        let mut fs = ContainerFs::open(volumes)?;
        decompress_from_traversal(&mut fs, output, args, progress, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::find_in;
    use crate::progress::NoProgress;
    use std::io::Write;

    fn tar_volume(name: &str) -> Volume {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in [("dir/a.txt", &b"alpha"[..]), ("dir/sub/b.txt", &b"beta"[..]), ("c.txt", &b"gamma"[..])] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(1_600_000_000);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        let tar = builder.into_inner().unwrap();
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(&tar).unwrap();
        Volume::from_bytes(name, enc.finish().unwrap())
    }

    fn tool() -> GenericTool {
        GenericTool::new(ExtractOptions::default())
    }

    #[test]
    fn test_get_meta_tree() {
        let volumes = [tar_volume("x.tar.gz")];
        let meta = tool().get_meta(&volumes, &ArchiveArgs::default()).unwrap();
        assert!(!meta.encrypted);
        let tree = meta.tree.unwrap();
        assert_eq!(find_in(&tree, "dir/sub/b.txt").unwrap().entry.size, 4);
        assert!(find_in(&tree, "dir/sub").unwrap().entry.is_dir);
        assert_eq!(
            find_in(&tree, "c.txt").unwrap().entry.modified,
            Some(crate::timestamp::from_unix_secs(1_600_000_000))
        );
    }

    #[test]
    fn test_list_levels() {
        let volumes = [tar_volume("x.tgz")];
        let root = tool().list(&volumes, &ArchiveInnerArgs::new("", "/")).unwrap();
        let names: Vec<_> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dir", "c.txt"]);

        let dir = tool().list(&volumes, &ArchiveInnerArgs::new("", "dir")).unwrap();
        let names: Vec<_> = dir.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);

        let err = tool().list(&volumes, &ArchiveInnerArgs::new("", "c.txt")).unwrap_err();
        assert!(matches!(err, Error::NotFolder { .. }));
        let err = tool().list(&volumes, &ArchiveInnerArgs::new("", "nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_extract_member() {
        let volumes = [tar_volume("x.tar.gz")];
        let stream = tool()
            .extract(&volumes, &ArchiveInnerArgs::new("", "dir/sub/b.txt"))
            .unwrap();
        assert_eq!(stream.size, 4);
        assert_eq!(stream.into_bytes().unwrap(), b"beta");
    }

    #[test]
    fn test_decompress_directory() {
        let volumes = [tar_volume("x.tar.gz")];
        let out = tempfile::tempdir().unwrap();
        tool()
            .decompress(&volumes, out.path(), &ArchiveInnerArgs::new("", "dir"), &mut NoProgress)
            .unwrap();
        assert_eq!(std::fs::read(out.path().join("dir/a.txt")).unwrap(), b"alpha");
        assert_eq!(std::fs::read(out.path().join("dir/sub/b.txt")).unwrap(), b"beta");
        assert!(!out.path().join("c.txt").exists());
    }

    #[test]
    fn test_bare_compressed_file() {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
        enc.write_all(b"plain text payload").unwrap();
        let volumes = [Volume::from_bytes("notes.txt.bz2", enc.finish().unwrap())];

        let root = tool().list(&volumes, &ArchiveInnerArgs::new("", "")).unwrap();
        assert_eq!(root, vec![Entry::file("notes.txt", 18, None)]);

        let stream = tool()
            .extract(&volumes, &ArchiveInnerArgs::new("", "notes.txt"))
            .unwrap();
        assert_eq!(stream.into_bytes().unwrap(), b"plain text payload");

        let err = tool()
            .extract(&volumes, &ArchiveInnerArgs::new("", "other"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_stored_tar_member_reads_across_volumes() {
        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in [("first.txt", &b"first"[..]), ("big/blob.bin", &payload[..])] {
            let mut header = tar::Header::new_ustar();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        let tar = builder.into_inner().unwrap();
        let volumes = [
            Volume::from_bytes("x.tar.001", tar[..1700].to_vec()),
            Volume::from_bytes("x.tar.002", tar[1700..].to_vec()),
        ];

        let fs = ContainerFs::open(&volumes).unwrap();
        assert!(fs.stored_member("big/blob.bin").unwrap().is_some());
        assert!(fs.stored_member("big").unwrap().is_none());

        let stream = tool()
            .extract(&volumes, &ArchiveInnerArgs::new("", "big/blob.bin"))
            .unwrap();
        assert_eq!(stream.size, 3000);
        assert_eq!(stream.into_bytes().unwrap(), payload);

        let err = tool()
            .extract(&volumes, &ArchiveInnerArgs::new("", "big"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFile { .. }), "{err}");
    }

    #[test]
    fn test_compressed_tar_has_no_stored_members() {
        let volumes = [tar_volume("x.tar.gz")];
        let fs = ContainerFs::open(&volumes).unwrap();
        assert!(fs.stored_member("c.txt").unwrap().is_none());
    }

    #[test]
    fn test_snappy_and_lzip_extensions() {
        let mut enc = snap::write::FrameEncoder::new(Vec::new());
        enc.write_all(b"framed text").unwrap();
        let volumes = [Volume::from_bytes("notes.txt.sz", enc.into_inner().unwrap())];
        let root = tool().list(&volumes, &ArchiveInnerArgs::new("", "")).unwrap();
        assert_eq!(root, vec![Entry::file("notes.txt", 11, None)]);

        for ext in [".lz", ".sz", ".tar.lz", ".tar.sz", ".tlz"] {
            assert!(EXTENSIONS.contains(&ext), "{ext}");
        }
    }

    #[test]
    fn test_zero_filled_tar_is_empty() {
        let volumes = [Volume::from_bytes("blank.tar", vec![0u8; 10240])];
        let meta = tool().get_meta(&volumes, &ArchiveArgs::default()).unwrap();
        assert_eq!(meta.tree, Some(Vec::new()));
        let root = tool().list(&volumes, &ArchiveInnerArgs::new("", "/")).unwrap();
        assert!(root.is_empty());
    }

    #[test]
    fn test_unknown_content() {
        let volumes = [Volume::from_bytes("x.tar", b"not a tar at all".to_vec())];
        let err = tool().get_meta(&volumes, &ArchiveArgs::default()).unwrap_err();
        assert!(matches!(err, Error::UnknownArchiveFormat));
    }

    #[test]
    fn test_no_volumes() {
        let err = tool().get_meta(&[], &ArchiveArgs::default()).unwrap_err();
        assert!(matches!(err, Error::NoVolumes));
    }
}
