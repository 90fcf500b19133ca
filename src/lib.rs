//! # arcfs
//!
//! Browse, list, stream and extract archives that live on arbitrary storage.
//!
//! The caller hands the engine seekable byte sources ([`Volume`]s); the
//! engine treats them as one logical archive and exposes its contents through
//! a single [`Tool`] contract, whatever the format:
//!
//! | Format | Tool | Multi-volume | Encryption |
//! |--------|------|--------------|------------|
//! | tar, gzip, bzip2, xz, zstd, lz4, brotli, zlib | [`GenericTool`](generic::GenericTool) | byte-level | - |
//! | zip | [`ZipTool`](zipfile::ZipTool) | byte-level | ZipCrypto, WinZip AES |
//! | 7z | [`SevenZipTool`](sevenzip::SevenZipTool) | `.7z.001`, `.7z.002`, ... | AES-256 |
//! | RAR | `RarTool` (feature `rar`) | `.part1.rar`, `.part2.rar`, ... | RAR4/RAR5 |
//! | ISO9660 | [`IsoTool`](iso9660::IsoTool) | - | - |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arcfs::{ArchiveArgs, ArchiveInnerArgs, ExtractOptions, NoProgress, Result, ToolRegistry, Volume};
//!
//! fn main() -> Result<()> {
//!     let registry = ToolRegistry::with_defaults(ExtractOptions::default())?;
//!     let volumes = vec![Volume::open("backup.tar.gz")?];
//!     let (_, tool) = registry.lookup_name(volumes[0].name())?;
//!
//!     // Browse the directory tree
//!     let meta = tool.get_meta(&volumes, &ArchiveArgs::default())?;
//!     for node in meta.tree.unwrap_or_default() {
//!         println!("{} ({} entries)", node.entry.name, node.count());
//!     }
//!
//!     // Stream one file
//!     let mut stream = tool.extract(&volumes, &ArchiveInnerArgs::new("", "etc/hosts"))?;
//!     std::io::copy(&mut stream, &mut std::io::stdout())?;
//!
//!     // Recreate a subtree on disk
//!     tool.decompress(&volumes, "./out".as_ref(), &ArchiveInnerArgs::new("", "etc"), &mut NoProgress)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Split Archives
//!
//! Multi-volume archives are passed as all their parts in ascending order.
//! The registry tells which naming scheme a first part belongs to:
//!
//! ```rust,no_run
//! use arcfs::{ExtractOptions, ToolRegistry, Volume};
//!
//! # fn main() -> arcfs::Result<()> {
//! let registry = ToolRegistry::with_defaults(ExtractOptions::default())?;
//! let (scheme, tool) = registry.lookup_name("movie.7z.001")?;
//! let names = scheme
//!     .map(|s| s.discover("movie", |name| std::path::Path::new(name).exists()))
//!     .unwrap_or_default();
//! let volumes = names.iter().map(Volume::open).collect::<arcfs::Result<Vec<_>>>()?;
//! let meta = tool.get_meta(&volumes, &Default::default())?;
//! # let _ = meta;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `rar` | Yes | RAR support through the native unrar library |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`]. Password failures are always
//! reported as [`Error::WrongArchivePassword`], whatever the decoder said:
//!
//! ```rust,no_run
//! use arcfs::{ArchiveArgs, Error, Tool, Volume};
//!
//! fn is_locked(tool: &dyn Tool, volumes: &[Volume], password: &str) -> arcfs::Result<bool> {
//!     match tool.get_meta(volumes, &ArchiveArgs::new(password)) {
//!         Ok(meta) => Ok(meta.encrypted),
//!         Err(Error::WrongArchivePassword) => {
//!             eprintln!("Incorrect password");
//!             Ok(true)
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```
//!
//! ## Safety
//!
//! - **Path containment**: every destination is checked lexically; entry
//!   names that would escape the output directory fail with
//!   [`Error::PathTraversal`] before anything is created
//! - **No overwrite**: files are created exclusively
//! - **Cancellation**: progress sinks can stop a decompression between
//!   buffers
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod generic;
pub mod iso9660;
pub mod model;
pub mod options;
pub mod progress;
pub mod safety;
pub mod sevenzip;
pub mod timestamp;
pub mod tool;
pub mod volume;
pub mod zipfile;

#[cfg(feature = "rar")]
#[cfg_attr(docsrs, doc(cfg(feature = "rar")))]
pub mod rar;

pub use error::{Error, Result};
pub use model::{ArchiveArgs, ArchiveInnerArgs, ArchiveMeta, Entry, TreeNode, find_in};
pub use options::ExtractOptions;
pub use timestamp::Timestamp;

// Re-export the tool contract at crate root for convenience
pub use tool::{EntryStream, Tool, ToolRegistry};

// Re-export volume API
pub use volume::{MultipartExtension, Volume};

// Re-export progress API
pub use progress::{CancellationToken, Cancellable, NoProgress, ThrottledProgress, UpdateProgress};
