//! Error types for archive operations.
//!
//! This module provides the [`Error`] enum which represents every failure a
//! [`Tool`](crate::tool::Tool) can report, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Password
//! problems are always reported as [`Error::WrongArchivePassword`], whatever
//! the underlying decoder said, so a caller can re-prompt instead of showing
//! a generic failure:
//!
//! ```rust,no_run
//! use arcfs::{ArchiveArgs, Error, ExtractOptions, ToolRegistry, Volume};
//!
//! fn open(path: &str, password: &str) -> arcfs::Result<()> {
//!     let registry = ToolRegistry::with_defaults(ExtractOptions::default())?;
//!     let volume = Volume::open(path)?;
//!     let (_, tool) = registry.lookup_name(volume.name())?;
//!     match tool.get_meta(std::slice::from_ref(&volume), &ArchiveArgs::new(password)) {
//!         Ok(meta) => println!("encrypted: {}", meta.encrypted),
//!         Err(Error::WrongArchivePassword) => println!("Incorrect password. Please try again."),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## User-Friendly Error Messages
//!
//! ```rust
//! use arcfs::Error;
//!
//! fn print_user_message(error: &Error) {
//!     match error {
//!         Error::UnknownArchiveFormat => println!("This file is not a supported archive."),
//!         Error::ObjectNotFound { path } => println!("Nothing named {path} in the archive."),
//!         Error::PathTraversal { .. } => println!("Security: Archive contains unsafe file paths."),
//!         _ => println!("Error: {}", error),
//!     }
//! }
//! ```

use std::io;

/// The main error type for archive operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | I/O | [`Io`][Self::Io] | Volume reads, destination writes |
/// | Format | [`UnknownArchiveFormat`][Self::UnknownArchiveFormat], [`CorruptImage`][Self::CorruptImage] | Unrecognized or damaged data |
/// | Lookup | [`ObjectNotFound`][Self::ObjectNotFound], [`NotFolder`][Self::NotFolder], [`NotFile`][Self::NotFile] | Bad inner path |
/// | Security | [`WrongArchivePassword`][Self::WrongArchivePassword], [`PathTraversal`][Self::PathTraversal] | Encryption, hostile entry names |
/// | Contract | [`NotSupport`][Self::NotSupport] | Operation not offered by an adapter |
/// | Decoders | [`Zip`][Self::Zip], [`SevenZip`][Self::SevenZip], `Rar` | Passthrough |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading a volume or writing output.
    ///
    /// Transient volume errors are surfaced immediately; the engine does not
    /// retry.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No registered tool accepts the extension, or the content could not be
    /// identified.
    #[error("unknown archive format")]
    UnknownArchiveFormat,

    /// The archive is encrypted and the password is missing or wrong.
    #[error("wrong archive password")]
    WrongArchivePassword,

    /// The inner path matches no entry.
    #[error("object not found: {path}")]
    ObjectNotFound {
        /// The inner path that was looked up.
        path: String,
    },

    /// A listing was requested on something that is not a directory.
    #[error("not a folder: {path}")]
    NotFolder {
        /// The inner path of the offending entry.
        path: String,
    },

    /// A file operation was requested on a directory.
    #[error("not a file: {path}")]
    NotFile {
        /// The inner path of the offending entry.
        path: String,
    },

    /// The adapter does not offer this operation.
    ///
    /// Flat-list adapters return this from `list`; callers fall back to the
    /// tree returned by `get_meta`.
    #[error("operation not supported: {operation}")]
    NotSupport {
        /// Name of the unsupported operation.
        operation: &'static str,
    },

    /// A destination path computed from an entry name would escape the
    /// output directory.
    ///
    /// Nothing is created for the offending entry.
    #[error("illegal file path: {path}")]
    PathTraversal {
        /// The entry name that was rejected.
        path: String,
    },

    /// The operation was cancelled through the progress sink.
    ///
    /// Partially written output is left in place.
    #[error("operation cancelled")]
    Cancelled,

    /// The call received an empty volume list.
    #[error("no volumes supplied")]
    NoVolumes,

    /// An ISO9660 image has malformed descriptors or directory records.
    #[error("corrupt image at offset {offset:#x}: {reason}")]
    CorruptImage {
        /// The byte offset where the problem was detected.
        offset: u64,
        /// A description of the problem.
        reason: String,
    },

    /// A multipart naming pattern failed to compile.
    #[error("invalid part pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Passthrough error from the zip decoder.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Passthrough error from the 7-Zip decoder.
    #[error("7z error: {0}")]
    SevenZip(#[from] sevenz_rust::Error),

    /// Passthrough error from the RAR decoder.
    #[cfg(feature = "rar")]
    #[error("rar error: {0}")]
    Rar(#[from] unrar::error::UnrarError),
}

impl Error {
    /// Builds an [`Error::ObjectNotFound`] for an inner path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Error::ObjectNotFound { path: path.into() }
    }

    /// Builds an [`Error::NotSupport`] for an operation name.
    pub fn not_supported(operation: &'static str) -> Self {
        Error::NotSupport { operation }
    }

    /// Returns `true` if the caller should re-prompt for a password.
    pub fn is_password_error(&self) -> bool {
        matches!(self, Error::WrongArchivePassword)
    }

    /// Returns `true` if the inner path did not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }

    /// Returns `true` if this error indicates a security issue.
    ///
    /// # Example
    ///
    /// ```rust
    /// use arcfs::Error;
    ///
    /// let err = Error::PathTraversal { path: "../etc/passwd".into() };
    /// assert!(err.is_security_error());
    /// ```
    pub fn is_security_error(&self) -> bool {
        matches!(self, Error::PathTraversal { .. })
    }

    /// Returns `true` if retrying with other input could succeed.
    ///
    /// Only transient I/O kinds count; everything else needs a different
    /// password, a different inner path or a fresh call.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::WrongArchivePassword | Error::Cancelled => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Returns `true` if a decoder message talks about a password.
///
/// This is the fallback classifier for decoders that report password
/// failures only through their message text. Matching is case-insensitive
/// on the substring `"password"`; the exact decoder messages relied on are
/// pinned by regression tests.
pub fn mentions_password(message: &str) -> bool {
    message.to_ascii_lowercase().contains("password")
}

/// Maps an error to [`Error::WrongArchivePassword`] when its message
/// mentions a password, passing every other error through.
pub(crate) fn filter_password(err: Error) -> Error {
    match err {
        Error::WrongArchivePassword => err,
        other if mentions_password(&other.to_string()) => Error::WrongArchivePassword,
        other => other,
    }
}

/// A specialized Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;
