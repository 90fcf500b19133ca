//! Extraction options shared by every tool.

use std::path::{Path, PathBuf};

/// Default copy buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// Default permission bits for created directories (Unix only).
pub const DEFAULT_DIR_MODE: u32 = 0o700;

/// Default permission bits for created files (Unix only).
pub const DEFAULT_FILE_MODE: u32 = 0o600;

/// Options controlling how entries are written to disk.
///
/// Tools receive a copy at construction time; see
/// [`ToolRegistry::with_defaults`](crate::ToolRegistry::with_defaults).
///
/// # Example
///
/// ```rust
/// use arcfs::ExtractOptions;
///
/// let options = ExtractOptions::new()
///     .buffer_size(64 * 1024)
///     .preserve_mtime(false);
/// assert_eq!(options.buffer_size, 64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Size of the copy buffer; cancellation is polled once per buffer.
    pub buffer_size: usize,
    /// Permission bits for created directories.
    pub dir_mode: u32,
    /// Permission bits for created files.
    pub file_mode: u32,
    /// Apply entry modification times to extracted files.
    pub preserve_mtime: bool,
    /// Directory for spooled volumes and staged entries.
    ///
    /// `None` uses the system temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            dir_mode: DEFAULT_DIR_MODE,
            file_mode: DEFAULT_FILE_MODE,
            preserve_mtime: true,
            temp_dir: None,
        }
    }
}

impl ExtractOptions {
    /// Creates extraction options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the copy buffer size. Zero is bumped to one byte.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Sets the directory permission bits.
    pub fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Sets the file permission bits.
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Sets whether modification times are applied to extracted files.
    pub fn preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }

    /// Sets the directory used for temporary files.
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Creates a fresh temporary directory under the configured root.
    pub(crate) fn make_temp_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("arcfs-");
        match self.temp_dir.as_deref() {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    /// Creates an anonymous temporary file, removed when dropped.
    pub(crate) fn make_temp_file(&self) -> std::io::Result<std::fs::File> {
        match self.temp_dir.as_deref() {
            Some(root) => tempfile::tempfile_in(root),
            None => tempfile::tempfile(),
        }
    }

    /// Returns the configured temporary root, if any.
    pub fn temp_root(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExtractOptions::default();
        assert_eq!(options.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(options.dir_mode, 0o700);
        assert_eq!(options.file_mode, 0o600);
        assert!(options.preserve_mtime);
        assert!(options.temp_root().is_none());
    }

    #[test]
    fn test_zero_buffer_is_bumped() {
        assert_eq!(ExtractOptions::new().buffer_size(0).buffer_size, 1);
    }

    #[test]
    fn test_temp_dir_in_configured_root() {
        let root = tempfile::TempDir::new().unwrap();
        let options = ExtractOptions::new().temp_dir(root.path());
        let dir = options.make_temp_dir().unwrap();
        assert!(dir.path().starts_with(root.path()));
    }
}
