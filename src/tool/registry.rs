//! Extension-to-tool resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::Tool;
use crate::volume::MultipartExtension;
use crate::{Error, ExtractOptions, Result};

/// Constructor of a built-in tool.
type Constructor = fn(&ExtractOptions) -> Result<Arc<dyn Tool>>;

/// Built-in tools, in registration order.
///
/// Later entries win when two tools claim the same extension.
const DEFAULT_TOOLS: &[Constructor] = &[
    |o| Ok(Arc::new(crate::generic::GenericTool::new(o.clone()))),
    |o| Ok(Arc::new(crate::zipfile::ZipTool::new(o.clone()))),
    |o| Ok(Arc::new(crate::sevenzip::SevenZipTool::new(o.clone())?)),
    #[cfg(feature = "rar")]
    |o| Ok(Arc::new(crate::rar::RarTool::new(o.clone())?)),
    |o| Ok(Arc::new(crate::iso9660::IsoTool::new(o.clone()))),
];

/// Maps file extensions to the tool that decodes them.
///
/// Built once and read-only afterwards; share it by reference or `Arc`.
///
/// # Example
///
/// ```rust
/// use arcfs::{ExtractOptions, ToolRegistry};
///
/// let registry = ToolRegistry::with_defaults(ExtractOptions::default()).unwrap();
/// let (multipart, tool) = registry.lookup_name("backup.tar.gz").unwrap();
/// assert_eq!(tool.name(), "generic");
/// assert!(multipart.is_none());
///
/// let (multipart, tool) = registry.lookup_name("movie.7z.001").unwrap();
/// assert_eq!(tool.name(), "7z");
/// assert_eq!(multipart.unwrap().part_index("movie.7z.002"), Some(2));
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    multipart: HashMap<String, MultipartExtension>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in tool.
    pub fn with_defaults(options: ExtractOptions) -> Result<Self> {
        let mut registry = Self::new();
        for constructor in DEFAULT_TOOLS {
            registry.register(constructor(&options)?);
        }
        Ok(registry)
    }

    /// Registers a tool under each of its extensions and multipart
    /// first-part extensions.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        for ext in tool.accepted_extensions() {
            self.insert(ext, &tool);
        }
        for scheme in tool.accepted_multipart_extensions() {
            self.insert(scheme.first_part(), &tool);
            self.multipart
                .insert(scheme.first_part().to_ascii_lowercase(), scheme.clone());
        }
        log::debug!("registered tool {}", tool.name());
    }

    fn insert(&mut self, ext: &str, tool: &Arc<dyn Tool>) {
        if let Some(previous) = self
            .tools
            .insert(ext.to_ascii_lowercase(), Arc::clone(tool))
        {
            log::debug!("{} replaces {} for {}", tool.name(), previous.name(), ext);
        }
    }

    /// Resolves an extension (with leading dot) to its tool and, for
    /// multipart first-part extensions, the naming scheme.
    pub fn lookup(&self, ext: &str) -> Result<(Option<&MultipartExtension>, Arc<dyn Tool>)> {
        let ext = ext.to_ascii_lowercase();
        let tool = self.tools.get(&ext).ok_or(Error::UnknownArchiveFormat)?;
        Ok((self.multipart.get(&ext), Arc::clone(tool)))
    }

    /// Resolves a file name.
    ///
    /// The full extension (everything from the first dot, as in `.tar.gz`)
    /// is tried first, then the last extension alone.
    pub fn lookup_name(&self, file_name: &str) -> Result<(Option<&MultipartExtension>, Arc<dyn Tool>)> {
        let (full, last) = extensions(file_name).ok_or(Error::UnknownArchiveFormat)?;
        match self.lookup(full) {
            Err(Error::UnknownArchiveFormat) if full != last => self.lookup(last),
            found => found,
        }
    }

    /// Returns every registered extension, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    /// Returns the number of registered extensions.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

/// Splits a file name into its full extension (from the first dot) and
/// its last extension.
fn extensions(file_name: &str) -> Option<(&str, &str)> {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    // A leading dot marks a hidden file, not an extension
    let body = name.strip_prefix('.').unwrap_or(name);
    let offset = name.len() - body.len();
    let first = body.find('.')? + offset;
    let last = name.rfind('.')?;
    Some((&name[first..], &name[last..]))
}
