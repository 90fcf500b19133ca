//! Shapes exchanged between tools and their callers.

use std::time::SystemTime;

/// One record inside an archive, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Base name of the entry.
    pub name: String,
    /// Uncompressed size in bytes (zero for directories).
    pub size: u64,
    /// Modification time, when the format records one.
    pub modified: Option<SystemTime>,
    /// Whether this entry is a directory.
    pub is_dir: bool,
}

impl Entry {
    /// Creates a file entry.
    pub fn file(name: impl Into<String>, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
            is_dir: false,
        }
    }

    /// Creates a directory entry.
    pub fn dir(name: impl Into<String>, modified: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            modified,
            is_dir: true,
        }
    }
}

/// A node of a reconstructed directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// The node's own metadata; `entry.name` is the base name.
    pub entry: Entry,
    /// Children in insertion order.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Looks up a descendant by slash-separated relative path.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        find_in(&self.children, path)
    }

    /// Counts this node and all descendants.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

/// Looks up a node by slash-separated path among root-level nodes.
///
/// # Example
///
/// ```rust
/// use arcfs::model::{find_in, Entry, TreeNode};
///
/// let tree = vec![TreeNode {
///     entry: Entry::dir("a", None),
///     children: vec![TreeNode { entry: Entry::file("b.txt", 3, None), children: vec![] }],
/// }];
/// assert_eq!(find_in(&tree, "a/b.txt").unwrap().entry.size, 3);
/// ```
pub fn find_in<'a>(nodes: &'a [TreeNode], path: &str) -> Option<&'a TreeNode> {
    let mut components = path.split('/').filter(|c| !c.is_empty());
    let first = components.next()?;
    let mut node = nodes.iter().find(|n| n.entry.name == first)?;
    for component in components {
        node = node.children.iter().find(|n| n.entry.name == component)?;
    }
    Some(node)
}

/// Archive-level metadata returned by `get_meta`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMeta {
    /// Archive comment (empty when the format has none).
    pub comment: String,
    /// Whether any entry is encrypted.
    pub encrypted: bool,
    /// Root-level nodes, or `None` when the tool builds no tree and callers
    /// must use `list`.
    pub tree: Option<Vec<TreeNode>>,
}

/// Arguments for archive-level operations.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ArchiveArgs {
    /// Password for encrypted archives; empty means none.
    pub password: String,
}

impl ArchiveArgs {
    /// Creates arguments with the given password.
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }

    /// Returns the password, or `None` when empty.
    pub fn password(&self) -> Option<&str> {
        if self.password.is_empty() {
            None
        } else {
            Some(&self.password)
        }
    }
}

impl std::fmt::Debug for ArchiveArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveArgs")
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Arguments for entry-scoped operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveInnerArgs {
    /// Archive-level arguments.
    pub args: ArchiveArgs,
    /// Slash-separated path inside the archive; `/` is the root.
    pub inner_path: String,
}

impl ArchiveInnerArgs {
    /// Creates entry-scoped arguments.
    pub fn new(password: impl Into<String>, inner_path: impl Into<String>) -> Self {
        Self {
            args: ArchiveArgs::new(password),
            inner_path: inner_path.into(),
        }
    }

    /// Returns the inner path without leading or trailing slashes.
    ///
    /// The archive root normalizes to the empty string.
    pub fn relative_path(&self) -> &str {
        normalize_inner_path(&self.inner_path)
    }

    /// Returns `true` if the inner path names the archive root.
    pub fn is_root(&self) -> bool {
        self.relative_path().is_empty()
    }
}

/// Strips leading and trailing slashes from an inner path.
pub(crate) fn normalize_inner_path(path: &str) -> &str {
    path.trim_matches('/')
}

/// Returns the last component of a slash-separated path.
pub(crate) fn base_name(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}
