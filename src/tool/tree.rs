//! Directory tree reconstruction from flat entry lists.
//!
//! Nodes live in an arena addressed by index; a map from directory key
//! (the slash-separated directory path, `"."` for the root) to arena index
//! finds parents. Parents are created lazily: when an entry's directory is
//! unknown, the builder walks upward creating and linking every missing
//! ancestor until it reaches one that exists. Entries may therefore arrive
//! in any order, and archives that never store directory records still
//! produce a complete tree.

use std::collections::HashMap;

use super::traversal::{ArchiveReader, SubFile};
use crate::model::{Entry, TreeNode, base_name};

/// Key of the root directory.
const ROOT: &str = ".";

struct Node {
    entry: Entry,
    children: Vec<usize>,
}

/// Builds a [`TreeNode`] hierarchy from entries in arbitrary order.
///
/// # Example
///
/// ```rust
/// use arcfs::model::Entry;
/// use arcfs::tool::TreeBuilder;
///
/// let mut builder = TreeBuilder::new();
/// builder.add("a/b.txt", &Entry::file("b.txt", 3, None), false);
/// builder.add("c.txt", &Entry::file("c.txt", 1, None), false);
/// let (encrypted, tree) = builder.build();
///
/// assert!(!encrypted);
/// assert_eq!(tree.len(), 2);
/// assert_eq!(tree[0].entry.name, "a");
/// assert!(tree[0].entry.is_dir);
/// assert_eq!(tree[0].children[0].entry.name, "b.txt");
/// ```
pub struct TreeBuilder {
    nodes: Vec<Node>,
    dirs: HashMap<String, usize>,
    encrypted: bool,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    /// Creates a builder holding only the root.
    pub fn new() -> Self {
        let mut dirs = HashMap::new();
        dirs.insert(ROOT.to_string(), 0);
        Self {
            nodes: vec![Node {
                entry: Entry::dir("", None),
                children: Vec::new(),
            }],
            dirs,
            encrypted: false,
        }
    }

    /// Adds one entry by its full path inside the archive.
    ///
    /// Directory entries only refresh the metadata of their node, so an
    /// explicit directory record arriving after its children is harmless.
    pub fn add(&mut self, path: &str, entry: &Entry, encrypted: bool) {
        if encrypted {
            self.encrypted = true;
        }
        let path = path.trim_matches('/');
        if path.is_empty() || path == ROOT {
            return;
        }

        if entry.is_dir {
            let index = self.dir_node(path, entry.modified);
            if entry.modified.is_some() {
                self.nodes[index].entry.modified = entry.modified;
            }
        } else {
            let parent = self.dir_node(parent_key(path), entry.modified);
            let index = self.push(Entry {
                name: base_name(path).to_string(),
                ..entry.clone()
            });
            self.nodes[parent].children.push(index);
        }
    }

    /// Adds an archive member.
    pub fn add_file(&mut self, file: &SubFile) {
        self.add(&file.path, &file.entry, file.encrypted);
    }

    /// Returns `true` if any added entry was encrypted.
    pub fn encrypted(&self) -> bool {
        self.encrypted
    }

    /// Number of nodes, not counting the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Returns `true` if nothing was added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finishes the tree, returning the encryption flag and root children.
    pub fn build(mut self) -> (bool, Vec<TreeNode>) {
        let roots = std::mem::take(&mut self.nodes[0].children);
        let tree = roots
            .into_iter()
            .map(|index| take_node(&mut self.nodes, index))
            .collect();
        (self.encrypted, tree)
    }

    /// Returns the node for directory `key`, creating it and any missing
    /// ancestors.
    fn dir_node(&mut self, key: &str, modified: Option<std::time::SystemTime>) -> usize {
        if let Some(&index) = self.dirs.get(key) {
            return index;
        }

        let created = self.new_dir(key, modified);
        let mut child = created;
        let mut key = parent_key(key);
        loop {
            if let Some(&parent) = self.dirs.get(key) {
                self.nodes[parent].children.push(child);
                break;
            }
            let parent = self.new_dir(key, modified);
            self.nodes[parent].children.push(child);
            child = parent;
            key = parent_key(key);
        }
        created
    }

    fn new_dir(&mut self, key: &str, modified: Option<std::time::SystemTime>) -> usize {
        let index = self.push(Entry::dir(base_name(key), modified));
        self.dirs.insert(key.to_string(), index);
        index
    }

    fn push(&mut self, entry: Entry) -> usize {
        self.nodes.push(Node {
            entry,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }
}

/// Moves a node and its subtree out of the arena.
fn take_node(nodes: &mut [Node], index: usize) -> TreeNode {
    let children = std::mem::take(&mut nodes[index].children);
    let entry = std::mem::replace(&mut nodes[index].entry, Entry::dir("", None));
    TreeNode {
        entry,
        children: children
            .into_iter()
            .map(|child| take_node(nodes, child))
            .collect(),
    }
}

/// Directory key of a path's parent.
fn parent_key(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => ROOT,
    }
}

/// Builds the tree of every member of a flat archive, in the reader's
/// order.
pub fn tree_from_traversal<R: ArchiveReader + ?Sized>(reader: &R) -> (bool, Vec<TreeNode>) {
    let mut builder = TreeBuilder::new();
    for file in reader.files() {
        builder.add_file(file);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::find_in;

    fn file(size: u64) -> Entry {
        Entry::file("", size, None)
    }

    #[test]
    fn test_parent_key() {
        assert_eq!(parent_key("a/b/c"), "a/b");
        assert_eq!(parent_key("a"), ".");
    }

    #[test]
    fn test_synthesizes_missing_directory() {
        let mut builder = TreeBuilder::new();
        builder.add("a/b.txt", &file(1), false);
        builder.add("c.txt", &file(2), false);
        let (_, tree) = builder.build();

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].entry, Entry::dir("a", None));
        assert_eq!(tree[0].children.len(), 1);
        assert_eq!(tree[0].children[0].entry.name, "b.txt");
        assert_eq!(tree[1].entry.name, "c.txt");
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn test_deep_ancestors_created_once() {
        let mut builder = TreeBuilder::new();
        builder.add("x/y/z/1.txt", &file(1), false);
        builder.add("x/y/2.txt", &file(1), false);
        builder.add("x/3.txt", &file(1), false);
        let (_, tree) = builder.build();

        assert_eq!(tree.len(), 1);
        let x = &tree[0];
        assert_eq!(x.entry.name, "x");
        assert_eq!(x.count(), 6);
        assert!(find_in(&tree, "x/y/z/1.txt").is_some());
        assert!(find_in(&tree, "x/y/2.txt").is_some());
    }

    #[test]
    fn test_explicit_dir_after_children_is_not_duplicated() {
        let modified = Some(std::time::UNIX_EPOCH);
        let mut builder = TreeBuilder::new();
        builder.add("a/b.txt", &file(1), false);
        builder.add("a/", &Entry::dir("a", modified), false);
        let (_, tree) = builder.build();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].entry.modified, modified);
        assert_eq!(tree[0].children.len(), 1);
    }

    #[test]
    fn test_empty_directory_entry() {
        let mut builder = TreeBuilder::new();
        builder.add("empty/", &Entry::dir("empty", None), false);
        let (_, tree) = builder.build();
        assert_eq!(tree.len(), 1);
        assert!(tree[0].entry.is_dir);
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        let mut builder = TreeBuilder::new();
        builder.add("/a/b.txt", &file(1), false);
        let (_, tree) = builder.build();
        assert!(find_in(&tree, "a/b.txt").is_some());
    }

    #[test]
    fn test_encryption_aggregates() {
        let mut builder = TreeBuilder::new();
        builder.add("a.txt", &file(1), false);
        assert!(!builder.encrypted());
        builder.add("b.txt", &file(1), true);
        builder.add("c.txt", &file(1), false);
        let (encrypted, _) = builder.build();
        assert!(encrypted);
    }

    #[test]
    fn test_file_keeps_metadata() {
        let modified = Some(std::time::UNIX_EPOCH);
        let mut builder = TreeBuilder::new();
        builder.add("d/f.bin", &Entry::file("ignored", 42, modified), false);
        let (_, tree) = builder.build();
        let node = find_in(&tree, "d/f.bin").unwrap();
        assert_eq!(node.entry, Entry::file("f.bin", 42, modified));
    }
}
