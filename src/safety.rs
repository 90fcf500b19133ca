//! Output path containment.
//!
//! Entry names come from untrusted archives. Before anything is created on
//! disk, every destination is built by [`join_contained`], which joins the
//! entry name onto the output directory one component at a time and
//! refuses anything that could leave it.

use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// Joins an archive entry name onto `root`, staying lexically inside it.
///
/// Both `/` and `\` separate components. Empty and `.` components are
/// skipped, so leading separators make a name relative to `root`. A `..`
/// component, or a component the platform would treat as a root or drive
/// prefix (`C:` on Windows), is rejected with [`Error::PathTraversal`].
///
/// # Examples
///
/// ```rust
/// use arcfs::safety::join_contained;
/// use std::path::Path;
///
/// let root = Path::new("/srv/out");
/// assert_eq!(join_contained(root, "a/b.txt").unwrap(), root.join("a").join("b.txt"));
/// assert_eq!(join_contained(root, "/etc/passwd").unwrap(), root.join("etc").join("passwd"));
/// assert!(join_contained(root, "../escape").is_err());
/// ```
pub fn join_contained(root: &Path, name: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for component in name.split(['/', '\\']) {
        if component.is_empty() || component == "." {
            continue;
        }
        if component == ".." || !is_plain_component(component) {
            return Err(Error::PathTraversal {
                path: name.to_string(),
            });
        }
        path.push(component);
    }

    if !path.starts_with(root) {
        return Err(Error::PathTraversal {
            path: name.to_string(),
        });
    }
    Ok(path)
}

/// Returns `true` if the entry name has a component that `join_contained`
/// would reject.
pub fn is_suspicious(name: &str) -> bool {
    name.split(['/', '\\'])
        .any(|c| c == ".." || (!c.is_empty() && c != "." && !is_plain_component(c)))
}

/// A component the platform parses as exactly one normal path segment.
fn is_plain_component(component: &str) -> bool {
    let mut components = Path::new(component).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
