//! Naming schemes of split-volume archives.

use regex::Regex;

use crate::Result;

/// Describes how the parts of a split archive are named.
///
/// A descriptor is keyed by the extension of the first part (`.7z.001`,
/// `.part1.rar`). Sibling parts are recognized by a regular expression
/// whose capture group `index_group` carries the numeric part index.
/// Callers use it to discover and order the full volume set before handing
/// it to a tool.
///
/// # Example
///
/// ```rust
/// use arcfs::volume::MultipartExtension;
///
/// let scheme = MultipartExtension::new(".7z.001", r"^.*\.7z\.(\d+)$", 1, 2, |i| format!(".7z.{i:03}")).unwrap();
/// assert_eq!(scheme.part_index("movie.7z.002"), Some(2));
/// assert_eq!(scheme.part_name("movie", 3), "movie.7z.003");
/// ```
#[derive(Debug, Clone)]
pub struct MultipartExtension {
    first_part: &'static str,
    pattern: Regex,
    index_group: usize,
    second_part_index: u32,
    suffix: fn(u32) -> String,
}

impl MultipartExtension {
    /// Creates a descriptor.
    ///
    /// * `first_part` - extension of the first part, with leading dot
    /// * `pattern` - regex matching any part's file name
    /// * `index_group` - capture group holding the part number
    /// * `second_part_index` - part number of the second part
    /// * `suffix` - renders the extension of part `n`
    pub fn new(
        first_part: &'static str,
        pattern: &str,
        index_group: usize,
        second_part_index: u32,
        suffix: fn(u32) -> String,
    ) -> Result<Self> {
        Ok(Self {
            first_part,
            pattern: Regex::new(pattern)?,
            index_group,
            second_part_index,
            suffix,
        })
    }

    /// Extension of the first part.
    pub fn first_part(&self) -> &'static str {
        self.first_part
    }

    /// Part number of the second part.
    pub fn second_part_index(&self) -> u32 {
        self.second_part_index
    }

    /// Returns the part number of `name`, or `None` if it is not a part.
    pub fn part_index(&self, name: &str) -> Option<u32> {
        self.pattern
            .captures(name)?
            .get(self.index_group)?
            .as_str()
            .parse()
            .ok()
    }

    /// Returns `true` if `name` follows this naming scheme.
    pub fn is_part(&self, name: &str) -> bool {
        self.part_index(name).is_some()
    }

    /// File name of part `index` for an archive whose name without any
    /// extension is `base`.
    pub fn part_name(&self, base: &str, index: u32) -> String {
        format!("{base}{}", (self.suffix)(index))
    }

    /// Keeps the names that are parts and sorts them by part number.
    pub fn order_parts<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut parts: Vec<(u32, &str)> = names
            .iter()
            .filter_map(|n| self.part_index(n.as_ref()).map(|i| (i, n.as_ref())))
            .collect();
        parts.sort_by_key(|&(index, _)| index);
        parts.into_iter().map(|(_, n)| n.to_string()).collect()
    }

    /// Discovers the parts of an archive whose first part is
    /// `base + first_part`.
    ///
    /// Tries names from the second part upward until `exists` reports a
    /// gap; the first part is always included.
    pub fn discover(&self, base: &str, mut exists: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut parts = vec![format!("{base}{}", self.first_part)];
        let mut index = self.second_part_index;
        loop {
            let name = self.part_name(base, index);
            if !exists(&name) {
                break;
            }
            parts.push(name);
            index += 1;
        }
        parts
    }
}
