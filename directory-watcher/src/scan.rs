//! Directory listing and the set of already-seen files.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use tracing::{debug, trace};
use walkdir::WalkDir;

/// Check whether `name` ends with `.{extension}` after a non-empty stem,
/// ignoring ASCII case.
pub fn matches_extension(name: &str, extension: &str) -> bool {
    // The stem must not be empty: ".heic" has no sibling ".jpeg".
    let suffix_len = extension.len() + 1;
    if name.len() <= suffix_len {
        return false;
    }

    let Some(suffix) = name.get(name.len() - suffix_len..) else {
        return false;
    };
    suffix.starts_with('.') && suffix[1..].eq_ignore_ascii_case(extension)
}

/// List the names of matching files directly inside `dir`.
///
/// Subdirectories are neither descended into nor reported, and names that
/// are not valid UTF-8 are skipped. Fails if `dir` itself cannot be read.
pub fn list_matching(dir: &Path, extension: &str) -> io::Result<HashSet<String>> {
    let mut names = HashSet::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            // Depth 0 is the directory itself.
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                debug!("Skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match entry.file_name().to_str() {
            Some(name) if matches_extension(name, extension) => {
                names.insert(name.to_string());
            }
            Some(_) => {}
            None => trace!("Skipping non UTF-8 file name: {:?}", entry.file_name()),
        }
    }

    Ok(names)
}

/// File names seen in the watched directory as of the last scan.
///
/// Tracks presence only: a name stays known whether or not its conversion
/// succeeded, and drops out once the file leaves the directory.
#[derive(Debug, Clone, Default)]
pub struct KnownFileSet {
    names: HashSet<String>,
}

impl KnownFileSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents without reporting anything as new.
    pub fn reset(&mut self, current: HashSet<String>) {
        self.names = current;
    }

    /// Replace the contents with `current` and return the names that were
    /// not known before.
    pub fn apply(&mut self, current: HashSet<String>) -> Vec<String> {
        let new_names = current
            .iter()
            .filter(|name| !self.names.contains(*name))
            .cloned()
            .collect();
        self.names = current;
        new_names
    }

    /// Check whether a name is known.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of known names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no names are known.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
