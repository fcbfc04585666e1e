// SPDX-License-Identifier: MIT OR Apache-2.0
//! Resolution of library source files.
//!
//! The compiler never touches the filesystem directly. Implementation files
//! and `#include` targets are fetched through a [`SourceResolver`] owned by
//! the [`crate::GenContext`].

use indexmap::IndexMap;
use std::io;
use std::path::PathBuf;

/// Fetches library source text by relative path
pub trait SourceResolver: Send {
    /// Read the source at `path`
    fn resolve(&self, path: &str) -> io::Result<String>;
}

impl<F> SourceResolver for F
where
    F: Fn(&str) -> io::Result<String> + Send,
{
    fn resolve(&self, path: &str) -> io::Result<String> {
        self(path)
    }
}

/// Ordered list of directories searched for library files
#[derive(Debug, Clone, Default)]
pub struct FileSearchPath {
    roots: Vec<PathBuf>,
}

impl FileSearchPath {
    /// Create an empty search path
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Append a directory
    pub fn append(&mut self, root: impl Into<PathBuf>) {
        self.roots.push(root.into());
    }

    /// Directories in search order
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl SourceResolver for FileSearchPath {
    fn resolve(&self, path: &str) -> io::Result<String> {
        for root in &self.roots {
            let candidate = root.join(path);
            if candidate.is_file() {
                tracing::trace!("Resolved {} to {:?}", path, candidate);
                return std::fs::read_to_string(candidate);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{path}' not found in {} search roots", self.roots.len()),
        ))
    }
}

/// In-memory sources keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    files: IndexMap<String, String>,
}

impl MemorySources {
    /// Create an empty source map
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    /// Add or replace a file
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl<P: Into<String>, T: Into<String>> FromIterator<(P, T)> for MemorySources {
    fn from_iter<I: IntoIterator<Item = (P, T)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(|(p, t)| (p.into(), t.into())).collect(),
        }
    }
}

impl SourceResolver for MemorySources {
    fn resolve(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("'{path}' not in memory sources")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sources() {
        let sources = MemorySources::new().with_file("lib/a.glsl", "void a() {}");
        assert_eq!(sources.resolve("lib/a.glsl").unwrap(), "void a() {}");
        assert_eq!(
            sources.resolve("lib/b.glsl").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |path: &str| -> io::Result<String> { Ok(format!("// {path}")) };
        assert_eq!(resolver.resolve("x.osl").unwrap(), "// x.osl");
    }

    #[test]
    fn test_search_path_misses() {
        let search = FileSearchPath::new().with_root("/nonexistent/library/root");
        assert!(search.resolve("stdlib/genglsl/mx_image_color3.glsl").is_err());
    }
}
