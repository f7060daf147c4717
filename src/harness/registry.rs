//! Ordered artifact registry and the bootstrap page built from it.

use serde::Serialize;

use super::generation::Artifact;

const PAGE_HEAD: &str = "<!DOCTYPE html><html><head>";
const PAGE_TAIL: &str = "</head><body></body></html>";

/// Ordered, duplicate-free list of artifact paths relative to the generation directory.
///
/// Insertion order is load order: the support library first, dependencies next, the entry last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArtifactRegistry {
    entries: Vec<String>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry for one run.
    pub fn assemble(support: &[String], dependencies: &[Artifact], entry: &Artifact) -> Self {
        let mut registry = Self::new();
        registry.extend(support.iter().cloned());
        for dependency in dependencies {
            registry.extend(dependency.output_paths.iter().cloned());
        }
        registry.extend(entry.output_paths.iter().cloned());
        registry
    }

    /// Append `path` unless it is already registered. Returns whether it was added.
    pub fn register(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.entries.contains(&path) {
            return false;
        }
        self.entries.push(path);
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The HTML page that loads every registered artifact, in order.
    ///
    /// Paths are written verbatim, so relative entries resolve against the page URL.
    pub fn bootstrap_page(&self) -> String {
        let mut page = String::from(PAGE_HEAD);
        for path in &self.entries {
            page.push_str("<script type=\"text/javascript\" src=\"");
            page.push_str(path);
            page.push_str("\"></script>");
        }
        page.push_str(PAGE_TAIL);
        page
    }
}

impl Extend<String> for ArtifactRegistry {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        for path in iter {
            self.register(path);
        }
    }
}

impl FromIterator<String> for ArtifactRegistry {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut registry = Self::new();
        registry.extend(iter);
        registry
    }
}

impl<'a> FromIterator<&'a str> for ArtifactRegistry {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}
