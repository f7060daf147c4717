//! Generation directory and the generator boundary
//!
//! The harness never generates code itself: it drives a [`Generator`] and only relies on the paths it
//! reports. [`ScriptSourceGenerator`] is the generator used by the CLI and the test suites.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::errors::{GenerationError, HarnessError};
use crate::version::GENVERIFY_VERSION;

/// File name of the support library, relative to the generation directory.
pub const SUPPORT_LIBRARY: &str = "stjs.js";

const SUPPORT_SOURCE: &str = include_str!("support/stjs.js");

// ============================================================================
// Generation directory
// ============================================================================

/// Where generated artifacts live on disk and under which URL prefix they are also served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationDirectory {
    local_root: PathBuf,
    url_prefix: String,
}

impl GenerationDirectory {
    /// Describe an existing directory without touching it.
    pub fn new(local_root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            local_root: local_root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Create the directory, removing whatever a previous run left in it.
    ///
    /// Clearing happens here, at the start of a run, and never at the end.
    #[instrument(skip_all, fields(root = %local_root.as_ref().display()))]
    pub fn prepare(local_root: impl AsRef<Path>, url_prefix: &str) -> Result<Self, HarnessError> {
        let root = local_root.as_ref();
        let workspace_error = |source: io::Error| HarnessError::Workspace {
            path: root.to_path_buf(),
            source,
        };
        match fs::remove_dir_all(root) {
            Ok(()) => debug!("cleared previous generation output"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(workspace_error(err)),
        }
        fs::create_dir_all(root).map_err(workspace_error)?;
        Ok(Self::new(root, url_prefix))
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Map a request target to a file under the local root.
    ///
    /// The target is percent-decoded first. A file at the root-relative path wins; otherwise a target
    /// under the URL prefix falls back to the path with the prefix stripped. Returns `None` for the empty
    /// path, for undecodable targets and for anything that would leave the root.
    pub fn resolve(&self, target: &str) -> Option<PathBuf> {
        let raw = target.split(['?', '#']).next().unwrap_or(target);
        let decoded = percent_decode_str(raw).decode_utf8().ok()?;
        let path: &str = &decoded;

        let direct = self.under_root(path);
        let stripped = if self.url_prefix.is_empty() {
            None
        } else {
            path.strip_prefix(self.url_prefix.as_str())
                .filter(|rest| rest.starts_with('/'))
                .and_then(|rest| self.under_root(rest))
        };
        match (direct, stripped) {
            (Some(direct), Some(_)) if direct.is_file() => Some(direct),
            (direct, stripped) => stripped.or(direct),
        }
    }

    fn under_root(&self, path: &str) -> Option<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let candidate = Path::new(relative);
        if !candidate.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.local_root.join(candidate))
    }
}

// ============================================================================
// Generator boundary
// ============================================================================

/// What one generation call produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub entry: String,
    /// Paths relative to the generation directory, `/`-separated, in load order.
    pub output_paths: Vec<String>,
}

/// A source-to-source generator, seen from the harness.
pub trait Generator {
    /// Generate the artifact for `entry`, reading sources from `source_root`.
    fn generate(&mut self, entry: &str, source_root: &Path) -> Result<Artifact, GenerationError>;

    /// Write the support library into `dir`, returning the written paths relative to it.
    fn copy_support(&mut self, dir: &Path) -> Result<Vec<String>, GenerationError>;
}

/// Generator that emits one script per entry from `<source_root>/<package path>/<Name>.js`.
#[derive(Debug, Clone)]
pub struct ScriptSourceGenerator {
    output_root: PathBuf,
}

impl ScriptSourceGenerator {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }
}

/// First line of every generated file.
pub fn banner(entry: &str) -> String {
    format!("// Generated by genverify {} from {}\n", GENVERIFY_VERSION, entry)
}

/// Split `a.b.c.Main` into checked identifier segments.
fn entry_segments(entry: &str) -> Result<Vec<&str>, GenerationError> {
    let segments: Vec<&str> = entry.split('.').collect();
    let valid = segments.iter().all(|segment| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    });
    if valid {
        Ok(segments)
    } else {
        Err(GenerationError::InvalidEntry(entry.to_string()))
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), GenerationError> {
    let io_error = |source: io::Error| GenerationError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, contents).map_err(io_error)
}

impl Generator for ScriptSourceGenerator {
    #[instrument(skip(self, source_root))]
    fn generate(&mut self, entry: &str, source_root: &Path) -> Result<Artifact, GenerationError> {
        let relative = format!("{}.js", entry_segments(entry)?.join("/"));
        let source_path = source_root.join(&relative);
        let source = fs::read_to_string(&source_path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                GenerationError::SourceNotFound {
                    entry: entry.to_string(),
                    path: source_path.clone(),
                }
            } else {
                GenerationError::Io {
                    path: source_path.clone(),
                    source,
                }
            }
        })?;

        let mut output = banner(entry);
        output.push_str(&source);
        write_file(&self.output_root.join(&relative), &output)?;
        debug!(output = %relative, "generated");

        Ok(Artifact {
            entry: entry.to_string(),
            output_paths: vec![relative],
        })
    }

    fn copy_support(&mut self, dir: &Path) -> Result<Vec<String>, GenerationError> {
        write_file(&dir.join(SUPPORT_LIBRARY), SUPPORT_SOURCE)?;
        info!("copied support library to {}", dir.display());
        Ok(vec![SUPPORT_LIBRARY.to_string()])
    }
}
