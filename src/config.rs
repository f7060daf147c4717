//! Harness configuration
//!
//! Loaded from a `genverify.toml` file; every field has a default so a file only needs the entries that
//! differ. CLI flags are applied on top with the `with_*` builders.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::harness::errors::ConfigError;

/// Conventional configuration file name.
pub const CONFIG_FILE_NAME: &str = "genverify.toml";

/// Configuration for one verification run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory holding the sources the generator reads
    pub source_root: PathBuf,
    /// Generation directory; cleared at the start of every run
    pub work_dir: PathBuf,
    /// URL prefix the generation directory is also reachable under
    pub url_prefix: String,
    /// Primary entry identifier (for example `a.b.c.Main`); loaded last
    pub entry: String,
    /// Auxiliary entries, loaded in this order before the primary entry
    pub dependencies: Vec<String>,
    /// The alert message that marks a successful run
    pub sentinel: String,
    /// How long to wait for the sentinel after the page has loaded
    pub timeout_secs: u64,
    /// Local address the embedded server binds (port is always OS-assigned)
    pub bind_address: IpAddr,
    /// Time a second, warm generation of the primary entry
    pub measure_hot_generation: bool,
    /// Abort the page load when a script faults instead of logging and continuing
    pub throw_on_script_error: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src/main/js"),
            work_dir: PathBuf::from("target/genverify/jsoutput"),
            url_prefix: "/jsoutput".to_string(),
            entry: String::new(),
            dependencies: Vec::new(),
            sentinel: "test log alert".to_string(),
            timeout_secs: 10,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            measure_hot_generation: true,
            throw_on_script_error: false,
        }
    }
}

impl HarnessConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check the settings a run cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entry.trim().is_empty() {
            return Err(ConfigError::Invalid("no entry configured".to_string()));
        }
        if self.sentinel.is_empty() {
            return Err(ConfigError::Invalid("sentinel must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".to_string()));
        }
        if !self.url_prefix.is_empty() && !self.url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "url_prefix '{}' must start with '/'",
                self.url_prefix
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Set the source root
    pub fn with_source_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_root = path.into();
        self
    }

    /// Set the generation directory
    pub fn with_work_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.work_dir = path.into();
        self
    }

    /// Set the primary entry
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Append an auxiliary entry
    pub fn with_dependency(mut self, entry: impl Into<String>) -> Self {
        self.dependencies.push(entry.into());
        self
    }

    /// Set the sentinel message
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Set the oracle timeout in seconds
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set whether a faulting script aborts the page load
    pub fn with_throw_on_script_error(mut self, throw: bool) -> Self {
        self.throw_on_script_error = throw;
        self
    }

    /// Set whether the warm generation pass is timed
    pub fn with_hot_generation(mut self, measure: bool) -> Self {
        self.measure_hot_generation = measure;
        self
    }
}
