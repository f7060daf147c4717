//! Harness error types
//!
//! `HarnessError` is what a run returns; it carries `miette` diagnostic codes so the CLI can render it
//! with help text. The narrower enums belong to the collaborator boundaries (generator, engine, config)
//! and convert into it with `?`.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use genverify_script::ScriptError;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised by a [`Generator`](super::Generator)
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid entry identifier '{0}'")]
    InvalidEntry(String),

    #[error("no source for '{entry}' at {}", path.display())]
    SourceNotFound { entry: String, path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by an [`ExecutionEngine`](super::ExecutionEngine)
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("cannot resolve '{reference}' against {base}: {message}")]
    InvalidUrl {
        base: String,
        reference: String,
        message: String,
    },

    #[error("script {src} failed: {source}")]
    Script {
        src: String,
        #[source]
        source: ScriptError,
    },

    #[error("failed to start the script thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("the script thread panicked")]
    Panicked,
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Why a verification run did not pass
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("failed to start the embedded server on {addr}: {source}")]
    #[diagnostic(
        code(genverify::server_startup),
        help("bind_address must name a local interface; the port is always chosen by the OS")
    )]
    ServerStartup {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("generation failed: {0}")]
    #[diagnostic(code(genverify::generation))]
    Generation(#[from] GenerationError),

    #[error("sentinel {sentinel:?} was not observed within {timeout:?}")]
    #[diagnostic(
        code(genverify::oracle_timeout),
        help("the artifacts loaded but never alerted the sentinel; the generation directory is kept for inspection")
    )]
    OracleTimeout { sentinel: String, timeout: Duration },

    #[error("navigation failed: {0}")]
    #[diagnostic(code(genverify::navigation))]
    Navigation(#[from] EngineError),

    #[error("failed to prepare generation directory {}: {source}", path.display())]
    #[diagnostic(code(genverify::workspace))]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(genverify::config))]
    Config(#[from] ConfigError),
}

impl HarnessError {
    /// True when every step worked but the sentinel never arrived.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::OracleTimeout { .. })
    }
}
