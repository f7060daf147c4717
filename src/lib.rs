#![forbid(unsafe_code)]
//! genverify: cross-runtime verification for generated script artifacts
//!
//! A generator translates source classes into standalone scripts. genverify serves those scripts from an
//! embedded HTTP server, loads them in order into an independent execution engine, and passes the run only
//! when the executed code emits a specific sentinel alert within a bounded time.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `harness`
//!   modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod config;
pub mod harness;
pub mod version;

pub use config::HarnessConfig;
pub use harness::{
    ArtifactHandler, ArtifactRegistry, EmbeddedServer, EngineOptions, ExecutionEngine, GenerationDirectory,
    Generator, Harness, HarnessError, HeadlessEngine, RequestHandler, RunReport, ScriptSourceGenerator,
    SignalChannel,
};
