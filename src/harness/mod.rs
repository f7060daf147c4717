//! Verification harness
//!
//! Generated artifacts are written to a [`GenerationDirectory`], listed in an [`ArtifactRegistry`], served
//! by an [`EmbeddedServer`] through an injected [`RequestHandler`], and loaded into an
//! [`ExecutionEngine`]. The run passes when the executed code alerts the sentinel, observed through a
//! one-shot [`SignalChannel`], before the timeout.
//!
//! ## Modules
//!
//! - `generation` - generation directory and the generator boundary
//! - `registry` - ordered artifact list and the bootstrap page
//! - `handler` - request routing
//! - `server` - embedded HTTP server
//! - `client` - execution engine boundary and the headless engine
//! - `signal` - sentinel oracle
//! - `timer` - generation latency measurement
//! - `runner` - end-to-end orchestration

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod client;
pub mod errors;
pub mod generation;
pub mod handler;
pub mod registry;
pub mod runner;
pub mod server;
pub mod signal;
pub mod timer;

pub use client::{EngineOptions, ExecutionEngine, HeadlessEngine, Page, ScriptOutcome, ScriptStatus, SignalHandler};
pub use errors::{ConfigError, EngineError, GenerationError, HarnessError};
pub use generation::{Artifact, GenerationDirectory, Generator, SUPPORT_LIBRARY, ScriptSourceGenerator};
pub use handler::{ArtifactHandler, HttpRequest, HttpResponse, RequestHandler};
pub use registry::ArtifactRegistry;
pub use runner::{Harness, RunReport};
pub use server::EmbeddedServer;
pub use signal::{SentinelWatcher, SignalChannel, SignalState};
pub use timer::GenerationTimer;
