//! CLI module for genverify
//!
//! ## Commands
//!
//! - `run` - Generate, serve and execute one scenario, passing on the sentinel alert
//! - `serve <dir>` - Serve an existing generation directory until interrupted
//! - `exec <file>` - Execute one script with the embedded interpreter
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Everything ran, but the sentinel never arrived.
    pub const TIMEOUT: ExitCode = ExitCode(2);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Cross-runtime verification harness for generated scripts
#[derive(Parser, Debug)]
#[command(name = "genverify")]
#[command(version = VERSION)]
#[command(about = "Serve generated scripts to a headless engine and wait for the sentinel alert", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Tokenize a script only (debug)
    #[arg(long = "lex", value_name = "FILE")]
    pub lex_file: Option<PathBuf>,

    /// Parse a script only (debug)
    #[arg(long = "parse", value_name = "FILE", conflicts_with = "lex_file")]
    pub parse_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate, serve and execute one scenario
    Run(RunArgs),

    /// Serve an existing generation directory until Ctrl-C
    Serve {
        /// Directory holding generated artifacts
        #[arg(long, value_name = "DIR")]
        dir: PathBuf,
        /// Artifact to list on the bootstrap page, in load order (default: every script in DIR)
        #[arg(long = "script", value_name = "PATH")]
        scripts: Vec<String>,
        /// Local address to bind; the port is chosen by the OS
        #[arg(long, value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        bind: IpAddr,
        /// URL prefix the directory is also reachable under
        #[arg(long, value_name = "PREFIX", default_value = "/jsoutput")]
        prefix: String,
    },

    /// Execute a script with the embedded interpreter, printing its alerts
    Exec {
        /// Script file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Flags for `genverify run`; each one overrides the configuration file.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Configuration file (default: ./genverify.toml when present)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Directory holding the sources to generate from
    #[arg(long, value_name = "DIR")]
    pub source_root: Option<PathBuf>,
    /// Generation directory; cleared at the start of the run
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,
    /// Primary entry, for example a.b.c.Main
    #[arg(long, value_name = "ID")]
    pub entry: Option<String>,
    /// Auxiliary entry, loaded before the primary one; repeat in load order
    #[arg(long = "dep", value_name = "ID")]
    pub dependencies: Vec<String>,
    /// Alert message that passes the run
    #[arg(long, value_name = "MESSAGE")]
    pub sentinel: Option<String>,
    /// Seconds to wait for the sentinel after the page loads
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
    /// Local address for the embedded server
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<IpAddr>,
    /// Skip the timed second generation of the primary entry
    #[arg(long)]
    pub no_hot: bool,
    /// Abort the page load on the first faulting script
    #[arg(long)]
    pub throw_on_script_error: bool,
    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    if let Some(file) = cli.lex_file {
        return commands::lex_file(&file);
    }
    if let Some(file) = cli.parse_file {
        return commands::parse_file(&file);
    }

    match cli.command {
        Some(Command::Run(args)) => commands::run_scenario(&args),
        Some(Command::Serve {
            dir,
            scripts,
            bind,
            prefix,
        }) => commands::serve_directory(&dir, scripts, bind, &prefix),
        Some(Command::Exec { file }) => commands::exec_file(&file),
        None => Err(CliError::failure("no command given; see `genverify --help`")),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "genverify",
            "run",
            "--entry",
            "a.b.c.Main",
            "--dep",
            "a.b.c.DTO",
            "--dep",
            "a.b.c.Global2",
            "--timeout",
            "3",
            "--json",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.entry.as_deref(), Some("a.b.c.Main"));
        assert_eq!(args.dependencies, vec!["a.b.c.DTO", "a.b.c.Global2"]);
        assert_eq!(args.timeout, Some(3));
        assert!(args.json);
        assert!(!args.no_hot);
    }

    #[test]
    fn test_cli_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["genverify", "serve", "--dir", "out", "--script", "stjs.js"]).unwrap();
        if let Some(Command::Serve {
            dir,
            scripts,
            bind,
            prefix,
        }) = cli.command
        {
            assert_eq!(dir, PathBuf::from("out"));
            assert_eq!(scripts, vec!["stjs.js"]);
            assert_eq!(bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
            assert_eq!(prefix, "/jsoutput");
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_cli_parse_serve_requires_dir() {
        assert!(Cli::try_parse_from(["genverify", "serve"]).is_err());
    }

    #[test]
    fn test_cli_parse_bind_must_be_an_address() {
        assert!(Cli::try_parse_from(["genverify", "run", "--bind", "localhost"]).is_err());
        let cli = Cli::try_parse_from(["genverify", "run", "--bind", "::1"]).unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert!(args.bind.is_some_and(|addr| addr.is_ipv6()));
    }

    #[test]
    fn test_cli_parse_debug_flags() {
        let cli = Cli::try_parse_from(["genverify", "--lex", "a.js"]).unwrap();
        assert!(cli.lex_file.is_some());
        let cli = Cli::try_parse_from(["genverify", "--parse", "a.js"]).unwrap();
        assert!(cli.parse_file.is_some());
        assert!(Cli::try_parse_from(["genverify", "--lex", "a.js", "--parse", "b.js"]).is_err());
    }

    #[test]
    fn test_timeout_exit_code_differs_from_failure() {
        assert_ne!(ExitCode::TIMEOUT, ExitCode::FAILURE);
    }
}
