//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use genverify_script::{Interpreter, ScriptError, Value, lexer, parser};
use tracing::info;
use walkdir::WalkDir;

use super::{CliError, CliResult, ExitCode, RunArgs};
use crate::config::{CONFIG_FILE_NAME, HarnessConfig};
use crate::harness::{
    ArtifactHandler, ArtifactRegistry, EmbeddedServer, GenerationDirectory, Harness, HarnessError, RunReport,
    SUPPORT_LIBRARY,
};

// ============================================================================
// run
// ============================================================================

/// Resolve the configuration for `run`: file first, then flags on top.
pub fn load_config(args: &RunArgs) -> CliResult<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path).map_err(|e| harness_error(e.into()))?,
        None if Path::new(CONFIG_FILE_NAME).is_file() => {
            HarnessConfig::load(Path::new(CONFIG_FILE_NAME)).map_err(|e| harness_error(e.into()))?
        }
        None => HarnessConfig::new(),
    };

    if let Some(source_root) = &args.source_root {
        config.source_root = source_root.clone();
    }
    if let Some(work_dir) = &args.work_dir {
        config.work_dir = work_dir.clone();
    }
    if let Some(entry) = &args.entry {
        config.entry = entry.clone();
    }
    if !args.dependencies.is_empty() {
        config.dependencies = args.dependencies.clone();
    }
    if let Some(sentinel) = &args.sentinel {
        config.sentinel = sentinel.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if args.no_hot {
        config.measure_hot_generation = false;
    }
    if args.throw_on_script_error {
        config.throw_on_script_error = true;
    }
    Ok(config)
}

/// Run one scenario and report the outcome.
pub fn run_scenario(args: &RunArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let report = Harness::new(config).run().map_err(harness_error)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::failure(format!("Error serialising report: {}", e)))?;
        println!("{}", json);
    } else {
        print_summary(&report);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_summary(report: &RunReport) {
    println!("✓ {} passed after {} ms", report.entry, report.waited_ms);
    println!("  served {} artifact(s) from http://{}", report.registry.len(), report.addr);
    for path in &report.registry {
        println!("    {}", path);
    }
    if let Some(ms) = report.hot_generation_ms {
        println!("  hot generation: {} ms", ms);
    }
    println!("  output kept in {}", report.work_dir.display());
}

/// Render a harness error with its diagnostic code and help, picking the exit code.
fn harness_error(err: HarnessError) -> CliError {
    let exit_code = if err.is_timeout() {
        ExitCode::TIMEOUT
    } else {
        ExitCode::FAILURE
    };
    CliError::new(format!("{:?}", miette::Report::new(err)), exit_code)
}

// ============================================================================
// serve
// ============================================================================

/// Serve an existing generation directory until Ctrl-C.
pub fn serve_directory(dir: &Path, scripts: Vec<String>, bind: IpAddr, prefix: &str) -> CliResult<ExitCode> {
    if !dir.is_dir() {
        return Err(CliError::failure(format!("Error: {} is not a directory", dir.display())));
    }
    let registry: ArtifactRegistry = if scripts.is_empty() {
        discover_scripts(dir)
            .map_err(|e| CliError::failure(format!("Error reading {}: {}", dir.display(), e)))?
            .into_iter()
            .collect()
    } else {
        scripts.into_iter().collect()
    };
    if registry.is_empty() {
        return Err(CliError::failure(format!("Error: no scripts found in {}", dir.display())));
    }

    let directory = GenerationDirectory::new(dir, prefix);
    let handler = ArtifactHandler::new(Arc::new(registry), Arc::new(directory));
    let mut server = EmbeddedServer::start(bind, Arc::new(handler)).map_err(harness_error)?;
    println!("Serving {} at {}", dir.display(), server.url("/"));
    println!("Press Ctrl-C to stop");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::failure(format!("Error starting signal handler: {}", e)))?;
    runtime
        .block_on(tokio::signal::ctrl_c())
        .map_err(|e| CliError::failure(format!("Error waiting for Ctrl-C: {}", e)))?;

    info!("interrupted, shutting down");
    server
        .stop()
        .map_err(|e| CliError::failure(format!("Error stopping server: {}", e)))?;
    Ok(ExitCode::SUCCESS)
}

/// Every `.js` file under `dir`, relative and `/`-separated: the support library first, the rest sorted.
///
/// Symbolic links are listed but never followed.
fn discover_scripts(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || !path.extension().is_some_and(|ext| ext == "js") {
            continue;
        }
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        found.push(segments.join("/"));
    }
    found.sort_by(|a, b| (a != SUPPORT_LIBRARY, a).cmp(&(b != SUPPORT_LIBRARY, b)));
    Ok(found)
}

// ============================================================================
// Script debugging
// ============================================================================

fn read_source(file_path: &Path) -> CliResult<String> {
    fs::read_to_string(file_path)
        .map_err(|e| CliError::failure(format!("Error reading {}: {}", file_path.display(), e)))
}

fn format_errors(file_path: &Path, source: &str, errors: &[ScriptError]) -> CliError {
    let mut msg = String::new();
    for err in errors {
        msg.push_str(&format!("{}:{}\n", file_path.display(), err.render(source)));
    }
    CliError::failure(msg.trim_end())
}

/// Tokenize and display tokens.
pub fn lex_file(file_path: &Path) -> CliResult<ExitCode> {
    let source = read_source(file_path)?;
    let tokens = lexer::lex(&source).map_err(|errs| format_errors(file_path, &source, &errs))?;
    for tok in &tokens {
        println!("{:?}", tok);
    }
    Ok(ExitCode::SUCCESS)
}

/// Parse and display the syntax tree.
pub fn parse_file(file_path: &Path) -> CliResult<ExitCode> {
    let source = read_source(file_path)?;
    let tokens = lexer::lex(&source).map_err(|errs| format_errors(file_path, &source, &errs))?;
    let program = parser::parse(&tokens).map_err(|errs| format_errors(file_path, &source, &errs))?;
    println!("{:#?}", program);
    Ok(ExitCode::SUCCESS)
}

/// Execute a script, printing each alert on its own line.
pub fn exec_file(file_path: &Path) -> CliResult<ExitCode> {
    let source = read_source(file_path)?;
    let alerts = exec_source(&source).map_err(|err| format_errors(file_path, &source, &[err]))?;
    for alert in alerts {
        println!("alert: {}", alert);
    }
    Ok(ExitCode::SUCCESS)
}

const MAX_TIMER_CALLBACKS: usize = 1_000;

fn exec_source(source: &str) -> Result<Vec<String>, ScriptError> {
    let alerts = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = alerts.clone();
    let mut interpreter = Interpreter::new();
    interpreter.define_function("alert", move |args| {
        sink.borrow_mut()
            .push(args.first().map(Value::to_js_string).unwrap_or_default());
        Value::Undefined
    });
    interpreter.run(source)?;
    for _ in 0..MAX_TIMER_CALLBACKS {
        match interpreter.run_next_timer() {
            Some(result) => {
                result?;
            }
            None => break,
        }
    }
    let collected = std::mem::take(&mut *alerts.borrow_mut());
    Ok(collected)
}
