//! End-to-end orchestration of one verification run.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::client::{EngineOptions, ExecutionEngine, HeadlessEngine, ScriptOutcome};
use super::errors::HarnessError;
use super::generation::{GenerationDirectory, Generator, ScriptSourceGenerator};
use super::handler::ArtifactHandler;
use super::registry::ArtifactRegistry;
use super::server::EmbeddedServer;
use super::signal::{SentinelWatcher, SignalChannel};
use super::timer::GenerationTimer;
use crate::config::HarnessConfig;

/// Summary of a passing run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub entry: String,
    pub addr: SocketAddr,
    pub work_dir: PathBuf,
    /// Served artifacts in load order.
    pub registry: Vec<String>,
    pub hot_generation_ms: Option<u64>,
    pub scripts: Vec<ScriptOutcome>,
    /// Every alert message observed, in order.
    pub signals: Vec<String>,
    /// Time spent waiting on the oracle after the page loaded.
    pub waited_ms: u64,
}

/// Drives generation, serving, execution and the oracle for one configuration.
#[derive(Debug, Clone)]
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run with the bundled generator and the headless engine.
    pub fn run(&self) -> Result<RunReport, HarnessError> {
        let engine = HeadlessEngine::new(EngineOptions {
            throw_on_script_error: self.config.throw_on_script_error,
            ..EngineOptions::default()
        });
        self.run_with(|directory| ScriptSourceGenerator::new(directory.local_root()), engine)
    }

    /// Run with a caller-supplied generator and engine.
    ///
    /// `make_generator` receives the freshly prepared generation directory. The directory is left in
    /// place afterwards, whatever the outcome.
    #[instrument(skip_all, fields(entry = %self.config.entry))]
    pub fn run_with<G, E>(
        &self,
        make_generator: impl FnOnce(&GenerationDirectory) -> G,
        mut engine: E,
    ) -> Result<RunReport, HarnessError>
    where
        G: Generator,
        E: ExecutionEngine,
    {
        let config = &self.config;
        config.validate()?;

        let directory = GenerationDirectory::prepare(&config.work_dir, &config.url_prefix)?;
        let mut generator = make_generator(&directory);

        let entry = generator.generate(&config.entry, &config.source_root)?;
        let hot_generation_ms = if config.measure_hot_generation {
            let timer = GenerationTimer::start();
            generator.generate(&config.entry, &config.source_root)?;
            Some(millis(timer.finish().as_millis()))
        } else {
            None
        };
        let dependencies = config
            .dependencies
            .iter()
            .map(|dependency| generator.generate(dependency, &config.source_root))
            .collect::<Result<Vec<_>, _>>()?;
        let support = generator.copy_support(directory.local_root())?;

        let registry = Arc::new(ArtifactRegistry::assemble(&support, &dependencies, &entry));
        debug!(artifacts = ?registry.entries(), "registry assembled");
        let directory = Arc::new(directory);

        let handler = ArtifactHandler::new(Arc::clone(&registry), Arc::clone(&directory));
        let mut server = EmbeddedServer::start(config.bind_address, Arc::new(handler))?;

        let channel = Arc::new(SignalChannel::new());
        let watcher = Arc::new(SentinelWatcher::new(config.sentinel.clone(), Arc::clone(&channel)));
        let observer = Arc::clone(&watcher);
        engine.set_signal_handler(Arc::new(move |message: &str| observer.on_signal(message)));

        let page = match engine.navigate(&server.url("/")) {
            Ok(page) => page,
            Err(err) => {
                stop_server(&mut server);
                return Err(err.into());
            }
        };
        drop(engine);
        debug!("page: {}", page.as_xml());
        let failed = page.failed_scripts().count();
        if failed > 0 {
            warn!("{} script(s) faulted while loading the page", failed);
        }

        let waiting = Instant::now();
        let fired = channel.wait_timeout(config.timeout());
        let waited = waiting.elapsed();
        let addr = server.addr();
        stop_server(&mut server);

        if !fired {
            warn!(waited_ms = waited.as_millis(), "sentinel not observed");
            return Err(HarnessError::OracleTimeout {
                sentinel: config.sentinel.clone(),
                timeout: config.timeout(),
            });
        }
        info!("sentinel {:?} observed", config.sentinel);

        Ok(RunReport {
            entry: config.entry.clone(),
            addr,
            work_dir: directory.local_root().to_path_buf(),
            registry: registry.entries().to_vec(),
            hot_generation_ms,
            scripts: page.scripts,
            signals: watcher.signals(),
            waited_ms: millis(waited.as_millis()),
        })
    }
}

fn stop_server(server: &mut EmbeddedServer) {
    if let Err(err) = server.stop() {
        warn!("embedded server did not stop cleanly: {}", err);
    }
}

fn millis(ms: u128) -> u64 {
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::harness::client::{Page, SignalHandler};
    use crate::harness::errors::{EngineError, GenerationError};
    use crate::harness::generation::Artifact;

    /// Writes `<entry>.js` into the output root and records every call.
    struct RecordingGenerator {
        root: PathBuf,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Generator for RecordingGenerator {
        fn generate(&mut self, entry: &str, _source_root: &Path) -> Result<Artifact, GenerationError> {
            self.calls.lock().push(entry.to_string());
            if entry == "fail.Me" {
                return Err(GenerationError::InvalidEntry(entry.to_string()));
            }
            let path = format!("{entry}.js");
            fs::write(self.root.join(&path), "// generated").unwrap();
            Ok(Artifact {
                entry: entry.to_string(),
                output_paths: vec![path],
            })
        }

        fn copy_support(&mut self, dir: &Path) -> Result<Vec<String>, GenerationError> {
            self.calls.lock().push("<support>".to_string());
            fs::write(dir.join("stjs.js"), "var stjs = {};").unwrap();
            Ok(vec!["stjs.js".to_string()])
        }
    }

    /// Fetches the bootstrap page, then replays a fixed list of alerts.
    #[derive(Default)]
    struct ScriptedEngine {
        alerts: Vec<&'static str>,
        fail: bool,
        handler: Option<SignalHandler>,
    }

    impl ExecutionEngine for ScriptedEngine {
        fn set_signal_handler(&mut self, handler: SignalHandler) {
            self.handler = Some(handler);
        }

        fn navigate(&mut self, url: &str) -> Result<Page, EngineError> {
            if self.fail {
                return Err(EngineError::Status {
                    url: url.to_string(),
                    status: 500,
                });
            }
            let html = reqwest::blocking::get(url).unwrap().text().unwrap();
            if let Some(handler) = &self.handler {
                for alert in &self.alerts {
                    handler(alert);
                }
            }
            Ok(Page {
                url: url.to_string(),
                status: 200,
                html,
                scripts: Vec::new(),
            })
        }
    }

    fn config(work: &Path) -> HarnessConfig {
        HarnessConfig::new()
            .with_work_dir(work.join("out"))
            .with_entry("a.Main")
            .with_dependency("a.DTO")
            .with_dependency("a.Global2")
            .with_timeout_secs(1)
    }

    fn recording(calls: &Arc<Mutex<Vec<String>>>) -> impl FnOnce(&GenerationDirectory) -> RecordingGenerator {
        let calls = Arc::clone(calls);
        move |directory: &GenerationDirectory| RecordingGenerator {
            root: directory.local_root().to_path_buf(),
            calls,
        }
    }

    #[test]
    fn test_generation_order_and_registry() {
        let work = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = ScriptedEngine {
            alerts: vec!["noise", "test log alert"],
            ..ScriptedEngine::default()
        };

        let report = Harness::new(config(work.path()))
            .run_with(recording(&calls), engine)
            .unwrap();

        assert_eq!(*calls.lock(), vec!["a.Main", "a.Main", "a.DTO", "a.Global2", "<support>"]);
        assert_eq!(report.registry, vec!["stjs.js", "a.DTO.js", "a.Global2.js", "a.Main.js"]);
        assert_eq!(report.signals, vec!["noise", "test log alert"]);
        assert!(report.hot_generation_ms.is_some());
    }

    #[test]
    fn test_hot_generation_can_be_disabled() {
        let work = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = ScriptedEngine {
            alerts: vec!["test log alert"],
            ..ScriptedEngine::default()
        };
        let report = Harness::new(config(work.path()).with_hot_generation(false))
            .run_with(recording(&calls), engine)
            .unwrap();
        assert_eq!(calls.lock().iter().filter(|c| *c == "a.Main").count(), 1);
        assert_eq!(report.hot_generation_ms, None);
    }

    #[test]
    fn test_missing_sentinel_times_out() {
        let work = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = ScriptedEngine {
            alerts: vec!["test log alert!"],
            ..ScriptedEngine::default()
        };
        let started = Instant::now();
        let err = Harness::new(config(work.path()))
            .run_with(recording(&calls), engine)
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(work.path().join("out/a.Main.js").exists());
    }

    #[test]
    fn test_generation_failure_stops_before_serving() {
        let work = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let config = config(work.path()).with_dependency("fail.Me").with_dependency("never.Reached");
        let err = Harness::new(config)
            .run_with(recording(&calls), ScriptedEngine::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::Generation(GenerationError::InvalidEntry(_))));
        assert!(!calls.lock().contains(&"never.Reached".to_string()));
    }

    #[test]
    fn test_navigation_failure_is_reported() {
        let work = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let engine = ScriptedEngine {
            fail: true,
            ..ScriptedEngine::default()
        };
        let err = Harness::new(config(work.path()))
            .run_with(recording(&calls), engine)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Navigation(EngineError::Status { status: 500, .. })));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_touching_disk() {
        let work = tempfile::tempdir().unwrap();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let config = config(work.path()).with_entry("");
        let err = Harness::new(config)
            .run_with(recording(&calls), ScriptedEngine::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
        assert!(!work.path().join("out").exists());
    }
}
