//! Execution engine boundary and the headless engine.
//!
//! An [`ExecutionEngine`] loads a page by URL, runs the scripts it references, and reports every
//! `alert(message)` to the installed [`SignalHandler`]. The harness never looks inside the engine beyond
//! that callback and the returned [`Page`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use genverify_script::interp::DEFAULT_STEP_LIMIT;
use genverify_script::{Interpreter, Value};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::errors::EngineError;

/// Receives the message of every `alert` call, synchronously, on the engine's thread.
pub type SignalHandler = Arc<dyn Fn(&str) + Send + Sync>;

const SCRIPT_THREAD_STACK: usize = 256 * 1024 * 1024;

/// Timer callbacks run after the last script before the page counts as settled.
const MAX_TIMER_CALLBACKS: usize = 1_000;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub javascript_enabled: bool,
    /// Abort navigation on the first faulting script instead of logging it and loading the next one.
    pub throw_on_script_error: bool,
    /// Interpreter step budget per script.
    pub step_limit: u64,
    /// Nested script calls allowed before a `RangeError`.
    pub max_call_depth: usize,
    pub request_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            javascript_enabled: true,
            throw_on_script_error: false,
            step_limit: DEFAULT_STEP_LIMIT,
            max_call_depth: 1_000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ScriptStatus {
    Executed,
    /// The script faulted; the rendered error.
    Failed(String),
    /// The script could not be fetched; the HTTP status.
    Unavailable(u16),
    /// Script execution is disabled.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptOutcome {
    /// The `src` attribute as written in the page, or `inline#N`.
    pub src: String,
    pub status: ScriptStatus,
}

/// A loaded page and what happened to each of its scripts, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub url: String,
    pub status: u16,
    pub html: String,
    pub scripts: Vec<ScriptOutcome>,
}

impl Page {
    /// Serialised view of the page for logging, one element per line.
    pub fn as_xml(&self) -> String {
        let mut xml = String::from("<html>\n  <head>\n");
        for script in &self.scripts {
            let state = match &script.status {
                ScriptStatus::Executed => "executed".to_string(),
                ScriptStatus::Failed(_) => "failed".to_string(),
                ScriptStatus::Unavailable(status) => format!("unavailable {status}"),
                ScriptStatus::Skipped => "skipped".to_string(),
            };
            xml.push_str(&format!(
                "    <script type=\"text/javascript\" src=\"{}\" state=\"{}\"/>\n",
                script.src, state
            ));
        }
        xml.push_str("  </head>\n  <body/>\n</html>");
        xml
    }

    pub fn failed_scripts(&self) -> impl Iterator<Item = &ScriptOutcome> {
        self.scripts
            .iter()
            .filter(|script| matches!(script.status, ScriptStatus::Failed(_)))
    }
}

/// Something that can load a page and execute its scripts.
pub trait ExecutionEngine {
    /// Install the callback for `alert`. Replaces any previous handler.
    fn set_signal_handler(&mut self, handler: SignalHandler);

    /// Load `url` and run its scripts to completion.
    fn navigate(&mut self, url: &str) -> Result<Page, EngineError>;
}

// ============================================================================
// Headless engine
// ============================================================================

/// Engine backed by a blocking HTTP client and the embedded script interpreter.
///
/// All scripts of one page share a single global scope. Each navigation runs on its own thread so the
/// interpreter gets a large stack regardless of the caller's.
#[derive(Default)]
pub struct HeadlessEngine {
    options: EngineOptions,
    on_signal: Option<SignalHandler>,
}

impl std::fmt::Debug for HeadlessEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessEngine")
            .field("options", &self.options)
            .field("on_signal", &self.on_signal.is_some())
            .finish()
    }
}

impl HeadlessEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            on_signal: None,
        }
    }
}

impl ExecutionEngine for HeadlessEngine {
    fn set_signal_handler(&mut self, handler: SignalHandler) {
        self.on_signal = Some(handler);
    }

    #[instrument(skip(self))]
    fn navigate(&mut self, url: &str) -> Result<Page, EngineError> {
        let url = url.to_string();
        let options = self.options.clone();
        let on_signal = self.on_signal.clone();
        let worker = thread::Builder::new()
            .name("genverify-script".to_string())
            .stack_size(SCRIPT_THREAD_STACK)
            .spawn(move || load_page(url, &options, on_signal))
            .map_err(EngineError::Spawn)?;
        worker.join().map_err(|_| EngineError::Panicked)?
    }
}

fn load_page(url: String, options: &EngineOptions, on_signal: Option<SignalHandler>) -> Result<Page, EngineError> {
    let client = Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(options.request_timeout)
        .build()
        .map_err(|source| EngineError::Http {
            url: url.clone(),
            source,
        })?;

    let (status, html) = fetch(&client, &url)?;
    if !(200..300).contains(&status) {
        return Err(EngineError::Status { url, status });
    }
    let base = Url::parse(&url).map_err(|err| EngineError::InvalidUrl {
        base: url.clone(),
        reference: url.clone(),
        message: err.to_string(),
    })?;

    let mut interpreter = Interpreter::new()
        .with_step_limit(options.step_limit)
        .with_max_call_depth(options.max_call_depth);
    interpreter.define_function("alert", move |args| {
        let message = args.first().map(Value::to_js_string).unwrap_or_default();
        match &on_signal {
            Some(handler) => handler(&message),
            None => debug!("alert without a handler: {}", message),
        }
        Value::Undefined
    });

    let mut scripts = Vec::new();
    let mut inline_count = 0;
    for tag in extract_scripts(&html) {
        let (src, source) = match tag {
            ScriptTag::External(reference) => {
                if !options.javascript_enabled {
                    scripts.push(ScriptOutcome {
                        src: reference,
                        status: ScriptStatus::Skipped,
                    });
                    continue;
                }
                let resolved = base.join(&reference).map_err(|err| EngineError::InvalidUrl {
                    base: url.clone(),
                    reference: reference.clone(),
                    message: err.to_string(),
                })?;
                let (status, body) = fetch(&client, resolved.as_str())?;
                if !(200..300).contains(&status) {
                    warn!("script {} unavailable (status {})", resolved, status);
                    scripts.push(ScriptOutcome {
                        src: reference,
                        status: ScriptStatus::Unavailable(status),
                    });
                    continue;
                }
                (reference, body)
            }
            ScriptTag::Inline(body) => {
                inline_count += 1;
                let src = format!("inline#{inline_count}");
                if !options.javascript_enabled {
                    scripts.push(ScriptOutcome {
                        src,
                        status: ScriptStatus::Skipped,
                    });
                    continue;
                }
                (src, body)
            }
        };

        let status = match interpreter.run(&source) {
            Ok(_) => {
                debug!("executed {}", src);
                ScriptStatus::Executed
            }
            Err(source_error) if options.throw_on_script_error => {
                return Err(EngineError::Script {
                    src,
                    source: source_error,
                });
            }
            Err(script_error) => {
                let rendered = script_error.render(&source);
                warn!("script {} failed: {}", src, rendered);
                ScriptStatus::Failed(rendered)
            }
        };
        scripts.push(ScriptOutcome { src, status });
    }

    let mut callbacks = 0;
    while callbacks < MAX_TIMER_CALLBACKS {
        let Some(result) = interpreter.run_next_timer() else {
            break;
        };
        callbacks += 1;
        if let Err(script_error) = result {
            let src = format!("timer#{callbacks}");
            if options.throw_on_script_error {
                return Err(EngineError::Script {
                    src,
                    source: script_error,
                });
            }
            warn!("{} failed: {}", src, script_error);
            scripts.push(ScriptOutcome {
                src,
                status: ScriptStatus::Failed(script_error.to_string()),
            });
        }
    }
    if interpreter.pending_timers() > 0 {
        debug!("{} timer(s) still pending after {} callbacks", interpreter.pending_timers(), callbacks);
    }

    info!("loaded {} with {} script(s)", url, scripts.len());
    Ok(Page {
        url,
        status,
        html,
        scripts,
    })
}

fn fetch(client: &Client, url: &str) -> Result<(u16, String), EngineError> {
    let http_error = |source: reqwest::Error| EngineError::Http {
        url: url.to_string(),
        source,
    };
    let response = client.get(url).send().map_err(http_error)?;
    let status = response.status().as_u16();
    let body = response.text().map_err(http_error)?;
    Ok((status, body))
}

// ============================================================================
// Script extraction
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptTag {
    External(String),
    Inline(String),
}

/// Find every `<script>` element in document order.
///
/// Elements with a `src` attribute are external regardless of their body; empty inline bodies are dropped.
fn extract_scripts(html: &str) -> Vec<ScriptTag> {
    const OPEN: &str = "<script";
    const CLOSE: &str = "</script";

    // ASCII lowering keeps byte offsets, so positions found here index `html` too.
    let lower = html.to_ascii_lowercase();
    let mut tags = Vec::new();
    let mut cursor = 0;
    while let Some(found) = lower[cursor..].find(OPEN) {
        let name_end = cursor + found + OPEN.len();
        let at_boundary = lower[name_end..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_whitespace() || c == '>' || c == '/');
        if !at_boundary {
            cursor = name_end;
            continue;
        }
        let Some(open_len) = lower[name_end..].find('>') else {
            break;
        };
        let open_end = name_end + open_len;
        let attrs = &html[name_end..open_end];
        let body_start = open_end + 1;

        let (body, next) = if attrs.trim_end().ends_with('/') {
            ("", body_start)
        } else {
            match lower[body_start..].find(CLOSE) {
                Some(close) => {
                    let close_at = body_start + close;
                    let close_end = lower[close_at..].find('>').map_or(lower.len(), |i| close_at + i + 1);
                    (&html[body_start..close_at], close_end)
                }
                None => (&html[body_start..], html.len()),
            }
        };

        match attribute(attrs, "src") {
            Some(src) => tags.push(ScriptTag::External(src)),
            None if !body.trim().is_empty() => tags.push(ScriptTag::Inline(body.to_string())),
            None => {}
        }
        cursor = next;
    }
    tags
}

/// Value of attribute `name` (case-insensitive) in the text between a tag name and its `>`.
fn attribute(attrs: &str, name: &str) -> Option<String> {
    let mut rest = attrs;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            return None;
        }
        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                let (value, remaining) = match after.chars().next() {
                    Some(quote @ ('"' | '\'')) => {
                        let inner = &after[1..];
                        match inner.find(quote) {
                            Some(end) => (&inner[..end], &inner[end + 1..]),
                            None => (inner, ""),
                        }
                    }
                    _ => {
                        let end = after.find(char::is_whitespace).unwrap_or(after.len());
                        (&after[..end], &after[end..])
                    }
                };
                rest = remaining;
                value
            }
            None => "",
        };
        if key.eq_ignore_ascii_case(name) {
            return Some(value.to_string());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use parking_lot::Mutex;

    use super::*;
    use crate::harness::handler::{CONTENT_TYPE_HTML, CONTENT_TYPE_JAVASCRIPT, HttpRequest, HttpResponse};
    use crate::harness::server::EmbeddedServer;

    #[test]
    fn test_extract_scripts_in_document_order() {
        let html = concat!(
            r#"<!DOCTYPE html><html><head><script type="text/javascript" src="stjs.js"></script>"#,
            r#"<SCRIPT SRC='a/Main.js'></SCRIPT><script>alert('x')</script><script src=b.js /></head></html>"#
        );
        assert_eq!(
            extract_scripts(html),
            vec![
                ScriptTag::External("stjs.js".to_string()),
                ScriptTag::External("a/Main.js".to_string()),
                ScriptTag::Inline("alert('x')".to_string()),
                ScriptTag::External("b.js".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_ignores_lookalike_tags() {
        let html = "<scripts></scripts><script>  </script><noscript>x</noscript>";
        assert!(extract_scripts(html).is_empty());
    }

    #[test]
    fn test_attribute_parsing() {
        assert_eq!(attribute(r#" type="text/javascript" src="x.js""#, "src").as_deref(), Some("x.js"));
        assert_eq!(attribute(" async src=y.js", "src").as_deref(), Some("y.js"));
        assert_eq!(attribute(r#" data-src="no.js""#, "src"), None);
        assert_eq!(attribute("", "src"), None);
    }

    #[test]
    fn test_as_xml_snapshot() {
        let page = Page {
            url: "http://127.0.0.1:1/".to_string(),
            status: 200,
            html: String::new(),
            scripts: vec![
                ScriptOutcome {
                    src: "stjs.js".to_string(),
                    status: ScriptStatus::Executed,
                },
                ScriptOutcome {
                    src: "a/Gone.js".to_string(),
                    status: ScriptStatus::Unavailable(404),
                },
            ],
        };
        insta::assert_snapshot!(page.as_xml(), @r#"
        <html>
          <head>
            <script type="text/javascript" src="stjs.js" state="executed"/>
            <script type="text/javascript" src="a/Gone.js" state="unavailable 404"/>
          </head>
          <body/>
        </html>
        "#);
    }

    fn site() -> EmbeddedServer {
        let handler = |request: &HttpRequest| match request.target.as_str() {
            "/" => HttpResponse::ok(
                CONTENT_TYPE_HTML,
                concat!(
                    r#"<html><head><script src="lib.js"></script><script src="broken.js"></script>"#,
                    r#"<script src="missing.js"></script><script src="main.js"></script></head></html>"#
                ),
            ),
            "/lib.js" => HttpResponse::ok(CONTENT_TYPE_JAVASCRIPT, "var greeting = 'hello';"),
            "/broken.js" => HttpResponse::ok(CONTENT_TYPE_JAVASCRIPT, "var partial = 1; nothing.here();"),
            "/main.js" => HttpResponse::ok(CONTENT_TYPE_JAVASCRIPT, "alert(greeting + ' ' + partial);"),
            _ => HttpResponse::not_found(),
        };
        EmbeddedServer::start(IpAddr::V4(Ipv4Addr::LOCALHOST), Arc::new(handler)).unwrap()
    }

    #[test]
    fn test_navigate_runs_scripts_in_shared_scope() {
        let server = site();
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&alerts);

        let mut engine = HeadlessEngine::new(EngineOptions::default());
        engine.set_signal_handler(Arc::new(move |message: &str| sink.lock().push(message.to_string())));
        let page = engine.navigate(&server.url("/")).unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(*alerts.lock(), vec!["hello 1"]);
        let statuses: Vec<_> = page.scripts.iter().map(|s| s.status.clone()).collect();
        assert!(matches!(statuses[1], ScriptStatus::Failed(ref m) if m.contains("nothing is not defined")));
        assert_eq!(statuses[2], ScriptStatus::Unavailable(404));
        assert_eq!(statuses[3], ScriptStatus::Executed);
        assert_eq!(page.failed_scripts().count(), 1);
    }

    #[test]
    fn test_throw_on_script_error_aborts() {
        let server = site();
        let mut engine = HeadlessEngine::new(EngineOptions {
            throw_on_script_error: true,
            ..EngineOptions::default()
        });
        let err = engine.navigate(&server.url("/")).unwrap_err();
        assert!(matches!(err, EngineError::Script { ref src, .. } if src == "broken.js"));
    }

    #[test]
    fn test_javascript_disabled_skips_everything() {
        let server = site();
        let mut engine = HeadlessEngine::new(EngineOptions {
            javascript_enabled: false,
            ..EngineOptions::default()
        });
        let page = engine.navigate(&server.url("/")).unwrap();
        assert!(page.scripts.iter().all(|s| s.status == ScriptStatus::Skipped));
    }

    fn single_script(body: &'static str) -> EmbeddedServer {
        let handler = move |request: &HttpRequest| match request.target.as_str() {
            "/" => HttpResponse::ok(CONTENT_TYPE_HTML, r#"<html><head><script src="main.js"></script></head></html>"#),
            "/main.js" => HttpResponse::ok(CONTENT_TYPE_JAVASCRIPT, body),
            _ => HttpResponse::not_found(),
        };
        EmbeddedServer::start(IpAddr::V4(Ipv4Addr::LOCALHOST), Arc::new(handler)).unwrap()
    }

    fn alerts_from(server: &EmbeddedServer, options: EngineOptions) -> (Vec<String>, Page) {
        let alerts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&alerts);
        let mut engine = HeadlessEngine::new(options);
        engine.set_signal_handler(Arc::new(move |message: &str| sink.lock().push(message.to_string())));
        let page = engine.navigate(&server.url("/")).unwrap();
        let seen = alerts.lock().clone();
        (seen, page)
    }

    #[test]
    fn test_timer_alert_is_delivered_after_scripts() {
        let server = single_script("setTimeout(function () { alert('test log alert'); }, 100); alert('first');");
        let (alerts, page) = alerts_from(&server, EngineOptions::default());
        assert_eq!(alerts, vec!["first", "test log alert"]);
        assert_eq!(page.failed_scripts().count(), 0);
    }

    #[test]
    fn test_endless_interval_is_bounded() {
        let server = single_script("var n = 0; setInterval(function () { n++; }, 1); alert('loaded');");
        let (alerts, page) = alerts_from(&server, EngineOptions::default());
        assert_eq!(alerts, vec!["loaded"]);
        assert_eq!(page.failed_scripts().count(), 0);
    }

    #[test]
    fn test_failing_timer_is_recorded() {
        let server = single_script("setTimeout(function () { nothing.here(); }, 0);");
        let (_, page) = alerts_from(&server, EngineOptions::default());
        let failed: Vec<_> = page.failed_scripts().map(|s| s.src.as_str()).collect();
        assert_eq!(failed, vec!["timer#1"]);
    }

    #[test]
    fn test_deep_recursion_within_the_engine() {
        let server = single_script(concat!(
            "var list = null; for (var i = 0; i < 500; i++) { list = { next: list }; }",
            "function length(node) { return node === null ? 0 : 1 + length(node.next); }",
            "alert(length(list));"
        ));
        let (alerts, page) = alerts_from(&server, EngineOptions::default());
        assert_eq!(alerts, vec!["500"]);
        assert_eq!(page.failed_scripts().count(), 0);
    }

    #[test]
    fn test_missing_page_is_status_error() {
        let server = site();
        let mut engine = HeadlessEngine::default();
        let err = engine.navigate(&server.url("/nope")).unwrap_err();
        assert!(matches!(err, EngineError::Status { status: 404, .. }));
    }
}
