//! Property-based tests for the harness
//!
//! These tests use proptest to check serving, page assembly and the oracle across many generated inputs.

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use genverify::harness::{ArtifactHandler, HttpRequest, SentinelWatcher};
use genverify::{ArtifactRegistry, GenerationDirectory, RequestHandler, SignalChannel};
use proptest::prelude::*;

fn artifact_path() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z]{1,6}){0,2}/[A-Z][a-zA-Z0-9]{0,8}\\.js"
}

// =============================================================================
// Serving
// =============================================================================

proptest! {
    /// Property: a served artifact is byte-for-byte the file on disk
    #[test]
    fn served_body_equals_file(path in artifact_path(), contents in any::<String>()) {
        let dir = tempfile::tempdir().unwrap();
        let full = dir.path().join(&path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(&full, &contents).unwrap();

        let handler = ArtifactHandler::new(
            Arc::new(ArtifactRegistry::new()),
            Arc::new(GenerationDirectory::new(dir.path(), "/jsoutput")),
        );
        let response = handler.handle(&HttpRequest::new(format!("/{path}")));
        prop_assert_eq!(response.status, 200);
        prop_assert_eq!(response.content_type, "application/javascript");
        prop_assert_eq!(response.body, contents);
    }

    /// Property: no target resolves outside the generation directory
    #[test]
    fn resolve_stays_under_root(target in "(/|\\.\\./|\\./|[a-z]{1,4}/|%2e|\\?|#){0,8}[a-z.]{0,6}") {
        let directory = GenerationDirectory::new("/srv/out", "/jsoutput");
        if let Some(path) = directory.resolve(&target) {
            prop_assert!(path.starts_with("/srv/out"));
            prop_assert!(path.components().all(|c| c.as_os_str() != ".."));
        }
    }
}

// =============================================================================
// Page assembly
// =============================================================================

proptest! {
    /// Property: `/` lists exactly the registry, once each, in registration order
    #[test]
    fn page_lists_registry_in_order(paths in prop::collection::vec(artifact_path(), 0..12)) {
        let registry: ArtifactRegistry = paths.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let expected: Vec<&String> = paths.iter().filter(|p| seen.insert(p.as_str())).collect();

        let page = registry.bootstrap_page();
        let listed: Vec<&str> = page
            .split("src=\"")
            .skip(1)
            .map(|rest| rest.split('"').next().unwrap())
            .collect();
        prop_assert_eq!(listed.len(), expected.len());
        for (listed, expected) in listed.iter().zip(&expected) {
            prop_assert_eq!(*listed, expected.as_str());
        }
    }
}

// =============================================================================
// Oracle
// =============================================================================

proptest! {
    /// Property: signals other than the sentinel never fire the channel
    #[test]
    fn non_sentinel_signals_never_fire(messages in prop::collection::vec(any::<String>(), 0..16)) {
        let sentinel = "test log alert";
        let channel = Arc::new(SignalChannel::new());
        let watcher = SentinelWatcher::new(sentinel, Arc::clone(&channel));
        for message in messages.iter().filter(|m| m.as_str() != sentinel) {
            watcher.on_signal(message);
        }
        prop_assert!(!channel.is_fired());
    }

    /// Property: the sentinel fires the channel wherever it appears among other signals
    #[test]
    fn sentinel_fires_among_noise(before in prop::collection::vec("[a-z ]{0,12}", 0..6), after in prop::collection::vec("[a-z ]{0,12}", 0..6)) {
        let channel = Arc::new(SignalChannel::new());
        let watcher = SentinelWatcher::new("test log alert", Arc::clone(&channel));
        for message in before.iter().chain(std::iter::once(&"test log alert".to_string())).chain(&after) {
            watcher.on_signal(message);
        }
        prop_assert!(channel.is_fired());
        prop_assert_eq!(watcher.signals().len(), before.len() + after.len() + 1);
    }
}
