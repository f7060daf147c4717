//! Embedded server tests over real loopback HTTP

use std::fs;
use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use genverify::harness::{ArtifactHandler, HarnessError};
use genverify::{ArtifactRegistry, EmbeddedServer, GenerationDirectory};
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

const REGISTRY: [&str; 4] = ["stjs.js", "a/b/c/Global2.js", "a/b/c/DTO.js", "a/b/c/Main.js"];

/// Serve `files` from a fresh directory with the standard four-entry registry.
fn serve(files: &[(&str, &str)]) -> (tempfile::TempDir, EmbeddedServer) {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, contents).unwrap();
    }
    let server = start(dir.path());
    (dir, server)
}

fn start(root: &Path) -> EmbeddedServer {
    let registry: ArtifactRegistry = REGISTRY.into_iter().collect();
    let directory = GenerationDirectory::new(root, "/jsoutput");
    let handler = ArtifactHandler::new(Arc::new(registry), Arc::new(directory));
    EmbeddedServer::start(LOCALHOST, Arc::new(handler)).unwrap()
}

fn get(server: &EmbeddedServer, path: &str) -> Response {
    reqwest::blocking::get(server.url(path)).unwrap()
}

fn content_type(response: &Response) -> String {
    response.headers()[CONTENT_TYPE].to_str().unwrap().to_string()
}

#[test]
fn bootstrap_page_lists_registry_in_order() {
    let (_dir, server) = serve(&[]);
    let response = get(&server, "/");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(content_type(&response), "text/html");

    let body = response.text().unwrap();
    assert!(body.starts_with("<!DOCTYPE html><html><head>"));
    assert!(body.ends_with("</head><body></body></html>"));
    let positions: Vec<usize> = REGISTRY
        .iter()
        .map(|path| {
            body.find(&format!(r#"<script type="text/javascript" src="{}"></script>"#, path))
                .unwrap()
        })
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "out of order: {positions:?}");
}

#[test]
fn bootstrap_page_is_identical_across_requests() {
    let (_dir, server) = serve(&[]);
    let first = get(&server, "/").text().unwrap();
    let second = get(&server, "/").text().unwrap();
    assert_eq!(first, second);
}

#[test]
fn artifact_is_served_as_javascript() {
    let (_dir, server) = serve(&[("a/b/c/DTO.js", "var x=1;")]);
    let response = get(&server, "/a/b/c/DTO.js");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(content_type(&response), "application/javascript");
    assert_eq!(response.text().unwrap(), "var x=1;");
}

#[test]
fn artifact_is_served_under_url_prefix() {
    let (_dir, server) = serve(&[("a/b/c/DTO.js", "var x=1;")]);
    let response = get(&server, "/jsoutput/a/b/c/DTO.js");
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().unwrap(), "var x=1;");
}

#[test]
fn missing_artifact_is_404_html() {
    let (_dir, server) = serve(&[("a/b/c/DTO.js", "var x=1;")]);
    let response = get(&server, "/missing/file.js");
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(content_type(&response), "text/html");
    assert_eq!(response.text().unwrap(), "");
}

#[test]
fn artifact_written_after_start_is_served() {
    let (dir, server) = serve(&[]);
    assert_eq!(get(&server, "/late.js").status().as_u16(), 404);
    fs::write(dir.path().join("late.js"), "late();").unwrap();
    assert_eq!(get(&server, "/late.js").text().unwrap(), "late();");
}

#[test]
fn concurrent_requests_are_served() {
    let (_dir, server) = serve(&[("stjs.js", "var stjs = {};"), ("a/b/c/Main.js", "main();")]);
    let base = server.url("");
    let workers: Vec<_> = (0..8)
        .map(|i| {
            let base = base.clone();
            thread::spawn(move || {
                let client = reqwest::blocking::Client::new();
                for _ in 0..10 {
                    let path = if i % 2 == 0 { "/stjs.js" } else { "/a/b/c/Main.js" };
                    let body = client.get(format!("{base}{path}")).send().unwrap().text().unwrap();
                    assert!(!body.is_empty());
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn non_ascii_and_spaced_names_are_reachable() {
    let (_dir, server) = serve(&[("a/Ünï.js", "var u = 1;"), ("a/My Class.js", "var m = 1;")]);
    // reqwest percent-encodes the path the way a browser would.
    assert_eq!(get(&server, "/a/Ünï.js").text().unwrap(), "var u = 1;");
    assert_eq!(get(&server, "/a/My Class.js").text().unwrap(), "var m = 1;");
    assert_eq!(get(&server, "/a/%C3%9Cn%C3%AF.js").status().as_u16(), 200);
}

#[test]
fn encoded_traversal_is_404() {
    let (_dir, server) = serve(&[("a/b/c/Main.js", "main();")]);
    assert_eq!(get(&server, "/a/%2E%2E/%2E%2E/%2E%2E/etc/passwd").status().as_u16(), 404);
}

#[test]
fn stop_from_a_plain_thread_returns_ok() {
    let (_dir, mut server) = serve(&[]);
    assert!(server.stop().is_ok());
    assert!(!server.is_running());
}

#[test]
fn stop_releases_the_port() {
    let (_dir, mut server) = serve(&[]);
    let addr = server.addr();
    server.stop().unwrap();
    server.stop().unwrap();
    assert!(reqwest::blocking::get(format!("http://{addr}/")).is_err());
    TcpListener::bind(addr).unwrap();
}

#[test]
fn dropping_the_server_releases_the_port() {
    let (_dir, server) = serve(&[]);
    let addr = server.addr();
    drop(server);
    TcpListener::bind(addr).unwrap();
}

#[test]
fn unusable_bind_address_is_startup_error() {
    // TEST-NET-3 is never assigned to a local interface.
    let bind: IpAddr = "203.0.113.1".parse().unwrap();
    let registry = ArtifactRegistry::new();
    let handler = ArtifactHandler::new(
        Arc::new(registry),
        Arc::new(GenerationDirectory::new("/nonexistent", "/jsoutput")),
    );
    let err = EmbeddedServer::start(bind, Arc::new(handler)).unwrap_err();
    assert!(matches!(err, HarnessError::ServerStartup { .. }));
}
