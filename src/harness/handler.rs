//! Request routing, independent of the HTTP library that carries it.

use std::fs;
use std::sync::Arc;

use tracing::{debug, info};

use super::generation::GenerationDirectory;
use super::registry::ArtifactRegistry;

pub const CONTENT_TYPE_HTML: &str = "text/html";
pub const CONTENT_TYPE_JAVASCRIPT: &str = "application/javascript";

/// An incoming request, reduced to what routing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Raw request path, for example `/a/b/c/Main.js`.
    pub target: String,
}

impl HttpRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: CONTENT_TYPE_HTML,
            body: String::new(),
        }
    }
}

/// Maps one request to one response.
///
/// Called concurrently from the server's worker threads; implementations must not keep per-request state.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, request: &HttpRequest) -> HttpResponse;
}

impl<F> RequestHandler for F
where
    F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
{
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        self(request)
    }
}

/// Serves the bootstrap page at `/` and generated artifacts everywhere else.
#[derive(Debug, Clone)]
pub struct ArtifactHandler {
    registry: Arc<ArtifactRegistry>,
    directory: Arc<GenerationDirectory>,
}

impl ArtifactHandler {
    pub fn new(registry: Arc<ArtifactRegistry>, directory: Arc<GenerationDirectory>) -> Self {
        Self { registry, directory }
    }
}

impl RequestHandler for ArtifactHandler {
    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        info!("handle({}, ...)", request.target);

        if request.target == "/" {
            return HttpResponse::ok(CONTENT_TYPE_HTML, self.registry.bootstrap_page());
        }

        let Some(path) = self.directory.resolve(&request.target) else {
            debug!(target = %request.target, "rejected target outside the generation directory");
            return HttpResponse::not_found();
        };
        info!("serving file: {}", path.display());
        match fs::read_to_string(&path) {
            Ok(body) => HttpResponse::ok(CONTENT_TYPE_JAVASCRIPT, body),
            Err(err) => {
                debug!(error = %err, "artifact unavailable");
                HttpResponse::not_found()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn handler_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, ArtifactHandler) {
        let dir = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, contents).unwrap();
        }
        let registry: ArtifactRegistry = files.iter().map(|(path, _)| *path).collect();
        let directory = GenerationDirectory::new(dir.path(), "/jsoutput");
        let handler = ArtifactHandler::new(Arc::new(registry), Arc::new(directory));
        (dir, handler)
    }

    #[test]
    fn test_root_serves_bootstrap_page() {
        let (_dir, handler) = handler_with(&[("stjs.js", b"var stjs = {};"), ("a/Main.js", b"main();")]);
        let response = handler.handle(&HttpRequest::new("/"));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "text/html");
        assert!(response.body.contains(r#"<script type="text/javascript" src="stjs.js"></script>"#));
    }

    #[test]
    fn test_artifact_served_verbatim() {
        let (_dir, handler) = handler_with(&[("a/b/c/DTO.js", "// ünïcode\nvar x = 1;\n".as_bytes())]);
        let response = handler.handle(&HttpRequest::new("/a/b/c/DTO.js"));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/javascript");
        assert_eq!(response.body, "// ünïcode\nvar x = 1;\n");
    }

    #[test]
    fn test_prefixed_target_served() {
        let (_dir, handler) = handler_with(&[("a/Main.js", b"main();")]);
        let response = handler.handle(&HttpRequest::new("/jsoutput/a/Main.js"));
        assert_eq!(response.body, "main();");
    }

    #[test]
    fn test_file_under_a_prefix_named_directory_served() {
        let (_dir, handler) = handler_with(&[("jsoutput/Lib.js", b"lib();")]);
        let response = handler.handle(&HttpRequest::new("/jsoutput/Lib.js"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "lib();");
    }

    #[test]
    fn test_percent_encoded_targets_served() {
        let (_dir, handler) = handler_with(&[("a/Ünï.js", b"u();"), ("a/My Class.js", b"m();")]);
        assert_eq!(handler.handle(&HttpRequest::new("/a/%C3%9Cn%C3%AF.js")).body, "u();");
        assert_eq!(handler.handle(&HttpRequest::new("/a/My%20Class.js")).body, "m();");
    }

    #[test]
    fn test_missing_file_is_empty_404() {
        let (_dir, handler) = handler_with(&[]);
        let response = handler.handle(&HttpRequest::new("/missing.js"));
        assert_eq!(response, HttpResponse::not_found());
        assert_eq!(response.content_type, "text/html");
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_404() {
        let (_dir, handler) = handler_with(&[("bad.js", &[0xff, 0xfe, 0x00])]);
        assert_eq!(handler.handle(&HttpRequest::new("/bad.js")).status, 404);
    }

    #[test]
    fn test_traversal_is_404() {
        let (_dir, handler) = handler_with(&[("a/Main.js", b"main();")]);
        assert_eq!(handler.handle(&HttpRequest::new("/../etc/passwd")).status, 404);
        assert_eq!(handler.handle(&HttpRequest::new("/a/../../secret")).status, 404);
    }

    #[test]
    fn test_directory_target_is_404() {
        let (_dir, handler) = handler_with(&[("a/Main.js", b"main();")]);
        assert_eq!(handler.handle(&HttpRequest::new("/a")).status, 404);
    }

    #[test]
    fn test_closures_are_handlers() {
        let handler = |request: &HttpRequest| HttpResponse::ok(CONTENT_TYPE_HTML, request.target.clone());
        assert_eq!(handler.handle(&HttpRequest::new("/echo")).body, "/echo");
    }
}
