//! Embedded HTTP server
//!
//! The server owns a private multi-thread tokio runtime so that the harness itself stays synchronous.
//! Every request is forwarded to a [`RequestHandler`] on the blocking pool, which is where file reads
//! belong.
//!
//! `start`, `stop` and `Drop` block on the private runtime and must not be called from inside another
//! async context.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::errors::HarnessError;
use super::handler::{HttpRequest, RequestHandler};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

type SharedHandler = Arc<dyn RequestHandler>;

/// HTTP/1.1 server on an OS-assigned port.
pub struct EmbeddedServer {
    addr: SocketAddr,
    runtime: Option<Runtime>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<io::Result<()>>>,
}

impl std::fmt::Debug for EmbeddedServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedServer")
            .field("addr", &self.addr)
            .field("running", &self.is_running())
            .finish()
    }
}

impl EmbeddedServer {
    /// Bind `bind:0` and start serving `handler`.
    ///
    /// Returns once the listener is bound, so the address is valid immediately.
    #[instrument(skip(handler))]
    pub fn start(bind: IpAddr, handler: Arc<dyn RequestHandler>) -> Result<Self, HarnessError> {
        let startup_error = |source: io::Error| HarnessError::ServerStartup {
            addr: SocketAddr::new(bind, 0).to_string(),
            source,
        };

        let runtime = Builder::new_multi_thread()
            .thread_name("genverify-http")
            .enable_all()
            .build()
            .map_err(startup_error)?;
        let listener = runtime.block_on(TcpListener::bind((bind, 0))).map_err(startup_error)?;
        let addr = listener.local_addr().map_err(startup_error)?;

        let router = Router::new().fallback(dispatch).with_state(handler);
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = runtime.spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = signal.await;
                })
                .await
        });

        info!("embedded server listening on http://{}", addr);
        Ok(Self {
            addr,
            runtime: Some(runtime),
            shutdown: Some(shutdown),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Stop accepting connections and release the port. Calling it again is a no-op.
    ///
    /// In-flight requests get a short grace period before the runtime is torn down.
    pub fn stop(&mut self) -> io::Result<()> {
        let Some(runtime) = self.runtime.take() else {
            return Ok(());
        };
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let mut result = Ok(());
        if let Some(task) = self.task.take() {
            // The timeout's timer must be created inside the runtime.
            match runtime.block_on(async move { tokio::time::timeout(SHUTDOWN_GRACE, task).await }) {
                Ok(Ok(served)) => result = served,
                Ok(Err(join)) => {
                    result = Err(io::Error::other(format!("server task failed: {join}")));
                }
                Err(_) => warn!("connections still open after {:?}; closing them", SHUTDOWN_GRACE),
            }
        }
        runtime.shutdown_timeout(SHUTDOWN_GRACE);
        info!("embedded server on {} stopped", self.addr);
        result
    }
}

impl Drop for EmbeddedServer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!("embedded server shut down with an error: {}", err);
        }
    }
}

async fn dispatch(State(handler): State<SharedHandler>, uri: Uri) -> Response {
    let request = HttpRequest::new(uri.path());
    match tokio::task::spawn_blocking(move || handler.handle(&request)).await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, [(header::CONTENT_TYPE, response.content_type)], response.body).into_response()
        }
        Err(err) => {
            debug!(error = %err, "request handler did not complete");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::harness::handler::{CONTENT_TYPE_HTML, HttpResponse};

    fn echo_server() -> EmbeddedServer {
        let handler = |request: &HttpRequest| HttpResponse::ok(CONTENT_TYPE_HTML, request.target.clone());
        EmbeddedServer::start(IpAddr::V4(Ipv4Addr::LOCALHOST), Arc::new(handler)).unwrap()
    }

    #[test]
    fn test_binds_ephemeral_port() {
        let server = echo_server();
        assert_ne!(server.addr().port(), 0);
        assert!(server.url("/x").starts_with("http://127.0.0.1:"));
        assert!(server.url("/x").ends_with("/x"));
    }

    #[test]
    fn test_forwards_raw_path() {
        let server = echo_server();
        let body = reqwest::blocking::get(server.url("/a/b/c/Main.js?cache=1")).unwrap().text().unwrap();
        assert_eq!(body, "/a/b/c/Main.js");
    }

    #[test]
    fn test_handler_panic_is_500() {
        let handler = |_: &HttpRequest| -> HttpResponse { panic!("boom") };
        let server = EmbeddedServer::start(IpAddr::V4(Ipv4Addr::LOCALHOST), Arc::new(handler)).unwrap();
        let response = reqwest::blocking::get(server.url("/")).unwrap();
        assert_eq!(response.status().as_u16(), 500);
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_port() {
        let mut server = echo_server();
        let addr = server.addr();
        server.stop().unwrap();
        server.stop().unwrap();
        assert!(!server.is_running());
        assert!(std::net::TcpListener::bind(addr).is_ok());
    }

    #[test]
    fn test_stop_outside_any_runtime_is_ok() {
        let result = std::thread::spawn(|| {
            let mut server = echo_server();
            server.stop()
        })
        .join()
        .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_stop_after_serving_is_ok() {
        let mut server = echo_server();
        let body = reqwest::blocking::get(server.url("/ping")).unwrap().text().unwrap();
        assert_eq!(body, "/ping");
        assert!(server.stop().is_ok());
    }

    #[test]
    fn test_drop_while_unwinding_keeps_the_original_panic() {
        let outcome = std::panic::catch_unwind(|| {
            let _server = echo_server();
            panic!("run failed first");
        });
        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"run failed first"));
    }
}
