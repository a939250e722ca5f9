//! HTTP server, request adapter and fault boundary.
//!
//! # Request adapter
//!
//! Each hyper request is flattened into a [`RequestContext`] before routing:
//!
//! | Input | Source |
//! |---|---|
//! | method | request line, verbatim |
//! | path | URI path, still percent-encoded; placeholder values are decoded after matching |
//! | query | URI query, form-urlencoded, last value wins |
//! | headers | lowercase names, non-UTF-8 values skipped |
//! | cookies | every `cookie` header, split on `;` then the first `=` |
//! | body | JSON object entries for `application/json`, form fields for `application/x-www-form-urlencoded`, otherwise empty |
//!
//! A query string, form body or JSON body that cannot be decoded is answered
//! with `400 {"error":"Wrong parameter type or value"}` without routing.
//!
//! # Fault boundary
//!
//! Every resolution runs on its own task. A handler that panics is logged
//! and answered with `500`; in [`Environment::Development`] the body carries
//! the panic message, otherwise a generic one.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting, lets every in-flight
//! connection finish, then returns from [`Server::serve`].

use std::any::Any;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, COOKIE};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::{Environment, ServerConfig};
use crate::error::Error;
use crate::request::RequestContext;
use crate::response::{GENERIC_FAULT, Response};
use crate::router::{Router, WRONG_PARAMETER};

/// The HTTP server.
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called, with all other settings at their defaults.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { config: ServerConfig { addr, ..ServerConfig::default() } }
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Accepts connections and dispatches them through `router` until a
    /// shutdown signal arrives and every in-flight connection has finished.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let ServerConfig { addr, environment } = self.config;
        let listener = TcpListener::bind(addr).await?;
        let router = Arc::new(router);

        info!(%addr, %environment, routes = router.routes().len(), "routebind listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a SIGTERM stops accepting even when more
                // connections are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, environment).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("routebind stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request. Every failure is turned into a response, so hyper
/// never sees an error.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<hyper::body::Incoming>,
    environment: Environment,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("failed to read request body: {e}");
            return Ok(bad_request().into_inner());
        }
    };

    let response = match request_context(&parts, &body) {
        Ok(ctx) => resolve_guarded(router, ctx, environment).await,
        Err(res) => res,
    };

    Ok(response.into_inner())
}

/// Runs the resolution on its own task so a panicking handler becomes a `500`
/// instead of a dropped connection.
async fn resolve_guarded(router: Arc<Router>, ctx: RequestContext, environment: Environment) -> Response {
    let method = ctx.method().to_owned();
    let path = ctx.path().to_owned();

    let task = tokio::spawn(async move { router.resolve(&ctx).await });
    match task.await {
        Ok(res) => {
            debug!(%method, %path, status = %res.status_code(), "request resolved");
            res
        }
        Err(e) if e.is_panic() => {
            let message = panic_message(e.into_panic().as_ref());
            error!(%method, %path, "handler panicked: {message}");
            fault_response(environment, &message)
        }
        Err(e) => {
            error!(%method, %path, "request task failed: {e}");
            fault_response(environment, &e.to_string())
        }
    }
}

fn fault_response(environment: Environment, detail: &str) -> Response {
    let message = match environment {
        Environment::Development => detail,
        Environment::Production => GENERIC_FAULT,
    };
    Response::error(StatusCode::INTERNAL_SERVER_ERROR, message)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

// ── Request adapter ───────────────────────────────────────────────────────────

/// Flattens request parts and the collected body into a [`RequestContext`].
pub(crate) fn request_context(parts: &http::request::Parts, body: &[u8]) -> Result<RequestContext, Response> {
    let query = match parts.uri.query() {
        Some(q) => decode_form(q.as_bytes()).ok_or_else(bad_request)?,
        None => HashMap::new(),
    };

    let headers: HashMap<String, String> = parts.headers.iter()
        .filter_map(|(name, value)| Some((name.as_str().to_owned(), value.to_str().ok()?.to_owned())))
        .collect();

    let cookies = parts.headers.get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(parse_cookies)
        .collect();

    let content_type = parts.headers.get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let body = if content_type.contains("application/json") {
        decode_json_object(body).ok_or_else(bad_request)?
    } else if content_type.contains("application/x-www-form-urlencoded") {
        decode_form(body)
            .ok_or_else(bad_request)?
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect()
    } else {
        serde_json::Map::new()
    };

    Ok(RequestContext {
        method: parts.method.as_str().to_owned(),
        path: parts.uri.path().to_owned(),
        query,
        headers,
        cookies,
        body,
    })
}

/// Answer for a request whose query or body cannot be read or decoded.
fn bad_request() -> Response {
    Response::error(StatusCode::BAD_REQUEST, WRONG_PARAMETER)
}

fn decode_form(input: &[u8]) -> Option<HashMap<String, String>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(input).ok()?;
    Some(pairs.into_iter().collect())
}

fn decode_json_object(input: &[u8]) -> Option<serde_json::Map<String, serde_json::Value>> {
    if input.iter().all(u8::is_ascii_whitespace) {
        return Some(serde_json::Map::new());
    }
    match serde_json::from_slice::<serde_json::Value>(input).ok()? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

fn parse_cookies(header: &str) -> impl Iterator<Item = (String, String)> + '_ {
    header.split(';').filter_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = name.trim();
        (!name.is_empty()).then(|| (name.to_owned(), value.trim().to_owned()))
    })
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C only, off Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use crate::method::Method;

    fn parts(req: http::request::Builder) -> http::request::Parts {
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn adapts_query_headers_and_cookies() {
        let parts = parts(
            http::Request::builder()
                .method("GET")
                .uri("/items/7/?page=2&tag=a%20b&page=3")
                .header("X-Tenant", "acme")
                .header("cookie", "session=abc; theme = dark")
                .header("cookie", "flag"),
        );
        let ctx = request_context(&parts, b"").unwrap();

        assert_eq!(ctx.method(), "GET");
        assert_eq!(ctx.path(), "/items/7/");
        assert_eq!(ctx.query_params()["page"], "3");
        assert_eq!(ctx.query_params()["tag"], "a b");
        assert_eq!(ctx.headers()["x-tenant"], "acme");
        assert_eq!(ctx.cookies()["session"], "abc");
        assert_eq!(ctx.cookies()["theme"], "dark");
        assert_eq!(ctx.cookies()["flag"], "");
        assert!(ctx.body().is_empty());
    }

    #[test]
    fn adapts_json_body() {
        let parts = parts(
            http::Request::builder()
                .method("POST")
                .uri("/points")
                .header("content-type", "application/json; charset=utf-8"),
        );
        let ctx = request_context(&parts, br#"{"x":"1","y":2,"tags":["a"]}"#).unwrap();
        assert_eq!(ctx.body()["x"], serde_json::json!("1"));
        assert_eq!(ctx.body()["y"], serde_json::json!(2));
        assert_eq!(ctx.body()["tags"], serde_json::json!(["a"]));

        assert!(request_context(&parts, b"").unwrap().body().is_empty());
    }

    #[test]
    fn rejects_malformed_json_body() {
        let parts = parts(
            http::Request::builder()
                .method("POST")
                .uri("/points")
                .header("content-type", "application/json"),
        );
        for body in [&b"{"[..], b"[1,2]", b"\"x\""] {
            let res = request_context(&parts, body).unwrap_err();
            assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(res.json_body(), Some(serde_json::json!({ "error": WRONG_PARAMETER })));
        }
    }

    #[test]
    fn undecodable_input_gets_json_error() {
        let res = bad_request();
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(res.json_body(), Some(serde_json::json!({ "error": WRONG_PARAMETER })));

        let parts = parts(
            http::Request::builder()
                .method("POST")
                .uri("/items")
                .header("content-type", "application/json"),
        );
        assert_eq!(request_context(&parts, b"not json").unwrap_err(), res);
    }

    #[tokio::test]
    async fn path_parameters_arrive_decoded() {
        use crate::coerce::TypeDescriptor;
        use crate::response::Json;
        use crate::route::Route;

        async fn echo(params: Bundle) -> Json<Bundle> {
            Json(params)
        }

        let router = Router::builder()
            .route(Route::builder(Method::Get, "/names/{n}", echo).path("n", TypeDescriptor::String))
            .build();
        let parts = parts(http::Request::builder().method("GET").uri("/names/caf%C3%A9%20x"));
        let ctx = request_context(&parts, b"").unwrap();

        let res = router.resolve(&ctx).await;
        assert_eq!(res.json_body().unwrap()["path"], serde_json::json!({ "n": "café x" }));
    }

    #[test]
    fn adapts_form_body() {
        let parts = parts(
            http::Request::builder()
                .method("POST")
                .uri("/items")
                .header("content-type", "application/x-www-form-urlencoded"),
        );
        let ctx = request_context(&parts, b"name=widget&price=9.5").unwrap();
        assert_eq!(ctx.body()["name"], serde_json::json!("widget"));
        assert_eq!(ctx.body()["price"], serde_json::json!("9.5"));
    }

    #[test]
    fn other_content_types_have_empty_body() {
        let parts = parts(
            http::Request::builder()
                .method("POST")
                .uri("/items")
                .header("content-type", "text/plain"),
        );
        assert!(request_context(&parts, b"name=widget").unwrap().body().is_empty());
    }

    #[tokio::test]
    async fn panicking_handler_becomes_500() {
        async fn boom(_: Bundle) -> &'static str {
            panic!("kaboom")
        }

        let router = Arc::new(Router::builder().on(Method::Get, "/", boom).build());

        let res = resolve_guarded(Arc::clone(&router), RequestContext::new("GET", "/"), Environment::Production).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.json_body(), Some(serde_json::json!({ "error": GENERIC_FAULT })));

        let res = resolve_guarded(router, RequestContext::new("GET", "/"), Environment::Development).await;
        assert_eq!(res.json_body(), Some(serde_json::json!({ "error": "kaboom" })));
    }
}
