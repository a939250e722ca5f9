//! Ordered route registry and request dispatch.
//!
//! # Precedence
//!
//! Routes are tried strictly in registration order, and the first route
//! whose method and path match *decides the outcome*. If that route then
//! fails to bind its parameters, the request is answered with `400` at once;
//! later routes are never consulted, even if one of them would have bound
//! successfully. Register routes from most specific to most general:
//!
//! ```text
//! GET /items/new     ← literal first
//! GET /items/{id}    ← id: int; /items/new never reaches this route
//! ```
//!
//! | Route outcome | Router action |
//! |---|---|
//! | wrong method / wrong path | try the next route |
//! | missing parameter | `400 {"error":"Missing parameter"}` |
//! | wrong type or malformed JSON | `400 {"error":"Wrong parameter type or value"}` |
//! | handler response | returned as-is |
//! | no route matched | `404 {"error":"Not found"}` |
//!
//! A panicking handler is not caught here; the server's fault boundary
//! answers it.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, warn};

use crate::coerce::{CompositeType, TypeRegistry};
use crate::error::{RegistrationError, RouteError};
use crate::handler::Handler;
use crate::method::Method;
use crate::request::RequestContext;
use crate::response::Response;
use crate::route::{Route, RouteBuilder};

pub(crate) const MISSING_PARAMETER: &str = "Missing parameter";
pub(crate) const WRONG_PARAMETER: &str = "Wrong parameter type or value";
pub(crate) const NOT_FOUND: &str = "Not found";

/// The application router.
///
/// Build it once at startup and share it read-only; [`resolve`](Self::resolve)
/// takes `&self` and keeps nothing between calls, so any number of requests
/// may resolve concurrently.
///
/// ```rust,no_run
/// use routebind::{Bundle, Json, Method, Route, Router, Server, TypeDescriptor};
///
/// # async fn run() -> Result<(), routebind::Error> {
/// let app = Router::builder()
///     .route(Route::builder(Method::Get, "/items/{id}", show).path("id", TypeDescriptor::Int))
///     .build();
///
/// Server::bind("0.0.0.0:3000").serve(app).await
/// # }
/// async fn show(params: Bundle) -> Json<Bundle> { Json(params) }
/// ```
#[derive(Debug)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Dispatches one request.
    pub async fn resolve(&self, ctx: &RequestContext) -> Response {
        for route in &self.routes {
            match route.invoke(ctx).await {
                Ok(res) => {
                    debug!(route = %route, status = %res.status_code(), "request handled");
                    return res;
                }
                Err(RouteError::WrongMethod | RouteError::WrongPath) => continue,
                Err(err @ RouteError::MissingParam { .. }) => {
                    warn!(route = %route, "rejecting request: {err}");
                    return Response::error(StatusCode::BAD_REQUEST, MISSING_PARAMETER);
                }
                Err(err @ RouteError::WrongParamType { .. }) => {
                    warn!(route = %route, "rejecting request: {err}");
                    return Response::error(StatusCode::BAD_REQUEST, WRONG_PARAMETER);
                }
            }
        }

        debug!(method = %ctx.method(), path = %ctx.path(), "no route matched");
        Response::error(StatusCode::NOT_FOUND, NOT_FOUND)
    }

    /// Registered routes, in precedence order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Collects route declarations and composite types. Obtain via
/// [`Router::builder`].
#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<RouteBuilder>,
    types: TypeRegistry,
}

impl RouterBuilder {
    /// Appends a route. Registration order is precedence order.
    pub fn route(mut self, route: RouteBuilder) -> Self {
        self.routes.push(route);
        self
    }

    /// Appends several routes, keeping their order.
    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteBuilder>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Shorthand for a route that declares no parameters.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Route::builder(method, path, handler))
    }

    /// Registers a composite type for [`TypeDescriptor::Named`](crate::TypeDescriptor::Named)
    /// references in any route of this router.
    pub fn composite(mut self, ty: CompositeType) -> Self {
        self.types.register(ty);
        self
    }

    /// Compiles every route, failing on the first invalid one.
    pub fn try_build(self) -> Result<Router, RegistrationError> {
        let types = Arc::new(self.types);
        let routes = self.routes
            .into_iter()
            .map(|route| {
                let route = if route.has_types() { route } else { route.types(Arc::clone(&types)) };
                route.build()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Router { routes })
    }

    /// Compiles every route.
    ///
    /// # Panics
    ///
    /// Panics if a route template or constraint is invalid. Routes are
    /// declared in code at startup, so this is a programming error.
    pub fn build(self) -> Router {
        self.try_build().unwrap_or_else(|e| panic!("invalid route: {e}"))
    }
}
