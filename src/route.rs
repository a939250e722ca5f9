//! A single registered route and its binding pipeline.
//!
//! Invoking a route runs, in order:
//!
//! 1. method check: exact match, else [`RouteError::WrongMethod`]
//! 2. path check against the compiled template, else [`RouteError::WrongPath`]
//! 3. binding: every declared parameter of every source must be present
//!    ([`RouteError::MissingParam`]) and coerce to its declared type
//!    ([`RouteError::WrongParamType`])
//! 4. middleware, left to right
//! 5. the handler
//!
//! Steps 1 and 2 tell the router to try the next route. Step 3 failures are
//! client errors. A route keeps no per-request state, so one route may serve
//! any number of requests concurrently.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::bundle::{Bundle, ParamSource};
use crate::coerce::{TypeDescriptor, TypeRegistry, coerce, raw_text};
use crate::error::{RegistrationError, RouteError};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::path::PathPattern;
use crate::request::RequestContext;
use crate::response::Response;

/// Declared parameters of one route, per source, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamTemplates {
    path: Vec<(String, TypeDescriptor)>,
    query: Vec<(String, TypeDescriptor)>,
    header: Vec<(String, TypeDescriptor)>,
    cookie: Vec<(String, TypeDescriptor)>,
    body: Vec<(String, TypeDescriptor)>,
}

impl ParamTemplates {
    /// Declares `name` in `source`. Redeclaring a name replaces its type.
    pub fn declare(&mut self, source: ParamSource, name: impl Into<String>, ty: TypeDescriptor) {
        let name = name.into();
        let list = self.list_mut(source);
        match list.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = ty,
            None => list.push((name, ty)),
        }
    }

    pub fn get(&self, source: ParamSource) -> &[(String, TypeDescriptor)] {
        match source {
            ParamSource::Path   => &self.path,
            ParamSource::Query  => &self.query,
            ParamSource::Header => &self.header,
            ParamSource::Cookie => &self.cookie,
            ParamSource::Body   => &self.body,
        }
    }

    fn list_mut(&mut self, source: ParamSource) -> &mut Vec<(String, TypeDescriptor)> {
        match source {
            ParamSource::Path   => &mut self.path,
            ParamSource::Query  => &mut self.query,
            ParamSource::Header => &mut self.header,
            ParamSource::Cookie => &mut self.cookie,
            ParamSource::Body   => &mut self.body,
        }
    }
}

/// An immutable route: method, compiled path, parameter templates,
/// middleware chain and handler.
pub struct Route {
    method: Method,
    pattern: PathPattern,
    params: ParamTemplates,
    middlewares: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
    types: Arc<TypeRegistry>,
}

impl Route {
    /// Starts a route declaration.
    ///
    /// ```rust
    /// use routebind::{Bundle, Json, Method, Route, TypeDescriptor};
    ///
    /// async fn show(params: Bundle) -> Json<Bundle> { Json(params) }
    ///
    /// let route = Route::builder(Method::Get, "/items/{id}", show)
    ///     .path("id", TypeDescriptor::Int)
    ///     .query("verbose", TypeDescriptor::Bool)
    ///     .constraint("id", r"\d+")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(route.template(), "/items/{id}");
    /// ```
    pub fn builder(method: Method, template: &str, handler: impl Handler) -> RouteBuilder {
        RouteBuilder {
            method,
            template: template.to_owned(),
            constraints: HashMap::new(),
            params: ParamTemplates::default(),
            middlewares: Vec::new(),
            handler: Arc::new(handler),
            types: None,
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn template(&self) -> &str { self.pattern.template() }
    pub fn params(&self) -> &ParamTemplates { &self.params }

    /// Runs the full pipeline for one request.
    ///
    /// The handler's response is returned as-is; the route does not inspect
    /// it.
    pub async fn invoke(&self, ctx: &RequestContext) -> Result<Response, RouteError> {
        let bundle = self.bind(ctx)?;
        let bundle = self.middlewares.iter().fold(bundle, |params, m| m.apply(params));
        Ok(self.handler.call(bundle).await)
    }

    /// Structural match and parameter binding, without running middleware or
    /// the handler.
    pub fn bind(&self, ctx: &RequestContext) -> Result<Bundle, RouteError> {
        if !self.method.matches(&ctx.method) {
            return Err(RouteError::WrongMethod);
        }
        let path_params = self.pattern.matches(&ctx.path).ok_or(RouteError::WrongPath)?;

        let mut bundle = Bundle::default();
        for source in ParamSource::ALL {
            for (name, ty) in self.params.get(source) {
                let Some(raw) = extract(source, name, &path_params, ctx) else {
                    debug!(route = %self, %source, %name, "missing parameter");
                    return Err(RouteError::MissingParam { location: source, name: name.clone() });
                };
                let value = coerce(&raw, ty, &self.types).map_err(|cause| {
                    debug!(route = %self, %source, %name, %cause, "parameter rejected");
                    RouteError::WrongParamType { location: source, name: name.clone(), cause }
                })?;
                bundle[source].insert(name.clone(), value);
            }
        }
        Ok(bundle)
    }
}

/// Raw text of one declared parameter, if the request carries it.
fn extract<'a>(
    source: ParamSource,
    name: &str,
    path_params: &'a HashMap<String, String>,
    ctx: &'a RequestContext,
) -> Option<Cow<'a, str>> {
    let found = match source {
        ParamSource::Path   => path_params.get(name),
        ParamSource::Query  => ctx.query.get(name),
        ParamSource::Header => ctx.headers.get(name).or_else(|| {
            ctx.headers.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        }),
        ParamSource::Cookie => ctx.cookies.get(name),
        ParamSource::Body   => return ctx.body.get(name).map(raw_text),
    };
    found.map(|v| Cow::Borrowed(v.as_str()))
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pattern.template() {
            "" => write!(f, "{} /", self.method),
            template => write!(f, "{} {template}", self.method),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("template", &self.pattern.template())
            .field("params", &self.params)
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// Declaration of a [`Route`]. Obtain via [`Route::builder`].
pub struct RouteBuilder {
    method: Method,
    template: String,
    constraints: HashMap<String, String>,
    params: ParamTemplates,
    middlewares: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
    types: Option<Arc<TypeRegistry>>,
}

impl RouteBuilder {
    /// Declares a parameter of any source.
    pub fn param(mut self, source: ParamSource, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.params.declare(source, name, ty);
        self
    }

    pub fn path(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param(ParamSource::Path, name, ty)
    }

    pub fn query(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param(ParamSource::Query, name, ty)
    }

    pub fn header(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param(ParamSource::Header, name, ty)
    }

    pub fn cookie(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param(ParamSource::Cookie, name, ty)
    }

    pub fn body(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.param(ParamSource::Body, name, ty)
    }

    /// Restricts what the placeholder `name` matches. `pattern` is a regular
    /// expression that replaces the default "one or more non-`/`".
    pub fn constraint(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.constraints.insert(name.into(), pattern.into());
        self
    }

    /// Appends a middleware. Middleware run in the order they are added.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Composite types this route resolves [`TypeDescriptor::Named`] against.
    /// Routes registered through a router default to the router's registry.
    pub fn types(mut self, types: Arc<TypeRegistry>) -> Self {
        self.types = Some(types);
        self
    }

    pub(crate) fn has_types(&self) -> bool {
        self.types.is_some()
    }

    pub fn build(self) -> Result<Route, RegistrationError> {
        let pattern = PathPattern::compile(&self.template, &self.constraints)?;
        Ok(Route {
            method: self.method,
            pattern,
            params: self.params,
            middlewares: self.middlewares,
            handler: self.handler,
            types: self.types.unwrap_or_default(),
        })
    }
}

impl fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteBuilder")
            .field("method", &self.method)
            .field("template", &self.template)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::{CompositeType, Value};
    use crate::error::CoercionError;
    use crate::response::Json;

    async fn echo(params: Bundle) -> Json<Bundle> {
        Json(params)
    }

    fn item_route() -> Route {
        Route::builder(Method::Get, "/items/{id}", echo)
            .path("id", TypeDescriptor::Int)
            .build()
            .unwrap()
    }

    #[test]
    fn wrong_method_before_path() {
        let route = item_route();
        let ctx = RequestContext::new("POST", "/nowhere");
        assert_eq!(route.bind(&ctx), Err(RouteError::WrongMethod));
    }

    #[test]
    fn method_is_case_sensitive() {
        let route = item_route();
        assert_eq!(route.bind(&RequestContext::new("get", "/items/1")), Err(RouteError::WrongMethod));
    }

    #[test]
    fn wrong_path() {
        let route = item_route();
        assert_eq!(route.bind(&RequestContext::new("GET", "/things/1")), Err(RouteError::WrongPath));
    }

    #[test]
    fn binds_path_param() {
        let bundle = item_route().bind(&RequestContext::new("GET", "/items/42/")).unwrap();
        assert_eq!(bundle.path["id"], Value::Int(42));
        assert!(bundle.query.is_empty());
    }

    #[test]
    fn path_param_wrong_type() {
        assert_eq!(
            item_route().bind(&RequestContext::new("GET", "/items/abc")),
            Err(RouteError::WrongParamType {
                location: ParamSource::Path,
                name: "id".into(),
                cause: CoercionError::WrongType,
            })
        );
    }

    #[test]
    fn binds_every_source() {
        let route = Route::builder(Method::Post, "/orgs/{org}", echo)
            .path("org", TypeDescriptor::String)
            .query("page", TypeDescriptor::Int)
            .header("X-Tenant", TypeDescriptor::String)
            .cookie("beta", TypeDescriptor::Bool)
            .body("price", TypeDescriptor::Float)
            .body("tags", TypeDescriptor::Array)
            .build()
            .unwrap();

        let ctx = RequestContext::new("POST", "/orgs/acme")
            .query("page", "3")
            .query("ignored", "x")
            .header("x-tenant", "blue")
            .cookie("beta", "1")
            .body_field("price", 9.5)
            .body_field("tags", serde_json::json!(["a", "b"]));

        let bundle = route.bind(&ctx).unwrap();
        assert_eq!(bundle.path["org"], Value::from("acme"));
        assert_eq!(bundle.query.len(), 1);
        assert_eq!(bundle.query["page"], Value::Int(3));
        assert_eq!(bundle.header["X-Tenant"], Value::from("blue"));
        assert_eq!(bundle.cookie["beta"], Value::Bool(true));
        assert_eq!(bundle.body["price"], Value::Float(9.5));
        assert_eq!(bundle.body["tags"], Value::Array(serde_json::json!(["a", "b"])));
    }

    #[test]
    fn missing_param_in_any_source() {
        let route = Route::builder(Method::Get, "/", echo)
            .cookie("session", TypeDescriptor::String)
            .build()
            .unwrap();
        assert_eq!(
            route.bind(&RequestContext::new("GET", "/")),
            Err(RouteError::MissingParam { location: ParamSource::Cookie, name: "session".into() })
        );
    }

    #[test]
    fn composite_body_param() {
        let point = CompositeType::new("Point")
            .field("x", TypeDescriptor::Int)
            .field("y", TypeDescriptor::Int);
        let route = Route::builder(Method::Post, "/points", echo)
            .body("at", point.into())
            .build()
            .unwrap();

        let ctx = RequestContext::new("POST", "/points").body_field("at", serde_json::json!({ "x": "1", "y": 2 }));
        let bundle = route.bind(&ctx).unwrap();
        let at = bundle.body["at"].as_object().unwrap();
        assert_eq!(at.get("x"), Some(&Value::Int(1)));
        assert_eq!(at.get("y"), Some(&Value::Int(2)));

        let ctx = RequestContext::new("POST", "/points").body_field("at", serde_json::json!({ "x": "1" }));
        assert_eq!(
            route.bind(&ctx),
            Err(RouteError::WrongParamType {
                location: ParamSource::Body,
                name: "at".into(),
                cause: CoercionError::MissingField("y".into()),
            })
        );
    }

    #[test]
    fn named_types_resolve_through_registry() {
        let mut types = TypeRegistry::new();
        types.register(CompositeType::new("Tag").field("name", TypeDescriptor::String));
        let route = Route::builder(Method::Post, "/tags", echo)
            .body("tag", "Tag".parse().unwrap())
            .types(Arc::new(types))
            .build()
            .unwrap();

        let ctx = RequestContext::new("POST", "/tags").body_field("tag", r#"{"name":"rust"}"#);
        assert!(route.bind(&ctx).is_ok());
    }

    #[test]
    fn redeclaring_replaces_type() {
        let route = Route::builder(Method::Get, "/", echo)
            .query("n", TypeDescriptor::Int)
            .query("n", TypeDescriptor::String)
            .build()
            .unwrap();
        assert_eq!(route.params().get(ParamSource::Query), [("n".to_owned(), TypeDescriptor::String)]);
    }

    #[test]
    fn display_shows_method_and_template() {
        assert_eq!(item_route().to_string(), "GET /items/{id}");
        let root = Route::builder(Method::Get, "/", echo).build().unwrap();
        assert_eq!(root.to_string(), "GET /");
    }

    #[test]
    fn invalid_template_fails_to_build() {
        let err = Route::builder(Method::Get, "/{id}/{id}", echo).build().unwrap_err();
        assert_eq!(err, RegistrationError::DuplicatePlaceholder("id".into()));
    }

    #[tokio::test]
    async fn middleware_runs_in_order_before_handler() {
        let route = Route::builder(Method::Get, "/items/{id}", echo)
            .path("id", TypeDescriptor::Int)
            .middleware(|mut params: Bundle| {
                params.insert(ParamSource::Body, "trail", "a");
                params
            })
            .middleware(|mut params: Bundle| {
                let trail = params.body["trail"].to_string();
                params.insert(ParamSource::Body, "trail", format!("{trail}b"));
                params.remove(ParamSource::Path, "id");
                params
            })
            .build()
            .unwrap();

        let res = route.invoke(&RequestContext::new("GET", "/items/1")).await.unwrap();
        assert_eq!(
            res.json_body(),
            Some(serde_json::json!({
                "path": {},
                "query": {},
                "header": {},
                "cookie": {},
                "body": { "trail": "ab" },
            }))
        );
    }

    #[tokio::test]
    async fn handler_not_called_when_binding_fails() {
        let route = item_route();
        let err = route.invoke(&RequestContext::new("GET", "/items/x")).await.unwrap_err();
        assert!(!err.is_mismatch());
    }
}
