//! Request context: the plain inputs the router binds parameters from.

use std::collections::HashMap;

/// Everything [`Router::resolve`](crate::Router::resolve) needs to know
/// about one request, already extracted from the transport.
///
/// The server builds this from a hyper request; tests and other transports
/// can build it by hand:
///
/// ```rust
/// use routebind::RequestContext;
///
/// let ctx = RequestContext::new("POST", "/items/")
///     .query("dry_run", "1")
///     .header("x-tenant", "acme")
///     .cookie("session", "abc")
///     .body_field("name", "widget");
/// assert_eq!(ctx.path(), "/items/");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) cookies: HashMap<String, String>,
    pub(crate) body: serde_json::Map<String, serde_json::Value>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self { method: method.into(), path: path.into(), ..Self::default() }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Sets one top-level body entry. Strings come from form bodies; any
    /// JSON value may come from a JSON body.
    pub fn body_field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.body.insert(name.into(), value.into());
        self
    }

    /// Replaces the body with the top-level entries of a decoded JSON object.
    pub fn json_body(mut self, body: serde_json::Map<String, serde_json::Value>) -> Self {
        self.body = body;
        self
    }

    pub fn method(&self) -> &str { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query_params(&self) -> &HashMap<String, String> { &self.query }
    pub fn headers(&self) -> &HashMap<String, String> { &self.headers }
    pub fn cookies(&self) -> &HashMap<String, String> { &self.cookies }
    pub fn body(&self) -> &serde_json::Map<String, serde_json::Value> { &self.body }
}
