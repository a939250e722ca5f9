//! Middleware over the bound-parameter bundle.
//!
//! A middleware takes the [`Bundle`] produced by binding (or by the previous
//! middleware) and returns the bundle the next stage sees. It may add,
//! rewrite or drop any value. A route runs its middleware strictly in
//! registration order, then calls the handler with the final bundle.
//!
//! Any `Fn(Bundle) -> Bundle` closure is a middleware:
//!
//! ```rust
//! use routebind::{Bundle, ParamSource, Value};
//! use routebind::middleware::{self, Middleware};
//!
//! let tag = middleware::from_fn(|mut params: Bundle| {
//!     params.insert(ParamSource::Body, "middleware_passed", true);
//!     params
//! });
//! let out = tag.apply(Bundle::default());
//! assert_eq!(out.body["middleware_passed"], Value::Bool(true));
//! ```

use std::sync::Arc;

use tracing::debug;

use crate::bundle::Bundle;

/// A transformation of the bundle, applied before the handler runs.
pub trait Middleware: Send + Sync + 'static {
    fn apply(&self, params: Bundle) -> Bundle;
}

impl<F> Middleware for F
where
    F: Fn(Bundle) -> Bundle + Send + Sync + 'static,
{
    fn apply(&self, params: Bundle) -> Bundle {
        self(params)
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// Identity helper that pins a closure's argument type to [`Bundle`].
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(Bundle) -> Bundle + Send + Sync + 'static,
{
    f
}

/// Emits the bundle as a `debug` event and passes it through unchanged.
pub fn trace() -> Trace {
    Trace
}

/// See [`trace`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn apply(&self, params: Bundle) -> Bundle {
        debug!(params = ?params, "bound parameters");
        params
    }
}
