//! Route handlers.
//!
//! A handler receives the fully bound [`Bundle`] and produces a [`Response`].
//! Plain async functions and closures are handlers:
//!
//! ```text
//! async fn show(params: Bundle) -> impl IntoResponse
//! ```
//!
//! Types that carry state (a connection pool, a cache client) implement
//! [`Handler`] directly. Either way the route stores it as `Arc<dyn Handler>`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::bundle::Bundle;
use crate::response::{IntoResponse, Response};

/// The future a handler returns.
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

pub(crate) type BoxedHandler = Arc<dyn Handler>;

/// Produces the response for a request whose parameters bound successfully.
///
/// ```rust
/// use std::sync::Arc;
/// use routebind::{BoxFuture, Bundle, Handler, IntoResponse, Method, ParamSource, Route, TypeDescriptor};
///
/// struct Greeter {
///     greeting: Arc<str>,
/// }
///
/// impl Handler for Greeter {
///     fn call(&self, params: Bundle) -> BoxFuture {
///         let greeting = Arc::clone(&self.greeting);
///         Box::pin(async move {
///             let name = params.get(ParamSource::Path, "name").and_then(|v| v.as_str()).unwrap_or_default();
///             format!("{greeting}, {name}").into_response()
///         })
///     }
/// }
///
/// let route = Route::builder(Method::Get, "/hello/{name}", Greeter { greeting: "hi".into() })
///     .path("name", TypeDescriptor::String)
///     .build();
/// assert!(route.is_ok());
/// ```
pub trait Handler: Send + Sync + 'static {
    fn call(&self, params: Bundle) -> BoxFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Bundle) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, params: Bundle) -> BoxFuture {
        let fut = self(params);
        Box::pin(async move { fut.await.into_response() })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::bundle::ParamSource;

    struct Fixed(StatusCode);

    impl Handler for Fixed {
        fn call(&self, _: Bundle) -> BoxFuture {
            let status = self.0;
            Box::pin(async move { Response::status(status) })
        }
    }

    #[tokio::test]
    async fn functions_are_handlers() {
        async fn count(params: Bundle) -> String {
            format!("{} path params", params.path.len())
        }

        let mut params = Bundle::default();
        params.insert(ParamSource::Path, "id", 1_i64);
        let res = Handler::call(&count, params).await;
        assert_eq!(res.body(), b"1 path params");
    }

    #[tokio::test]
    async fn structs_are_handlers() {
        let boxed: BoxedHandler = Arc::new(Fixed(StatusCode::ACCEPTED));
        let res = boxed.call(Bundle::default()).await;
        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
    }
}
