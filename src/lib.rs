//! # routebind
//!
//! HTTP routing with typed parameter binding.
//!
//! A route declares a method, a path template and the parameters it needs
//! from each of five sources: path, query, headers, cookies and body. Each
//! parameter has a [`TypeDescriptor`]. When a request arrives the router
//! tries routes in registration order; the first route whose method and path
//! match binds every declared parameter, runs its middleware and calls its
//! handler with the resulting [`Bundle`].
//!
//! What the router answers on its own:
//!
//! - `400 {"error":"Missing parameter"}` when a declared parameter is absent
//! - `400 {"error":"Wrong parameter type or value"}` when one does not coerce
//! - `404 {"error":"Not found"}` when no route matches
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use routebind::{Bundle, CompositeType, Json, Method, Route, Router, Server, TypeDescriptor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::builder()
//!         .composite(
//!             CompositeType::new("Point")
//!                 .field("x", TypeDescriptor::Int)
//!                 .field("y", TypeDescriptor::Int),
//!         )
//!         .route(Route::builder(Method::Get, "/items/{id}", show).path("id", TypeDescriptor::Int))
//!         .route(Route::builder(Method::Post, "/points", create).body("at", TypeDescriptor::named("Point")))
//!         .build();
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn show(params: Bundle) -> Json<Bundle> {
//!     Json(params)
//! }
//!
//! async fn create(params: Bundle) -> Json<Bundle> {
//!     Json(params)
//! }
//! ```

mod bundle;
mod coerce;
mod config;
mod error;
mod handler;
mod method;
mod path;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;

pub use bundle::{Bundle, ParamSource, Params};
pub use coerce::{CompositeType, Field, Object, TypeDescriptor, TypeRegistry, Value, coerce};
pub use config::{Environment, ServerConfig};
pub use error::{CoercionError, ConfigError, Error, RegistrationError, RouteError};
pub use handler::{BoxFuture, Handler};
pub use method::Method;
pub use path::PathPattern;
pub use request::RequestContext;
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use route::{ParamTemplates, Route, RouteBuilder};
pub use router::{Router, RouterBuilder};
pub use server::Server;

pub use http::StatusCode;
