//! Minimal routebind example: typed path, query, header, cookie and body
//! parameters, plus a composite body type.
//!
//! Run with:
//!   RUST_LOG=routebind=debug APP_ENV=development cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/items/42
//!   curl http://localhost:3000/items/abc             # 400 wrong type
//!   curl 'http://localhost:3000/items?page=2&tags=["a","b"]'
//!   curl -X POST http://localhost:3000/items \
//!        -H 'content-type: application/json' -d '{}'  # 400 missing
//!   curl -X POST http://localhost:3000/points \
//!        -H 'content-type: application/json' \
//!        -d '{"at":{"x":"1","y":"2"}}'
//!   curl http://localhost:3000/me -H 'x-tenant: acme' -b 'session=abc'
//!   curl http://localhost:3000/unknown               # 404

use routebind::{
    Bundle, CompositeType, IntoResponse, Json, Method, ParamSource, Response, Route, Router,
    Server, ServerConfig, StatusCode, TypeDescriptor, middleware,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), routebind::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;

    let app = Router::builder()
        .composite(
            CompositeType::new("Point")
                .field("x", TypeDescriptor::Int)
                .field("y", TypeDescriptor::Int)
                .optional("label", TypeDescriptor::String),
        )
        .route(
            Route::builder(Method::Get, "/items/{id}", get_item)
                .path("id", TypeDescriptor::Int)
                .middleware(middleware::trace()),
        )
        .route(
            Route::builder(Method::Get, "/items", list_items)
                .query("page", TypeDescriptor::Int)
                .query("tags", TypeDescriptor::Array),
        )
        .route(Route::builder(Method::Post, "/items", create_item).body("name", TypeDescriptor::String))
        .route(Route::builder(Method::Post, "/points", create_point).body("at", TypeDescriptor::named("Point")))
        .route(
            Route::builder(Method::Get, "/me", whoami)
                .header("x-tenant", TypeDescriptor::String)
                .cookie("session", TypeDescriptor::String),
        )
        .build();

    Server::with_config(config).serve(app).await
}

// GET /items/{id}
async fn get_item(params: Bundle) -> Json<Bundle> {
    Json(params)
}

// GET /items?page=..&tags=[..]
async fn list_items(params: Bundle) -> Response {
    let page = params.get(ParamSource::Query, "page").and_then(|v| v.as_int()).unwrap_or(1);
    Response::json_value(&serde_json::json!({ "page": page, "query": params.query }))
}

// POST /items → 201
async fn create_item(params: Bundle) -> impl IntoResponse {
    (StatusCode::CREATED, Json(params.body))
}

// POST /points
async fn create_point(params: Bundle) -> Response {
    match params.get(ParamSource::Body, "at").and_then(|v| v.as_object()) {
        Some(point) => Response::json_value(point),
        None => Response::status(StatusCode::UNPROCESSABLE_ENTITY),
    }
}

// GET /me
async fn whoami(params: Bundle) -> String {
    let tenant = params.get(ParamSource::Header, "x-tenant").and_then(|v| v.as_str()).unwrap_or_default();
    format!("tenant {tenant}")
}
