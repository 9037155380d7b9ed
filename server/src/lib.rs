//! HTTP surface of the holiday ledger.
//!
//! | Route | Method | Handler |
//! |-------|--------|---------|
//! | `/save` | `POST` | [`routes::save`] |
//! | `/load` | `GET` | [`routes::load`] |
//! | `/records` | `GET` | [`routes::records`] |
//! | any of the above | `OPTIONS` | [`routes::preflight`] |
//!
//! Every response, errors and 405s included, carries the CORS headers for the
//! configured origin.

use std::sync::Arc;

use axum::http::header::{
    InvalidHeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use api::Backend;

pub mod routes;
pub mod settings;

pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
pub const ALLOWED_HEADERS: &str = "Content-Type";

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<Backend>,
}

pub fn router(backend: Arc<Backend>, allowed_origin: &str) -> Result<Router, InvalidHeaderValue> {
    let origin = HeaderValue::from_str(allowed_origin)?;

    Ok(Router::new()
        .route("/save", post(routes::save).options(routes::preflight))
        .route("/load", get(routes::load).options(routes::preflight))
        .route("/records", get(routes::records).options(routes::preflight))
        .with_state(AppState { backend })
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            origin,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(TraceLayer::new_for_http()))
}
