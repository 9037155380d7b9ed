use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use api::{ApiError, SaveRequest};
use store::UserDataset;

use crate::AppState;

pub const SAVED_MESSAGE: &str = "saved (previous data replaced)";
pub const SAVE_FAILED: &str = "failed to save";
pub const LOAD_FAILED: &str = "failed to load";

#[derive(Debug, Serialize)]
struct SaveResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordsResponse {
    user_id: String,
    #[serde(flatten)]
    data: UserDataset,
}

fn user_id_param(params: &HashMap<String, String>) -> &str {
    params.get("userId").map(String::as_str).unwrap_or_default()
}

/// `POST /save`
pub async fn save(State(state): State<AppState>, body: Bytes) -> Response {
    let result = match SaveRequest::from_slice(&body) {
        Ok(request) => state.backend.save(request).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Json(SaveResponse {
            success: true,
            message: Some(SAVED_MESSAGE),
            error: None,
        })
        .into_response(),
        Err(e) => {
            let (status, message) = classify(&e, SAVE_FAILED);
            (
                status,
                Json(SaveResponse {
                    success: false,
                    message: None,
                    error: Some(message),
                }),
            )
                .into_response()
        }
    }
}

/// `GET /load?userId=`
pub async fn load(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match state.backend.load(user_id_param(&params)).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => error_response(&e, LOAD_FAILED),
    }
}

/// `GET /records?userId=`
pub async fn records(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let user_id = user_id_param(&params);
    match state.backend.records(user_id).await {
        Ok(data) => Json(RecordsResponse {
            user_id: user_id.to_string(),
            data,
        })
        .into_response(),
        Err(e) => error_response(&e, LOAD_FAILED),
    }
}

/// CORS preflight: headers come from the router layers, the body stays empty.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn error_response(e: &ApiError, fallback: &str) -> Response {
    let (status, error) = classify(e, fallback);
    (status, Json(ErrorResponse { error })).into_response()
}

/// Client errors keep their message; anything else is logged and replaced by
/// `fallback` so store details never reach the caller.
fn classify(e: &ApiError, fallback: &str) -> (StatusCode, String) {
    if e.is_client_error() {
        warn!(error = %e, "rejected request");
        (StatusCode::BAD_REQUEST, e.to_string())
    } else {
        error!(error = %e, "{}", fallback);
        (StatusCode::INTERNAL_SERVER_ERROR, fallback.to_string())
    }
}
