//! HTTP request handlers.

use super::types::{HealthResponse, RegistrationRequest};
use super::AppState;
use crate::error::ApiError;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};

const USAGE: &str = "POST a JSON object {\"callerid\": <temporary number>, \"token\": <dialled digits>} to register a handset.\n";

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Usage hint for anyone browsing to the endpoint.
pub async fn usage() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, USAGE)
}

/// Transfer the calling handset to the account owning the dialled token.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    if !is_json(&headers) {
        return Err(ApiError::NotJson);
    }
    let body = RegistrationRequest::parse(&body)?;
    let request = state.gateway.request(&body.callerid, &body.token);
    state.gateway.submit(request).await?;
    Ok("ACK")
}

/// `application/json`, parameters such as `charset` allowed.
fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}
