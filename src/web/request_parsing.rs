// Request parsing utilities for HTTP handlers

use hyper::{Body, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::response_helpers::json_error;
use crate::{sys_debug, sys_error};

/// Parse JSON request body into a typed structure.
///
/// Returns the deserialized value on success, or a 400 JSON error Response on failure.
///
/// # Example
/// ```ignore
/// let chat_request: ChatRequest = match parse_json_body(req.into_body()).await {
///     Ok(req) => req,
///     Err(error_response) => return Ok(error_response),
/// };
/// ```
pub async fn parse_json_body<T: DeserializeOwned>(body: Body) -> Result<T, Response<Body>> {
    // Read body bytes
    let body_bytes = match hyper::body::to_bytes(body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            sys_error!("[REQUEST] Failed to read body: {}", e);
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "Failed to read request body",
            ));
        }
    };

    sys_debug!("[REQUEST] Body: {} bytes", body_bytes.len());

    // Deserialize JSON
    match serde_json::from_slice::<T>(&body_bytes) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            sys_error!("[REQUEST] JSON parsing error: {}", e);
            Err(json_error(StatusCode::BAD_REQUEST, "Invalid JSON format"))
        }
    }
}
