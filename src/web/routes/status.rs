// Model status route handler

use hyper::{Body, Response, StatusCode};
use std::convert::Infallible;

use crate::web::models::SharedContext;
use crate::web::response_helpers::json_response;

/// What was loaded at startup: model, hub, template and limits.
pub async fn handle_status(context: SharedContext) -> Result<Response<Body>, Infallible> {
    Ok(json_response(StatusCode::OK, &context.model))
}
