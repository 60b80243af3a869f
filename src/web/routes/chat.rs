// Chat route handler

use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::time::Instant;

use crate::web::{
    models::{ChatRequest, ChatResponse, SharedContext},
    request_parsing::parse_json_body,
    response_helpers::{json_error, json_response},
};
use crate::{sys_error, sys_info};

pub async fn handle_post_chat(
    req: Request<Body>,
    context: SharedContext,
) -> Result<Response<Body>, Infallible> {
    // Parse request body using helper
    let chat_request: ChatRequest = match parse_json_body(req.into_body()).await {
        Ok(req) => req,
        Err(error_response) => return Ok(error_response),
    };

    sys_info!(
        "[CHAT] Received prompt ({} chars)",
        chat_request.prompt.chars().count()
    );
    let started = Instant::now();

    match context.queue.respond(chat_request.prompt).await {
        Ok(response) => {
            sys_info!(
                "[CHAT] Responded in {:.2}s ({} chars)",
                started.elapsed().as_secs_f64(),
                response.chars().count()
            );
            Ok(json_response(StatusCode::OK, &ChatResponse { response }))
        }
        Err(e) => {
            sys_error!("[CHAT] {}", e);
            Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
        }
    }
}
