// Route handler modules and the request dispatcher

pub mod chat;
pub mod health;
pub mod static_files;
pub mod status;

use std::convert::Infallible;

use hyper::{Body, Method, Request, Response, StatusCode};

use super::models::SharedContext;
use super::response_helpers::{cors_preflight, json_error};
use crate::sys_debug;

/// Route one request. Never fails at the hyper level; errors become JSON responses.
pub async fn handle_request(
    req: Request<Body>,
    context: SharedContext,
) -> Result<Response<Body>, Infallible> {
    sys_debug!("[HTTP] {} {}", req.method(), req.uri().path());

    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") | (&Method::GET, "/index.html") => {
            static_files::handle_index(context).await
        }
        (&Method::POST, "/api/chat") => chat::handle_post_chat(req, context).await,
        (&Method::GET, "/health") => health::handle().await,
        (&Method::GET, "/api/status") => status::handle_status(context).await,
        (&Method::OPTIONS, _) => Ok(cors_preflight()),
        _ => Ok(json_error(StatusCode::NOT_FOUND, "Not found")),
    }
}
