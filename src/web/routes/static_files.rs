// Index page route handler

use hyper::{Body, Response, StatusCode};
use minijinja::{context, Environment};
use std::convert::Infallible;

use crate::web::models::SharedContext;
use crate::web::response_helpers::{html_response, json_error};
use crate::sys_error;

const INDEX_TEMPLATE: &str = include_str!("../../../assets/index.html");

/// Render the page. The `.html` name turns on minijinja's HTML auto-escaping.
pub fn render_index(context: &SharedContext) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;
    env.get_template("index.html")?.render(context! {
        ui => &context.ui,
        model => &context.model,
    })
}

pub async fn handle_index(context: SharedContext) -> Result<Response<Body>, Infallible> {
    match render_index(&context) {
        Ok(html) => Ok(html_response(StatusCode::OK, html)),
        Err(e) => {
            sys_error!("[HTTP] Failed to render index page: {}", e);
            Ok(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render index page",
            ))
        }
    }
}
