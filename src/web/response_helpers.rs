// HTTP response helper functions shared by the route handlers

use hyper::header::{self, HeaderValue};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

/// Standard CORS headers
const CORS_ORIGIN: &str = "*";
const CORS_METHODS: &str = "GET, POST, OPTIONS";
const CORS_HEADERS: &str = "content-type";

/// Build a response with CORS headers and an optional content type.
fn build(status: StatusCode, content_type: Option<&'static str>, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Some(content_type) = content_type {
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(CORS_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_HEADERS),
    );
    response
}

/// Build a JSON response with CORS headers
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_string(body) {
        Ok(json) => build(status, Some("application/json"), Body::from(json)),
        Err(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Serialization failed: {e}"),
        ),
    }
}

/// Build a JSON error response: `{"error": message}`
pub fn json_error(status: StatusCode, message: &str) -> Response<Body> {
    let json = serde_json::json!({ "error": message }).to_string();
    build(status, Some("application/json"), Body::from(json))
}

/// Build an HTML page response
pub fn html_response(status: StatusCode, html: String) -> Response<Body> {
    build(status, Some("text/html; charset=utf-8"), Body::from(html))
}

/// Build an empty response with CORS headers
pub fn empty_response(status: StatusCode) -> Response<Body> {
    build(status, None, Body::empty())
}

/// CORS preflight response
pub fn cors_preflight() -> Response<Body> {
    empty_response(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_json_error() {
        let response = json_error(StatusCode::BAD_REQUEST, "Test error");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_json_error_escapes_quotes() {
        let response = json_error(StatusCode::BAD_REQUEST, r#"Error "quoted" \ back"#);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], r#"Error "quoted" \ back"#);
    }

    #[tokio::test]
    async fn test_json_response_serializes_body() {
        let response = json_response(StatusCode::OK, &serde_json::json!({ "response": "4" }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"response":"4"}"#);
    }

    #[test]
    fn test_cors_preflight_has_no_body_type() {
        let response = cors_preflight();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            CORS_METHODS
        );
    }
}
