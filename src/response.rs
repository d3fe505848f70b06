//! Response constructors shared by the dispatcher and user handlers.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde::Serialize;

/// A plain-text response carrying just the status code and reason.
pub fn plain_status(status: StatusCode) -> Response {
    let text = format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or(""));
    finish(
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(text)),
    )
}

/// A `200 OK` response with the given content type.
pub fn with_content_type(body: String, content_type: &str) -> Response {
    finish(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body)),
    )
}

/// A `200 OK` HTML document.
pub fn html(body: String) -> Response {
    with_content_type(body, "text/html; charset=utf-8")
}

/// A `200 OK` JSON response. Serialization failures collapse to a 500.
pub fn json<T: Serialize>(value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(body) => finish(
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
        ),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize json response");
            plain_status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// A `307 Temporary Redirect` to the given location.
pub fn redirect(location: &str) -> Response {
    finish(
        Response::builder()
            .status(StatusCode::TEMPORARY_REDIRECT)
            .header(header::LOCATION, location)
            .body(Body::empty()),
    )
}

/// Mark a response for download with an optional filename.
pub fn mark_for_download(response: &mut Response, filename: Option<&str>) {
    let value = match filename {
        Some(name) => format!("attachment; filename=\"{name}\""),
        None => "attachment".to_string(),
    };
    if let Ok(value) = header::HeaderValue::from_str(&value) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
}

/// Finalize a builder, collapsing construction errors to a 500 rather
/// than letting a malformed header reach the transport.
pub fn finish(result: Result<Response, axum::http::Error>) -> Response {
    result.unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to build response");
        let mut response = Response::new(Body::from("500 Internal Server Error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
