//! Mapping from failures to HTTP responses.
use std::any::Any;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde_json::json;
use tracing::error;

use crate::views::{encode_query, error_page};

pub type WebResult<T, E = WebError> = core::result::Result<T, E>;

#[derive(Debug)]
pub enum WebError {
    NotFound,
    /// The visitor must log in; `next` is where to send them afterwards.
    LoginRequired { next: String },
    BadRequest(String),
    Internal(String),
}

impl WebError {
    pub fn login_required(next: impl Into<String>) -> Self {
        Self::LoginRequired { next: next.into() }
    }
}

impl From<shopfront_common::Error> for WebError {
    fn from(error: shopfront_common::Error) -> Self {
        use shopfront_common::Error;
        match error {
            Error::NotFound(_) => Self::NotFound,
            Error::Unauthorized(_) => Self::login_required("/"),
            Error::Validation(message) | Error::Conflict(message) => Self::BadRequest(message),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound => not_found_response(),
            WebError::LoginRequired { next } => {
                Redirect::to(&format!("/login?next={}", encode_query(&next))).into_response()
            }
            WebError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Html(error_page("Something is not right", &message)),
            )
                .into_response(),
            WebError::Internal(detail) => {
                log_unhandled("error", &detail);
                internal_error_response()
            }
        }
    }
}

/// Write one JSON record describing a failure nobody handled.
fn log_unhandled(kind: &str, detail: &str) {
    let record = json!({
        "event": "unhandled_error",
        "kind": kind,
        "status": 500,
        "detail": detail,
        "at": chrono::Utc::now().to_rfc3339(),
    });
    error!("{record}");
}

pub fn not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(error_page(
            "Page not found",
            "The page you were looking for does not exist.",
        )),
    )
        .into_response()
}

fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(error_page(
            "Something went wrong",
            "We could not complete your request. Please try again later.",
        )),
    )
        .into_response()
}

/// Used by the panic-catching layer: log the payload, show the generic page.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    log_unhandled("panic", &detail);
    internal_error_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;

    #[test]
    fn domain_errors_map_to_statuses() {
        let not_found = WebError::from(shopfront_common::Error::NotFound("x".into()));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = WebError::from(shopfront_common::Error::Validation("bad".into()));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let db = WebError::from(shopfront_common::Error::Database("disk on fire".into()));
        assert_eq!(db.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn login_required_redirects_with_next() {
        let response = WebError::login_required("/admin/orders").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/login?next=/admin/orders"
        );
    }

    #[test]
    fn panics_become_generic_500() {
        let response = panic_response(Box::new("boom".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
