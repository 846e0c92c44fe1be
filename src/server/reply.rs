use serde::Serialize;
use std::convert::Infallible;
use tracing::{debug, error, warn};
use warp::{
    body::BodyDeserializeError,
    http::StatusCode,
    reject::{LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType},
    reply::Response,
    Rejection, Reply,
};

use crate::error::{ErrorBody, ServiceError};

pub(super) fn json_reply<T: Serialize>(body: &T) -> Response {
    warp::reply::json(body).into_response()
}

fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::Parse(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

/// Structured `{error_type, message}` body with the status for its category.
pub(super) fn error_reply(err: &ServiceError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!(error_type = err.category(), "request failed: {}", err);
    } else {
        warn!(error_type = err.category(), "request refused: {}", err);
    }
    warp::reply::with_status(warp::reply::json(&err.body()), status).into_response()
}

/// Render warp's own rejections (unknown route, oversized body, bad JSON)
/// with the same error shape as handler failures.
pub async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, error_type, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "NotFound", "route not found".to_string())
    } else if rejection.find::<PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "PayloadTooLarge",
            "request body exceeds the configured limit".to_string(),
        )
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "MethodNotAllowed",
            "method not allowed".to_string(),
        )
    } else if let Some(e) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "BadRequest", e.to_string())
    } else if rejection.find::<LengthRequired>().is_some() {
        // Bodies must declare their size; chunked uploads without one are refused.
        (
            StatusCode::LENGTH_REQUIRED,
            "LengthRequired",
            "a Content-Length header is required".to_string(),
        )
    } else if rejection.find::<UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "UnsupportedMediaType",
            "unsupported content type".to_string(),
        )
    } else {
        debug!(?rejection, "unhandled rejection");
        (
            StatusCode::BAD_REQUEST,
            "BadRequest",
            "malformed request".to_string(),
        )
    };

    let body = ErrorBody {
        error_type: error_type.to_string(),
        message,
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status).into_response())
}
