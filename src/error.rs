use serde_json::json;
use std::convert::Infallible;
use thiserror::Error;
use warp::{http::StatusCode, Rejection, Reply};

/// Failures the API surfaces to callers.
///
/// Transient channel drops are not represented here: they are handled by the
/// client's [`crate::reconnect::ReconnectPolicy`] and never become a
/// response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed identifiers or pagination parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Missing/invalid token, or the caller is not a conversation participant.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// The message store could not be reached or timed out.
    #[error("message store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl warp::reject::Reject for ApiError {}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wrap an [`ApiError`] as a warp rejection.
pub fn reject(err: ApiError) -> Rejection {
    warp::reject::custom(err)
}

/// Turn rejections into JSON `{"error": ...}` responses.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(api_error) = err.find::<ApiError>() {
        let body = warp::reply::json(&json!({ "error": api_error.to_string() }));
        return Ok(warp::reply::with_status(body, api_error.status()));
    }

    if err.is_not_found() {
        let body = warp::reply::json(&json!({ "error": "not found" }));
        return Ok(warp::reply::with_status(body, StatusCode::NOT_FOUND));
    }

    if err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::filters::body::BodyDeserializeError>().is_some()
    {
        let body = warp::reply::json(&json!({ "error": "invalid request" }));
        return Ok(warp::reply::with_status(body, StatusCode::BAD_REQUEST));
    }

    let body = warp::reply::json(&json!({ "error": "unhandled error" }));
    Ok(warp::reply::with_status(
        body,
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}
