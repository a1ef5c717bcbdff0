//! Overall request timeout applied to every route.
//!
//! Only the response is abandoned when the limit is hit; extractions started
//! by the request run on their own task and still complete.

use crate::errors::AppError;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;

pub async fn enforce_request_timeout(
    State(limit): State<Duration>,
    request: Request,
    next: Next,
) -> Response {
    let uri = request.uri().clone();
    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!("request {} timed out after {:?}", uri, limit);
            AppError::new(StatusCode::GATEWAY_TIMEOUT, "Request timed out").into_response()
        }
    }
}
