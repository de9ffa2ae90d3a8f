use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{
    problem::{ApiError, ApiResult},
    state::AppState,
};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Rejects requests whose `X-Api-Key` header does not match the configured key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    if provided != Some(state.api_key.as_ref()) {
        debug!(path = %request.uri().path(), "rejected request without a valid api key");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
