//! Bearer token middleware.

use crate::AppState;
use crate::error::ServerError;
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

/// Resolves `Authorization: Bearer <token>` to an account and stores the
/// [`AccountId`](lockbox_storage::AccountId) in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("missing Authorization header".to_string()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServerError::Unauthorized("invalid auth scheme".to_string()))?
        .trim()
        .to_string();

    let account = state
        .store
        .account_for_token(&token)?
        .ok_or_else(|| ServerError::Unauthorized("invalid token".to_string()))?;

    debug!("Authenticated account {}", account);
    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}
