use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Identity resolved from a verified token, attached to request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

/// Gate for protected routes. The header may carry the bare token or
/// `Bearer <token>`.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(bearer_token)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let claims = keys.verify(token).map_err(|e| {
        warn!("invalid or expired token");
        e
    })?;

    req.extensions_mut().insert(AuthUser(claims.sub));
    Ok(next.run(req).await)
}

fn bearer_token(header: &str) -> &str {
    let header = header.trim_start();
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .unwrap_or(header)
        .trim()
}
