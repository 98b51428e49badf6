//! Bearer-token gate for protected routes.
//!
//! `authenticate` verifies `Authorization: Bearer <token>` and attaches the
//! decoded [`Identity`] to the request; `require_admin` must be layered inside
//! it and only checks the identity that is already there.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use billboard_protocol::Role;

use crate::crypto::TokenKeys;
use crate::error::{AppError, Result};
use crate::models::Identity;
use crate::AppState;

pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let identity = bearer_identity(request.headers(), state.auth.tokens())?;
    tracing::debug!("Token verified for user {}", identity.user_id);
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response> {
    require_role(&request, Role::Admin)?;
    Ok(next.run(request).await)
}

/// The role recorded in the token decides, not the role currently stored for the user.
pub fn require_role(request: &Request, role: Role) -> Result<Identity> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .copied()
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

    if identity.role != role {
        return Err(AppError::Forbidden(format!("{} role required", role)));
    }
    Ok(identity)
}

pub fn bearer_identity(headers: &HeaderMap, tokens: &TokenKeys) -> Result<Identity> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("No token provided".to_string()))?;

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;

    tokens.verify(token)
}
