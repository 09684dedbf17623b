//! Bearer-token extractors.
//!
//! Tokens are issued by the auth service (or the `issue-token` binary) and
//! verified here against the configured Ed25519 key.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::debug;

use taxtron_shared::session::{Role, SessionToken};
use taxtron_shared::UserId;

use crate::api::AppState;
use crate::error::ServerError;

/// An authenticated end user.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

/// An authenticated administrator.
#[derive(Debug, Clone, Copy)]
pub struct AuthAdmin(pub UserId);

fn session(parts: &Parts, state: &AppState, role: Role) -> Result<UserId, ServerError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Unauthorized("No token provided".into()))?;

    let encoded = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServerError::Unauthorized("Invalid authorization header".into()))?;

    let token = SessionToken::decode(encoded)
        .and_then(|t| t.verify(&state.verifying_key).map(|()| t))
        .map_err(|e| {
            debug!(error = %e, "rejected session token");
            ServerError::Unauthorized("Invalid or expired token".into())
        })?;

    if token.role != role {
        return Err(ServerError::Forbidden(match role {
            Role::Admin => "Admin access required".into(),
            Role::User => "User access required".into(),
        }));
    }
    Ok(UserId(token.subject))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session(parts, state, Role::User).map(AuthUser)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthAdmin {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        session(parts, state, Role::Admin).map(AuthAdmin)
    }
}
