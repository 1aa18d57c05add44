use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    error::AppError,
    models::auth::{AuthenticatedUser, Role},
    AppState,
};

pub const SESSION_COOKIE: &str = "board_session";

/// Extract a named cookie value from request headers.
pub fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|part| part.trim().strip_prefix(&prefix).map(str::to_string))
}

/// The session token carried by the request: the session cookie, or an
/// `Authorization: Bearer` header for non-browser clients.
pub struct SessionToken(pub String);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());

        bearer
            .or_else(|| get_cookie(&parts.headers, SESSION_COOKIE))
            .filter(|t| !t.is_empty())
            .map(SessionToken)
            .ok_or(AppError::Unauthenticated)
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let SessionToken(token) = SessionToken::from_request_parts(parts, state).await?;
        state
            .sessions
            .resolve(&token)
            .ok_or(AppError::Unauthenticated)
    }
}

/// A signed-in user holding the professor role.
pub struct Professor(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Professor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if user.role != Role::Professor {
            return Err(AppError::AccessDenied);
        }
        Ok(Professor(user))
    }
}
