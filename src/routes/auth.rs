use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    error::AppResult,
    middleware::auth::{SessionToken, SESSION_COOKIE},
    models::auth::{AuthenticatedUser, LoginRequest, LoginResponse, UserProfile},
    AppState,
};

fn session_cookie(token: &str, max_age: u64) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}")
}

/// POST /auth/login — look the email up in the allow-list and open a session.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Response> {
    let user = state.gate.authenticate(&body.email)?;
    let token = state.sessions.create(user.clone());

    let cookie = session_cookie(&token, state.config.session_ttl_seconds);
    let response = LoginResponse {
        email: user.email,
        role: user.role,
        token,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(response)).into_response())
}

/// POST /auth/logout — drop the session and expire the cookie.
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> Response {
    state.sessions.destroy(&token);
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, session_cookie("", 0))],
    )
        .into_response()
}

pub async fn me(user: AuthenticatedUser) -> Json<UserProfile> {
    Json(UserProfile::from(&user))
}
