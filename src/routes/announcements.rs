use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    middleware::auth::Professor,
    models::{
        announcement::{Announcement, AnnouncementRequest},
        auth::AuthenticatedUser,
    },
    AppState,
};

/// GET /announcements — professor authoring view, every status.
pub async fn list_announcements(
    State(state): State<AppState>,
    Professor(user): Professor,
) -> AppResult<Json<Vec<Announcement>>> {
    state.announcements.list(&user).await.map(Json)
}

pub async fn create_announcement(
    State(state): State<AppState>,
    Professor(user): Professor,
    Json(body): Json<AnnouncementRequest>,
) -> AppResult<(StatusCode, Json<Announcement>)> {
    let created = state.announcements.create(&user, &body.content).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    Professor(user): Professor,
    Path(id): Path<i64>,
    Json(body): Json<AnnouncementRequest>,
) -> AppResult<Json<Announcement>> {
    state.announcements.edit(&user, id, &body.content).await.map(Json)
}

pub async fn confirm_announcement(
    State(state): State<AppState>,
    Professor(user): Professor,
    Path(id): Path<i64>,
) -> AppResult<Json<Announcement>> {
    state.announcements.confirm(&user, id).await.map(Json)
}

/// DELETE /announcements/{id} — 204 whether or not the id existed.
pub async fn delete_announcement(
    State(state): State<AppState>,
    Professor(user): Professor,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.announcements.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /announcements/popup — the live popup or `null`, for any signed-in user.
pub async fn get_popup(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> AppResult<Json<Option<Announcement>>> {
    state.announcements.popup().await.map(Json)
}
