use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        auth::AuthenticatedUser,
        question::{BoardView, Question, QuestionForm, UploadedFile},
    },
    AppState,
};

/// Collect the `title`, `content` and `file` parts of a question form.
/// File parts with no name and no bytes (nothing chosen in the browser) are
/// skipped.
async fn read_question_form(mut multipart: Multipart) -> AppResult<QuestionForm> {
    let mut form = QuestionForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => form.title = Some(field.text().await?),
            "content" => form.content = field.text().await?,
            "file" | "files" | "file[]" | "files[]" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.push(UploadedFile { filename, bytes });
            }
            _ => {}
        }
    }

    Ok(form)
}

/// GET /questions — the board, plus the popup announcement if one is live.
pub async fn list_questions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<BoardView>> {
    let questions = state.questions.list(&user).await?;
    let popup = state.announcements.popup().await?;
    Ok(Json(BoardView {
        email: user.email,
        role: user.role,
        questions,
        popup,
    }))
}

pub async fn create_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Question>)> {
    let form = read_question_form(multipart).await?;
    let question = state.questions.create(&user, form).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<Question>> {
    let form = read_question_form(multipart).await?;
    state.questions.edit(&user, id, form).await.map(Json)
}

pub async fn delete_question(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.questions.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
