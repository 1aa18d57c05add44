use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{error::AppResult, models::auth::AuthenticatedUser, AppState};

/// `filename` carries an ASCII stand-in; `filename*` the exact UTF-8 name.
fn content_disposition(kind: &str, name: &str) -> String {
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' { c } else { '_' })
        .collect();
    let encoded: String = name
        .bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_') {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();
    format!("{kind}; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}

#[derive(Deserialize)]
pub struct ServeAttachmentQuery {
    pub download: Option<u8>,
}

/// GET /attachments/{name} — stream a stored attachment to a signed-in user.
/// Add ?download=1 to get Content-Disposition: attachment.
pub async fn serve_attachment(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(name): Path<String>,
    Query(params): Query<ServeAttachmentQuery>,
) -> AppResult<Response> {
    let file_path = state.uploads.resolve(&name)?;
    let bytes = tokio::fs::read(&file_path).await?;

    let content_type = mime_guess::from_path(&file_path)
        .first_or_octet_stream()
        .to_string();
    let disposition = if params.download.unwrap_or(0) != 0 {
        "attachment"
    } else {
        "inline"
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(disposition, &name),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_encodes_non_ascii() {
        assert_eq!(
            content_disposition("attachment", "과제.pdf"),
            "attachment; filename=\"__.pdf\"; filename*=UTF-8''%EA%B3%BC%EC%A0%9C.pdf"
        );
        assert_eq!(
            content_disposition("inline", "x.txt"),
            "inline; filename=\"x.txt\"; filename*=UTF-8''x.txt"
        );
    }
}
