use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{announcement::Announcement, auth::Role};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: i64,
    pub author_email: String,
    pub title: String,
    pub content: String,
    /// Sanitized filenames in the upload area, in upload order.
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Append filenames, skipping any already attached.
    pub fn append_attachments<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        for name in names {
            if !self.attachments.contains(&name) {
                self.attachments.push(name);
            }
        }
    }
}

/// A file part received with a question form, before it lands in the upload area.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: bytes::Bytes,
}

/// Parsed multipart body of a question create/edit.
#[derive(Debug, Default)]
pub struct QuestionForm {
    pub title: Option<String>,
    pub content: String,
    pub files: Vec<UploadedFile>,
}

/// What the question board page renders.
#[derive(Debug, Serialize)]
pub struct BoardView {
    pub email: String,
    pub role: Role,
    pub questions: Vec<Question>,
    pub popup: Option<Announcement>,
}
