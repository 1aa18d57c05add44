//! On-disk row shapes for the two collections and the conversions to the
//! domain models. Column names follow the board's historical CSV headers.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::Record;
use crate::models::{
    announcement::{Announcement, AnnouncementStatus},
    question::Question,
};

const ATTACHMENT_SEPARATOR: char = ';';

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionRow {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub attachments: String,
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnouncementRow {
    pub id: i64,
    pub content: String,
    pub date: String,
    pub status: String,
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Accepts RFC 3339 as well as the minute/second-precision local forms older
/// board files were written with (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn required_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_timestamp(raw).ok_or_else(|| anyhow::anyhow!("Unreadable date: {raw:?}"))
}

impl Record for Question {
    type Row = QuestionRow;
    const KIND: &'static str = "Question";
    const HEADERS: &'static [&'static str] =
        &["id", "email", "title", "content", "attachments", "date"];

    fn id(&self) -> i64 {
        self.id
    }

    fn to_row(&self) -> QuestionRow {
        QuestionRow {
            id: self.id,
            email: self.author_email.clone(),
            title: self.title.clone(),
            content: self.content.clone(),
            attachments: self.attachments.join(&ATTACHMENT_SEPARATOR.to_string()),
            date: format_timestamp(&self.created_at),
        }
    }

    fn from_row(row: QuestionRow) -> anyhow::Result<Self> {
        let attachments = row
            .attachments
            .split(ATTACHMENT_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Ok(Question {
            id: row.id,
            author_email: row.email,
            title: row.title,
            content: row.content,
            attachments,
            created_at: required_timestamp(&row.date)?,
        })
    }
}

impl Record for Announcement {
    type Row = AnnouncementRow;
    const KIND: &'static str = "Announcement";
    const HEADERS: &'static [&'static str] = &["id", "content", "date", "status"];

    fn id(&self) -> i64 {
        self.id
    }

    fn to_row(&self) -> AnnouncementRow {
        AnnouncementRow {
            id: self.id,
            content: self.content.clone(),
            date: format_timestamp(&self.created_at),
            status: self.status.to_string(),
        }
    }

    fn from_row(row: AnnouncementRow) -> anyhow::Result<Self> {
        Ok(Announcement {
            id: row.id,
            content: row.content,
            created_at: required_timestamp(&row.date)?,
            status: row.status.trim().parse::<AnnouncementStatus>()?,
        })
    }
}
