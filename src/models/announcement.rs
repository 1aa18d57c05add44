use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementStatus {
    Pending,
    Confirmed,
}

impl std::fmt::Display for AnnouncementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnnouncementStatus::Pending => "pending",
            AnnouncementStatus::Confirmed => "confirmed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AnnouncementStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnnouncementStatus::Pending),
            "confirmed" => Ok(AnnouncementStatus::Confirmed),
            _ => Err(anyhow::anyhow!("Unknown announcement status: {s}")),
        }
    }
}

/// A professor's notice. Only `confirmed` ones can surface as the student popup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Announcement {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: AnnouncementStatus,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub content: String,
}
