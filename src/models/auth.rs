use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Professor,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Professor => "professor",
            Role::Student => "student",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "professor" => Ok(Role::Professor),
            "student" => Ok(Role::Student),
            _ => Err(anyhow::anyhow!("Unknown role: {s}")),
        }
    }
}

/// Identity stamped on a session at login. Extracted from the request by the
/// auth middleware and handed to every protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub email: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn is_professor(&self) -> bool {
        self.role == Role::Professor
    }
}

/// Server-side session record, keyed by its opaque token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: AuthenticatedUser,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub role: Role,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub role: Role,
}

impl From<&AuthenticatedUser> for UserProfile {
    fn from(user: &AuthenticatedUser) -> Self {
        Self {
            email: user.email.clone(),
            role: user.role,
        }
    }
}
