use std::path::Path;

use encoding_rs::Encoding;
use tracing::{info, warn};

use crate::{
    db::encoding::decode_text,
    error::{AppError, AppResult},
    models::auth::{AuthenticatedUser, Role},
    services::metrics::LOGINS_COUNTER,
};

/// Ordered set of registered emails. Entry 0 is the professor, every other
/// entry is a student. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    emails: Vec<String>,
}

impl AllowList {
    /// Trims entries, drops blanks, and keeps the first occurrence of an email
    /// (compared case-insensitively).
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut emails: Vec<String> = Vec::new();
        for entry in entries {
            let email = entry.as_ref().trim();
            if email.is_empty() || emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
                continue;
            }
            emails.push(email.to_string());
        }
        Self { emails }
    }

    pub fn parse(text: &str) -> Self {
        Self::new(text.lines())
    }

    /// Read the allow-list file. A missing or unreadable file gives an empty
    /// list; logins then report `ConfigurationMissing`.
    pub async fn load(path: &Path, legacy: &'static Encoding) -> Self {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let (text, _) = decode_text(&bytes, legacy);
                let list = Self::parse(&text);
                if list.is_empty() {
                    warn!("Allow-list {} has no entries", path.display());
                } else {
                    info!("Loaded {} registered email(s) from {}", list.len(), path.display());
                }
                list
            }
            Err(e) => {
                warn!("Allow-list {} unavailable: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn professor(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// The registered spelling of `email` and its role, if it is on the list.
    pub fn lookup(&self, email: &str) -> Option<(&str, Role)> {
        self.emails
            .iter()
            .position(|e| e.eq_ignore_ascii_case(email))
            .map(|idx| {
                let role = if idx == 0 { Role::Professor } else { Role::Student };
                (self.emails[idx].as_str(), role)
            })
    }
}

/// Maps a submitted email to an identity using the injected allow-list.
#[derive(Debug, Clone)]
pub struct AccessGate {
    allow_list: AllowList,
}

impl AccessGate {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    pub fn authenticate(&self, email: &str) -> AppResult<AuthenticatedUser> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::BadRequest("Email is required".into()));
        }
        if self.allow_list.is_empty() {
            LOGINS_COUNTER.with_label_values(&["none", "unconfigured"]).inc();
            warn!("Login attempted while no allow-list is configured");
            return Err(AppError::ConfigurationMissing);
        }

        match self.allow_list.lookup(email) {
            Some((registered, role)) => {
                let role_label = role.to_string();
                LOGINS_COUNTER.with_label_values(&[role_label.as_str(), "success"]).inc();
                info!("Login: {} as {}", registered, role);
                Ok(AuthenticatedUser {
                    email: registered.to_string(),
                    role,
                })
            }
            None => {
                LOGINS_COUNTER.with_label_values(&["none", "rejected"]).inc();
                info!("Login rejected for unregistered email {}", email);
                Err(AppError::NotAllowed)
            }
        }
    }
}

pub fn require_role(user: &AuthenticatedUser, allowed: &[Role]) -> AppResult<()> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::AccessDenied)
    }
}

pub fn require_owner_or_professor(user: &AuthenticatedUser, author: &str) -> AppResult<()> {
    if user.is_professor() || user.email.eq_ignore_ascii_case(author) {
        Ok(())
    } else {
        Err(AppError::AccessDenied)
    }
}
