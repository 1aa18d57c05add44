use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{
        announcement::{Announcement, AnnouncementStatus},
        auth::{AuthenticatedUser, Role},
    },
    services::{access::require_role, metrics::ANNOUNCEMENTS_COUNTER},
};

/// The confirmed announcement students see as a popup: latest `created_at`,
/// ties going to the larger id.
pub fn resolve_popup(announcements: &[Announcement]) -> Option<&Announcement> {
    announcements
        .iter()
        .filter(|a| a.status == AnnouncementStatus::Confirmed)
        .max_by_key(|a| (a.created_at, a.id))
}

fn require_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Announcement content is required".into()));
    }
    Ok(content.to_string())
}

/// Professor-only authoring of announcements: pending → confirmed, with any
/// edit sending a record back to pending.
pub struct AnnouncementService {
    repo: Arc<dyn Repository<Announcement>>,
}

impl AnnouncementService {
    pub fn new(repo: Arc<dyn Repository<Announcement>>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, user: &AuthenticatedUser) -> AppResult<Vec<Announcement>> {
        require_role(user, &[Role::Professor])?;
        self.repo.list().await
    }

    pub async fn create(&self, user: &AuthenticatedUser, content: &str) -> AppResult<Announcement> {
        require_role(user, &[Role::Professor])?;
        let content = require_content(content)?;

        let created = self
            .repo
            .insert(Box::new(move |id: i64| Announcement {
                id,
                content,
                created_at: Utc::now(),
                status: AnnouncementStatus::Pending,
            }))
            .await?;

        ANNOUNCEMENTS_COUNTER.with_label_values(&["create"]).inc();
        info!("Announcement {} created", created.id);
        Ok(created)
    }

    /// Replace the content; this un-publishes the announcement.
    pub async fn edit(
        &self,
        user: &AuthenticatedUser,
        id: i64,
        content: &str,
    ) -> AppResult<Announcement> {
        require_role(user, &[Role::Professor])?;
        let content = require_content(content)?;

        let updated = self
            .repo
            .update(
                id,
                Box::new(move |a: &mut Announcement| {
                    a.content = content;
                    a.created_at = Utc::now();
                    a.status = AnnouncementStatus::Pending;
                    Ok(())
                }),
            )
            .await?;

        ANNOUNCEMENTS_COUNTER.with_label_values(&["edit"]).inc();
        info!("Announcement {} edited, back to pending", id);
        Ok(updated)
    }

    pub async fn confirm(&self, user: &AuthenticatedUser, id: i64) -> AppResult<Announcement> {
        require_role(user, &[Role::Professor])?;

        let confirmed = self
            .repo
            .update(
                id,
                Box::new(|a: &mut Announcement| {
                    a.status = AnnouncementStatus::Confirmed;
                    Ok(())
                }),
            )
            .await?;

        ANNOUNCEMENTS_COUNTER.with_label_values(&["confirm"]).inc();
        info!("Announcement {} confirmed", id);
        Ok(confirmed)
    }

    /// Deleting an id that does not exist is a no-op. Returns whether a
    /// record was removed.
    pub async fn delete(&self, user: &AuthenticatedUser, id: i64) -> AppResult<bool> {
        require_role(user, &[Role::Professor])?;

        let removed = self.repo.delete(id, Box::new(|_: &Announcement| Ok(()))).await?;
        if removed {
            ANNOUNCEMENTS_COUNTER.with_label_values(&["delete"]).inc();
            info!("Announcement {} deleted", id);
        }
        Ok(removed)
    }

    /// Read-only popup lookup, open to every signed-in user.
    pub async fn popup(&self) -> AppResult<Option<Announcement>> {
        let all = self.repo.list().await?;
        Ok(resolve_popup(&all).cloned())
    }
}
