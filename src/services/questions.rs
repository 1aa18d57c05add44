use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::{
    db::Repository,
    error::{AppError, AppResult},
    models::{
        auth::{AuthenticatedUser, Role},
        question::{Question, QuestionForm},
    },
    services::{
        access::{require_owner_or_professor, require_role},
        metrics::QUESTIONS_COUNTER,
        uploads::UploadArea,
    },
};

const ANY_ROLE: &[Role] = &[Role::Professor, Role::Student];

/// The question board: any signed-in user may post; the author or the
/// professor may edit or delete.
pub struct QuestionService {
    repo: Arc<dyn Repository<Question>>,
    uploads: Arc<UploadArea>,
}

impl QuestionService {
    pub fn new(repo: Arc<dyn Repository<Question>>, uploads: Arc<UploadArea>) -> Self {
        Self { repo, uploads }
    }

    /// Every question in insertion order.
    pub async fn list(&self, user: &AuthenticatedUser) -> AppResult<Vec<Question>> {
        require_role(user, ANY_ROLE)?;
        self.repo.list().await
    }

    pub async fn create(&self, user: &AuthenticatedUser, form: QuestionForm) -> AppResult<Question> {
        require_role(user, ANY_ROLE)?;
        let content = require_content(&form.content)?;
        let title = form.title.map(|t| t.trim().to_string()).unwrap_or_default();

        let attachments = self.uploads.save_all(&form.files).await?;
        let author_email = user.email.clone();

        let created = self
            .repo
            .insert(Box::new(move |id: i64| Question {
                id,
                author_email,
                title,
                content,
                attachments,
                created_at: Utc::now(),
            }))
            .await?;

        QUESTIONS_COUNTER.with_label_values(&["create"]).inc();
        info!(
            "Question {} posted by {} with {} attachment(s)",
            created.id,
            created.author_email,
            created.attachments.len()
        );
        Ok(created)
    }

    /// Replace content (and title, if sent) and append any new attachments.
    pub async fn edit(
        &self,
        user: &AuthenticatedUser,
        id: i64,
        form: QuestionForm,
    ) -> AppResult<Question> {
        // Checked before touching the upload area, and again under the lock.
        let existing = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Question {id}")))?;
        require_owner_or_professor(user, &existing.author_email)?;
        let content = require_content(&form.content)?;

        let new_files = self.uploads.save_all(&form.files).await?;
        let editor = user.clone();
        let title = form.title.map(|t| t.trim().to_string());

        let updated = self
            .repo
            .update(
                id,
                Box::new(move |q: &mut Question| {
                    require_owner_or_professor(&editor, &q.author_email)?;
                    q.content = content;
                    if let Some(title) = title {
                        q.title = title;
                    }
                    q.append_attachments(new_files);
                    q.created_at = Utc::now();
                    Ok(())
                }),
            )
            .await?;

        QUESTIONS_COUNTER.with_label_values(&["edit"]).inc();
        info!("Question {} edited by {}", id, user.email);
        Ok(updated)
    }

    /// Remove a question. A missing id is a no-op; attachment files stay in
    /// the upload area. Returns whether a record was removed.
    pub async fn delete(&self, user: &AuthenticatedUser, id: i64) -> AppResult<bool> {
        require_role(user, ANY_ROLE)?;
        let remover = user.clone();

        let removed = self
            .repo
            .delete(
                id,
                Box::new(move |q: &Question| require_owner_or_professor(&remover, &q.author_email)),
            )
            .await?;

        if removed {
            QUESTIONS_COUNTER.with_label_values(&["delete"]).inc();
            info!("Question {} deleted by {}", id, user.email);
        }
        Ok(removed)
    }
}

fn require_content(content: &str) -> AppResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Question content is required".into()));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::CsvTable, models::question::UploadedFile};

    struct Fixture {
        svc: QuestionService,
        uploads: Arc<UploadArea>,
    }

    fn fixture() -> Fixture {
        let root = std::env::temp_dir().join(format!("board-{}", uuid::Uuid::new_v4()));
        let uploads = Arc::new(UploadArea::new(root.join("uploads")));
        let repo = Arc::new(CsvTable::<Question>::new(root.join("questions.csv"), encoding_rs::EUC_KR));
        Fixture {
            svc: QuestionService::new(repo, uploads.clone()),
            uploads,
        }
    }

    fn user(email: &str, role: Role) -> AuthenticatedUser {
        AuthenticatedUser { email: email.into(), role }
    }

    fn form(content: &str, files: &[&str]) -> QuestionForm {
        QuestionForm {
            title: None,
            content: content.into(),
            files: files
                .iter()
                .map(|name| UploadedFile {
                    filename: name.to_string(),
                    bytes: bytes::Bytes::from_static(b"data"),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_sequential_and_follow_max() {
        let f = fixture();
        let stu = user("stu1@u.edu", Role::Student);
        for n in 1..=3 {
            assert_eq!(f.svc.create(&stu, form(&format!("q{n}"), &[])).await.unwrap().id, n);
        }

        assert!(f.svc.delete(&stu, 2).await.unwrap());
        assert_eq!(f.svc.create(&stu, form("q4", &[])).await.unwrap().id, 4);

        let ids: Vec<i64> = f.svc.list(&stu).await.unwrap().iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[tokio::test]
    async fn test_edit_appends_attachments() {
        let f = fixture();
        let stu = user("stu1@u.edu", Role::Student);

        let q = f.svc.create(&stu, form("a", &["x.txt"])).await.unwrap();
        assert_eq!(q.attachments, vec!["x.txt"]);

        let q = f.svc.edit(&stu, q.id, form("b", &["y.txt"])).await.unwrap();
        assert_eq!(q.content, "b");
        assert_eq!(q.attachments, vec!["x.txt", "y.txt"]);
        assert_eq!(f.uploads.stored_names().await.unwrap(), vec!["x.txt", "y.txt"]);
    }

    #[tokio::test]
    async fn test_ownership_rules() {
        let f = fixture();
        let author = user("stu1@u.edu", Role::Student);
        let other = user("stu2@u.edu", Role::Student);
        let prof = user("prof@u.edu", Role::Professor);

        let q = f.svc.create(&author, form("mine", &[])).await.unwrap();

        assert!(matches!(f.svc.edit(&other, q.id, form("hijack", &[])).await, Err(AppError::AccessDenied)));
        assert!(matches!(f.svc.delete(&other, q.id).await, Err(AppError::AccessDenied)));
        assert_eq!(f.svc.list(&other).await.unwrap()[0].content, "mine");

        assert_eq!(f.svc.edit(&author, q.id, form("mine v2", &[])).await.unwrap().content, "mine v2");
        assert_eq!(f.svc.edit(&prof, q.id, form("moderated", &[])).await.unwrap().content, "moderated");
        assert_eq!(f.svc.list(&prof).await.unwrap()[0].author_email, "stu1@u.edu");

        assert!(f.svc.delete(&prof, q.id).await.unwrap());
        assert!(f.svc.list(&author).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_author_can_delete_own_question() {
        let f = fixture();
        let author = user("stu1@u.edu", Role::Student);
        let q = f.svc.create(&author, form("bye", &[])).await.unwrap();
        assert!(f.svc.delete(&author, q.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_denied_edit_stores_no_files() {
        let f = fixture();
        let author = user("stu1@u.edu", Role::Student);
        let other = user("stu2@u.edu", Role::Student);
        let q = f.svc.create(&author, form("mine", &[])).await.unwrap();

        let _ = f.svc.edit(&other, q.id, form("x", &["evil.sh"])).await;
        assert!(f.uploads.stored_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_question() {
        let f = fixture();
        let stu = user("stu1@u.edu", Role::Student);
        assert!(matches!(f.svc.edit(&stu, 42, form("x", &[])).await, Err(AppError::NotFound(_))));
        assert!(!f.svc.delete(&stu, 42).await.unwrap());
    }

    #[tokio::test]
    async fn test_title_is_kept_unless_resent() {
        let f = fixture();
        let stu = user("stu1@u.edu", Role::Student);
        let mut first = form("How do I register?", &[]);
        first.title = Some(" Registration ".into());
        let q = f.svc.create(&stu, first).await.unwrap();
        assert_eq!(q.title, "Registration");

        let q = f.svc.edit(&stu, q.id, form("Found it", &[])).await.unwrap();
        assert_eq!(q.title, "Registration");
    }

    #[tokio::test]
    async fn test_blank_content_rejected() {
        let f = fixture();
        let stu = user("stu1@u.edu", Role::Student);
        assert!(matches!(f.svc.create(&stu, form("   ", &[])).await, Err(AppError::BadRequest(_))));
    }
}
