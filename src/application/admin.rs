//! Editor operations. Every call takes the caller's validated session.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::application::error::AppError;
use crate::application::repos::{ArticlesWriteRepo, RepoError};
use crate::domain::entities::{ArticlePatch, ArticleRecord, NewArticle};
use crate::domain::error::DomainError;
use crate::domain::session::{AdminPolicy, Session};
use crate::domain::types::ArticleId;

#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub tag: Option<String>,
    pub publish: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteConfirmation {
    pub id: ArticleId,
    pub deleted: bool,
}

#[derive(Clone)]
pub struct AdminArticleService {
    writer: Arc<dyn ArticlesWriteRepo>,
    policy: AdminPolicy,
}

impl AdminArticleService {
    pub fn new(writer: Arc<dyn ArticlesWriteRepo>, policy: AdminPolicy) -> Self {
        Self { writer, policy }
    }

    pub fn is_admin(&self, session: &Session) -> bool {
        self.policy.is_admin(session)
    }

    pub async fn create(
        &self,
        session: &Session,
        draft: ArticleDraft,
    ) -> Result<ArticleRecord, AppError> {
        ensure_non_empty(&draft.title, "title")?;
        ensure_non_empty(&draft.content, "content")?;

        let article = NewArticle {
            title: draft.title.trim().to_string(),
            excerpt: non_blank(draft.excerpt),
            content: draft.content,
            tag: non_blank(draft.tag),
            is_published: draft.publish,
            user_id: Some(session.user_id()),
        };

        let record = self.writer.create_article(session, &article).await?;
        info!(
            article_id = %record.id,
            user_id = %session.user_id(),
            published = record.is_published,
            "article created"
        );
        Ok(record)
    }

    pub async fn update(
        &self,
        session: &Session,
        id: ArticleId,
        patch: ArticlePatch,
    ) -> Result<ArticleRecord, AppError> {
        if patch.is_empty() {
            return Err(AppError::validation("nothing to update"));
        }
        if let Some(title) = patch.title.as_deref() {
            ensure_non_empty(title, "title")?;
        }
        if let Some(content) = patch.content.as_deref() {
            ensure_non_empty(content, "content")?;
        }

        let record = self
            .writer
            .update_article(session, id, &patch)
            .await
            .map_err(|err| not_found_as_domain(err, id))?;
        info!(article_id = %id, user_id = %session.user_id(), "article updated");
        Ok(record)
    }

    /// Delete an article owned by the caller, or any article for an admin.
    pub async fn delete(
        &self,
        session: &Session,
        id: ArticleId,
    ) -> Result<DeleteConfirmation, AppError> {
        let owner = self
            .writer
            .find_owner(session, id)
            .await?
            .ok_or_else(|| DomainError::not_found("article", id))?;

        let is_owner = owner.user_id == Some(session.user_id());
        if !is_owner && !self.policy.is_admin(session) {
            return Err(AppError::forbidden(format!(
                "article {id} belongs to another author"
            )));
        }

        self.writer
            .delete_article(session, id)
            .await
            .map_err(|err| not_found_as_domain(err, id))?;
        info!(article_id = %id, user_id = %session.user_id(), as_owner = is_owner, "article deleted");
        Ok(DeleteConfirmation { id, deleted: true })
    }
}

fn not_found_as_domain(err: RepoError, id: ArticleId) -> AppError {
    match err {
        RepoError::NotFound => DomainError::not_found("article", id).into(),
        other => other.into(),
    }
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::datetime;
    use uuid::Uuid;

    use crate::application::repos::ArticleOwner;
    use crate::domain::session::SessionUser;

    #[derive(Default)]
    struct RecordingWriter {
        owner: Option<ArticleOwner>,
        created: Mutex<Vec<NewArticle>>,
        deleted: Mutex<Vec<ArticleId>>,
    }

    fn stored(id: ArticleId, article: &NewArticle) -> ArticleRecord {
        ArticleRecord {
            id,
            title: article.title.clone(),
            excerpt: article.excerpt.clone(),
            content: article.content.clone(),
            tag: article.tag.clone(),
            is_published: article.is_published,
            user_id: article.user_id,
            created_at: datetime!(2025-02-02 10:00 UTC),
            updated_at: None,
        }
    }

    #[async_trait]
    impl ArticlesWriteRepo for RecordingWriter {
        async fn create_article(
            &self,
            _session: &Session,
            article: &NewArticle,
        ) -> Result<ArticleRecord, RepoError> {
            self.created.lock().unwrap().push(article.clone());
            Ok(stored(ArticleId(100), article))
        }

        async fn update_article(
            &self,
            _session: &Session,
            _id: ArticleId,
            _patch: &ArticlePatch,
        ) -> Result<ArticleRecord, RepoError> {
            Err(RepoError::NotFound)
        }

        async fn delete_article(&self, _session: &Session, id: ArticleId) -> Result<(), RepoError> {
            self.deleted.lock().unwrap().push(id);
            Ok(())
        }

        async fn find_owner(
            &self,
            _session: &Session,
            _id: ArticleId,
        ) -> Result<Option<ArticleOwner>, RepoError> {
            Ok(self.owner)
        }
    }

    fn session(id: u128, email: &str) -> Session {
        Session {
            access_token: "token".into(),
            refresh_token: "refresh".into(),
            expires_at: datetime!(2099-01-01 0:00 UTC),
            user: SessionUser {
                id: Uuid::from_u128(id),
                email: Some(email.into()),
            },
        }
    }

    fn service(writer: RecordingWriter, admins: &[&str]) -> (AdminArticleService, Arc<RecordingWriter>) {
        let writer = Arc::new(writer);
        let service = AdminArticleService::new(writer.clone(), AdminPolicy::new(admins.iter()));
        (service, writer)
    }

    #[tokio::test]
    async fn create_stamps_author_and_trims_optional_fields() {
        let (service, writer) = service(RecordingWriter::default(), &[]);
        let author = session(1, "author@example.com");

        let record = service
            .create(
                &author,
                ArticleDraft {
                    title: "  Hello  ".into(),
                    excerpt: Some("   ".into()),
                    content: "Body".into(),
                    tag: Some(" rust ".into()),
                    publish: true,
                },
            )
            .await
            .expect("created");

        assert_eq!(record.user_id, Some(Uuid::from_u128(1)));
        let created = writer.created.lock().unwrap();
        assert_eq!(created[0].title, "Hello");
        assert_eq!(created[0].excerpt, None);
        assert_eq!(created[0].tag.as_deref(), Some("rust"));
    }

    #[tokio::test]
    async fn create_requires_title_and_content() {
        let (service, writer) = service(RecordingWriter::default(), &[]);
        let author = session(1, "author@example.com");

        let err = service
            .create(
                &author,
                ArticleDraft {
                    title: "Title".into(),
                    content: " ".into(),
                    ..Default::default()
                },
            )
            .await
            .expect_err("empty content");
        assert!(matches!(
            err,
            AppError::Domain(DomainError::Validation { field: "content", .. })
        ));
        assert!(writer.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_empty_patch_and_maps_missing_rows() {
        let (service, _) = service(RecordingWriter::default(), &[]);
        let author = session(1, "author@example.com");

        let err = service
            .update(&author, ArticleId(3), ArticlePatch::default())
            .await
            .expect_err("empty patch");
        assert!(matches!(err, AppError::Validation(_)));

        let patch = ArticlePatch {
            is_published: Some(false),
            ..Default::default()
        };
        let err = service
            .update(&author, ArticleId(3), patch)
            .await
            .expect_err("missing row");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn owner_can_delete() {
        let (service, writer) = service(
            RecordingWriter {
                owner: Some(ArticleOwner {
                    user_id: Some(Uuid::from_u128(1)),
                }),
                ..Default::default()
            },
            &["admin@example.com"],
        );

        let confirmation = service
            .delete(&session(1, "author@example.com"), ArticleId(9))
            .await
            .expect("deleted");
        assert!(confirmation.deleted);
        assert_eq!(writer.deleted.lock().unwrap().as_slice(), &[ArticleId(9)]);
    }

    #[tokio::test]
    async fn strangers_cannot_delete_but_admins_can() {
        let (service, writer) = service(
            RecordingWriter {
                owner: Some(ArticleOwner {
                    user_id: Some(Uuid::from_u128(1)),
                }),
                ..Default::default()
            },
            &["admin@example.com"],
        );

        let err = service
            .delete(&session(2, "guest@example.com"), ArticleId(9))
            .await
            .expect_err("forbidden");
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(writer.deleted.lock().unwrap().is_empty());

        service
            .delete(&session(3, "admin@example.com"), ArticleId(9))
            .await
            .expect("admin delete");
        assert_eq!(writer.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_unknown_article_is_not_found() {
        let (service, _) = service(RecordingWriter::default(), &[]);
        let err = service
            .delete(&session(1, "author@example.com"), ArticleId(404))
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
    }
}
