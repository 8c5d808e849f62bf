//! Traits describing the remote data, identity and session adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, PageSlice};
use crate::domain::articles::YearRange;
use crate::domain::entities::{
    ArticleFacet, ArticlePatch, ArticleRecord, ArticleSummary, NewArticle,
};
use crate::domain::session::{Session, SessionUser};
use crate::domain::types::ArticleId;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote service rejected the request (status {status}): {message}")]
    Remote { status: u16, message: String },
    #[error("resource not found")]
    NotFound,
    #[error("not authorized for this operation")]
    Unauthorized,
    #[error("failed to decode remote response: {0}")]
    Decode(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Filter handed to the data adapter, with the year already resolved to
/// UTC bounds in the site timezone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    pub tag: Option<String>,
    pub created: Option<YearRange>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleOwner {
    pub user_id: Option<Uuid>,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    /// Published articles matching `query`, newest first.
    async fn list_published(
        &self,
        query: &ArticleQuery,
        page: PageRequest,
    ) -> Result<PageSlice<ArticleRecord>, RepoError>;

    async fn list_all_published(&self) -> Result<Vec<ArticleRecord>, RepoError>;

    async fn list_facets(&self) -> Result<Vec<ArticleFacet>, RepoError>;

    async fn list_archive_summaries(&self) -> Result<Vec<ArticleSummary>, RepoError>;

    /// Look up a single article. Row visibility is decided remotely; the
    /// session, when present, is forwarded so drafts of its owner resolve.
    async fn find_by_id(
        &self,
        id: ArticleId,
        session: Option<&Session>,
    ) -> Result<Option<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    async fn create_article(
        &self,
        session: &Session,
        article: &NewArticle,
    ) -> Result<ArticleRecord, RepoError>;

    async fn update_article(
        &self,
        session: &Session,
        id: ArticleId,
        patch: &ArticlePatch,
    ) -> Result<ArticleRecord, RepoError>;

    async fn delete_article(&self, session: &Session, id: ArticleId) -> Result<(), RepoError>;

    async fn find_owner(
        &self,
        session: &Session,
        id: ArticleId,
    ) -> Result<Option<ArticleOwner>, RepoError>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("credentials or token rejected: {0}")]
    Rejected(String),
    #[error("identity request failed: {0}")]
    Transport(String),
    #[error("identity service error (status {status}): {message}")]
    Remote { status: u16, message: String },
    #[error("failed to decode identity response: {0}")]
    Decode(String),
}

/// Result of a sign-up: either an immediate session, or a pending
/// confirmation mail when the project requires email verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpResult {
    Session(Session),
    ConfirmationPending(SessionUser),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError>;

    async fn fetch_user(&self, access_token: &str) -> Result<SessionUser, IdentityError>;

    async fn send_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpResult, IdentityError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError>;

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<SessionUser, IdentityError>;
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session storage failed: {0}")]
    Io(String),
    #[error("stored session is unreadable: {0}")]
    Corrupt(String),
}

/// Persistence for the signed-in session between invocations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, SessionStoreError>;

    async fn save(&self, session: &Session) -> Result<(), SessionStoreError>;

    async fn clear(&self) -> Result<(), SessionStoreError>;
}
