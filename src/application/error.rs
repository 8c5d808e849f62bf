use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{
        pagination::PaginationError,
        repos::{IdentityError, RepoError, SessionStoreError},
    },
    domain::{archive::ArchiveError, error::DomainError},
    infra::error::InfraError,
};

/// Error message chain collected for logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self { source, messages }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    SessionStore(#[from] SessionStoreError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("sign-in required")]
    Unauthenticated,
    #[error("not permitted: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::Domain(DomainError::NotFound { .. }) | AppError::Repo(RepoError::NotFound)
        )
    }

    /// Short, user-facing summary of the failure class.
    pub fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::Repo(RepoError::NotFound) => {
                "Article not found"
            }
            AppError::Domain(DomainError::Validation { .. })
            | AppError::Pagination(_)
            | AppError::Validation(_)
            | AppError::Repo(RepoError::InvalidInput { .. }) => "Request could not be processed",
            AppError::Archive(_) => "Archive data is malformed",
            AppError::Unauthenticated
            | AppError::Identity(IdentityError::Rejected(_))
            | AppError::Repo(RepoError::Unauthorized) => "Please sign in again",
            AppError::Forbidden(_) => "You do not have permission to do that",
            AppError::Repo(RepoError::Transport(_))
            | AppError::Identity(IdentityError::Transport(_)) => "Remote service unreachable",
            AppError::Repo(RepoError::Remote { .. } | RepoError::Decode(_))
            | AppError::Identity(IdentityError::Remote { .. } | IdentityError::Decode(_)) => {
                "Remote service returned an error"
            }
            AppError::SessionStore(_) => "Stored session could not be accessed",
            AppError::Infra(InfraError::Configuration { .. }) => "Configuration is invalid",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Http(_)) => "HTTP client could not be built",
            AppError::Infra(InfraError::Io(_)) => "I/O failure",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_error("application::error::AppError", self)
    }
}
