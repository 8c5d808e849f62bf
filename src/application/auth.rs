//! Admin sign-in flow: password and magic-link login, sign-up, logout and
//! password recovery, with the session kept as an explicit value.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use url::Url;

use crate::application::error::AppError;
use crate::application::repos::{IdentityError, IdentityProvider, SessionStore, SignUpResult};
use crate::domain::session::{Session, SessionUser};

pub const MIN_PASSWORD_LEN: usize = 6;
const MAGIC_LINK_PATH: &str = "auth/callback";
const PASSWORD_RESET_PATH: &str = "update-password";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignUpOutcome {
    SignedIn { user: SessionUser },
    ConfirmationPending { user: SessionUser },
}

#[derive(Clone)]
pub struct AuthService {
    identity: Arc<dyn IdentityProvider>,
    sessions: Arc<dyn SessionStore>,
    redirect_base: Option<Url>,
}

impl AuthService {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        sessions: Arc<dyn SessionStore>,
        redirect_base: Option<Url>,
    ) -> Self {
        Self {
            identity,
            sessions,
            redirect_base,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let email = normalize_email(email)?;
        ensure_password_present(password)?;

        let session = self.identity.sign_in_with_password(&email, password).await?;
        self.sessions.save(&session).await?;
        info!(user_id = %session.user_id(), "signed in");
        Ok(session)
    }

    pub async fn send_magic_link(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email)?;
        let redirect = self.redirect(MAGIC_LINK_PATH);
        self.identity
            .send_magic_link(&email, redirect.as_deref())
            .await?;
        info!(redirect = redirect.as_deref().unwrap_or("-"), "magic link sent");
        Ok(())
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        let email = normalize_email(email)?;
        ensure_password_strength(password)?;

        let redirect = self.redirect(MAGIC_LINK_PATH);
        let outcome = match self
            .identity
            .sign_up(&email, password, redirect.as_deref())
            .await?
        {
            SignUpResult::Session(session) => {
                self.sessions.save(&session).await?;
                SignUpOutcome::SignedIn { user: session.user }
            }
            SignUpResult::ConfirmationPending(user) => SignUpOutcome::ConfirmationPending { user },
        };
        info!(?outcome, "sign-up completed");
        Ok(outcome)
    }

    /// Revoke the stored session. The local copy is always cleared.
    pub async fn logout(&self) -> Result<bool, AppError> {
        let Some(session) = self.sessions.load().await? else {
            return Ok(false);
        };

        if let Err(err) = self.identity.sign_out(&session.access_token).await {
            warn!(error = %err, "remote sign-out failed; clearing local session anyway");
        }
        self.sessions.clear().await?;
        info!(user_id = %session.user_id(), "signed out");
        Ok(true)
    }

    /// Load the stored session, refreshing it when expired and confirming it
    /// with the identity provider. Sessions the provider rejects are dropped.
    pub async fn current_session(&self) -> Result<Option<Session>, AppError> {
        let Some(mut session) = self.sessions.load().await? else {
            return Ok(None);
        };

        if session.is_expired(OffsetDateTime::now_utc()) {
            match self.identity.refresh_session(&session.refresh_token).await {
                Ok(refreshed) => {
                    self.sessions.save(&refreshed).await?;
                    info!(user_id = %refreshed.user_id(), "session refreshed");
                    session = refreshed;
                }
                Err(IdentityError::Rejected(reason)) => {
                    info!(%reason, "stored session could not be refreshed");
                    self.sessions.clear().await?;
                    return Ok(None);
                }
                Err(err) => return Err(err.into()),
            }
        }

        match self.identity.fetch_user(&session.access_token).await {
            Ok(user) => {
                session.user = user;
                Ok(Some(session))
            }
            Err(IdentityError::Rejected(reason)) => {
                info!(%reason, "stored session rejected by identity provider");
                self.sessions.clear().await?;
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Session for public reads. An unreachable identity provider downgrades
    /// the caller to an anonymous reader instead of failing the read.
    pub async fn session_for_reading(&self) -> Result<Option<Session>, AppError> {
        match self.current_session().await {
            Err(AppError::Identity(err)) => {
                warn!(error = %err, "identity provider unavailable; reading anonymously");
                Ok(None)
            }
            other => other,
        }
    }

    pub async fn require_session(&self) -> Result<Session, AppError> {
        self.current_session()
            .await?
            .ok_or(AppError::Unauthenticated)
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email)?;
        let redirect = self.redirect(PASSWORD_RESET_PATH);
        self.identity
            .send_password_reset(&email, redirect.as_deref())
            .await?;
        info!("password reset mail requested");
        Ok(())
    }

    pub async fn update_password(
        &self,
        session: &Session,
        new_password: &str,
    ) -> Result<SessionUser, AppError> {
        ensure_password_strength(new_password)?;
        let user = self
            .identity
            .update_password(&session.access_token, new_password)
            .await?;
        info!(user_id = %user.id, "password updated");
        Ok(user)
    }

    fn redirect(&self, path: &str) -> Option<String> {
        self.redirect_base
            .as_ref()
            .and_then(|base| base.join(path).ok())
            .map(String::from)
    }
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let trimmed = email.trim();
    let mut parts = trimmed.split('@');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(local), Some(domain), None) if !local.is_empty() && !domain.is_empty()
    );
    if !valid {
        return Err(AppError::validation(format!(
            "`{trimmed}` is not a valid email address"
        )));
    }
    Ok(trimmed.to_string())
}

fn ensure_password_present(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::validation("password must not be empty"));
    }
    Ok(())
}

fn ensure_password_strength(password: &str) -> Result<(), AppError> {
    ensure_password_present(password)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
