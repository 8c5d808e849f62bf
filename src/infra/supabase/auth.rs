use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::{SupabaseClient, failure_details};
use crate::application::repos::{IdentityError, IdentityProvider, SignUpResult};
use crate::domain::session::{Session, SessionUser};

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserPayload> for SessionUser {
    fn from(payload: UserPayload) -> Self {
        SessionUser {
            id: payload.id,
            email: payload.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserPayload,
}

impl TokenPayload {
    /// `expires_at` is absolute unix seconds and wins over the relative
    /// `expires_in`.
    fn into_session(self, now: OffsetDateTime) -> Result<Session, IdentityError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => OffsetDateTime::from_unix_timestamp(at)
                .map_err(|err| IdentityError::Decode(format!("invalid expires_at: {err}")))?,
            (None, Some(seconds)) => now
                .checked_add(Duration::seconds(seconds))
                .ok_or_else(|| IdentityError::Decode(format!("expires_in {seconds} is out of range")))?,
            (None, None) => {
                return Err(IdentityError::Decode(
                    "token response carries no expiry".into(),
                ));
            }
        };

        Ok(Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user.into(),
        })
    }
}

impl SupabaseClient {
    fn identity_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, IdentityError> {
        self.auth_url(path, query)
            .map_err(|err| IdentityError::Decode(format!("invalid identity url: {err}")))
    }

    async fn identity_call(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response, IdentityError> {
        let mut request = self.request(method, url, bearer);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| IdentityError::Transport(err.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }
        let (status, message) = failure_details(response).await;
        Err(map_status(status, message))
    }

    async fn identity_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, IdentityError> {
        self.identity_call(method, url, bearer, body)
            .await?
            .json::<T>()
            .await
            .map_err(|err| IdentityError::Decode(err.to_string()))
    }

    async fn grant(&self, grant_type: &str, body: Value) -> Result<Session, IdentityError> {
        let url = self.identity_url("token", &[("grant_type", grant_type.to_string())])?;
        let payload: TokenPayload = self
            .identity_json(Method::POST, url, None, Some(body))
            .await?;
        payload.into_session(OffsetDateTime::now_utc())
    }
}

fn map_status(status: StatusCode, message: String) -> IdentityError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::UNPROCESSABLE_ENTITY => IdentityError::Rejected(message),
        other => IdentityError::Remote {
            status: other.as_u16(),
            message,
        },
    }
}

fn redirect_query(redirect_to: Option<&str>) -> Vec<(&'static str, String)> {
    redirect_to
        .map(|target| vec![("redirect_to", target.to_string())])
        .unwrap_or_default()
}

/// Sign-up answers with a token payload when the project auto-confirms,
/// and with the bare user otherwise.
fn parse_sign_up(body: Value, now: OffsetDateTime) -> Result<SignUpResult, IdentityError> {
    if body.get("access_token").is_some() {
        let payload: TokenPayload = serde_json::from_value(body)
            .map_err(|err| IdentityError::Decode(err.to_string()))?;
        return Ok(SignUpResult::Session(payload.into_session(now)?));
    }

    let user = match body.get("user") {
        Some(user) if !user.is_null() => user.clone(),
        _ => body,
    };
    let user: UserPayload =
        serde_json::from_value(user).map_err(|err| IdentityError::Decode(err.to_string()))?;
    Ok(SignUpResult::ConfirmationPending(user.into()))
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        self.grant("password", json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, IdentityError> {
        self.grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }

    async fn fetch_user(&self, access_token: &str) -> Result<SessionUser, IdentityError> {
        let url = self.identity_url("user", &[])?;
        let user: UserPayload = self
            .identity_json(Method::GET, url, Some(access_token), None)
            .await?;
        Ok(user.into())
    }

    async fn send_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError> {
        let url = self.identity_url("otp", &redirect_query(redirect_to))?;
        // Magic links only sign in existing editors.
        let body = json!({ "email": email, "create_user": false });
        self.identity_call(Method::POST, url, None, Some(body))
            .await?;
        Ok(())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: Option<&str>,
    ) -> Result<SignUpResult, IdentityError> {
        let url = self.identity_url("signup", &redirect_query(redirect_to))?;
        let body: Value = self
            .identity_json(
                Method::POST,
                url,
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await?;
        parse_sign_up(body, OffsetDateTime::now_utc())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let url = self.identity_url("logout", &[])?;
        self.identity_call(Method::POST, url, Some(access_token), None)
            .await?;
        Ok(())
    }

    async fn send_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), IdentityError> {
        let url = self.identity_url("recover", &redirect_query(redirect_to))?;
        self.identity_call(Method::POST, url, None, Some(json!({ "email": email })))
            .await?;
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<SessionUser, IdentityError> {
        let url = self.identity_url("user", &[])?;
        let user: UserPayload = self
            .identity_json(
                Method::PUT,
                url,
                Some(access_token),
                Some(json!({ "password": password })),
            )
            .await?;
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const USER: &str = "7b7b0a8e-0f43-4a4f-9d53-2f0f3b1c8a11";

    #[test]
    fn absolute_expiry_wins_over_relative() {
        let payload: TokenPayload = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "expires_at": 1_900_000_000,
            "user": { "id": USER, "email": "editor@example.com" }
        }))
        .expect("payload");

        let session = payload
            .into_session(datetime!(2024-01-01 0:00 UTC))
            .expect("session");
        assert_eq!(session.expires_at.unix_timestamp(), 1_900_000_000);
        assert_eq!(session.user.email.as_deref(), Some("editor@example.com"));
    }

    #[test]
    fn relative_expiry_counts_from_now() {
        let payload: TokenPayload = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 60,
            "user": { "id": USER }
        }))
        .expect("payload");

        let session = payload
            .into_session(datetime!(2024-01-01 0:00 UTC))
            .expect("session");
        assert_eq!(session.expires_at, datetime!(2024-01-01 0:01 UTC));
    }

    #[test]
    fn oversized_relative_expiry_is_a_decode_error() {
        let payload: TokenPayload = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": i64::MAX,
            "user": { "id": USER }
        }))
        .expect("payload");

        let err = payload
            .into_session(datetime!(2024-01-01 0:00 UTC))
            .expect_err("overflowing expiry");
        assert!(matches!(err, IdentityError::Decode(_)));
    }

    #[test]
    fn sign_up_without_tokens_is_pending() {
        let now = datetime!(2024-01-01 0:00 UTC);
        let pending = parse_sign_up(
            json!({ "id": USER, "email": "new@example.com", "confirmation_sent_at": "2024-01-01T00:00:00Z" }),
            now,
        )
        .expect("pending");
        assert!(matches!(pending, SignUpResult::ConfirmationPending(ref user) if user.email.as_deref() == Some("new@example.com")));

        let signed_in = parse_sign_up(
            json!({
                "access_token": "a",
                "refresh_token": "r",
                "expires_in": 3600,
                "user": { "id": USER }
            }),
            now,
        )
        .expect("session");
        assert!(matches!(signed_in, SignUpResult::Session(_)));
    }

    #[test]
    fn client_errors_are_rejections() {
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, "Invalid login credentials".into()),
            IdentityError::Rejected(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, "down".into()),
            IdentityError::Remote { status: 502, .. }
        ));
    }
}
