//! HTTP adapter for a hosted Supabase project: PostgREST for article rows
//! and GoTrue for identity.

mod articles;
mod auth;

use reqwest::header::HeaderValue;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::SupabaseSettings;
use crate::infra::error::InfraError;
use crate::util::links::with_trailing_slash;

pub use articles::parse_content_range_total;

const REST_PREFIX: &str = "rest/v1/";
const AUTH_PREFIX: &str = "auth/v1/";

#[derive(Clone, Debug)]
pub struct SupabaseClient {
    http: Client,
    rest_base: Url,
    auth_base: Url,
    anon_key: String,
    apikey: HeaderValue,
}

impl SupabaseClient {
    pub fn new(settings: &SupabaseSettings) -> Result<Self, InfraError> {
        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::http(err.to_string()))?;

        let mut apikey = HeaderValue::from_str(&settings.anon_key).map_err(|_| {
            InfraError::configuration("supabase anon key is not a valid HTTP header value")
        })?;
        apikey.set_sensitive(true);

        let base = with_trailing_slash(settings.url.clone());
        let rest_base = base
            .join(REST_PREFIX)
            .map_err(|err| InfraError::configuration(format!("invalid supabase url: {err}")))?;
        let auth_base = base
            .join(AUTH_PREFIX)
            .map_err(|err| InfraError::configuration(format!("invalid supabase url: {err}")))?;

        Ok(Self {
            http,
            rest_base,
            auth_base,
            anon_key: settings.anon_key.clone(),
            apikey,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("quire/", env!("CARGO_PKG_VERSION"))
    }

    fn rest_url(&self, table: &str, query: &[(&str, String)]) -> Result<Url, url::ParseError> {
        let mut url = self.rest_base.join(table)?;
        append_query(&mut url, query);
        Ok(url)
    }

    fn auth_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, url::ParseError> {
        let mut url = self.auth_base.join(path)?;
        append_query(&mut url, query);
        Ok(url)
    }

    /// Start a request carrying the project key and either the caller's
    /// access token or, for anonymous reads, the project key as bearer.
    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        debug!(%method, path = url.path(), "supabase request");
        // An unusable token makes `send` fail with a builder error.
        self.http
            .request(method, url)
            .header("apikey", self.apikey.clone())
            .bearer_auth(token)
    }
}

fn append_query(url: &mut Url, query: &[(&str, String)]) {
    if query.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (key, value) in query {
        pairs.append_pair(key, value);
    }
}

/// Error body shapes returned by PostgREST and GoTrue.
#[derive(Debug, Default, Deserialize)]
struct RemoteErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl RemoteErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.msg)
            .or(self.error_description)
            .or(self.error)
    }
}

/// Drain a failed response into its status and best-effort message.
async fn failure_details(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<RemoteErrorBody>(&text)
        .ok()
        .and_then(RemoteErrorBody::into_message)
        .unwrap_or(text);
    debug!(status = status.as_u16(), %message, "supabase request failed");
    (status, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings(url: &str) -> SupabaseSettings {
        SupabaseSettings {
            url: Url::parse(url).expect("url"),
            anon_key: "anon".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn endpoints_keep_path_prefixes() {
        let client = SupabaseClient::new(&settings("https://proj.supabase.co/base")).expect("client");
        let url = client
            .rest_url("articles", &[("id", "eq.4".to_string())])
            .expect("url");
        assert_eq!(url.as_str(), "https://proj.supabase.co/base/rest/v1/articles?id=eq.4");

        let auth = client.auth_url("token", &[]).expect("url");
        assert_eq!(auth.as_str(), "https://proj.supabase.co/base/auth/v1/token");
    }

    #[test]
    fn anon_key_must_be_a_header_value() {
        let mut bad = settings("https://proj.supabase.co");
        bad.anon_key = "line\nbreak".into();
        let err = SupabaseClient::new(&bad).expect_err("invalid key");
        assert!(matches!(err, InfraError::Configuration { .. }));
    }

    #[test]
    fn error_body_prefers_message_fields() {
        let body: RemoteErrorBody =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
                .expect("body");
        assert_eq!(body.into_message().as_deref(), Some("Invalid login credentials"));

        let body: RemoteErrorBody =
            serde_json::from_str(r#"{"code":"42501","message":"permission denied"}"#).expect("body");
        assert_eq!(body.into_message().as_deref(), Some("permission denied"));
    }
}
