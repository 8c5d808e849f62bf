use async_trait::async_trait;
use reqwest::header::CONTENT_RANGE;
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{SupabaseClient, failure_details};
use crate::application::pagination::{PageRequest, PageSlice};
use crate::application::repos::{
    ArticleOwner, ArticleQuery, ArticlesRepo, ArticlesWriteRepo, RepoError,
};
use crate::domain::entities::{
    ArticleFacet, ArticlePatch, ArticleRecord, ArticleSummary, NewArticle,
};
use crate::domain::session::Session;
use crate::domain::types::ArticleId;
use crate::util::timezone::format_utc;

const TABLE: &str = "articles";
const NEWEST_FIRST: &str = "created_at.desc,id.desc";
const SUMMARY_COLUMNS: &str = "id,title,created_at";
const FACET_COLUMNS: &str = "created_at,tag";
const SEARCH_COLUMNS: [&str; 3] = ["title", "excerpt", "content"];

struct Rows<T> {
    items: Vec<T>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OwnerRow {
    #[serde(default)]
    user_id: Option<Uuid>,
}

impl SupabaseClient {
    async fn rest_rows<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&str>,
        prefer: Option<&str>,
        body: Option<Value>,
    ) -> Result<Rows<T>, RepoError> {
        let mut request = self.request(method, url, bearer);
        if let Some(prefer) = prefer {
            request = request.header("Prefer", prefer);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(RepoError::from_transport)?;
        if !response.status().is_success() {
            let (status, message) = failure_details(response).await;
            return Err(map_status(status, message));
        }

        let total = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total);
        let items = response
            .json::<Vec<T>>()
            .await
            .map_err(|err| RepoError::Decode(err.to_string()))?;
        Ok(Rows { items, total })
    }

    fn articles_url(&self, query: &[(&str, String)]) -> Result<Url, RepoError> {
        self.rest_url(TABLE, query)
            .map_err(|err| RepoError::invalid_input(format!("invalid request url: {err}")))
    }
}

fn map_status(status: StatusCode, message: String) -> RepoError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RepoError::Unauthorized,
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => RepoError::NotFound,
        other => RepoError::Remote {
            status: other.as_u16(),
            message,
        },
    }
}

/// Total row count from a `Content-Range` header such as `0-9/42` or `*/0`.
pub fn parse_content_range_total(raw: &str) -> Option<u64> {
    let (_, total) = raw.trim().rsplit_once('/')?;
    total.parse().ok()
}

fn id_filter(id: ArticleId) -> (&'static str, String) {
    ("id", format!("eq.{id}"))
}

/// Query parameters for the published listing, in a stable order.
fn listing_params(query: &ArticleQuery) -> Result<Vec<(&'static str, String)>, RepoError> {
    let mut params = vec![
        ("select", "*".to_string()),
        ("is_published", "eq.true".to_string()),
        ("order", NEWEST_FIRST.to_string()),
    ];

    if let Some(tag) = query.tag.as_deref() {
        params.push(("tag", format!("eq.{tag}")));
    }

    if let Some(range) = query.created {
        let start = format_utc(range.start).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        let end = format_utc(range.end).map_err(|err| RepoError::invalid_input(err.to_string()))?;
        params.push(("created_at", format!("gte.{start}")));
        params.push(("created_at", format!("lt.{end}")));
    }

    if let Some(term) = query.search.as_deref() {
        params.push(("or", search_clause(term)));
    }

    Ok(params)
}

/// Case-insensitive substring match over every searchable column. The term
/// is double-quoted so PostgREST reserved characters stay literal.
fn search_clause(term: &str) -> String {
    let quoted = quote_filter_value(&format!("*{term}*"));
    let conditions: Vec<String> = SEARCH_COLUMNS
        .iter()
        .map(|column| format!("{column}.ilike.{quoted}"))
        .collect();
    format!("({})", conditions.join(","))
}

fn quote_filter_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, RepoError> {
    serde_json::to_value(value).map_err(|err| RepoError::invalid_input(err.to_string()))
}

#[async_trait]
impl ArticlesRepo for SupabaseClient {
    async fn list_published(
        &self,
        query: &ArticleQuery,
        page: PageRequest,
    ) -> Result<PageSlice<ArticleRecord>, RepoError> {
        let mut params = listing_params(query)?;
        params.push(("offset", page.offset().to_string()));
        params.push(("limit", page.limit().to_string()));

        let url = self.articles_url(&params)?;
        let rows: Rows<ArticleRecord> = self
            .rest_rows(Method::GET, url, None, Some("count=exact"), None)
            .await?;

        let total = rows
            .total
            .unwrap_or_else(|| page.offset() + rows.items.len() as u64);
        debug!(returned = rows.items.len(), total, "fetched article page");
        Ok(PageSlice::new(rows.items, total))
    }

    async fn list_all_published(&self) -> Result<Vec<ArticleRecord>, RepoError> {
        let url = self.articles_url(&[
            ("select", "*".to_string()),
            ("is_published", "eq.true".to_string()),
            ("order", NEWEST_FIRST.to_string()),
        ])?;
        let rows = self.rest_rows(Method::GET, url, None, None, None).await?;
        Ok(rows.items)
    }

    async fn list_facets(&self) -> Result<Vec<ArticleFacet>, RepoError> {
        let url = self.articles_url(&[
            ("select", FACET_COLUMNS.to_string()),
            ("is_published", "eq.true".to_string()),
        ])?;
        let rows = self.rest_rows(Method::GET, url, None, None, None).await?;
        Ok(rows.items)
    }

    async fn list_archive_summaries(&self) -> Result<Vec<ArticleSummary>, RepoError> {
        let url = self.articles_url(&[
            ("select", SUMMARY_COLUMNS.to_string()),
            ("is_published", "eq.true".to_string()),
            ("order", NEWEST_FIRST.to_string()),
        ])?;
        let rows = self.rest_rows(Method::GET, url, None, None, None).await?;
        Ok(rows.items)
    }

    async fn find_by_id(
        &self,
        id: ArticleId,
        session: Option<&Session>,
    ) -> Result<Option<ArticleRecord>, RepoError> {
        let url = self.articles_url(&[
            ("select", "*".to_string()),
            id_filter(id),
            ("limit", "1".to_string()),
        ])?;
        let bearer = session.map(|session| session.access_token.as_str());
        let rows = self.rest_rows(Method::GET, url, bearer, None, None).await?;
        Ok(rows.items.into_iter().next())
    }
}

#[async_trait]
impl ArticlesWriteRepo for SupabaseClient {
    async fn create_article(
        &self,
        session: &Session,
        article: &NewArticle,
    ) -> Result<ArticleRecord, RepoError> {
        let url = self.articles_url(&[("select", "*".to_string())])?;
        let rows: Rows<ArticleRecord> = self
            .rest_rows(
                Method::POST,
                url,
                Some(&session.access_token),
                Some("return=representation"),
                Some(encode(article)?),
            )
            .await?;
        rows.items
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::Decode("insert returned no row".into()))
    }

    async fn update_article(
        &self,
        session: &Session,
        id: ArticleId,
        patch: &ArticlePatch,
    ) -> Result<ArticleRecord, RepoError> {
        let url = self.articles_url(&[id_filter(id), ("select", "*".to_string())])?;
        let rows: Rows<ArticleRecord> = self
            .rest_rows(
                Method::PATCH,
                url,
                Some(&session.access_token),
                Some("return=representation"),
                Some(encode(patch)?),
            )
            .await?;
        // Rows hidden by row-level security come back as an empty update.
        rows.items.into_iter().next().ok_or(RepoError::NotFound)
    }

    async fn delete_article(&self, session: &Session, id: ArticleId) -> Result<(), RepoError> {
        let url = self.articles_url(&[id_filter(id), ("select", "id".to_string())])?;
        let rows: Rows<Value> = self
            .rest_rows(
                Method::DELETE,
                url,
                Some(&session.access_token),
                Some("return=representation"),
                None,
            )
            .await?;
        if rows.items.is_empty() {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_owner(
        &self,
        session: &Session,
        id: ArticleId,
    ) -> Result<Option<ArticleOwner>, RepoError> {
        let url = self.articles_url(&[
            ("select", "user_id".to_string()),
            id_filter(id),
            ("limit", "1".to_string()),
        ])?;
        let rows: Rows<OwnerRow> = self
            .rest_rows(Method::GET, url, Some(&session.access_token), None, None)
            .await?;
        Ok(rows.items.into_iter().next().map(|row| ArticleOwner {
            user_id: row.user_id,
        }))
    }
}
