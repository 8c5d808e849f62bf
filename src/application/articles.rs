//! Public article retrieval: listing, detail, filter options and archive.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::debug;

use crate::application::error::AppError;
use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{ArticleQuery, ArticlesRepo};
use crate::domain::archive::{self, YearGroup};
use crate::domain::articles::{ArticleFilter, FilterOptions};
use crate::domain::entities::ArticleRecord;
use crate::domain::error::DomainError;
use crate::domain::session::Session;
use crate::domain::types::ArticleId;

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticlesRepo>,
    timezone: Tz,
    default_per_page: u32,
}

impl ArticleService {
    pub fn new(articles: Arc<dyn ArticlesRepo>, timezone: Tz, default_per_page: u32) -> Self {
        Self {
            articles,
            timezone,
            default_per_page,
        }
    }

    /// Build a page request, falling back to page 1 and the configured size.
    pub fn page_request(
        &self,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> Result<PageRequest, AppError> {
        let request = PageRequest::new(
            page.unwrap_or(1),
            per_page.unwrap_or(self.default_per_page),
        )?;
        Ok(request)
    }

    pub async fn list(
        &self,
        filter: &ArticleFilter,
        page: PageRequest,
    ) -> Result<Page<ArticleRecord>, AppError> {
        let query = ArticleQuery {
            tag: filter.tag.clone(),
            created: filter.year_range(self.timezone)?,
            search: filter.search.clone(),
        };

        let slice = self.articles.list_published(&query, page).await?;
        debug!(
            page = page.page(),
            per_page = page.per_page(),
            returned = slice.items.len(),
            total = slice.total,
            "listed published articles"
        );
        Ok(Page::from_slice(page, slice))
    }

    /// Fetch one article. Drafts are only visible to a signed-in caller.
    pub async fn detail(
        &self,
        id: ArticleId,
        session: Option<&Session>,
    ) -> Result<ArticleRecord, AppError> {
        let record = self
            .articles
            .find_by_id(id, session)
            .await?
            .ok_or_else(|| DomainError::not_found("article", id))?;

        if !record.is_published && session.is_none() {
            return Err(DomainError::not_found("article", id).into());
        }

        Ok(record)
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, AppError> {
        let facets = self.articles.list_facets().await?;
        Ok(FilterOptions::from_facets(&facets, self.timezone))
    }

    pub async fn archive(&self) -> Result<Vec<YearGroup>, AppError> {
        let summaries = self.articles.list_archive_summaries().await?;
        let years = archive::aggregate(&summaries, self.timezone)?;
        debug!(
            articles = summaries.len(),
            years = years.len(),
            "built archive"
        );
        Ok(years)
    }

    pub async fn all_published(&self) -> Result<Vec<ArticleRecord>, AppError> {
        Ok(self.articles.list_all_published().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use time::macros::datetime;
    use uuid::Uuid;

    use crate::application::pagination::PageSlice;
    use crate::application::repos::RepoError;
    use crate::domain::archive::ArchiveError;
    use crate::domain::entities::{ArticleFacet, ArticleSummary};
    use crate::domain::session::SessionUser;

    #[derive(Default)]
    struct StubArticlesRepo {
        records: Vec<ArticleRecord>,
        summaries: Vec<ArticleSummary>,
        facets: Vec<ArticleFacet>,
        queries: Mutex<Vec<(ArticleQuery, PageRequest)>>,
    }

    #[async_trait]
    impl ArticlesRepo for StubArticlesRepo {
        async fn list_published(
            &self,
            query: &ArticleQuery,
            page: PageRequest,
        ) -> Result<PageSlice<ArticleRecord>, RepoError> {
            self.queries.lock().unwrap().push((query.clone(), page));
            let published: Vec<ArticleRecord> = self
                .records
                .iter()
                .filter(|record| record.is_published)
                .cloned()
                .collect();
            let total = published.len() as u64;
            let items = published
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .collect();
            Ok(PageSlice::new(items, total))
        }

        async fn list_all_published(&self) -> Result<Vec<ArticleRecord>, RepoError> {
            Ok(self
                .records
                .iter()
                .filter(|record| record.is_published)
                .cloned()
                .collect())
        }

        async fn list_facets(&self) -> Result<Vec<ArticleFacet>, RepoError> {
            Ok(self.facets.clone())
        }

        async fn list_archive_summaries(&self) -> Result<Vec<ArticleSummary>, RepoError> {
            Ok(self.summaries.clone())
        }

        async fn find_by_id(
            &self,
            id: ArticleId,
            _session: Option<&Session>,
        ) -> Result<Option<ArticleRecord>, RepoError> {
            Ok(self.records.iter().find(|record| record.id == id).cloned())
        }
    }

    fn record(id: i64, published: bool) -> ArticleRecord {
        ArticleRecord {
            id: ArticleId(id),
            title: format!("article {id}"),
            excerpt: None,
            content: "body".into(),
            tag: Some("rust".into()),
            is_published: published,
            user_id: None,
            created_at: datetime!(2024-04-01 12:00 UTC),
            updated_at: None,
        }
    }

    fn session() -> Session {
        Session {
            access_token: "token".into(),
            refresh_token: "refresh".into(),
            expires_at: datetime!(2099-01-01 0:00 UTC),
            user: SessionUser {
                id: Uuid::new_v4(),
                email: Some("owner@example.com".into()),
            },
        }
    }

    fn service(repo: StubArticlesRepo) -> (ArticleService, Arc<StubArticlesRepo>) {
        let repo = Arc::new(repo);
        let service = ArticleService::new(repo.clone(), chrono_tz::Asia::Shanghai, 10);
        (service, repo)
    }

    #[tokio::test]
    async fn list_resolves_year_in_site_timezone() {
        let (service, repo) = service(StubArticlesRepo {
            records: (1..=12).map(|id| record(id, true)).collect(),
            ..Default::default()
        });

        let filter = ArticleFilter::new(Some("rust".into()), Some(2024), None);
        let request = service.page_request(Some(2), Some(5)).expect("request");
        let page = service.list(&filter, request).await.expect("page");

        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total, 12);
        assert_eq!(page.total_pages, 3);

        let queries = repo.queries.lock().unwrap();
        let (query, seen_page) = &queries[0];
        assert_eq!(query.tag.as_deref(), Some("rust"));
        let range = query.created.expect("year range");
        assert_eq!(range.start, datetime!(2023-12-31 16:00 UTC));
        assert_eq!(seen_page.offset(), 5);
    }

    #[tokio::test]
    async fn page_request_uses_configured_default() {
        let (service, _) = service(StubArticlesRepo::default());
        let request = service.page_request(None, None).expect("request");
        assert_eq!(request.page(), 1);
        assert_eq!(request.per_page(), 10);

        let err = service.page_request(Some(0), None).expect_err("page zero");
        assert!(matches!(err, AppError::Pagination(_)));
    }

    #[tokio::test]
    async fn drafts_need_a_session() {
        let (service, _) = service(StubArticlesRepo {
            records: vec![record(1, true), record(2, false)],
            ..Default::default()
        });

        assert_eq!(
            service.detail(ArticleId(1), None).await.expect("public").id,
            ArticleId(1)
        );

        let err = service
            .detail(ArticleId(2), None)
            .await
            .expect_err("draft hidden");
        assert!(err.is_not_found());

        let session = session();
        let draft = service
            .detail(ArticleId(2), Some(&session))
            .await
            .expect("draft visible to signed-in caller");
        assert!(!draft.is_published);

        let missing = service
            .detail(ArticleId(42), Some(&session))
            .await
            .expect_err("missing");
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn archive_aggregates_fetched_summaries() {
        let (service, _) = service(StubArticlesRepo {
            summaries: vec![
                ArticleSummary {
                    id: ArticleId(1),
                    title: "late night".into(),
                    created_at: "2023-12-31T17:00:00Z".into(),
                },
                ArticleSummary {
                    id: ArticleId(2),
                    title: "autumn".into(),
                    created_at: "2023-10-10T02:00:00Z".into(),
                },
            ],
            ..Default::default()
        });

        let years = service.archive().await.expect("archive");
        let labels: Vec<(i32, usize)> = years.iter().map(|year| (year.year, year.count)).collect();
        assert_eq!(labels, vec![(2024, 1), (2023, 1)]);
        assert_eq!(years[0].months[0].articles[0].date, "1日");
    }

    #[tokio::test]
    async fn archive_surfaces_invalid_timestamps() {
        let (service, _) = service(StubArticlesRepo {
            summaries: vec![ArticleSummary {
                id: ArticleId(5),
                title: "broken".into(),
                created_at: "yesterday".into(),
            }],
            ..Default::default()
        });

        let err = service.archive().await.expect_err("invalid input");
        assert!(matches!(
            err,
            AppError::Archive(ArchiveError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn filter_options_come_from_facets() {
        let (service, _) = service(StubArticlesRepo {
            facets: vec![
                ArticleFacet {
                    created_at: datetime!(2022-01-01 0:00 UTC),
                    tag: Some("notes".into()),
                },
                ArticleFacet {
                    created_at: datetime!(2021-12-31 20:00 UTC),
                    tag: Some("notes".into()),
                },
            ],
            ..Default::default()
        });

        let options = service.filter_options().await.expect("options");
        assert_eq!(options.years, vec![2022]);
        assert_eq!(options.tags[0].count, 2);
    }
}
