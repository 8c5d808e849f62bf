//! Listing filters and the facet summaries offered next to the article list.

use std::collections::{BTreeMap, BTreeSet};

use chrono_tz::Tz;
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::entities::ArticleFacet;
use crate::domain::error::DomainError;
use crate::util::timezone;

const MIN_FILTER_YEAR: i32 = 1;
const MAX_FILTER_YEAR: i32 = 9998;

/// User-supplied listing filter. Blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub year: Option<i32>,
    pub search: Option<String>,
}

/// Half-open `[start, end)` creation-time window for a calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl ArticleFilter {
    pub fn new(tag: Option<String>, year: Option<i32>, search: Option<String>) -> Self {
        Self {
            tag: non_blank(tag),
            year,
            search: non_blank(search),
        }
    }

    /// Resolve the year filter into UTC bounds using the site timezone.
    pub fn year_range(&self, tz: Tz) -> Result<Option<YearRange>, DomainError> {
        let Some(year) = self.year else {
            return Ok(None);
        };

        if !(MIN_FILTER_YEAR..=MAX_FILTER_YEAR).contains(&year) {
            return Err(DomainError::validation(
                "year",
                format!("must be between {MIN_FILTER_YEAR} and {MAX_FILTER_YEAR}"),
            ));
        }

        let start = timezone::year_start(year, tz);
        let end = timezone::year_start(year + 1, tz);
        match (start, end) {
            (Some(start), Some(end)) => Ok(Some(YearRange { start, end })),
            _ => Err(DomainError::validation(
                "year",
                format!("{year} has no local midnight on January 1st in {tz}"),
            )),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Choices offered by the listing filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub tags: Vec<TagCount>,
}

impl FilterOptions {
    pub fn from_facets(facets: &[ArticleFacet], tz: Tz) -> Self {
        let mut years = BTreeSet::new();
        let mut tags: BTreeMap<&str, usize> = BTreeMap::new();

        for facet in facets {
            if let Some(day) = timezone::calendar_day(facet.created_at, tz) {
                years.insert(day.year);
            }
            if let Some(tag) = facet.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                *tags.entry(tag).or_default() += 1;
            }
        }

        let mut tags: Vec<TagCount> = tags
            .into_iter()
            .map(|(tag, count)| TagCount {
                tag: tag.to_string(),
                count,
            })
            .collect();
        tags.sort_by(|left, right| {
            right
                .count
                .cmp(&left.count)
                .then_with(|| left.tag.cmp(&right.tag))
        });

        Self {
            years: years.into_iter().rev().collect(),
            tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn facet(created_at: OffsetDateTime, tag: Option<&str>) -> ArticleFacet {
        ArticleFacet {
            created_at,
            tag: tag.map(str::to_string),
        }
    }

    #[test]
    fn blank_filter_values_are_dropped() {
        let filter = ArticleFilter::new(Some("  ".into()), None, Some(" rust ".into()));
        assert_eq!(filter.tag, None);
        assert_eq!(filter.search.as_deref(), Some("rust"));
        assert_eq!(ArticleFilter::new(Some(String::new()), None, None), ArticleFilter::default());
    }

    #[test]
    fn year_range_is_half_open_in_local_time() {
        let filter = ArticleFilter::new(None, Some(2024), None);

        let utc = filter.year_range(Tz::UTC).expect("valid").expect("range");
        assert_eq!(utc.start, datetime!(2024-01-01 0:00 UTC));
        assert_eq!(utc.end, datetime!(2025-01-01 0:00 UTC));

        let local = filter
            .year_range(chrono_tz::Asia::Shanghai)
            .expect("valid")
            .expect("range");
        assert_eq!(local.start, datetime!(2023-12-31 16:00 UTC));
        assert_eq!(local.end, datetime!(2024-12-31 16:00 UTC));
    }

    #[test]
    fn out_of_range_year_is_rejected() {
        let filter = ArticleFilter::new(None, Some(0), None);
        let err = filter.year_range(Tz::UTC).expect_err("invalid year");
        assert!(matches!(err, DomainError::Validation { field: "year", .. }));
    }

    #[test]
    fn filter_options_collect_years_and_rank_tags() {
        let facets = vec![
            facet(datetime!(2022-05-01 10:00 UTC), Some("rust")),
            facet(datetime!(2024-02-01 10:00 UTC), Some("life")),
            facet(datetime!(2024-03-01 10:00 UTC), Some("rust")),
            facet(datetime!(2023-12-31 20:00 UTC), Some(" ")),
            facet(datetime!(2023-06-01 10:00 UTC), None),
            facet(datetime!(2023-07-01 10:00 UTC), Some("books")),
        ];

        let options = FilterOptions::from_facets(&facets, Tz::UTC);
        assert_eq!(options.years, vec![2024, 2023, 2022]);
        assert_eq!(
            options.tags,
            vec![
                TagCount {
                    tag: "rust".into(),
                    count: 2
                },
                TagCount {
                    tag: "books".into(),
                    count: 1
                },
                TagCount {
                    tag: "life".into(),
                    count: 1
                },
            ]
        );
    }
}
