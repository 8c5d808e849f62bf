//! Year/month archive built from published article summaries.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::ArticleSummary;
use crate::domain::types::ArticleId;
use crate::util::timezone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayEntry {
    pub id: ArticleId,
    pub date: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGroup {
    pub month: u8,
    pub articles: Vec<DayEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearGroup {
    pub year: i32,
    pub count: usize,
    pub months: Vec<MonthGroup>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("article {id} has an unusable timestamp `{raw}`: {reason}")]
    InvalidInput {
        id: ArticleId,
        raw: String,
        reason: String,
    },
}

struct Bucketed {
    created_at: OffsetDateTime,
    entry: DayEntry,
}

/// Group `records` by calendar year and month in `tz`.
///
/// Years and months come out newest first. Inside a month, entries are
/// ordered by creation time descending with ties broken by id descending,
/// so the result does not depend on the order of `records`.
pub fn aggregate(records: &[ArticleSummary], tz: Tz) -> Result<Vec<YearGroup>, ArchiveError> {
    let mut buckets: BTreeMap<Reverse<i32>, BTreeMap<Reverse<u8>, Vec<Bucketed>>> =
        BTreeMap::new();

    for record in records {
        let invalid = |reason: String| ArchiveError::InvalidInput {
            id: record.id,
            raw: record.created_at.clone(),
            reason,
        };

        let created_at = timezone::parse_timestamp(&record.created_at, tz).map_err(invalid)?;
        let day = timezone::calendar_day(created_at, tz)
            .ok_or_else(|| invalid("outside the representable calendar range".to_string()))?;

        buckets
            .entry(Reverse(day.year))
            .or_default()
            .entry(Reverse(day.month))
            .or_default()
            .push(Bucketed {
                created_at,
                entry: DayEntry {
                    id: record.id,
                    date: day_label(day.day),
                    title: record.title.clone(),
                },
            });
    }

    let years = buckets
        .into_iter()
        .map(|(Reverse(year), months)| {
            let months: Vec<MonthGroup> = months
                .into_iter()
                .map(|(Reverse(month), mut entries)| {
                    entries.sort_by(|left, right| {
                        right
                            .created_at
                            .cmp(&left.created_at)
                            .then(right.entry.id.cmp(&left.entry.id))
                    });
                    MonthGroup {
                        month,
                        articles: entries.into_iter().map(|bucketed| bucketed.entry).collect(),
                    }
                })
                .collect();
            let count = months.iter().map(|month| month.articles.len()).sum();
            YearGroup {
                year,
                count,
                months,
            }
        })
        .collect();

    Ok(years)
}

fn day_label(day: u8) -> String {
    format!("{day}日")
}
