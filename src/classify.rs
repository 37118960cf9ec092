//! Classification of pull requests into insiders and outsiders, spam and legitimate
//! contributions, and stale or still-active work.
//!
//! Everything here is a pure function of the records and a reference time, except
//! [`ContributionLedger`], which keeps the same classification up to date while
//! pages of records keep arriving.

use crate::github::{AuthorAssociation, PrState, PullRequestRecord};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

/// Authors with more merged pull requests than this are treated as insiders.
pub const IMPLIED_INSIDER_THRESHOLD: usize = 5;

/// Open pull requests older than this have been effectively ignored.
pub const STALE_AFTER_DAYS: i64 = 90;

const BANNED_TITLE_KEYWORDS: [&str; 3] = ["readme", "update", "typo"];
const BANNED_EXACT_TITLE: &str = "test";

/// Logins with more than [`IMPLIED_INSIDER_THRESHOLD`] merged pull requests in `records`.
pub fn implied_insiders(records: &[PullRequestRecord]) -> HashSet<String> {
    let mut merged_by_author: HashMap<&str, usize> = HashMap::new();
    for record in records.iter().filter(|r| r.state == PrState::Merged) {
        if let Some(author) = record.author.as_deref() {
            *merged_by_author.entry(author).or_default() += 1;
        }
    }

    merged_by_author
        .into_iter()
        .filter(|(_, count)| *count > IMPLIED_INSIDER_THRESHOLD)
        .map(|(author, _)| author.to_string())
        .collect()
}

fn is_insider_association(association: Option<AuthorAssociation>) -> bool {
    matches!(
        association,
        Some(AuthorAssociation::Owner) | Some(AuthorAssociation::Member)
    )
}

pub fn is_outsider(record: &PullRequestRecord, implied_insiders: &HashSet<String>) -> bool {
    if is_insider_association(record.author_association) {
        return false;
    }
    match record.author.as_deref() {
        Some(author) => !implied_insiders.contains(author),
        None => true,
    }
}

/// Trivial or bot contributions that carry no signal about how outsiders are treated.
pub fn is_spam_or_trivial(record: &PullRequestRecord, excluded_authors: &[String]) -> bool {
    let title = record.title.to_lowercase();
    if BANNED_TITLE_KEYWORDS.iter().any(|kw| title.contains(kw)) {
        return true;
    }
    if title == BANNED_EXACT_TITLE {
        return true;
    }
    record.author.as_deref().is_some_and(|author| {
        excluded_authors
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(author))
    })
}

pub fn is_stale(record: &PullRequestRecord, now: DateTime<Utc>) -> bool {
    record.state == PrState::Open && now - record.created_at > Duration::days(STALE_AFTER_DAYS)
}

pub fn is_handled(record: &PullRequestRecord) -> bool {
    matches!(record.state, PrState::Merged | PrState::Closed)
}

pub fn merged(records: &[PullRequestRecord]) -> Vec<&PullRequestRecord> {
    records
        .iter()
        .filter(|r| r.state == PrState::Merged)
        .collect()
}

pub fn open(records: &[PullRequestRecord]) -> Vec<&PullRequestRecord> {
    records.iter().filter(|r| r.state == PrState::Open).collect()
}

pub fn stale(records: &[PullRequestRecord], now: DateTime<Utc>) -> Vec<&PullRequestRecord> {
    records.iter().filter(|r| is_stale(r, now)).collect()
}

/// Outsider pull requests, with implied insiders derived from the same `records`.
pub fn outsiders(records: &[PullRequestRecord]) -> Vec<&PullRequestRecord> {
    let implied = implied_insiders(records);
    records.iter().filter(|r| is_outsider(r, &implied)).collect()
}

fn is_viable_outsider(
    record: &PullRequestRecord,
    implied_insiders: &HashSet<String>,
    now: DateTime<Utc>,
) -> bool {
    is_outsider(record, implied_insiders) && (is_handled(record) || is_stale(record, now))
}

/// Outsider pull requests that already carry a definitive signal: handled or stale.
pub fn viable(records: &[PullRequestRecord], now: DateTime<Utc>) -> Vec<&PullRequestRecord> {
    let implied = implied_insiders(records);
    records
        .iter()
        .filter(|r| is_viable_outsider(r, &implied, now))
        .collect()
}

/// Accumulates pull requests page by page and keeps the viable outsider subset current.
///
/// Merged counts are maintained per login. When a login crosses
/// [`IMPLIED_INSIDER_THRESHOLD`], only that login's records are dropped from the viable
/// subset, including records accepted from earlier pages. The result is always the
/// same as calling [`viable`] on every record accumulated so far.
#[derive(Debug)]
pub struct ContributionLedger {
    now: DateTime<Utc>,
    records: Vec<PullRequestRecord>,
    merged_by_author: HashMap<String, usize>,
    implied_insiders: HashSet<String>,
    viable: Vec<usize>,
}

impl ContributionLedger {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            records: Vec::new(),
            merged_by_author: HashMap::new(),
            implied_insiders: HashSet::new(),
            viable: Vec::new(),
        }
    }

    pub fn extend(&mut self, batch: impl IntoIterator<Item = PullRequestRecord>) {
        let mut crossed: HashSet<String> = HashSet::new();

        for record in batch {
            if record.state == PrState::Merged {
                if let Some(author) = record.author.as_deref() {
                    let count = self.merged_by_author.entry(author.to_string()).or_default();
                    *count += 1;
                    if *count == IMPLIED_INSIDER_THRESHOLD + 1 {
                        self.implied_insiders.insert(author.to_string());
                        crossed.insert(author.to_string());
                    }
                }
            }

            let index = self.records.len();
            if is_viable_outsider(&record, &self.implied_insiders, self.now) {
                self.viable.push(index);
            }
            self.records.push(record);
        }

        if !crossed.is_empty() {
            tracing::debug!(authors = ?crossed, "Authors reclassified as implied insiders");
            let records = &self.records;
            self.viable.retain(|&i| {
                records[i]
                    .author
                    .as_deref()
                    .map_or(true, |author| !crossed.contains(author))
            });
        }
    }

    /// Total records accumulated, viable or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn viable_count(&self) -> usize {
        self.viable.len()
    }

    pub fn implied_insiders(&self) -> &HashSet<String> {
        &self.implied_insiders
    }

    /// The viable outsider records in the order they were accumulated.
    pub fn viable(&self) -> Vec<PullRequestRecord> {
        self.viable.iter().map(|&i| self.records[i].clone()).collect()
    }
}
