//! Tab-separated export of the pull requests behind a report.

use crate::classify::is_stale;
use crate::github::{PrState, PullRequestRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

const COLUMNS: [&str; 9] = [
    "author",
    "number",
    "title",
    "permalink",
    "state",
    "createdAt",
    "closedAt",
    "authorAssociation",
    "outcome",
];

/// Final disposition of a pull request at export time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Successful,
    Rejected,
    Stale,
    Active,
}

impl Outcome {
    pub fn classify(record: &PullRequestRecord, now: DateTime<Utc>) -> Self {
        match record.state {
            PrState::Merged => Self::Successful,
            PrState::Closed => Self::Rejected,
            PrState::Open if is_stale(record, now) => Self::Stale,
            PrState::Open => Self::Active,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Successful => "Successful",
            Self::Rejected => "Rejected",
            Self::Stale => "Stale",
            Self::Active => "Active",
        };
        f.write_str(name)
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Tabs and newlines inside a value would break the row layout.
fn clean(value: &str) -> String {
    value.replace(['\t', '\n', '\r'], " ")
}

/// Renders `records` as TSV: a header row, then one row per pull request.
pub fn to_tsv(records: &[PullRequestRecord], now: DateTime<Utc>) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(COLUMNS.join("\t"));

    for record in records {
        let state = match record.state {
            PrState::Open => "OPEN",
            PrState::Closed => "CLOSED",
            PrState::Merged => "MERGED",
        };
        let row = [
            clean(record.author.as_deref().unwrap_or_default()),
            record.number.map(|n| n.to_string()).unwrap_or_default(),
            clean(&record.title),
            clean(&record.permalink),
            state.to_string(),
            format_ts(record.created_at),
            record.closed_at.map(format_ts).unwrap_or_default(),
            record
                .author_association
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            Outcome::classify(record, now).to_string(),
        ];
        lines.push(row.join("\t"));
    }

    lines.join("\n")
}
