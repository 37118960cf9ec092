use crate::classify::{self, is_stale};
use crate::github::{PrState, PullRequestRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// Share of outsider pull requests that were merged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeChance {
    /// Percentage in `[0, 100]`, rounded to two decimals.
    pub chance_percent: f64,
    /// Number of pull requests the percentage is based on.
    pub total: usize,
}

/// The computed result for one repository. This is what the cache stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeChanceReport {
    pub chance_percent: f64,
    pub total_considered: usize,
    pub median_days_to_close: Option<f64>,
    /// Viable outsider pull requests the statistics were computed from.
    pub source_prs: Vec<PullRequestRecord>,
}

/// Public summary returned by the JSON endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MergeChanceResponse {
    pub repo: String,
    pub chance_percent: f64,
    pub total_considered: usize,
    pub median_days_to_close: Option<f64>,
}

impl MergeChanceResponse {
    pub fn new(repo: String, report: &MergeChanceReport) -> Self {
        Self {
            repo,
            chance_percent: report.chance_percent,
            total_considered: report.total_considered,
            median_days_to_close: report.median_days_to_close,
        }
    }
}

/// Shields.io endpoint badge payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeResponse {
    pub schema_version: u8,
    pub label: &'static str,
    pub message: String,
}

impl BadgeResponse {
    pub fn new(report: &MergeChanceReport) -> Self {
        Self {
            schema_version: 1,
            label: "Merge Chance",
            message: format!("{}%", report.chance_percent),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Calculates the merge chance over the outsider pull requests among `records`.
///
/// Open pull requests that are not yet stale carry no signal and are left out of the
/// total. Returns `None` when nothing is left to count.
pub fn merge_chance(records: &[PullRequestRecord], now: DateTime<Utc>) -> Option<MergeChance> {
    let outsiders = classify::outsiders(records);

    let merged = outsiders
        .iter()
        .filter(|r| r.state == PrState::Merged)
        .count();
    let open: Vec<&PullRequestRecord> = outsiders
        .iter()
        .copied()
        .filter(|r| r.state == PrState::Open)
        .collect();
    let stale_open = open.iter().filter(|r| is_stale(r, now)).count();
    let ignored = open.len() - stale_open;
    let total = outsiders.len() - ignored;

    if total == 0 {
        return None;
    }

    Some(MergeChance {
        chance_percent: round2(100.0 * merged as f64 / total as f64),
        total,
    })
}

/// Median number of days from creation to close over merged and closed pull requests.
pub fn median_days_to_close(records: &[PullRequestRecord]) -> Option<f64> {
    let mut durations: Vec<f64> = records
        .iter()
        .filter(|r| classify::is_handled(r))
        .filter_map(|r| r.closed_at.map(|closed| (closed - r.created_at).num_seconds() as f64))
        .collect();

    if durations.is_empty() {
        return None;
    }

    durations.sort_by(|a, b| a.total_cmp(b));
    let mid = durations.len() / 2;
    let median_seconds = if durations.len() % 2 == 0 {
        (durations[mid - 1] + durations[mid]) / 2.0
    } else {
        durations[mid]
    };

    Some(round2(median_seconds / SECONDS_PER_DAY))
}

/// Builds the final report from the viable outsider pull requests.
///
/// Both statistics are required; if either is missing there is not enough data.
pub fn build_report(
    viable: Vec<PullRequestRecord>,
    now: DateTime<Utc>,
) -> Option<MergeChanceReport> {
    let chance = merge_chance(&viable, now)?;
    let median = median_days_to_close(&viable)?;

    Some(MergeChanceReport {
        chance_percent: chance.chance_percent,
        total_considered: chance.total,
        median_days_to_close: Some(median),
        source_prs: viable,
    })
}
