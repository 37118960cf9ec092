//! Service layer for computing and caching merge chance reports.
//!
//! `MergeChanceQuerier` is the entry point for report retrieval. It:
//! 1. Checks the report cache for a fresh entry.
//! 2. Otherwise pages backwards through a repository's pull requests, dropping spam and
//!    keeping a running classification of the whole accumulated set.
//! 3. Stops once enough viable outsider pull requests are known, the page budget is
//!    spent, or the history runs out.
//! 4. Computes the statistics and caches the report.

use crate::cache::{CacheLookup, ReportCache};
use crate::classify::{is_spam_or_trivial, ContributionLedger};
use crate::config::{AppConfig, RepoId};
use crate::error::QueryError;
use crate::github::{PullRequestSource, ANALYSIS_FIELDS};
use crate::metrics::{self, MergeChanceReport};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Limits that bound a single computation.
#[derive(Clone, Debug)]
pub struct FetchBudget {
    /// Maximum number of page requests.
    pub max_requests: u32,
    /// Viable outsider pull requests after which fetching stops.
    pub min_viable: usize,
    pub excluded_authors: Vec<String>,
}

impl From<&AppConfig> for FetchBudget {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_requests: config.max_github_api_pages,
            min_viable: config.min_viable_prs,
            excluded_authors: config.excluded_authors.clone(),
        }
    }
}

#[derive(Clone)]
pub struct MergeChanceQuerier {
    source: Arc<dyn PullRequestSource>,
    cache: ReportCache,
    budget: FetchBudget,
}

impl MergeChanceQuerier {
    pub fn new(source: Arc<dyn PullRequestSource>, cache: ReportCache, budget: FetchBudget) -> Self {
        Self {
            source,
            cache,
            budget,
        }
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    pub fn source(&self) -> &dyn PullRequestSource {
        self.source.as_ref()
    }

    /// Retrieves the report for a repository, computing it on a cache miss (read-through).
    pub async fn get(&self, repo_id: &RepoId) -> Result<MergeChanceReport, QueryError> {
        let now = Utc::now();

        match self.cache.lookup(repo_id, now).await {
            CacheLookup::Hit(entry) => {
                tracing::info!(repo = %repo_id, "Retrieved report from cache");
                return Ok(entry.report);
            }
            CacheLookup::Miss => {}
            CacheLookup::Unavailable(e) => {
                tracing::error!(repo = %repo_id, "Cache unavailable, recomputing: {}", e);
            }
        }

        tracing::info!(repo = %repo_id, "Computing report from GitHub");
        let report = self.compute(repo_id, now).await?;
        self.cache.put(repo_id, report.clone(), now).await;

        Ok(report)
    }

    /// Fetches pull requests until enough signal is gathered and builds the report.
    pub async fn compute(
        &self,
        repo_id: &RepoId,
        now: DateTime<Utc>,
    ) -> Result<MergeChanceReport, QueryError> {
        let mut ledger = ContributionLedger::new(now);
        let mut cursor: Option<String> = None;
        let mut requests = 0;

        while requests < self.budget.max_requests {
            let page = self
                .source
                .fetch_page(repo_id, cursor.as_deref(), ANALYSIS_FIELDS)
                .await
                .inspect_err(|e| {
                    tracing::error!(repo = %repo_id, "Failed to fetch pull requests: {}", e)
                })?;
            requests += 1;

            let fetched = page.records.len();
            ledger.extend(
                page.records
                    .into_iter()
                    .filter(|r| !is_spam_or_trivial(r, &self.budget.excluded_authors)),
            );
            tracing::debug!(
                repo = %repo_id,
                requests,
                fetched,
                accumulated = ledger.len(),
                viable = ledger.viable_count(),
                "Processed pull request page"
            );

            if ledger.viable_count() >= self.budget.min_viable || !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        if requests == self.budget.max_requests && ledger.viable_count() < self.budget.min_viable {
            tracing::warn!(
                repo = %repo_id,
                "Hit max_github_api_pages ({}) with only {} viable pull requests",
                self.budget.max_requests,
                ledger.viable_count()
            );
        }

        metrics::build_report(ledger.viable(), now).ok_or(QueryError::InsufficientData)
    }
}
