//! Application configuration and repository identifiers.
//!
//! Settings are loaded from the environment (optionally seeded from a `.env` file).
//! `AppConfig` governs the GitHub fetch budget, the classification thresholds that
//! are tunable per deployment, and the report cache TTL.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration as StdDuration;
use thiserror::Error;

const GITHUB_PREFIX: &str = "github.com/";

/// A normalized GitHub repository identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoIdError {
    #[error("repository cannot be empty")]
    Empty,
    #[error("invalid repository '{0}', expected format owner/name")]
    Malformed(String),
}

impl RepoId {
    /// Parses user input into a repository identifier.
    ///
    /// Accepts either `owner/name` or a full GitHub URL. The result is lower-cased,
    /// with surrounding and internal whitespace removed.
    pub fn parse(input: &str) -> Result<Self, RepoIdError> {
        let mut target: String = input
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if target.is_empty() {
            return Err(RepoIdError::Empty);
        }

        if let Some(pos) = target.find(GITHUB_PREFIX) {
            target = target[pos + GITHUB_PREFIX.len()..].to_string();
        }
        let target = target.strip_suffix('/').unwrap_or(&target);

        match target.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(RepoIdError::Malformed(input.trim().to_string())),
        }
    }

    /// Store-safe key: the path separator is replaced so the id is a single segment.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// GitHub Personal Access Token. The GraphQL API refuses anonymous queries,
    /// so the service will not start without it.
    pub github_token: Option<String>,

    /// Time to live for cached reports in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Maximum number of reports kept in the in-memory store.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,

    /// Hard limit on the number of GraphQL page requests per computation.
    #[serde(default = "default_max_github_api_pages")]
    pub max_github_api_pages: u32,

    /// Pull requests requested per page. GitHub caps this at 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Number of viable outsider pull requests after which fetching stops early.
    #[serde(default = "default_min_viable_prs")]
    pub min_viable_prs: usize,

    /// Logins whose pull requests are never counted.
    /// Expected format: comma-separated string, e.g. "dependabot[bot],renovate[bot]".
    #[serde(
        default = "default_excluded_authors",
        deserialize_with = "deserialize_csv_list"
    )]
    pub excluded_authors: Vec<String>,

    /// Number of recently computed repositories offered for autocompletion.
    #[serde(default = "default_autocomplete_limit")]
    pub autocomplete_limit: usize,
}

fn default_cache_ttl_seconds() -> u64 {
    24 * 60 * 60
}

fn default_cache_max_capacity() -> u64 {
    10_000
}

fn default_max_github_api_pages() -> u32 {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_min_viable_prs() -> usize {
    50
}

fn default_excluded_authors() -> Vec<String> {
    ["dependabot", "dependabot-preview", "renovate", "greenkeeper"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_autocomplete_limit() -> usize {
    500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_capacity: default_cache_max_capacity(),
            max_github_api_pages: default_max_github_api_pages(),
            page_size: default_page_size(),
            min_viable_prs: default_min_viable_prs(),
            excluded_authors: default_excluded_authors(),
            autocomplete_limit: default_autocomplete_limit(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }
}

fn deserialize_csv_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(parse_csv_list(&s))
}

fn parse_csv_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .collect()
}
