//! Error types shared across the fetch, cache and query layers.

use thiserror::Error;

/// Process configuration that makes the service unable to start.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GITHUB_TOKEN is not set; the GraphQL API requires a bearer token")]
    MissingToken,
    #[error("failed to build GitHub client: {0}")]
    Client(#[source] octocrab::Error),
}

/// A single page request to GitHub failed. Never retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GitHub request failed: {0}")]
    Transport(#[from] octocrab::Error),
    #[error("GitHub GraphQL query returned errors: {}", .0.join("; "))]
    Api(Vec<String>),
    #[error("unexpected GraphQL response: {0}")]
    MalformedResponse(String),
}

/// The report store could not be read or written.
#[derive(Debug, Error)]
#[error("report store unavailable: {0}")]
pub struct StoreError(pub String);

/// Why a merge chance could not be computed for a repository.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("not enough outside contributions to estimate a merge chance")]
    InsufficientData,
}
