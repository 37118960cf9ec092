pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod github;
pub mod metrics;
pub mod querier;

#[cfg(test)]
mod test_support;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use cache::ReportCache;
use config::{AppConfig, RepoId};
use error::QueryError;
use github::{GraphQlClient, PullRequestSource, ANALYSIS_FIELDS};
use metrics::{BadgeResponse, MergeChanceReport, MergeChanceResponse};
use querier::{FetchBudget, MergeChanceQuerier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service computing and caching merge chance reports.
    pub querier: MergeChanceQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state against the GitHub GraphQL API.
    ///
    /// Fails if no GitHub token is configured.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = GraphQlClient::new(config.github_token.clone(), config.page_size)?;
        Ok(Self::with_source(config, Arc::new(client)))
    }

    /// Builds the state around an arbitrary pull request source and an in-memory cache.
    pub fn with_source(config: AppConfig, source: Arc<dyn PullRequestSource>) -> Self {
        let cache = ReportCache::in_memory(&config);
        Self::with_parts(config, source, cache)
    }

    pub fn with_parts(
        config: AppConfig,
        source: Arc<dyn PullRequestSource>,
        cache: ReportCache,
    ) -> Self {
        let querier = MergeChanceQuerier::new(source, cache, FetchBudget::from(&config));
        Self { querier, config }
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/autocomplete", get(autocomplete))
        .route("/api/badge", get(get_badge))
        .route("/api/repos/{owner}/{repo}/chance", get(get_repo_chance))
        .route("/api/repos/{owner}/{repo}/export", get(export_repo_prs))
        .route("/api/repos/{owner}/{repo}/history", get(export_repo_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors surfaced to HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    InvalidRepo(String),
    CouldNotCompute(RepoId),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidRepo(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::CouldNotCompute(repo_id) => (
                StatusCode::NOT_FOUND,
                format!(
                    "Could not calculate merge chance for {repo_id}. \
                     It might not exist on GitHub or have too few pull requests from outside contributors."
                ),
            )
                .into_response(),
        }
    }
}

fn parse_repo(input: &str) -> Result<RepoId, ApiError> {
    RepoId::parse(input).map_err(|e| ApiError::InvalidRepo(e.to_string()))
}

async fn report_for(state: &AppState, repo_id: RepoId) -> Result<MergeChanceReport, ApiError> {
    match state.querier.get(&repo_id).await {
        Ok(report) => Ok(report),
        Err(QueryError::InsufficientData) => {
            tracing::info!(repo = %repo_id, "Not enough data for a merge chance");
            Err(ApiError::CouldNotCompute(repo_id))
        }
        Err(e) => {
            tracing::error!(repo = %repo_id, "Failed to compute merge chance: {}", e);
            Err(ApiError::CouldNotCompute(repo_id))
        }
    }
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "mergechance",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn autocomplete(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(
        state
            .querier
            .cache()
            .recent_repos(state.config.autocomplete_limit)
            .await,
    )
}

pub async fn get_repo_chance(
    Path((owner, repo)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MergeChanceResponse>, ApiError> {
    let repo_id = parse_repo(&format!("{owner}/{repo}"))?;
    let report = report_for(&state, repo_id.clone()).await?;
    tracing::debug!(repo = %repo_id, "Returning merge chance");
    Ok(Json(MergeChanceResponse::new(repo_id.to_string(), &report)))
}

#[derive(Debug, Deserialize)]
pub struct BadgeQuery {
    repo: Option<String>,
}

pub async fn get_badge(
    Query(query): Query<BadgeQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<BadgeResponse>, ApiError> {
    let repo_id = parse_repo(query.repo.as_deref().unwrap_or_default())?;
    let report = report_for(&state, repo_id).await?;
    Ok(Json(BadgeResponse::new(&report)))
}

pub async fn export_repo_prs(
    Path((owner, repo)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let repo_id = parse_repo(&format!("{owner}/{repo}"))?;
    let report = report_for(&state, repo_id).await?;
    Ok(tsv_response(export::to_tsv(
        &report.source_prs,
        chrono::Utc::now(),
    )))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pages: Option<u32>,
}

fn tsv_response(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/tab-separated-values; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Every recent pull request of a repository, unfiltered, one TSV row each.
pub async fn export_repo_history(
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let repo_id = parse_repo(&format!("{owner}/{repo}"))?;
    let max_pages = state.config.max_github_api_pages;
    let page_cap = query.pages.unwrap_or(1).clamp(1, max_pages.max(1));

    let (records, _) = github::fetch_pages(
        state.querier.source(),
        &repo_id,
        page_cap,
        None,
        ANALYSIS_FIELDS,
    )
    .await
    .map_err(|e| {
        tracing::error!(repo = %repo_id, "Failed to export pull request history: {}", e);
        ApiError::CouldNotCompute(repo_id.clone())
    })?;

    Ok(tsv_response(export::to_tsv(&records, chrono::Utc::now())))
}
