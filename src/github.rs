//! Pull request retrieval from the GitHub GraphQL API.
//!
//! Pages are walked backwards in time: the first request asks for the most recent
//! pull requests and every following request continues `before` the previous page's
//! start cursor. This lets callers stop as soon as enough recent activity is known.

use crate::config::RepoId;
use crate::error::{ConfigError, FetchError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Maximum page size accepted by the GitHub GraphQL API.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pull request fields needed by the classifier and the exports.
pub const ANALYSIS_FIELDS: &[&str] = &[
    "number",
    "title",
    "permalink",
    "state",
    "createdAt",
    "closedAt",
    "authorAssociation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrState {
    Open,
    Closed,
    Merged,
}

/// Relationship of a pull request author to the repository, as reported by GitHub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorAssociation {
    Owner,
    Member,
    Collaborator,
    Contributor,
    FirstTimer,
    FirstTimeContributor,
    Mannequin,
    None,
}

impl AuthorAssociation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Member => "MEMBER",
            Self::Collaborator => "COLLABORATOR",
            Self::Contributor => "CONTRIBUTOR",
            Self::FirstTimer => "FIRST_TIMER",
            Self::FirstTimeContributor => "FIRST_TIME_CONTRIBUTOR",
            Self::Mannequin => "MANNEQUIN",
            Self::None => "NONE",
        }
    }
}

/// A pull request as returned by the GraphQL API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    pub state: PrState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author_association: Option<AuthorAssociation>,
    /// Login of the author; `None` when the account has been deleted.
    #[serde(default, deserialize_with = "deserialize_author")]
    pub author: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub number: Option<u64>,
}

/// GraphQL nests the login under an actor object; stored records carry the bare login.
#[derive(Deserialize)]
#[serde(untagged)]
enum AuthorField {
    Login(String),
    Actor { login: String },
}

fn deserialize_author<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let field: Option<AuthorField> = Deserialize::deserialize(deserializer)?;
    Ok(field.map(|f| match f {
        AuthorField::Login(login) | AuthorField::Actor { login } => login,
    }))
}

/// One page of pull requests plus the information needed to continue.
#[derive(Debug, Clone, Default)]
pub struct PullRequestPage {
    pub records: Vec<PullRequestRecord>,
    /// Whether older pull requests exist before this page.
    pub has_more: bool,
    /// Cursor to pass as `before` for the next (older) page.
    pub next_cursor: Option<String>,
}

/// Source of pull request pages. Implemented by [`GraphQlClient`] and by fakes in tests.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    async fn fetch_page(
        &self,
        repo: &RepoId,
        cursor: Option<&str>,
        fields: &[&str],
    ) -> Result<PullRequestPage, FetchError>;
}

/// Issues at most `page_cap` sequential page requests and concatenates the results.
///
/// Returns the records in fetch order together with a cursor from which a later call
/// can resume. A failure on any page aborts the whole batch.
pub async fn fetch_pages(
    source: &dyn PullRequestSource,
    repo: &RepoId,
    page_cap: u32,
    start_cursor: Option<String>,
    fields: &[&str],
) -> Result<(Vec<PullRequestRecord>, Option<String>), FetchError> {
    let mut records = Vec::new();
    let mut cursor = start_cursor;
    let mut pages = 0;
    let mut has_more = true;

    while has_more && pages < page_cap {
        let page = source.fetch_page(repo, cursor.as_deref(), fields).await?;
        records.extend(page.records);
        has_more = page.has_more;
        cursor = page.next_cursor;
        pages += 1;
    }

    tracing::debug!(repo = %repo, pages, records = records.len(), "Fetched pull request pages");
    Ok((records, cursor))
}

pub struct GraphQlClient {
    octocrab: Octocrab,
    page_size: u32,
}

impl GraphQlClient {
    /// Builds an authenticated client. A missing or blank token is rejected here so
    /// that no request is ever attempted without credentials.
    pub fn new(token: Option<String>, page_size: u32) -> Result<Self, ConfigError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(ConfigError::Client)?;

        Ok(Self {
            octocrab,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }
}

#[async_trait]
impl PullRequestSource for GraphQlClient {
    async fn fetch_page(
        &self,
        repo: &RepoId,
        cursor: Option<&str>,
        fields: &[&str],
    ) -> Result<PullRequestPage, FetchError> {
        let payload = json!({
            "query": pull_requests_query(fields),
            "variables": {
                "owner": repo.owner,
                "name": repo.repo,
                "last": self.page_size,
                "before": cursor,
            },
        });

        let response: Value = self.octocrab.graphql(&payload).await?;
        parse_page(response)
    }
}

fn pull_requests_query(fields: &[&str]) -> String {
    format!(
        r#"query PullRequests($owner: String!, $name: String!, $last: Int!, $before: String) {{
  repository(owner: $owner, name: $name) {{
    pullRequests(last: $last, before: $before) {{
      pageInfo {{
        hasPreviousPage
        startCursor
      }}
      edges {{
        node {{
          author {{
            login
          }}
          {}
        }}
      }}
    }}
  }}
}}"#,
        fields.join("\n          ")
    )
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct ResponseData {
    repository: Option<Repository>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    pull_requests: Connection,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    page_info: PageInfo,
    edges: Vec<Edge>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_previous_page: bool,
    start_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Edge {
    node: PullRequestRecord,
}

/// Converts a raw GraphQL response body into a page.
fn parse_page(response: Value) -> Result<PullRequestPage, FetchError> {
    let response: GraphQlResponse = serde_json::from_value(response)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        tracing::error!(errors = ?messages, "GraphQL query failed");
        return Err(FetchError::Api(messages));
    }

    let connection = response
        .data
        .and_then(|data| data.repository)
        .map(|repository| repository.pull_requests)
        .ok_or_else(|| FetchError::MalformedResponse("missing repository".to_string()))?;

    Ok(PullRequestPage {
        records: connection.edges.into_iter().map(|edge| edge.node).collect(),
        has_more: connection.page_info.has_previous_page,
        next_cursor: connection.page_info.start_cursor,
    })
}
