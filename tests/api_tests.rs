use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use mergechance::{
    config::{AppConfig, RepoId},
    create_app,
    error::FetchError,
    github::{AuthorAssociation, PrState, PullRequestPage, PullRequestRecord, PullRequestSource},
    AppState,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

/// Serves the same page for every request, or fails every request.
struct FakeSource {
    records: Vec<PullRequestRecord>,
    has_more: bool,
    fail: bool,
    calls: AtomicU32,
}

impl FakeSource {
    fn serving(records: Vec<PullRequestRecord>) -> Arc<Self> {
        Arc::new(Self {
            records,
            has_more: false,
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            records: vec![],
            has_more: false,
            fail: true,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullRequestSource for FakeSource {
    async fn fetch_page(
        &self,
        _repo: &RepoId,
        cursor: Option<&str>,
        _fields: &[&str],
    ) -> Result<PullRequestPage, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FetchError::Api(vec!["API rate limit exceeded".to_string()]));
        }
        Ok(PullRequestPage {
            records: self.records.clone(),
            has_more: self.has_more,
            next_cursor: Some(format!("{}-{call}", cursor.unwrap_or("start"))),
        })
    }
}

fn pr(
    state: PrState,
    days_ago: i64,
    association: Option<AuthorAssociation>,
    title: &str,
) -> PullRequestRecord {
    let created_at = Utc::now() - Duration::days(days_ago);
    PullRequestRecord {
        state,
        created_at,
        closed_at: (state != PrState::Open).then(|| created_at + Duration::hours(36)),
        author_association: association,
        author: Some("author1".to_string()),
        title: title.to_string(),
        permalink: "https://github.com/octo/cat/pull/1".to_string(),
        number: Some(1),
    }
}

/// Open/closed/merged/stale pull requests from both outsiders and members.
fn mixed_records() -> Vec<PullRequestRecord> {
    let member = Some(AuthorAssociation::Member);
    vec![
        pr(PrState::Open, 0, None, "Add dark mode"),
        pr(PrState::Closed, 3, None, "Add dark mode"),
        pr(PrState::Merged, 3, None, "Add dark mode"),
        pr(PrState::Open, 91, None, "Add dark mode"),
        pr(PrState::Open, 0, member, "Add dark mode"),
        pr(PrState::Closed, 3, member, "Add dark mode"),
        pr(PrState::Merged, 3, member, "Add dark mode"),
        pr(PrState::Open, 91, member, "Add dark mode"),
        pr(PrState::Merged, 3, None, "Update README"),
    ]
}

fn app_with(source: Arc<FakeSource>) -> Router {
    let config = AppConfig {
        max_github_api_pages: 3,
        ..AppConfig::default()
    };
    create_app(Arc::new(AppState::with_source(config, source)))
}

async fn send(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(app_with(FakeSource::serving(vec![])), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    let body_json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body_json["status"], "ok");
    assert_eq!(body_json["service"], "mergechance");
}

#[test]
fn test_state_requires_token() {
    assert!(AppState::new(AppConfig::default()).is_err());
}

#[tokio::test]
async fn test_get_repo_chance() {
    let source = FakeSource::serving(mixed_records());
    let (status, body) = send(app_with(source.clone()), "/api/repos/Octo/Cat/chance").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["repo"], "octo/cat");
    assert_eq!(json["total_considered"], 3);
    assert_eq!(json["chance_percent"], 33.33);
    assert_eq!(json["median_days_to_close"], 1.5);

    // The only page reports no older history.
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_prolific_author_becomes_implied_insider() {
    let source = Arc::new(FakeSource {
        records: mixed_records(),
        has_more: true,
        fail: false,
        calls: AtomicU32::new(0),
    });
    let (status, _) = send(app_with(source.clone()), "/api/repos/octo/cat/chance").await;

    // Two merged PRs per page: author1 passes five merges on the third page, which
    // reclassifies all of their earlier outsider PRs and leaves nothing to count.
    assert_eq!(source.calls(), 3);
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cached_report_is_reused() {
    let source = FakeSource::serving(mixed_records());
    let app = app_with(source.clone());

    let (first, _) = send(app.clone(), "/api/repos/octo/cat/chance").await;
    let (second, _) = send(app.clone(), "/api/badge?repo=https://github.com/octo/cat").await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(source.calls(), 1);

    let (_, body) = send(app, "/api/autocomplete").await;
    let names: Vec<String> = serde_json::from_str(&body).unwrap();
    assert_eq!(names, vec!["octo/cat".to_string()]);
}

#[tokio::test]
async fn test_badge_payload() {
    let (status, body) = send(
        app_with(FakeSource::serving(mixed_records())),
        "/api/badge?repo=octo/cat",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["schemaVersion"], 1);
    assert_eq!(json["label"], "Merge Chance");
    assert_eq!(json["message"], "33.33%");
}

#[tokio::test]
async fn test_malformed_repo_is_rejected_before_fetching() {
    let source = FakeSource::serving(mixed_records());
    let (status, _) = send(app_with(source.clone()), "/api/badge?repo=not-a-repo").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app_with(source.clone()), "/api/badge").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_insufficient_data_is_not_found() {
    let source = FakeSource::serving(vec![pr(PrState::Open, 1, None, "Add dark mode")]);
    let (status, _) = send(app_with(source), "/api/repos/octo/cat/chance").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fetch_failure_is_not_found() {
    let source = FakeSource::failing();
    let app = app_with(source.clone());

    let (status, _) = send(app.clone(), "/api/repos/octo/cat/chance").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(source.calls(), 1);

    let (_, body) = send(app, "/api/autocomplete").await;
    assert_eq!(body, "[]");
}

#[tokio::test]
async fn test_export_source_prs() {
    let (status, body) = send(
        app_with(FakeSource::serving(mixed_records())),
        "/api/repos/octo/cat/export",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("author\t"));
    assert!(lines[1].ends_with("\tRejected"));
    assert!(lines[2].ends_with("\tSuccessful"));
    assert!(lines[3].ends_with("\tStale"));
}

#[tokio::test]
async fn test_export_history_is_unfiltered() {
    let source = Arc::new(FakeSource {
        records: mixed_records(),
        has_more: true,
        fail: false,
        calls: AtomicU32::new(0),
    });
    let (status, body) = send(
        app_with(source.clone()),
        "/api/repos/octo/cat/history?pages=2",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.calls(), 2);
    assert_eq!(body.lines().count(), 1 + 2 * mixed_records().len());
}
