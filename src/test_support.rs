//! Fixtures shared by the unit tests.

use crate::github::{AuthorAssociation, PrState, PullRequestRecord};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub struct PrBuilder {
    record: PullRequestRecord,
}

/// A pull request by `author1` with no association, created `days_ago` before [`now`].
/// Handled pull requests are closed at [`now`].
pub fn pr(state: PrState, days_ago: i64) -> PrBuilder {
    PrBuilder {
        record: PullRequestRecord {
            state,
            created_at: now() - Duration::days(days_ago),
            closed_at: (state != PrState::Open).then(now),
            author_association: None,
            author: Some("author1".to_string()),
            title: "Improve error messages".to_string(),
            permalink: "https://github.com/octo/cat/pull/1".to_string(),
            number: Some(1),
        },
    }
}

impl PrBuilder {
    pub fn title(mut self, title: &str) -> Self {
        self.record.title = title.to_string();
        self
    }

    pub fn author(mut self, login: &str) -> Self {
        self.record.author = Some(login.to_string());
        self
    }

    /// Author account deleted.
    pub fn ghost(mut self) -> Self {
        self.record.author = None;
        self
    }

    pub fn association(mut self, association: AuthorAssociation) -> Self {
        self.record.author_association = Some(association);
        self
    }

    pub fn no_association(mut self) -> Self {
        self.record.author_association = None;
        self
    }

    pub fn closed_after(mut self, duration: Duration) -> Self {
        self.record.closed_at = Some(self.record.created_at + duration);
        self
    }

    pub fn build(self) -> PullRequestRecord {
        self.record
    }
}

/// Every combination of open/closed/merged/stale with outsider and insider authors.
pub fn mixed_fixture() -> Vec<PullRequestRecord> {
    vec![
        pr(PrState::Open, 0).build(),
        pr(PrState::Closed, 0).build(),
        pr(PrState::Merged, 0).build(),
        pr(PrState::Open, 91).build(),
        pr(PrState::Open, 0).association(AuthorAssociation::Member).build(),
        pr(PrState::Closed, 0).association(AuthorAssociation::Member).build(),
        pr(PrState::Merged, 0).association(AuthorAssociation::Member).build(),
        pr(PrState::Open, 91).association(AuthorAssociation::Member).build(),
    ]
}
