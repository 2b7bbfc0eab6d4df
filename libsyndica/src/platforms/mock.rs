//! Mock publisher for testing
//!
//! Records every submission and answers with a configured outcome, so
//! dispatch and service tests can run without any network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::platforms::PlatformPublisher;
use crate::types::{PlatformAccount, PlatformKind, PlatformResult, Post};

#[derive(Debug, Clone)]
enum MockBehavior {
    Succeed,
    Fail(Value),
    /// Fail for the account ids listed, succeed for everyone else.
    FailFor(Vec<String>, Value),
}

/// One recorded submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub post_id: String,
    pub account_id: String,
}

pub struct MockPublisher {
    platform: PlatformKind,
    behavior: MockBehavior,
    submissions: Arc<Mutex<Vec<Submission>>>,
}

impl MockPublisher {
    pub fn succeeding(platform: PlatformKind) -> Self {
        Self {
            platform,
            behavior: MockBehavior::Succeed,
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(platform: PlatformKind, diagnostic: Value) -> Self {
        Self {
            platform,
            behavior: MockBehavior::Fail(diagnostic),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_for(
        platform: PlatformKind,
        account_ids: Vec<String>,
        diagnostic: Value,
    ) -> Self {
        Self {
            platform,
            behavior: MockBehavior::FailFor(account_ids, diagnostic),
            submissions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the recorded submissions, for assertions after the
    /// publisher has been boxed into a router.
    pub fn submissions_handle(&self) -> Arc<Mutex<Vec<Submission>>> {
        self.submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl PlatformPublisher for MockPublisher {
    async fn submit(&self, post: &Post, account: &PlatformAccount) -> PlatformResult {
        self.submissions.lock().unwrap().push(Submission {
            post_id: post.id.clone(),
            account_id: account.id.clone(),
        });

        match &self.behavior {
            MockBehavior::Succeed => {
                PlatformResult::published(&account.id, format!("mock-{}", post.id))
            }
            MockBehavior::Fail(diagnostic) => {
                PlatformResult::failed(&account.id, diagnostic.clone())
            }
            MockBehavior::FailFor(ids, diagnostic) => {
                if ids.contains(&account.id) {
                    PlatformResult::failed(&account.id, diagnostic.clone())
                } else {
                    PlatformResult::published(&account.id, format!("mock-{}", post.id))
                }
            }
        }
    }

    fn platform(&self) -> PlatformKind {
        self.platform.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostKind;
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_records_and_succeeds() {
        let publisher = MockPublisher::succeeding(PlatformKind::Facebook);
        let post = Post::new(PostKind::Image, Utc::now());
        let account = PlatformAccount::new(PlatformKind::Facebook, "page-1");

        let result = publisher.submit(&post, &account).await;
        assert!(result.is_published());
        assert_eq!(result.creation_id.as_deref(), Some(&*format!("mock-{}", post.id)));
        assert_eq!(publisher.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_selective_failure() {
        let publisher = MockPublisher::failing_for(
            PlatformKind::Pinterest,
            vec!["bad-account".into()],
            json!({"message": "board missing"}),
        );
        let post = Post::new(PostKind::Image, Utc::now());

        let mut bad = PlatformAccount::new(PlatformKind::Pinterest, "pin-1");
        bad.id = "bad-account".into();
        let good = PlatformAccount::new(PlatformKind::Pinterest, "pin-2");

        assert!(publisher.submit(&post, &bad).await.is_failed());
        assert!(publisher.submit(&post, &good).await.is_published());
    }
}
