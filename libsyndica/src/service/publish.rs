//! The publish cycle
//!
//! One cycle selects due posts, resolves their media, fans each post out to
//! its linked accounts, and commits the merged outcomes. Posts are isolated
//! from each other: any single post's failure is recorded in its report
//! entry while its siblings proceed. Only selection itself is fatal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::{dispatch_post, merge_statuses};
use crate::error::{Result, SyndicaError};
use crate::hydrate::{hydrate_post, UrlSigner};
use crate::platforms::PublisherRouter;
use crate::store::PostStore;
use crate::types::{PlatformResult, Post, PostStatus};

#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Status allow-list for selection; validated against the store's
    /// disjunction limit before any query.
    pub statuses: Vec<String>,
    /// Selection window length in minutes, `[now - window, now]`.
    pub window_minutes: i64,
    /// TTL for signed media URLs.
    pub url_ttl: Duration,
}

impl PublishOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            statuses: config.publish.statuses.clone(),
            window_minutes: config.publish.window_minutes,
            url_ttl: Duration::from_secs(config.signer.url_ttl_secs),
        }
    }
}

/// Per-post outcome in a cycle report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome")]
pub enum PostOutcome {
    /// At least one account accepted the post.
    Published {
        results: Vec<PlatformResult>,
        skipped: Vec<String>,
    },
    /// Every routed account failed; the post is marked failed.
    Failed {
        results: Vec<PlatformResult>,
        skipped: Vec<String>,
    },
    /// The post had no media items and was left untouched.
    SkippedNoMedia,
    /// Media resolution failed; nothing was dispatched or written.
    HydrationFailed { reason: String },
    /// Dispatch ran but the outcome could not be written back.
    CommitFailed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PostReport {
    pub post_id: String,
    #[serde(flatten)]
    pub outcome: PostOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub selected: usize,
    pub posts: Vec<PostReport>,
}

impl CycleReport {
    pub fn published_count(&self) -> usize {
        self.posts
            .iter()
            .filter(|p| matches!(p.outcome, PostOutcome::Published { .. }))
            .count()
    }
}

pub struct PublishService {
    store: PostStore,
    signer: Arc<dyn UrlSigner>,
    router: PublisherRouter,
    options: PublishOptions,
}

impl PublishService {
    pub fn new(
        store: PostStore,
        signer: Arc<dyn UrlSigner>,
        router: PublisherRouter,
        options: PublishOptions,
    ) -> Self {
        Self {
            store,
            signer,
            router,
            options,
        }
    }

    /// Run one publish cycle against the given clock reading.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let statuses = self.parse_statuses()?;
        let start = now - chrono::Duration::minutes(self.options.window_minutes);

        let due = self.store.select_due(&statuses, start, now).await?;
        info!(selected = due.len(), "Selected due posts");

        let reports = join_all(due.iter().map(|post| self.process_post(post))).await;

        Ok(CycleReport {
            selected: due.len(),
            posts: reports,
        })
    }

    fn parse_statuses(&self) -> Result<Vec<PostStatus>> {
        self.options
            .statuses
            .iter()
            .map(|s| {
                PostStatus::parse(s)
                    .ok_or_else(|| SyndicaError::InvalidInput(format!("unknown status: {}", s)))
            })
            .collect()
    }

    async fn process_post(&self, post: &Post) -> PostReport {
        let outcome = self.try_process(post).await;
        PostReport {
            post_id: post.id.clone(),
            outcome,
        }
    }

    async fn try_process(&self, post: &Post) -> PostOutcome {
        if post.media.is_empty() {
            warn!(post_id = %post.id, "Post has no media, skipping");
            return PostOutcome::SkippedNoMedia;
        }

        let hydrated = match hydrate_post(post, self.signer.as_ref(), self.options.url_ttl).await {
            Ok(hydrated) => hydrated,
            Err(err) => {
                warn!(post_id = %post.id, "Hydration failed: {}", err);
                return PostOutcome::HydrationFailed {
                    reason: err.to_string(),
                };
            }
        };

        let accounts = match self.store.get_accounts(&post.account_ids).await {
            Ok(accounts) => accounts,
            Err(err) => {
                return PostOutcome::CommitFailed {
                    reason: format!("account lookup failed: {}", err),
                }
            }
        };

        let dispatched = dispatch_post(&hydrated, &accounts, &self.router).await;
        let merged = merge_statuses(&post.platform_statuses, &dispatched.results);

        // All-failed cycles mark the post failed; any success publishes it
        let status = if dispatched.all_failed() {
            PostStatus::Failed
        } else {
            PostStatus::Published
        };

        if let Err(err) = self.store.commit_publish(&post.id, &merged, status).await {
            warn!(post_id = %post.id, "Commit failed: {}", err);
            return PostOutcome::CommitFailed {
                reason: err.to_string(),
            };
        }

        info!(post_id = %post.id, status = %status, results = dispatched.results.len(),
              "Post cycle committed");

        match status {
            PostStatus::Failed => PostOutcome::Failed {
                results: dispatched.results,
                skipped: dispatched.skipped,
            },
            _ => PostOutcome::Published {
                results: dispatched.results,
                skipped: dispatched.skipped,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_report_serializes_with_outcome_tag() {
        let report = CycleReport {
            selected: 1,
            posts: vec![PostReport {
                post_id: "post-1".into(),
                outcome: PostOutcome::SkippedNoMedia,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["selected"], 1);
        assert_eq!(json["posts"][0]["post_id"], "post-1");
        assert_eq!(json["posts"][0]["outcome"], "SkippedNoMedia");
    }

    #[test]
    fn test_published_count() {
        let report = CycleReport {
            selected: 2,
            posts: vec![
                PostReport {
                    post_id: "a".into(),
                    outcome: PostOutcome::Published {
                        results: vec![],
                        skipped: vec![],
                    },
                },
                PostReport {
                    post_id: "b".into(),
                    outcome: PostOutcome::HydrationFailed {
                        reason: "malformed ref".into(),
                    },
                },
            ],
        };
        assert_eq!(report.published_count(), 1);
    }
}
