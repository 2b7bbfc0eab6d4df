//! Concurrent per-account dispatch and status merging
//!
//! One post fans out to every routed account at once; accounts whose
//! platform has no adapter are skipped and reported, never failed. The
//! merge is pure: a fresh map where each reporting account's fields are
//! shallow-merged over its previous entry and untouched entries survive.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::platforms::PublisherRouter;
use crate::types::{PlatformAccount, PlatformResult, Post};

/// Outcome of fanning one post out to its accounts.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub results: Vec<PlatformResult>,
    /// Account ids whose platform had no routed adapter.
    pub skipped: Vec<String>,
}

impl DispatchOutcome {
    pub fn all_failed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.is_failed())
    }
}

/// Submit the post to every routed account concurrently.
///
/// Result order is unspecified; entries are keyed by account id when
/// merged so ordering never matters.
pub async fn dispatch_post(
    post: &Post,
    accounts: &[PlatformAccount],
    router: &PublisherRouter,
) -> DispatchOutcome {
    let mut skipped = Vec::new();
    let mut submissions = Vec::new();

    for account in accounts {
        match router.route(&account.platform) {
            Some(publisher) => {
                debug!(post_id = %post.id, account_id = %account.id,
                       adapter = publisher.name(), "Submitting to adapter");
                submissions.push(publisher.submit(post, account));
            }
            None => {
                warn!(post_id = %post.id, account_id = %account.id, platform = %account.platform,
                      "No adapter for platform, skipping account");
                skipped.push(account.id.clone());
            }
        }
    }

    let results = join_all(submissions).await;
    DispatchOutcome { results, skipped }
}

/// Merge fresh results into an existing per-account status map.
///
/// Per account key, the result's fields are shallow-merged over the prior
/// entry: new fields win on conflict, fields the result omits survive.
/// Accounts absent from `results` keep their previous entries. Merging
/// the same results twice is a no-op.
pub fn merge_statuses(
    existing: &BTreeMap<String, Value>,
    results: &[PlatformResult],
) -> BTreeMap<String, Value> {
    let mut merged = existing.clone();
    for result in results {
        let fresh = result.as_value();
        match merged.get_mut(&result.account_id) {
            Some(Value::Object(prior)) => {
                if let Value::Object(fields) = fresh {
                    for (key, value) in fields {
                        prior.insert(key, value);
                    }
                }
            }
            // No prior entry, or a non-object one: the result stands alone
            _ => {
                merged.insert(result.account_id.clone(), fresh);
            }
        }
    }
    merged
}
