//! Platform adapters and the dispatch seam
//!
//! Each adapter translates a hydrated post into one platform's upload
//! protocol and reports the outcome as a [`PlatformResult`]. Adapters never
//! fail the cycle: any error is captured as a failed result carrying the
//! platform's diagnostic so the dispatcher can record it per account.
//!
//! # Examples
//!
//! ```no_run
//! use libsyndica::platforms::{PlatformPublisher, PublisherRouter};
//! use libsyndica::types::{PlatformKind, Post, PostKind};
//! use chrono::Utc;
//!
//! # async fn example(router: PublisherRouter, account: libsyndica::types::PlatformAccount) {
//! let post = Post::new(PostKind::Image, Utc::now());
//! if let Some(publisher) = router.route(&account.platform) {
//!     let result = publisher.submit(&post, &account).await;
//!     println!("{}: {:?}", result.account_id, result.status);
//! }
//! # }
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::Config;
use crate::poll::PollError;
use crate::types::{PlatformAccount, PlatformKind, PlatformResult, Post};

pub mod facebook;
pub mod instagram;
pub mod pinterest;

// Mock publisher is available for all builds to support integration tests
pub mod mock;

/// A platform's publish protocol behind a uniform seam.
///
/// `submit` is infallible by contract: adapters convert every internal
/// error into a failed [`PlatformResult`] so one account's failure never
/// disturbs its siblings.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// Run the full upload protocol for one post against one account.
    async fn submit(&self, post: &Post, account: &PlatformAccount) -> PlatformResult;

    /// The platform this adapter serves.
    fn platform(&self) -> PlatformKind;

    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;
}

/// Internal adapter failure, converted to a result diagnostic at the seam.
#[derive(Debug, Clone)]
pub enum AdapterFailure {
    /// The platform answered with a non-success status; body captured.
    Response(Value),
    /// The request never produced a response (connect or timeout).
    NoResponse,
    /// Local failure before or between requests.
    Message(String),
    /// Readiness polling exhausted its budget.
    Timeout { attempts: u32, last: String },
}

impl AdapterFailure {
    /// The JSON diagnostic recorded in the account's status entry.
    pub fn diagnostic(&self) -> Value {
        match self {
            Self::Response(body) => body.clone(),
            Self::NoResponse => json!({"message": "no response received"}),
            Self::Message(message) => json!({"message": message}),
            Self::Timeout { attempts, last } => json!({
                "message": format!("timed out after {} attempts", attempts),
                "last": last,
            }),
        }
    }
}

impl From<reqwest::Error> for AdapterFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::NoResponse
        } else {
            Self::Message(err.to_string())
        }
    }
}

impl From<PollError> for AdapterFailure {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Failed(diagnostic) => Self::Message(diagnostic),
            PollError::Timeout { attempts, last } => Self::Timeout { attempts, last },
        }
    }
}

/// POST a JSON body and decode the JSON response.
///
/// Non-success statuses are captured as [`AdapterFailure::Response`] with
/// the body parsed as JSON when possible, raw text otherwise.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<Value, AdapterFailure> {
    let response = client.post(url).json(body).send().await?;
    read_json_response(response).await
}

/// GET a URL and decode the JSON response, with the same error capture
/// as [`post_json`].
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
) -> Result<Value, AdapterFailure> {
    let response = client.get(url).send().await?;
    read_json_response(response).await
}

pub(crate) async fn read_json_response(
    response: reqwest::Response,
) -> Result<Value, AdapterFailure> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json().await?)
    } else {
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| json!({"status": status.as_u16(), "body": text}));
        Err(AdapterFailure::Response(body))
    }
}

/// Routes accounts to the adapter serving their platform.
pub struct PublisherRouter {
    publishers: Vec<Box<dyn PlatformPublisher>>,
}

impl PublisherRouter {
    pub fn new(publishers: Vec<Box<dyn PlatformPublisher>>) -> Self {
        Self { publishers }
    }

    /// Build the router from config. Platforms without a config section are
    /// not routed; their accounts are skipped at dispatch time.
    pub fn from_config(config: &Config) -> Self {
        let mut publishers: Vec<Box<dyn PlatformPublisher>> = Vec::new();

        if let Some(facebook) = &config.facebook {
            publishers.push(Box::new(facebook::FacebookPublisher::new(facebook)));
        }
        if let Some(instagram) = &config.instagram {
            publishers.push(Box::new(instagram::InstagramPublisher::new(
                instagram,
                &config.publish,
            )));
        }
        if let Some(pinterest) = &config.pinterest {
            publishers.push(Box::new(pinterest::PinterestPublisher::new(
                pinterest,
                &config.publish,
            )));
        }

        Self::new(publishers)
    }

    pub fn route(&self, platform: &PlatformKind) -> Option<&dyn PlatformPublisher> {
        self.publishers
            .iter()
            .find(|p| &p.platform() == platform)
            .map(|p| p.as_ref())
    }

    pub fn platforms(&self) -> Vec<PlatformKind> {
        self.publishers.iter().map(|p| p.platform()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockPublisher;
    use super::*;

    #[test]
    fn test_router_routes_by_platform() {
        let router = PublisherRouter::new(vec![
            Box::new(MockPublisher::succeeding(PlatformKind::Facebook)),
            Box::new(MockPublisher::succeeding(PlatformKind::Pinterest)),
        ]);

        assert!(router.route(&PlatformKind::Facebook).is_some());
        assert!(router.route(&PlatformKind::Pinterest).is_some());
        assert!(router.route(&PlatformKind::Instagram).is_none());
        assert!(router
            .route(&PlatformKind::Other("Threads".into()))
            .is_none());
    }

    #[test]
    fn test_failure_diagnostics() {
        let response = AdapterFailure::Response(json!({"error": {"code": 190}}));
        assert_eq!(response.diagnostic(), json!({"error": {"code": 190}}));

        let no_response = AdapterFailure::NoResponse;
        assert_eq!(
            no_response.diagnostic(),
            json!({"message": "no response received"})
        );

        let timeout = AdapterFailure::Timeout {
            attempts: 20,
            last: "status_code=IN_PROGRESS".into(),
        };
        let diagnostic = timeout.diagnostic();
        assert!(diagnostic["message"]
            .as_str()
            .unwrap()
            .contains("20 attempts"));
        assert_eq!(diagnostic["last"], "status_code=IN_PROGRESS");
    }

    #[test]
    fn test_poll_error_conversion() {
        let failure: AdapterFailure = PollError::Timeout {
            attempts: 5,
            last: "still processing".into(),
        }
        .into();
        assert!(matches!(failure, AdapterFailure::Timeout { attempts: 5, .. }));

        let failed: AdapterFailure = PollError::Failed("status_code=ERROR".into()).into();
        assert!(matches!(failed, AdapterFailure::Message(_)));
    }
}
