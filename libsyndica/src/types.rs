//! Core types for Syndica

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A scheduled piece of content with media, targeted at one or more
/// platform accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub status: PostStatus,
    pub kind: PostKind,
    pub scheduled_publish_time: DateTime<Utc>,
    pub caption: Option<String>,
    pub title: Option<String>,
    /// Ordered media sequence; must be non-empty for a post to be dispatched.
    pub media: Vec<MediaItem>,
    pub thumbnail: Option<MediaItem>,
    /// Linked account ids; entries that do not resolve to a stored account
    /// are silently dropped at dispatch time.
    pub account_ids: Vec<String>,
    /// Per-account publish outcomes, keyed by account id. Later attempts
    /// shallow-merge into the account's entry, never append.
    pub platform_statuses: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(kind: PostKind, scheduled_publish_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: PostStatus::Scheduled,
            kind,
            scheduled_publish_time,
            caption: None,
            title: None,
            media: Vec::new(),
            thumbnail: None,
            account_ids: Vec::new(),
            platform_statuses: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// First media item's fetchable URL, if hydration produced one.
    pub fn primary_url(&self) -> Option<&str> {
        self.media.first().and_then(|m| m.signed_url.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum PostStatus {
    Scheduled,
    Uploaded,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Uploaded => "Uploaded",
            Self::Published => "Published",
            Self::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Scheduled" => Some(Self::Scheduled),
            "Uploaded" => Some(Self::Uploaded),
            "Published" => Some(Self::Published),
            "Failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives which upload protocol an adapter runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostKind {
    Image,
    Video,
    Reel,
    Carousel,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "Image",
            Self::Video => "Video",
            Self::Reel => "Reel",
            Self::Carousel => "Carousel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Image" => Some(Self::Image),
            "Video" => Some(Self::Video),
            "Reel" => Some(Self::Reel),
            "Carousel" => Some(Self::Carousel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// One media item: a durable storage reference, an already-resolved URL,
/// or both after hydration. Used for primary media, carousel children,
/// and thumbnails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_url: Option<String>,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn from_ref(storage_ref: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            storage_ref: Some(storage_ref.into()),
            signed_url: None,
            kind,
        }
    }

    pub fn from_url(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            storage_ref: None,
            signed_url: Some(url.into()),
            kind,
        }
    }
}

/// External platform identity. Open for extension: unrecognized platform
/// names round-trip as `Other` and are skipped by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum PlatformKind {
    Facebook,
    Instagram,
    Pinterest,
    Other(String),
}

impl PlatformKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
            Self::Pinterest => "Pinterest",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for PlatformKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Facebook" => Self::Facebook,
            "Instagram" => Self::Instagram,
            "Pinterest" => Self::Pinterest,
            _ => Self::Other(s),
        }
    }
}

impl From<PlatformKind> for String {
    fn from(kind: PlatformKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached Pinterest board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Board {
    pub id: String,
    pub name: String,
}

/// A credentialed identity on one external platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformAccount {
    pub id: String,
    pub platform: PlatformKind,
    /// Platform-side identifier: page id (Facebook), user id (Instagram),
    /// account id (Pinterest).
    pub external_id: String,
    pub authorization_key: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<i64>,
    /// Pending OAuth authorization code, consumed by the token entry point.
    pub auth_code: Option<String>,
    /// Default board for pins when no per-post mapping exists.
    pub board_id: Option<String>,
    /// Per-post board mapping (post id -> board id).
    pub post_boards: BTreeMap<String, String>,
    /// Board cache refreshed by the board-sync entry point.
    pub boards: Vec<Board>,
    pub updated_at: DateTime<Utc>,
}

impl PlatformAccount {
    pub fn new(platform: PlatformKind, external_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform,
            external_id: external_id.into(),
            authorization_key: None,
            access_token: None,
            refresh_token: None,
            token_expires_at: None,
            auth_code: None,
            board_id: None,
            post_boards: BTreeMap::new(),
            boards: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Board for this post: per-post mapping first, account default second.
    pub fn board_for(&self, post_id: &str) -> Option<&str> {
        self.post_boards
            .get(post_id)
            .map(String::as_str)
            .or(self.board_id.as_deref())
    }

    /// Credential used for platform calls. Some links store it under
    /// `authorization_key`, others under `access_token`.
    pub fn credential(&self) -> Option<&str> {
        self.authorization_key
            .as_deref()
            .or(self.access_token.as_deref())
    }
}

/// Per-account publish outcome, as reported by an adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Failed,
    Uploading,
}

/// Result of one publish attempt for one account. Later attempts
/// shallow-merge into the account's status entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformResult {
    pub account_id: String,
    pub status: PublishOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_id: Option<String>,
    /// Raw platform diagnostic: response body, a "no response received"
    /// marker, or message text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl PlatformResult {
    pub fn published(account_id: impl Into<String>, creation_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            status: PublishOutcome::Published,
            creation_id: Some(creation_id.into()),
            error: None,
        }
    }

    pub fn failed(account_id: impl Into<String>, error: Value) -> Self {
        Self {
            account_id: account_id.into(),
            status: PublishOutcome::Failed,
            creation_id: None,
            error: Some(error),
        }
    }

    /// The platform accepted the media but the final publish step did not
    /// complete; the creation id is kept so the attempt can be resumed.
    pub fn uploading(
        account_id: impl Into<String>,
        creation_id: impl Into<String>,
        error: Value,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            status: PublishOutcome::Uploading,
            creation_id: Some(creation_id.into()),
            error: Some(error),
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PublishOutcome::Published
    }

    pub fn is_failed(&self) -> bool {
        self.status == PublishOutcome::Failed
    }

    /// The JSON object merged into the post's `platform_statuses` map.
    pub fn as_value(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("account_id".into(), Value::String(self.account_id.clone()));
        map.insert(
            "status".into(),
            Value::String(
                match self.status {
                    PublishOutcome::Published => "Published",
                    PublishOutcome::Failed => "Failed",
                    PublishOutcome::Uploading => "Uploading",
                }
                .to_string(),
            ),
        );
        if let Some(id) = &self.creation_id {
            map.insert("creation_id".into(), Value::String(id.clone()));
        }
        if let Some(error) = &self.error {
            map.insert("error".into(), error.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_post_new_uuid_generation() {
        let post = Post::new(PostKind::Image, Utc::now());
        assert!(uuid::Uuid::parse_str(&post.id).is_ok());
        assert_eq!(post.status, PostStatus::Scheduled);
        assert!(post.media.is_empty());
        assert!(post.platform_statuses.is_empty());
    }

    #[test]
    fn test_post_status_round_trip() {
        for status in [
            PostStatus::Scheduled,
            PostStatus::Uploaded,
            PostStatus::Published,
            PostStatus::Failed,
        ] {
            assert_eq!(PostStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::parse("Pending"), None);
    }

    #[test]
    fn test_post_kind_round_trip() {
        for kind in [
            PostKind::Image,
            PostKind::Video,
            PostKind::Reel,
            PostKind::Carousel,
        ] {
            assert_eq!(PostKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_platform_kind_open_for_extension() {
        let kind: PlatformKind = "Facebook".to_string().into();
        assert_eq!(kind, PlatformKind::Facebook);

        let unknown: PlatformKind = "Threads".to_string().into();
        assert_eq!(unknown, PlatformKind::Other("Threads".to_string()));
        assert_eq!(unknown.as_str(), "Threads");

        // Serde round-trips through the string form
        let json = serde_json::to_string(&PlatformKind::Pinterest).unwrap();
        assert_eq!(json, r#""Pinterest""#);
        let back: PlatformKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PlatformKind::Pinterest);
    }

    #[test]
    fn test_account_board_mapping_prefers_per_post_entry() {
        let mut account = PlatformAccount::new(PlatformKind::Pinterest, "pin-user");
        account.board_id = Some("default-board".into());
        account
            .post_boards
            .insert("post-1".into(), "special-board".into());

        assert_eq!(account.board_for("post-1"), Some("special-board"));
        assert_eq!(account.board_for("post-2"), Some("default-board"));

        account.board_id = None;
        assert_eq!(account.board_for("post-2"), None);
    }

    #[test]
    fn test_account_credential_fallback() {
        let mut account = PlatformAccount::new(PlatformKind::Facebook, "page-1");
        assert_eq!(account.credential(), None);

        account.access_token = Some("tok".into());
        assert_eq!(account.credential(), Some("tok"));

        account.authorization_key = Some("key".into());
        assert_eq!(account.credential(), Some("key"));
    }

    #[test]
    fn test_platform_result_as_value_skips_missing_fields() {
        let ok = PlatformResult::published("acct-1", "creation-9");
        assert_eq!(
            ok.as_value(),
            json!({
                "account_id": "acct-1",
                "status": "Published",
                "creation_id": "creation-9",
            })
        );

        let failed = PlatformResult::failed("acct-2", json!({"code": 190}));
        assert_eq!(
            failed.as_value(),
            json!({
                "account_id": "acct-2",
                "status": "Failed",
                "error": {"code": 190},
            })
        );

        let uploading = PlatformResult::uploading("acct-3", "pin-7", json!({"status": 404}));
        assert_eq!(
            uploading.as_value(),
            json!({
                "account_id": "acct-3",
                "status": "Uploading",
                "creation_id": "pin-7",
                "error": {"status": 404},
            })
        );
    }

    #[test]
    fn test_media_item_constructors() {
        let from_ref = MediaItem::from_ref("gs://bucket/a.jpg", MediaKind::Image);
        assert_eq!(from_ref.storage_ref.as_deref(), Some("gs://bucket/a.jpg"));
        assert_eq!(from_ref.signed_url, None);

        let from_url = MediaItem::from_url("https://cdn.example.com/a.jpg", MediaKind::Image);
        assert_eq!(from_url.storage_ref, None);
        assert!(from_url.signed_url.is_some());
    }

    #[test]
    fn test_primary_url() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        assert_eq!(post.primary_url(), None);

        post.media
            .push(MediaItem::from_ref("gs://bucket/a.jpg", MediaKind::Image));
        assert_eq!(post.primary_url(), None);

        post.media[0].signed_url = Some("https://signed.example.com/a.jpg".into());
        assert_eq!(
            post.primary_url(),
            Some("https://signed.example.com/a.jpg")
        );
    }
}
