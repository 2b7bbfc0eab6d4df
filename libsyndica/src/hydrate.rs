//! Signed-URL resolution for storage-backed media
//!
//! Posts arrive holding opaque storage references (`gs://bucket/object`).
//! Before dispatch every reference is resolved into a time-limited fetchable
//! URL; items that already carry a usable URL pass through untouched, so
//! hydration is idempotent. Applies uniformly to primary media, carousel
//! children, and thumbnails.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ResolutionError;
use crate::types::{MediaItem, Post};

/// A parsed durable storage reference (bucket + object path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRef {
    pub bucket: String,
    pub object: String,
}

impl StorageRef {
    /// Parse a `gs://bucket/object` reference. Returns `None` for anything
    /// that is not a storage reference at all (plain URLs, empty strings).
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix("gs://")?;
        let (bucket, object) = rest.split_once('/')?;
        if bucket.is_empty() || object.is_empty() {
            return None;
        }
        Some(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }
}

/// Produces time-limited read URLs for blob-store objects.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign_read_url(
        &self,
        storage_ref: &StorageRef,
        ttl: Duration,
    ) -> Result<String, ResolutionError>;
}

/// HMAC-SHA256 query-string signer.
///
/// URL form: `{endpoint}/{bucket}/{object}?expires={unix}&signature={token}`
/// where the token authenticates bucket, object, and expiry against the
/// shared key. Two signings of the same reference within its TTL yield URLs
/// addressing the same object, not necessarily byte-identical strings.
pub struct HmacSigner {
    endpoint: String,
    key: Vec<u8>,
}

impl HmacSigner {
    /// `key_b64` is the standard-base64 shared key from the signer config.
    pub fn new(endpoint: impl Into<String>, key_b64: &str) -> Result<Self, ResolutionError> {
        let key = STANDARD
            .decode(key_b64)
            .map_err(|e| ResolutionError::Signing {
                object: "<signer key>".to_string(),
                reason: format!("invalid base64 key: {}", e),
            })?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key,
        })
    }
}

#[async_trait]
impl UrlSigner for HmacSigner {
    async fn sign_read_url(
        &self,
        storage_ref: &StorageRef,
        ttl: Duration,
    ) -> Result<String, ResolutionError> {
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;

        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.key).map_err(|e| ResolutionError::Signing {
                object: storage_ref.object.clone(),
                reason: e.to_string(),
            })?;
        mac.update(storage_ref.bucket.as_bytes());
        mac.update(b"\n");
        mac.update(storage_ref.object.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        let token = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!(
            "{}/{}/{}?expires={}&signature={}",
            self.endpoint, storage_ref.bucket, storage_ref.object, expires, token
        ))
    }
}

/// Resolve one media item. No-op when a signed URL is already present.
async fn hydrate_item(
    post_id: &str,
    item: &MediaItem,
    signer: &dyn UrlSigner,
    ttl: Duration,
) -> Result<MediaItem, ResolutionError> {
    if item.signed_url.is_some() {
        return Ok(item.clone());
    }

    let raw = item
        .storage_ref
        .as_deref()
        .ok_or_else(|| ResolutionError::MissingSource(post_id.to_string()))?;

    let mut next = item.clone();
    if let Some(storage_ref) = StorageRef::parse(raw) {
        next.signed_url = Some(signer.sign_read_url(&storage_ref, ttl).await?);
    } else if raw.starts_with("http://") || raw.starts_with("https://") {
        // Already a fetchable URL: returned unchanged
        next.signed_url = Some(raw.to_string());
    } else {
        return Err(ResolutionError::MalformedRef(raw.to_string()));
    }
    Ok(next)
}

/// Resolve every media item and the thumbnail of a post.
///
/// Returns a hydrated copy; the input is untouched. Any single item's
/// failure aborts the whole post's hydration, since every downstream
/// adapter depends on a working URL.
pub async fn hydrate_post(
    post: &Post,
    signer: &dyn UrlSigner,
    ttl: Duration,
) -> Result<Post, ResolutionError> {
    let mut hydrated = post.clone();

    let mut media = Vec::with_capacity(post.media.len());
    for item in &post.media {
        media.push(hydrate_item(&post.id, item, signer, ttl).await?);
    }
    hydrated.media = media;

    if let Some(thumbnail) = &post.thumbnail {
        hydrated.thumbnail = Some(hydrate_item(&post.id, thumbnail, signer, ttl).await?);
    }

    Ok(hydrated)
}

// Available for all builds (not just tests) to support integration tests
pub mod testing {
    use super::*;

    /// Signer that produces deterministic URLs without any key material.
    pub struct StaticSigner;

    #[async_trait]
    impl UrlSigner for StaticSigner {
        async fn sign_read_url(
            &self,
            storage_ref: &StorageRef,
            _ttl: Duration,
        ) -> Result<String, ResolutionError> {
            Ok(format!(
                "https://signed.test/{}/{}",
                storage_ref.bucket, storage_ref.object
            ))
        }
    }

    /// Signer that fails every request, for abort-path tests.
    pub struct FailingSigner;

    #[async_trait]
    impl UrlSigner for FailingSigner {
        async fn sign_read_url(
            &self,
            storage_ref: &StorageRef,
            _ttl: Duration,
        ) -> Result<String, ResolutionError> {
            Err(ResolutionError::Signing {
                object: storage_ref.object.clone(),
                reason: "object not found".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingSigner, StaticSigner};
    use super::*;
    use crate::types::{MediaKind, PostKind};
    use chrono::Utc;

    #[test]
    fn test_storage_ref_parse() {
        let parsed = StorageRef::parse("gs://my-bucket/media/2026/a.jpg").unwrap();
        assert_eq!(parsed.bucket, "my-bucket");
        assert_eq!(parsed.object, "media/2026/a.jpg");

        assert_eq!(StorageRef::parse("https://cdn.example.com/a.jpg"), None);
        assert_eq!(StorageRef::parse("gs://bucket-only"), None);
        assert_eq!(StorageRef::parse("gs:///no-bucket"), None);
        assert_eq!(StorageRef::parse(""), None);
    }

    #[tokio::test]
    async fn test_hydrate_is_noop_for_already_hydrated_items() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        post.media.push(MediaItem::from_url(
            "https://cdn.example.com/a.jpg",
            MediaKind::Image,
        ));

        let hydrated = hydrate_post(&post, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap();

        // Returned unchanged, not re-signed
        assert_eq!(hydrated.media, post.media);
    }

    #[tokio::test]
    async fn test_hydrate_signs_storage_refs_and_thumbnail() {
        let mut post = Post::new(PostKind::Carousel, Utc::now());
        post.media
            .push(MediaItem::from_ref("gs://bucket/a.jpg", MediaKind::Image));
        post.media
            .push(MediaItem::from_ref("gs://bucket/b.mp4", MediaKind::Video));
        post.thumbnail = Some(MediaItem::from_ref("gs://bucket/thumb.jpg", MediaKind::Image));

        let hydrated = hydrate_post(&post, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            hydrated.media[0].signed_url.as_deref(),
            Some("https://signed.test/bucket/a.jpg")
        );
        assert_eq!(
            hydrated.media[1].signed_url.as_deref(),
            Some("https://signed.test/bucket/b.mp4")
        );
        assert_eq!(
            hydrated.thumbnail.unwrap().signed_url.as_deref(),
            Some("https://signed.test/bucket/thumb.jpg")
        );
        // Refs are kept alongside the resolved URLs
        assert_eq!(hydrated.media[0].storage_ref.as_deref(), Some("gs://bucket/a.jpg"));
    }

    #[tokio::test]
    async fn test_hydrate_passes_plain_urls_in_ref_position() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        post.media.push(MediaItem::from_ref(
            "https://cdn.example.com/direct.jpg",
            MediaKind::Image,
        ));

        let hydrated = hydrate_post(&post, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(
            hydrated.media[0].signed_url.as_deref(),
            Some("https://cdn.example.com/direct.jpg")
        );
    }

    #[tokio::test]
    async fn test_hydrate_idempotent_on_second_pass() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        post.media
            .push(MediaItem::from_ref("gs://bucket/a.jpg", MediaKind::Image));

        let once = hydrate_post(&post, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap();
        let twice = hydrate_post(&once, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(once.media, twice.media);
    }

    #[tokio::test]
    async fn test_hydrate_malformed_ref_aborts_post() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        post.media
            .push(MediaItem::from_ref("gs://bucket/a.jpg", MediaKind::Image));
        post.media
            .push(MediaItem::from_ref("ftp://oldschool/b.jpg", MediaKind::Image));

        let err = hydrate_post(&post, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MalformedRef(_)));
    }

    #[tokio::test]
    async fn test_hydrate_missing_source_aborts_post() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        post.media.push(MediaItem {
            storage_ref: None,
            signed_url: None,
            kind: MediaKind::Image,
        });

        let err = hydrate_post(&post, &StaticSigner, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MissingSource(_)));
    }

    #[tokio::test]
    async fn test_hydrate_signing_failure_aborts_post() {
        let mut post = Post::new(PostKind::Image, Utc::now());
        post.media
            .push(MediaItem::from_ref("gs://bucket/missing.jpg", MediaKind::Image));

        let err = hydrate_post(&post, &FailingSigner, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Signing { .. }));
    }

    #[tokio::test]
    async fn test_hmac_signer_urls_address_same_object() {
        let signer = HmacSigner::new("https://storage.example.com/", "c2VjcmV0LWtleQ==").unwrap();
        let storage_ref = StorageRef::parse("gs://bucket/a.jpg").unwrap();

        let first = signer
            .sign_read_url(&storage_ref, Duration::from_secs(600))
            .await
            .unwrap();
        let second = signer
            .sign_read_url(&storage_ref, Duration::from_secs(600))
            .await
            .unwrap();

        // Both resolve to the same underlying object path
        assert!(first.starts_with("https://storage.example.com/bucket/a.jpg?"));
        assert!(second.starts_with("https://storage.example.com/bucket/a.jpg?"));
        assert!(first.contains("signature="));
    }

    #[test]
    fn test_hmac_signer_rejects_bad_key() {
        let result = HmacSigner::new("https://storage.example.com", "not base64!!");
        assert!(result.is_err());
    }
}
