//! Pinterest adapter, token lifecycle, and board listing
//!
//! Pins are created against a board; the board comes from the account's
//! per-post mapping with the account default as fallback. Pin ingestion is
//! asynchronous, so creation is followed by an existence poll and an
//! explicit publish call. The OAuth pieces (code exchange, refresh, board
//! listing) live here too since they share the same API surface.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{PinterestConfig, PublishConfig};
use crate::error::PlatformError;
use crate::platforms::{read_json_response, AdapterFailure, PlatformPublisher};
use crate::poll::{PollDecision, Poller};
use crate::types::{Board, MediaKind, PlatformAccount, PlatformKind, PlatformResult, Post, PostKind};

pub struct PinterestPublisher {
    client: reqwest::Client,
    api_url: String,
    poller: Poller,
}

impl PinterestPublisher {
    pub fn new(config: &PinterestConfig, publish: &PublishConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            poller: Poller::new(
                Duration::from_secs(publish.poll_interval_secs),
                publish.poll_max_attempts,
            ),
        }
    }

    async fn post_bearer(
        &self,
        url: &str,
        token: &str,
        body: &Value,
    ) -> Result<Value, AdapterFailure> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(AdapterFailure::from)?;
        read_json_response(response).await
    }

    /// Build the pin's media source from the post kind.
    fn media_source(post: &Post) -> Result<Value, AdapterFailure> {
        match post.kind {
            PostKind::Image => {
                let url = post.primary_url().ok_or_else(|| {
                    AdapterFailure::Message("post has no resolved media URL".into())
                })?;
                Ok(json!({"source_type": "image_url", "url": url}))
            }
            PostKind::Video | PostKind::Reel => {
                let url = post.primary_url().ok_or_else(|| {
                    AdapterFailure::Message("post has no resolved media URL".into())
                })?;
                let cover = post
                    .thumbnail
                    .as_ref()
                    .and_then(|t| t.signed_url.as_deref())
                    .ok_or_else(|| {
                        AdapterFailure::Message("video pin requires a resolved cover image".into())
                    })?;
                Ok(json!({
                    "source_type": "video_url",
                    "url": url,
                    "cover_image_url": cover,
                }))
            }
            PostKind::Carousel => {
                let mut items = Vec::with_capacity(post.media.len());
                for item in &post.media {
                    if item.kind != MediaKind::Image {
                        return Err(AdapterFailure::Message(
                            "carousel pins support images only".into(),
                        ));
                    }
                    let url = item.signed_url.as_deref().ok_or_else(|| {
                        AdapterFailure::Message("carousel item has no resolved URL".into())
                    })?;
                    items.push(json!({"url": url}));
                }
                Ok(json!({
                    "source_type": "multiple_image_urls",
                    "items": items,
                }))
            }
        }
    }

    /// Wait until the pin is fetchable. Existence semantics: any successful
    /// read is terminal, fetch failures wait.
    async fn wait_for_pin(&self, pin_id: &str, token: &str) -> Result<(), AdapterFailure> {
        let pin_url = format!("{}/pins/{}", self.api_url, pin_id);
        self.poller
            .run(|attempt| {
                let client = self.client.clone();
                let pin_url = pin_url.clone();
                let token = token.to_string();
                async move {
                    debug!(attempt, pin_id = %pin_id, "Checking pin existence");
                    let response = client.get(&pin_url).bearer_auth(&token).send().await;
                    match response {
                        Ok(resp) if resp.status().is_success() => PollDecision::Ready,
                        Ok(resp) => PollDecision::Retry(format!("status {}", resp.status())),
                        Err(err) => PollDecision::Retry(err.to_string()),
                    }
                }
            })
            .await?;
        Ok(())
    }

    async fn create_pin(
        &self,
        post: &Post,
        token: &str,
        board_id: &str,
    ) -> Result<String, AdapterFailure> {
        let body = json!({
            "board_id": board_id,
            "title": post.title.as_deref().unwrap_or(""),
            "description": post.caption.as_deref().unwrap_or(""),
            "media_source": Self::media_source(post)?,
        });

        let created = self
            .post_bearer(&format!("{}/pins", self.api_url), token, &body)
            .await?;
        created["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AdapterFailure::Message("pin creation returned no id".into()))
    }

    /// Ingestion is asynchronous; wait until the pin is fetchable, then
    /// publish it explicitly.
    async fn finalize_pin(&self, pin_id: &str, token: &str) -> Result<(), AdapterFailure> {
        self.wait_for_pin(pin_id, token).await?;
        self.post_bearer(
            &format!("{}/pins/{}/publish", self.api_url, pin_id),
            token,
            &json!({}),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformPublisher for PinterestPublisher {
    async fn submit(&self, post: &Post, account: &PlatformAccount) -> PlatformResult {
        let Some(token) = account.credential() else {
            return PlatformResult::failed(
                &account.id,
                AdapterFailure::Message("account has no stored credential".into()).diagnostic(),
            );
        };
        let Some(board_id) = account.board_for(&post.id) else {
            return PlatformResult::failed(
                &account.id,
                AdapterFailure::Message("account has no board for this post".into()).diagnostic(),
            );
        };

        let pin_id = match self.create_pin(post, token, board_id).await {
            Ok(pin_id) => pin_id,
            Err(failure) => {
                warn!(post_id = %post.id, account_id = %account.id,
                      "Pinterest pin creation failed: {:?}", failure);
                return PlatformResult::failed(&account.id, failure.diagnostic());
            }
        };

        match self.finalize_pin(&pin_id, token).await {
            Ok(()) => {
                info!(post_id = %post.id, account_id = %account.id, creation_id = %pin_id,
                      "Published to Pinterest");
                PlatformResult::published(&account.id, pin_id)
            }
            Err(failure) => {
                // The pin exists but is not published; keep its id so the
                // attempt can be resumed
                warn!(post_id = %post.id, account_id = %account.id, creation_id = %pin_id,
                      "Pin created but not published: {:?}", failure);
                PlatformResult::uploading(&account.id, pin_id, failure.diagnostic())
            }
        }
    }

    fn platform(&self) -> PlatformKind {
        PlatformKind::Pinterest
    }

    fn name(&self) -> &str {
        "pinterest"
    }
}

/// A minted or refreshed token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Absolute expiry, unix seconds.
    pub expires_at: Option<i64>,
}

/// OAuth client for the Pinterest token endpoints.
pub struct PinterestAuth {
    client: reqwest::Client,
    api_url: String,
    app_id: String,
    app_secret: String,
}

impl PinterestAuth {
    pub fn new(config: &PinterestConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
        }
    }

    /// Exchange a pending authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenPair, PlatformError> {
        self.token_request(&[("grant_type", "authorization_code"), ("code", code)])
            .await
    }

    /// Refresh an expired access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, PlatformError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenPair, PlatformError> {
        let response = self
            .client
            .post(format!("{}/oauth/token", self.api_url))
            .basic_auth(&self.app_id, Some(&self.app_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PlatformError::Network(e.to_string()))?;

        if !status.is_success() {
            // The grant itself was rejected; the link must be re-established
            return Err(PlatformError::AuthExpired(body.to_string()));
        }

        let access_token = body["access_token"]
            .as_str()
            .ok_or_else(|| PlatformError::AuthExpired("token response had no access_token".into()))?
            .to_string();
        let refresh_token = body["refresh_token"].as_str().map(String::from);
        let expires_at = body["expires_in"]
            .as_i64()
            .map(|secs| chrono::Utc::now().timestamp() + secs);

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    /// List every board the account can pin to, following pagination
    /// bookmarks until the end.
    pub async fn list_boards(&self, access_token: &str) -> Result<Vec<Board>, PlatformError> {
        let mut boards = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut url = format!("{}/boards?page_size=100", self.api_url);
            if let Some(mark) = &bookmark {
                url.push_str("&bookmark=");
                url.push_str(mark);
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(access_token)
                .send()
                .await
                .map_err(|e| PlatformError::Network(e.to_string()))?;

            if !response.status().is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(PlatformError::Network(format!(
                    "board listing failed: {}",
                    text
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| PlatformError::Network(e.to_string()))?;

            if let Some(items) = body["items"].as_array() {
                for item in items {
                    if let (Some(id), Some(name)) = (item["id"].as_str(), item["name"].as_str()) {
                        boards.push(Board {
                            id: id.to_string(),
                            name: name.to_string(),
                        });
                    }
                }
            }

            match body["bookmark"].as_str() {
                Some(mark) if !mark.is_empty() => bookmark = Some(mark.to_string()),
                _ => break,
            }
        }

        Ok(boards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaItem;
    use chrono::Utc;

    fn hydrated_post(kind: PostKind) -> Post {
        let mut post = Post::new(kind, Utc::now());
        post.media
            .push(MediaItem::from_url("https://cdn.test/a.jpg", MediaKind::Image));
        post
    }

    #[test]
    fn test_media_source_image() {
        let post = hydrated_post(PostKind::Image);
        let source = PinterestPublisher::media_source(&post).unwrap();
        assert_eq!(source["source_type"], "image_url");
        assert_eq!(source["url"], "https://cdn.test/a.jpg");
    }

    #[test]
    fn test_media_source_video_requires_cover() {
        let mut post = Post::new(PostKind::Video, Utc::now());
        post.media
            .push(MediaItem::from_url("https://cdn.test/a.mp4", MediaKind::Video));

        // Without a thumbnail the source cannot be built
        assert!(PinterestPublisher::media_source(&post).is_err());

        post.thumbnail = Some(MediaItem::from_url(
            "https://cdn.test/cover.jpg",
            MediaKind::Image,
        ));
        let source = PinterestPublisher::media_source(&post).unwrap();
        assert_eq!(source["source_type"], "video_url");
        assert_eq!(source["cover_image_url"], "https://cdn.test/cover.jpg");
    }

    #[test]
    fn test_media_source_carousel() {
        let mut post = hydrated_post(PostKind::Carousel);
        post.media
            .push(MediaItem::from_url("https://cdn.test/b.jpg", MediaKind::Image));

        let source = PinterestPublisher::media_source(&post).unwrap();
        assert_eq!(source["source_type"], "multiple_image_urls");
        assert_eq!(source["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_media_source_carousel_rejects_video_children() {
        let mut post = hydrated_post(PostKind::Carousel);
        post.media
            .push(MediaItem::from_url("https://cdn.test/b.mp4", MediaKind::Video));
        assert!(PinterestPublisher::media_source(&post).is_err());
    }

    #[tokio::test]
    async fn test_submit_without_board_fails_with_diagnostic() {
        let publisher = PinterestPublisher::new(
            &PinterestConfig {
                api_url: "https://api.example.test/v5".into(),
                app_id: "app".into(),
                app_secret: "secret".into(),
            },
            &PublishConfig::default(),
        );
        let post = hydrated_post(PostKind::Image);
        let mut account = PlatformAccount::new(PlatformKind::Pinterest, "pin-1");
        account.access_token = Some("tok".into());

        let result = publisher.submit(&post, &account).await;
        assert!(result.is_failed());
        assert!(result.error.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("board"));
    }
}
