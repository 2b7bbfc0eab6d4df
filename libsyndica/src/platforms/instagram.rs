//! Instagram adapter
//!
//! Instagram publishes through media containers: create a container for the
//! content, wait for its ingestion to finish, then publish the container.
//! Carousels nest the protocol, one container per child plus a parent
//! container referencing the finished children.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{InstagramConfig, PublishConfig};
use crate::platforms::{get_json, post_json, AdapterFailure, PlatformPublisher};
use crate::poll::{PollDecision, Poller};
use crate::types::{MediaItem, MediaKind, PlatformAccount, PlatformKind, PlatformResult, Post, PostKind};

pub struct InstagramPublisher {
    client: reqwest::Client,
    api_url: String,
    poller: Poller,
}

impl InstagramPublisher {
    pub fn new(config: &InstagramConfig, publish: &PublishConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            poller: Poller::new(
                Duration::from_secs(publish.poll_interval_secs),
                publish.poll_max_attempts,
            ),
        }
    }

    async fn create_container(
        &self,
        ig_user_id: &str,
        body: &Value,
    ) -> Result<String, AdapterFailure> {
        let response = post_json(
            &self.client,
            &format!("{}/{}/media", self.api_url, ig_user_id),
            body,
        )
        .await?;
        response["id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| AdapterFailure::Message("container creation returned no id".into()))
    }

    /// Wait for a container's ingestion. FINISHED is terminal success,
    /// ERROR is terminal failure, everything else waits.
    async fn wait_for_container(
        &self,
        container_id: &str,
        token: &str,
    ) -> Result<(), AdapterFailure> {
        let status_url = format!(
            "{}/{}?fields=status_code&access_token={}",
            self.api_url, container_id, token
        );
        self.poller
            .run(|attempt| {
                let client = self.client.clone();
                let status_url = status_url.clone();
                async move {
                    debug!(attempt, container_id = %container_id, "Checking container status");
                    match get_json(&client, &status_url).await {
                        Ok(body) => match body["status_code"].as_str().unwrap_or("") {
                            "FINISHED" => PollDecision::Ready,
                            "ERROR" => PollDecision::Fail(body.to_string()),
                            other => PollDecision::Retry(format!("status_code={}", other)),
                        },
                        Err(failure) => PollDecision::Retry(failure.diagnostic().to_string()),
                    }
                }
            })
            .await?;
        Ok(())
    }

    async fn publish_container(
        &self,
        ig_user_id: &str,
        container_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let response = post_json(
            &self.client,
            &format!("{}/{}/media_publish", self.api_url, ig_user_id),
            &json!({"creation_id": container_id, "access_token": token}),
        )
        .await?;
        // Published media id; the container id is reported if absent
        Ok(response["id"]
            .as_str()
            .unwrap_or(container_id)
            .to_string())
    }

    fn single_container_body(
        post: &Post,
        item: &MediaItem,
        url: &str,
        token: &str,
    ) -> Value {
        let mut body = json!({
            "caption": post.caption.as_deref().unwrap_or(""),
            "access_token": token,
        });
        match (post.kind, item.kind) {
            (PostKind::Reel, _) => {
                body["media_type"] = json!("REELS");
                body["video_url"] = json!(url);
            }
            (_, MediaKind::Video) => {
                body["media_type"] = json!("VIDEO");
                body["video_url"] = json!(url);
            }
            (_, MediaKind::Image) => {
                body["image_url"] = json!(url);
            }
        }
        body
    }

    async fn publish_single(
        &self,
        post: &Post,
        ig_user_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let item = post
            .media
            .first()
            .ok_or_else(|| AdapterFailure::Message("post has no media".into()))?;
        let url = item
            .signed_url
            .as_deref()
            .ok_or_else(|| AdapterFailure::Message("post has no resolved media URL".into()))?;

        let body = Self::single_container_body(post, item, url, token);
        let container_id = self.create_container(ig_user_id, &body).await?;
        self.wait_for_container(&container_id, token).await?;
        self.publish_container(ig_user_id, &container_id, token)
            .await
    }

    /// Carousel: one finished container per child, then a parent container
    /// referencing the children, then one publish.
    async fn publish_carousel(
        &self,
        post: &Post,
        ig_user_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let mut children = Vec::with_capacity(post.media.len());
        for item in &post.media {
            let url = item.signed_url.as_deref().ok_or_else(|| {
                AdapterFailure::Message("carousel item has no resolved URL".into())
            })?;
            let mut body = json!({
                "is_carousel_item": true,
                "access_token": token,
            });
            match item.kind {
                MediaKind::Image => body["image_url"] = json!(url),
                MediaKind::Video => {
                    body["media_type"] = json!("VIDEO");
                    body["video_url"] = json!(url);
                }
            }
            let child_id = self.create_container(ig_user_id, &body).await?;
            self.wait_for_container(&child_id, token).await?;
            children.push(child_id);
        }

        let parent_body = json!({
            "media_type": "CAROUSEL",
            "children": children.join(","),
            "caption": post.caption.as_deref().unwrap_or(""),
            "access_token": token,
        });
        let parent_id = self.create_container(ig_user_id, &parent_body).await?;
        self.wait_for_container(&parent_id, token).await?;
        self.publish_container(ig_user_id, &parent_id, token).await
    }

    async fn run_protocol(
        &self,
        post: &Post,
        account: &PlatformAccount,
    ) -> Result<String, AdapterFailure> {
        let token = account
            .credential()
            .ok_or_else(|| AdapterFailure::Message("account has no stored credential".into()))?;
        let ig_user_id = &account.external_id;

        match post.kind {
            PostKind::Carousel => self.publish_carousel(post, ig_user_id, token).await,
            _ => self.publish_single(post, ig_user_id, token).await,
        }
    }
}

#[async_trait]
impl PlatformPublisher for InstagramPublisher {
    async fn submit(&self, post: &Post, account: &PlatformAccount) -> PlatformResult {
        match self.run_protocol(post, account).await {
            Ok(creation_id) => {
                info!(post_id = %post.id, account_id = %account.id, creation_id = %creation_id,
                      "Published to Instagram");
                PlatformResult::published(&account.id, creation_id)
            }
            Err(failure) => {
                warn!(post_id = %post.id, account_id = %account.id,
                      "Instagram publish failed: {:?}", failure);
                PlatformResult::failed(&account.id, failure.diagnostic())
            }
        }
    }

    fn platform(&self) -> PlatformKind {
        PlatformKind::Instagram
    }

    fn name(&self) -> &str {
        "instagram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_post(kind: PostKind) -> Post {
        let mut post = Post::new(kind, Utc::now());
        post.caption = Some("caption".into());
        post
    }

    #[test]
    fn test_container_body_for_image() {
        let post = sample_post(PostKind::Image);
        let item = MediaItem::from_url("https://cdn.test/a.jpg", MediaKind::Image);
        let body = InstagramPublisher::single_container_body(
            &post,
            &item,
            "https://cdn.test/a.jpg",
            "tok",
        );
        assert_eq!(body["image_url"], "https://cdn.test/a.jpg");
        assert_eq!(body["caption"], "caption");
        assert!(body.get("media_type").is_none());
    }

    #[test]
    fn test_container_body_for_video_and_reel() {
        let video_post = sample_post(PostKind::Video);
        let item = MediaItem::from_url("https://cdn.test/a.mp4", MediaKind::Video);
        let body = InstagramPublisher::single_container_body(
            &video_post,
            &item,
            "https://cdn.test/a.mp4",
            "tok",
        );
        assert_eq!(body["media_type"], "VIDEO");
        assert_eq!(body["video_url"], "https://cdn.test/a.mp4");

        let reel_post = sample_post(PostKind::Reel);
        let body = InstagramPublisher::single_container_body(
            &reel_post,
            &item,
            "https://cdn.test/a.mp4",
            "tok",
        );
        assert_eq!(body["media_type"], "REELS");
    }

    #[tokio::test]
    async fn test_submit_without_media_fails_with_diagnostic() {
        let publisher = InstagramPublisher::new(
            &InstagramConfig {
                api_url: "https://graph.example.test/v24.0".into(),
            },
            &PublishConfig::default(),
        );
        let post = sample_post(PostKind::Image);
        let mut account = PlatformAccount::new(PlatformKind::Instagram, "ig-1");
        account.access_token = Some("tok".into());

        let result = publisher.submit(&post, &account).await;
        assert!(result.is_failed());
        assert!(result.error.unwrap()["message"]
            .as_str()
            .unwrap()
            .contains("no media"));
    }
}
