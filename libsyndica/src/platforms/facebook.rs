//! Facebook page adapter
//!
//! All uploads go to a page, so every submit first exchanges the stored
//! user credential for the page's own access token. The protocol then
//! branches on post kind: single photo, hosted video, the three-step reel
//! session, or the temp-photos-then-feed carousel flow.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::FacebookConfig;
use crate::platforms::{get_json, post_json, AdapterFailure, PlatformPublisher};
use crate::types::{PlatformAccount, PlatformKind, PlatformResult, Post, PostKind};

pub struct FacebookPublisher {
    client: reqwest::Client,
    api_url: String,
}

impl FacebookPublisher {
    pub fn new(config: &FacebookConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exchange the stored user credential for the page access token.
    async fn page_token(
        &self,
        page_id: &str,
        user_token: &str,
    ) -> Result<String, AdapterFailure> {
        let url = format!(
            "{}/{}?fields=access_token&access_token={}",
            self.api_url, page_id, user_token
        );
        let body = get_json(&self.client, &url).await?;
        body["access_token"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| {
                AdapterFailure::Message("page token exchange returned no access_token".into())
            })
    }

    async fn publish_photo(
        &self,
        post: &Post,
        page_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let url = post
            .primary_url()
            .ok_or_else(|| AdapterFailure::Message("post has no resolved media URL".into()))?;

        let body = json!({
            "url": url,
            "caption": post.caption.as_deref().unwrap_or(""),
            "access_token": token,
        });
        let response = post_json(
            &self.client,
            &format!("{}/{}/photos", self.api_url, page_id),
            &body,
        )
        .await?;
        extract_id(&response)
    }

    async fn publish_video(
        &self,
        post: &Post,
        page_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let url = post
            .primary_url()
            .ok_or_else(|| AdapterFailure::Message("post has no resolved media URL".into()))?;

        let body = json!({
            "file_url": url,
            "description": post.caption.as_deref().unwrap_or(""),
            "title": post.title.as_deref().unwrap_or(""),
            "access_token": token,
        });
        let response = post_json(
            &self.client,
            &format!("{}/{}/videos", self.api_url, page_id),
            &body,
        )
        .await?;
        extract_id(&response)
    }

    /// Reel session: start, hand the hosted URL to the upload endpoint,
    /// then finish with the reel set to publish.
    async fn publish_reel(
        &self,
        post: &Post,
        page_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let url = post
            .primary_url()
            .ok_or_else(|| AdapterFailure::Message("post has no resolved media URL".into()))?;

        let reels_endpoint = format!("{}/{}/video_reels", self.api_url, page_id);
        let start = post_json(
            &self.client,
            &reels_endpoint,
            &json!({"upload_phase": "start", "access_token": token}),
        )
        .await?;

        let video_id = start["video_id"]
            .as_str()
            .ok_or_else(|| AdapterFailure::Message("reel session returned no video_id".into()))?
            .to_string();
        let upload_url = start["upload_url"]
            .as_str()
            .ok_or_else(|| AdapterFailure::Message("reel session returned no upload_url".into()))?;

        // Upload by reference: the platform pulls the hosted file itself
        let upload = self
            .client
            .post(upload_url)
            .header("Authorization", format!("OAuth {}", token))
            .header("file_url", url)
            .send()
            .await
            .map_err(AdapterFailure::from)?;
        crate::platforms::read_json_response(upload).await?;

        post_json(
            &self.client,
            &reels_endpoint,
            &json!({
                "upload_phase": "finish",
                "video_id": video_id,
                "video_state": "PUBLISHED",
                "description": post.caption.as_deref().unwrap_or(""),
                "access_token": token,
            }),
        )
        .await?;

        Ok(video_id)
    }

    /// Carousel: upload every child as an unpublished temporary photo, then
    /// attach them all to one feed post. All-or-nothing on the child uploads.
    async fn publish_carousel(
        &self,
        post: &Post,
        page_id: &str,
        token: &str,
    ) -> Result<String, AdapterFailure> {
        let mut media_ids = Vec::with_capacity(post.media.len());
        for item in &post.media {
            let url = item.signed_url.as_deref().ok_or_else(|| {
                AdapterFailure::Message("carousel item has no resolved URL".into())
            })?;
            let body = json!({
                "url": url,
                "published": false,
                "temporary": true,
                "access_token": token,
            });
            let response = post_json(
                &self.client,
                &format!("{}/{}/photos", self.api_url, page_id),
                &body,
            )
            .await?;
            media_ids.push(extract_id(&response)?);
        }

        let attached: Vec<Value> = media_ids
            .iter()
            .map(|id| json!({"media_fbid": id}))
            .collect();
        let body = json!({
            "message": post.caption.as_deref().unwrap_or(""),
            "attached_media": attached,
            "access_token": token,
        });
        let response = post_json(
            &self.client,
            &format!("{}/{}/feed", self.api_url, page_id),
            &body,
        )
        .await?;
        extract_id(&response)
    }

    async fn run_protocol(
        &self,
        post: &Post,
        account: &PlatformAccount,
    ) -> Result<String, AdapterFailure> {
        let user_token = account
            .credential()
            .ok_or_else(|| AdapterFailure::Message("account has no stored credential".into()))?;
        let page_id = &account.external_id;

        let token = self.page_token(page_id, user_token).await?;

        match post.kind {
            PostKind::Image => self.publish_photo(post, page_id, &token).await,
            PostKind::Video => self.publish_video(post, page_id, &token).await,
            PostKind::Reel => self.publish_reel(post, page_id, &token).await,
            PostKind::Carousel => self.publish_carousel(post, page_id, &token).await,
        }
    }
}

fn extract_id(response: &Value) -> Result<String, AdapterFailure> {
    response["id"]
        .as_str()
        .or_else(|| response["post_id"].as_str())
        .map(String::from)
        .ok_or_else(|| AdapterFailure::Message(format!("response carried no id: {}", response)))
}

#[async_trait]
impl PlatformPublisher for FacebookPublisher {
    async fn submit(&self, post: &Post, account: &PlatformAccount) -> PlatformResult {
        match self.run_protocol(post, account).await {
            Ok(creation_id) => {
                info!(post_id = %post.id, account_id = %account.id, creation_id = %creation_id,
                      "Published to Facebook");
                PlatformResult::published(&account.id, creation_id)
            }
            Err(failure) => {
                warn!(post_id = %post.id, account_id = %account.id,
                      "Facebook publish failed: {:?}", failure);
                PlatformResult::failed(&account.id, failure.diagnostic())
            }
        }
    }

    fn platform(&self) -> PlatformKind {
        PlatformKind::Facebook
    }

    fn name(&self) -> &str {
        "facebook"
    }
}
