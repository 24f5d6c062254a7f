//! Company-page publishing on LinkedIn via the UGC posts API.
//!
//! The bearer token is provisioned out of band and consumed as opaque
//! configuration.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use outreach_core::config::SocialConfig;
use outreach_core::DeliveryError;

use crate::{PublishReceipt, SocialChannel};

const FEED_URL: &str = "https://www.linkedin.com/feed/update";

pub struct LinkedInChannel {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: Option<String>,
}

impl LinkedInChannel {
    pub fn new(config: &SocialConfig, access_token: String) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        info!(platform = %config.platform, "LinkedIn channel initialized");

        Ok(Self {
            client,
            endpoint: format!("{}/v2/ugcPosts", config.api_base.trim_end_matches('/')),
            access_token,
            timeout_secs: config.timeout_secs,
        })
    }
}

/// Build the UGC post payload, attaching the image when present.
pub fn payload(org_id: &str, text: &str, image_url: Option<&str>) -> serde_json::Value {
    let mut share = serde_json::json!({
        "shareCommentary": {"text": text},
        "shareMediaCategory": "NONE"
    });
    if let Some(url) = image_url {
        share["shareMediaCategory"] = "IMAGE".into();
        share["media"] = serde_json::json!([{"status": "READY", "media": url}]);
    }
    serde_json::json!({
        "author": format!("urn:li:organization:{org_id}"),
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": share
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

pub fn post_url(post_id: &str) -> String {
    format!("{FEED_URL}/{post_id}")
}

#[async_trait]
impl SocialChannel for LinkedInChannel {
    async fn publish(
        &self,
        org_id: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<PublishReceipt, DeliveryError> {
        debug!(org_id = %org_id, chars = text.len(), image = image_url.is_some(), "Publishing post");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload(org_id, text, image_url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout_secs)
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_id = response
            .json::<CreatedPost>()
            .await
            .ok()
            .and_then(|p| p.id);
        let post_id = body_id.or(header_id).ok_or_else(|| DeliveryError::Rejected {
            status: status.as_u16(),
            message: "response carried no post id".to_string(),
        })?;

        metrics::counter!("linkedin.posts_published").increment(1);
        Ok(PublishReceipt {
            post_url: post_url(&post_id),
        })
    }
}

/// Stand-in used when no social credentials are configured: logs what would
/// have been posted and reports the channel as unconfigured.
#[derive(Debug, Default)]
pub struct UnconfiguredSocialChannel;

#[async_trait]
impl SocialChannel for UnconfiguredSocialChannel {
    async fn publish(
        &self,
        _org_id: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<PublishReceipt, DeliveryError> {
        warn!(content = %text, image_url = ?image_url, "Social API not configured, would post");
        Err(DeliveryError::NotConfigured(
            "social API credentials not set".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_without_image() {
        let p = payload("12345", "Stop guessing.", None);
        assert_eq!(p["author"], "urn:li:organization:12345");
        let share = &p["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareCommentary"]["text"], "Stop guessing.");
        assert_eq!(share["shareMediaCategory"], "NONE");
        assert!(share.get("media").is_none());
    }

    #[test]
    fn test_payload_with_image() {
        let p = payload("12345", "Chart day", Some("urn:li:digitalmediaAsset:abc"));
        let share = &p["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareMediaCategory"], "IMAGE");
        assert_eq!(share["media"][0]["media"], "urn:li:digitalmediaAsset:abc");
        assert_eq!(share["media"][0]["status"], "READY");
    }

    #[test]
    fn test_post_url() {
        assert_eq!(
            post_url("urn:li:share:42"),
            "https://www.linkedin.com/feed/update/urn:li:share:42"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_channel_fails() {
        let err = UnconfiguredSocialChannel
            .publish("", "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotConfigured(_)));
    }
}
