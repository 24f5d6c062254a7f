//! Scheduled social post runner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, warn};

use outreach_channels::SocialChannel;
use outreach_content::{clean_social_post, social_prompt, ContentGenerator, BRAND_VOICE};
use outreach_core::social::{SocialPost, SocialPostUpdate};
use outreach_core::{DeliveryError, GenerationError};
use outreach_store::SocialPostStore;

use crate::settings::RunnerSettings;

const GENERATION_FAILED: &str = "content generation failed";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SocialSummary {
    pub due: usize,
    pub posted_count: usize,
    pub failed_count: usize,
    pub query_failed: bool,
}

impl SocialSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_count > 0 || self.query_failed
    }
}

/// Generates and publishes the posts due today, one at a time.
pub struct SocialRunner {
    posts: Arc<dyn SocialPostStore>,
    generator: Arc<dyn ContentGenerator>,
    channel: Arc<dyn SocialChannel>,
    org_id: String,
    settings: RunnerSettings,
}

impl SocialRunner {
    pub fn new(
        posts: Arc<dyn SocialPostStore>,
        generator: Arc<dyn ContentGenerator>,
        channel: Arc<dyn SocialChannel>,
        org_id: impl Into<String>,
    ) -> Self {
        Self {
            posts,
            generator,
            channel,
            org_id: org_id.into(),
            settings: RunnerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Publishes pending `platform` posts scheduled for today at or before
    /// the time of day of `now`.
    pub async fn run(&self, platform: &str, now: DateTime<Utc>) -> SocialSummary {
        let mut summary = SocialSummary::default();
        let pending = match self.posts.pending_posts(platform, now.date_naive()).await {
            Ok(posts) => posts,
            Err(e) => {
                error!(platform = %platform, error = %e, "Pending post query failed");
                summary.query_failed = true;
                return summary;
            }
        };

        let due: Vec<SocialPost> = pending
            .into_iter()
            .filter(|post| post.is_due(now.date_naive(), now.time()))
            .collect();
        summary.due = due.len();
        if due.is_empty() {
            info!(platform = %platform, "No posts scheduled for now");
            return summary;
        }
        info!(platform = %platform, due = summary.due, "Processing scheduled posts");

        for post in &due {
            if self.process(post, now).await {
                summary.posted_count += 1;
            } else {
                summary.failed_count += 1;
            }
        }

        info!(
            platform = %platform,
            posted = summary.posted_count,
            failed = summary.failed_count,
            "Social run complete"
        );
        summary
    }

    async fn process(&self, post: &SocialPost, now: DateTime<Utc>) -> bool {
        let content = match self.generate(&post.post_topic).await {
            Ok(content) => content,
            Err(e) => {
                warn!(post_id = post.id, topic = %post.post_topic, error = %e, "Post generation failed");
                self.mark(post.id, SocialPostUpdate::failed(None, GENERATION_FAILED, now))
                    .await;
                return false;
            }
        };

        match self.publish(&content, post.image_url.as_deref()).await {
            Ok(post_url) => {
                info!(post_id = post.id, post_url = %post_url, chars = content.len(), "Post published");
                metrics::counter!("outreach.posts_published").increment(1);
                self.mark(post.id, SocialPostUpdate::posted(content, post_url, now))
                    .await;
                true
            }
            Err(e) => {
                warn!(post_id = post.id, error = %e, "Publishing failed");
                self.mark(
                    post.id,
                    SocialPostUpdate::failed(Some(content), e.to_string(), now),
                )
                .await;
                false
            }
        }
    }

    async fn generate(&self, topic: &str) -> Result<String, GenerationError> {
        let context = social_prompt(topic, BRAND_VOICE, self.settings.social_max_tokens);
        let text = match timeout(
            self.settings.generation_timeout,
            self.generator.generate(&context),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(GenerationError::Timeout(
                    self.settings.generation_timeout.as_secs(),
                ))
            }
        };
        let cleaned = clean_social_post(&text);
        if cleaned.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(cleaned)
    }

    async fn publish(&self, text: &str, image_url: Option<&str>) -> Result<String, DeliveryError> {
        match timeout(
            self.settings.delivery_timeout,
            self.channel.publish(&self.org_id, text, image_url),
        )
        .await
        {
            Ok(result) => result.map(|receipt| receipt.post_url),
            Err(_) => Err(DeliveryError::Timeout(self.settings.delivery_timeout.as_secs())),
        }
    }

    async fn mark(&self, id: i64, update: SocialPostUpdate) {
        if let Err(e) = self.posts.update_post(id, &update).await {
            error!(post_id = id, status = update.status.as_str(), error = %e, "Post status update failed");
        }
    }
}
