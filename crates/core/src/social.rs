//! Scheduled social-network posts.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPostStatus {
    Pending,
    Posted,
    Failed,
}

impl SocialPostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialPostStatus::Pending => "pending",
            SocialPostStatus::Posted => "posted",
            SocialPostStatus::Failed => "failed",
        }
    }
}

/// A topic queued for generation and publication on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: i64,
    pub post_topic: String,
    pub platform: String,
    pub status: SocialPostStatus,
    pub scheduled_date: NaiveDate,
    #[serde(default)]
    pub scheduled_time: Option<NaiveTime>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub generated_content: Option<String>,
    #[serde(default)]
    pub post_url: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SocialPost {
    /// Posts without an explicit time go out from 09:00.
    pub fn effective_time(&self) -> NaiveTime {
        self.scheduled_time
            .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN))
    }

    /// Due once the scheduled day has arrived and the clock is at or past the
    /// scheduled time.
    pub fn is_due(&self, today: NaiveDate, time_of_day: NaiveTime) -> bool {
        self.status == SocialPostStatus::Pending
            && self.scheduled_date == today
            && time_of_day >= self.effective_time()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SocialPostUpdate {
    pub status: SocialPostStatus,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SocialPostUpdate {
    pub fn posted(content: String, post_url: String, now: DateTime<Utc>) -> Self {
        Self {
            status: SocialPostStatus::Posted,
            updated_at: now,
            generated_content: Some(content),
            post_url: Some(post_url),
            posted_at: Some(now),
            error_message: None,
        }
    }

    pub fn failed(content: Option<String>, error: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: SocialPostStatus::Failed,
            updated_at: now,
            generated_content: content,
            post_url: None,
            posted_at: None,
            error_message: Some(error.into()),
        }
    }

    pub fn apply_to(&self, post: &mut SocialPost) {
        post.status = self.status;
        post.updated_at = Some(self.updated_at);
        if let Some(content) = &self.generated_content {
            post.generated_content = Some(content.clone());
        }
        if let Some(url) = &self.post_url {
            post.post_url = Some(url.clone());
        }
        if let Some(at) = self.posted_at {
            post.posted_at = Some(at);
        }
        if let Some(err) = &self.error_message {
            post.error_message = Some(err.clone());
        }
    }
}
