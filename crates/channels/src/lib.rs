//! Delivery channels: transactional email and company-page social posts.

pub mod email;
pub mod social;

use async_trait::async_trait;
use serde::Serialize;

use outreach_core::DeliveryError;

pub use email::SendGridChannel;
pub use social::{LinkedInChannel, UnconfiguredSocialChannel};

/// Open/click tracking switches passed to the email provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackingOptions {
    pub open_tracking: bool,
    pub click_tracking: bool,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            open_tracking: true,
            click_tracking: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub from: String,
    pub from_name: String,
    pub subject: String,
    pub body: String,
    pub tracking: TrackingOptions,
}

/// Provider acknowledgement for an accepted email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub provider_message_id: Option<String>,
    pub latency_ms: u64,
}

/// Result of a published social post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub post_url: String,
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError>;
}

#[async_trait]
pub trait SocialChannel: Send + Sync {
    async fn publish(
        &self,
        org_id: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<PublishReceipt, DeliveryError>;
}
