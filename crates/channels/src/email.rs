//! SendGrid email delivery.
//!
//! Sends plain-text mail through the v3 `mail/send` endpoint with open and
//! click tracking switched per message.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use outreach_core::config::EmailConfig;
use outreach_core::DeliveryError;

use crate::{DeliveryReceipt, EmailChannel, EmailMessage};

/// SendGrid email channel.
pub struct SendGridChannel {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl SendGridChannel {
    pub fn new(config: &EmailConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        info!(
            from = %config.from_email,
            open_tracking = config.open_tracking,
            click_tracking = config.click_tracking,
            "SendGrid channel initialized"
        );

        Ok(Self {
            client,
            endpoint: format!("{}/v3/mail/send", config.api_base.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

/// Build the v3 API payload.
pub fn payload(message: &EmailMessage) -> serde_json::Value {
    serde_json::json!({
        "personalizations": [{
            "to": [{"email": message.to}]
        }],
        "from": {
            "email": message.from,
            "name": message.from_name
        },
        "subject": message.subject,
        "content": [{
            "type": "text/plain",
            "value": message.body
        }],
        "tracking_settings": {
            "click_tracking": {
                "enable": message.tracking.click_tracking,
                "enable_text": message.tracking.click_tracking
            },
            "open_tracking": {"enable": message.tracking.open_tracking}
        }
    })
}

#[async_trait]
impl EmailChannel for SendGridChannel {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let start = std::time::Instant::now();

        debug!(
            to = %message.to,
            subject = %message.subject,
            "Sending email via SendGrid"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload(message))
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
        let provider_message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            metrics::counter!("sendgrid.rejected", "status" => status.as_u16().to_string())
                .increment(1);
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        metrics::counter!("sendgrid.emails_sent").increment(1);

        Ok(DeliveryReceipt {
            provider_message_id,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackingOptions;

    fn message(tracking: TrackingOptions) -> EmailMessage {
        EmailMessage {
            to: "owner@example.com".to_string(),
            from: "dana@example.com".to_string(),
            from_name: "Dana Reyes".to_string(),
            subject: "Quick question".to_string(),
            body: "Sam,\n\nHi.".to_string(),
            tracking,
        }
    }

    #[test]
    fn test_payload_shape() {
        let p = payload(&message(TrackingOptions::default()));
        assert_eq!(p["personalizations"][0]["to"][0]["email"], "owner@example.com");
        assert_eq!(p["from"]["name"], "Dana Reyes");
        assert_eq!(p["subject"], "Quick question");
        assert_eq!(p["content"][0]["type"], "text/plain");
        assert_eq!(p["tracking_settings"]["open_tracking"]["enable"], true);
        assert_eq!(p["tracking_settings"]["click_tracking"]["enable"], true);
    }

    #[test]
    fn test_payload_tracking_disabled() {
        let p = payload(&message(TrackingOptions {
            open_tracking: false,
            click_tracking: true,
        }));
        assert_eq!(p["tracking_settings"]["open_tracking"]["enable"], false);
        assert_eq!(p["tracking_settings"]["click_tracking"]["enable"], true);
    }

    #[test]
    fn test_endpoint_from_config() {
        let config = EmailConfig {
            api_base: "https://mail.example.com/".to_string(),
            ..Default::default()
        };
        let channel = SendGridChannel::new(&config).unwrap();
        assert_eq!(channel.endpoint, "https://mail.example.com/v3/mail/send");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_error() {
        let config = EmailConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let channel = SendGridChannel::new(&config).unwrap();
        let err = channel
            .send(&message(TrackingOptions::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Transport(_) | DeliveryError::Timeout(_)
        ));
    }
}
