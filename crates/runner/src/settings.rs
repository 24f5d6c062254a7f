use std::time::Duration;

use outreach_channels::TrackingOptions;
use outreach_core::AppConfig;

/// Timeouts, retry bounds, and generation limits for a run.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub generation_timeout: Duration,
    pub delivery_timeout: Duration,
    pub state_update_retries: u32,
    pub state_update_backoff: Duration,
    pub email_max_tokens: u32,
    pub social_max_tokens: u32,
    pub tracking: TrackingOptions,
    pub from_email: String,
    pub from_name: String,
}

impl RunnerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            generation_timeout: Duration::from_secs(config.generator.timeout_secs),
            delivery_timeout: Duration::from_secs(config.email.timeout_secs),
            state_update_retries: config.sequence.state_update_retries,
            state_update_backoff: Duration::from_millis(config.sequence.state_update_backoff_ms),
            email_max_tokens: config.generator.email_max_tokens,
            social_max_tokens: config.generator.social_max_tokens,
            tracking: TrackingOptions {
                open_tracking: config.email.open_tracking,
                click_tracking: config.email.click_tracking,
            },
            from_email: config.email.from_email.clone(),
            from_name: config.email.from_name.clone(),
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
