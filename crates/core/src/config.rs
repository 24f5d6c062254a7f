use serde::Deserialize;

use crate::error::{OutreachError, OutreachResult};

/// Root application configuration. Loaded from environment variables
/// with the prefix `OUTREACH__` and an optional `outreach.toml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub sequence: SequenceConfig,
}

/// Hosted database exposing a PostgREST-style API.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_key: String,
    #[serde(default = "default_prospects_table")]
    pub prospects_table: String,
    #[serde(default = "default_posts_table")]
    pub posts_table: String,
    #[serde(default = "default_snapshot_rpc")]
    pub snapshot_rpc: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_email_api_base")]
    pub api_base: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default = "default_true")]
    pub open_tracking: bool,
    #[serde(default = "default_true")]
    pub click_tracking: bool,
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_generator_api_base")]
    pub api_base: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_email_max_tokens")]
    pub email_max_tokens: u32,
    #[serde(default = "default_social_max_tokens")]
    pub social_max_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default = "default_social_api_base")]
    pub api_base: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequenceConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_send_delay_secs")]
    pub send_delay_secs: u64,
    #[serde(default = "default_state_update_retries")]
    pub state_update_retries: u32,
    #[serde(default = "default_state_update_backoff_ms")]
    pub state_update_backoff_ms: u64,
    #[serde(default = "default_cta_url")]
    pub cta_url: String,
    /// JSON template registry replacing the built-in templates.
    #[serde(default)]
    pub templates_path: Option<String>,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_prospects_table() -> String {
    "prospects".to_string()
}
fn default_posts_table() -> String {
    "social_media_posts".to_string()
}
fn default_snapshot_rpc() -> String {
    "update_daily_snapshot".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_email_api_base() -> String {
    "https://api.sendgrid.com".to_string()
}
fn default_from_email() -> String {
    "outreach@example.com".to_string()
}
fn default_from_name() -> String {
    "Outreach Team".to_string()
}
fn default_delivery_timeout_secs() -> u64 {
    15
}
fn default_generator_api_base() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_api_version() -> String {
    "2023-06-01".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_email_max_tokens() -> u32 {
    1024
}
fn default_social_max_tokens() -> u32 {
    2048
}
fn default_generation_timeout_secs() -> u64 {
    30
}
fn default_social_api_base() -> String {
    "https://api.linkedin.com".to_string()
}
fn default_platform() -> String {
    "linkedin".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_send_delay_secs() -> u64 {
    10
}
fn default_state_update_retries() -> u32 {
    3
}
fn default_state_update_backoff_ms() -> u64 {
    500
}
fn default_cta_url() -> String {
    "https://example.com/demo".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: String::new(),
            prospects_table: default_prospects_table(),
            posts_table: default_posts_table(),
            snapshot_rpc: default_snapshot_rpc(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_email_api_base(),
            from_email: default_from_email(),
            from_name: default_from_name(),
            open_tracking: true,
            click_tracking: true,
            timeout_secs: default_delivery_timeout_secs(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_generator_api_base(),
            api_version: default_api_version(),
            model: default_model(),
            email_max_tokens: default_email_max_tokens(),
            social_max_tokens: default_social_max_tokens(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            org_id: None,
            api_base: default_social_api_base(),
            platform: default_platform(),
            timeout_secs: default_delivery_timeout_secs(),
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            send_delay_secs: default_send_delay_secs(),
            state_update_retries: default_state_update_retries(),
            state_update_backoff_ms: default_state_update_backoff_ms(),
            cta_url: default_cta_url(),
            templates_path: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            email: EmailConfig::default(),
            generator: GeneratorConfig::default(),
            social: SocialConfig::default(),
            sequence: SequenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and optional config file.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("outreach").required(false))
            .add_source(
                config::Environment::with_prefix("OUTREACH")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn require_database(&self) -> OutreachResult<()> {
        require("database url (SUPABASE_URL)", &self.database.url)?;
        require("database service key (SUPABASE_SERVICE_KEY)", &self.database.service_key)
    }

    pub fn require_email(&self) -> OutreachResult<()> {
        require("email API key (SENDGRID_API_KEY)", &self.email.api_key)
    }

    pub fn require_generator(&self) -> OutreachResult<()> {
        require("generator API key (ANTHROPIC_API_KEY)", &self.generator.api_key)
    }

    /// Social credentials are optional; without them posts are logged, not
    /// published.
    pub fn social_configured(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        set(&self.social.access_token) && set(&self.social.org_id)
    }
}

fn require(name: &str, value: &str) -> OutreachResult<()> {
    if value.trim().is_empty() {
        return Err(OutreachError::Config(format!("{name} is not set")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.sequence.batch_size, 100);
        assert_eq!(cfg.sequence.send_delay_secs, 10);
        assert_eq!(cfg.database.prospects_table, "prospects");
        assert!(cfg.email.open_tracking && cfg.email.click_tracking);
        assert!(!cfg.social_configured());
    }

    #[test]
    fn test_missing_credentials_are_config_errors() {
        let mut cfg = AppConfig::default();
        assert!(matches!(cfg.require_database(), Err(OutreachError::Config(_))));
        assert!(matches!(cfg.require_email(), Err(OutreachError::Config(_))));

        cfg.database.url = "https://db.example.com".to_string();
        cfg.database.service_key = "  ".to_string();
        assert!(cfg.require_database().is_err());

        cfg.database.service_key = "key".to_string();
        assert!(cfg.require_database().is_ok());
    }

    #[test]
    fn test_social_requires_token_and_org() {
        let mut cfg = AppConfig::default();
        cfg.social.access_token = Some("token".to_string());
        assert!(!cfg.social_configured());
        cfg.social.org_id = Some("12345".to_string());
        assert!(cfg.social_configured());
    }
}
