//! Personalized content generation through a hosted language model.

pub mod messages_api;
pub mod parse;
pub mod prompts;

use async_trait::async_trait;
use serde::Serialize;

use outreach_core::GenerationError;

pub use messages_api::MessagesApiGenerator;
pub use parse::{clean_social_post, split_subject};
pub use prompts::{email_prompt, social_prompt, BRAND_VOICE};

/// What a prompt is for; carried along for logging and token budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ContentPurpose {
    Email { step: u32 },
    SocialPost,
}

/// A fully built prompt plus generation limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptContext {
    pub purpose: ContentPurpose,
    pub prompt: String,
    /// Overrides the generator's default token budget.
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Returns generated text. No retry contract: callers keep a fallback.
    async fn generate(&self, context: &PromptContext) -> Result<String, GenerationError>;
}
