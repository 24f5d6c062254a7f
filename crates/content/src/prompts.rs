use outreach_core::types::Prospect;
use outreach_sequence::templates::{Field, TemplateDescriptor, TemplateFields};

use crate::{ContentPurpose, PromptContext};

/// Voice guide prepended to every social prompt.
pub const BRAND_VOICE: &str = "You are the social media voice for a financial dashboard that turns accounting data into real-time cash flow insight for owner-operated businesses.

Brand personality:
- Confident but not arrogant
- Direct and punchy
- Empathetic to business owner pain points
- Conversational, not corporate
- At most one or two emojis, only where they fit

Key messages:
- Stop spending hours in spreadsheets
- Real-time numbers instead of month-end reports
- Three seconds instead of three hours

Avoid being salesy, buzzwords, corporate jargon, and fake enthusiasm.";

fn describe_prospect(fields: &TemplateFields) -> String {
    [
        ("Name", Field::FirstName),
        ("Company", Field::Company),
        ("Title", Field::Title),
        ("Revenue", Field::RevenueEstimate),
        ("Industry", Field::Industry),
    ]
    .iter()
    .map(|(label, field)| format!("- {label}: {}", fields.get(*field)))
    .collect::<Vec<_>>()
    .join("\n")
}

/// Prompt asking the model to personalize `template` for `prospect`.
///
/// The template is passed already substituted so the model starts from the
/// same text the static fallback would send.
pub fn email_prompt(
    prospect: &Prospect,
    template: &TemplateDescriptor,
    fields: &TemplateFields,
    max_tokens: u32,
) -> PromptContext {
    let rendered = template.render(fields);
    let stage = if template.step <= 1 {
        "This is the first email this person will receive from us.".to_string()
    } else {
        format!(
            "This is follow-up #{} in a sequence; they have not replied yet. Keep it shorter than the original.",
            template.step - 1
        )
    };
    let industry_note = if template.industry.is_some() {
        "Lead with the industry-specific pain point; it is relatable and real."
    } else {
        "Focus on the everyday \"Can I afford this?\" decisions every owner faces."
    };

    let prompt = format!(
        "Personalize this email for a business owner who struggles with daily cash flow decisions.

Prospect info:
{prospect_info}

{stage}

Email template:
Subject: {subject}

{body}

Instructions:
1. Use their first name naturally
2. {industry_note}
3. Keep it empathetic and helpful, not critical or salesy
4. Keep the call to action link exactly as written
5. Keep it under 200 words
6. Return ONLY the personalized email, starting with a \"Subject:\" line

Personalized email:",
        prospect_info = describe_prospect(fields),
        subject = rendered.subject,
        body = rendered.body,
    );

    tracing::trace!(email = %prospect.email, template = %template.id, "Built email prompt");

    PromptContext {
        purpose: ContentPurpose::Email {
            step: template.step,
        },
        prompt,
        max_tokens: Some(max_tokens),
    }
}

/// Prompt for a social post about `topic`.
pub fn social_prompt(topic: &str, voice: &str, max_tokens: u32) -> PromptContext {
    let prompt = format!(
        "{voice}

Create a LinkedIn post based on this topic:
\"{topic}\"

Requirements:
1. 100-200 words
2. Hook in the first line
3. Short lines and line breaks for readability
4. A clear call to action
5. 3-5 relevant hashtags at the end
6. Professional but conversational tone

Do not include quotes around the post, a preamble, markdown formatting, or explanations.
Write the post exactly as it should appear.

LinkedIn post:"
    );
    PromptContext {
        purpose: ContentPurpose::SocialPost,
        prompt,
        max_tokens: Some(max_tokens),
    }
}
