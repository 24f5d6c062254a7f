//! Template registry keyed by (step, industry), with a single placeholder
//! substitution routine shared by every template.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use outreach_core::types::Prospect;
use outreach_core::{OutreachError, OutreachResult, SequenceError};

mod builtin;

/// Industry keys with dedicated templates, matched in this order by
/// case-insensitive substring.
pub const INDUSTRY_KEYS: [&str; 8] = [
    "construction",
    "restaurant",
    "property management",
    "hvac",
    "professional services",
    "automotive",
    "manufacturing",
    "healthcare",
];

/// Returns the first industry key contained in `industry`.
pub fn match_industry(industry: &str) -> Option<&'static str> {
    let lower = industry.to_lowercase();
    INDUSTRY_KEYS.iter().copied().find(|key| lower.contains(key))
}

/// A substitutable value in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FirstName,
    Company,
    Title,
    Industry,
    RevenueEstimate,
    SenderName,
    CtaUrl,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::FirstName,
        Field::Company,
        Field::Title,
        Field::Industry,
        Field::RevenueEstimate,
        Field::SenderName,
        Field::CtaUrl,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Field::FirstName => "first_name",
            Field::Company => "company",
            Field::Title => "title",
            Field::Industry => "industry",
            Field::RevenueEstimate => "revenue_estimate",
            Field::SenderName => "sender_name",
            Field::CtaUrl => "cta_url",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    /// Value used when the prospect lacks the attribute.
    pub fn default_value(&self) -> &'static str {
        match self {
            Field::FirstName => "there",
            Field::Company => "your company",
            Field::Title => "business owner",
            Field::Industry => "business",
            Field::RevenueEstimate => outreach_core::types::DEFAULT_REVENUE_ESTIMATE,
            Field::SenderName => "our team",
            Field::CtaUrl => "",
        }
    }
}

/// Identity of the sender, substituted into every template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderProfile {
    pub name: String,
    pub email: String,
    pub cta_url: String,
}

/// Placeholder values for one prospect, with defaults for anything missing.
#[derive(Debug, Clone)]
pub struct TemplateFields {
    values: HashMap<Field, String>,
}

impl TemplateFields {
    pub fn for_prospect(prospect: &Prospect, sender: &SenderProfile) -> Self {
        let mut values = HashMap::new();
        let mut put = |field: Field, value: Option<&str>| {
            if let Some(v) = value {
                values.insert(field, v.to_string());
            }
        };
        put(Field::FirstName, prospect.first_name());
        put(Field::Company, prospect.company());
        put(Field::Title, prospect.title());
        put(Field::Industry, prospect.industry());
        put(Field::RevenueEstimate, prospect.revenue_estimate());
        put(Field::SenderName, Some(sender.name.as_str()).filter(|s| !s.is_empty()));
        put(Field::CtaUrl, Some(sender.cta_url.as_str()).filter(|s| !s.is_empty()));
        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        self.values
            .get(&field)
            .map(String::as_str)
            .unwrap_or_else(|| field.default_value())
    }
}

/// Extracts `{name}` placeholder names in order of appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
                    found.push(name);
                }
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    found
}

/// Replaces every known `{field}` placeholder. Braces that do not name a
/// field are left untouched.
pub fn substitute(text: &str, fields: &TemplateFields) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let field = after
            .find('}')
            .and_then(|close| Field::from_key(&after[..close]).map(|f| (f, close)));
        match field {
            Some((f, close)) => {
                out.push_str(fields.get(f));
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Subject and body of one sequence message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    pub id: String,
    pub step: u32,
    /// Industry key, or `None` for the generic template of the step.
    #[serde(default)]
    pub industry: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub required_fields: Vec<Field>,
}

impl TemplateDescriptor {
    /// Builds a descriptor whose `required_fields` are derived from its text.
    pub fn new(
        id: impl Into<String>,
        step: u32,
        industry: Option<&str>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let subject = subject.into();
        let body = body.into();
        let required_fields = placeholders(&subject)
            .into_iter()
            .chain(placeholders(&body))
            .filter_map(Field::from_key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            id: id.into(),
            step,
            industry: industry.map(str::to_string),
            subject,
            body,
            required_fields,
        }
    }

    /// Every placeholder must name a known field listed in `required_fields`.
    pub fn validate(&self) -> Result<(), SequenceError> {
        for name in placeholders(&self.subject)
            .into_iter()
            .chain(placeholders(&self.body))
        {
            let field = Field::from_key(name).ok_or_else(|| {
                SequenceError::Template(format!("{}: unknown placeholder {{{name}}}", self.id))
            })?;
            if !self.required_fields.contains(&field) {
                return Err(SequenceError::Template(format!(
                    "{}: placeholder {{{name}}} missing from required_fields",
                    self.id
                )));
            }
        }
        if let Some(industry) = &self.industry {
            if !INDUSTRY_KEYS.contains(&industry.as_str()) {
                return Err(SequenceError::Template(format!(
                    "{}: unknown industry key {industry:?}",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn render(&self, fields: &TemplateFields) -> RenderedMessage {
        RenderedMessage {
            template_id: self.id.clone(),
            subject: substitute(&self.subject, fields),
            body: substitute(&self.body, fields),
        }
    }
}

/// A fully substituted message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMessage {
    pub template_id: String,
    pub subject: String,
    pub body: String,
}

/// Lookup table of templates keyed by (step, industry-or-generic).
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<(u32, Option<String>), TemplateDescriptor>,
}

impl TemplateRegistry {
    pub fn new(descriptors: Vec<TemplateDescriptor>) -> Result<Self, SequenceError> {
        let mut templates = HashMap::new();
        for descriptor in descriptors {
            descriptor.validate()?;
            let key = (descriptor.step, descriptor.industry.clone());
            if templates.contains_key(&key) {
                return Err(SequenceError::Template(format!(
                    "duplicate template for step {} industry {:?}",
                    key.0, key.1
                )));
            }
            templates.insert(key, descriptor);
        }
        Ok(Self { templates })
    }

    /// Built-in copy for a four-step cash-flow outreach sequence.
    pub fn builtin() -> Self {
        let templates = builtin::descriptors()
            .into_iter()
            .map(|d| ((d.step, d.industry.clone()), d))
            .collect();
        Self { templates }
    }

    pub fn from_json(json: &str) -> OutreachResult<Self> {
        let descriptors: Vec<TemplateDescriptor> = serde_json::from_str(json)?;
        Ok(Self::new(descriptors)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> OutreachResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            OutreachError::Config(format!("cannot read templates {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn generic(&self, step: u32) -> Option<&TemplateDescriptor> {
        self.templates.get(&(step, None))
    }

    pub fn industry(&self, step: u32, key: &str) -> Option<&TemplateDescriptor> {
        self.templates.get(&(step, Some(key.to_string())))
    }

    /// Industry template when the prospect's industry matches a key and one
    /// exists for the step, otherwise the generic template.
    pub fn select(&self, prospect: &Prospect, step: u32) -> Result<&TemplateDescriptor, SequenceError> {
        let specific = prospect
            .industry()
            .and_then(match_industry)
            .and_then(|key| self.industry(step, key));
        if let Some(template) = specific {
            debug!(email = %prospect.email, template = %template.id, "Selected industry template");
            return Ok(template);
        }
        self.generic(step).ok_or(SequenceError::UnknownStep(step))
    }
}
