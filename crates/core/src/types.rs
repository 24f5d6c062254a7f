//! Prospect records and the query/update shapes used against the prospect store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timestamp;

/// Default revenue band applied when ingestion leaves it blank.
pub const DEFAULT_REVENUE_ESTIMATE: &str = "$2M-$25M";
/// Default lead source applied when ingestion leaves it blank.
pub const DEFAULT_SOURCE: &str = "manual";

/// A potential customer tracked through the outreach sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    /// Database-assigned row id. The unique key is `email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub revenue_estimate: Option<String>,
    #[serde(default)]
    pub source: Option<String>,

    /// 0 = not yet contacted, N = last completed step.
    #[serde(default)]
    pub sequence_step: u32,
    #[serde(default)]
    pub email_sent: bool,
    #[serde(default)]
    pub replied: bool,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub email_sent_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub last_followup_at: Option<DateTime<Utc>>,
}

impl Prospect {
    /// Bare prospect at step 0, used by ingestion and tests.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: None,
            email: email.into(),
            first_name: None,
            last_name: None,
            company: None,
            title: None,
            industry: None,
            revenue_estimate: None,
            source: None,
            sequence_step: 0,
            email_sent: false,
            replied: false,
            email_sent_at: None,
            last_followup_at: None,
        }
    }

    /// Timestamp recorded when `step` was sent. Step 0 has none.
    pub fn timestamp_for(&self, step: u32) -> Option<DateTime<Utc>> {
        match step {
            0 => None,
            1 => self.email_sent_at,
            _ => self.last_followup_at,
        }
    }

    pub fn first_name(&self) -> Option<&str> {
        non_blank(&self.first_name)
    }

    pub fn industry(&self) -> Option<&str> {
        non_blank(&self.industry)
    }

    pub fn company(&self) -> Option<&str> {
        non_blank(&self.company)
    }

    pub fn title(&self) -> Option<&str> {
        non_blank(&self.title)
    }

    pub fn revenue_estimate(&self) -> Option<&str> {
        non_blank(&self.revenue_estimate)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A row produced by bulk ingestion, upserted keyed by `email`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProspect {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub title: String,
    pub revenue_estimate: String,
    pub industry: String,
    pub source: String,
}

impl NewProspect {
    /// Overwrite the identity columns of an existing prospect, leaving its
    /// sequence state alone.
    pub fn merge_into(&self, prospect: &mut Prospect) {
        prospect.first_name = Some(self.first_name.clone());
        prospect.last_name = Some(self.last_name.clone());
        prospect.company = Some(self.company.clone());
        prospect.title = Some(self.title.clone());
        prospect.revenue_estimate = Some(self.revenue_estimate.clone());
        prospect.industry = Some(self.industry.clone());
        prospect.source = Some(self.source.clone());
    }
}

impl From<&NewProspect> for Prospect {
    fn from(row: &NewProspect) -> Self {
        let mut prospect = Prospect::new(row.email.clone());
        row.merge_into(&mut prospect);
        prospect
    }
}

/// Timestamp columns that eligibility cutoffs compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampField {
    EmailSentAt,
    LastFollowupAt,
}

impl TimestampField {
    pub fn column(&self) -> &'static str {
        match self {
            TimestampField::EmailSentAt => "email_sent_at",
            TimestampField::LastFollowupAt => "last_followup_at",
        }
    }

    pub fn read(&self, prospect: &Prospect) -> Option<DateTime<Utc>> {
        match self {
            TimestampField::EmailSentAt => prospect.email_sent_at,
            TimestampField::LastFollowupAt => prospect.last_followup_at,
        }
    }
}

/// `field <= at_or_before`. A missing timestamp never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampCutoff {
    pub field: TimestampField,
    pub at_or_before: DateTime<Utc>,
}

/// Conjunction of predicates over prospect columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProspectFilter {
    pub sequence_step: Option<u32>,
    pub replied: Option<bool>,
    pub email_sent: Option<bool>,
    pub cutoff: Option<TimestampCutoff>,
    pub limit: Option<usize>,
}

impl ProspectFilter {
    pub fn matches(&self, prospect: &Prospect) -> bool {
        if let Some(step) = self.sequence_step {
            if prospect.sequence_step != step {
                return false;
            }
        }
        if let Some(replied) = self.replied {
            if prospect.replied != replied {
                return false;
            }
        }
        if let Some(sent) = self.email_sent {
            if prospect.email_sent != sent {
                return false;
            }
        }
        if let Some(cutoff) = &self.cutoff {
            match cutoff.field.read(prospect) {
                Some(ts) if ts <= cutoff.at_or_before => {}
                _ => return false,
            }
        }
        true
    }
}

/// Partial update of a prospect's sequence state.
///
/// When `expected_step` is set the store must apply the update only if the
/// stored `sequence_step` still equals it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProspectUpdate {
    #[serde(skip)]
    pub expected_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_sent_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_followup_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied: Option<bool>,
}

impl ProspectUpdate {
    pub fn is_empty(&self) -> bool {
        self.sequence_step.is_none()
            && self.email_sent.is_none()
            && self.email_sent_at.is_none()
            && self.last_followup_at.is_none()
            && self.replied.is_none()
    }

    pub fn apply_to(&self, prospect: &mut Prospect) {
        if let Some(step) = self.sequence_step {
            prospect.sequence_step = step;
        }
        if let Some(sent) = self.email_sent {
            prospect.email_sent = sent;
        }
        if let Some(at) = self.email_sent_at {
            prospect.email_sent_at = Some(at);
        }
        if let Some(at) = self.last_followup_at {
            prospect.last_followup_at = Some(at);
        }
        if let Some(replied) = self.replied {
            prospect.replied = replied;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_blank_attributes_are_absent() {
        let mut p = Prospect::new("a@example.com");
        p.first_name = Some("   ".to_string());
        p.industry = Some(" HVAC ".to_string());
        assert_eq!(p.first_name(), None);
        assert_eq!(p.industry(), Some("HVAC"));
    }

    #[test]
    fn test_timestamp_for_step() {
        let now = Utc::now();
        let mut p = Prospect::new("a@example.com");
        p.email_sent_at = Some(now);
        p.last_followup_at = Some(now + Duration::days(2));
        assert_eq!(p.timestamp_for(0), None);
        assert_eq!(p.timestamp_for(1), Some(now));
        assert_eq!(p.timestamp_for(3), Some(now + Duration::days(2)));
    }

    #[test]
    fn test_filter_cutoff_requires_timestamp() {
        let now = Utc::now();
        let filter = ProspectFilter {
            sequence_step: Some(1),
            replied: Some(false),
            cutoff: Some(TimestampCutoff {
                field: TimestampField::EmailSentAt,
                at_or_before: now,
            }),
            ..Default::default()
        };

        let mut p = Prospect::new("a@example.com");
        p.sequence_step = 1;
        assert!(!filter.matches(&p));

        p.email_sent_at = Some(now);
        assert!(filter.matches(&p));

        p.email_sent_at = Some(now + Duration::seconds(1));
        assert!(!filter.matches(&p));

        p.email_sent_at = Some(now);
        p.replied = true;
        assert!(!filter.matches(&p));
    }

    #[test]
    fn test_timestamp_without_offset_read_as_utc() {
        let json = serde_json::json!({
            "email": "a@example.com",
            "sequence_step": 2,
            "email_sent": true,
            "email_sent_at": "2025-03-03T14:00:00.123456",
            "last_followup_at": "2025-03-05T09:30:00+00:00",
        });
        let p: Prospect = serde_json::from_value(json).unwrap();
        let sent = Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap()
            + Duration::microseconds(123_456);
        assert_eq!(p.email_sent_at, Some(sent));
        assert_eq!(
            p.last_followup_at,
            Some(Utc.with_ymd_and_hms(2025, 3, 5, 9, 30, 0).unwrap())
        );

        let missing: Prospect =
            serde_json::from_value(serde_json::json!({"email": "b@example.com", "email_sent_at": null}))
                .unwrap();
        assert_eq!(missing.email_sent_at, None);
        assert_eq!(missing.last_followup_at, None);
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = ProspectUpdate {
            expected_step: Some(0),
            sequence_step: Some(1),
            email_sent: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"sequence_step": 1, "email_sent": true}));
    }

    #[test]
    fn test_merge_keeps_sequence_state() {
        let mut p = Prospect::new("a@example.com");
        p.sequence_step = 2;
        p.replied = true;
        let row = NewProspect {
            email: "a@example.com".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Diaz".to_string(),
            company: "Acme".to_string(),
            title: "Owner".to_string(),
            revenue_estimate: DEFAULT_REVENUE_ESTIMATE.to_string(),
            industry: "Construction".to_string(),
            source: DEFAULT_SOURCE.to_string(),
        };
        row.merge_into(&mut p);
        assert_eq!(p.sequence_step, 2);
        assert!(p.replied);
        assert_eq!(p.first_name(), Some("Ana"));
    }
}
