use chrono::{DateTime, Utc};

use outreach_core::types::{Prospect, ProspectUpdate, TimestampField};
use outreach_core::SequenceError;

use crate::schedule::{Schedule, INITIAL_STEP};

/// Outcome of recording a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Prospect moved from `from` to `to`; `update` must be committed to the
    /// store, guarded on `from`.
    Advanced {
        from: u32,
        to: u32,
        update: ProspectUpdate,
    },
    /// Prospect was already at this step; nothing to commit.
    AlreadyRecorded { step: u32 },
}

/// Advances `prospect` to `step` after a successful send.
///
/// Only `step - 1 -> step` is allowed. Repeating the call for the step the
/// prospect is already at is a no-op, so a retried commit never double
/// advances.
pub fn record_send(
    schedule: &Schedule,
    prospect: &mut Prospect,
    step: u32,
    now: DateTime<Utc>,
) -> Result<Transition, SequenceError> {
    let policy = schedule.policy(step)?;
    let current = prospect.sequence_step;

    if current == step {
        return Ok(Transition::AlreadyRecorded { step });
    }
    if current + 1 != step {
        return Err(SequenceError::InvalidTransition {
            email: prospect.email.clone(),
            current,
            step,
        });
    }

    let mut update = ProspectUpdate {
        expected_step: Some(current),
        sequence_step: Some(step),
        ..Default::default()
    };
    if step == INITIAL_STEP {
        update.email_sent = Some(true);
    }
    match policy.records {
        TimestampField::EmailSentAt => update.email_sent_at = Some(now),
        TimestampField::LastFollowupAt => update.last_followup_at = Some(now),
    }

    update.apply_to(prospect);
    Ok(Transition::Advanced {
        from: current,
        to: step,
        update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_send_sets_sent_flag_and_timestamp() {
        let schedule = Schedule::standard();
        let t0 = Utc::now();
        let mut p = Prospect::new("a@example.com");

        let transition = record_send(&schedule, &mut p, 1, t0).unwrap();
        assert!(matches!(transition, Transition::Advanced { from: 0, to: 1, .. }));
        assert_eq!(p.sequence_step, 1);
        assert!(p.email_sent);
        assert_eq!(p.email_sent_at, Some(t0));
        assert_eq!(p.last_followup_at, None);
    }

    #[test]
    fn test_follow_up_sets_followup_timestamp() {
        let schedule = Schedule::standard();
        let t0 = Utc::now();
        let mut p = Prospect::new("a@example.com");
        record_send(&schedule, &mut p, 1, t0).unwrap();

        let t1 = t0 + chrono::Duration::days(2);
        let Transition::Advanced { update, .. } = record_send(&schedule, &mut p, 2, t1).unwrap()
        else {
            panic!("expected advance");
        };
        assert_eq!(update.expected_step, Some(1));
        assert_eq!(update.email_sent, None);
        assert_eq!(update.last_followup_at, Some(t1));
        assert_eq!(p.sequence_step, 2);
        assert_eq!(p.email_sent_at, Some(t0));
    }

    #[test]
    fn test_repeat_is_idempotent() {
        let schedule = Schedule::standard();
        let t0 = Utc::now();
        let mut p = Prospect::new("a@example.com");
        record_send(&schedule, &mut p, 1, t0).unwrap();

        let again = record_send(&schedule, &mut p, 1, t0 + chrono::Duration::hours(1)).unwrap();
        assert_eq!(again, Transition::AlreadyRecorded { step: 1 });
        assert_eq!(p.sequence_step, 1);
        assert_eq!(p.email_sent_at, Some(t0));
    }

    #[test]
    fn test_skipping_steps_is_rejected() {
        let schedule = Schedule::standard();
        let mut p = Prospect::new("a@example.com");
        let err = record_send(&schedule, &mut p, 3, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            SequenceError::InvalidTransition {
                email: "a@example.com".to_string(),
                current: 0,
                step: 3
            }
        );
        assert_eq!(p.sequence_step, 0);
    }

    #[test]
    fn test_backwards_is_rejected() {
        let schedule = Schedule::standard();
        let mut p = Prospect::new("a@example.com");
        p.sequence_step = 3;
        assert!(record_send(&schedule, &mut p, 2, Utc::now()).is_err());
        assert_eq!(p.sequence_step, 3);
    }

    #[test]
    fn test_unknown_step() {
        let schedule = Schedule::standard();
        let mut p = Prospect::new("a@example.com");
        p.sequence_step = 4;
        assert_eq!(
            record_send(&schedule, &mut p, 5, Utc::now()),
            Err(SequenceError::UnknownStep(5))
        );
    }
}
