use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use outreach_core::types::{Prospect, ProspectFilter, TimestampCutoff, TimestampField};
use outreach_core::SequenceError;

pub const INITIAL_STEP: u32 = 1;
pub const FINAL_STEP: u32 = 4;

/// Timing rule for one step of the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepPolicy {
    pub step: u32,
    pub name: &'static str,
    /// Minimum days since the previous step's timestamp.
    pub wait_days: i64,
    /// Column written when this step is sent.
    pub records: TimestampField,
}

impl StepPolicy {
    pub fn wait(&self) -> Duration {
        Duration::days(self.wait_days)
    }
}

/// Where a prospect stands relative to its next touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTouch {
    /// Initial email not yet sent; goes out with the next batch.
    DueNow,
    DueAt { step: u32, at: DateTime<Utc> },
    /// Blocked: the previous step has no recorded timestamp, or the initial
    /// email is flagged sent while the prospect is still at step 0.
    Unscheduled { step: u32 },
    Finished,
    Replied,
}

/// The ordered step table. Steps are numbered from 1 and contiguous.
#[derive(Debug, Clone)]
pub struct Schedule {
    steps: Vec<StepPolicy>,
}

impl Schedule {
    /// Initial email, then follow-ups after 2, 3 and 3 days.
    pub fn standard() -> Self {
        Self {
            steps: vec![
                StepPolicy {
                    step: 1,
                    name: "initial",
                    wait_days: 0,
                    records: TimestampField::EmailSentAt,
                },
                StepPolicy {
                    step: 2,
                    name: "follow_up_1",
                    wait_days: 2,
                    records: TimestampField::LastFollowupAt,
                },
                StepPolicy {
                    step: 3,
                    name: "follow_up_2",
                    wait_days: 3,
                    records: TimestampField::LastFollowupAt,
                },
                StepPolicy {
                    step: FINAL_STEP,
                    name: "final",
                    wait_days: 3,
                    records: TimestampField::LastFollowupAt,
                },
            ],
        }
    }

    pub fn steps(&self) -> &[StepPolicy] {
        &self.steps
    }

    pub fn policy(&self, step: u32) -> Result<&StepPolicy, SequenceError> {
        step.checked_sub(1)
            .and_then(|i| self.steps.get(i as usize))
            .ok_or(SequenceError::UnknownStep(step))
    }

    pub fn last_step(&self) -> u32 {
        self.steps.len() as u32
    }

    /// True iff the prospect sits at `step - 1`, has not replied, and the wait
    /// since the previous step's timestamp has fully elapsed.
    pub fn eligible_for_step(&self, prospect: &Prospect, step: u32, now: DateTime<Utc>) -> bool {
        let Ok(policy) = self.policy(step) else {
            return false;
        };
        if prospect.replied || prospect.sequence_step + 1 != step {
            return false;
        }
        if step == INITIAL_STEP {
            return !prospect.email_sent;
        }
        match prospect.timestamp_for(step - 1) {
            Some(previous) => now - previous >= policy.wait(),
            None => false,
        }
    }

    /// Store-side equivalent of [`Schedule::eligible_for_step`].
    pub fn eligibility_filter(
        &self,
        step: u32,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<ProspectFilter, SequenceError> {
        let policy = self.policy(step)?;
        let mut filter = ProspectFilter {
            sequence_step: Some(step - 1),
            replied: Some(false),
            limit: Some(limit),
            ..Default::default()
        };

        if step == INITIAL_STEP {
            filter.email_sent = Some(false);
        } else {
            let previous = self.policy(step - 1)?;
            filter.cutoff = Some(TimestampCutoff {
                field: previous.records,
                at_or_before: now - policy.wait(),
            });
        }
        Ok(filter)
    }

    pub fn next_touch(&self, prospect: &Prospect) -> NextTouch {
        if prospect.replied {
            return NextTouch::Replied;
        }
        let next = prospect.sequence_step + 1;
        let Ok(policy) = self.policy(next) else {
            return NextTouch::Finished;
        };
        if next == INITIAL_STEP {
            // A set sent flag at step 0 keeps the prospect out of every batch.
            if prospect.email_sent {
                return NextTouch::Unscheduled { step: next };
            }
            return NextTouch::DueNow;
        }
        match prospect.timestamp_for(prospect.sequence_step) {
            Some(previous) => NextTouch::DueAt {
                step: next,
                at: previous + policy.wait(),
            },
            None => NextTouch::Unscheduled { step: next },
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::standard()
    }
}
