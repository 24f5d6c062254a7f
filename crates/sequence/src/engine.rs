use chrono::{DateTime, Utc};
use tracing::info;

use outreach_core::types::{Prospect, ProspectFilter};
use outreach_core::SequenceError;

use crate::schedule::{NextTouch, Schedule};
use crate::state_machine::{self, Transition};
use crate::templates::{
    RenderedMessage, SenderProfile, TemplateDescriptor, TemplateFields, TemplateRegistry,
};

/// Schedule, templates, and sender identity for one outreach sequence.
#[derive(Debug, Clone)]
pub struct SequenceEngine {
    schedule: Schedule,
    registry: TemplateRegistry,
    sender: SenderProfile,
}

impl SequenceEngine {
    /// Fails if any scheduled step lacks a generic template.
    pub fn new(
        schedule: Schedule,
        registry: TemplateRegistry,
        sender: SenderProfile,
    ) -> Result<Self, SequenceError> {
        for policy in schedule.steps() {
            if registry.generic(policy.step).is_none() {
                return Err(SequenceError::Template(format!(
                    "no generic template for step {} ({})",
                    policy.step, policy.name
                )));
            }
        }
        info!(
            steps = schedule.steps().len(),
            templates = registry.len(),
            sender = %sender.email,
            "Sequence engine initialized"
        );
        Ok(Self {
            schedule,
            registry,
            sender,
        })
    }

    /// Standard schedule with the built-in templates.
    pub fn standard(sender: SenderProfile) -> Self {
        Self {
            schedule: Schedule::standard(),
            registry: TemplateRegistry::builtin(),
            sender,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn sender(&self) -> &SenderProfile {
        &self.sender
    }

    pub fn eligible_for_step(&self, prospect: &Prospect, step: u32, now: DateTime<Utc>) -> bool {
        self.schedule.eligible_for_step(prospect, step, now)
    }

    pub fn eligibility_filter(
        &self,
        step: u32,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<ProspectFilter, SequenceError> {
        self.schedule.eligibility_filter(step, now, limit)
    }

    pub fn select_template(
        &self,
        prospect: &Prospect,
        step: u32,
    ) -> Result<&TemplateDescriptor, SequenceError> {
        self.registry.select(prospect, step)
    }

    pub fn fields_for(&self, prospect: &Prospect) -> TemplateFields {
        TemplateFields::for_prospect(prospect, &self.sender)
    }

    /// Static message for `template`, filled with prospect attributes and
    /// defaults. Never leaves a placeholder behind.
    pub fn fallback_message(
        &self,
        prospect: &Prospect,
        template: &TemplateDescriptor,
    ) -> RenderedMessage {
        template.render(&self.fields_for(prospect))
    }

    pub fn record_send(
        &self,
        prospect: &mut Prospect,
        step: u32,
        now: DateTime<Utc>,
    ) -> Result<Transition, SequenceError> {
        state_machine::record_send(&self.schedule, prospect, step, now)
    }

    pub fn next_touch(&self, prospect: &Prospect) -> NextTouch {
        self.schedule.next_touch(prospect)
    }
}
