//! Email sequence batch runner.
//!
//! Processes one batch of eligible prospects strictly in order: generate,
//! send, record. Failures are per prospect and never abort the batch.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use outreach_channels::{EmailChannel, EmailMessage};
use outreach_content::{email_prompt, split_subject, ContentGenerator};
use outreach_core::types::{Prospect, ProspectUpdate};
use outreach_core::{DeliveryError, GenerationError, StoreError};
use outreach_sequence::{SequenceEngine, TemplateDescriptor, Transition, INITIAL_STEP};
use outreach_store::ProspectStore;

use crate::settings::RunnerSettings;
use crate::{system_clock, Clock};

/// Outcome counts for one `run` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub step: u32,
    /// Prospects returned by the eligibility query.
    pub eligible: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    /// Returned by the store but no longer eligible when re-checked.
    pub skipped_count: usize,
    /// Sends that used the static template because generation failed.
    pub fallback_count: usize,
    /// Delivered messages whose state could not be committed.
    pub state_update_failures: usize,
    pub query_failed: bool,
}

impl RunSummary {
    pub fn new(step: u32) -> Self {
        Self {
            step,
            ..Default::default()
        }
    }

    /// Percentage of attempted sends that were delivered.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.sent_count, self.failed_count)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0 || self.state_update_failures > 0 || self.query_failed
    }
}

/// Totals across several runs, e.g. the three follow-up steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub runs: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub fallback_count: usize,
    pub state_update_failures: usize,
    pub query_failures: usize,
}

impl RunTotals {
    pub fn from_runs(runs: &[RunSummary]) -> Self {
        runs.iter().fold(Self::default(), |mut totals, run| {
            totals.runs += 1;
            totals.sent_count += run.sent_count;
            totals.failed_count += run.failed_count;
            totals.skipped_count += run.skipped_count;
            totals.fallback_count += run.fallback_count;
            totals.state_update_failures += run.state_update_failures;
            totals.query_failures += usize::from(run.query_failed);
            totals
        })
    }

    pub fn success_rate(&self) -> f64 {
        success_rate(self.sent_count, self.failed_count)
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0 || self.state_update_failures > 0 || self.query_failures > 0
    }
}

fn success_rate(sent: usize, failed: usize) -> f64 {
    let attempted = sent + failed;
    if attempted == 0 {
        return 0.0;
    }
    sent as f64 / attempted as f64 * 100.0
}

/// Subject and body ready for delivery.
struct Composed {
    subject: String,
    body: String,
    personalized: bool,
}

/// Drives the sequence engine over batches of prospects.
pub struct BatchRunner {
    engine: Arc<SequenceEngine>,
    store: Arc<dyn ProspectStore>,
    generator: Arc<dyn ContentGenerator>,
    channel: Arc<dyn EmailChannel>,
    settings: RunnerSettings,
    clock: Clock,
}

impl BatchRunner {
    pub fn new(
        engine: Arc<SequenceEngine>,
        store: Arc<dyn ProspectStore>,
        generator: Arc<dyn ContentGenerator>,
        channel: Arc<dyn EmailChannel>,
    ) -> Self {
        Self {
            engine,
            store,
            generator,
            channel,
            settings: RunnerSettings::default(),
            clock: system_clock(),
        }
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sends `step` to at most `batch_size` eligible prospects, sleeping
    /// `delay` before every send attempt after the first.
    pub async fn run(&self, step: u32, batch_size: usize, delay: Duration) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started = (self.clock)();
        let mut summary = RunSummary::new(step);

        let prospects = match self.eligible(step, batch_size, started).await {
            Ok(prospects) => prospects,
            Err(e) => {
                error!(run_id = %run_id, step, error = %e, "Eligibility query failed, nothing sent");
                summary.query_failed = true;
                return summary;
            }
        };
        summary.eligible = prospects.len();
        info!(
            run_id = %run_id,
            step,
            eligible = summary.eligible,
            batch_size,
            "Starting batch run"
        );

        let mut attempted = false;
        for mut prospect in prospects {
            if !self.engine.eligible_for_step(&prospect, step, started) {
                warn!(
                    run_id = %run_id,
                    email = %prospect.email,
                    current_step = prospect.sequence_step,
                    step,
                    "Prospect no longer eligible, skipping"
                );
                summary.skipped_count += 1;
                continue;
            }

            // Spacing only applies between attempts; skipped rows never wait.
            if attempted && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempted = true;

            self.process(run_id, &mut prospect, step, &mut summary).await;
        }

        if step == INITIAL_STEP && summary.sent_count > 0 {
            if let Err(e) = self.store.refresh_daily_snapshot().await {
                warn!(run_id = %run_id, error = %e, "Daily snapshot refresh failed");
            }
        }

        info!(
            run_id = %run_id,
            step,
            sent = summary.sent_count,
            failed = summary.failed_count,
            skipped = summary.skipped_count,
            fallbacks = summary.fallback_count,
            state_update_failures = summary.state_update_failures,
            success_rate = summary.success_rate(),
            "Batch run complete"
        );
        summary
    }

    /// Runs every follow-up step in order, one batch each.
    pub async fn run_followups(&self, batch_size: usize, delay: Duration) -> Vec<RunSummary> {
        let followups: Vec<u32> = self
            .engine
            .schedule()
            .steps()
            .iter()
            .map(|policy| policy.step)
            .filter(|step| *step > INITIAL_STEP)
            .collect();

        let mut summaries = Vec::with_capacity(followups.len());
        for step in followups {
            summaries.push(self.run(step, batch_size, delay).await);
        }
        summaries
    }

    async fn eligible(
        &self,
        step: u32,
        batch_size: usize,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Prospect>, outreach_core::OutreachError> {
        let filter = self.engine.eligibility_filter(step, now, batch_size)?;
        Ok(self.store.query(&filter).await?)
    }

    async fn process(
        &self,
        run_id: Uuid,
        prospect: &mut Prospect,
        step: u32,
        summary: &mut RunSummary,
    ) {
        let template = match self.engine.select_template(prospect, step) {
            Ok(template) => template,
            Err(e) => {
                error!(run_id = %run_id, email = %prospect.email, error = %e, "No template for prospect");
                summary.failed_count += 1;
                return;
            }
        };

        let composed = self.compose(prospect, template).await;
        if !composed.personalized {
            summary.fallback_count += 1;
            metrics::counter!("outreach.generation_fallbacks").increment(1);
        }

        let message = EmailMessage {
            to: prospect.email.clone(),
            from: self.settings.from_email.clone(),
            from_name: self.settings.from_name.clone(),
            subject: composed.subject,
            body: composed.body,
            tracking: self.settings.tracking,
        };

        if let Err(e) = self.deliver(&message).await {
            warn!(
                run_id = %run_id,
                email = %prospect.email,
                step,
                error = %e,
                "Delivery failed, prospect left for the next run"
            );
            summary.failed_count += 1;
            metrics::counter!("outreach.emails_failed", "step" => step.to_string()).increment(1);
            return;
        }

        summary.sent_count += 1;
        metrics::counter!("outreach.emails_sent", "step" => step.to_string()).increment(1);
        info!(
            run_id = %run_id,
            email = %prospect.email,
            step,
            template = %template.id,
            personalized = composed.personalized,
            "Email sent"
        );

        match self.engine.record_send(prospect, step, (self.clock)()) {
            Ok(Transition::Advanced { update, .. }) => {
                if let Err(e) = self.commit(&prospect.email, &update).await {
                    error!(
                        run_id = %run_id,
                        email = %prospect.email,
                        step,
                        error = %e,
                        "Email delivered but sequence state not saved; prospect may be contacted again"
                    );
                    summary.state_update_failures += 1;
                    metrics::counter!("outreach.state_update_failures").increment(1);
                }
            }
            Ok(Transition::AlreadyRecorded { .. }) => {
                warn!(run_id = %run_id, email = %prospect.email, step, "Send already recorded");
            }
            Err(e) => {
                error!(run_id = %run_id, email = %prospect.email, error = %e, "Could not record send");
                summary.state_update_failures += 1;
                metrics::counter!("outreach.state_update_failures").increment(1);
            }
        }
    }

    /// Personalized content, or the static template when generation fails.
    async fn compose(&self, prospect: &Prospect, template: &TemplateDescriptor) -> Composed {
        let fallback = self.engine.fallback_message(prospect, template);
        let fields = self.engine.fields_for(prospect);
        let context = email_prompt(prospect, template, &fields, self.settings.email_max_tokens);

        let generated = match timeout(
            self.settings.generation_timeout,
            self.generator.generate(&context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(
                self.settings.generation_timeout.as_secs(),
            )),
        };

        match generated {
            Ok(text) => {
                let (subject, body) = split_subject(&text, &fallback.subject);
                if body.is_empty() {
                    warn!(email = %prospect.email, "Generated email had no body, using template");
                    return Composed {
                        subject: fallback.subject,
                        body: fallback.body,
                        personalized: false,
                    };
                }
                Composed {
                    subject,
                    body,
                    personalized: true,
                }
            }
            Err(e) => {
                warn!(
                    email = %prospect.email,
                    template = %template.id,
                    error = %e,
                    "Generation failed, using template"
                );
                Composed {
                    subject: fallback.subject,
                    body: fallback.body,
                    personalized: false,
                }
            }
        }
    }

    async fn deliver(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        match timeout(self.settings.delivery_timeout, self.channel.send(message)).await {
            Ok(Ok(receipt)) => {
                debug!(
                    to = %message.to,
                    message_id = ?receipt.provider_message_id,
                    latency_ms = receipt.latency_ms,
                    "Delivery accepted"
                );
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DeliveryError::Timeout(self.settings.delivery_timeout.as_secs())),
        }
    }

    /// Writes the guarded update, retrying transient store failures.
    async fn commit(&self, email: &str, update: &ProspectUpdate) -> Result<(), StoreError> {
        let mut attempt = 0;
        loop {
            match self.store.update(email, update).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.settings.state_update_retries => {
                    attempt += 1;
                    warn!(email = %email, attempt, error = %e, "State update failed, retrying");
                    tokio::time::sleep(self.settings.state_update_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
