//! End-to-end sequence runs against the in-memory store with fake
//! generator and delivery collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;

use outreach_channels::{DeliveryReceipt, EmailChannel, EmailMessage};
use outreach_content::{ContentGenerator, PromptContext};
use outreach_core::types::{NewProspect, Prospect, ProspectFilter, ProspectUpdate};
use outreach_core::{DeliveryError, GenerationError, StoreError};
use outreach_runner::{BatchRunner, RunTotals, RunnerSettings};
use outreach_sequence::{SenderProfile, SequenceEngine};
use outreach_store::{InMemoryStore, ProspectStore, StoreResult};

struct EchoGenerator;

#[async_trait]
impl ContentGenerator for EchoGenerator {
    async fn generate(&self, _context: &PromptContext) -> Result<String, GenerationError> {
        Ok("Subject: A quick thought\n\nHello from the sequence.".to_string())
    }
}

/// Records every accepted message; addresses in `failing` are rejected.
#[derive(Default)]
struct FakeChannel {
    sent: Mutex<Vec<EmailMessage>>,
    failing: Mutex<Vec<String>>,
}

impl FakeChannel {
    fn fail_for(&self, email: &str) {
        self.failing.lock().push(email.to_string());
    }

    fn heal(&self) {
        self.failing.lock().clear();
    }

    fn sent_to(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.to.clone()).collect()
    }
}

#[async_trait]
impl EmailChannel for FakeChannel {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, DeliveryError> {
        if self.failing.lock().contains(&message.to) {
            return Err(DeliveryError::Transport("connection reset".to_string()));
        }
        self.sent.lock().push(message.clone());
        Ok(DeliveryReceipt {
            provider_message_id: None,
            latency_ms: 0,
        })
    }
}

/// Wraps the in-memory store, injecting query and update failures. Rows in
/// `stale_tail` are appended to every query result as if read before a
/// concurrent writer changed them.
struct FlakyStore {
    inner: InMemoryStore,
    fail_queries: bool,
    stale_tail: Vec<Prospect>,
    update_failures: AtomicUsize,
    update_error: StoreError,
    update_attempts: AtomicUsize,
}

impl FlakyStore {
    fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_queries: false,
            stale_tail: Vec::new(),
            update_failures: AtomicUsize::new(0),
            update_error: StoreError::Unavailable("503".to_string()),
            update_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProspectStore for FlakyStore {
    async fn query(&self, filter: &ProspectFilter) -> StoreResult<Vec<Prospect>> {
        if self.fail_queries {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        let mut rows = self.inner.query(filter).await?;
        rows.extend(self.stale_tail.iter().cloned());
        Ok(rows)
    }

    async fn update(&self, email: &str, update: &ProspectUpdate) -> StoreResult<()> {
        self.update_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.update_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.update_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(self.update_error.clone());
        }
        self.inner.update(email, update).await
    }

    async fn upsert_batch(&self, records: &[NewProspect], unique_key: &str) -> StoreResult<usize> {
        self.inner.upsert_batch(records, unique_key).await
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap()
}

fn sender() -> SenderProfile {
    SenderProfile {
        name: "Dana Reyes".to_string(),
        email: "dana@example.com".to_string(),
        cta_url: "https://example.com/demo".to_string(),
    }
}

/// Clock the tests can move forward between runs.
fn shared_clock(start: DateTime<Utc>) -> (Arc<Mutex<DateTime<Utc>>>, outreach_runner::Clock) {
    let now = Arc::new(Mutex::new(start));
    let handle = now.clone();
    (now, Arc::new(move || *handle.lock()))
}

fn fast_settings() -> RunnerSettings {
    RunnerSettings {
        state_update_backoff: Duration::from_millis(1),
        ..RunnerSettings::default()
    }
}

fn runner(
    store: Arc<dyn ProspectStore>,
    channel: Arc<FakeChannel>,
    clock: outreach_runner::Clock,
) -> BatchRunner {
    BatchRunner::new(
        Arc::new(SequenceEngine::standard(sender())),
        store,
        Arc::new(EchoGenerator),
        channel,
    )
    .with_settings(fast_settings())
    .with_clock(clock)
}

fn at_step(email: &str, step: u32, sent_at: DateTime<Utc>, replied: bool) -> Prospect {
    let mut p = Prospect::new(email);
    p.sequence_step = step;
    p.replied = replied;
    if step >= 1 {
        p.email_sent = true;
        p.email_sent_at = Some(sent_at);
    }
    if step >= 2 {
        p.last_followup_at = Some(sent_at);
    }
    p
}

#[tokio::test]
async fn initial_send_advances_prospect() {
    let store = Arc::new(InMemoryStore::with_prospects(vec![Prospect::new(
        "owner@example.com",
    )]));
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summary = runner(store.clone(), channel.clone(), clock)
        .run(1, 100, Duration::ZERO)
        .await;

    assert_eq!(summary.sent_count, 1);
    assert_eq!(summary.failed_count, 0);
    let stored = store.get("owner@example.com").unwrap();
    assert_eq!(stored.sequence_step, 1);
    assert!(stored.email_sent);
    assert_eq!(stored.email_sent_at, Some(t0()));
}

#[tokio::test]
async fn followup_waits_two_days() {
    let store = Arc::new(InMemoryStore::with_prospects(vec![at_step(
        "owner@example.com",
        1,
        t0(),
        false,
    )]));
    let channel = Arc::new(FakeChannel::default());
    let (now, clock) = shared_clock(t0() + ChronoDuration::days(1));
    let runner = runner(store.clone(), channel.clone(), clock);

    let early = runner.run(2, 100, Duration::ZERO).await;
    assert_eq!(early.eligible, 0);
    assert_eq!(early.sent_count, 0);
    assert_eq!(store.get("owner@example.com").unwrap().sequence_step, 1);

    *now.lock() = t0() + ChronoDuration::days(2);
    let due = runner.run(2, 100, Duration::ZERO).await;
    assert_eq!(due.sent_count, 1);
    assert_eq!(store.get("owner@example.com").unwrap().sequence_step, 2);
}

#[tokio::test]
async fn replied_prospect_never_contacted() {
    let store = Arc::new(InMemoryStore::with_prospects(vec![at_step(
        "owner@example.com",
        2,
        t0(),
        true,
    )]));
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0() + ChronoDuration::days(365));

    let summary = runner(store.clone(), channel.clone(), clock)
        .run(3, 100, Duration::ZERO)
        .await;

    assert_eq!(summary.eligible, 0);
    assert!(channel.sent_to().is_empty());
    assert_eq!(store.get("owner@example.com").unwrap().sequence_step, 2);
}

#[tokio::test]
async fn failed_delivery_is_retried_next_run() {
    let store = Arc::new(InMemoryStore::with_prospects(vec![
        Prospect::new("first@example.com"),
        Prospect::new("second@example.com"),
    ]));
    let channel = Arc::new(FakeChannel::default());
    channel.fail_for("second@example.com");
    let (_, clock) = shared_clock(t0());
    let runner = runner(store.clone(), channel.clone(), clock);

    let first = runner.run(1, 100, Duration::ZERO).await;
    assert_eq!(first.sent_count, 1);
    assert_eq!(first.failed_count, 1);
    assert!(first.has_failures());
    let failed = store.get("second@example.com").unwrap();
    assert_eq!(failed.sequence_step, 0);
    assert!(!failed.email_sent);

    channel.heal();
    let second = runner.run(1, 100, Duration::ZERO).await;
    assert_eq!(second.eligible, 1);
    assert_eq!(second.sent_count, 1);
    assert_eq!(store.get("second@example.com").unwrap().sequence_step, 1);
    assert_eq!(
        channel.sent_to(),
        vec!["first@example.com", "second@example.com"]
    );
}

#[tokio::test]
async fn query_failure_sends_nothing() {
    let mut flaky = FlakyStore::new(InMemoryStore::with_prospects(vec![Prospect::new(
        "owner@example.com",
    )]));
    flaky.fail_queries = true;
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summary = runner(Arc::new(flaky), channel.clone(), clock)
        .run(1, 100, Duration::ZERO)
        .await;

    assert!(summary.query_failed);
    assert_eq!(summary.sent_count, 0);
    assert!(channel.sent_to().is_empty());
}

#[tokio::test]
async fn transient_state_update_failure_is_retried() {
    let flaky = Arc::new(FlakyStore::new(InMemoryStore::with_prospects(vec![
        Prospect::new("owner@example.com"),
    ])));
    flaky.update_failures.store(2, Ordering::SeqCst);
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summary = runner(flaky.clone(), channel, clock)
        .run(1, 100, Duration::ZERO)
        .await;

    assert_eq!(summary.sent_count, 1);
    assert_eq!(summary.state_update_failures, 0);
    assert_eq!(flaky.update_attempts.load(Ordering::SeqCst), 3);
    assert_eq!(flaky.inner.get("owner@example.com").unwrap().sequence_step, 1);
}

#[tokio::test]
async fn exhausted_state_update_is_reported() {
    let flaky = Arc::new(FlakyStore::new(InMemoryStore::with_prospects(vec![
        Prospect::new("owner@example.com"),
    ])));
    flaky.update_failures.store(10, Ordering::SeqCst);
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summary = runner(flaky.clone(), channel, clock)
        .run(1, 100, Duration::ZERO)
        .await;

    assert_eq!(summary.sent_count, 1);
    assert_eq!(summary.state_update_failures, 1);
    assert!(summary.has_failures());
    // one attempt plus three retries
    assert_eq!(flaky.update_attempts.load(Ordering::SeqCst), 4);
    assert_eq!(flaky.inner.get("owner@example.com").unwrap().sequence_step, 0);
}

#[tokio::test]
async fn conflict_is_not_retried() {
    let mut flaky = FlakyStore::new(InMemoryStore::with_prospects(vec![Prospect::new(
        "owner@example.com",
    )]));
    flaky.update_error = StoreError::Conflict {
        key: "owner@example.com".to_string(),
        expected: 0,
        found: Some(1),
    };
    flaky.update_failures.store(1, Ordering::SeqCst);
    let flaky = Arc::new(flaky);
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summary = runner(flaky.clone(), channel, clock)
        .run(1, 100, Duration::ZERO)
        .await;

    assert_eq!(summary.state_update_failures, 1);
    assert_eq!(flaky.update_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn followups_run_in_step_order_without_double_advance() {
    let sent = t0() - ChronoDuration::days(10);
    let store = Arc::new(InMemoryStore::with_prospects(vec![
        at_step("one@example.com", 1, sent, false),
        at_step("two@example.com", 2, sent, false),
        at_step("three@example.com", 3, sent, false),
        at_step("done@example.com", 4, sent, false),
    ]));
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summaries = runner(store.clone(), channel.clone(), clock)
        .run_followups(100, Duration::ZERO)
        .await;

    assert_eq!(
        summaries.iter().map(|s| s.step).collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
    // each prospect moves exactly one step; the one advanced to step 2 has a
    // fresh timestamp and is not yet due for step 3
    assert_eq!(store.get("one@example.com").unwrap().sequence_step, 2);
    assert_eq!(store.get("two@example.com").unwrap().sequence_step, 3);
    assert_eq!(store.get("three@example.com").unwrap().sequence_step, 4);
    assert_eq!(store.get("done@example.com").unwrap().sequence_step, 4);
    assert_eq!(
        channel.sent_to(),
        vec!["one@example.com", "two@example.com", "three@example.com"]
    );

    let totals = RunTotals::from_runs(&summaries);
    assert_eq!(totals.sent_count, 3);
    assert!(!totals.has_failures());
}

#[tokio::test]
async fn batch_size_caps_the_run() {
    let store = Arc::new(InMemoryStore::with_prospects(
        (0..5)
            .map(|i| Prospect::new(format!("p{i}@example.com")))
            .collect(),
    ));
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());

    let summary = runner(store.clone(), channel.clone(), clock)
        .run(1, 2, Duration::ZERO)
        .await;

    assert_eq!(summary.eligible, 2);
    assert_eq!(channel.sent_to(), vec!["p0@example.com", "p1@example.com"]);
}

#[tokio::test(start_paused = true)]
async fn delay_between_sends_skips_last() {
    let store = Arc::new(InMemoryStore::with_prospects(
        (0..3)
            .map(|i| Prospect::new(format!("p{i}@example.com")))
            .collect(),
    ));
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());
    let runner = runner(store, channel, clock);

    let started = tokio::time::Instant::now();
    let summary = runner.run(1, 100, Duration::from_secs(10)).await;

    assert_eq!(summary.sent_count, 3);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn trailing_skipped_rows_do_not_delay() {
    let mut store = FlakyStore::new(InMemoryStore::with_prospects(vec![
        Prospect::new("a@example.com"),
        Prospect::new("b@example.com"),
    ]));
    store.stale_tail = vec![at_step("replied@example.com", 0, t0(), true)];
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());
    let runner = runner(Arc::new(store), channel.clone(), clock);

    let started = tokio::time::Instant::now();
    let summary = runner.run(1, 100, Duration::from_secs(10)).await;

    assert_eq!(summary.eligible, 3);
    assert_eq!(summary.sent_count, 2);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(channel.sent_to(), vec!["a@example.com", "b@example.com"]);
    assert_eq!(started.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn single_send_before_skipped_row_does_not_wait() {
    let mut store = FlakyStore::new(InMemoryStore::with_prospects(vec![Prospect::new(
        "a@example.com",
    )]));
    store.stale_tail = vec![at_step("replied@example.com", 0, t0(), true)];
    let channel = Arc::new(FakeChannel::default());
    let (_, clock) = shared_clock(t0());
    let runner = runner(Arc::new(store), channel.clone(), clock);

    let started = tokio::time::Instant::now();
    let summary = runner.run(1, 100, Duration::from_secs(10)).await;

    assert_eq!(summary.sent_count, 1);
    assert_eq!(summary.skipped_count, 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}
