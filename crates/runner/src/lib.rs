//! Batch drivers: the email sequence runner, the scheduled social post
//! runner, and bulk prospect ingestion.

pub mod batch;
pub mod ingest;
pub mod settings;
pub mod social;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use batch::{BatchRunner, RunSummary, RunTotals};
pub use ingest::{ingest_csv, ingest_path, IngestSummary, UPSERT_CHUNK};
pub use settings::RunnerSettings;
pub use social::{SocialRunner, SocialSummary};

/// Source of the current time, injectable for tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}
