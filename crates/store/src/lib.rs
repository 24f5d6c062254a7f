//! Prospect and social-post persistence behind narrow async traits.
//!
//! `InMemoryStore` backs tests; `PostgrestStore` talks to the
//! hosted database's REST interface.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::NaiveDate;

use outreach_core::social::{SocialPost, SocialPostUpdate};
use outreach_core::types::{NewProspect, Prospect, ProspectFilter, ProspectUpdate};
use outreach_core::StoreError;

pub use memory::InMemoryStore;
pub use postgrest::PostgrestStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Column used as the upsert conflict key.
pub const PROSPECT_KEY: &str = "email";

#[async_trait]
pub trait ProspectStore: Send + Sync {
    /// Prospects matching every predicate of `filter`, in a stable order,
    /// capped at `filter.limit`.
    async fn query(&self, filter: &ProspectFilter) -> StoreResult<Vec<Prospect>>;

    /// Applies `update` to the prospect keyed by `email`. When
    /// `update.expected_step` is set and the stored step differs, nothing is
    /// written and `StoreError::Conflict` is returned. An update that sets no
    /// column is rejected as `StoreError::Malformed`.
    async fn update(&self, email: &str, update: &ProspectUpdate) -> StoreResult<()>;

    /// Inserts or merges records on `unique_key`. Returns the number written.
    async fn upsert_batch(&self, records: &[NewProspect], unique_key: &str) -> StoreResult<usize>;

    /// Recomputes the daily analytics snapshot, where the backend has one.
    async fn refresh_daily_snapshot(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait SocialPostStore: Send + Sync {
    /// Pending posts for `platform` scheduled on `date`.
    async fn pending_posts(&self, platform: &str, date: NaiveDate) -> StoreResult<Vec<SocialPost>>;

    async fn update_post(&self, id: i64, update: &SocialPostUpdate) -> StoreResult<()>;
}
