//! In-memory store backed by a lock-guarded vector and DashMap.
//!
//! Same API surface as the hosted store; backs the test suites.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use outreach_core::social::{SocialPost, SocialPostStatus, SocialPostUpdate};
use outreach_core::types::{NewProspect, Prospect, ProspectFilter, ProspectUpdate};
use outreach_core::StoreError;

use crate::{ProspectStore, SocialPostStore, StoreResult, PROSPECT_KEY};

/// Thread-safe in-memory prospect and social-post store. Prospects are kept
/// in insertion order so queries are deterministic.
#[derive(Default)]
pub struct InMemoryStore {
    prospects: RwLock<Vec<Prospect>>,
    posts: DashMap<i64, SocialPost>,
    snapshots: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Prospect store initialized (in-memory)");
        Self::default()
    }

    pub fn with_prospects(prospects: Vec<Prospect>) -> Self {
        let store = Self::new();
        *store.prospects.write() = prospects;
        store
    }

    pub fn insert(&self, prospect: Prospect) {
        self.prospects.write().push(prospect);
    }

    pub fn get(&self, email: &str) -> Option<Prospect> {
        self.prospects
            .read()
            .iter()
            .find(|p| p.email == email)
            .cloned()
    }

    pub fn all(&self) -> Vec<Prospect> {
        self.prospects.read().clone()
    }

    pub fn insert_post(&self, post: SocialPost) {
        self.posts.insert(post.id, post);
    }

    pub fn get_post(&self, id: i64) -> Option<SocialPost> {
        self.posts.get(&id).map(|p| p.clone())
    }

    /// Number of daily snapshot refreshes requested so far.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProspectStore for InMemoryStore {
    async fn query(&self, filter: &ProspectFilter) -> StoreResult<Vec<Prospect>> {
        let prospects = self.prospects.read();
        let limit = filter.limit.unwrap_or(usize::MAX);
        let matched: Vec<Prospect> = prospects
            .iter()
            .filter(|p| filter.matches(p))
            .take(limit)
            .cloned()
            .collect();
        debug!(matched = matched.len(), "In-memory prospect query");
        Ok(matched)
    }

    async fn update(&self, email: &str, update: &ProspectUpdate) -> StoreResult<()> {
        if update.is_empty() {
            return Err(StoreError::Malformed(format!("empty update for {email}")));
        }
        let mut prospects = self.prospects.write();
        let prospect = prospects
            .iter_mut()
            .find(|p| p.email == email)
            .ok_or_else(|| StoreError::NotFound(email.to_string()))?;

        if let Some(expected) = update.expected_step {
            if prospect.sequence_step != expected {
                return Err(StoreError::Conflict {
                    key: email.to_string(),
                    expected,
                    found: Some(prospect.sequence_step),
                });
            }
        }
        update.apply_to(prospect);
        Ok(())
    }

    async fn upsert_batch(&self, records: &[NewProspect], unique_key: &str) -> StoreResult<usize> {
        if unique_key != PROSPECT_KEY {
            return Err(StoreError::Malformed(format!(
                "unsupported conflict key {unique_key:?}"
            )));
        }
        let mut prospects = self.prospects.write();
        for row in records {
            match prospects.iter_mut().find(|p| p.email == row.email) {
                Some(existing) => row.merge_into(existing),
                None => prospects.push(Prospect::from(row)),
            }
        }
        Ok(records.len())
    }

    async fn refresh_daily_snapshot(&self) -> StoreResult<()> {
        self.snapshots.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl SocialPostStore for InMemoryStore {
    async fn pending_posts(&self, platform: &str, date: NaiveDate) -> StoreResult<Vec<SocialPost>> {
        let mut posts: Vec<SocialPost> = self
            .posts
            .iter()
            .filter(|p| {
                p.status == SocialPostStatus::Pending
                    && p.platform == platform
                    && p.scheduled_date == date
            })
            .map(|p| p.value().clone())
            .collect();
        posts.sort_by(|a, b| {
            a.effective_time()
                .cmp(&b.effective_time())
                .then(a.id.cmp(&b.id))
        });
        Ok(posts)
    }

    async fn update_post(&self, id: i64, update: &SocialPostUpdate) -> StoreResult<()> {
        let mut post = self
            .posts
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("social post {id}")))?;
        update.apply_to(&mut post);
        Ok(())
    }
}
