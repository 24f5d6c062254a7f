//! Hosted database store speaking the PostgREST dialect
//! (`/rest/v1/<table>?column=op.value`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, SecondsFormat};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use outreach_core::config::DatabaseConfig;
use outreach_core::social::{SocialPost, SocialPostUpdate};
use outreach_core::types::{NewProspect, Prospect, ProspectFilter, ProspectUpdate};
use outreach_core::StoreError;

use crate::{ProspectStore, SocialPostStore, StoreResult, PROSPECT_KEY};

/// REST client for the prospects and social posts tables.
#[derive(Clone)]
pub struct PostgrestStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    prospects_table: String,
    posts_table: String,
    snapshot_rpc: String,
}

impl std::fmt::Debug for PostgrestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgrestStore")
            .field("base_url", &self.base_url)
            .field("prospects_table", &self.prospects_table)
            .finish()
    }
}

#[derive(Deserialize)]
struct StepRow {
    sequence_step: u32,
}

impl PostgrestStore {
    pub fn new(config: &DatabaseConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {e}")))?;

        info!(url = %config.url, table = %config.prospects_table, "Hosted prospect store initialized");

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            prospects_table: config.prospects_table.clone(),
            posts_table: config.posts_table.clone(),
            snapshot_rpc: config.snapshot_rpc.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status, body))
    }

    async fn current_step(&self, email: &str) -> StoreResult<Option<u32>> {
        let builder = self
            .request(Method::GET, &self.prospects_table)
            .query(&[("select", "sequence_step".to_string()), ("email", eq(email))]);
        let rows: Vec<StepRow> = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(rows.first().map(|r| r.sequence_step))
    }
}

fn classify(status: StatusCode, body: String) -> StoreError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        StoreError::Unavailable(format!("{status}: {body}"))
    } else if status == StatusCode::NOT_FOUND {
        StoreError::NotFound(body)
    } else {
        StoreError::Malformed(format!("{status}: {body}"))
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Query-string pairs for a prospect filter.
pub fn filter_params(filter: &ProspectFilter) -> Vec<(&'static str, String)> {
    let mut params = vec![("select", "*".to_string())];
    if let Some(step) = filter.sequence_step {
        params.push(("sequence_step", eq(step)));
    }
    if let Some(replied) = filter.replied {
        params.push(("replied", eq(replied)));
    }
    if let Some(sent) = filter.email_sent {
        params.push(("email_sent", eq(sent)));
    }
    if let Some(cutoff) = &filter.cutoff {
        params.push((
            cutoff.field.column(),
            format!(
                "lte.{}",
                cutoff.at_or_before.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        ));
    }
    params.push(("order", "id.asc".to_string()));
    if let Some(limit) = filter.limit {
        params.push(("limit", limit.to_string()));
    }
    params
}

#[async_trait]
impl ProspectStore for PostgrestStore {
    async fn query(&self, filter: &ProspectFilter) -> StoreResult<Vec<Prospect>> {
        let params = filter_params(filter);
        debug!(?params, "Querying prospects");
        let builder = self
            .request(Method::GET, &self.prospects_table)
            .query(&params);
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("prospect rows: {e}")))
    }

    async fn update(&self, email: &str, update: &ProspectUpdate) -> StoreResult<()> {
        // An empty PATCH body would match and echo the row without writing.
        if update.is_empty() {
            return Err(StoreError::Malformed(format!("empty update for {email}")));
        }
        let mut params = vec![("email", eq(email))];
        if let Some(expected) = update.expected_step {
            params.push(("sequence_step", eq(expected)));
        }
        let builder = self
            .request(Method::PATCH, &self.prospects_table)
            .query(&params)
            .header("Prefer", "return=representation")
            .json(update);
        let rows: Vec<serde_json::Value> = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        if !rows.is_empty() {
            return Ok(());
        }

        // Nothing matched: either the prospect is gone or the guard failed.
        let found = self.current_step(email).await?;
        match (found, update.expected_step) {
            (None, _) => Err(StoreError::NotFound(email.to_string())),
            (Some(found), Some(expected)) => Err(StoreError::Conflict {
                key: email.to_string(),
                expected,
                found: Some(found),
            }),
            (Some(_), None) => {
                warn!(email = %email, "Update matched a prospect but returned no rows");
                Ok(())
            }
        }
    }

    async fn upsert_batch(&self, records: &[NewProspect], unique_key: &str) -> StoreResult<usize> {
        if unique_key != PROSPECT_KEY {
            return Err(StoreError::Malformed(format!(
                "unsupported conflict key {unique_key:?}"
            )));
        }
        if records.is_empty() {
            return Ok(0);
        }
        let builder = self
            .request(Method::POST, &self.prospects_table)
            .query(&[("on_conflict", unique_key)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records);
        self.send(builder).await?;
        Ok(records.len())
    }

    async fn refresh_daily_snapshot(&self) -> StoreResult<()> {
        let builder = self
            .request(Method::POST, &format!("rpc/{}", self.snapshot_rpc))
            .json(&serde_json::json!({}));
        self.send(builder).await?;
        Ok(())
    }
}

#[async_trait]
impl SocialPostStore for PostgrestStore {
    async fn pending_posts(&self, platform: &str, date: NaiveDate) -> StoreResult<Vec<SocialPost>> {
        let builder = self.request(Method::GET, &self.posts_table).query(&[
            ("select", "*".to_string()),
            ("status", eq("pending")),
            ("scheduled_date", eq(date.format("%Y-%m-%d"))),
            ("platform", eq(platform)),
            ("order", "scheduled_time.asc,id.asc".to_string()),
        ]);
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(format!("social post rows: {e}")))
    }

    async fn update_post(&self, id: i64, update: &SocialPostUpdate) -> StoreResult<()> {
        let builder = self
            .request(Method::PATCH, &self.posts_table)
            .query(&[("id", eq(id))])
            .json(update);
        self.send(builder).await?;
        Ok(())
    }
}
