//! Bulk prospect ingestion from delimited files.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use outreach_core::types::{NewProspect, DEFAULT_REVENUE_ESTIMATE, DEFAULT_SOURCE};
use outreach_core::{OutreachError, OutreachResult};
use outreach_store::{ProspectStore, PROSPECT_KEY};

/// Records per upsert request.
pub const UPSERT_CHUNK: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Data rows read, excluding the header.
    pub read: usize,
    pub uploaded: usize,
    /// Rows dropped for a blank email, a duplicate email, or a decode error.
    pub skipped: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    email: String,
    first_name: String,
    last_name: String,
    company: String,
    title: String,
    revenue_estimate: String,
    industry: String,
    source: String,
}

impl CsvRow {
    fn normalize(self) -> Option<NewProspect> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() {
            return None;
        }
        Some(NewProspect {
            email,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            company: self.company.trim().to_string(),
            title: self.title.trim().to_string(),
            revenue_estimate: or_default(&self.revenue_estimate, DEFAULT_REVENUE_ESTIMATE),
            industry: self.industry.trim().to_string(),
            source: or_default(&self.source, DEFAULT_SOURCE),
        })
    }
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}

/// Parses rows, dropping blanks and repeated emails. The first occurrence of
/// an email wins.
fn read_rows<R: Read>(reader: R) -> OutreachResult<(Vec<NewProspect>, IngestSummary)> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| OutreachError::Ingest(format!("unreadable header: {e}")))?;
    if !headers.iter().any(|h| h == "email") {
        return Err(OutreachError::Ingest(
            "missing required column: email".to_string(),
        ));
    }

    let mut summary = IngestSummary::default();
    let mut seen = HashSet::new();
    let mut rows = Vec::new();

    for (index, record) in csv.deserialize::<CsvRow>().enumerate() {
        summary.read += 1;
        let line = index + 2;
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                warn!(line, error = %e, "Skipping undecodable row");
                summary.skipped += 1;
                continue;
            }
        };
        let Some(prospect) = row.normalize() else {
            warn!(line, "Skipping row with empty email");
            summary.skipped += 1;
            continue;
        };
        if !seen.insert(prospect.email.clone()) {
            debug!(line, email = %prospect.email, "Skipping duplicate email");
            summary.skipped += 1;
            continue;
        }
        rows.push(prospect);
    }
    Ok((rows, summary))
}

/// Reads prospects from `reader` and upserts them keyed by email in chunks
/// of `chunk_size`. A failed chunk is logged and counted; later chunks still
/// run.
pub async fn ingest_csv<R: Read>(
    reader: R,
    store: &dyn ProspectStore,
    chunk_size: usize,
) -> OutreachResult<IngestSummary> {
    let (rows, mut summary) = read_rows(reader)?;
    info!(
        read = summary.read,
        valid = rows.len(),
        skipped = summary.skipped,
        "Prospect file parsed"
    );

    for (index, chunk) in rows.chunks(chunk_size.max(1)).enumerate() {
        match store.upsert_batch(chunk, PROSPECT_KEY).await {
            Ok(written) => {
                summary.uploaded += written;
                debug!(batch = index + 1, written, "Batch uploaded");
            }
            Err(e) => {
                error!(batch = index + 1, size = chunk.len(), error = %e, "Batch upload failed");
                summary.failed_batches += 1;
            }
        }
    }

    info!(
        uploaded = summary.uploaded,
        failed_batches = summary.failed_batches,
        "Prospect ingestion complete"
    );
    Ok(summary)
}

pub async fn ingest_path(
    path: impl AsRef<Path>,
    store: &dyn ProspectStore,
    chunk_size: usize,
) -> OutreachResult<IngestSummary> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    info!(path = %path.display(), "Reading prospect file");
    ingest_csv(file, store, chunk_size).await
}
