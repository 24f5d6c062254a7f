use thiserror::Error;

pub type OutreachResult<T> = Result<T, OutreachError>;

#[derive(Error, Debug)]
pub enum OutreachError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Prospect store error: {0}")]
    Store(#[from] StoreError),

    #[error("Content generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Failures reported by a prospect or social-post store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store unreachable or returned a server-side failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Guarded update found the record at a different step than expected.
    #[error("conflicting update for {key}: expected step {expected}, found {found:?}")]
    Conflict {
        key: String,
        expected: u32,
        found: Option<u32>,
    },

    #[error("record not found: {0}")]
    NotFound(String),

    /// Filter or payload rejected by the store.
    #[error("malformed request: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Whether repeating the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("generation timed out after {0}s")]
    Timeout(u64),

    #[error("provider returned no text")]
    EmptyResponse,

    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("provider rejected message with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("delivery timed out after {0}s")]
    Timeout(u64),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("channel not configured: {0}")]
    NotConfigured(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    #[error("step {0} is not part of the outreach sequence")]
    UnknownStep(u32),

    #[error("cannot record step {step} for {email}: prospect is at step {current}")]
    InvalidTransition {
        email: String,
        current: u32,
        step: u32,
    },

    #[error("invalid template registry: {0}")]
    Template(String),
}
