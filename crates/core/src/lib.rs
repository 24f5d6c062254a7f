pub mod config;
pub mod error;
pub mod social;
pub mod timestamp;
pub mod types;

pub use config::AppConfig;
pub use error::{
    DeliveryError, GenerationError, OutreachError, OutreachResult, SequenceError, StoreError,
};
pub use types::{NewProspect, Prospect, ProspectFilter, ProspectUpdate, TimestampField};
