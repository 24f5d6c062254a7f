//! Outreach sequencing: the step schedule, eligibility rules, template
//! selection, and the guarded state transition recorded after each send.

pub mod engine;
pub mod schedule;
pub mod state_machine;
pub mod templates;

pub use engine::SequenceEngine;
pub use schedule::{NextTouch, Schedule, StepPolicy, FINAL_STEP, INITIAL_STEP};
pub use state_machine::{record_send, Transition};
pub use templates::{RenderedMessage, SenderProfile, TemplateDescriptor, TemplateRegistry};
