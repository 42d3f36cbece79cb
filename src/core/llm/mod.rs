//! Narrative generation for the report's description section
//!
//! Providers sit behind the `NarrativeGenerator` trait so the workflow can be
//! driven by a real API client or by an in-memory stand-in.

mod narrator;
mod providers;

pub use narrator::{EntitySummary, NarrativeGenerator, NarrativeRequest};
pub use providers::{create_narrator, AnthropicProvider, OpenAiProvider};
