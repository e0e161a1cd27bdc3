pub mod config;
pub mod error;
pub mod extract;
pub mod grouping;
pub mod harmonize;
pub mod ingestion;
pub mod llm;
pub mod normalize;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod record;
