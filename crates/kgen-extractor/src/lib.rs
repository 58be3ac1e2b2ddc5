//! kgen Extractor - Knowledge graph extraction pipeline
//!
//! Builds the extraction prompt, validates the LLM reply into a
//! [`kgen_core::Graph`], and drives both through a per-session
//! [`PipelineController`].

pub mod parser;
pub mod pipeline;
pub mod prompt;

pub use parser::{parse, parse_with_diagnostics, ParseDiagnostics, ParseOutcome};
pub use pipeline::{Extraction, PipelineController, PipelineResult, PipelineState};
pub use prompt::build_prompt;
