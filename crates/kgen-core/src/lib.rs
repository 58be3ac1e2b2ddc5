//! kgen Core - Graph model, error types, and shared traits
//!
//! This crate defines the abstractions the extraction pipeline is built on:
//! - Graph model (nodes, edges, validated graphs)
//! - Error taxonomy (gateway, parse, configuration)
//! - Prompt payload exchanged with the LLM gateway
//! - The `LlmGateway` trait implemented by LLM transports
//! - Configuration management

pub mod config;
pub mod graph;

pub use config::{
    AppConfig, ConfigError, ExtractionConfig, ExtractionDefaults, LlmConfig, LoggingConfig,
    OutputLanguage, Supplier, VisualConfig,
};
pub use graph::{Edge, Graph, GraphBuilder, Node, Rejection, Triple, DEFAULT_GROUP};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Failure of the LLM call itself (network, auth, quota, timeout)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("No API key configured for {0}")]
    MissingApiKey(Supplier),

    #[error("LLM request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("{supplier} rejected the API key (HTTP {status})")]
    Unauthorized { supplier: Supplier, status: u16 },

    #[error("{0} rate limit or quota exceeded")]
    RateLimited(Supplier),

    #[error("{supplier} returned HTTP {status}: {message}")]
    Http {
        supplier: Supplier,
        status: u16,
        message: String,
    },

    #[error("Failed to decode LLM response: {0}")]
    InvalidResponse(String),

    #[error("LLM returned no content")]
    EmptyResponse,

    #[error("Gateway misconfigured: {0}")]
    Misconfigured(String),
}

/// Reply was received but could not be coerced into a non-empty graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("LLM reply is not valid JSON: {0}")]
    Syntax(String),

    #[error("LLM reply is not a JSON object")]
    NotAnObject,

    #[error("LLM reply has neither a nodes nor an edges collection")]
    MissingCollections,

    #[error("empty graph")]
    EmptyGraph,
}

/// Error detail held by a failed extraction
///
/// Kept `Clone` so the pipeline controller can hold it in its state and hand
/// a copy back to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid value for {key}: {value}")]
    InvalidConfig { key: String, value: String },
}

impl ExtractionFailure {
    /// True when the LLM call failed, as opposed to its reply being unusable
    pub fn is_gateway(&self) -> bool {
        matches!(self, Self::Gateway(_))
    }

    /// True when the reply could not be turned into a graph
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum KgError {
    #[error("Input text is empty")]
    InputEmpty,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ExtractionFailure> for KgError {
    fn from(failure: ExtractionFailure) -> Self {
        match failure {
            ExtractionFailure::Gateway(e) => Self::Gateway(e),
            ExtractionFailure::Parse(e) => Self::Parse(e),
            ExtractionFailure::InvalidConfig { key, value } => {
                Self::Config(ConfigError::InvalidValue { key, value })
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, KgError>;

// ============================================================================
// Prompt Types
// ============================================================================

/// Instruction payload sent to the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPayload {
    /// Schema contract and output rules
    pub system: String,

    /// The text to analyse
    pub user: String,

    /// Sampling temperature, always within `[0, 1]`
    pub temperature: f32,

    /// Language the labels must be written in
    pub language: OutputLanguage,
}

impl PromptPayload {
    /// Flatten into a single prompt string for single-message transports
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Boundary to whatever executes prompts against an LLM provider
///
/// Implementations own transport concerns (timeouts, auth, retries). The
/// pipeline performs exactly one call per extraction.
#[async_trait::async_trait]
pub trait LlmGateway: Send + Sync {
    /// Execute the prompt and return the raw reply text
    async fn call(
        &self,
        prompt: &PromptPayload,
        supplier: Supplier,
        api_key: &str,
        temperature: f32,
    ) -> std::result::Result<String, GatewayError>;

    /// Gateway name for logging
    fn name(&self) -> &str {
        "llm"
    }
}

// ============================================================================
// Tests
// ============================================================================
