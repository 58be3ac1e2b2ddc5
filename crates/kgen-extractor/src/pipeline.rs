//! Extraction pipeline controller
//!
//! Sequences prompt building, the gateway call, reply parsing and
//! visualization mapping for one request, and holds the outcome of the most
//! recent request.
//!
//! State machine: `Idle -> Extracting -> {Ready, Empty, Failed}`. Each
//! request restarts from `Idle`. Requests are numbered; a reply that lands
//! after a newer request has started is returned to its caller but never
//! written into the held state.
//!
//! Author: hephaex@gmail.com

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use kgen_core::{
    ConfigError, ExtractionConfig, ExtractionFailure, Graph, KgError, LlmGateway,
};
use kgen_graph::{VisualizationDescriptor, VisualizationMapper};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::parser::{parse_with_diagnostics, ParseDiagnostics};
use crate::prompt::build_prompt;

/// A successful extraction
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub graph: Graph,
    pub descriptor: VisualizationDescriptor,
    pub diagnostics: ParseDiagnostics,
}

/// Terminal outcome of one `extract` call
#[derive(Debug, Clone)]
pub enum PipelineResult {
    /// Graph extracted and mapped
    Ready(Arc<Extraction>),
    /// Input text was blank; the LLM was not called
    Empty,
    /// Gateway or parse failure, verbatim
    Failed(ExtractionFailure),
}

impl PipelineResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn extraction(&self) -> Option<&Extraction> {
        match self {
            Self::Ready(extraction) => Some(extraction),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Convert into the crate-wide `Result`; `Empty` becomes `InputEmpty`
    pub fn into_result(self) -> kgen_core::Result<Arc<Extraction>> {
        match self {
            Self::Ready(extraction) => Ok(extraction),
            Self::Empty => Err(KgError::InputEmpty),
            Self::Failed(failure) => Err(failure.into()),
        }
    }
}

/// State held by the controller between requests
#[derive(Debug, Clone, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Extracting {
        generation: u64,
    },
    Ready(Arc<Extraction>),
    Empty,
    Failed(ExtractionFailure),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting { .. } => "extracting",
            Self::Ready(_) => "ready",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<&PipelineResult> for PipelineState {
    fn from(result: &PipelineResult) -> Self {
        match result {
            PipelineResult::Ready(extraction) => Self::Ready(Arc::clone(extraction)),
            PipelineResult::Empty => Self::Empty,
            PipelineResult::Failed(failure) => Self::Failed(failure.clone()),
        }
    }
}

/// Per-session extraction controller
///
/// The only stateful component of the pipeline. Sessions must not share a
/// controller.
pub struct PipelineController {
    gateway: Arc<dyn LlmGateway>,
    mapper: VisualizationMapper,
    state: RwLock<PipelineState>,
    generation: AtomicU64,
}

impl PipelineController {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            mapper: VisualizationMapper::default(),
            state: RwLock::new(PipelineState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    /// Use a mapper with custom display settings
    pub fn with_mapper(mut self, mapper: VisualizationMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// Snapshot of the held state
    pub async fn state(&self) -> PipelineState {
        self.state.read().await.clone()
    }

    /// Number of the most recent request
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Extract a knowledge graph from text
    pub async fn extract(&self, text: &str, config: &ExtractionConfig) -> PipelineResult {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.transition(generation, PipelineState::Idle).await;

        if text.trim().is_empty() {
            tracing::info!(generation, "blank input, skipping extraction");
            return self.finish(generation, PipelineResult::Empty).await;
        }

        if let Err(e) = config.validate() {
            tracing::warn!(generation, error = %e, "rejecting extraction config");
            let failure = match e {
                ConfigError::InvalidValue { key, value } => {
                    ExtractionFailure::InvalidConfig { key, value }
                }
                other => ExtractionFailure::InvalidConfig {
                    key: "config".to_string(),
                    value: other.to_string(),
                },
            };
            return self.finish(generation, PipelineResult::Failed(failure)).await;
        }

        self.transition(generation, PipelineState::Extracting { generation })
            .await;
        tracing::info!(
            generation,
            supplier = %config.supplier,
            language = %config.output_language,
            chars = text.chars().count(),
            "extracting knowledge graph"
        );

        let prompt = build_prompt(text, config.output_language, config.temperature);
        let reply = self
            .gateway
            .call(&prompt, config.supplier, &config.api_key, prompt.temperature)
            .await;

        let result = match reply {
            Err(e) => {
                tracing::warn!(generation, gateway = self.gateway.name(), error = %e, "LLM call failed");
                PipelineResult::Failed(e.into())
            }
            Ok(raw) => match parse_with_diagnostics(&raw) {
                Err(e) => {
                    tracing::warn!(generation, error = %e, "LLM reply rejected");
                    PipelineResult::Failed(e.into())
                }
                Ok(outcome) => {
                    let descriptor = self.mapper.map(&outcome.graph);
                    tracing::info!(
                        generation,
                        nodes = outcome.graph.node_count(),
                        edges = outcome.graph.edge_count(),
                        dropped = outcome.diagnostics.total_dropped(),
                        "knowledge graph ready"
                    );
                    PipelineResult::Ready(Arc::new(Extraction {
                        id: Uuid::new_v4(),
                        created_at: Utc::now(),
                        graph: outcome.graph,
                        descriptor,
                        diagnostics: outcome.diagnostics,
                    }))
                }
            },
        };

        self.finish(generation, result).await
    }

    /// Apply a state change only if no newer request has started
    async fn transition(&self, generation: u64, next: PipelineState) -> bool {
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "request superseded, state left unchanged");
            return false;
        }
        *state = next;
        true
    }

    async fn finish(&self, generation: u64, result: PipelineResult) -> PipelineResult {
        self.transition(generation, PipelineState::from(&result)).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgen_core::{GatewayError, ParseError};

    #[test]
    fn test_state_names() {
        assert_eq!(PipelineState::default().name(), "idle");
        assert_eq!(PipelineState::Extracting { generation: 3 }.name(), "extracting");
        assert_eq!(PipelineState::Empty.name(), "empty");
    }

    #[test]
    fn test_empty_into_input_empty() {
        let err = PipelineResult::Empty.into_result().unwrap_err();
        assert!(matches!(err, KgError::InputEmpty));
    }

    #[test]
    fn test_failed_into_result_keeps_kind() {
        let gateway = PipelineResult::Failed(GatewayError::Timeout { secs: 5 }.into());
        assert!(matches!(
            gateway.into_result().unwrap_err(),
            KgError::Gateway(GatewayError::Timeout { secs: 5 })
        ));

        let parse = PipelineResult::Failed(ParseError::EmptyGraph.into());
        assert!(matches!(
            parse.into_result().unwrap_err(),
            KgError::Parse(ParseError::EmptyGraph)
        ));
    }

    #[test]
    fn test_result_accessors() {
        let failed = PipelineResult::Failed(ParseError::NotAnObject.into());
        assert!(failed.is_failed() && !failed.is_ready() && !failed.is_empty());
        assert!(failed.extraction().is_none());
        assert!(failed.failure().unwrap().is_parse());
    }
}
