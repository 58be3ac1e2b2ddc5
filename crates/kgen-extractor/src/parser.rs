//! LLM reply parsing and validation
//!
//! Lenient about output hygiene, strict about schema: code fences and
//! surrounding prose are stripped, then every node and edge entry is checked
//! individually. Bad entries are dropped and counted; only a reply that is
//! not JSON, has no graph collections, or yields no nodes is an error.

use kgen_core::{Edge, Graph, GraphBuilder, Node, ParseError, Rejection};
use serde::Serialize;
use serde_json::{Map, Value};

/// Counts of entries dropped during validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostics {
    /// Node entries that were not objects or lacked an id or label
    pub skipped_nodes: usize,
    /// Node entries whose id was already taken
    pub duplicate_nodes: usize,
    /// Edge entries that were not objects or lacked an endpoint or label
    pub skipped_edges: usize,
    /// Edge entries pointing at an unknown node
    pub dangling_edges: usize,
}

impl ParseDiagnostics {
    pub fn total_dropped(&self) -> usize {
        self.skipped_nodes + self.duplicate_nodes + self.skipped_edges + self.dangling_edges
    }

    pub fn is_clean(&self) -> bool {
        self.total_dropped() == 0
    }
}

/// A validated graph plus what was dropped to get there
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub graph: Graph,
    pub diagnostics: ParseDiagnostics,
}

/// Parse a raw LLM reply into a graph
pub fn parse(raw: &str) -> Result<Graph, ParseError> {
    parse_with_diagnostics(raw).map(|outcome| outcome.graph)
}

/// Parse a raw LLM reply, keeping the drop counts
pub fn parse_with_diagnostics(raw: &str) -> Result<ParseOutcome, ParseError> {
    let value = decode_payload(raw)?;
    let object = value.as_object().ok_or(ParseError::NotAnObject)?;

    let raw_nodes = object.get("nodes").and_then(Value::as_array);
    let raw_edges = object.get("edges").and_then(Value::as_array);
    if raw_nodes.is_none() && raw_edges.is_none() {
        return Err(ParseError::MissingCollections);
    }

    let mut builder = GraphBuilder::new();
    let mut diagnostics = ParseDiagnostics::default();

    for (index, entry) in raw_nodes.into_iter().flatten().enumerate() {
        let accepted = node_from_entry(entry).and_then(|node| builder.add_node(node));
        if let Err(reason) = accepted {
            tracing::warn!(index, %reason, "dropping node entry");
            match reason {
                Rejection::DuplicateId => diagnostics.duplicate_nodes += 1,
                _ => diagnostics.skipped_nodes += 1,
            }
        }
    }

    if builder.node_count() == 0 {
        return Err(ParseError::EmptyGraph);
    }

    for (index, entry) in raw_edges.into_iter().flatten().enumerate() {
        let accepted = edge_from_entry(entry).and_then(|edge| builder.add_edge(edge));
        if let Err(reason) = accepted {
            tracing::warn!(index, %reason, "dropping edge entry");
            match reason {
                Rejection::UnknownEndpoint => diagnostics.dangling_edges += 1,
                _ => diagnostics.skipped_edges += 1,
            }
        }
    }

    let graph = builder.build();
    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        dropped = diagnostics.total_dropped(),
        "parsed LLM reply"
    );

    Ok(ParseOutcome { graph, diagnostics })
}

/// Decode the JSON payload of a reply
///
/// A fenced block is tried first, then the whole reply. Failing both, each
/// `{` is tried as the start of a JSON object and only the first value after
/// it is read, so prose on either side may contain braces. The first
/// candidate holding a `nodes` or `edges` key wins; otherwise the first
/// object found.
fn decode_payload(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    let payload = fenced_block(trimmed).unwrap_or(trimmed);

    let first_error = match serde_json::from_str::<Value>(payload) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let mut fallback = None;
    for (start, _) in trimmed.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = values.next() {
            if has_collections(&value) {
                return Ok(value);
            }
            if fallback.is_none() {
                fallback = Some(value);
            }
        }
    }

    fallback.ok_or_else(|| ParseError::Syntax(first_error.to_string()))
}

fn has_collections(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| object.contains_key("nodes") || object.contains_key("edges"))
}

/// Body of the first Markdown code fence, preferring a ```` ```json ```` fence
fn fenced_block(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = text.find("```")?;
    let block = &text[start + 3..];
    // Skip a language tag on the fence line
    let body = block.find('\n').map(|n| &block[n + 1..]).unwrap_or(block);
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// Normalize a JSON id into its comparable string form
///
/// `1`, `1.0` and `"1"` all become `"1"`. Booleans, null, arrays and objects
/// are not ids.
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| {
                    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        (f as i64).to_string()
                    } else {
                        f.to_string()
                    }
                })
            }
        }
        _ => None,
    }
}

/// Display text from a string, number or boolean
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn id_field(entry: &Map<String, Value>, key: &str) -> Option<String> {
    entry.get(key).and_then(canonical_id)
}

fn node_from_entry(entry: &Value) -> Result<Node, Rejection> {
    let entry = entry.as_object().ok_or(Rejection::Malformed)?;
    let id = id_field(entry, "id").ok_or(Rejection::BlankId)?;
    let label = text_field(entry.get("label")).ok_or(Rejection::BlankLabel)?;
    let group = text_field(entry.get("group")).unwrap_or_default();
    Node::new(id, label, group)
}

fn edge_from_entry(entry: &Value) -> Result<Edge, Rejection> {
    let entry = entry.as_object().ok_or(Rejection::Malformed)?;
    let from = id_field(entry, "from").ok_or(Rejection::BlankId)?;
    let to = id_field(entry, "to").ok_or(Rejection::BlankId)?;
    let label = text_field(entry.get("label")).ok_or(Rejection::BlankLabel)?;
    Edge::new(from, to, label)
}

// ============================================================================
// Tests
// ============================================================================
