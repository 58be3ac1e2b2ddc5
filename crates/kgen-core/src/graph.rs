//! Knowledge graph model
//!
//! A `Graph` can only be produced by a `GraphBuilder`, which enforces the two
//! structural invariants every consumer relies on:
//! - node ids are pairwise distinct (first-seen wins)
//! - every edge endpoint names a node in the same graph

use std::collections::HashMap;

use serde::Serialize;

/// Group assigned to nodes whose category is missing or blank
pub const DEFAULT_GROUP: &str = "entity";

/// Why a node or edge was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Entry is not a JSON object
    Malformed,
    /// Identifier empty after trimming
    BlankId,
    /// Label empty after trimming
    BlankLabel,
    /// A node with the same id was already accepted
    DuplicateId,
    /// Edge endpoint does not name an accepted node
    UnknownEndpoint,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed => write!(f, "not an object"),
            Self::BlankId => write!(f, "blank id"),
            Self::BlankLabel => write!(f, "blank label"),
            Self::DuplicateId => write!(f, "duplicate id"),
            Self::UnknownEndpoint => write!(f, "unknown endpoint"),
        }
    }
}

// ============================================================================
// Nodes and Edges
// ============================================================================

/// An entity in the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    id: String,
    label: String,
    group: String,
}

impl Node {
    /// Create a node from already-canonical parts
    ///
    /// Id and label are trimmed and must be non-empty. A blank group falls
    /// back to [`DEFAULT_GROUP`].
    pub fn new(
        id: impl AsRef<str>,
        label: impl AsRef<str>,
        group: impl AsRef<str>,
    ) -> Result<Self, Rejection> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(Rejection::BlankId);
        }
        let label = label.as_ref().trim();
        if label.is_empty() {
            return Err(Rejection::BlankLabel);
        }
        let group = match group.as_ref().trim() {
            "" => DEFAULT_GROUP,
            g => g,
        };

        Ok(Self {
            id: id.to_string(),
            label: label.to_string(),
            group: group.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

/// A labeled, directed relationship between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    from: String,
    to: String,
    label: String,
}

impl Edge {
    /// Create an edge; endpoints and label are trimmed and must be non-empty
    pub fn new(
        from: impl AsRef<str>,
        to: impl AsRef<str>,
        label: impl AsRef<str>,
    ) -> Result<Self, Rejection> {
        let from = from.as_ref().trim();
        let to = to.as_ref().trim();
        if from.is_empty() || to.is_empty() {
            return Err(Rejection::BlankId);
        }
        let label = label.as_ref().trim();
        if label.is_empty() {
            return Err(Rejection::BlankLabel);
        }

        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
            label: label.to_string(),
        })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

// ============================================================================
// Graph
// ============================================================================

/// A validated knowledge graph
///
/// Immutable once built. Nodes keep first-seen order and edges keep the order
/// in which they were accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Check whether a canonical id names a node in this graph
    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a node by canonical id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Edges as (subject, predicate, object) label triples
    pub fn triples(&self) -> impl Iterator<Item = Triple<'_>> + '_ {
        self.edges.iter().filter_map(move |edge| {
            Some(Triple {
                subject: self.node(&edge.from)?.label(),
                predicate: edge.label(),
                object: self.node(&edge.to)?.label(),
            })
        })
    }
}

/// A relationship rendered with node labels instead of ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Triple<'a> {
    pub subject: &'a str,
    pub predicate: &'a str,
    pub object: &'a str,
}

impl std::fmt::Display for Triple<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) -[{}]-> ({})", self.subject, self.predicate, self.object)
    }
}

/// Incremental graph construction with invariant checks
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a node unless its id is already taken
    pub fn add_node(&mut self, node: Node) -> Result<(), Rejection> {
        if self.index.contains_key(node.id()) {
            return Err(Rejection::DuplicateId);
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Accept an edge only if both endpoints are known nodes
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), Rejection> {
        if !self.contains_node(edge.from()) || !self.contains_node(edge.to()) {
            return Err(Rejection::UnknownEndpoint);
        }
        self.edges.push(edge);
        Ok(())
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn build(self) -> Graph {
        Graph {
            nodes: self.nodes,
            edges: self.edges,
            index: self.index,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, label: &str) -> Node {
        Node::new(id, label, "person").unwrap()
    }

    #[test]
    fn test_node_trims_and_defaults_group() {
        let n = Node::new("  7 ", " Alice ", "   ").unwrap();
        assert_eq!(n.id(), "7");
        assert_eq!(n.label(), "Alice");
        assert_eq!(n.group(), DEFAULT_GROUP);
    }

    #[test]
    fn test_node_rejects_blank_fields() {
        assert_eq!(Node::new(" ", "A", "x"), Err(Rejection::BlankId));
        assert_eq!(Node::new("a", "\t", "x"), Err(Rejection::BlankLabel));
    }

    #[test]
    fn test_edge_rejects_blank_fields() {
        assert_eq!(Edge::new("", "b", "knows"), Err(Rejection::BlankId));
        assert_eq!(Edge::new("a", "b", " "), Err(Rejection::BlankLabel));
    }

    #[test]
    fn test_builder_first_seen_wins() {
        let mut builder = GraphBuilder::new();
        builder.add_node(node("a", "First")).unwrap();
        assert_eq!(
            builder.add_node(node("a", "Second")),
            Err(Rejection::DuplicateId)
        );

        let graph = builder.build();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node("a").unwrap().label(), "First");
    }

    #[test]
    fn test_builder_drops_dangling_edges() {
        let mut builder = GraphBuilder::new();
        builder.add_node(node("a", "A")).unwrap();
        builder.add_node(node("b", "B")).unwrap();

        assert!(builder.add_edge(Edge::new("a", "b", "knows").unwrap()).is_ok());
        assert_eq!(
            builder.add_edge(Edge::new("a", "c", "knows").unwrap()),
            Err(Rejection::UnknownEndpoint)
        );

        let graph = builder.build();
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.contains_node("b"));
        assert!(!graph.contains_node("c"));
    }

    #[test]
    fn test_node_order_is_insertion_order() {
        let mut builder = GraphBuilder::new();
        for id in ["z", "a", "m"] {
            builder.add_node(node(id, id)).unwrap();
        }
        let graph = builder.build();
        let ids: Vec<&str> = graph.nodes().iter().map(Node::id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_triples_use_labels() {
        let mut builder = GraphBuilder::new();
        builder.add_node(node("1", "Alice")).unwrap();
        builder.add_node(node("2", "Bob")).unwrap();
        builder.add_edge(Edge::new("1", "2", "knows").unwrap()).unwrap();
        let graph = builder.build();

        let triples: Vec<String> = graph.triples().map(|t| t.to_string()).collect();
        assert_eq!(triples, vec!["(Alice) -[knows]-> (Bob)"]);
    }

    #[test]
    fn test_serialized_shape() {
        let mut builder = GraphBuilder::new();
        builder.add_node(node("1", "Alice")).unwrap();
        builder.add_edge(Edge::new("1", "1", "is").unwrap()).unwrap();
        let json = serde_json::to_value(builder.build()).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "nodes": [{"id": "1", "label": "Alice", "group": "person"}],
                "edges": [{"from": "1", "to": "1", "label": "is"}]
            })
        );
    }
}
