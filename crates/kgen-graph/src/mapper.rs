//! Graph to visualization mapping

use kgen_core::{Graph, VisualConfig};
use sha2::{Digest, Sha256};

use crate::descriptor::{DisplayConfig, VisualEdge, VisualNode, VisualizationDescriptor};

/// Deterministic `#rrggbb` color for a node group
///
/// Takes the first 24 bits of the SHA-256 digest, so equal groups share a
/// color across runs and machines. Distinct groups may collide.
pub fn group_color(group: &str) -> String {
    let digest = Sha256::digest(group.as_bytes());
    format!("#{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2])
}

/// Maps validated graphs into visualization descriptors
#[derive(Debug, Clone, Default)]
pub struct VisualizationMapper {
    visual: VisualConfig,
}

impl VisualizationMapper {
    pub fn new(visual: VisualConfig) -> Self {
        Self { visual }
    }

    /// Project a graph; infallible for any valid graph
    pub fn map(&self, graph: &Graph) -> VisualizationDescriptor {
        let nodes = graph
            .nodes()
            .iter()
            .map(|node| VisualNode {
                id: node.id().to_string(),
                label: node.label().to_string(),
                size: self.visual.node_size,
                color: group_color(node.group()),
            })
            .collect();

        let edges = graph
            .edges()
            .iter()
            .map(|edge| VisualEdge {
                source: edge.from().to_string(),
                target: edge.to().to_string(),
                label: edge.label().to_string(),
            })
            .collect();

        VisualizationDescriptor::new(nodes, edges, DisplayConfig::from_visual(&self.visual))
    }
}
