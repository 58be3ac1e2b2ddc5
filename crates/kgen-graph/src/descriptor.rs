//! Visualization descriptor types
//!
//! Field names serialize in camelCase, the convention of the JavaScript graph
//! widgets that consume them.

use kgen_core::VisualConfig;
use serde::Serialize;

/// A node as the renderer draws it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualNode {
    pub id: String,
    pub label: String,
    pub size: u32,
    /// `#rrggbb`
    pub color: String,
}

/// A directed, labeled link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualEdge {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Display policy for the graph canvas
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub directed: bool,
    pub physics: bool,
    pub hierarchical: bool,
    pub highlight_enabled: bool,
    pub highlight_color: String,
    pub collapsible: bool,
    /// Node attribute shown as caption
    pub node_label_property: String,
    /// Edge attribute shown as caption
    pub link_label_property: String,
    pub render_link_labels: bool,
}

impl DisplayConfig {
    /// Fixed layout policy with the configurable dimensions and colors
    pub fn from_visual(visual: &VisualConfig) -> Self {
        Self {
            width: visual.width,
            height: visual.height,
            directed: true,
            physics: true,
            hierarchical: true,
            highlight_enabled: true,
            highlight_color: visual.highlight_color.clone(),
            collapsible: true,
            node_label_property: "label".to_string(),
            link_label_property: "label".to_string(),
            render_link_labels: true,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::from_visual(&VisualConfig::default())
    }
}

/// Read-only projection of a graph for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualizationDescriptor {
    nodes: Vec<VisualNode>,
    edges: Vec<VisualEdge>,
    config: DisplayConfig,
}

impl VisualizationDescriptor {
    pub(crate) fn new(nodes: Vec<VisualNode>, edges: Vec<VisualEdge>, config: DisplayConfig) -> Self {
        Self {
            nodes,
            edges,
            config,
        }
    }

    pub fn nodes(&self) -> &[VisualNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[VisualEdge] {
        &self.edges
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_display_policy() {
        let config = DisplayConfig::default();
        assert!(config.directed && config.physics && config.hierarchical);
        assert!(config.highlight_enabled);
        assert_eq!(config.highlight_color, "#F7A7A6");
        assert_eq!((config.width, config.height), (1000, 500));
    }

    #[test]
    fn test_display_config_serializes_camel_case() {
        let json = serde_json::to_value(DisplayConfig::default()).unwrap();
        assert_eq!(json["highlightEnabled"], true);
        assert_eq!(json["highlightColor"], "#F7A7A6");
        assert_eq!(json["nodeLabelProperty"], "label");
    }
}
