//! kgen Graph - Visualization layer
//!
//! Projects a validated [`kgen_core::Graph`] into a renderer-neutral
//! [`VisualizationDescriptor`]: styled nodes, directed edges and a fixed
//! display policy (hierarchical layout, physics, node highlighting).

pub mod descriptor;
pub mod mapper;

pub use descriptor::{DisplayConfig, VisualEdge, VisualNode, VisualizationDescriptor};
pub use mapper::{group_color, VisualizationMapper};
