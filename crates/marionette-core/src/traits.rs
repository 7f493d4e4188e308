use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::GraphNode;
use crate::types::{Capture, MouseButton, Point, Region};

/// OS-level input synthesis and capture primitives.
///
/// The engines never call the OS directly; everything goes through this
/// seam so runs can be replayed against a dry-run or mock port.
pub trait ActionPort: Send + Sync + 'static {
    fn move_mouse(&self, x: i32, y: i32) -> BoxFuture<'_, Result<()>>;

    /// Click at the given position, or at the current cursor position when
    /// `at` is `None`.
    fn click(&self, button: MouseButton, at: Option<Point>) -> BoxFuture<'_, Result<()>>;

    fn type_text(&self, text: &str) -> BoxFuture<'_, Result<()>>;

    /// Press `key` while holding `modifiers`.
    fn press_key(&self, key: &str, modifiers: &[String]) -> BoxFuture<'_, Result<()>>;

    fn drag(&self, from: Point, to: Point, button: MouseButton) -> BoxFuture<'_, Result<()>>;

    /// Capture the full screen, or `region` of it.
    fn screenshot(&self, region: Option<Region>) -> BoxFuture<'_, Result<Capture>>;

    /// Screen size in physical pixels.
    fn screen_size(&self) -> BoxFuture<'_, Result<(u32, u32)>>;

    /// Physical-to-logical pixel ratio of the display.
    fn scale_factor(&self) -> f64 {
        1.0
    }
}

/// A named reference image used for on-screen matching.
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

/// Named-point and named-template lookup.
///
/// `find_template_on_screen` composes the screen matcher with periodic
/// re-capture until the timeout; a clean miss is `None`, never an error.
pub trait MappingRegistry: Send + Sync + 'static {
    fn get_point_by_name(&self, name: &str) -> Option<Point>;

    fn get_template_by_name(&self, name: &str) -> Option<&Template>;

    fn find_template_on_screen(
        &self,
        name: &str,
        confidence: f32,
        timeout_ms: u64,
    ) -> BoxFuture<'_, Result<Option<Region>>>;
}

/// Summary of one edge adjacent to a brain node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSummary {
    pub source: String,
    pub source_handle: String,
    pub target: String,
}

/// The capped neighborhood handed to the Brain collaborator: adjacent edges
/// plus a truncated preview of nearby node configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainContext {
    pub node_id: String,
    pub incoming: Vec<EdgeSummary>,
    pub outgoing: Vec<EdgeSummary>,
    /// Config previews keyed by node id, truncated to 8 keys and 120
    /// characters per value.
    pub config_previews: HashMap<String, serde_json::Value>,
}

/// Outcome of a brain node execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainDecision {
    pub route: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub tool_calls_executed: u32,
    #[serde(default)]
    pub turns: u32,
}

/// AI decision collaborator, consulted by the graph runner only.
pub trait Brain: Send + Sync + 'static {
    fn execute_node(
        &self,
        node: &GraphNode,
        context: &BrainContext,
    ) -> BoxFuture<'_, Result<BrainDecision>>;
}
