use serde::{Deserialize, Serialize};

use crate::action::PointRef;
use crate::error::{EngineError, Result};
use crate::types::{MouseButton, Region};

/// Route tokens returned by node execution. The token selects the outgoing
/// edge via its `source_handle`.
pub mod route {
    pub const OUT: &str = "OUT";
    pub const FOUND: &str = "FOUND";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const LOOP: &str = "LOOP";
    pub const DONE: &str = "DONE";
    pub const ERROR: &str = "ERROR";
}

fn default_clicks() -> u32 {
    1
}

fn default_confidence() -> f32 {
    0.8
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_until_max_iterations() -> u32 {
    50
}

/// Anchor within a found image from which a click point is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// Resolve the anchor against a found-image region, then apply offsets.
    pub fn resolve(&self, region: &Region, offset_x: i32, offset_y: i32) -> (i32, i32) {
        let (ax, ay) = match self {
            Anchor::Center => {
                let c = region.center();
                (c.x, c.y)
            }
            Anchor::TopLeft => (region.x, region.y),
            Anchor::TopRight => (region.x + region.width as i32, region.y),
            Anchor::BottomLeft => (region.x, region.y + region.height as i32),
            Anchor::BottomRight => (
                region.x + region.width as i32,
                region.y + region.height as i32,
            ),
        };
        (ax + offset_x, ay + offset_y)
    }
}

/// Loop behavior for a `loop` node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum LoopMode {
    /// Take the `LOOP` route a fixed number of times, then `DONE`.
    Count { count: u32 },
    /// Re-run an image search each visit; `LOOP` while the template is not
    /// found and the iteration cap is not reached.
    #[serde(rename_all = "camelCase")]
    Until {
        template: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_until_max_iterations")]
        max_iterations: u32,
    },
}

/// Typed per-kind configuration for a graph node.
///
/// Serialized adjacently tagged: `{"nodeType": "...", "config": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "nodeType", content = "config", rename_all = "kebab-case")]
pub enum NodeKind {
    Start,
    End,

    /// Click a named mapping point.
    #[serde(rename_all = "camelCase")]
    ClickPoint {
        point: String,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_clicks")]
        clicks: u32,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Click literal coordinates.
    #[serde(rename_all = "camelCase")]
    ClickCoords {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_clicks")]
        clicks: u32,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    TypeText {
        text: String,
    },

    /// All combo entries but the last are held as modifiers.
    PressKey {
        combo: Vec<String>,
    },

    Wait {
        ms: u64,
    },

    MoveMouse {
        target: PointRef,
    },

    DragMouse {
        from: PointRef,
        to: PointRef,
        #[serde(default)]
        button: MouseButton,
    },

    Screenshot {
        #[serde(default)]
        region: Option<Region>,
    },

    /// Condition node: routes `FOUND` / `NOT_FOUND`, never fails on a miss.
    #[serde(rename_all = "camelCase")]
    FindImage {
        template: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },

    /// Click relative to a previously found image.
    #[serde(rename_all = "camelCase")]
    ClickFoundImage {
        /// Explicit template name; `None` uses the most recent find.
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        anchor: Anchor,
        #[serde(default)]
        offset_x: i32,
        #[serde(default)]
        offset_y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_clicks")]
        clicks: u32,
    },

    Loop {
        #[serde(flatten)]
        mode: LoopMode,
    },

    /// Delegate the route decision to the Brain collaborator.
    #[serde(rename = "ai.brain")]
    Brain {
        #[serde(default)]
        prompt: Option<String>,
        /// Routes the brain may pick from; advisory, not enforced.
        #[serde(default)]
        routes: Vec<String>,
    },
}

impl NodeKind {
    /// Short name used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::ClickPoint { .. } => "click-point",
            NodeKind::ClickCoords { .. } => "click-coords",
            NodeKind::TypeText { .. } => "type-text",
            NodeKind::PressKey { .. } => "press-key",
            NodeKind::Wait { .. } => "wait",
            NodeKind::MoveMouse { .. } => "move-mouse",
            NodeKind::DragMouse { .. } => "drag-mouse",
            NodeKind::Screenshot { .. } => "screenshot",
            NodeKind::FindImage { .. } => "find-image",
            NodeKind::ClickFoundImage { .. } => "click-found-image",
            NodeKind::Loop { .. } => "loop",
            NodeKind::Brain { .. } => "ai.brain",
        }
    }
}

/// A node in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub data: NodeKind,
}

/// A directed edge addressed by `(source, source_handle)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub source_handle: String,
    pub target: String,
}

/// A branching workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl WorkflowGraph {
    /// The unique `start` node. Zero or multiple start nodes is a graph error.
    pub fn start_node(&self) -> Result<&GraphNode> {
        let mut starts = self
            .nodes
            .iter()
            .filter(|n| matches!(n.data, NodeKind::Start));
        match (starts.next(), starts.next()) {
            (Some(start), None) => Ok(start),
            (None, _) => Err(EngineError::Graph("graph has no start node".into())),
            (Some(_), Some(_)) => Err(EngineError::Graph(
                "graph has more than one start node".into(),
            )),
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
