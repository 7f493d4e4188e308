use serde::{Deserialize, Serialize};

use crate::types::{MouseButton, Region};

/// A click/drag target: either a named mapping point or literal coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointRef {
    Named(String),
    At { x: i32, y: i32 },
}

impl PointRef {
    /// The mapping-point name, if this is a named reference.
    pub fn name(&self) -> Option<&str> {
        match self {
            PointRef::Named(name) => Some(name),
            PointRef::At { .. } => None,
        }
    }
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

/// A single atomic action in a linear workflow.
///
/// Loop and condition actions embed nested action lists rather than
/// referencing other steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Click a named mapping point.
    #[serde(rename_all = "camelCase")]
    Click {
        point: String,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_clicks")]
        clicks: u32,
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Click literal screen coordinates.
    #[serde(rename_all = "camelCase")]
    ClickAt {
        x: i32,
        y: i32,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_clicks")]
        clicks: u32,
    },

    /// Type a string of text.
    #[serde(rename = "type")]
    Type { text: String },

    /// Press a key combo; all entries but the last are held as modifiers.
    PressKey { combo: Vec<String> },

    /// Sleep for a fixed delay, or until a template appears on screen.
    #[serde(rename_all = "camelCase")]
    Wait {
        #[serde(default)]
        ms: Option<u64>,
        #[serde(default)]
        until_template: Option<String>,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },

    /// Capture the screen or a region of it.
    Screenshot {
        #[serde(default)]
        region: Option<Region>,
    },

    /// Search the screen for a named template.
    #[serde(rename_all = "camelCase")]
    FindImage {
        template: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        /// When set, a miss is logged as a warning instead of failing the step.
        #[serde(default)]
        optional: bool,
    },

    /// Move the cursor to a named point or literal coordinates.
    MoveMouse { target: PointRef },

    /// Press-move-release between two targets.
    Drag {
        from: PointRef,
        to: PointRef,
        #[serde(default)]
        button: MouseButton,
    },

    /// Repeat the embedded actions a fixed number of times.
    Loop { count: u32, actions: Vec<Action> },

    /// Run one of two embedded action lists depending on whether a template
    /// is currently on screen.
    #[serde(rename_all = "camelCase")]
    Condition {
        template: String,
        #[serde(default = "default_confidence")]
        confidence: f32,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default, rename = "then")]
        then_actions: Vec<Action>,
        #[serde(default, rename = "else")]
        else_actions: Vec<Action>,
    },
}

impl Action {
    /// Short name used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click",
            Action::ClickAt { .. } => "clickAt",
            Action::Type { .. } => "type",
            Action::PressKey { .. } => "pressKey",
            Action::Wait { .. } => "wait",
            Action::Screenshot { .. } => "screenshot",
            Action::FindImage { .. } => "findImage",
            Action::MoveMouse { .. } => "moveMouse",
            Action::Drag { .. } => "drag",
            Action::Loop { .. } => "loop",
            Action::Condition { .. } => "condition",
        }
    }

    /// Collect every mapping-point and template name this action references,
    /// recursing into loop and condition bodies.
    pub fn collect_refs(&self, points: &mut Vec<String>, templates: &mut Vec<String>) {
        match self {
            Action::Click { point, .. } => points.push(point.clone()),
            Action::MoveMouse { target } => {
                if let Some(name) = target.name() {
                    points.push(name.to_string());
                }
            }
            Action::Drag { from, to, .. } => {
                for target in [from, to] {
                    if let Some(name) = target.name() {
                        points.push(name.to_string());
                    }
                }
            }
            Action::Wait { until_template, .. } => {
                if let Some(template) = until_template {
                    templates.push(template.clone());
                }
            }
            Action::FindImage { template, .. } => templates.push(template.clone()),
            Action::Loop { actions, .. } => {
                for action in actions {
                    action.collect_refs(points, templates);
                }
            }
            Action::Condition {
                template,
                then_actions,
                else_actions,
                ..
            } => {
                templates.push(template.clone());
                for action in then_actions.iter().chain(else_actions) {
                    action.collect_refs(points, templates);
                }
            }
            _ => {}
        }
    }
}

/// One step in a linear workflow. Steps execute in ascending `order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub id: String,
    pub order: u32,
    /// Retries on failure before `continue_on_error` is consulted.
    #[serde(default)]
    pub max_retries: u32,
    /// Whether a step that exhausted its retries warns-and-continues
    /// instead of failing the run.
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(flatten)]
    pub action: Action,
}

/// A linear workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    /// Delay applied after every step except the last. `None` falls back to
    /// the engine default; an explicit `0` disables the delay entirely.
    #[serde(default)]
    pub step_delay_ms: Option<u64>,
    pub steps: Vec<WorkflowStep>,
}
