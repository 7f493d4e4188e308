//! Graph workflow execution: a route-driven state machine over a node/edge
//! graph, with loop counters, found-image memory, and fixed guardrails
//! against runaway cycles.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use marionette_core::error::{EngineError, Result};
use marionette_core::event::EventBus;
use marionette_core::graph::{route, GraphNode, LoopMode, NodeKind, WorkflowGraph};
use marionette_core::traits::{ActionPort, Brain, BrainContext, EdgeSummary, MappingRegistry};
use marionette_core::types::{FoundImage, LogLevel, Point, RunState, RunStatus};

use crate::control::{RunControl, RunReport};
use crate::port_ops::{click_times, press_combo, resolve_point};

/// Total node executions allowed per run.
pub const MAX_TOTAL_STEPS: u64 = 10_000;

/// Executions allowed per individual node per run.
pub const MAX_NODE_VISITS: u64 = 1_000;

/// Config previews handed to the brain keep at most this many keys.
const PREVIEW_MAX_KEYS: usize = 8;

/// Config preview values are truncated to this many characters.
const PREVIEW_MAX_VALUE_CHARS: usize = 120;

/// State owned by a single graph run and discarded at its end.
struct RunMemory {
    total_steps: u64,
    visits: HashMap<String, u64>,
    loop_counters: HashMap<String, u64>,
    found_images: HashMap<String, FoundImage>,
    last_found: Option<FoundImage>,
}

impl RunMemory {
    fn new() -> Self {
        Self {
            total_steps: 0,
            visits: HashMap::new(),
            loop_counters: HashMap::new(),
            found_images: HashMap::new(),
            last_found: None,
        }
    }
}

/// Runs a workflow graph as a route-driven state machine.
///
/// Each node execution yields a route token; the token selects the outgoing
/// edge registered for `(node, token)`. No matching edge ends the branch
/// normally. Any action failure or guardrail breach is fatal; only the
/// `ai.brain` node fails soft, by routing `ERROR`.
pub struct GraphWorkflowRunner {
    port: Arc<dyn ActionPort>,
    registry: Arc<dyn MappingRegistry>,
    brain: Option<Arc<dyn Brain>>,
    control: Arc<RunControl>,
}

impl GraphWorkflowRunner {
    pub fn new(port: Arc<dyn ActionPort>, registry: Arc<dyn MappingRegistry>) -> Self {
        Self::with_events(port, registry, Arc::new(EventBus::default()))
    }

    pub fn with_events(
        port: Arc<dyn ActionPort>,
        registry: Arc<dyn MappingRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            port,
            registry,
            brain: None,
            control: Arc::new(RunControl::new(events)),
        }
    }

    pub fn with_brain(mut self, brain: Arc<dyn Brain>) -> Self {
        self.brain = Some(brain);
        self
    }

    pub fn status(&self) -> RunStatus {
        self.control.status()
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Execute a workflow graph to completion.
    ///
    /// Fails with [`EngineError::AlreadyRunning`] while another run is
    /// active on this runner.
    #[instrument(name = "graph_run", skip(self, graph), fields(nodes = graph.nodes.len()))]
    pub async fn run(&self, graph: &WorkflowGraph) -> Result<RunReport> {
        self.control.try_begin()?;
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        self.control.log(
            LogLevel::Info,
            format!(
                "graph run started ({} nodes, {} edges)",
                graph.nodes.len(),
                graph.edges.len()
            ),
        );

        let mut memory = RunMemory::new();
        match self.run_inner(graph, &mut memory).await {
            Ok(terminal) => {
                self.control
                    .log(LogLevel::Info, format!("graph run finished: {}", terminal));
                self.control.finish(terminal);
                Ok(RunReport {
                    run_id,
                    state: terminal,
                    steps_executed: memory.total_steps,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                self.control
                    .log(LogLevel::Error, format!("graph run failed: {}", e));
                self.control.finish(RunState::Error);
                Err(e)
            }
        }
    }

    async fn run_inner(&self, graph: &WorkflowGraph, memory: &mut RunMemory) -> Result<RunState> {
        let routes = compile_routes(graph)?;
        let nodes: HashMap<&str, &GraphNode> =
            graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut current = graph.start_node()?.id.clone();

        loop {
            if !self.control.wait_if_paused().await {
                return Ok(RunState::Stopped);
            }

            let node = nodes
                .get(current.as_str())
                .copied()
                .ok_or_else(|| EngineError::Graph(format!("node '{}' not found", current)))?;

            memory.total_steps += 1;
            let visits = memory.visits.entry(current.clone()).or_insert(0);
            *visits += 1;
            if memory.total_steps > MAX_TOTAL_STEPS {
                return Err(EngineError::TotalStepsExceeded {
                    limit: MAX_TOTAL_STEPS,
                });
            }
            if *visits > MAX_NODE_VISITS {
                return Err(EngineError::NodeVisitsExceeded {
                    node_id: current.clone(),
                    limit: MAX_NODE_VISITS,
                });
            }

            self.control.set_current(Some(current.clone()));
            self.control.log(
                LogLevel::Info,
                format!("node '{}' ({}) started", node.id, node.data.kind()),
            );

            let token = self.dispatch(graph, node, memory).await?;
            self.control.log(
                LogLevel::Info,
                format!("node '{}' routed '{}'", node.id, token),
            );

            if matches!(node.data, NodeKind::End) {
                return Ok(RunState::Completed);
            }

            match routes.get(&(current.clone(), token.clone())) {
                Some(target) => current = target.clone(),
                None => {
                    self.control.log(
                        LogLevel::Info,
                        format!("no edge for ('{}', '{}'), branch ends", current, token),
                    );
                    return Ok(RunState::Completed);
                }
            }
        }
    }

    /// Execute one node and return its route token. Fatal on any failure
    /// except inside `ai.brain`, which soft-fails by routing `ERROR`.
    async fn dispatch(
        &self,
        graph: &WorkflowGraph,
        node: &GraphNode,
        memory: &mut RunMemory,
    ) -> Result<String> {
        match &node.data {
            NodeKind::Start | NodeKind::End => Ok(route::OUT.to_string()),

            NodeKind::ClickPoint {
                point,
                button,
                clicks,
                delay_ms,
            } => {
                let at = self
                    .registry
                    .get_point_by_name(point)
                    .ok_or_else(|| EngineError::PointNotFound(point.clone()))?;
                click_times(self.port.as_ref(), *button, at, *clicks).await?;
                if let Some(ms) = delay_ms {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                Ok(route::OUT.to_string())
            }

            NodeKind::ClickCoords {
                x,
                y,
                button,
                clicks,
                delay_ms,
            } => {
                click_times(self.port.as_ref(), *button, Point::new(*x, *y), *clicks).await?;
                if let Some(ms) = delay_ms {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                Ok(route::OUT.to_string())
            }

            NodeKind::TypeText { text } => {
                self.port.type_text(text).await?;
                Ok(route::OUT.to_string())
            }

            NodeKind::PressKey { combo } => {
                press_combo(self.port.as_ref(), combo).await?;
                Ok(route::OUT.to_string())
            }

            NodeKind::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(route::OUT.to_string())
            }

            NodeKind::MoveMouse { target } => {
                let at = resolve_point(self.registry.as_ref(), target)?;
                self.port.move_mouse(at.x, at.y).await?;
                Ok(route::OUT.to_string())
            }

            NodeKind::DragMouse { from, to, button } => {
                let from = resolve_point(self.registry.as_ref(), from)?;
                let to = resolve_point(self.registry.as_ref(), to)?;
                self.port.drag(from, to, *button).await?;
                Ok(route::OUT.to_string())
            }

            NodeKind::Screenshot { region } => {
                self.port.screenshot(*region).await?;
                Ok(route::OUT.to_string())
            }

            NodeKind::FindImage {
                template,
                confidence,
                timeout_ms,
            } => {
                // A clean miss is a route, never an error.
                let found = self
                    .registry
                    .find_template_on_screen(template, *confidence, *timeout_ms)
                    .await?;
                match found {
                    Some(region) => {
                        let record = FoundImage {
                            template_name: template.clone(),
                            x: region.x,
                            y: region.y,
                            width: region.width,
                            height: region.height,
                        };
                        memory
                            .found_images
                            .insert(template.clone(), record.clone());
                        memory.last_found = Some(record);
                        Ok(route::FOUND.to_string())
                    }
                    None => Ok(route::NOT_FOUND.to_string()),
                }
            }

            NodeKind::ClickFoundImage {
                template,
                anchor,
                offset_x,
                offset_y,
                button,
                clicks,
            } => {
                let record = match template {
                    Some(name) => memory.found_images.get(name),
                    None => memory.last_found.as_ref(),
                }
                .ok_or_else(|| EngineError::NoFoundImage {
                    template: template.clone(),
                })?;

                let (x, y) = anchor.resolve(&record.region(), *offset_x, *offset_y);
                click_times(self.port.as_ref(), *button, Point::new(x, y), *clicks).await?;
                Ok(route::OUT.to_string())
            }

            NodeKind::Loop { mode } => self.dispatch_loop(node, mode, memory).await,

            NodeKind::Brain { .. } => Ok(self.dispatch_brain(graph, node).await),
        }
    }

    async fn dispatch_loop(
        &self,
        node: &GraphNode,
        mode: &LoopMode,
        memory: &mut RunMemory,
    ) -> Result<String> {
        let counter = memory.loop_counters.entry(node.id.clone()).or_insert(0);
        match mode {
            LoopMode::Count { count } => {
                if *counter < *count as u64 {
                    *counter += 1;
                    Ok(route::LOOP.to_string())
                } else {
                    *counter = 0;
                    Ok(route::DONE.to_string())
                }
            }
            LoopMode::Until {
                template,
                confidence,
                timeout_ms,
                max_iterations,
            } => {
                let found = self
                    .registry
                    .find_template_on_screen(template, *confidence, *timeout_ms)
                    .await?
                    .is_some();
                if found || *counter >= *max_iterations as u64 {
                    *counter = 0;
                    Ok(route::DONE.to_string())
                } else {
                    *counter += 1;
                    Ok(route::LOOP.to_string())
                }
            }
        }
    }

    /// The only node type permitted to fail soft: any brain failure becomes
    /// the `ERROR` route.
    async fn dispatch_brain(&self, graph: &WorkflowGraph, node: &GraphNode) -> String {
        let Some(brain) = &self.brain else {
            self.control.log(
                LogLevel::Warn,
                format!("node '{}': no brain collaborator configured", node.id),
            );
            return route::ERROR.to_string();
        };

        let context = brain_context(graph, node);
        match brain.execute_node(node, &context).await {
            Ok(decision) => {
                self.control.log(
                    LogLevel::Info,
                    format!(
                        "brain '{}' routed '{}' ({} tool calls, {} turns){}",
                        node.id,
                        decision.route,
                        decision.tool_calls_executed,
                        decision.turns,
                        decision
                            .message
                            .as_deref()
                            .map(|m| format!(": {}", m))
                            .unwrap_or_default()
                    ),
                );
                decision.route
            }
            Err(e) => {
                self.control.log(
                    LogLevel::Warn,
                    format!("brain '{}' failed: {}; routing '{}'", node.id, e, route::ERROR),
                );
                route::ERROR.to_string()
            }
        }
    }
}

/// Compile the edge list into a `(source, handle) → target` route map.
/// Duplicate `(source, handle)` pairs are rejected rather than silently
/// dropping an edge.
fn compile_routes(graph: &WorkflowGraph) -> Result<HashMap<(String, String), String>> {
    let mut routes = HashMap::new();
    for edge in &graph.edges {
        let key = (edge.source.clone(), edge.source_handle.clone());
        if routes
            .insert(key, edge.target.clone())
            .is_some()
        {
            return Err(EngineError::DuplicateRoute {
                node: edge.source.clone(),
                handle: edge.source_handle.clone(),
            });
        }
    }
    Ok(routes)
}

/// Build the capped neighborhood summary for a brain node: adjacent edges
/// plus truncated config previews of the node and its direct neighbors.
fn brain_context(graph: &WorkflowGraph, node: &GraphNode) -> BrainContext {
    let summarize = |e: &marionette_core::graph::GraphEdge| EdgeSummary {
        source: e.source.clone(),
        source_handle: e.source_handle.clone(),
        target: e.target.clone(),
    };

    let incoming: Vec<EdgeSummary> = graph
        .edges
        .iter()
        .filter(|e| e.target == node.id)
        .map(summarize)
        .collect();
    let outgoing: Vec<EdgeSummary> = graph
        .edges
        .iter()
        .filter(|e| e.source == node.id)
        .map(summarize)
        .collect();

    let mut neighbor_ids: Vec<&str> = vec![node.id.as_str()];
    for edge in incoming.iter() {
        neighbor_ids.push(edge.source.as_str());
    }
    for edge in outgoing.iter() {
        neighbor_ids.push(edge.target.as_str());
    }
    neighbor_ids.dedup();

    let config_previews = neighbor_ids
        .into_iter()
        .filter_map(|id| graph.node(id))
        .map(|n| (n.id.clone(), config_preview(n)))
        .collect();

    BrainContext {
        node_id: node.id.clone(),
        incoming,
        outgoing,
        config_previews,
    }
}

/// Preview a node's config: at most [`PREVIEW_MAX_KEYS`] keys, each value
/// truncated to [`PREVIEW_MAX_VALUE_CHARS`] characters.
fn config_preview(node: &GraphNode) -> Value {
    let value = serde_json::to_value(&node.data).unwrap_or(Value::Null);
    match value.get("config").cloned() {
        Some(Value::Object(map)) => Value::Object(
            map.into_iter()
                .take(PREVIEW_MAX_KEYS)
                .map(|(k, v)| (k, truncate_preview(v)))
                .collect(),
        ),
        Some(other) => truncate_preview(other),
        None => Value::Object(serde_json::Map::new()),
    }
}

fn truncate_preview(value: Value) -> Value {
    match value {
        Value::String(s) if s.chars().count() > PREVIEW_MAX_VALUE_CHARS => {
            Value::String(s.chars().take(PREVIEW_MAX_VALUE_CHARS).collect())
        }
        Value::String(s) => Value::String(s),
        other => {
            let rendered = other.to_string();
            if rendered.chars().count() > PREVIEW_MAX_VALUE_CHARS {
                Value::String(rendered.chars().take(PREVIEW_MAX_VALUE_CHARS).collect())
            } else {
                other
            }
        }
    }
}
