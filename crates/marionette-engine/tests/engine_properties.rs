use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;

use marionette_core::action::{Action, Workflow, WorkflowStep};
use marionette_core::error::{EngineError, Result};
use marionette_core::graph::{
    route, Anchor, GraphEdge, GraphNode, LoopMode, NodeKind, WorkflowGraph,
};
use marionette_core::traits::{
    ActionPort, Brain, BrainContext, BrainDecision, MappingRegistry, Template,
};
use marionette_core::types::{Capture, MouseButton, Point, Region, RunState};
use marionette_engine::{GraphWorkflowRunner, LinearWorkflowExecutor};

/// Port that records every synthesized input; clicks can be made to fail.
#[derive(Default)]
struct RecordingPort {
    clicks: Mutex<Vec<(MouseButton, Point)>>,
    typed: Mutex<Vec<String>>,
    keys: Mutex<Vec<(String, Vec<String>)>>,
    drags: Mutex<Vec<(Point, Point)>>,
    fail_clicks: AtomicBool,
}

impl RecordingPort {
    fn click_count(&self) -> usize {
        self.clicks.lock().unwrap().len()
    }
}

impl ActionPort for RecordingPort {
    fn move_mouse(&self, _x: i32, _y: i32) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn click(&self, button: MouseButton, at: Option<Point>) -> BoxFuture<'_, Result<()>> {
        let fail = self.fail_clicks.load(Ordering::SeqCst);
        self.clicks
            .lock()
            .unwrap()
            .push((button, at.unwrap_or(Point::new(0, 0))));
        Box::pin(async move {
            if fail {
                Err(EngineError::Action {
                    action: "click".into(),
                    message: "input device unavailable".into(),
                })
            } else {
                Ok(())
            }
        })
    }

    fn type_text(&self, text: &str) -> BoxFuture<'_, Result<()>> {
        self.typed.lock().unwrap().push(text.to_string());
        Box::pin(async { Ok(()) })
    }

    fn press_key(&self, key: &str, modifiers: &[String]) -> BoxFuture<'_, Result<()>> {
        self.keys
            .lock()
            .unwrap()
            .push((key.to_string(), modifiers.to_vec()));
        Box::pin(async { Ok(()) })
    }

    fn drag(&self, from: Point, to: Point, _button: MouseButton) -> BoxFuture<'_, Result<()>> {
        self.drags.lock().unwrap().push((from, to));
        Box::pin(async { Ok(()) })
    }

    fn screenshot(&self, _region: Option<Region>) -> BoxFuture<'_, Result<Capture>> {
        Box::pin(async { Ok(Capture::new(vec![0; 16], 2, 2, 4)) })
    }

    fn screen_size(&self) -> BoxFuture<'_, Result<(u32, u32)>> {
        Box::pin(async { Ok((1920, 1080)) })
    }
}

/// Registry with scripted visibility: a template is "on screen" when it has
/// an entry in `visible`, optionally only after N queries.
#[derive(Default)]
struct ScriptedRegistry {
    points: HashMap<String, Point>,
    templates: HashMap<String, Template>,
    visible: HashMap<String, Region>,
    appear_after: Mutex<HashMap<String, u32>>,
}

impl ScriptedRegistry {
    fn with_point(mut self, name: &str, point: Point) -> Self {
        self.points.insert(name.to_string(), point);
        self
    }

    fn with_template(mut self, name: &str) -> Self {
        self.templates.insert(
            name.to_string(),
            Template {
                name: name.to_string(),
                pixels: vec![0; 4],
                width: 1,
                height: 1,
                channels: 4,
            },
        );
        self
    }

    fn with_visible(mut self, name: &str, region: Region) -> Self {
        self = self.with_template(name);
        self.visible.insert(name.to_string(), region);
        self
    }

    fn appearing_after(self, name: &str, queries: u32) -> Self {
        self.appear_after
            .lock()
            .unwrap()
            .insert(name.to_string(), queries);
        self
    }
}

impl MappingRegistry for ScriptedRegistry {
    fn get_point_by_name(&self, name: &str) -> Option<Point> {
        self.points.get(name).copied()
    }

    fn get_template_by_name(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    fn find_template_on_screen(
        &self,
        name: &str,
        _confidence: f32,
        _timeout_ms: u64,
    ) -> BoxFuture<'_, Result<Option<Region>>> {
        let mut result = self.visible.get(name).copied();
        if result.is_some() {
            let mut pending = self.appear_after.lock().unwrap();
            if let Some(remaining) = pending.get_mut(name) {
                if *remaining > 0 {
                    *remaining -= 1;
                    result = None;
                }
            }
        }
        Box::pin(async move { Ok(result) })
    }
}

fn node(id: &str, data: NodeKind) -> GraphNode {
    GraphNode {
        id: id.into(),
        data,
    }
}

fn edge(source: &str, handle: &str, target: &str) -> GraphEdge {
    GraphEdge {
        source: source.into(),
        source_handle: handle.into(),
        target: target.into(),
    }
}

fn step(id: &str, order: u32, action: Action) -> WorkflowStep {
    WorkflowStep {
        id: id.into(),
        order,
        max_retries: 0,
        continue_on_error: false,
        action,
    }
}

fn workflow(steps: Vec<WorkflowStep>) -> Workflow {
    Workflow {
        name: "test".into(),
        step_delay_ms: Some(1),
        steps,
    }
}

// --- graph runner -----------------------------------------------------------

#[tokio::test]
async fn graph_start_to_end_completes() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = GraphWorkflowRunner::new(port, registry);

    let graph = WorkflowGraph {
        nodes: vec![node("start", NodeKind::Start), node("end", NodeKind::End)],
        edges: vec![edge("start", route::OUT, "end")],
    };

    let report = runner.run(&graph).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.steps_executed, 2);
    assert_eq!(runner.status().state, RunState::Completed);

    let started_lines = runner
        .status()
        .log
        .iter()
        .filter(|e| e.message.starts_with("node '") && e.message.ends_with("started"))
        .count();
    assert_eq!(started_lines, 2, "one start/finish pair per node");
}

#[tokio::test]
async fn count_loop_visits_node_four_times() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = GraphWorkflowRunner::new(port, registry);

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "loop",
                NodeKind::Loop {
                    mode: LoopMode::Count { count: 3 },
                },
            ),
            node("end", NodeKind::End),
        ],
        edges: vec![
            edge("start", route::OUT, "loop"),
            edge("loop", route::LOOP, "loop"),
            edge("loop", route::DONE, "end"),
        ],
    };

    let report = runner.run(&graph).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    // start + 4 loop visits (3 LOOP + 1 DONE) + end
    assert_eq!(report.steps_executed, 6);

    let loop_routes = runner
        .status()
        .log
        .iter()
        .filter(|e| e.message.contains("node 'loop' routed"))
        .map(|e| e.message.clone())
        .collect::<Vec<_>>();
    assert_eq!(loop_routes.len(), 4);
    assert_eq!(
        loop_routes
            .iter()
            .filter(|m| m.contains("'LOOP'"))
            .count(),
        3
    );
    assert_eq!(
        loop_routes
            .iter()
            .filter(|m| m.contains("'DONE'"))
            .count(),
        1
    );
}

#[tokio::test]
async fn unbounded_cycle_trips_visit_guardrail() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = GraphWorkflowRunner::new(port.clone(), registry);

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "spin",
                NodeKind::ClickCoords {
                    x: 1,
                    y: 1,
                    button: MouseButton::Left,
                    clicks: 1,
                    delay_ms: None,
                },
            ),
        ],
        edges: vec![
            edge("start", route::OUT, "spin"),
            edge("spin", route::OUT, "spin"),
        ],
    };

    let err = runner.run(&graph).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::NodeVisitsExceeded { ref node_id, limit: 1000 } if node_id == "spin"
    ));
    assert_eq!(runner.status().state, RunState::Error);
    // The node ran exactly 1000 full times; the 1001st visit aborted before
    // executing.
    assert_eq!(port.click_count(), 1000);
}

#[tokio::test]
async fn find_image_feeds_click_found_image() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default().with_visible(
        "save",
        Region {
            x: 100,
            y: 60,
            width: 40,
            height: 20,
        },
    ));
    let runner = GraphWorkflowRunner::new(port.clone(), registry);

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "find",
                NodeKind::FindImage {
                    template: "save".into(),
                    confidence: 0.9,
                    timeout_ms: 100,
                },
            ),
            node(
                "click",
                NodeKind::ClickFoundImage {
                    template: None,
                    anchor: Anchor::TopLeft,
                    offset_x: 3,
                    offset_y: 4,
                    button: MouseButton::Left,
                    clicks: 2,
                },
            ),
            node("end", NodeKind::End),
        ],
        edges: vec![
            edge("start", route::OUT, "find"),
            edge("find", route::FOUND, "click"),
            edge("click", route::OUT, "end"),
        ],
    };

    let report = runner.run(&graph).await.unwrap();
    assert_eq!(report.state, RunState::Completed);

    let clicks = port.clicks.lock().unwrap();
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0].1, Point::new(103, 64));
}

#[tokio::test]
async fn find_image_miss_routes_not_found() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default().with_template("absent"));
    let runner = GraphWorkflowRunner::new(port, registry);

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "find",
                NodeKind::FindImage {
                    template: "absent".into(),
                    confidence: 0.9,
                    timeout_ms: 50,
                },
            ),
            node("missing", NodeKind::End),
            node("end", NodeKind::End),
        ],
        edges: vec![
            edge("start", route::OUT, "find"),
            edge("find", route::FOUND, "missing"),
            edge("find", route::NOT_FOUND, "end"),
        ],
    };

    // A clean miss is a route, not an error.
    let report = runner.run(&graph).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
}

#[tokio::test]
async fn click_found_image_without_prior_find_is_fatal() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = GraphWorkflowRunner::new(port, registry);

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "click",
                NodeKind::ClickFoundImage {
                    template: None,
                    anchor: Anchor::Center,
                    offset_x: 0,
                    offset_y: 0,
                    button: MouseButton::Left,
                    clicks: 1,
                },
            ),
        ],
        edges: vec![edge("start", route::OUT, "click")],
    };

    let err = runner.run(&graph).await.unwrap_err();
    assert!(matches!(err, EngineError::NoFoundImage { .. }));
    assert!(err.to_string().contains("prior successful find-image"));
    assert_eq!(runner.status().state, RunState::Error);
}

#[tokio::test]
async fn until_loop_exits_when_template_appears() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(
        ScriptedRegistry::default()
            .with_visible(
                "dialog",
                Region {
                    x: 0,
                    y: 0,
                    width: 10,
                    height: 10,
                },
            )
            .appearing_after("dialog", 2),
    );
    let runner = GraphWorkflowRunner::new(port, registry);

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "loop",
                NodeKind::Loop {
                    mode: LoopMode::Until {
                        template: "dialog".into(),
                        confidence: 0.8,
                        timeout_ms: 10,
                        max_iterations: 50,
                    },
                },
            ),
            node("end", NodeKind::End),
        ],
        edges: vec![
            edge("start", route::OUT, "loop"),
            edge("loop", route::LOOP, "loop"),
            edge("loop", route::DONE, "end"),
        ],
    };

    let report = runner.run(&graph).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    // 2 misses (LOOP) + 1 hit (DONE) = 3 loop visits
    assert_eq!(report.steps_executed, 5);
}

struct FixedBrain {
    route: Option<String>,
}

impl Brain for FixedBrain {
    fn execute_node(
        &self,
        _node: &GraphNode,
        _context: &BrainContext,
    ) -> BoxFuture<'_, Result<BrainDecision>> {
        let route = self.route.clone();
        Box::pin(async move {
            match route {
                Some(route) => Ok(BrainDecision {
                    route,
                    message: Some("picked by test brain".into()),
                    tool_calls_executed: 1,
                    turns: 2,
                }),
                None => Err(EngineError::Action {
                    action: "ai.brain".into(),
                    message: "model unavailable".into(),
                }),
            }
        })
    }
}

fn brain_graph() -> WorkflowGraph {
    WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node(
                "brain",
                NodeKind::Brain {
                    prompt: Some("which way".into()),
                    routes: vec!["A".into(), "B".into()],
                },
            ),
            node("a", NodeKind::End),
            node("err", NodeKind::End),
        ],
        edges: vec![
            edge("start", route::OUT, "brain"),
            edge("brain", "A", "a"),
            edge("brain", route::ERROR, "err"),
        ],
    }
}

#[tokio::test]
async fn brain_route_follows_decision() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = GraphWorkflowRunner::new(port, registry)
        .with_brain(Arc::new(FixedBrain { route: Some("A".into()) }));

    let report = runner.run(&brain_graph()).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert!(runner
        .status()
        .log
        .iter()
        .any(|e| e.message.contains("routed 'A'")));
}

#[tokio::test]
async fn brain_failure_soft_routes_error() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = GraphWorkflowRunner::new(port, registry)
        .with_brain(Arc::new(FixedBrain { route: None }));

    // The brain throwing must not fail the run; it routes ERROR instead.
    let report = runner.run(&brain_graph()).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert!(runner
        .status()
        .log
        .iter()
        .any(|e| e.message.contains("routing 'ERROR'")));
}

#[tokio::test]
async fn second_graph_run_while_active_is_usage_error() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let runner = Arc::new(GraphWorkflowRunner::new(port, registry));

    let graph = WorkflowGraph {
        nodes: vec![
            node("start", NodeKind::Start),
            node("wait", NodeKind::Wait { ms: 300 }),
            node("end", NodeKind::End),
        ],
        edges: vec![
            edge("start", route::OUT, "wait"),
            edge("wait", route::OUT, "end"),
        ],
    };

    let first = {
        let runner = runner.clone();
        let graph = graph.clone();
        tokio::spawn(async move { runner.run(&graph).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let second = runner.run(&graph).await;
    assert!(matches!(second, Err(EngineError::AlreadyRunning)));

    let report = first.await.unwrap().unwrap();
    assert_eq!(report.state, RunState::Completed);
}

// --- linear executor --------------------------------------------------------

#[tokio::test]
async fn missing_references_fail_validation_with_no_side_effects() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port.clone(), registry);

    let wf = workflow(vec![
        step(
            "s1",
            1,
            Action::Click {
                point: "ghost-one".into(),
                button: MouseButton::Left,
                clicks: 1,
                delay_ms: None,
            },
        ),
        step(
            "s2",
            2,
            Action::Click {
                point: "ghost-two".into(),
                button: MouseButton::Left,
                clicks: 1,
                delay_ms: None,
            },
        ),
    ]);

    let err = executor.run(&wf).await.unwrap_err();
    match &err {
        EngineError::Validation { missing } => {
            assert_eq!(missing.len(), 2);
            assert!(missing.iter().any(|m| m.contains("ghost-one")));
            assert!(missing.iter().any(|m| m.contains("ghost-two")));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert_eq!(port.click_count(), 0, "no actions may run");
    assert_eq!(executor.status().state, RunState::Error);
}

#[tokio::test(start_paused = true)]
async fn failing_step_retries_then_continues() {
    let port = Arc::new(RecordingPort::default());
    port.fail_clicks.store(true, Ordering::SeqCst);
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port.clone(), registry);

    let mut failing = step(
        "flaky",
        1,
        Action::ClickAt {
            x: 5,
            y: 5,
            button: MouseButton::Left,
            clicks: 1,
        },
    );
    failing.max_retries = 2;
    failing.continue_on_error = true;

    let report = executor.run(&workflow(vec![failing])).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(port.click_count(), 3, "initial attempt + 2 retries");
    assert!(executor
        .status()
        .log
        .iter()
        .any(|e| e.message.contains("continuing")));
}

#[tokio::test(start_paused = true)]
async fn failing_step_without_continue_ends_in_error() {
    let port = Arc::new(RecordingPort::default());
    port.fail_clicks.store(true, Ordering::SeqCst);
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port.clone(), registry);

    let mut failing = step(
        "flaky",
        1,
        Action::ClickAt {
            x: 5,
            y: 5,
            button: MouseButton::Left,
            clicks: 1,
        },
    );
    failing.max_retries = 1;

    let err = executor.run(&workflow(vec![failing])).await.unwrap_err();
    assert!(matches!(err, EngineError::Action { .. }));
    assert_eq!(port.click_count(), 2);
    assert_eq!(executor.status().state, RunState::Error);
}

#[tokio::test]
async fn steps_execute_in_ascending_order() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port.clone(), registry);

    let wf = Workflow {
        name: "ordered".into(),
        step_delay_ms: Some(1),
        steps: vec![
            step("second", 20, Action::Type { text: "b".into() }),
            step("first", 10, Action::Type { text: "a".into() }),
            step("third", 30, Action::Type { text: "c".into() }),
        ],
    };

    executor.run(&wf).await.unwrap();
    assert_eq!(*port.typed.lock().unwrap(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn optional_find_image_miss_is_a_warning() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default().with_template("maybe"));
    let executor = LinearWorkflowExecutor::new(port, registry);

    let wf = workflow(vec![step(
        "s1",
        1,
        Action::FindImage {
            template: "maybe".into(),
            confidence: 0.8,
            timeout_ms: 10,
            optional: true,
        },
    )]);

    let report = executor.run(&wf).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert!(executor
        .status()
        .log
        .iter()
        .any(|e| e.message.contains("not found")));
}

#[tokio::test]
async fn condition_takes_then_branch_when_template_visible() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(
        ScriptedRegistry::default()
            .with_point("yes", Point::new(1, 1))
            .with_point("no", Point::new(2, 2))
            .with_visible(
                "dialog",
                Region {
                    x: 0,
                    y: 0,
                    width: 5,
                    height: 5,
                },
            ),
    );
    let executor = LinearWorkflowExecutor::new(port.clone(), registry);

    let wf = workflow(vec![step(
        "s1",
        1,
        Action::Condition {
            template: "dialog".into(),
            confidence: 0.8,
            timeout_ms: 10,
            then_actions: vec![Action::Click {
                point: "yes".into(),
                button: MouseButton::Left,
                clicks: 1,
                delay_ms: None,
            }],
            else_actions: vec![Action::Click {
                point: "no".into(),
                button: MouseButton::Left,
                clicks: 1,
                delay_ms: None,
            }],
        },
    )]);

    executor.run(&wf).await.unwrap();
    let clicks = port.clicks.lock().unwrap();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].1, Point::new(1, 1));
}

#[tokio::test]
async fn inline_loop_repeats_nested_actions() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port.clone(), registry);

    let wf = workflow(vec![step(
        "s1",
        1,
        Action::Loop {
            count: 3,
            actions: vec![
                Action::Type { text: "x".into() },
                Action::PressKey {
                    combo: vec!["ctrl".into(), "s".into()],
                },
            ],
        },
    )]);

    executor.run(&wf).await.unwrap();
    assert_eq!(port.typed.lock().unwrap().len(), 3);
    let keys = port.keys.lock().unwrap();
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0], ("s".to_string(), vec!["ctrl".to_string()]));
}

#[tokio::test]
async fn stop_mid_run_ends_stopped() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = Arc::new(LinearWorkflowExecutor::new(port, registry));

    let steps = (1..=50)
        .map(|i| {
            step(
                &format!("s{}", i),
                i,
                Action::Wait {
                    ms: Some(20),
                    until_template: None,
                    confidence: 0.8,
                    timeout_ms: 1000,
                },
            )
        })
        .collect();
    let wf = Workflow {
        name: "long".into(),
        step_delay_ms: Some(0),
        steps,
    };

    let handle = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.run(&wf).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    executor.stop();

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.state, RunState::Stopped);
    assert!(report.steps_executed < 50);
    assert_eq!(executor.status().state, RunState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn explicit_zero_step_delay_disables_inter_step_sleep() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port, registry);

    let steps = (1..=5)
        .map(|i| step(&format!("s{}", i), i, Action::Type { text: "x".into() }))
        .collect();
    let wf = Workflow {
        name: "no-delay".into(),
        step_delay_ms: Some(0),
        steps,
    };

    let before = tokio::time::Instant::now();
    executor.run(&wf).await.unwrap();
    assert_eq!(
        before.elapsed(),
        std::time::Duration::ZERO,
        "zero delay must not fall back to the engine default"
    );
}

#[tokio::test(start_paused = true)]
async fn unset_step_delay_uses_engine_default() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = LinearWorkflowExecutor::new(port, registry);

    let steps = (1..=3)
        .map(|i| step(&format!("s{}", i), i, Action::Type { text: "x".into() }))
        .collect();
    let wf = Workflow {
        name: "default-delay".into(),
        step_delay_ms: None,
        steps,
    };

    let before = tokio::time::Instant::now();
    executor.run(&wf).await.unwrap();
    // Two inter-step gaps at the default 250ms; none after the last step.
    assert_eq!(before.elapsed(), std::time::Duration::from_millis(500));
}

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let port = Arc::new(RecordingPort::default());
    let registry = Arc::new(ScriptedRegistry::default());
    let executor = Arc::new(LinearWorkflowExecutor::new(port, registry));

    let steps = (1..=20)
        .map(|i| {
            step(
                &format!("s{}", i),
                i,
                Action::Wait {
                    ms: Some(20),
                    until_template: None,
                    confidence: 0.8,
                    timeout_ms: 1000,
                },
            )
        })
        .collect();
    let wf = Workflow {
        name: "pausable".into(),
        step_delay_ms: Some(0),
        steps,
    };

    let handle = {
        let executor = executor.clone();
        tokio::spawn(async move { executor.run(&wf).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    executor.pause();
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(executor.status().state, RunState::Paused);

    executor.resume();
    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.state, RunState::Completed);
}
