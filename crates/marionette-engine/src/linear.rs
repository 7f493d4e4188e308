//! Linear workflow execution: an ordered step list with pre-flight
//! validation, inline loops/conditions, and a retry + continue-on-error
//! failure policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::instrument;
use uuid::Uuid;

use marionette_core::action::{Action, Workflow, WorkflowStep};
use marionette_core::config::EngineConfig;
use marionette_core::error::{EngineError, Result};
use marionette_core::event::EventBus;
use marionette_core::traits::{ActionPort, MappingRegistry};
use marionette_core::types::{LogLevel, Point, RunState, RunStatus};

use crate::control::{RunControl, RunReport};
use crate::port_ops::{click_times, press_combo, resolve_point};

/// Retry backoff for the given attempt number (1-based).
fn backoff(attempt: u32) -> Duration {
    Duration::from_millis((500 * attempt as u64).min(2000))
}

/// Scan every step (recursing into loop/condition bodies) and collect all
/// missing mapping-point and template references into a single validation
/// error. Succeeding here guarantees no mid-run reference miss.
pub fn validate_references(
    registry: &dyn MappingRegistry,
    workflow: &Workflow,
) -> Result<()> {
    let mut points = Vec::new();
    let mut templates = Vec::new();
    for step in &workflow.steps {
        step.action.collect_refs(&mut points, &mut templates);
    }

    let mut missing = Vec::new();
    for name in &points {
        let label = format!("point '{}'", name);
        if registry.get_point_by_name(name).is_none() && !missing.contains(&label) {
            missing.push(label);
        }
    }
    for name in &templates {
        let label = format!("template '{}'", name);
        if registry.get_template_by_name(name).is_none() && !missing.contains(&label) {
            missing.push(label);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation { missing })
    }
}

/// Runs an ordered step list against an [`ActionPort`].
///
/// One run at a time; `pause`/`resume`/`stop` are non-blocking flag flips
/// observed at step boundaries and 100ms pause-poll ticks. This is the only
/// layer with automatic retry: failed steps back off
/// `min(500 * attempt, 2000)` ms between attempts, and a step that exhausts
/// its retries either warns-and-continues or fails the run, per its
/// `continue_on_error` flag.
pub struct LinearWorkflowExecutor {
    port: Arc<dyn ActionPort>,
    registry: Arc<dyn MappingRegistry>,
    config: EngineConfig,
    control: Arc<RunControl>,
}

impl LinearWorkflowExecutor {
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
            config: EngineConfig::default(),
            control: Arc::new(RunControl::new(events)),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
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

    /// Execute a workflow to completion.
    ///
    /// Fails with [`EngineError::AlreadyRunning`] while another run is
    /// active on this executor.
    #[instrument(name = "linear_run", skip(self, workflow), fields(workflow = %workflow.name))]
    pub async fn run(&self, workflow: &Workflow) -> Result<RunReport> {
        self.control.try_begin()?;
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        self.control.log(
            LogLevel::Info,
            format!(
                "workflow '{}' started ({} steps)",
                workflow.name,
                workflow.steps.len()
            ),
        );

        match self.run_inner(workflow).await {
            Ok((terminal, steps_executed)) => {
                self.control.log(
                    LogLevel::Info,
                    format!("workflow '{}' finished: {}", workflow.name, terminal),
                );
                self.control.finish(terminal);
                Ok(RunReport {
                    run_id,
                    state: terminal,
                    steps_executed,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                self.control
                    .log(LogLevel::Error, format!("workflow failed: {}", e));
                self.control.finish(RunState::Error);
                Err(e)
            }
        }
    }

    async fn run_inner(&self, workflow: &Workflow) -> Result<(RunState, u64)> {
        // Pre-flight: no partial side effects when references are missing.
        validate_references(self.registry.as_ref(), workflow)?;

        let mut steps: Vec<&WorkflowStep> = workflow.steps.iter().collect();
        steps.sort_by_key(|s| s.order);

        let step_delay = workflow
            .step_delay_ms
            .unwrap_or(self.config.step_delay_ms);

        let total = steps.len();
        let mut executed = 0u64;

        for (index, step) in steps.iter().enumerate() {
            if !self.control.wait_if_paused().await {
                return Ok((RunState::Stopped, executed));
            }

            self.control.set_current(Some(step.id.clone()));
            self.control.set_progress(index as f32 / total.max(1) as f32 * 100.0);
            self.control.log(
                LogLevel::Info,
                format!(
                    "step {}/{} '{}' ({})",
                    index + 1,
                    total,
                    step.id,
                    step.action.kind()
                ),
            );

            self.run_step_with_retry(step).await?;
            executed += 1;

            // Inter-step delay after every step except the last.
            if index + 1 < total && step_delay > 0 {
                if self.control.is_cancelled() {
                    return Ok((RunState::Stopped, executed));
                }
                tokio::time::sleep(Duration::from_millis(step_delay)).await;
            }
        }

        Ok((RunState::Completed, executed))
    }

    async fn run_step_with_retry(&self, step: &WorkflowStep) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            match self.exec_action(&step.action).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < step.max_retries => {
                    attempt += 1;
                    let delay = backoff(attempt);
                    self.control.log(
                        LogLevel::Warn,
                        format!(
                            "step '{}' failed (attempt {}/{}): {}; retrying in {}ms",
                            step.id,
                            attempt,
                            step.max_retries,
                            e,
                            delay.as_millis()
                        ),
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if step.continue_on_error {
                        self.control.log(
                            LogLevel::Warn,
                            format!(
                                "step '{}' failed after {} attempt(s): {}; continuing",
                                step.id,
                                attempt + 1,
                                e
                            ),
                        );
                        return Ok(());
                    }
                    return Err(e);
                }
            }
        }
    }

    fn exec_action<'a>(&'a self, action: &'a Action) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match action {
                Action::Click {
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
                    Ok(())
                }

                Action::ClickAt {
                    x,
                    y,
                    button,
                    clicks,
                } => {
                    click_times(self.port.as_ref(), *button, Point::new(*x, *y), *clicks).await
                }

                Action::Type { text } => self.port.type_text(text).await,

                Action::PressKey { combo } => press_combo(self.port.as_ref(), combo).await,

                Action::Wait {
                    ms,
                    until_template,
                    confidence,
                    timeout_ms,
                } => match until_template {
                    Some(template) => {
                        let found = self
                            .registry
                            .find_template_on_screen(template, *confidence, *timeout_ms)
                            .await?;
                        match found {
                            Some(_) => Ok(()),
                            None => Err(EngineError::TemplateNotOnScreen {
                                template: template.clone(),
                                timeout_ms: *timeout_ms,
                            }),
                        }
                    }
                    None => {
                        tokio::time::sleep(Duration::from_millis(ms.unwrap_or(0))).await;
                        Ok(())
                    }
                },

                Action::Screenshot { region } => {
                    let capture = self.port.screenshot(*region).await?;
                    self.control.log(
                        LogLevel::Info,
                        format!("captured {}x{} screenshot", capture.width, capture.height),
                    );
                    Ok(())
                }

                Action::FindImage {
                    template,
                    confidence,
                    timeout_ms,
                    optional,
                } => {
                    let found = self
                        .registry
                        .find_template_on_screen(template, *confidence, *timeout_ms)
                        .await?;
                    match found {
                        Some(region) => {
                            self.control.log(
                                LogLevel::Info,
                                format!(
                                    "template '{}' found at ({}, {})",
                                    template, region.x, region.y
                                ),
                            );
                            Ok(())
                        }
                        None if *optional => {
                            self.control.log(
                                LogLevel::Warn,
                                format!(
                                    "optional template '{}' not found within {}ms",
                                    template, timeout_ms
                                ),
                            );
                            Ok(())
                        }
                        None => Err(EngineError::TemplateNotOnScreen {
                            template: template.clone(),
                            timeout_ms: *timeout_ms,
                        }),
                    }
                }

                Action::MoveMouse { target } => {
                    let at = resolve_point(self.registry.as_ref(), target)?;
                    self.port.move_mouse(at.x, at.y).await
                }

                Action::Drag { from, to, button } => {
                    let from = resolve_point(self.registry.as_ref(), from)?;
                    let to = resolve_point(self.registry.as_ref(), to)?;
                    self.port.drag(from, to, *button).await
                }

                Action::Loop { count, actions } => {
                    for current in 1..=*count {
                        if self.control.is_cancelled() {
                            break;
                        }
                        self.control.log(
                            LogLevel::Info,
                            format!("loop iteration {}/{}", current, count),
                        );
                        for nested in actions {
                            self.exec_action(nested).await?;
                        }
                    }
                    Ok(())
                }

                Action::Condition {
                    template,
                    confidence,
                    timeout_ms,
                    then_actions,
                    else_actions,
                } => {
                    let found = self
                        .registry
                        .find_template_on_screen(template, *confidence, *timeout_ms)
                        .await?
                        .is_some();
                    self.control.log(
                        LogLevel::Info,
                        format!(
                            "condition '{}': {} branch",
                            template,
                            if found { "then" } else { "else" }
                        ),
                    );
                    let branch = if found { then_actions } else { else_actions };
                    for nested in branch {
                        self.exec_action(nested).await?;
                    }
                    Ok(())
                }
            }
        })
    }
}
