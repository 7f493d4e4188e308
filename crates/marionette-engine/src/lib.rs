//! Workflow execution engines for marionette.
//!
//! Two engines share one run-control core: [`LinearWorkflowExecutor`] runs
//! an ordered step list with pre-flight validation and a retry +
//! continue-on-error policy; [`GraphWorkflowRunner`] runs a node/edge graph
//! as a route-driven state machine with fixed anti-runaway guardrails.

pub mod control;
pub mod graph_runner;
pub mod linear;
mod port_ops;

pub use control::{RunControl, RunReport, PAUSE_POLL};
pub use graph_runner::{GraphWorkflowRunner, MAX_NODE_VISITS, MAX_TOTAL_STEPS};
pub use linear::{validate_references, LinearWorkflowExecutor};
