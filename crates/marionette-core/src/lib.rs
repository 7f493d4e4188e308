//! Core types, traits, and error hierarchy for marionette.
//!
//! Workflow and graph definitions arrive here as already-parsed serde
//! structures; authoring, storage, and the OS-level input/capture side all
//! live behind the traits in [`traits`].

pub mod action;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod traits;
pub mod types;

pub use action::{Action, PointRef, Workflow, WorkflowStep};
pub use config::{AppConfig, EngineConfig};
pub use error::{EngineError, Result};
pub use event::{EventBus, RunEvent};
pub use graph::{route, Anchor, GraphEdge, GraphNode, LoopMode, NodeKind, WorkflowGraph};
pub use traits::{
    ActionPort, Brain, BrainContext, BrainDecision, EdgeSummary, MappingRegistry, Template,
};
pub use types::{
    Capture, FoundImage, LogBuffer, LogEntry, LogLevel, MouseButton, Point, Region, RunState,
    RunStatus, LOG_CAPACITY,
};
