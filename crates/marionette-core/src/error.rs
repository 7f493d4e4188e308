use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    // Pre-flight validation (linear executor only)
    #[error("workflow validation failed: {} missing reference(s): {}", .missing.len(), .missing.join(", "))]
    Validation { missing: Vec<String> },

    // Runtime lookup misses
    #[error("mapping point not found: {0}")]
    PointNotFound(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template '{template}' not found on screen within {timeout_ms}ms")]
    TemplateNotOnScreen { template: String, timeout_ms: u64 },

    #[error("click-found-image requires a prior successful find-image in this run{}", .template.as_deref().map(|t| format!(" (template '{t}')")).unwrap_or_default())]
    NoFoundImage { template: Option<String> },

    // Graph structure errors
    #[error("graph error: {0}")]
    Graph(String),

    // The field holding the node id must not be called `source`: thiserror
    // reserves that name for the error-source chain.
    #[error("duplicate route: node '{node}' already has an edge for handle '{handle}'")]
    DuplicateRoute { node: String, handle: String },

    // Execution guardrails (graph runner only, always fatal)
    #[error("possible infinite loop: total steps exceeded {limit}")]
    TotalStepsExceeded { limit: u64 },

    #[error("possible infinite loop: node '{node_id}' visited more than {limit} times")]
    NodeVisitsExceeded { node_id: String, limit: u64 },

    // Underlying input/capture failures
    #[error("action failed: {action}: {message}")]
    Action { action: String, message: String },

    // Usage errors
    #[error("a run is already active on this executor")]
    AlreadyRunning,

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether the linear executor's retry policy applies to this error.
    ///
    /// Only failures coming out of the action port or a runtime lookup are
    /// retryable; validation, usage, and structural errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Action { .. }
                | EngineError::PointNotFound(_)
                | EngineError::TemplateNotFound(_)
                | EngineError::TemplateNotOnScreen { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
