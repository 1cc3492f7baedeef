use txr_engine::EngineError;

/// Errors from a workflow's load or generate phase.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// `generate` was invoked before `load_once` populated the
    /// configuration. Always a caller bug, never silently tolerated.
    #[error("Workflow {0} used before load_once")]
    NotLoaded(&'static str),

    /// An engine op failed (missing weight file, engine internal
    /// error, transport failure to the sidecar).
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors from the dispatcher registry.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The requested name is not registered.
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),
}
