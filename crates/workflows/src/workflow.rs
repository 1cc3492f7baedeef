//! The two-phase workflow contract.

use std::sync::Arc;

use txr_core::job::Patient;
use txr_engine::assets::AssetLibrary;
use txr_engine::{Device, Engine, NodeInputs, NodeOutput};

use crate::error::WorkflowError;

/// Everything a workflow instance receives at construction: the shared
/// engine handle, the reference-image library, and its device binding.
///
/// Cheap to clone; the engine and library are shared read-only across
/// all instances and worker threads.
#[derive(Clone)]
pub struct WorkflowContext {
    pub engine: Arc<dyn Engine>,
    pub assets: Arc<AssetLibrary>,
    pub device: Device,
}

impl WorkflowContext {
    /// Invoke an engine op on this instance's device.
    pub fn invoke(&self, op: &str, inputs: NodeInputs) -> Result<NodeOutput, WorkflowError> {
        Ok(self.engine.invoke(self.device, op, inputs)?)
    }
}

/// Per-job inputs handed to [`Workflow::generate`].
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// Raw input image bytes as pulled from the queue.
    pub image: &'a [u8],
    pub patient: &'a Patient,
}

/// A named generation pipeline with the load-once/generate split.
///
/// `load_once` populates the variant's configuration struct with every
/// handle that does not depend on the per-job input; it is called once
/// per activation and its cost is amortized across consecutive jobs
/// for the same workflow. `generate` consumes the configuration
/// without mutating it and returns encoded PNG bytes.
pub trait Workflow: Send {
    /// Registry key of this variant.
    fn name(&self) -> &'static str;

    /// The device this instance is bound to (fixed at construction).
    fn device(&self) -> Device;

    /// Whether `load_once` has completed for this activation.
    fn is_loaded(&self) -> bool;

    /// Load all job-independent state. Failure aborts the activation
    /// and must propagate to the lifecycle manager.
    fn load_once(&mut self) -> Result<(), WorkflowError>;

    /// Run the pipeline for one job and return PNG bytes.
    ///
    /// Fails with [`WorkflowError::NotLoaded`] when called before
    /// `load_once`.
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<Vec<u8>, WorkflowError>;
}

impl std::fmt::Debug for dyn Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
