//! The [`Engine`] trait: everything the worker asks of the external
//! node-graph engine.

use crate::error::EngineError;
use crate::types::{Device, EngineValue, ImageTensor, NodeInputs, NodeOutput};

/// Handle to the external node-graph execution engine.
///
/// Acquired once at process start (the expensive part is the engine's
/// plugin discovery) and shared read-only across worker threads. All
/// calls are blocking; generation runs to completion or fails, there is
/// no cancellation of an in-flight op.
pub trait Engine: Send + Sync {
    /// Whether `name` is in the engine's operation registry.
    fn has_op(&self, name: &str) -> bool;

    /// Invoke a named operation on the given device.
    ///
    /// Fails with [`EngineError::UnknownOp`] for unregistered names.
    fn invoke(
        &self,
        device: Device,
        op: &str,
        inputs: NodeInputs,
    ) -> Result<NodeOutput, EngineError>;

    /// Number of GPUs the engine can see. Zero means CPU only.
    fn device_count(&self) -> usize;

    /// Read an image handle back as a float tensor for PNG encoding.
    fn read_image(&self, value: &EngineValue) -> Result<ImageTensor, EngineError>;

    /// Release engine-held memory on a device.
    ///
    /// `models` drops loaded model weights (used when switching the
    /// active workflow); `allocator` drops the low-level allocator
    /// cache (the soft flush used during long idle periods).
    fn free(&self, device: Device, models: bool, allocator: bool) -> Result<(), EngineError>;
}
