//! In-memory scripted engine for unit and integration tests.
//!
//! Hands out fresh opaque handles for every invocation, records the
//! full op log, and can be told to wrap or fail specific ops. Enabled
//! via the `testing` feature so dependent crates can use it from their
//! dev-dependencies.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::types::{Device, EngineValue, ImageTensor, NodeInputs, NodeOutput};

/// Handles returned per invocation; generously above the highest index
/// any workflow reads (checkpoint loaders expose model/clip/vae).
const HANDLES_PER_OP: u64 = 4;

/// One recorded [`Engine::invoke`] call.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub device: Device,
    pub op: String,
    pub inputs: NodeInputs,
}

/// One recorded [`Engine::free`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeCall {
    pub device: Device,
    pub models: bool,
    pub allocator: bool,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    invocations: Vec<Invocation>,
    frees: Vec<FreeCall>,
}

/// Scriptable [`Engine`] double.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    state: Mutex<State>,
    device_count: usize,
    wrapped_ops: HashSet<String>,
    failing_ops: HashSet<String>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            device_count: 1,
            ..Default::default()
        }
    }

    pub fn with_device_count(mut self, count: usize) -> Self {
        self.device_count = count;
        self
    }

    /// Make `op` return the `result`-wrapped output shape.
    pub fn with_wrapped_op(mut self, op: &str) -> Self {
        self.wrapped_ops.insert(op.to_string());
        self
    }

    /// Make `op` fail with an engine API error.
    pub fn with_failing_op(mut self, op: &str) -> Self {
        self.failing_ops.insert(op.to_string());
        self
    }

    /// Names of all ops invoked so far, in order.
    pub fn ops_invoked(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .invocations
            .iter()
            .map(|i| i.op.clone())
            .collect()
    }

    /// How many times `op` has been invoked.
    pub fn invocation_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .invocations
            .iter()
            .filter(|i| i.op == op)
            .count()
    }

    /// Full invocation log.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    /// All recorded free calls.
    pub fn free_calls(&self) -> Vec<FreeCall> {
        self.state.lock().unwrap().frees.clone()
    }
}

impl Engine for ScriptedEngine {
    fn has_op(&self, name: &str) -> bool {
        !name.is_empty()
    }

    fn invoke(
        &self,
        device: Device,
        op: &str,
        inputs: NodeInputs,
    ) -> Result<NodeOutput, EngineError> {
        if self.failing_ops.contains(op) {
            return Err(EngineError::Api {
                status: 500,
                body: format!("scripted failure for {op}"),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.invocations.push(Invocation {
            device,
            op: op.to_string(),
            inputs,
        });

        let values: Vec<EngineValue> = (0..HANDLES_PER_OP)
            .map(|offset| EngineValue {
                id: state.next_id + offset,
                kind: op.to_lowercase(),
            })
            .collect();
        state.next_id += HANDLES_PER_OP;

        if self.wrapped_ops.contains(op) {
            Ok(NodeOutput::Wrapped { result: values })
        } else {
            Ok(NodeOutput::Sequence(values))
        }
    }

    fn device_count(&self) -> usize {
        self.device_count
    }

    fn read_image(&self, _value: &EngineValue) -> Result<ImageTensor, EngineError> {
        Ok(ImageTensor {
            shape: vec![1, 4, 4, 3],
            data: vec![0.5; 48],
        })
    }

    fn free(&self, device: Device, models: bool, allocator: bool) -> Result<(), EngineError> {
        self.state.lock().unwrap().frees.push(FreeCall {
            device,
            models,
            allocator,
        });
        Ok(())
    }
}
