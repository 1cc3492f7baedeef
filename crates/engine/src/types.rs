//! Wire and value types shared across the engine boundary.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The compute device a workflow instance is bound to.
///
/// Fixed at construction; switching devices means constructing a new
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Cpu,
    /// A specific GPU by index.
    Gpu(usize),
}

impl Device {
    pub fn is_gpu(&self) -> bool {
        matches!(self, Device::Gpu(_))
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu(index) => write!(f, "cuda:{index}"),
        }
    }
}

impl Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Opaque handle to an engine-resident value (model, clip, vae,
/// conditioning, latent, image, mask, text...).
///
/// The worker never inspects what a handle points at; it only routes
/// handles between ops and reads final image tensors back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineValue {
    pub id: u64,
    /// Engine-reported kind tag, for logging only.
    #[serde(default)]
    pub kind: String,
}

/// Result of one op invocation.
///
/// Ops either return their values positionally or wrap them under a
/// `result` key; [`value_at`] resolves both shapes so call sites never
/// branch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeOutput {
    Sequence(Vec<EngineValue>),
    Wrapped { result: Vec<EngineValue> },
}

/// Read the value at `index` from an op output.
///
/// Sequence outputs are indexed directly; wrapped outputs are indexed
/// within their `result` list. An out-of-range index is an error in
/// both shapes -- there is no silent fallback to an empty value.
pub fn value_at(output: &NodeOutput, index: usize) -> Result<&EngineValue, EngineError> {
    let values = match output {
        NodeOutput::Sequence(values) => values,
        NodeOutput::Wrapped { result } => result,
    };
    values.get(index).ok_or(EngineError::IndexOutOfRange {
        index,
        len: values.len(),
    })
}

/// A single named op argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Handle(EngineValue),
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Str(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Str(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<i32> for ArgValue {
    fn from(v: i32) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<u32> for ArgValue {
    fn from(v: u32) -> Self {
        ArgValue::Int(v as i64)
    }
}

impl From<u64> for ArgValue {
    fn from(v: u64) -> Self {
        // Seeds are engine-side u64; the wire carries them as i64
        // bit-for-bit.
        ArgValue::Int(v as i64)
    }
}

impl From<f64> for ArgValue {
    fn from(v: f64) -> Self {
        ArgValue::Float(v)
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<&EngineValue> for ArgValue {
    fn from(v: &EngineValue) -> Self {
        ArgValue::Handle(v.clone())
    }
}

/// Ordered named arguments for one op invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NodeInputs {
    args: Vec<(String, ArgValue)>,
}

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named argument (builder style).
    pub fn with(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.args.push((name.to_string(), value.into()));
        self
    }

    pub fn args(&self) -> &[(String, ArgValue)] {
        &self.args
    }
}

/// A tensor read back from the engine for final PNG encoding.
///
/// Values are floats in `0.0..=1.0`, laid out per `shape` (typically
/// `[1, H, W, C]` or `[C, H, W]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}
