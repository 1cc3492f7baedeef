//! Generation workflows and their dispatcher.
//!
//! Every pipeline variant implements the two-phase [`Workflow`]
//! contract: an expensive one-time `load_once` that parks every
//! job-independent handle (checkpoints, LoRA weights, control-nets,
//! static prompt encodes) in a typed configuration struct, and a cheap
//! per-job `generate` that runs the variant's fixed node order against
//! that configuration. The [`dispatch::Dispatcher`] owns the name
//! registry and constructs instances bound to a device.

pub mod chroma_depth;
pub mod dispatch;
pub mod error;
pub mod flux_kontext;
pub mod ip_adapter_sdxl;
pub mod ops;
pub mod prompts;
pub mod workflow;

pub use chroma_depth::ChromaDepth;
pub use dispatch::{Dispatcher, UnknownWorkflowPolicy, DEFAULT_WORKFLOW};
pub use error::{DispatchError, WorkflowError};
pub use flux_kontext::FluxKontext;
pub use ip_adapter_sdxl::IpAdapterSdxl;
pub use workflow::{GenerateRequest, Workflow, WorkflowContext};
