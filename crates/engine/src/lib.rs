//! Boundary layer for the external node-graph execution engine.
//!
//! The engine itself -- checkpoint loading, text encoding, diffusion
//! sampling, image decoding -- is an opaque collaborator running next
//! to the worker. This crate owns everything on our side of that line:
//! the [`Engine`] trait, opaque value handles, the index-or-fallback
//! [`value_at`] accessor used at every op-output read, input-image
//! staging, tensor-to-PNG encoding, and reference-image lookup.
//!
//! [`http::HttpEngine`] is the production adapter; the `testing`
//! feature adds an in-memory scripted engine for unit tests.

pub mod assets;
pub mod engine;
pub mod error;
pub mod http;
pub mod pixels;
pub mod stage;
pub mod types;

#[cfg(feature = "testing")]
pub mod testing;

pub use engine::Engine;
pub use error::EngineError;
pub use types::{value_at, ArgValue, Device, EngineValue, ImageTensor, NodeInputs, NodeOutput};
