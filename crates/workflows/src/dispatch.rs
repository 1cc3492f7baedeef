//! Workflow registry and instance construction.
//!
//! The dispatcher is created once at process start with the shared
//! engine handle and reference library, and is read-only afterwards --
//! safe to share across per-device worker threads. Instances are
//! constructed unloaded; `load_once` runs only when a workflow is
//! actually selected for a job.

use std::collections::HashMap;
use std::sync::Arc;

use txr_engine::assets::AssetLibrary;
use txr_engine::{Device, Engine};

use crate::chroma_depth::ChromaDepth;
use crate::error::DispatchError;
use crate::flux_kontext::FluxKontext;
use crate::ip_adapter_sdxl::IpAdapterSdxl;
use crate::workflow::{Workflow, WorkflowContext};

/// Workflow used when a job names one we do not know (lenient policy).
pub const DEFAULT_WORKFLOW: &str = FluxKontext::NAME;

/// How to treat job requests naming an unregistered workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownWorkflowPolicy {
    /// Generate with [`DEFAULT_WORKFLOW`] instead. Keeps the job
    /// flowing, but may surprise the job producer.
    Fallback,
    /// Skip the job.
    Reject,
}

type Factory = fn(WorkflowContext) -> Box<dyn Workflow>;

const REGISTRY: &[(&str, Factory)] = &[
    (FluxKontext::NAME, |ctx| Box::new(FluxKontext::new(ctx))),
    (IpAdapterSdxl::NAME, |ctx| Box::new(IpAdapterSdxl::new(ctx))),
    (ChromaDepth::NAME, |ctx| Box::new(ChromaDepth::new(ctx))),
];

/// Registry of workflow types plus the shared handles every instance
/// receives at construction.
pub struct Dispatcher {
    engine: Arc<dyn Engine>,
    assets: Arc<AssetLibrary>,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn Engine>, assets: Arc<AssetLibrary>) -> Self {
        Self { engine, assets }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Registered workflow names.
    pub fn names(&self) -> Vec<&'static str> {
        REGISTRY.iter().map(|(name, _)| *name).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        REGISTRY.iter().any(|(registered, _)| *registered == name)
    }

    /// Map a requested workflow name to the one to run.
    ///
    /// Known names pass through. Unknown names either fall back to
    /// [`DEFAULT_WORKFLOW`] (logged, never silent) or are rejected
    /// with `None`, per policy.
    pub fn resolve<'a>(
        &self,
        requested: &'a str,
        policy: UnknownWorkflowPolicy,
    ) -> Option<&'a str> {
        if self.contains(requested) {
            return Some(requested);
        }
        match policy {
            UnknownWorkflowPolicy::Fallback => {
                tracing::warn!(
                    requested,
                    fallback = DEFAULT_WORKFLOW,
                    available = ?self.names(),
                    "Unknown workflow, using fallback",
                );
                Some(DEFAULT_WORKFLOW)
            }
            UnknownWorkflowPolicy::Reject => {
                tracing::warn!(
                    requested,
                    available = ?self.names(),
                    "Unknown workflow, rejecting job",
                );
                None
            }
        }
    }

    /// Instantiate every registered workflow bound to `device`,
    /// without loading any of them.
    pub fn create_all(&self, device: Device) -> HashMap<String, Box<dyn Workflow>> {
        REGISTRY
            .iter()
            .map(|(name, factory)| (name.to_string(), factory(self.context(device))))
            .collect()
    }

    /// Instantiate a single workflow bound to `device`.
    pub fn create_one(
        &self,
        device: Device,
        name: &str,
    ) -> Result<Box<dyn Workflow>, DispatchError> {
        let (_, factory) = REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .ok_or_else(|| DispatchError::UnknownWorkflow(name.to_string()))?;
        Ok(factory(self.context(device)))
    }

    // ---- private helpers ----

    /// Build the construction context, downgrading to CPU when the
    /// requested GPU does not exist. Never fails.
    fn context(&self, device: Device) -> WorkflowContext {
        let device = self.bind_device(device);
        WorkflowContext {
            engine: Arc::clone(&self.engine),
            assets: Arc::clone(&self.assets),
            device,
        }
    }

    fn bind_device(&self, device: Device) -> Device {
        if let Device::Gpu(index) = device {
            let available = self.engine.device_count();
            if index >= available {
                tracing::warn!(
                    requested = index,
                    available,
                    "GPU not available, falling back to CPU",
                );
                return Device::Cpu;
            }
        }
        device
    }
}
