//! HTTP adapter for the engine sidecar.
//!
//! The engine runs as a co-located process exposing its operation
//! registry over a small REST surface. [`HttpEngine::connect`] fetches
//! the op manifest once (the sidecar has already paid for plugin
//! discovery by then) and the returned handle is shared read-only for
//! the life of the worker.

use std::collections::HashSet;

use serde::Deserialize;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::types::{Device, EngineValue, ImageTensor, NodeInputs, NodeOutput};

/// Production [`Engine`] implementation over the sidecar REST API.
pub struct HttpEngine {
    client: reqwest::blocking::Client,
    base_url: String,
    /// Identifies this worker process to the sidecar.
    client_id: String,
    ops: HashSet<String>,
    device_count: usize,
}

#[derive(Debug, Deserialize)]
struct OpsResponse {
    ops: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    count: usize,
}

impl HttpEngine {
    /// Connect to the sidecar and fetch its op manifest and device
    /// inventory.
    ///
    /// * `base_url` - e.g. `http://127.0.0.1:8188`.
    pub fn connect(base_url: &str) -> Result<Self, EngineError> {
        // No request timeout: a sampling op legitimately runs for
        // minutes, and the blocking client defaults to 30 seconds.
        let client = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()?;
        let client_id = uuid::Uuid::new_v4().to_string();
        let base_url = base_url.trim_end_matches('/').to_string();

        let ops: OpsResponse =
            parse_response(client.get(format!("{base_url}/ops")).send()?)?;
        let devices: DevicesResponse =
            parse_response(client.get(format!("{base_url}/devices")).send()?)?;

        tracing::info!(
            ops = ops.ops.len(),
            devices = devices.count,
            client_id = %client_id,
            "Connected to engine at {base_url}",
        );

        Ok(Self {
            client,
            base_url,
            client_id,
            ops: ops.ops.into_iter().collect(),
            device_count: devices.count,
        })
    }
}

impl Engine for HttpEngine {
    fn has_op(&self, name: &str) -> bool {
        self.ops.contains(name)
    }

    fn invoke(
        &self,
        device: Device,
        op: &str,
        inputs: NodeInputs,
    ) -> Result<NodeOutput, EngineError> {
        if !self.has_op(op) {
            return Err(EngineError::UnknownOp(op.to_string()));
        }

        let body = serde_json::json!({
            "op": op,
            "client_id": self.client_id,
            "device": device,
            "args": inputs,
        });

        let response = self
            .client
            .post(format!("{}/op", self.base_url))
            .json(&body)
            .send()?;

        parse_response(response)
    }

    fn device_count(&self) -> usize {
        self.device_count
    }

    fn read_image(&self, value: &EngineValue) -> Result<ImageTensor, EngineError> {
        let response = self
            .client
            .get(format!("{}/tensor/{}", self.base_url, value.id))
            .send()?;
        parse_response(response)
    }

    fn free(&self, device: Device, models: bool, allocator: bool) -> Result<(), EngineError> {
        let body = serde_json::json!({
            "device": device,
            "unload_models": models,
            "free_memory": allocator,
        });
        let response = self
            .client
            .post(format!("{}/free", self.base_url))
            .json(&body)
            .send()?;
        ensure_success(response)?;
        Ok(())
    }
}

// ---- private helpers ----

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or an [`EngineError::Api`] with the status and
/// body text on failure.
fn ensure_success(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, EngineError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(EngineError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::blocking::Response,
) -> Result<T, EngineError> {
    let response = ensure_success(response)?;
    Ok(response.json::<T>()?)
}
