use crate::types::Device;

/// Errors from the engine boundary layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The named operation is not in the engine's registry.
    #[error("Unknown engine operation: {0}")]
    UnknownOp(String),

    /// An op output was read past its end.
    #[error("Op output has {len} values, index {index} requested")]
    IndexOutOfRange { index: usize, len: usize },

    /// The requested device does not exist on this host.
    #[error("Device {0} is not available")]
    DeviceUnavailable(Device),

    /// The HTTP request to the engine sidecar failed outright.
    #[error("Engine request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine sidecar answered with a non-2xx status.
    #[error("Engine error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A tensor readback had an unusable shape or payload.
    #[error("Bad tensor: {0}")]
    Tensor(String),

    /// A reference image the workflow needs does not exist.
    #[error("Reference image not found: {0}")]
    MissingAsset(std::path::PathBuf),

    /// Local file staging failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encoding of the final tensor failed.
    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
