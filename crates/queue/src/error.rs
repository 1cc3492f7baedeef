/// Errors from the queue client.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("Queue request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The queue answered with an unexpected status code.
    #[error("Queue error ({status}): {body}")]
    Api { status: u16, body: String },
}
