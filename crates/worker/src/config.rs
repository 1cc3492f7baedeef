//! Worker configuration from environment variables.
//!
//! `dotenvy` loads a `.env` file at startup, so deployments keep a
//! plain key/value settings file next to the binary. All values have
//! local-development defaults.

use std::path::PathBuf;
use std::time::Duration;

use txr_core::idle::IdlePolicy;

/// Queue endpoint selected by the `-t/--test` flag.
pub const TEST_QUEUE_URL: &str = "http://localhost:8001";

/// Runtime configuration for the worker process.
///
/// | Env var                  | Default                  |
/// |--------------------------|--------------------------|
/// | `WEB_SERVER`             | `http://localhost:8000`  |
/// | `WORKER_PASSWORD`        | `Password`               |
/// | `ENGINE_URL`             | `http://127.0.0.1:8188`  |
/// | `ASSETS_ROOT`            | (searched upwards)       |
/// | `STRICT_WORKFLOWS`       | `0`                      |
/// | `IDLE_FLUSH_AFTER_SECS`  | `900`                    |
/// | `IDLE_RESTART_AFTER_SECS`| `3600`                   |
/// | `ERROR_BACKOFF_SECS`     | `3`                      |
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the job queue server.
    pub queue_url: String,
    /// Shared password for `POST /token`.
    pub password: String,
    /// Base URL of the engine sidecar.
    pub engine_url: String,
    /// Reference-image library root; searched upwards when unset.
    pub assets_root: Option<PathBuf>,
    /// Reject jobs naming unknown workflows instead of falling back.
    pub strict_workflows: bool,
    pub idle: IdlePolicy,
    /// Pause after a failed poll cycle or job.
    pub error_backoff: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let queue_url =
            std::env::var("WEB_SERVER").unwrap_or_else(|_| "http://localhost:8000".into());
        let password = std::env::var("WORKER_PASSWORD").unwrap_or_else(|_| "Password".into());
        let engine_url =
            std::env::var("ENGINE_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());
        let assets_root = std::env::var("ASSETS_ROOT").ok().map(PathBuf::from);
        let strict_workflows = flag("STRICT_WORKFLOWS");

        let mut idle = IdlePolicy::default();
        if let Some(secs) = duration_var("IDLE_FLUSH_AFTER_SECS") {
            idle.flush_after = secs;
        }
        if let Some(secs) = duration_var("IDLE_RESTART_AFTER_SECS") {
            idle.restart_after = secs;
        }

        let error_backoff = duration_var("ERROR_BACKOFF_SECS").unwrap_or(Duration::from_secs(3));

        Self {
            queue_url,
            password,
            engine_url,
            assets_root,
            strict_workflows,
            idle,
            error_backoff,
        }
    }

    /// Point the worker at the local test queue (`-t/--test`).
    pub fn apply_test_mode(&mut self) {
        self.queue_url = TEST_QUEUE_URL.to_string();
    }
}

fn flag(name: &str) -> bool {
    matches!(
        std::env::var(name).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes")
    )
}

fn duration_var(name: &str) -> Option<Duration> {
    let raw = std::env::var(name).ok()?;
    let secs: u64 = raw
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a number of seconds, got {raw:?}"));
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_swaps_the_queue_url() {
        let mut config = WorkerConfig {
            queue_url: "http://queue.example:8000".into(),
            password: "pw".into(),
            engine_url: "http://127.0.0.1:8188".into(),
            assets_root: None,
            strict_workflows: false,
            idle: IdlePolicy::default(),
            error_backoff: Duration::from_secs(3),
        };
        config.apply_test_mode();
        assert_eq!(config.queue_url, TEST_QUEUE_URL);
    }
}
