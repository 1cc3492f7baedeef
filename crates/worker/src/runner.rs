//! The per-device job loop: the worker's core state machine.
//!
//! Poll -> dispatch -> generate -> submit, strictly sequential. The
//! loop owns the bearer token (refreshed reactively on 401), the idle
//! tracker, and the single active workflow instance for its device.
//! Any per-job failure is caught here, logged, followed by a
//! best-effort engine flush and a short backoff -- one bad job must
//! never take the worker down.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use txr_core::idle::{IdleAction, IdlePolicy, IdleTracker};
use txr_core::job::JobRequest;
use txr_engine::Device;
use txr_queue::{Poll, QueueClient, QueueError};
use txr_workflows::{
    DispatchError, Dispatcher, GenerateRequest, UnknownWorkflowPolicy, Workflow, WorkflowError,
};

/// Why the job loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The shutdown signal fired.
    Shutdown,
    /// Idle long enough that the process should replace itself.
    Restart,
}

/// Errors caught at the top of the poll loop.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Tunables for one job loop.
#[derive(Debug, Clone)]
pub struct JobLoopOptions {
    pub password: String,
    pub idle: IdlePolicy,
    pub unknown_workflows: UnknownWorkflowPolicy,
    pub error_backoff: Duration,
}

/// One device's poll-dispatch-generate-submit loop.
pub struct JobLoop {
    device: Device,
    dispatcher: Arc<Dispatcher>,
    queue: QueueClient,
    options: JobLoopOptions,
    cancel: CancellationToken,
}

impl JobLoop {
    pub fn new(
        device: Device,
        dispatcher: Arc<Dispatcher>,
        queue: QueueClient,
        options: JobLoopOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            device,
            dispatcher,
            queue,
            options,
            cancel,
        }
    }

    /// Run until shutdown or an idle-triggered restart request.
    pub fn run(mut self) -> WorkerExit {
        tracing::info!(device = %self.device, queue = self.queue.base_url(), "Worker started");

        let mut token = match self.acquire_token() {
            Some(token) => token,
            None => return WorkerExit::Shutdown,
        };
        let mut idle = IdleTracker::new();
        let mut active: Option<Box<dyn Workflow>> = None;

        while !self.cancel.is_cancelled() {
            match self.queue.poll(&token) {
                Err(e) => {
                    tracing::warn!(device = %self.device, error = %e, "Poll failed");
                    self.sleep(self.options.error_backoff);
                }
                Ok(Poll::Unauthorized) => {
                    tracing::info!(device = %self.device, "Unauthorized, refreshing token");
                    match self.queue.fetch_token(&self.options.password) {
                        // The same poll cycle repeats with the fresh
                        // token; a 401 never counts as idle.
                        Ok(fresh) => token = fresh,
                        Err(e) => {
                            tracing::warn!(device = %self.device, error = %e, "Token refresh failed");
                            self.sleep(self.options.error_backoff);
                        }
                    }
                }
                Ok(Poll::NoJob) => match idle.record_no_job(&self.options.idle) {
                    IdleAction::Sleep(duration) => {
                        tracing::debug!(
                            device = %self.device,
                            consecutive = idle.consecutive_no_job(),
                            "No job received",
                        );
                        self.sleep(duration);
                    }
                    IdleAction::FlushAndSleep(duration) => {
                        tracing::info!(
                            device = %self.device,
                            idle_secs = idle.idle_for().as_secs(),
                            "Long idle, flushing engine caches",
                        );
                        if let Err(e) = self.dispatcher.engine().free(self.device, false, true) {
                            tracing::warn!(device = %self.device, error = %e, "Cache flush failed");
                        }
                        self.sleep(duration);
                    }
                    IdleAction::Restart => {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!(
                            device = %self.device,
                            idle_secs = idle.idle_for().as_secs(),
                            "Idle past restart threshold, restarting to reclaim GPU memory",
                        );
                        // Stop the sibling loops; the supervisor
                        // spawns the successor.
                        self.cancel.cancel();
                        return WorkerExit::Restart;
                    }
                },
                Ok(Poll::Job(job)) => {
                    idle.reset();
                    if let Err(e) = self.process_job(&mut active, &mut idle, &token, *job) {
                        tracing::error!(device = %self.device, error = %e, "Job failed");
                        if let Err(e) = self.dispatcher.engine().free(self.device, false, true) {
                            tracing::warn!(device = %self.device, error = %e, "Cleanup flush failed");
                        }
                        self.sleep(self.options.error_backoff);
                    }
                }
            }
        }

        tracing::info!(device = %self.device, "Worker stopped");
        WorkerExit::Shutdown
    }

    // ---- private helpers ----

    /// Fetch the initial bearer token, retrying with backoff until it
    /// succeeds or shutdown is requested.
    fn acquire_token(&self) -> Option<String> {
        while !self.cancel.is_cancelled() {
            match self.queue.fetch_token(&self.options.password) {
                Ok(token) => return Some(token),
                Err(e) => {
                    tracing::warn!(device = %self.device, error = %e, "Token acquisition failed");
                    self.sleep(self.options.error_backoff);
                }
            }
        }
        None
    }

    /// Validate, dispatch, generate, and submit one job.
    ///
    /// Skipped jobs (invalid fields, rejected workflow names) return
    /// `Ok` -- only real failures bubble up to the loop's handler.
    fn process_job(
        &mut self,
        active: &mut Option<Box<dyn Workflow>>,
        idle: &mut IdleTracker,
        token: &str,
        job: JobRequest,
    ) -> Result<(), WorkerError> {
        if let Err(e) = job.validate() {
            tracing::warn!(device = %self.device, error = %e, "Skipping invalid job");
            return Ok(());
        }

        let Some(name) = self
            .dispatcher
            .resolve(&job.workflow, self.options.unknown_workflows)
        else {
            // resolve() already logged the rejection.
            return Ok(());
        };
        let name = name.to_string();

        tracing::info!(
            device = %self.device,
            job = %job.id,
            workflow = %name,
            first_name = %job.patient.first_name,
            last_name = %job.patient.last_name,
            animal_name = %job.patient.animal_name,
            animal_type = %job.patient.species(),
            "Job received",
        );

        let same_workflow = matches!(active.as_deref(), Some(w) if w.name() == name);
        if !same_workflow {
            self.activate(active, &name)?;
            idle.mark_activated();
        }

        if let Some(workflow) = active.as_deref() {
            let request = GenerateRequest {
                image: &job.image,
                patient: &job.patient,
            };
            let started = Instant::now();
            let png = workflow.generate(&request)?;
            tracing::info!(
                device = %self.device,
                job = %job.id,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Image generated",
            );

            // Fire-and-forget: the receipt is logged, never retried.
            let receipt = self.queue.submit(token, &job.id, png)?;
            tracing::info!(
                device = %self.device,
                job = %job.id,
                status = receipt.status,
                body = %receipt.body,
                "Result sent",
            );
        }
        Ok(())
    }

    /// Swap the active workflow: release the old instance and its
    /// engine-side memory, construct the new one, and run its load
    /// phase.
    ///
    /// On load failure nothing stays active; the failing job is lost
    /// and the next job re-activates lazily. Peak memory is bounded to
    /// one workflow's footprint because the old instance is released
    /// before the new load begins.
    fn activate(
        &self,
        active: &mut Option<Box<dyn Workflow>>,
        name: &str,
    ) -> Result<(), WorkerError> {
        if let Some(old) = active.take() {
            tracing::info!(
                device = %self.device,
                from = old.name(),
                to = %name,
                "Switching workflow",
            );
            drop(old);
            if let Err(e) = self.dispatcher.engine().free(self.device, true, true) {
                tracing::warn!(device = %self.device, error = %e, "Release after switch failed");
            }
        }

        let mut fresh = self.dispatcher.create_one(self.device, name)?;
        fresh.load_once()?;
        tracing::info!(device = %self.device, workflow = %name, "Workflow activated");
        *active = Some(fresh);
        Ok(())
    }

    /// Sleep in small steps so shutdown stays responsive.
    fn sleep(&self, duration: Duration) {
        const STEP: Duration = Duration::from_millis(250);
        let mut remaining = duration;
        while !self.cancel.is_cancelled() && remaining > Duration::ZERO {
            let nap = remaining.min(STEP);
            std::thread::sleep(nap);
            remaining -= nap;
        }
    }
}
