//! End-to-end job-loop tests: a real worker loop against the stub
//! queue and the scripted engine.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{spawn_stub, wait_until, Scripted, StubJob, StubState};
use tokio_util::sync::CancellationToken;
use txr_core::idle::IdlePolicy;
use txr_core::text::format_caption;
use txr_engine::assets::AssetLibrary;
use txr_engine::testing::ScriptedEngine;
use txr_engine::{ArgValue, Device, Engine};
use txr_queue::QueueClient;
use txr_workflows::{ops, Dispatcher, UnknownWorkflowPolicy};
use txr_worker::runner::{JobLoop, JobLoopOptions, WorkerExit};

const WAIT: Duration = Duration::from_secs(15);

struct Harness {
    engine: Arc<ScriptedEngine>,
    stub: Arc<StubState>,
    cancel: CancellationToken,
    handle: std::sync::Mutex<Option<std::thread::JoinHandle<WorkerExit>>>,
}

impl Harness {
    /// Spin up stub + scripted engine + a CPU job loop.
    fn start(script: Vec<Scripted>, engine: ScriptedEngine, policy: UnknownWorkflowPolicy) -> Self {
        let (url, stub) = spawn_stub(script);
        let engine = Arc::new(engine);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&engine) as Arc<dyn Engine>,
            Arc::new(AssetLibrary::new(std::env::temp_dir())),
        ));
        let cancel = CancellationToken::new();

        let job_loop = JobLoop::new(
            Device::Cpu,
            dispatcher,
            QueueClient::new(&url).unwrap(),
            JobLoopOptions {
                password: "Password".to_string(),
                idle: IdlePolicy::default(),
                unknown_workflows: policy,
                error_backoff: Duration::from_millis(100),
            },
            cancel.clone(),
        );
        let handle = std::thread::spawn(move || job_loop.run());

        Self {
            engine,
            stub,
            cancel,
            handle: std::sync::Mutex::new(Some(handle)),
        }
    }

    fn stop(&self) -> WorkerExit {
        self.cancel.cancel();
        self.handle
            .lock()
            .unwrap()
            .take()
            .expect("already stopped")
            .join()
            .expect("worker thread")
    }
}

#[test]
fn single_job_end_to_end() {
    let harness = Harness::start(
        vec![Scripted::Job(StubJob::named("job_0001", "FLUX_Kontext"))],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Fallback,
    );

    assert!(wait_until(WAIT, || harness.stub.submission_count() == 1));
    let exit = harness.stop();
    assert_eq!(exit, WorkerExit::Shutdown);

    // Exactly one token, one activation, one generation, one upload.
    assert_eq!(harness.stub.token_count(), 1);
    let submissions = harness.stub.submissions();
    assert_eq!(submissions[0].image_id, "job_0001");
    assert_eq!(submissions[0].file_name, "result.png");
    assert!(submissions[0].bytes > 0);

    assert_eq!(harness.engine.invocation_count(ops::CHECKPOINT_LOADER), 1);
    assert_eq!(harness.engine.invocation_count(ops::KSAMPLER), 1);
    assert_eq!(harness.engine.invocation_count(ops::VLM_UNDERSTAND), 1);

    // The job's metadata reached the caption op.
    let caption = harness
        .engine
        .invocations()
        .into_iter()
        .find(|i| i.op == ops::TEXT_ON_IMAGE)
        .expect("caption op ran");
    assert_eq!(
        caption.inputs.args()[0],
        (
            "text".to_string(),
            ArgValue::Str(format_caption("Max M Teddy"))
        )
    );
}

#[test]
fn a_401_triggers_one_refresh_and_a_retried_poll() {
    let harness = Harness::start(
        vec![
            Scripted::Unauthorized,
            Scripted::Job(StubJob::named("job_0002", "FLUX_Kontext")),
        ],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Fallback,
    );

    assert!(wait_until(WAIT, || harness.stub.submission_count() == 1));
    harness.stop();

    // Initial token + exactly one refresh.
    assert_eq!(harness.stub.token_count(), 2);
    // The retried poll carried the fresh token.
    assert!(harness
        .stub
        .bearers()
        .contains(&"Bearer tok-2".to_string()));
    assert_eq!(harness.stub.submissions()[0].image_id, "job_0002");
}

#[test]
fn switching_a_b_a_reloads_and_still_generates() {
    let harness = Harness::start(
        vec![
            Scripted::Job(StubJob::named("job_a1", "FLUX_Kontext")),
            Scripted::Job(StubJob::named("job_b1", "ChromaV44")),
            Scripted::Job(StubJob::named("job_a2", "FLUX_Kontext")),
        ],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Fallback,
    );

    assert!(wait_until(WAIT, || harness.stub.submission_count() == 3));
    harness.stop();

    let ids: Vec<String> = harness
        .stub
        .submissions()
        .iter()
        .map(|s| s.image_id.clone())
        .collect();
    assert_eq!(ids, ["job_a1", "job_b1", "job_a2"]);

    // FLUX activated twice (A -> B -> A), Chroma once.
    assert_eq!(harness.engine.invocation_count(ops::CHECKPOINT_LOADER), 2);
    assert_eq!(harness.engine.invocation_count(ops::UNET_LOADER), 1);
    // Each switch released the previous workflow's models.
    let model_releases = harness
        .engine
        .free_calls()
        .iter()
        .filter(|f| f.models)
        .count();
    assert_eq!(model_releases, 2);
    // All three jobs sampled.
    assert_eq!(harness.engine.invocation_count(ops::KSAMPLER), 3);
}

#[test]
fn consecutive_same_workflow_jobs_load_once() {
    let harness = Harness::start(
        vec![
            Scripted::Job(StubJob::named("job_1", "FLUX_Kontext")),
            Scripted::Job(StubJob::named("job_2", "FLUX_Kontext")),
            Scripted::Job(StubJob::named("job_3", "FLUX_Kontext")),
        ],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Fallback,
    );

    assert!(wait_until(WAIT, || harness.stub.submission_count() == 3));
    harness.stop();

    // The load phase amortizes across same-workflow jobs.
    assert_eq!(harness.engine.invocation_count(ops::CHECKPOINT_LOADER), 1);
    assert_eq!(harness.engine.invocation_count(ops::KSAMPLER), 3);
    assert!(harness.engine.free_calls().iter().all(|f| !f.models));
}

#[test]
fn invalid_job_is_skipped_without_reporting() {
    let mut job = StubJob::named("", "FLUX_Kontext");
    job.image = b"";
    let harness = Harness::start(
        vec![Scripted::Job(job)],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Fallback,
    );

    // The invalid job is consumed, then the loop keeps idling.
    assert!(wait_until(WAIT, || harness.stub.poll_count() >= 2));
    harness.stop();

    assert_eq!(harness.stub.submission_count(), 0);
    assert!(harness.engine.ops_invoked().is_empty());
}

#[test]
fn unknown_workflow_falls_back_to_the_default() {
    let harness = Harness::start(
        vec![Scripted::Job(StubJob::named("job_odd", "Totally_Unknown"))],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Fallback,
    );

    assert!(wait_until(WAIT, || harness.stub.submission_count() == 1));
    harness.stop();

    assert_eq!(harness.stub.submissions()[0].image_id, "job_odd");
    // The default workflow (FLUX) generated it.
    assert_eq!(harness.engine.invocation_count(ops::CHECKPOINT_LOADER), 1);
    assert_eq!(harness.engine.invocation_count(ops::KSAMPLER), 1);
}

#[test]
fn strict_policy_rejects_unknown_workflows() {
    let harness = Harness::start(
        vec![Scripted::Job(StubJob::named("job_odd", "Totally_Unknown"))],
        ScriptedEngine::new(),
        UnknownWorkflowPolicy::Reject,
    );

    assert!(wait_until(WAIT, || harness.stub.poll_count() >= 2));
    harness.stop();

    assert_eq!(harness.stub.submission_count(), 0);
    assert!(harness.engine.ops_invoked().is_empty());
}

#[test]
fn load_failure_loses_the_job_but_not_the_worker() {
    // FLUX activation fails at its checkpoint; Chroma still works.
    let harness = Harness::start(
        vec![
            Scripted::Job(StubJob::named("job_flux", "FLUX_Kontext")),
            Scripted::Job(StubJob::named("job_chroma", "ChromaV44")),
        ],
        ScriptedEngine::new().with_failing_op(ops::CHECKPOINT_LOADER),
        UnknownWorkflowPolicy::Fallback,
    );

    assert!(wait_until(WAIT, || harness.stub.submission_count() == 1));
    harness.stop();

    // The failing job's result was never submitted; the next job on a
    // healthy workflow went through.
    assert_eq!(harness.stub.submissions()[0].image_id, "job_chroma");
    // The failure path flushed engine memory.
    assert!(harness
        .engine
        .free_calls()
        .iter()
        .any(|f| f.allocator && !f.models));
}
