use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use txr_engine::assets::{self, AssetLibrary};
use txr_engine::http::HttpEngine;
use txr_engine::Engine;
use txr_queue::QueueClient;
use txr_workflows::{Dispatcher, UnknownWorkflowPolicy};

use txr_worker::cli::Cli;
use txr_worker::devices::select_devices;
use txr_worker::runner::{JobLoop, JobLoopOptions, WorkerExit};
use txr_worker::{restart, WorkerConfig};

/// Delay between worker thread launches, so model loads never race on
/// the same startup burst.
const STARTUP_STAGGER: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "txr_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = WorkerConfig::from_env();
    if cli.test {
        config.apply_test_mode();
        tracing::info!(queue = %config.queue_url, "Test mode: using local queue");
    }

    // --- Engine ---
    let engine: Arc<dyn Engine> = Arc::new(
        HttpEngine::connect(&config.engine_url)
            .with_context(|| format!("engine sidecar unreachable at {}", config.engine_url))?,
    );

    // --- Reference-image library ---
    let assets_root = config
        .assets_root
        .clone()
        .or_else(assets::locate_library)
        .unwrap_or_else(|| PathBuf::from(assets::DEFAULT_LIBRARY_DIR));
    tracing::info!(root = %assets_root.display(), "Reference library");

    // --- Dispatcher (read-only for the process lifetime) ---
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&engine),
        Arc::new(AssetLibrary::new(assets_root)),
    ));
    tracing::info!(workflows = ?dispatcher.names(), "Workflow registry ready");

    // --- Devices ---
    let devices = select_devices(cli.gpus.as_deref(), cli.cpu, engine.as_ref());
    let device_names: Vec<String> = devices.iter().map(|d| d.to_string()).collect();
    tracing::info!(devices = ?device_names, "Starting workers");

    let unknown_workflows = if cli.strict_workflows || config.strict_workflows {
        UnknownWorkflowPolicy::Reject
    } else {
        UnknownWorkflowPolicy::Fallback
    };

    // --- Shutdown signal ---
    let cancel = CancellationToken::new();
    let interrupted = Arc::new(AtomicBool::new(false));
    spawn_signal_listener(cancel.clone(), Arc::clone(&interrupted));

    // --- Worker threads, one per device ---
    let mut handles = Vec::with_capacity(devices.len());
    for device in devices {
        let job_loop = JobLoop::new(
            device,
            Arc::clone(&dispatcher),
            QueueClient::new(&config.queue_url).context("failed to build queue client")?,
            JobLoopOptions {
                password: config.password.clone(),
                idle: config.idle.clone(),
                unknown_workflows,
                error_backoff: config.error_backoff,
            },
            cancel.clone(),
        );
        let handle = std::thread::Builder::new()
            .name(format!("worker-{device}"))
            .spawn(move || job_loop.run())
            .context("failed to spawn worker thread")?;
        handles.push(handle);
        std::thread::sleep(STARTUP_STAGGER);
    }

    // --- Supervision ---
    let mut restart_requested = false;
    for handle in handles {
        match handle.join() {
            Ok(WorkerExit::Restart) => restart_requested = true,
            Ok(WorkerExit::Shutdown) => {}
            Err(_) => tracing::error!("Worker thread panicked"),
        }
    }

    // Never restart while a shutdown signal is pending.
    if restart_requested && !interrupted.load(Ordering::SeqCst) {
        restart::spawn_successor().context("failed to spawn successor")?;
        tracing::info!("Successor spawned, exiting");
    } else {
        tracing::info!("Worker shut down");
    }
    Ok(())
}

/// Wait for ctrl-c on a dedicated thread and flip the shutdown flag.
///
/// The signal cannot interrupt an in-flight generation; the job loops
/// observe the token at loop-safe points only.
fn spawn_signal_listener(cancel: CancellationToken, interrupted: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Signal listener runtime failed");
                return;
            }
        };
        if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
            tracing::info!("Shutdown signal received");
            interrupted.store(true, Ordering::SeqCst);
            cancel.cancel();
        }
    });
}
