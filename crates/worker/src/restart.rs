//! Successor spawning for the idle-restart path.
//!
//! Restarting exists to reclaim GPU allocator fragmentation that the
//! soft cache flush cannot. The job loop signals the wish through
//! [`crate::runner::WorkerExit::Restart`]; the supervisor in `main`
//! calls [`spawn_successor`] and exits. The successor inherits the
//! exact argument list, so `-t`, `--gpus`, and friends survive.

use std::process::Command;

/// Spawn a new worker process with identical arguments.
pub fn spawn_successor() -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    tracing::info!(exe = %exe.display(), ?args, "Spawning successor process");
    Command::new(exe).args(&args).spawn()?;
    Ok(())
}
