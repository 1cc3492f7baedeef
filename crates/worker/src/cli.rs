//! Command-line switches. Everything else comes from the environment
//! (see [`crate::config`]).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "txr-worker", about = "GPU worker for the plush X-ray job queue")]
pub struct Cli {
    /// Poll the local test queue instead of the configured server.
    #[arg(short = 't', long)]
    pub test: bool,

    /// GPUs to run on, e.g. `--gpus 0,1,3`. Default: all detected.
    #[arg(long, value_delimiter = ',')]
    pub gpus: Option<Vec<usize>>,

    /// Run a single CPU worker even when GPUs are available.
    #[arg(long)]
    pub cpu: bool,

    /// Skip jobs naming unknown workflows instead of generating with
    /// the default one.
    #[arg(long)]
    pub strict_workflows: bool,
}
