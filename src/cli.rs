use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;

/// Runs generator scripts against the project that owns them and writes
/// each script's output next to it.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,

    /// Settings file (defaults to ./scriptgen.json when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Extension of generated files, e.g. `.g.rs`
    #[arg(long, global = true)]
    pub output_extension: Option<String>,

    /// Per-script deadline in milliseconds; 0 disables it
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the given scripts in order
    Run {
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
    },
    /// Run every script found under a directory
    Project { dir: PathBuf },
    /// Run one script and print its output instead of writing it
    Render { script: PathBuf },
}
