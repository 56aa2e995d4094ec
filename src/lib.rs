pub mod batch;
pub mod cli;
pub mod config;
pub mod discover;
pub mod error;
pub mod model;
pub mod processor;
pub mod project;
pub mod writer;

use std::io::Write;
use std::path::Path;

use anyhow::Context;

use batch::{BatchRunner, ConsoleSink, TaskEntry};
use cli::{Cli, Command};
use config::Config;
use error::ScriptError;
use model::ScriptUnit;
use processor::ScriptRunner;
use project::{FsProjectResolver, ProjectResolver};

/// Executes one CLI invocation. Returns `false` when any script failed.
pub fn run(args: Cli) -> anyhow::Result<bool> {
    // 1. ── Configure ──────────────────────────────────────────────────
    let mut config = Config::load(args.config.as_deref()).with_context(|| "Loading settings")?;
    if let Some(ext) = args.output_extension {
        config.output_extension = ext;
    }
    if let Some(ms) = args.timeout_ms {
        config.timeout_ms = (ms > 0).then_some(ms);
    }

    // 2. ── Collect scripts ────────────────────────────────────────────
    let scripts = match args.command {
        Command::Run { scripts } => {
            discover::ensure_scripts(&scripts, &config)?;
            scripts
        }
        Command::Project { dir } => discover::scripts_under(&dir, &config)
            .with_context(|| format!("Searching {} for scripts", dir.display()))?,
        Command::Render { script } => return render(&script, &config),
    };

    // 3. ── Run ────────────────────────────────────────────────────────
    let resolver = FsProjectResolver::new(&config);
    let mut sink = ConsoleSink;
    let summary = BatchRunner::new(&resolver, &mut sink, &config).run_all(&scripts);

    Ok(summary.all_succeeded())
}

/// Runs a single script and prints its output to stdout. Diagnostics go to
/// stderr so the output stays clean.
fn render(script: &Path, config: &Config) -> anyhow::Result<bool> {
    discover::ensure_scripts(std::slice::from_ref(&script.to_path_buf()), config)?;
    let unit = ScriptUnit::read(script, &config.output_extension)?;

    let resolver = FsProjectResolver::new(config);
    let manifest = resolver
        .find_owning_project(&unit.path)
        .ok_or_else(|| ScriptError::ProjectNotFound {
            script: unit.path.clone(),
        })?;
    let project = resolver.load_project(&manifest);

    let mut outcome = ScriptRunner::new(config).render(&unit.path, project, &unit.source)?;
    for diag in &outcome.diagnostics {
        eprintln!("{}", TaskEntry::from_diagnostic(&unit.path, diag));
    }
    if let Some(exception) = &outcome.exception {
        eprintln!("{}", TaskEntry::from_exception(&unit.path, exception));
        return Ok(false);
    }
    if !outcome.succeeded() {
        return Ok(false);
    }

    if let Some(context) = outcome.context.as_mut() {
        let bytes = context.output_bytes().with_context(|| "Reading rendered output")?;
        std::io::stdout()
            .write_all(bytes)
            .with_context(|| "Writing to stdout")?;
    }
    Ok(true)
}
