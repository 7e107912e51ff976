//! go-instrument: add Instana tracing to Go code by rewriting its sources.
//!
//! Runs either as a batch command over a directory tree or as the
//! `-toolexec` wrapper of `go build`.

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use go_instrument::cli::{Args, BatchArgs, Commands};
use go_instrument::commands::{self, BatchOptions};
use go_instrument::registry::Registry;
use go_instrument::toolexec;
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let registry = Registry::with_default_recipes();
    for path in &args.exclude {
        if !registry.unregister(path) {
            tracing::warn!("{path} has no recipe, nothing to exclude");
        }
    }

    let succeeded = match args.command {
        Commands::Add(batch) => batch_command(&registry, batch, false)?,
        Commands::Init(batch) => batch_command(&registry, batch, true)?,
        Commands::Instrument { dry_run, json } => {
            commands::cmd_instrument(&registry, dry_run, json)?
        }
        Commands::List { json } => {
            commands::cmd_list(&registry, json)?;
            true
        }
        Commands::Toolexec(tool) => {
            let code = toolexec::run(&registry, &tool)?;
            return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
        }
    };
    Ok(if succeeded { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn batch_command(registry: &Registry, batch: BatchArgs, create_handle: bool) -> Result<bool> {
    let options = BatchOptions {
        patterns: batch.patterns,
        dry_run: batch.dry_run,
        exclude_dirs: batch.exclude_dir,
        create_handle,
    };
    commands::cmd_batch(registry, &options, batch.json)
}
