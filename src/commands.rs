//! The `add`, `init`, `instrument` and `list` commands.
//!
//! Every directory is processed on its own: a failure is recorded in that
//! directory's [`PackageReport`] and the batch moves on.

use crate::gomod::GoMod;
use crate::package::{self, Package, Unit};
use crate::registry::Registry;
use crate::rewriter::{self, DumpConfig, Engine};
use crate::scanner;
use crate::sensor;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const NOTHING_TO_INSTRUMENT: &str = "nothing to instrument";

/// Options shared by the batch commands.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Directory patterns; `./...` when empty.
    pub patterns: Vec<String>,
    pub dry_run: bool,
    /// Discovered directories (relative, `/`-separated) matching one of
    /// these are left alone.
    pub exclude_dirs: Vec<glob::Pattern>,
    /// Create the sensor handle file where a package needs one.
    pub create_handle: bool,
}

/// How one directory is treated.
#[derive(Debug, Clone, Copy)]
pub struct DirOptions {
    pub create_handle: bool,
    /// Delete a generated handle file that is no longer needed.
    pub prune_handle: bool,
}

/// Result of processing one directory.
#[derive(Debug, Default, Serialize)]
pub struct PackageReport {
    pub dir: PathBuf,
    pub package: Option<String>,
    /// Sensor variable the rewritten code refers to.
    pub handle: Option<String>,
    pub created_handle: bool,
    pub removed_handle: bool,
    pub changed: Vec<PathBuf>,
    /// Instrumentation libraries the package would need but cannot import.
    pub missing: Vec<String>,
    pub skipped: Option<String>,
    pub error: Option<String>,
}

/// Instruments the package in `dir`, recording every outcome in the report.
pub fn process_dir(engine: &Engine, dir: &Path, options: DirOptions) -> PackageReport {
    let mut report = PackageReport {
        dir: dir.to_path_buf(),
        ..PackageReport::default()
    };
    if let Err(err) = instrument_dir(engine, dir, options, &mut report) {
        report.error = Some(format!("{err:#}"));
    }
    report
}

fn instrument_dir(
    engine: &Engine,
    dir: &Path,
    options: DirOptions,
    report: &mut PackageReport,
) -> Result<()> {
    let mut package = package::load(dir)?;
    report.package = Some(package.name.clone());

    let registry = engine.registry();
    let go_mod = GoMod::find(dir)?;
    let applicable = rewriter::applicable(registry, &package);
    let available = rewriter::available(registry, &package, go_mod.as_ref(), &applicable);
    report.missing = applicable
        .iter()
        .filter_map(|path| registry.import_path_for(path))
        .filter(|import| !available.contains(*import))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if options.prune_handle {
        report.removed_handle = prune_stale_handle(
            &mut package,
            !available.is_empty(),
            engine.is_dry_run(),
        )?;
    }
    if available.is_empty() {
        report.skipped = Some(NOTHING_TO_INSTRUMENT.to_string());
        return Ok(());
    }

    let handle = match sensor::lookup(package.files()) {
        Some(handle) => handle,
        None if options.create_handle => {
            let handle = if engine.is_dry_run() {
                sensor::HANDLE
            } else {
                sensor::synthesize(dir, &package.name)?
            };
            report.created_handle = true;
            handle.to_string()
        }
        None => {
            report.skipped = Some("no sensor variable, run `init` to create one".to_string());
            return Ok(());
        }
    };
    debug!("{} uses sensor {handle}", dir.display());

    let outcome = engine.instrument_package(&mut package, &handle, &available);
    report.handle = Some(handle);
    report.changed = outcome.changed;
    if !outcome.failed.is_empty() {
        let failures: Vec<String> = outcome.failed.iter().map(|(_, err)| err.to_string()).collect();
        bail!("failed to rewrite {}", failures.join("; "));
    }
    Ok(())
}

/// Removes the generated handle file when nothing else in the package
/// refers to it and it is either unneeded or shadowed by another sensor.
fn prune_stale_handle(package: &mut Package, instrumentable: bool, dry_run: bool) -> Result<bool> {
    let Some(index) = package.units.iter().position(Unit::is_handle_file) else {
        return Ok(false);
    };
    let others: Vec<_> = package
        .units
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, unit)| &unit.file)
        .collect();
    if sensor::is_referenced(others.iter().copied(), sensor::HANDLE) {
        return Ok(false);
    }
    if instrumentable && sensor::lookup(others.iter().copied()).is_none() {
        return Ok(false);
    }

    let unit = package.units.remove(index);
    if !dry_run {
        std::fs::remove_file(&unit.path)
            .with_context(|| format!("Failed to remove {}", unit.path.display()))?;
    }
    info!("removed stale {}", unit.path.display());
    Ok(true)
}

/// Runs a batch over the directories below `root` selected by `options`.
pub fn run_batch(
    registry: &Registry,
    root: &Path,
    options: &BatchOptions,
) -> Result<Vec<PackageReport>> {
    let patterns = if options.patterns.is_empty() {
        vec!["./...".to_string()]
    } else {
        options.patterns.clone()
    };
    let dirs = scanner::resolve_paths(root, &patterns)?;
    let engine = Engine::new(registry)
        .dry_run(options.dry_run)
        .with_dump(DumpConfig::from_env());
    let dir_options = DirOptions {
        create_handle: options.create_handle,
        prune_handle: true,
    };

    let mut reports = Vec::new();
    for dir in dirs {
        let relative = scanner::relative_slash_path(root, &dir);
        if options.exclude_dirs.iter().any(|pattern| pattern.matches(&relative)) {
            debug!("excluded {}", dir.display());
            continue;
        }
        reports.push(process_dir(&engine, &dir, dir_options));
    }
    Ok(reports)
}

/// `add` and `init`. Returns whether every directory succeeded.
pub fn cmd_batch(registry: &Registry, options: &BatchOptions, json: bool) -> Result<bool> {
    let root = std::env::current_dir().context("Failed to determine the current directory")?;
    let reports = run_batch(registry, &root, options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_reports(&reports, options.dry_run);
    }
    Ok(reports.iter().all(|report| report.error.is_none()))
}

/// `instrument`: `init` over the whole module rooted in the current directory.
pub fn cmd_instrument(registry: &Registry, dry_run: bool, json: bool) -> Result<bool> {
    if !Path::new("go.mod").is_file() {
        bail!("no go.mod in the current directory, run `instrument` from the module root");
    }
    let options = BatchOptions {
        dry_run,
        create_handle: true,
        ..BatchOptions::default()
    };
    cmd_batch(registry, &options, json)
}

pub fn cmd_list(registry: &Registry, json: bool) -> Result<()> {
    let paths = registry.list();
    if json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
    } else {
        for path in paths {
            println!("{path}");
        }
    }
    Ok(())
}

fn print_reports(reports: &[PackageReport], dry_run: bool) {
    let mut changed = 0;
    for report in reports {
        let name = match &report.package {
            Some(package) => format!("{} ({package})", report.dir.display()),
            None => report.dir.display().to_string(),
        };
        if let Some(err) = &report.error {
            println!("{} {name}: {err}", "error:".red().bold());
            continue;
        }
        if report.removed_handle {
            println!("{} {name}: removed unused {}", "info:".blue().bold(), sensor::HANDLE_FILE);
        }
        if report.created_handle {
            println!("{} {name}: created {}", "info:".blue().bold(), sensor::HANDLE_FILE);
        }
        for file in &report.changed {
            let verb = if dry_run { "Would update:" } else { "Updated:" };
            println!("{} {}", verb.yellow().bold(), file.display());
        }
        changed += report.changed.len();
        if let Some(reason) = &report.skipped
            && (reason != NOTHING_TO_INSTRUMENT || !report.missing.is_empty())
        {
            println!("{} {name}: {reason}", "warn:".yellow().bold());
        }
        for import in &report.missing {
            println!("{} go get {import}", "hint:".cyan().bold());
        }
    }

    if changed == 0 {
        println!("{} No changes to apply", "info:".blue().bold());
    } else if dry_run {
        println!("\n{} Run without --dry-run to apply changes", "hint:".cyan().bold());
    }
}
