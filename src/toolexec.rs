//! `go build -toolexec` support.
//!
//! The go tool runs `go-instrument /path/to/tool args...` for every tool
//! invocation. Compile steps get their package directories instrumented
//! first; every invocation is then forwarded unchanged and its exit status
//! becomes ours. Instrumentation failures are logged and never fail the
//! build.

use crate::commands::{DirOptions, process_dir};
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::rewriter::{DumpConfig, Engine};
use anyhow::Context;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, info, warn};

/// The flags of a compile invocation we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileArgs {
    pub output: String,
    pub package: String,
    pub files: Vec<PathBuf>,
}

/// Whether `tool` is the Go compiler.
pub fn is_compile(tool: &Path) -> bool {
    tool.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == "compile" || name == "compile.exe")
}

/// Extracts `-o`, `-p` and the trailing `.go` files from compiler
/// arguments. `None` when either flag is absent.
pub fn parse_compile_args(args: &[String]) -> Result<Option<CompileArgs>> {
    let mut output = None;
    let mut package = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let slot = match flag_name(arg) {
            Some("o") => &mut output,
            Some("p") => &mut package,
            _ => continue,
        };
        let value = match arg.split_once('=') {
            Some((_, value)) => value.to_string(),
            None => iter
                .next()
                .filter(|value| !value.starts_with('-'))
                .cloned()
                .ok_or_else(|| Error::MissingFlagValue(arg.clone()))?,
        };
        *slot = Some(value);
    }

    let (Some(output), Some(package)) = (output, package) else {
        return Ok(None);
    };
    let start = args.iter().rposition(|arg| !arg.ends_with(".go")).map_or(0, |i| i + 1);
    let files = args[start..].iter().map(PathBuf::from).collect();
    Ok(Some(CompileArgs { output, package, files }))
}

/// `-o`, `--o` and `-o=value` all name flag `o`.
fn flag_name(arg: &str) -> Option<&str> {
    let name = arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))?;
    Some(name.split_once('=').map_or(name, |(name, _)| name))
}

/// Directories of `files` that lie under `cwd` and outside any `vendor`
/// tree, deduplicated and sorted.
pub fn package_dirs(files: &[PathBuf], cwd: &Path) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = files
        .iter()
        .map(|file| cwd.join(file).components().collect::<PathBuf>())
        .filter_map(|file| file.parent().map(Path::to_path_buf))
        .filter(|dir| {
            dir.strip_prefix(cwd)
                .is_ok_and(|relative| !relative.components().any(|c| c.as_os_str() == "vendor"))
        })
        .collect();
    dirs.into_iter().collect()
}

/// Handles one `-toolexec` invocation: `args[0]` is the tool, the rest its
/// arguments. Returns the exit code to exit with.
pub fn run(registry: &Registry, args: &[String]) -> anyhow::Result<i32> {
    let Some((tool, tool_args)) = args.split_first() else {
        anyhow::bail!("no tool to run");
    };
    if is_compile(Path::new(tool)) {
        instrument(registry, tool_args);
    }
    forward(tool, tool_args)
}

fn instrument(registry: &Registry, args: &[String]) {
    let compile = match parse_compile_args(args) {
        Ok(Some(compile)) => compile,
        Ok(None) => {
            debug!("not a package compile, skipping instrumentation");
            return;
        }
        Err(err) => {
            warn!("{err}, skipping instrumentation");
            return;
        }
    };
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            warn!("failed to determine the current directory: {err}");
            return;
        }
    };

    let engine = Engine::new(registry).with_dump(DumpConfig::from_env());
    let options = DirOptions {
        create_handle: false,
        prune_handle: false,
    };
    for dir in package_dirs(&compile.files, &cwd) {
        let report = process_dir(&engine, &dir, options);
        if let Some(err) = &report.error {
            warn!("{}: {err}", dir.display());
        } else if !report.changed.is_empty() {
            info!("instrumented {} files of {}", report.changed.len(), compile.package);
        }
    }
}

fn forward(tool: &str, args: &[String]) -> anyhow::Result<i32> {
    let status = Command::new(tool)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {tool}"))?;
    Ok(exit_code(tool, status))
}

#[cfg(unix)]
fn exit_code(tool: &str, status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => {
            warn!("{tool} was terminated by signal {signal}");
            128 + signal
        }
        (None, None) => 1,
    }
}

#[cfg(not(unix))]
fn exit_code(_tool: &str, status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
