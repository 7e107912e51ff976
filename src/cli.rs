//! Command-line interface definitions.
//!
//! Besides the regular subcommands the binary doubles as a
//! `go build -toolexec` wrapper: any first argument that is not a known
//! subcommand is taken as the tool to run.

use clap::{Parser, Subcommand};

/// Insert Instana tracing instrumentation into Go source code.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Import path of a library to leave uninstrumented. Repeatable.
    #[arg(short, long = "exclude", value_name = "IMPORT_PATH", global = true)]
    pub exclude: Vec<String>,

    /// Print debug diagnostics to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Instrument packages that already declare a sensor.
    Add(BatchArgs),

    /// Instrument packages, creating the sensor handle file where needed.
    Init(BatchArgs),

    /// Instrument the whole module in the current directory.
    Instrument {
        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// List the import paths of the libraries that can be instrumented.
    List {
        /// Emit JSON instead of one path per line.
        #[arg(long)]
        json: bool,
    },

    /// Run as `go build -toolexec`: instrument compiled packages, then run
    /// the tool.
    #[command(external_subcommand)]
    Toolexec(Vec<String>),
}

#[derive(Debug, clap::Args)]
pub struct BatchArgs {
    /// Directory patterns, e.g. `./...` or `./cmd/...`. Defaults to `./...`.
    pub patterns: Vec<String>,

    /// Report what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Glob for directories to skip, relative to the working directory
    /// (e.g. "internal/*", "tools"). Repeatable.
    #[arg(long, value_name = "GLOB", value_parser = parse_glob)]
    pub exclude_dir: Vec<glob::Pattern>,

    /// Emit JSON instead of human-readable output.
    #[arg(long)]
    pub json: bool,
}

fn parse_glob(s: &str) -> Result<glob::Pattern, String> {
    glob::Pattern::new(s).map_err(|err| format!("Invalid glob '{}': {}", s, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("go-instrument").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn batch_commands_take_patterns_and_exclusions() {
        let args = parse(&[
            "-e",
            "net/http",
            "init",
            "--dry-run",
            "--exclude-dir",
            "tools",
            "./cmd/...",
        ]);
        assert_eq!(args.exclude, vec!["net/http"]);
        match args.command {
            Commands::Init(batch) => {
                assert!(batch.dry_run);
                assert_eq!(batch.patterns, vec!["./cmd/..."]);
                assert!(batch.exclude_dir[0].matches("tools"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_first_arguments_are_tool_invocations() {
        let args = parse(&[
            "-e",
            "database/sql",
            "/go/pkg/tool/linux_amd64/compile",
            "-o",
            "x.a",
            "-p",
            "main",
        ]);
        assert_eq!(args.exclude, vec!["database/sql"]);
        match args.command {
            Commands::Toolexec(tool) => {
                assert_eq!(
                    tool,
                    vec!["/go/pkg/tool/linux_amd64/compile", "-o", "x.a", "-p", "main"]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_globs_are_rejected() {
        let result = Args::try_parse_from(["go-instrument", "add", "--exclude-dir", "[oops"]);
        assert!(result.is_err());
    }
}
