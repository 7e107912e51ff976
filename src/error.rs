//! Errors raised while loading, rewriting and writing back Go packages.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}:{line}:{column}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{} contains more than one package: {}", .directory.display(), .packages.join(", "))]
    AmbiguousPackage { directory: PathBuf, packages: Vec<String> },

    #[error("no Go source files in {}", .0.display())]
    NoSourceFiles(PathBuf),

    #[error("refusing to overwrite existing {}", .0.display())]
    HandleFileExists(PathBuf),

    #[error("flag {0} is missing its value")]
    MissingFlagValue(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, err: crate::syntax::ParseError) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            line: err.line,
            column: err.column,
            message: err.message,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
