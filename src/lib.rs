//! go-instrument library: recipe-driven rewriting of Go sources.
//!
//! The workflow for one package directory:
//!
//! 1. **Loading**: parse the non-test files of the directory ([`package`])
//! 2. **Sensor**: find the package's sensor variable or generate one ([`sensor`])
//! 3. **Rewriting**: run the recipe of every imported library that has one
//!    and whose instrumentation is available ([`rewriter`], [`recipes`])
//! 4. **Imports**: add the instrumentation imports and drop the ones the
//!    rewrite orphaned ([`imports`]), then write the file back atomically
//!
//! # Example
//!
//! ```no_run
//! use go_instrument::commands::{DirOptions, process_dir};
//! use go_instrument::registry::Registry;
//! use go_instrument::rewriter::Engine;
//! use std::path::Path;
//!
//! let registry = Registry::with_default_recipes();
//! registry.unregister("database/sql");
//!
//! let engine = Engine::new(&registry).dry_run(true);
//! let options = DirOptions { create_handle: true, prune_handle: false };
//! let report = process_dir(&engine, Path::new("./cmd/server"), options);
//! println!("{} files would change", report.changed.len());
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod gomod;
pub mod imports;
pub mod package;
pub mod recipes;
pub mod registry;
pub mod rewriter;
pub mod scanner;
pub mod sensor;
pub mod syntax;
pub mod toolexec;
pub mod tree;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use recipes::Recipe;
pub use registry::Registry;
