//! Loading the Go package that lives in one directory.

use crate::error::{Error, Result};
use crate::sensor;
use crate::syntax::ast::File;
use crate::syntax::parse_file;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct Unit {
    pub path: PathBuf,
    pub file: File,
}

impl Unit {
    /// Whether this is the generated sensor handle file.
    pub fn is_handle_file(&self) -> bool {
        self.path.file_name().is_some_and(|name| name == sensor::HANDLE_FILE)
            && sensor::is_generated(&self.file)
    }
}

#[derive(Debug)]
pub struct Package {
    pub dir: PathBuf,
    pub name: String,
    /// Sorted by file name.
    pub units: Vec<Unit>,
}

impl Package {
    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.units.iter().map(|unit| &unit.file)
    }

    /// Every path imported by some unit.
    pub fn imported_paths(&self) -> BTreeSet<&str> {
        self.files()
            .flat_map(crate::imports::specs)
            .map(|spec| spec.path.as_str())
            .collect()
    }

    pub fn handle_unit(&self) -> Option<&Unit> {
        self.units.iter().find(|unit| unit.is_handle_file())
    }
}

/// Parses the non-test Go files of `dir`.
pub fn load(dir: &Path) -> Result<Package> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|err| Error::io(dir, err))? {
        let path = entry.map_err(|err| Error::io(dir, err))?.path();
        if path.is_file() && is_source_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut units = Vec::new();
    for path in paths {
        let source = std::fs::read_to_string(&path).map_err(|err| Error::io(&path, err))?;
        if is_ignored(&source) {
            debug!("{} is excluded by its build constraint", path.display());
            continue;
        }
        let file = parse_file(&source).map_err(|err| Error::parse(&path, err))?;
        units.push(Unit { path, file });
    }

    let names: BTreeSet<&str> = units.iter().map(|unit| unit.file.package.as_str()).collect();
    let name = match names.len() {
        0 => return Err(Error::NoSourceFiles(dir.to_path_buf())),
        1 => units[0].file.package.clone(),
        _ => {
            return Err(Error::AmbiguousPackage {
                directory: dir.to_path_buf(),
                packages: names.into_iter().map(str::to_string).collect(),
            });
        }
    };
    Ok(Package {
        dir: dir.to_path_buf(),
        name,
        units,
    })
}

/// `*.go`, but not `*_test.go`.
pub fn is_source_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".go") && !name.ends_with("_test.go"))
}

/// A `//go:build ignore` or `// +build ignore` line above the package clause.
fn is_ignored(source: &str) -> bool {
    source
        .lines()
        .map(str::trim)
        .take_while(|line| !line.starts_with("package "))
        .any(|line| line == "//go:build ignore" || line == "// +build ignore")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn loads_sorted_units_without_tests() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.go", "package app\n");
        write(dir.path(), "a.go", "package app\n\nimport \"net/http\"\n");
        write(dir.path(), "a_test.go", "package app_test\n");
        write(dir.path(), "README.md", "# app\n");

        let package = load(dir.path()).unwrap();
        assert_eq!(package.name, "app");
        let names: Vec<_> = package
            .units
            .iter()
            .map(|unit| unit.path.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.go", "b.go"]);
        assert_eq!(package.imported_paths().into_iter().collect::<Vec<_>>(), vec!["net/http"]);
    }

    #[test]
    fn ignored_files_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.go", "package main\n");
        write(dir.path(), "gen.go", "//go:build ignore\n\npackage tools\n");
        assert_eq!(load(dir.path()).unwrap().units.len(), 1);
    }

    #[test]
    fn two_packages_are_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.go", "package zeta\n");
        write(dir.path(), "b.go", "package alpha\n");
        match load(dir.path()) {
            Err(Error::AmbiguousPackage { packages, .. }) => {
                assert_eq!(packages, vec!["alpha", "zeta"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_directories_and_parse_errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path()), Err(Error::NoSourceFiles(_))));

        write(dir.path(), "broken.go", "package main\n\nfunc {\n");
        match load(dir.path()) {
            Err(Error::Parse { path, .. }) => assert!(path.ends_with("broken.go")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn generated_handle_file_is_recognised() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.go", "package main\n");
        sensor::synthesize(dir.path(), "main").unwrap();
        let package = load(dir.path()).unwrap();
        assert!(package.handle_unit().is_some());
    }
}
