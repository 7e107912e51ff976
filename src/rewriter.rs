//! The rewrite engine.
//!
//! Runs every applicable recipe over each unit of a package, reconciles the
//! imports of the units that changed and writes them back. A write goes
//! through a temporary file in the same directory that replaces the
//! original in one rename, so a failed print, sanity parse or write leaves
//! the original untouched.

use crate::error::{Error, Result};
use crate::gomod::GoMod;
use crate::imports::{add_named_import, import_name, remove_unused, specs, used_qualifiers};
use crate::package::{Package, Unit};
use crate::registry::Registry;
use crate::syntax::ast::File;
use crate::syntax::{parse_file, print_file};
use std::collections::{BTreeSet, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Environment variable naming a directory that receives a copy of every
/// instrumented unit.
pub const DUMP_ENV: &str = "GO_INSTRUMENT_DUMP";

#[derive(Debug, Clone, Default)]
pub struct DumpConfig {
    pub dir: Option<PathBuf>,
}

impl DumpConfig {
    pub fn from_env() -> Self {
        Self {
            dir: std::env::var_os(DUMP_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// What happened to one package.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Units that were rewritten (or would be, in a dry run).
    pub changed: Vec<PathBuf>,
    /// Units whose write-back failed; they are unchanged on disk.
    pub failed: Vec<(PathBuf, Error)>,
}

pub struct Engine<'a> {
    registry: &'a Registry,
    dump: DumpConfig,
    dry_run: bool,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            dump: DumpConfig::default(),
            dry_run: false,
        }
    }

    pub fn with_dump(mut self, dump: DumpConfig) -> Self {
        self.dump = dump;
        self
    }

    /// Rewrite in memory only; nothing is written back.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Instruments one unit in place and returns whether it changed.
    ///
    /// A library imported by `unit` is instrumented when a recipe is
    /// registered for it and the recipe's instrumentation import is in
    /// `available`.
    pub fn instrument_unit(
        &self,
        unit: &mut File,
        sensor: &str,
        available: &HashSet<String>,
    ) -> bool {
        let before = used_qualifiers(unit);
        let targets: Vec<(String, String)> = specs(unit)
            .filter(|spec| !matches!(import_name(spec), "_" | "."))
            .map(|spec| (spec.path.clone(), import_name(spec).to_string()))
            .collect();

        let mut additions: BTreeSet<(String, &'static str)> = BTreeSet::new();
        for (path, name) in targets {
            let Some(recipe) = self.registry.recipe_for(&path) else {
                continue;
            };
            if !available.contains(recipe.import_path()) {
                debug!("{} is not available, leaving {path} alone", recipe.import_path());
                continue;
            }
            if recipe.instrument(unit, &name, sensor) {
                debug!("instrumented {path} as {name}");
                additions.insert((recipe.package_name().to_string(), recipe.import_path()));
            }
        }
        if additions.is_empty() {
            return false;
        }

        for (name, path) in &additions {
            add_named_import(unit, name, path);
        }
        for removed in remove_unused(unit, &before) {
            debug!("removed unused import {removed}");
        }
        true
    }

    /// Instruments every unit of `package` except the generated handle file.
    pub fn instrument_package(
        &self,
        package: &mut Package,
        sensor: &str,
        available: &HashSet<String>,
    ) -> Outcome {
        let mut outcome = Outcome::default();
        let name = package.name.clone();
        for unit in package.units.iter_mut().filter(|unit| !unit.is_handle_file()) {
            if !self.instrument_unit(&mut unit.file, sensor, available) {
                continue;
            }
            self.dump(&name, unit);
            if self.dry_run {
                info!("would rewrite {}", unit.path.display());
                outcome.changed.push(unit.path.clone());
                continue;
            }
            match write_back(unit) {
                Ok(()) => {
                    info!("rewrote {}", unit.path.display());
                    outcome.changed.push(unit.path.clone());
                }
                Err(err) => {
                    warn!("{err}");
                    outcome.failed.push((unit.path.clone(), err));
                }
            }
        }
        outcome
    }

    fn dump(&self, package: &str, unit: &Unit) {
        let (Some(dir), Some(file_name)) = (&self.dump.dir, unit.path.file_name()) else {
            return;
        };
        let dir = dir.join(package);
        let result = std::fs::create_dir_all(&dir)
            .and_then(|()| std::fs::write(dir.join(file_name), print_file(&unit.file)));
        if let Err(err) = result {
            warn!("failed to dump {}: {err}", unit.path.display());
        }
    }
}

/// Prints `unit` and atomically replaces the file on disk with the result.
pub fn write_back(unit: &Unit) -> Result<()> {
    let text = print_file(&unit.file);
    parse_file(&text).map_err(|err| Error::parse(&unit.path, err))?;

    let dir = unit.path.parent().unwrap_or(Path::new("."));
    let io = |err: std::io::Error| Error::io(&unit.path, err);
    let mut tmp = NamedTempFile::new_in(dir).map_err(io)?;
    tmp.write_all(text.as_bytes()).map_err(io)?;
    let permissions = std::fs::metadata(&unit.path).map_err(io)?.permissions();
    tmp.as_file().set_permissions(permissions).map_err(io)?;
    tmp.persist(&unit.path).map_err(|err| io(err.error))?;
    Ok(())
}

/// Imported libraries of `package` that have a recipe.
pub fn applicable(registry: &Registry, package: &Package) -> BTreeSet<String> {
    package
        .imported_paths()
        .into_iter()
        .filter(|path| registry.recipe_for(path).is_some())
        .map(str::to_string)
        .collect()
}

/// Instrumentation imports of the `applicable` libraries that the package
/// can resolve: already imported somewhere in it, or provided by a module
/// its `go.mod` requires.
pub fn available(
    registry: &Registry,
    package: &Package,
    go_mod: Option<&GoMod>,
    applicable: &BTreeSet<String>,
) -> HashSet<String> {
    let imported = package.imported_paths();
    applicable
        .iter()
        .filter_map(|path| registry.import_path_for(path))
        .filter(|import| {
            imported.contains(import) || go_mod.is_some_and(|go_mod| go_mod.provides(import))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::load;
    use crate::sensor::HANDLE;
    use std::fs;

    const MUX_MAIN: &str = r#"package main

import (
	"net/http"

	"github.com/gorilla/mux"
)

func main() {
	r := mux.NewRouter()
	http.ListenAndServe(":8080", r)
}
"#;

    fn everything(registry: &Registry) -> HashSet<String> {
        registry
            .list()
            .iter()
            .filter_map(|path| registry.import_path_for(path))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn attach_scenario_adds_one_import_and_one_statement() {
        let registry = Registry::with_default_recipes();
        let engine = Engine::new(&registry);
        let mut file = parse_file(MUX_MAIN).unwrap();
        assert!(engine.instrument_unit(&mut file, HANDLE, &everything(&registry)));
        insta::assert_snapshot!(print_file(&file), @r#"
        package main

        import (
        	"net/http"

        	"github.com/gorilla/mux"
        	"github.com/instana/go-sensor/instrumentation/instamux"
        )

        func main() {
        	r := mux.NewRouter()
        	instamux.AddMiddleware(__instanaSensor, r)
        	http.ListenAndServe(":8080", r)
        }
        "#);
        assert!(!engine.instrument_unit(&mut file, HANDLE, &everything(&registry)));
    }

    #[test]
    fn replaced_imports_are_removed() {
        let registry = Registry::with_default_recipes();
        let engine = Engine::new(&registry);
        let src = "package main\n\nimport (\n\t\"database/sql\"\n\n\t_ \"github.com/lib/pq\"\n)\n\nfunc main() {\n\tdb, _ := sql.Open(\"postgres\", dsn)\n\tuse(db)\n}\n";
        let mut file = parse_file(src).unwrap();
        assert!(engine.instrument_unit(&mut file, HANDLE, &everything(&registry)));
        let out = print_file(&file);
        assert!(!out.contains("\"database/sql\""), "{out}");
        assert!(out.contains("_ \"github.com/lib/pq\""), "{out}");
        assert_eq!(out.matches("\"github.com/instana/go-sensor\"").count(), 1, "{out}");
    }

    #[test]
    fn unavailable_and_excluded_libraries_are_skipped() {
        let registry = Registry::with_default_recipes();
        let engine = Engine::new(&registry);
        let mut file = parse_file(MUX_MAIN).unwrap();
        assert!(!engine.instrument_unit(&mut file, HANDLE, &HashSet::new()));

        let available = everything(&registry);
        registry.unregister("github.com/gorilla/mux");
        assert!(!engine.instrument_unit(&mut file, HANDLE, &available));
        assert_eq!(print_file(&file), MUX_MAIN);
    }

    #[test]
    fn packages_are_written_back_atomically() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), MUX_MAIN).unwrap();
        fs::write(dir.path().join("util.go"), "package main\n\nfunc util() {}\n").unwrap();
        let registry = Registry::with_default_recipes();
        let mut package = load(dir.path()).unwrap();

        let outcome = Engine::new(&registry).instrument_package(
            &mut package,
            HANDLE,
            &everything(&registry),
        );
        assert_eq!(outcome.changed, vec![dir.path().join("main.go")]);
        assert!(outcome.failed.is_empty());
        let written = fs::read_to_string(dir.path().join("main.go")).unwrap();
        assert!(written.contains("instamux.AddMiddleware(__instanaSensor, r)"));
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 2);
    }

    #[test]
    fn failed_writes_keep_the_original_and_move_on() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.go"), MUX_MAIN).unwrap();
        fs::write(dir.path().join("b.go"), MUX_MAIN).unwrap();
        let registry = Registry::with_default_recipes();
        let mut package = load(dir.path()).unwrap();
        // no temporary file can be created next to a unit whose directory is gone
        let unreachable = dir.path().join("gone").join("a.go");
        package.units[0].path = unreachable.clone();

        let outcome = Engine::new(&registry).instrument_package(
            &mut package,
            HANDLE,
            &everything(&registry),
        );
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].0, unreachable);
        assert!(matches!(outcome.failed[0].1, Error::Io { .. }));
        assert_eq!(outcome.changed, vec![dir.path().join("b.go")]);

        assert_eq!(fs::read_to_string(dir.path().join("a.go")).unwrap(), MUX_MAIN);
        let written = fs::read_to_string(dir.path().join("b.go")).unwrap();
        assert!(written.contains("instamux.AddMiddleware(__instanaSensor, r)"));
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 2);
    }

    #[test]
    fn dry_runs_leave_files_alone_but_still_dump() {
        let dir = tempfile::tempdir().unwrap();
        let dump = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), MUX_MAIN).unwrap();
        let registry = Registry::with_default_recipes();
        let mut package = load(dir.path()).unwrap();

        let engine = Engine::new(&registry).dry_run(true).with_dump(DumpConfig {
            dir: Some(dump.path().to_path_buf()),
        });
        let outcome = engine.instrument_package(&mut package, HANDLE, &everything(&registry));
        assert_eq!(outcome.changed.len(), 1);
        assert_eq!(fs::read_to_string(dir.path().join("main.go")).unwrap(), MUX_MAIN);
        let dumped = fs::read_to_string(dump.path().join("main/main.go")).unwrap();
        assert!(dumped.contains("instamux.AddMiddleware"));
    }

    #[test]
    fn availability_follows_imports_and_go_mod() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.go"), MUX_MAIN).unwrap();
        let registry = Registry::with_default_recipes();
        let package = load(dir.path()).unwrap();

        let applicable = applicable(&registry, &package);
        assert_eq!(
            applicable.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["github.com/gorilla/mux", "net/http"]
        );
        assert!(available(&registry, &package, None, &applicable).is_empty());

        let go_mod = GoMod::parse(
            dir.path().join("go.mod"),
            "module example.com/app\n\nrequire github.com/instana/go-sensor v1.58.0\n",
        );
        let found = available(&registry, &package, Some(&go_mod), &applicable);
        assert_eq!(found, HashSet::from(["github.com/instana/go-sensor".to_string()]));
    }
}
