//! The package-scoped sensor handle every rewritten call site refers to.
//!
//! A package either declares its own `*instana.Sensor` variable, or gets a
//! generated `instana.go` holding `__instanaSensor`. The generated file
//! carries the conventional `Code generated ... DO NOT EDIT.` header so a
//! later run can recognise and delete it.

use crate::error::{Error, Result};
use crate::imports::{import_name, specs};
use crate::syntax::ast::{
    Comment, Decl, DeclKind, Expr, File, GenDecl, GenKeyword, ImportDecl, ImportSpec, Spec,
    SpecKind, ValueSpec,
};
use crate::syntax::print_file;
use crate::tree::{CallSite, inspect_file};
use regex::Regex;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

pub const IMPORT_PATH: &str = "github.com/instana/go-sensor";
pub const PACKAGE: &str = "instana";
pub const TYPE: &str = "Sensor";
pub const CONSTRUCTOR_PREFIX: &str = "NewSensor";
/// Name of the synthesised handle variable.
pub const HANDLE: &str = "__instanaSensor";
pub const HANDLE_FILE: &str = "instana.go";
pub const GENERATED_HEADER: &str = "// Code generated by go-instrument; DO NOT EDIT.";

static GENERATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^// Code generated .* DO NOT EDIT\.$").unwrap());

/// Reports whether `file` carries a `// Code generated ... DO NOT EDIT.`
/// comment above its package clause.
pub fn is_generated(file: &File) -> bool {
    file.doc.iter().any(|comment| GENERATED.is_match(&comment.text))
}

/// Finds the package's sensor variable.
///
/// Only files importing the sensor library are looked at. A variable
/// declared with the sensor type wins over one merely initialised by a
/// `NewSensor*` call.
pub fn lookup<'a>(files: impl IntoIterator<Item = &'a File>) -> Option<String> {
    let candidates: Vec<(&File, Option<&str>)> = files
        .into_iter()
        .filter_map(|file| {
            let spec = specs(file).find(|spec| spec.path == IMPORT_PATH)?;
            match import_name(spec) {
                "_" => None,
                "." => Some((file, None)),
                name => Some((file, Some(name))),
            }
        })
        .collect();

    let typed = candidates.iter().find_map(|&(file, qualifier)| {
        package_vars(file).find_map(|spec| {
            let ty = spec.ty.as_ref()?;
            is_sensor_type(ty, qualifier)
                .then(|| spec.names.iter().find(|name| *name != "_"))
                .flatten()
        })
    });
    let found = typed.or_else(|| {
        candidates.iter().find_map(|&(file, qualifier)| {
            package_vars(file).find_map(|spec| {
                spec.names
                    .iter()
                    .zip(&spec.values)
                    .find(|(name, value)| *name != "_" && is_constructor_call(value, qualifier))
                    .map(|(name, _)| name)
            })
        })
    });
    if let Some(name) = found {
        debug!("found sensor variable {name}");
    }
    found.cloned()
}

fn package_vars(file: &File) -> impl Iterator<Item = &ValueSpec> {
    file.decls
        .iter()
        .filter_map(|decl| match &decl.kind {
            DeclKind::Gen(gen_decl) if gen_decl.keyword == GenKeyword::Var => Some(&gen_decl.specs),
            _ => None,
        })
        .flatten()
        .filter_map(|spec| match &spec.kind {
            SpecKind::Value(value) => Some(value),
            SpecKind::Type(_) => None,
        })
}

fn is_sensor_type(ty: &Expr, qualifier: Option<&str>) -> bool {
    let ty = match ty {
        Expr::Star(inner) => inner.as_ref(),
        other => other,
    };
    match qualifier {
        Some(qualifier) => ty.as_qualified() == Some((qualifier, TYPE)),
        None => ty.as_ident() == Some(TYPE),
    }
}

fn is_constructor_call(value: &Expr, qualifier: Option<&str>) -> bool {
    value
        .as_call()
        .and_then(CallSite::of)
        .is_some_and(|site| {
            site.package.as_deref() == qualifier && site.function.starts_with(CONSTRUCTOR_PREFIX)
        })
}

/// Reports whether any of `files` refers to the identifier `name`.
pub fn is_referenced<'a>(files: impl IntoIterator<Item = &'a File>, name: &str) -> bool {
    files.into_iter().any(|file| {
        let mut found = false;
        inspect_file(file, &mut |expr| {
            if expr.as_ident() == Some(name) {
                found = true;
            }
            !found
        });
        found
    })
}

/// The generated handle file for package `package`.
pub fn handle_file(package: &str) -> File {
    let import = ImportDecl {
        specs: vec![ImportSpec::new(Some(PACKAGE), IMPORT_PATH)],
        grouped: false,
        tail: Vec::new(),
    };
    let handle = ValueSpec {
        names: vec![HANDLE.to_string()],
        ty: None,
        values: vec![Expr::call(
            Expr::qualified(PACKAGE, CONSTRUCTOR_PREFIX),
            vec![Expr::BasicLit(format!("{package:?}"))],
        )],
    };
    let var = GenDecl {
        keyword: GenKeyword::Var,
        specs: vec![Spec {
            doc: Vec::new(),
            kind: SpecKind::Value(handle),
            comment: None,
            blank_before: false,
        }],
        grouped: false,
        tail: Vec::new(),
    };
    File {
        doc: vec![Comment::new(GENERATED_HEADER)],
        blank_before_package: true,
        package: package.to_string(),
        decls: vec![Decl::new(DeclKind::Import(import)), Decl::new(DeclKind::Gen(var))],
        tail: Vec::new(),
    }
}

/// Writes the handle file for `package` into `dir` and returns the name of
/// the handle variable it declares. An existing file is never overwritten.
pub fn synthesize(dir: &Path, package: &str) -> Result<&'static str> {
    let path = dir.join(HANDLE_FILE);
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => Error::HandleFileExists(path.clone()),
            _ => Error::io(&path, err),
        })?;
    file.write_all(print_file(&handle_file(package)).as_bytes())
        .map_err(|err| Error::io(&path, err))?;
    debug!("created {}", path.display());
    Ok(HANDLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    fn parse(src: &str) -> File {
        parse_file(src).unwrap()
    }

    #[test]
    fn handle_file_prints_as_generated_go() {
        let text = print_file(&handle_file("main"));
        insta::assert_snapshot!(text, @r#"
        // Code generated by go-instrument; DO NOT EDIT.

        package main

        import instana "github.com/instana/go-sensor"

        var __instanaSensor = instana.NewSensor("main")
        "#);
        assert!(is_generated(&parse(&text)));
    }

    #[test]
    fn hand_written_files_are_not_generated() {
        let file = parse("// Package main does things.\npackage main\n");
        assert!(!is_generated(&file));
        let file = parse("// Code generated by protoc-gen-go. DO NOT EDIT.\n\npackage main\n");
        assert!(is_generated(&file));
        let file = parse("// Code generated by hand, edit freely. DO NOT EDIT\n\npackage main\n");
        assert!(!is_generated(&file));
    }

    #[test]
    fn typed_variables_win_over_constructor_calls() {
        let a = parse("package p\n\nimport instana \"github.com/instana/go-sensor\"\n\n\
            var early = instana.NewSensor(\"p\")\n");
        let b = parse("package p\n\nimport sensor \"github.com/instana/go-sensor\"\n\n\
            var tracer *sensor.Sensor\n");
        assert_eq!(lookup([&a, &b]), Some("tracer".to_string()));
        assert_eq!(lookup([&a]), Some("early".to_string()));
    }

    #[test]
    fn constructor_variants_and_dot_imports_are_recognised() {
        let file = parse(
            "package p\n\nimport . \"github.com/instana/go-sensor\"\n\nvar _, s = 1, NewSensorWithTracer(t)\n",
        );
        assert_eq!(lookup([&file]), Some("s".to_string()));
    }

    #[test]
    fn files_without_the_import_are_ignored() {
        let file = parse("package p\n\nvar s *instana.Sensor\n");
        assert_eq!(lookup([&file]), None);
        let blank = parse(
            "package p\n\nimport _ \"github.com/instana/go-sensor\"\n\nvar s *instana.Sensor\n",
        );
        assert_eq!(lookup([&blank]), None);
    }

    #[test]
    fn synthesize_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(synthesize(dir.path(), "main").unwrap(), HANDLE);
        let written = std::fs::read_to_string(dir.path().join(HANDLE_FILE)).unwrap();
        assert_eq!(lookup([&parse(&written)]), Some(HANDLE.to_string()));
        assert!(matches!(synthesize(dir.path(), "main"), Err(Error::HandleFileExists(_))));
    }

    #[test]
    fn references_are_found_in_function_bodies() {
        let file = parse("package p\n\nfunc f() {\n\tuse(__instanaSensor)\n}\n");
        assert!(is_referenced([&file], HANDLE));
        assert!(!is_referenced([&file], "other"));
    }
}
