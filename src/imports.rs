//! Import reconciliation.
//!
//! Adding an import follows `astutil.AddNamedImport`: the new spec goes
//! right after the existing spec sharing the longest path prefix, every
//! import declaration except a cgo `import "C"` is merged into the first one
//! and each blank-line separated group is kept sorted. Removal only drops
//! imports whose name was referenced before a rewrite and no longer is.

use crate::syntax::ast::{Decl, DeclKind, File, ImportDecl, ImportSpec};
use crate::tree::inspect_file;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Name a package is referred to by when imported without an alias: the
/// last path element, or the one before it for a `vN` major version suffix.
pub fn local_name(path: &str) -> &str {
    let mut segments = path.rsplit('/');
    let last = segments.next().unwrap_or(path);
    let is_version =
        last.len() > 1 && last.starts_with('v') && last[1..].bytes().all(|b| b.is_ascii_digit());
    match segments.next() {
        Some(prior) if is_version => prior,
        _ => last,
    }
}

/// Name under which `spec` is referenced inside the file.
pub fn import_name(spec: &ImportSpec) -> &str {
    spec.name.as_deref().unwrap_or_else(|| local_name(&spec.path))
}

pub fn specs(file: &File) -> impl Iterator<Item = &ImportSpec> {
    file.decls.iter().flat_map(|decl| match &decl.kind {
        DeclKind::Import(imports) => imports.specs.as_slice(),
        _ => &[][..],
    })
}

/// Qualifiers used in `qualifier.Name` selectors anywhere in the file.
pub fn used_qualifiers(file: &File) -> HashSet<String> {
    let mut used = HashSet::new();
    inspect_file(file, &mut |expr| {
        if let Some((qualifier, _)) = expr.as_qualified() {
            used.insert(qualifier.to_string());
        }
        true
    });
    used
}

/// Adds `import name "path"` unless `path` is already imported. The alias
/// is left out when it matches the path's own local name.
pub fn add_named_import(file: &mut File, name: &str, path: &str) -> bool {
    if let Some(existing) = specs(file).find(|spec| spec.path == path) {
        let existing = import_name(existing);
        if existing != name {
            warn!("{path} is already imported as {existing}, instrumentation expects {name}");
        }
        return false;
    }

    let alias = (name != local_name(path)).then_some(name);
    let spec = ImportSpec::new(alias, path);

    match best_match(file, path) {
        Some((decl_index, spec_index)) => {
            if let DeclKind::Import(decl) = &mut file.decls[decl_index].kind {
                let at = spec_index.map_or(0, |i| i + 1);
                decl.specs.insert(at, spec);
                decl.grouped |= decl.specs.len() > 1;
            }
        }
        None => {
            let decl = ImportDecl {
                specs: vec![spec],
                ..ImportDecl::default()
            };
            file.decls.insert(0, Decl::new(DeclKind::Import(decl)));
        }
    }

    merge_import_decls(file);
    sort_groups(file);
    debug!("added import {name} {path}");
    true
}

/// Removes imports whose name is in `before` but is no longer referenced.
/// Blank, dot and cgo imports are never removed. Returns the removed paths.
pub fn remove_unused(file: &mut File, before: &HashSet<String>) -> Vec<String> {
    let after = used_qualifiers(file);
    let mut removed = Vec::new();

    for decl in &mut file.decls {
        let DeclKind::Import(imports) = &mut decl.kind else {
            continue;
        };
        let mut kept: Vec<ImportSpec> = Vec::with_capacity(imports.specs.len());
        let mut carry_blank = false;
        for spec in imports.specs.drain(..) {
            let name = import_name(&spec);
            let special = matches!(name, "_" | ".") || spec.path == "C";
            if !special && before.contains(name) && !after.contains(name) {
                carry_blank |= spec.blank_before;
                removed.push(spec.path);
                continue;
            }
            let mut spec = spec;
            spec.blank_before = (spec.blank_before || carry_blank) && !kept.is_empty();
            carry_blank = false;
            kept.push(spec);
        }
        imports.specs = kept;
        if imports.specs.len() == 1
            && imports.tail.is_empty()
            && imports.specs[0].doc.is_empty()
            && imports.specs[0].comment.is_none()
        {
            imports.grouped = false;
        }
    }

    file.decls
        .retain(|decl| {
            !matches!(&decl.kind, DeclKind::Import(imports) if imports.specs.is_empty())
        });

    for path in &removed {
        debug!("removed unused import {path}");
    }
    removed
}

fn is_cgo(decl: &ImportDecl) -> bool {
    decl.specs.iter().any(|spec| spec.path == "C")
}

fn is_third_party(path: &str) -> bool {
    path.split('/').next().is_some_and(|first| first.contains('.'))
}

/// Number of path separators in the common prefix of `a` and `b`.
fn match_len(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .take_while(|(x, y)| x == y)
        .filter(|(x, _)| *x == b'/')
        .count()
}

/// Declaration and spec index the new import should follow. A spec index
/// of `None` means an empty declaration.
fn best_match(file: &File, path: &str) -> Option<(usize, Option<usize>)> {
    let third_party = is_third_party(path);
    let mut best: Option<(usize, Option<usize>)> = None;
    let mut best_len: Option<usize> = None;

    for (decl_index, decl) in file.decls.iter().enumerate() {
        let DeclKind::Import(imports) = &decl.kind else {
            continue;
        };
        if is_cgo(imports) {
            continue;
        }
        if imports.specs.is_empty() && best_len.is_none() {
            best = Some((decl_index, None));
        }
        let mut seen_third_party = false;
        for (spec_index, spec) in imports.specs.iter().enumerate() {
            let n = match_len(&spec.path, path);
            let better = best_len.is_none_or(|len| n > len);
            let tie = best_len == Some(0) && n == 0 && !seen_third_party && third_party;
            if better || tie {
                best_len = Some(n);
                best = Some((decl_index, Some(spec_index)));
            }
            seen_third_party |= is_third_party(&spec.path);
        }
    }
    best
}

fn merge_import_decls(file: &mut File) {
    let Some(first) = file
        .decls
        .iter()
        .position(|decl| matches!(&decl.kind, DeclKind::Import(imports) if !is_cgo(imports)))
    else {
        return;
    };

    let mut moved = Vec::new();
    let mut index = first + 1;
    while index < file.decls.len() {
        let mergeable = matches!(
            &file.decls[index].kind,
            DeclKind::Import(imports) if !is_cgo(imports)
        );
        if !mergeable {
            index += 1;
            continue;
        }
        if let DeclKind::Import(imports) = file.decls.remove(index).kind {
            moved.extend(imports.specs);
        }
    }

    if moved.is_empty() {
        return;
    }
    if let DeclKind::Import(imports) = &mut file.decls[first].kind {
        for mut spec in moved {
            spec.blank_before = false;
            imports.specs.push(spec);
        }
        imports.grouped = true;
    }
}

fn sort_groups(file: &mut File) {
    for decl in &mut file.decls {
        let DeclKind::Import(imports) = &mut decl.kind else {
            continue;
        };
        let mut start = 0;
        while start < imports.specs.len() {
            let end = (start + 1..imports.specs.len())
                .find(|&i| imports.specs[i].blank_before)
                .unwrap_or(imports.specs.len());
            let group = &mut imports.specs[start..end];
            let blank = group[0].blank_before;
            group[0].blank_before = false;
            group.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.name.cmp(&b.name)));
            group[0].blank_before = blank;
            start = end;
        }
        imports.specs.dedup_by(|b, a| {
            a.path == b.path
                && a.name == b.name
                && b.doc.is_empty()
                && b.comment.is_none()
                && !b.blank_before
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_file, print_file};

    fn add(src: &str, name: &str, path: &str) -> (bool, String) {
        let mut file = parse_file(src).unwrap();
        let changed = add_named_import(&mut file, name, path);
        (changed, print_file(&file))
    }

    #[test]
    fn local_names_skip_major_versions() {
        assert_eq!(local_name("net/http"), "http");
        assert_eq!(local_name("github.com/labstack/echo/v4"), "echo");
        assert_eq!(local_name("fmt"), "fmt");
        assert_eq!(local_name("v2"), "v2");
        assert_eq!(local_name("example.com/vendor"), "vendor");
    }

    #[test]
    fn adds_after_longest_shared_prefix() {
        let src = "package main\n\nimport (\n\t\"fmt\"\n\n\t\"github.com/gorilla/mux\"\n\t\"github.com/instana/go-sensor/instrumentation/instagin\"\n)\n";
        let (changed, out) = add(
            src,
            "instamux",
            "github.com/instana/go-sensor/instrumentation/instamux",
        );
        assert!(changed);
        insta::assert_snapshot!(out, @r#"
        package main

        import (
        	"fmt"

        	"github.com/gorilla/mux"
        	"github.com/instana/go-sensor/instrumentation/instagin"
        	"github.com/instana/go-sensor/instrumentation/instamux"
        )
        "#);
    }

    #[test]
    fn third_party_import_joins_the_only_group_and_sorts() {
        let src = "package main\n\nimport (\n\t\"log\"\n\t\"net/http\"\n)\n";
        let (_, out) = add(src, "instana", "github.com/instana/go-sensor");
        insta::assert_snapshot!(out, @r#"
        package main

        import (
        	instana "github.com/instana/go-sensor"
        	"log"
        	"net/http"
        )
        "#);
    }

    #[test]
    fn single_import_becomes_grouped_and_scattered_decls_merge() {
        let src = "package main\n\nimport \"net/http\"\n\nimport \"log\"\n\nfunc main() {}\n";
        let (_, out) = add(src, "instana", "github.com/instana/go-sensor");
        insta::assert_snapshot!(out, @r#"
        package main

        import (
        	instana "github.com/instana/go-sensor"
        	"log"
        	"net/http"
        )

        func main() {}
        "#);
    }

    #[test]
    fn creates_a_declaration_when_there_is_none() {
        let (_, out) = add(
            "package main\n\nfunc main() {}\n",
            "instana",
            "github.com/instana/go-sensor",
        );
        assert_eq!(
            out,
            "package main\n\nimport instana \"github.com/instana/go-sensor\"\n\nfunc main() {}\n"
        );
    }

    #[test]
    fn existing_path_is_never_added_twice() {
        let src = "package main\n\nimport sensor \"github.com/instana/go-sensor\"\n";
        let (changed, out) = add(src, "instana", "github.com/instana/go-sensor");
        assert!(!changed);
        assert_eq!(out, src);
    }

    #[test]
    fn removes_imports_orphaned_by_a_rewrite() {
        let src = "package main\n\nimport (\n\t\"database/sql\"\n\t\"fmt\"\n\t_ \"github.com/lib/pq\"\n)\n\nfunc main() {\n\tsql.Open(\"postgres\", \"\")\n\tfmt.Println()\n}\n";
        let mut file = parse_file(src).unwrap();
        let before = used_qualifiers(&file);
        let after_src = src.replace("sql.Open", "instana.SQLInstrumentAndOpen");
        let mut rewritten = parse_file(&after_src).unwrap();
        assert!(remove_unused(&mut file, &before).is_empty());

        let removed = remove_unused(&mut rewritten, &before);
        assert_eq!(removed, vec!["database/sql"]);
        let out = print_file(&rewritten);
        assert!(out.contains("import (\n\t\"fmt\"\n\t_ \"github.com/lib/pq\"\n)"), "{out}");
    }

    #[test]
    fn imports_that_were_never_referenced_stay() {
        let src = "package main\n\nimport \"unused/pkg\"\n\nfunc main() {}\n";
        let mut file = parse_file(src).unwrap();
        let before = used_qualifiers(&file);
        assert!(remove_unused(&mut file, &before).is_empty());
        assert_eq!(print_file(&file), src);
    }

    #[test]
    fn last_remaining_spec_loses_its_parentheses() {
        let src = "package main\n\nimport (\n\t\"database/sql\"\n\t\"fmt\"\n)\n\nfunc main() { fmt.Println() }\n";
        let mut file = parse_file(src).unwrap();
        let before: HashSet<String> = ["sql".to_string(), "fmt".to_string()].into();
        remove_unused(&mut file, &before);
        assert_eq!(
            print_file(&file),
            "package main\n\nimport \"fmt\"\n\nfunc main() { fmt.Println() }\n"
        );
    }
}
