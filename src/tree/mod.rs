//! Tree utilities shared by the recipes.
//!
//! [`walk_file`] is a mutable pre/post-order traversal that hands visitors a
//! [`Cursor`] describing where they are; [`inspect_expr`] and
//! [`inspect_file`] are the read-only counterparts. [`Stack`] tracks
//! enclosing blocks and function declarations, and [`CallShape`] is the
//! approximate statement equality used to keep inserted statements unique.

mod inspect;
mod shape;
mod stack;
mod visit;

use crate::syntax::ast::{Call, Expr, SpecKind, Stmt, StmtKind};

pub use inspect::{inspect_expr, inspect_file};
pub use shape::{CallShape, insert_after_once};
pub use stack::Stack;
pub use visit::{Cursor, Flow, Parent, VisitMut, walk_file};

/// The `(package-or-receiver, function)` pair of a call expression.
///
/// `pkg.Fn(...)` and `recv.Method(...)` both resolve to `Some("pkg")`; a
/// plain `Fn(...)` has no package. Calls through anything else (`f()()`,
/// `a.b.c()`) have no call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub package: Option<String>,
    pub function: String,
}

impl CallSite {
    pub fn of(call: &Call) -> Option<Self> {
        match call.fun.as_ref() {
            Expr::Ident(name) => Some(Self {
                package: None,
                function: name.clone(),
            }),
            Expr::Selector { x, sel, .. } => x.as_ident().map(|package| Self {
                package: Some(package.to_string()),
                function: sel.clone(),
            }),
            _ => None,
        }
    }

    pub fn is(&self, package: &str, function: &str) -> bool {
        self.package.as_deref() == Some(package) && self.function == function
    }
}

/// Reports whether `name` is used as an identifier anywhere inside `exprs`,
/// function literal bodies included.
pub fn mentions(exprs: &[Expr], name: &str) -> bool {
    exprs.iter().any(|expr| {
        let mut found = false;
        inspect_expr(expr, &mut |node| {
            if node.as_ident() == Some(name) {
                found = true;
            }
            !found
        });
        found
    })
}

/// A single identifier bound to the result of one call: `x := f()`,
/// `x = f()` or `var x = f()`. Blank identifiers do not count.
pub fn binding(stmt: &Stmt) -> Option<(&str, &Call)> {
    let (name, value) = match &stmt.kind {
        StmtKind::Assign { lhs, rhs, .. } if lhs.len() == 1 && rhs.len() == 1 => {
            (lhs[0].as_ident()?, &rhs[0])
        }
        StmtKind::Decl(decl) if decl.specs.len() == 1 => match &decl.specs[0].kind {
            SpecKind::Value(spec) if spec.names.len() == 1 && spec.values.len() == 1 => {
                (spec.names[0].as_str(), &spec.values[0])
            }
            _ => return None,
        },
        _ => return None,
    };
    if name == "_" {
        return None;
    }
    value.as_call().map(|call| (name, call))
}

/// `pkg.Name` or `*pkg.Name` split into its parts.
pub fn qualified_type(ty: &Expr) -> Option<(&str, &str)> {
    match ty {
        Expr::Star(inner) => qualified_type(inner),
        other => other.as_qualified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    fn body(src: &str) -> Vec<Stmt> {
        let file = parse_file(&format!("package p\n\nfunc f() {{\n{src}\n}}\n")).unwrap();
        match file.decls.into_iter().next().map(|d| d.kind) {
            Some(crate::syntax::ast::DeclKind::Func(func)) => func.body.unwrap().stmts,
            _ => panic!("expected a function"),
        }
    }

    #[test]
    fn call_site_of_qualified_and_plain_calls() {
        let stmts = body("mux.NewRouter()\nrun()\nf()()");
        let sites: Vec<_> = stmts
            .iter()
            .map(|s| match &s.kind {
                StmtKind::Expr(Expr::Call(call)) => CallSite::of(call),
                _ => None,
            })
            .collect();
        assert!(sites[0].as_ref().unwrap().is("mux", "NewRouter"));
        assert_eq!(sites[1].as_ref().unwrap().package, None);
        assert_eq!(sites[2], None);
    }

    #[test]
    fn binding_accepts_single_identifier_forms() {
        let stmts = body("r := mux.NewRouter()\nr = mux.NewRouter()\nvar r = mux.NewRouter()\n\
            _ = mux.NewRouter()\na, b := f()");
        let names: Vec<_> = stmts.iter().map(|s| binding(s).map(|(name, _)| name)).collect();
        assert_eq!(names, vec![Some("r"), Some("r"), Some("r"), None, None]);
    }

    #[test]
    fn mentions_looks_inside_function_literals() {
        let stmts = body("run(func() { use(__instanaSensor) })\nrun(x.__instanaSensor)");
        let args = |i: usize| match &stmts[i].kind {
            StmtKind::Expr(Expr::Call(call)) => call.args.clone(),
            _ => Vec::new(),
        };
        assert!(mentions(&args(0), "__instanaSensor"));
        assert!(!mentions(&args(1), "__instanaSensor"));
    }
}
