//! Read-only pre-order traversal over every expression of a tree, types and
//! function literal bodies included. The callback returns `false` to stop
//! descending into the children of the expression it was given.

use crate::syntax::ast::{DeclKind, Expr, Field, File, FuncType, GenDecl, SpecKind, Stmt, StmtKind};

pub fn inspect_file(file: &File, f: &mut dyn FnMut(&Expr) -> bool) {
    for decl in &file.decls {
        match &decl.kind {
            DeclKind::Gen(gen_decl) => walk_gen_decl(gen_decl, f),
            DeclKind::Func(func) => {
                if let Some(recv) = &func.recv {
                    fields(recv, f);
                }
                fields(&func.type_params, f);
                func_type(&func.sig, f);
                if let Some(body) = &func.body {
                    stmts(&body.stmts, f);
                }
            }
            DeclKind::Import(_) | DeclKind::Comments(_) => {}
        }
    }
}

pub fn inspect_expr(expr: &Expr, f: &mut dyn FnMut(&Expr) -> bool) {
    if !f(expr) {
        return;
    }
    match expr {
        Expr::Ident(_) | Expr::BasicLit(_) => {}
        Expr::CompositeLit(lit) => {
            opt(lit.ty.as_deref(), f);
            for elt in &lit.elts {
                inspect_expr(&elt.value, f);
            }
        }
        Expr::FuncLit(lit) => {
            func_type(&lit.sig, f);
            stmts(&lit.body.stmts, f);
        }
        Expr::Paren(x)
        | Expr::Star(x)
        | Expr::Unary { x, .. }
        | Expr::Selector { x, .. }
        | Expr::Chan { elem: x, .. } => inspect_expr(x, f),
        Expr::Index { x, indices } => {
            inspect_expr(x, f);
            indices.iter().for_each(|e| inspect_expr(e, f));
        }
        Expr::Slice { x, low, high, max, .. } => {
            inspect_expr(x, f);
            opt(low.as_deref(), f);
            opt(high.as_deref(), f);
            opt(max.as_deref(), f);
        }
        Expr::TypeAssert { x, ty } => {
            inspect_expr(x, f);
            opt(ty.as_deref(), f);
        }
        Expr::Call(call) => {
            inspect_expr(&call.fun, f);
            call.args.iter().for_each(|e| inspect_expr(e, f));
        }
        Expr::Binary { x, y, .. }
        | Expr::KeyValue { key: x, value: y }
        | Expr::Map { key: x, value: y } => {
            inspect_expr(x, f);
            inspect_expr(y, f);
        }
        Expr::Array { len, elem } => {
            opt(len.as_deref(), f);
            inspect_expr(elem, f);
        }
        Expr::Func(sig) => func_type(sig, f),
        Expr::Struct(s) => fields(&s.fields, f),
        Expr::Interface(i) => fields(&i.methods, f),
        Expr::Ellipsis(elem) => opt(elem.as_deref(), f),
    }
}

fn opt(expr: Option<&Expr>, f: &mut dyn FnMut(&Expr) -> bool) {
    if let Some(expr) = expr {
        inspect_expr(expr, f);
    }
}

fn walk_gen_decl(decl: &GenDecl, f: &mut dyn FnMut(&Expr) -> bool) {
    for spec in &decl.specs {
        match &spec.kind {
            SpecKind::Value(value) => {
                opt(value.ty.as_ref(), f);
                value.values.iter().for_each(|e| inspect_expr(e, f));
            }
            SpecKind::Type(ty) => {
                fields(&ty.type_params, f);
                inspect_expr(&ty.ty, f);
            }
        }
    }
}

fn fields(fields: &[Field], f: &mut dyn FnMut(&Expr) -> bool) {
    for field in fields {
        inspect_expr(&field.ty, f);
    }
}

fn func_type(sig: &FuncType, f: &mut dyn FnMut(&Expr) -> bool) {
    fields(&sig.params, f);
    fields(&sig.results, f);
}

fn stmts(list: &[Stmt], f: &mut dyn FnMut(&Expr) -> bool) {
    for s in list {
        stmt(s, f);
    }
}

fn opt_stmt(s: Option<&Stmt>, f: &mut dyn FnMut(&Expr) -> bool) {
    if let Some(s) = s {
        stmt(s, f);
    }
}

fn stmt(s: &Stmt, f: &mut dyn FnMut(&Expr) -> bool) {
    match &s.kind {
        StmtKind::Comment(_) | StmtKind::Branch { .. } | StmtKind::Empty => {}
        StmtKind::Decl(decl) => walk_gen_decl(decl, f),
        StmtKind::Labeled { stmt: inner, .. } => stmt(inner, f),
        StmtKind::Expr(x) | StmtKind::Go(x) | StmtKind::Defer(x) | StmtKind::IncDec { x, .. } => {
            inspect_expr(x, f)
        }
        StmtKind::Send { chan, value } => {
            inspect_expr(chan, f);
            inspect_expr(value, f);
        }
        StmtKind::Assign { lhs, rhs, .. } => lhs.iter().chain(rhs).for_each(|e| inspect_expr(e, f)),
        StmtKind::Return(results) => results.iter().for_each(|e| inspect_expr(e, f)),
        StmtKind::Block(block) => stmts(&block.stmts, f),
        StmtKind::If(s) => {
            opt_stmt(s.init.as_ref(), f);
            inspect_expr(&s.cond, f);
            stmts(&s.then.stmts, f);
            opt_stmt(s.els.as_ref(), f);
        }
        StmtKind::Switch(s) => {
            opt_stmt(s.init.as_ref(), f);
            opt(s.tag.as_ref(), f);
            for clause in &s.clauses {
                clause.list.iter().for_each(|e| inspect_expr(e, f));
                stmts(&clause.body, f);
            }
        }
        StmtKind::TypeSwitch(s) => {
            opt_stmt(s.init.as_ref(), f);
            stmt(&s.guard, f);
            for clause in &s.clauses {
                clause.list.iter().for_each(|e| inspect_expr(e, f));
                stmts(&clause.body, f);
            }
        }
        StmtKind::Select(clauses) => {
            for clause in clauses {
                opt_stmt(clause.comm.as_ref(), f);
                stmts(&clause.body, f);
            }
        }
        StmtKind::For(s) => {
            opt_stmt(s.init.as_ref(), f);
            opt(s.cond.as_ref(), f);
            opt_stmt(s.post.as_ref(), f);
            stmts(&s.body.stmts, f);
        }
        StmtKind::Range(s) => {
            opt(s.key.as_ref(), f);
            opt(s.value.as_ref(), f);
            inspect_expr(&s.x, f);
            stmts(&s.body.stmts, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    #[test]
    fn reaches_types_bodies_and_literals() {
        let file = parse_file(
            "package p\n\ntype T struct{ c http.Client }\n\nfunc f(m *sql.DB) {\n\tgo func() { log.Println(x) }()\n}\n",
        )
        .unwrap();
        let mut qualifiers = Vec::new();
        inspect_file(&file, &mut |expr| {
            if let Some((pkg, _)) = expr.as_qualified() {
                qualifiers.push(pkg.to_string());
            }
            true
        });
        assert_eq!(qualifiers, vec!["http", "sql", "log"]);
    }

    #[test]
    fn returning_false_prunes_children() {
        let file = parse_file("package p\n\nvar v = outer(inner(1))\n").unwrap();
        let mut calls = 0;
        inspect_file(&file, &mut |expr| {
            if expr.as_call().is_some() {
                calls += 1;
                return false;
            }
            true
        });
        assert_eq!(calls, 1);
    }
}
