//! Mutable traversal with a cursor.
//!
//! Visitors get a pre-order `enter_*` and a post-order `leave_*` hook per
//! node kind. Expressions may be replaced in place from either hook; a
//! replacement made in `enter_expr` is walked, one made in `leave_expr` is
//! not. Statement lists are only edited through `leave_block`, once every
//! statement in them has been visited, so indices handed out by the cursor
//! stay valid for the whole list.

use super::CallSite;
use crate::syntax::ast::{
    Block, CaseClause, CommClause, Decl, DeclKind, Expr, Field, File, FuncDecl, FuncType, GenDecl,
    SpecKind, Stmt,
    StmtKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Do not descend into the children of this node.
    Skip,
}

/// Kind of a node on the path from the file to the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parent {
    Decl,
    Stmt,
    Call(Option<CallSite>),
    CompositeLit,
    Expr,
}

#[derive(Debug, Default)]
pub struct Cursor {
    ancestors: Vec<Parent>,
    index: Option<usize>,
}

impl Cursor {
    /// Innermost node enclosing the one being visited.
    pub fn parent(&self) -> Option<&Parent> {
        self.ancestors.last()
    }

    /// Position of the statement handed to `enter_stmt` inside its
    /// statement list; `None` for statements nested in another statement
    /// (if-init, labeled statement, ...).
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Reports whether the visited node sits under a call to `package.function`.
    pub fn inside_call(&self, package: &str, function: &str) -> bool {
        self.ancestors
            .iter()
            .any(|parent| matches!(parent, Parent::Call(Some(site)) if site.is(package, function)))
    }
}

pub trait VisitMut {
    fn enter_func_decl(&mut self, _decl: &FuncDecl) {}

    fn leave_func_decl(&mut self, _decl: &FuncDecl) {}

    /// A statement list opens: function and literal bodies, plain blocks and
    /// the bodies of case and select clauses.
    fn enter_block(&mut self) {}

    fn leave_block(&mut self, _stmts: &mut Vec<Stmt>) {}

    fn enter_stmt(&mut self, _stmt: &Stmt, _cursor: &Cursor) {}

    fn enter_expr(&mut self, _expr: &mut Expr, _cursor: &Cursor) -> Flow {
        Flow::Continue
    }

    fn leave_expr(&mut self, _expr: &mut Expr, _cursor: &Cursor) {}
}

pub fn walk_file<V: VisitMut>(visitor: &mut V, file: &mut File) {
    let mut walker = Walker {
        visitor,
        cursor: Cursor::default(),
    };
    for decl in &mut file.decls {
        walker.decl(decl);
    }
}

struct Walker<'v, V> {
    visitor: &'v mut V,
    cursor: Cursor,
}

impl<V: VisitMut> Walker<'_, V> {
    fn within(&mut self, parent: Parent, f: impl FnOnce(&mut Self)) {
        self.cursor.ancestors.push(parent);
        f(self);
        self.cursor.ancestors.pop();
    }

    fn decl(&mut self, decl: &mut Decl) {
        match &mut decl.kind {
            DeclKind::Gen(gen_decl) => self.within(Parent::Decl, |w| w.gen_decl(gen_decl)),
            DeclKind::Func(func) => {
                self.visitor.enter_func_decl(func);
                self.within(Parent::Decl, |w| {
                    if let Some(recv) = &mut func.recv {
                        w.fields(recv);
                    }
                    w.fields(&mut func.type_params);
                    w.func_type(&mut func.sig);
                    if let Some(body) = &mut func.body {
                        w.block(body);
                    }
                });
                self.visitor.leave_func_decl(func);
            }
            DeclKind::Import(_) | DeclKind::Comments(_) => {}
        }
    }

    fn gen_decl(&mut self, decl: &mut GenDecl) {
        for spec in &mut decl.specs {
            match &mut spec.kind {
                SpecKind::Value(value) => {
                    if let Some(ty) = &mut value.ty {
                        self.expr(ty);
                    }
                    self.exprs(&mut value.values);
                }
                SpecKind::Type(ty) => {
                    self.fields(&mut ty.type_params);
                    self.expr(&mut ty.ty);
                }
            }
        }
    }

    fn fields(&mut self, fields: &mut [Field]) {
        for field in fields {
            self.expr(&mut field.ty);
        }
    }

    fn func_type(&mut self, sig: &mut FuncType) {
        self.fields(&mut sig.params);
        self.fields(&mut sig.results);
    }

    fn block(&mut self, block: &mut Block) {
        self.stmt_list(&mut block.stmts);
    }

    fn stmt_list(&mut self, stmts: &mut Vec<Stmt>) {
        self.visitor.enter_block();
        for (index, stmt) in stmts.iter_mut().enumerate() {
            self.stmt(stmt, Some(index));
        }
        self.visitor.leave_block(stmts);
    }

    fn stmt(&mut self, stmt: &mut Stmt, index: Option<usize>) {
        self.cursor.index = index;
        self.visitor.enter_stmt(stmt, &self.cursor);
        self.cursor.index = None;
        self.within(Parent::Stmt, |w| w.stmt_children(&mut stmt.kind));
    }

    fn opt_stmt(&mut self, stmt: &mut Option<Stmt>) {
        if let Some(stmt) = stmt {
            self.stmt(stmt, None);
        }
    }

    fn stmt_children(&mut self, kind: &mut StmtKind) {
        match kind {
            StmtKind::Comment(_) | StmtKind::Branch { .. } | StmtKind::Empty => {}
            StmtKind::Decl(decl) => self.gen_decl(decl),
            StmtKind::Labeled { stmt, .. } => self.stmt(stmt, None),
            StmtKind::Expr(x)
            | StmtKind::Go(x)
            | StmtKind::Defer(x)
            | StmtKind::IncDec { x, .. } => self.expr(x),
            StmtKind::Send { chan, value } => {
                self.expr(chan);
                self.expr(value);
            }
            StmtKind::Assign { lhs, rhs, .. } => {
                self.exprs(lhs);
                self.exprs(rhs);
            }
            StmtKind::Return(results) => self.exprs(results),
            StmtKind::Block(block) => self.block(block),
            StmtKind::If(s) => {
                self.opt_stmt(&mut s.init);
                self.expr(&mut s.cond);
                self.block(&mut s.then);
                self.opt_stmt(&mut s.els);
            }
            StmtKind::Switch(s) => {
                self.opt_stmt(&mut s.init);
                if let Some(tag) = &mut s.tag {
                    self.expr(tag);
                }
                self.case_clauses(&mut s.clauses);
            }
            StmtKind::TypeSwitch(s) => {
                self.opt_stmt(&mut s.init);
                self.stmt(&mut s.guard, None);
                self.case_clauses(&mut s.clauses);
            }
            StmtKind::Select(clauses) => self.comm_clauses(clauses),
            StmtKind::For(s) => {
                self.opt_stmt(&mut s.init);
                if let Some(cond) = &mut s.cond {
                    self.expr(cond);
                }
                self.opt_stmt(&mut s.post);
                self.block(&mut s.body);
            }
            StmtKind::Range(s) => {
                if let Some(key) = &mut s.key {
                    self.expr(key);
                }
                if let Some(value) = &mut s.value {
                    self.expr(value);
                }
                self.expr(&mut s.x);
                self.block(&mut s.body);
            }
        }
    }

    fn case_clauses(&mut self, clauses: &mut [CaseClause]) {
        for clause in clauses {
            self.exprs(&mut clause.list);
            self.stmt_list(&mut clause.body);
        }
    }

    fn comm_clauses(&mut self, clauses: &mut [CommClause]) {
        for clause in clauses {
            self.opt_stmt(&mut clause.comm);
            self.stmt_list(&mut clause.body);
        }
    }

    fn exprs(&mut self, exprs: &mut [Expr]) {
        for expr in exprs {
            self.expr(expr);
        }
    }

    fn opt_expr(&mut self, expr: &mut Option<Box<Expr>>) {
        if let Some(expr) = expr {
            self.expr(expr);
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        if self.visitor.enter_expr(expr, &self.cursor) == Flow::Skip {
            return;
        }
        let parent = match &*expr {
            Expr::Call(call) => Parent::Call(CallSite::of(call)),
            Expr::CompositeLit(_) => Parent::CompositeLit,
            _ => Parent::Expr,
        };
        self.within(parent, |w| w.expr_children(expr));
        self.visitor.leave_expr(expr, &self.cursor);
    }

    fn expr_children(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Ident(_) | Expr::BasicLit(_) => {}
            Expr::CompositeLit(lit) => {
                self.opt_expr(&mut lit.ty);
                for elt in &mut lit.elts {
                    self.expr(&mut elt.value);
                }
            }
            Expr::FuncLit(lit) => {
                self.func_type(&mut lit.sig);
                self.block(&mut lit.body);
            }
            Expr::Paren(x) | Expr::Star(x) | Expr::Unary { x, .. } | Expr::Selector { x, .. } => {
                self.expr(x)
            }
            Expr::Index { x, indices } => {
                self.expr(x);
                self.exprs(indices);
            }
            Expr::Slice { x, low, high, max, .. } => {
                self.expr(x);
                self.opt_expr(low);
                self.opt_expr(high);
                self.opt_expr(max);
            }
            Expr::TypeAssert { x, ty } => {
                self.expr(x);
                self.opt_expr(ty);
            }
            Expr::Call(call) => {
                self.expr(&mut call.fun);
                self.exprs(&mut call.args);
            }
            Expr::Binary { x, y, .. } => {
                self.expr(x);
                self.expr(y);
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            Expr::Array { len, elem } => {
                self.opt_expr(len);
                self.expr(elem);
            }
            Expr::Map { key, value } => {
                self.expr(key);
                self.expr(value);
            }
            Expr::Chan { elem, .. } => self.expr(elem),
            Expr::Func(sig) => self.func_type(sig),
            Expr::Struct(s) => self.fields(&mut s.fields),
            Expr::Interface(i) => self.fields(&mut i.methods),
            Expr::Ellipsis(elem) => self.opt_expr(elem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{parse_file, print_file};

    const SRC: &str = r#"package p

func f() {
	a := g(h(1))
	if ok {
		b := g(2)
	}
	switch x {
	case 1:
		c := g(3)
	}
}
"#;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl VisitMut for Recorder {
        fn enter_func_decl(&mut self, decl: &FuncDecl) {
            self.events.push(format!("func {}", decl.name));
        }

        fn enter_block(&mut self) {
            self.events.push("{".into());
        }

        fn leave_block(&mut self, stmts: &mut Vec<Stmt>) {
            self.events.push(format!("}} {}", stmts.len()));
        }

        fn enter_stmt(&mut self, _stmt: &Stmt, cursor: &Cursor) {
            self.events.push(format!("stmt {:?}", cursor.index()));
        }

        fn leave_expr(&mut self, expr: &mut Expr, cursor: &Cursor) {
            if let Expr::Call(call) = expr
                && let Some(site) = CallSite::of(call)
            {
                let nested = matches!(cursor.parent(), Some(Parent::Call(_)));
                self.events.push(format!("call {} nested={nested}", site.function));
            }
        }
    }

    #[test]
    fn visits_blocks_statements_and_calls_in_order() {
        let mut file = parse_file(SRC).unwrap();
        let mut recorder = Recorder::default();
        walk_file(&mut recorder, &mut file);
        assert_eq!(
            recorder.events,
            vec![
                "func f",
                "{",
                "stmt Some(0)",
                "call h nested=true",
                "call g nested=false",
                "stmt Some(1)",
                "{",
                "stmt Some(0)",
                "call g nested=false",
                "} 1",
                "stmt Some(2)",
                "{",
                "stmt Some(0)",
                "call g nested=false",
                "} 1",
                "} 3",
            ]
        );
    }

    struct Renamer;

    impl VisitMut for Renamer {
        fn enter_expr(&mut self, _expr: &mut Expr, cursor: &Cursor) -> Flow {
            if cursor.inside_call("keep", "Me") {
                return Flow::Skip;
            }
            Flow::Continue
        }

        fn leave_expr(&mut self, expr: &mut Expr, _cursor: &Cursor) {
            if let Expr::Ident(name) = expr
                && name == "old"
            {
                *expr = Expr::ident("renamed");
            }
        }
    }

    #[test]
    fn replaces_nodes_and_skips_subtrees() {
        let mut file = parse_file("package p\n\nvar a, b = use(old), keep.Me(old)\n").unwrap();
        walk_file(&mut Renamer, &mut file);
        assert_eq!(print_file(&file), "package p\n\nvar a, b = use(renamed), keep.Me(old)\n");
    }
}
