//! gofmt-style printer.
//!
//! The layout rules follow `go/printer`: line breaks come from the source
//! layout recorded on the nodes, alignment cells are separated with `\v` and
//! resolved by [`align`](super::align) once the whole file is printed.

use super::align::{self, CELL, FORMFEED};
use super::ast::*;

/// Longest function header plus body that is still printed on one line.
const MAX_ONE_LINE: usize = 100;
/// Longest single field a struct or interface keeps on one line.
const MAX_ONE_LINE_FIELD: usize = 30;
/// Key sizes up to this many characters always align.
const SMALL_SIZE: usize = 40;
const UNARY_PREC: u8 = 6;
const HIGHEST_PREC: u8 = 7;

/// Prints `file` as gofmt would.
pub fn print_file(file: &File) -> String {
    let mut printer = Printer::default();
    printer.file(file);
    align::align(&printer.out)
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
    /// Indentation is written lazily before the first text on a line.
    line_start: bool,
}

/// One element of a bracketed list, as seen by [`Printer::expr_list`].
struct ListItem<'a> {
    expr: &'a Expr,
    newline: bool,
    blank_before: bool,
    doc: &'a [Comment],
    comment: Option<&'a Comment>,
}

impl<'a> ListItem<'a> {
    fn arg(expr: &'a Expr, newline: bool) -> Self {
        Self {
            expr,
            newline,
            blank_before: false,
            doc: &[],
            comment: None,
        }
    }

    fn element(element: &'a Element) -> Self {
        Self {
            expr: &element.value,
            newline: element.newline,
            blank_before: element.blank_before,
            doc: &element.doc,
            comment: element.comment.as_ref(),
        }
    }
}

impl Printer {
    fn text(&mut self, s: &str) {
        if self.line_start && !s.is_empty() {
            self.out.extend(std::iter::repeat_n('\t', self.indent));
            self.line_start = false;
        }
        self.out.push_str(s);
    }

    fn cell(&mut self) {
        self.out.push(CELL);
    }

    /// Ends the current line; `formfeed` also ends the alignment section.
    fn newlines(&mut self, n: usize, formfeed: bool) {
        for i in 0..n.max(1) {
            self.out.push('\n');
            if i == 0 && formfeed {
                self.out.push(FORMFEED);
            }
        }
        self.line_start = true;
    }

    fn spans_lines(&self, start: usize) -> bool {
        self.out[start..].contains('\n')
    }

    /// Width of whatever `print` produces, or `None` if it spans lines.
    fn measure(print: impl FnOnce(&mut Printer)) -> Option<usize> {
        let mut scratch = Printer::default();
        print(&mut scratch);
        if scratch.out.contains('\n') {
            None
        } else {
            Some(scratch.out.chars().count())
        }
    }

    fn trailing_comment(&mut self, comment: Option<&Comment>) {
        if let Some(comment) = comment {
            self.cell();
            self.text(&comment.text);
        }
    }

    /// Comments on their own lines in front of a node.
    fn leading_comments(&mut self, comments: &[Comment]) {
        for (i, comment) in comments.iter().enumerate() {
            if i > 0 && comment.blank_before {
                self.newlines(1, false);
            }
            self.text(&comment.text);
            self.newlines(1, true);
        }
    }

    // ---- declarations ----

    fn file(&mut self, file: &File) {
        for (i, comment) in file.doc.iter().enumerate() {
            if i > 0 && comment.blank_before {
                self.newlines(1, false);
            }
            self.text(&comment.text);
            self.newlines(1, false);
        }
        if file.blank_before_package {
            self.newlines(1, false);
        }
        self.text("package ");
        self.text(&file.package);

        let mut prev: Option<&DeclKind> = None;
        for decl in &file.decls {
            let blank = match (prev, &decl.kind) {
                (None, _) => true,
                (Some(DeclKind::Comments(_)), _) | (_, DeclKind::Comments(_)) => decl.blank_before,
                (Some(prev), kind) => {
                    decl.blank_before || !same_keyword(prev, kind) || !decl.doc.is_empty()
                }
            };
            let multi_line_func = match &decl.kind {
                DeclKind::Func(func) => Self::measure(|p| p.func_decl(func)).is_none(),
                _ => false,
            };
            self.newlines(if blank { 2 } else { 1 }, multi_line_func);
            self.decl(decl);
            prev = Some(&decl.kind);
        }
        for comment in &file.tail {
            self.newlines(if comment.blank_before || prev.is_none() { 2 } else { 1 }, true);
            self.text(&comment.text);
        }
        self.newlines(1, false);
    }

    fn decl(&mut self, decl: &Decl) {
        self.leading_comments(&decl.doc);
        match &decl.kind {
            DeclKind::Import(import) => self.import_decl(import),
            DeclKind::Gen(gen_decl) => self.gen_decl(gen_decl),
            DeclKind::Func(func) => self.func_decl(func),
            DeclKind::Comments(group) => {
                for (i, comment) in group.iter().enumerate() {
                    if i > 0 {
                        self.newlines(1, true);
                    }
                    self.text(&comment.text);
                }
            }
        }
        self.trailing_comment(decl.comment.as_ref());
    }

    fn import_decl(&mut self, decl: &ImportDecl) {
        self.text("import ");
        if !decl.grouped && decl.specs.len() == 1 {
            self.import_spec(&decl.specs[0]);
            return;
        }
        self.text("(");
        self.indent += 1;
        for (i, spec) in decl.specs.iter().enumerate() {
            let blank = i > 0 && spec.blank_before;
            self.newlines(if blank { 2 } else { 1 }, i == 0 || !spec.doc.is_empty());
            self.leading_comments(&spec.doc);
            self.import_spec(spec);
        }
        self.group_tail(&decl.tail);
        self.indent -= 1;
        if !decl.specs.is_empty() || !decl.tail.is_empty() {
            self.newlines(1, true);
        }
        self.text(")");
    }

    fn import_spec(&mut self, spec: &ImportSpec) {
        if let Some(name) = &spec.name {
            self.text(name);
            self.text(" ");
        }
        self.text("\"");
        self.text(&spec.path);
        self.text("\"");
        self.trailing_comment(spec.comment.as_ref());
    }

    /// Comments in front of a closing parenthesis or brace.
    fn group_tail(&mut self, tail: &[Comment]) {
        for comment in tail {
            self.newlines(if comment.blank_before { 2 } else { 1 }, true);
            self.text(&comment.text);
        }
    }

    fn gen_decl(&mut self, decl: &GenDecl) {
        self.text(decl.keyword.as_str());
        self.text(" ");
        if !decl.grouped && decl.specs.len() == 1 {
            self.spec(&decl.specs[0], SpecLayout::Single);
            return;
        }
        self.text("(");
        let n = decl.specs.len();
        if n > 0 {
            self.indent += 1;
            let keep_type = if n > 1 && decl.keyword != GenKeyword::Type {
                keep_type_column(&decl.specs)
            } else {
                vec![false; n]
            };
            let mut prev_multi = false;
            for (i, spec) in decl.specs.iter().enumerate() {
                let blank = i > 0 && spec.blank_before;
                self.newlines(
                    if blank { 2 } else { 1 },
                    i == 0 || prev_multi || !spec.doc.is_empty(),
                );
                self.leading_comments(&spec.doc);
                let start = self.out.len();
                let layout = match (n, decl.keyword) {
                    (1, _) => SpecLayout::Single,
                    (_, GenKeyword::Type) => SpecLayout::Grouped,
                    _ => SpecLayout::Aligned(keep_type[i]),
                };
                self.spec(spec, layout);
                prev_multi = self.spans_lines(start);
            }
            self.group_tail(&decl.tail);
            self.indent -= 1;
            self.newlines(1, true);
        } else if !decl.tail.is_empty() {
            self.indent += 1;
            self.group_tail(&decl.tail);
            self.indent -= 1;
            self.newlines(1, true);
        }
        self.text(")");
    }

    fn spec(&mut self, spec: &Spec, layout: SpecLayout) {
        match (&spec.kind, layout) {
            (SpecKind::Value(value), SpecLayout::Aligned(keep_type)) => {
                self.text(&value.names.join(", "));
                let mut extra_cells = 3;
                if value.ty.is_some() || keep_type {
                    self.cell();
                    extra_cells -= 1;
                }
                if let Some(ty) = &value.ty {
                    self.expr(ty);
                }
                if !value.values.is_empty() {
                    self.cell();
                    self.text("= ");
                    self.plain_list(&value.values, 1);
                    extra_cells -= 1;
                }
                if let Some(comment) = &spec.comment {
                    for _ in 1..extra_cells {
                        self.cell();
                    }
                    self.trailing_comment(Some(comment));
                }
            }
            (SpecKind::Value(value), _) => {
                self.text(&value.names.join(", "));
                if let Some(ty) = &value.ty {
                    self.text(" ");
                    self.expr(ty);
                }
                if !value.values.is_empty() {
                    self.text(" = ");
                    self.plain_list(&value.values, 1);
                }
                self.trailing_comment(spec.comment.as_ref());
            }
            (SpecKind::Type(ty), layout) => {
                self.text(&ty.name);
                if !ty.type_params.is_empty() {
                    self.type_params(&ty.type_params, true);
                }
                if matches!(layout, SpecLayout::Single) {
                    self.text(" ");
                } else {
                    self.cell();
                }
                if ty.alias {
                    self.text("= ");
                }
                self.expr(&ty.ty);
                self.trailing_comment(spec.comment.as_ref());
            }
        }
    }

    fn func_decl(&mut self, func: &FuncDecl) {
        let start = self.out.len();
        self.text("func ");
        if let Some(recv) = &func.recv {
            self.parameters(recv, false, "(", ")");
            self.text(" ");
        }
        self.text(&func.name);
        if !func.type_params.is_empty() {
            self.type_params(&func.type_params, false);
        }
        self.signature(&func.sig);
        if let Some(body) = &func.body {
            self.func_body(start, true, body);
        }
    }

    fn signature(&mut self, sig: &FuncType) {
        self.parameters(&sig.params, sig.params_close_break, "(", ")");
        match sig.results.as_slice() {
            [] => {}
            [single] if single.names.is_empty() => {
                self.text(" ");
                self.expr(strip_parens_always(&single.ty));
            }
            results => {
                self.text(" ");
                self.parameters(results, false, "(", ")");
            }
        }
    }

    fn type_params(&mut self, fields: &[Field], type_spec: bool) {
        self.parameters(fields, false, "[", "]");
        if type_spec
            && let [field] = fields
            && field.names.len() == 1
            && combines_with_name(&field.ty)
        {
            // `[P *T,]` keeps its comma so it does not read as an array length.
            self.out.pop();
            self.text(",]");
        }
    }

    fn parameters(&mut self, fields: &[Field], close_break: bool, open: &str, close: &str) {
        self.text(open);
        if !fields.is_empty() {
            let mut indented = false;
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    self.text(",");
                }
                if field.newline {
                    if !indented {
                        self.indent += 1;
                        indented = true;
                    }
                    self.newlines(1, true);
                } else if i > 0 {
                    self.text(" ");
                }
                if !field.names.is_empty() {
                    self.text(&field.names.join(", "));
                    self.text(" ");
                }
                self.expr(strip_parens_always(&field.ty));
            }
            if close_break {
                self.text(",");
                self.newlines(1, true);
            }
            if indented {
                self.indent -= 1;
            }
        }
        self.text(close);
    }

    /// `header_start` is where `func` was printed; `decl` selects the
    /// alignable separator used between one-line declarations.
    fn func_body(&mut self, header_start: usize, decl: bool, body: &Block) {
        let header = &self.out[header_start..];
        let header_size = if header.contains('\n') {
            MAX_ONE_LINE + 1
        } else {
            header.chars().count()
        };
        if header_size + body_size(body) <= MAX_ONE_LINE {
            if decl {
                self.cell();
            } else {
                self.text(" ");
            }
            self.text("{");
            if !body.stmts.is_empty() {
                self.text(" ");
                for (i, stmt) in body.stmts.iter().enumerate() {
                    if i > 0 {
                        self.text("; ");
                    }
                    self.stmt(stmt);
                }
                self.text(" ");
            }
            self.text("}");
            return;
        }
        self.text(" ");
        self.block(body);
    }

    // ---- statements ----

    fn block(&mut self, block: &Block) {
        self.text("{");
        self.indent += 1;
        self.stmt_list(&block.stmts);
        self.indent -= 1;
        self.newlines(if block.blank_before_close { 2 } else { 1 }, true);
        self.text("}");
    }

    fn stmt_list(&mut self, stmts: &[Stmt]) {
        let mut prev_multi = false;
        for (i, stmt) in stmts.iter().enumerate() {
            let formfeed = i == 0 || prev_multi || matches!(stmt.kind, StmtKind::Comment(_));
            self.newlines(if stmt.blank_before { 2 } else { 1 }, formfeed);
            let start = self.out.len();
            self.stmt(stmt);
            self.trailing_comment(stmt.comment.as_ref());
            let lines = self.out[start..].matches('\n').count();
            prev_multi = lines > label_depth(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Comment(comment) => self.text(&comment.text),
            StmtKind::Decl(decl) => self.gen_decl(decl),
            StmtKind::Labeled { label, stmt } => {
                let indent = self.indent;
                self.indent = indent.saturating_sub(1);
                self.text(label);
                self.text(":");
                self.indent = indent;
                if !matches!(stmt.kind, StmtKind::Empty) {
                    self.newlines(if stmt.blank_before { 2 } else { 1 }, true);
                    self.stmt(stmt);
                }
            }
            StmtKind::Expr(x) => self.expr0(x, 1),
            StmtKind::Send { chan, value } => {
                self.expr0(chan, 1);
                self.text(" <- ");
                self.expr0(value, 1);
            }
            StmtKind::IncDec { x, inc } => {
                self.expr0(x, 2);
                self.text(if *inc { "++" } else { "--" });
            }
            StmtKind::Assign { lhs, op, rhs } => {
                let depth = if lhs.len() > 1 && rhs.len() > 1 { 2 } else { 1 };
                self.plain_list(lhs, depth);
                self.text(" ");
                self.text(op.as_str());
                self.text(" ");
                self.plain_list(rhs, depth);
            }
            StmtKind::Go(call) => {
                self.text("go ");
                self.expr(call);
            }
            StmtKind::Defer(call) => {
                self.text("defer ");
                self.expr(call);
            }
            StmtKind::Return(results) => {
                self.text("return");
                if !results.is_empty() {
                    self.text(" ");
                    self.plain_list(results, 1);
                }
            }
            StmtKind::Branch { kind, label } => {
                self.text(kind.as_str());
                if let Some(label) = label {
                    self.text(" ");
                    self.text(label);
                }
            }
            StmtKind::Block(block) => self.block(block),
            StmtKind::If(stmt) => self.if_stmt(stmt),
            StmtKind::Switch(stmt) => {
                self.text("switch");
                self.control_clause(false, stmt.init.as_ref(), stmt.tag.as_ref(), None);
                self.case_clauses(&stmt.clauses);
            }
            StmtKind::TypeSwitch(stmt) => {
                self.text("switch");
                if let Some(init) = &stmt.init {
                    self.text(" ");
                    self.stmt(init);
                    self.text(";");
                }
                self.text(" ");
                self.stmt(&stmt.guard);
                self.text(" ");
                self.case_clauses(&stmt.clauses);
            }
            StmtKind::Select(clauses) => {
                self.text("select ");
                if clauses.is_empty() {
                    self.text("{}");
                } else {
                    self.comm_clauses(clauses);
                }
            }
            StmtKind::For(stmt) => {
                self.text("for");
                self.control_clause(
                    true,
                    stmt.init.as_ref(),
                    stmt.cond.as_ref(),
                    stmt.post.as_ref(),
                );
                self.block(&stmt.body);
            }
            StmtKind::Range(stmt) => {
                self.text("for ");
                if let Some(key) = &stmt.key {
                    self.expr(key);
                    if let Some(value) = &stmt.value {
                        self.text(", ");
                        self.expr(value);
                    }
                    self.text(if stmt.define { " := " } else { " = " });
                }
                self.text("range ");
                self.expr(strip_parens(&stmt.x));
                self.text(" ");
                self.block(&stmt.body);
            }
            StmtKind::Empty => {}
        }
    }

    fn if_stmt(&mut self, stmt: &IfStmt) {
        self.text("if");
        self.control_clause(false, stmt.init.as_ref(), Some(&stmt.cond), None);
        self.block(&stmt.then);
        if let Some(els) = &stmt.els {
            self.text(" else ");
            self.stmt(els);
        }
    }

    fn control_clause(
        &mut self,
        is_for: bool,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
    ) {
        self.text(" ");
        let mut needs_blank = false;
        if init.is_none() && post.is_none() {
            if let Some(cond) = cond {
                self.expr(strip_parens(cond));
                needs_blank = true;
            }
        } else {
            if let Some(init) = init {
                self.stmt(init);
            }
            self.text("; ");
            if let Some(cond) = cond {
                self.expr(strip_parens(cond));
                needs_blank = true;
            }
            if is_for {
                self.text("; ");
                needs_blank = false;
                if let Some(post) = post {
                    self.stmt(post);
                    needs_blank = true;
                }
            }
        }
        if needs_blank {
            self.text(" ");
        }
    }

    fn case_clauses(&mut self, clauses: &[CaseClause]) {
        self.text("{");
        for clause in clauses {
            self.newlines(if clause.blank_before { 2 } else { 1 }, true);
            self.leading_comments(&clause.doc);
            if clause.is_default {
                self.text("default");
            } else {
                self.text("case ");
                self.plain_list(&clause.list, 1);
            }
            self.text(":");
            self.indent += 1;
            self.stmt_list(&clause.body);
            self.indent -= 1;
        }
        self.newlines(1, true);
        self.text("}");
    }

    fn comm_clauses(&mut self, clauses: &[CommClause]) {
        self.text("{");
        for clause in clauses {
            self.newlines(if clause.blank_before { 2 } else { 1 }, true);
            self.leading_comments(&clause.doc);
            match &clause.comm {
                Some(comm) => {
                    self.text("case ");
                    self.stmt(comm);
                }
                None => self.text("default"),
            }
            self.text(":");
            self.indent += 1;
            self.stmt_list(&clause.body);
            self.indent -= 1;
        }
        self.newlines(1, true);
        self.text("}");
    }

    // ---- expressions ----

    fn expr(&mut self, x: &Expr) {
        self.expr1(x, 0, 1);
    }

    fn expr0(&mut self, x: &Expr, depth: usize) {
        self.expr1(x, 0, depth);
    }

    fn plain_list(&mut self, list: &[Expr], depth: usize) {
        for (i, x) in list.iter().enumerate() {
            if i > 0 {
                self.text(", ");
            }
            self.expr0(x, depth);
        }
    }

    fn expr1(&mut self, x: &Expr, prec1: u8, depth: usize) {
        match x {
            Expr::Ident(name) | Expr::BasicLit(name) => self.text(name),
            Expr::Binary { x: lhs, op, y, newline } => {
                let prec = op.precedence();
                if prec < prec1 {
                    self.text("(");
                    self.expr0(x, reduce_depth(depth));
                    self.text(")");
                    return;
                }
                let cutoff = cutoff(x, depth);
                let mut print_blank = prec < cutoff;
                self.expr1(lhs, prec, depth + diff_prec(lhs, prec));
                if print_blank {
                    self.text(" ");
                }
                self.text(op.as_str());
                let mut indented = false;
                if *newline {
                    self.indent += 1;
                    indented = true;
                    self.newlines(1, true);
                    print_blank = false;
                }
                if print_blank {
                    self.text(" ");
                }
                self.expr1(y, prec + 1, depth + 1);
                if indented {
                    self.indent -= 1;
                }
            }
            Expr::KeyValue { key, value } => {
                self.expr(key);
                self.text(": ");
                self.expr(value);
            }
            Expr::Star(inner) => {
                if UNARY_PREC < prec1 {
                    self.text("(*");
                    self.expr(inner);
                    self.text(")");
                } else {
                    self.text("*");
                    self.expr(inner);
                }
            }
            Expr::Unary { op, x: inner } => {
                if UNARY_PREC < prec1 {
                    self.text("(");
                    self.expr(x);
                    self.text(")");
                } else {
                    self.text(op.as_str());
                    self.expr1(inner, UNARY_PREC, depth);
                }
            }
            Expr::FuncLit(lit) => {
                self.text("func");
                let start = self.out.len() - "func".len();
                self.signature(&lit.sig);
                self.func_body(start, false, &lit.body);
            }
            Expr::Paren(inner) => {
                if let Expr::Paren(_) = **inner {
                    self.expr0(inner, depth);
                } else {
                    self.text("(");
                    self.expr0(inner, reduce_depth(depth));
                    self.text(")");
                }
            }
            Expr::Selector { x: inner, sel, newline } => {
                self.selector(inner, sel, *newline, depth, false);
            }
            Expr::TypeAssert { x: inner, ty } => {
                self.expr1(inner, HIGHEST_PREC, depth);
                self.text(".(");
                match ty {
                    Some(ty) => self.expr(ty),
                    None => self.text("type"),
                }
                self.text(")");
            }
            Expr::Index { x: inner, indices } => {
                self.expr1(inner, HIGHEST_PREC, 1);
                self.text("[");
                self.plain_list(indices, depth + 1);
                self.text("]");
            }
            Expr::Slice {
                x: inner,
                low,
                high,
                max,
                three,
            } => {
                self.expr1(inner, HIGHEST_PREC, 1);
                self.text("[");
                let mut indices = vec![low.as_deref(), high.as_deref()];
                if *three {
                    indices.push(max.as_deref());
                }
                let needs_blanks = depth <= 1
                    && indices.iter().flatten().count() > 1
                    && indices.iter().flatten().any(|x| matches!(x, Expr::Binary { .. }));
                for (i, index) in indices.iter().enumerate() {
                    if i > 0 {
                        if indices[i - 1].is_some() && needs_blanks {
                            self.text(" ");
                        }
                        self.text(":");
                        if index.is_some() && needs_blanks {
                            self.text(" ");
                        }
                    }
                    if let Some(index) = index {
                        self.expr0(index, depth + 1);
                    }
                }
                self.text("]");
            }
            Expr::Call(call) => self.call(call, depth),
            Expr::CompositeLit(lit) => {
                if let Some(ty) = &lit.ty {
                    self.expr1(ty, HIGHEST_PREC, depth);
                }
                self.text("{");
                let items: Vec<ListItem> = lit.elts.iter().map(ListItem::element).collect();
                self.expr_list(&items, 1, Some(lit.close_break), &lit.tail);
                self.text("}");
            }
            Expr::Ellipsis(elt) => {
                self.text("...");
                if let Some(elt) = elt {
                    self.expr(elt);
                }
            }
            Expr::Array { len, elem } => {
                self.text("[");
                if let Some(len) = len {
                    self.expr(len);
                }
                self.text("]");
                self.expr(elem);
            }
            Expr::Map { key, value } => {
                self.text("map[");
                self.expr(key);
                self.text("]");
                self.expr(value);
            }
            Expr::Chan { dir, elem } => {
                self.text(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Recv => "<-chan ",
                    ChanDir::Send => "chan<- ",
                });
                self.expr(elem);
            }
            Expr::Func(sig) => {
                self.text("func");
                self.signature(sig);
            }
            Expr::Struct(st) => {
                self.text("struct");
                self.field_list(&st.fields, st.one_line, &st.tail, true);
            }
            Expr::Interface(it) => {
                self.text("interface");
                self.field_list(&it.methods, it.one_line, &it.tail, false);
            }
        }
    }

    /// Returns whether the selector moved to a new, indented line.
    fn selector(
        &mut self,
        x: &Expr,
        sel: &str,
        newline: bool,
        depth: usize,
        is_method: bool,
    ) -> bool {
        self.expr1(x, HIGHEST_PREC, depth);
        self.text(".");
        if newline {
            self.indent += 1;
            self.newlines(1, false);
            self.text(sel);
            if !is_method {
                self.indent -= 1;
            }
            return true;
        }
        self.text(sel);
        false
    }

    fn call(&mut self, call: &Call, depth: usize) {
        let depth = if call.args.len() > 1 { depth + 1 } else { depth };
        let indented = match &*call.fun {
            Expr::Selector { x, sel, newline } => self.selector(x, sel, *newline, depth, true),
            Expr::Func(_) => {
                self.text("(");
                self.expr1(&call.fun, HIGHEST_PREC, depth);
                self.text(")");
                false
            }
            fun => {
                self.expr1(fun, HIGHEST_PREC, depth);
                false
            }
        };
        self.text("(");
        let items: Vec<ListItem> = call
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| ListItem::arg(arg, call.breaks_before(i)))
            .collect();
        if call.ellipsis {
            self.expr_list(&items, depth, None, &[]);
            self.text("...");
            if call.layout.close_break {
                self.text(",");
                self.newlines(1, true);
            }
        } else {
            self.expr_list(&items, depth, Some(call.layout.close_break), &[]);
        }
        self.text(")");
        if indented {
            self.indent -= 1;
        }
    }

    /// Elements of a call or composite literal. `close_break` is `Some` when
    /// the list takes a terminating comma before a closing bracket on its own
    /// line.
    fn expr_list(
        &mut self,
        items: &[ListItem],
        depth: usize,
        close_break: Option<bool>,
        tail: &[Comment],
    ) {
        if items.is_empty() && tail.is_empty() {
            return;
        }
        let mut indented = false;
        let mut prev_break: Option<usize> = None;
        let mut comma_printed = false;
        let mut size = 0;
        let mut ln_sum = 0.0;
        let mut count = 0;

        for (i, item) in items.iter().enumerate() {
            let prev_size = size;
            size = match (Self::measure(|p| p.expr(item.expr)), item.expr) {
                (Some(_), Expr::KeyValue { key, .. }) => {
                    Self::measure(|p| p.expr(key)).unwrap_or(0)
                }
                (Some(size), _) => size,
                (None, _) => 0,
            };
            let mut use_formfeed = true;
            if prev_size > 0 && size > 0 {
                if count == 0 || (prev_size <= SMALL_SIZE && size <= SMALL_SIZE) {
                    use_formfeed = false;
                } else {
                    let geomean = (ln_sum / count as f64).exp();
                    let ratio = size as f64 / geomean;
                    use_formfeed = 2.5 * ratio <= 1.0 || 2.5 <= ratio;
                }
            }

            if i > 0 && !comma_printed {
                self.text(",");
            }
            comma_printed = false;
            if item.newline {
                let formfeed = i == 0
                    || use_formfeed
                    || prev_break.map_or(i > 0, |b| b + 1 < i)
                    || !item.doc.is_empty();
                if !indented {
                    self.indent += 1;
                    indented = true;
                }
                let n = if item.blank_before { 2 } else { 1 };
                self.newlines(n, formfeed);
                prev_break = Some(i);
                if formfeed || n > 1 {
                    ln_sum = 0.0;
                    count = 0;
                }
                self.leading_comments(item.doc);
            } else if i > 0 {
                self.text(" ");
            }

            match item.expr {
                Expr::KeyValue { key, value } if items.len() > 1 && size > 0 && item.newline => {
                    self.expr(key);
                    self.text(":");
                    self.cell();
                    self.expr(value);
                }
                x => self.expr0(x, depth),
            }

            if size > 0 {
                ln_sum += (size as f64).ln();
                count += 1;
            }
            if let Some(comment) = item.comment {
                self.text(",");
                comma_printed = true;
                self.trailing_comment(Some(comment));
            }
        }

        if !tail.is_empty() {
            if !items.is_empty() && !comma_printed {
                self.text(",");
                comma_printed = true;
            }
            if !indented {
                self.indent += 1;
                indented = true;
            }
            self.group_tail(tail);
        }

        let close_on_own_line = close_break.is_some_and(|b| b || !tail.is_empty());
        if close_on_own_line {
            if !comma_printed && !items.is_empty() {
                self.text(",");
            }
            if indented {
                self.indent -= 1;
            }
            self.newlines(1, true);
            return;
        }
        if indented {
            self.indent -= 1;
        }
    }

    fn field_list(&mut self, fields: &[Field], one_line: bool, tail: &[Comment], is_struct: bool) {
        if tail.is_empty() && one_line {
            if fields.is_empty() {
                self.text("{}");
                return;
            }
            if let [field] = fields
                && is_one_line_field(field)
            {
                self.text("{ ");
                if is_struct {
                    if !field.names.is_empty() {
                        self.text(&field.names.join(", "));
                        self.text(" ");
                    }
                    self.expr(&field.ty);
                } else {
                    self.interface_elem(field);
                }
                self.text(" }");
                return;
            }
        }

        self.text(" {");
        self.indent += 1;
        let aligned = fields.len() != 1;
        let mut prev_multi = false;
        for (i, field) in fields.iter().enumerate() {
            let blank = i > 0 && field.blank_before;
            self.newlines(if blank { 2 } else { 1 }, i == 0 || prev_multi || !field.doc.is_empty());
            self.leading_comments(&field.doc);
            let start = self.out.len();
            if is_struct {
                self.struct_field(field, aligned);
            } else {
                self.interface_elem(field);
                self.trailing_comment(field.comment.as_ref());
            }
            prev_multi = self.spans_lines(start);
        }
        self.group_tail(tail);
        self.indent -= 1;
        self.newlines(1, true);
        self.text("}");
    }

    fn struct_field(&mut self, field: &Field, aligned: bool) {
        let sep = |p: &mut Printer| {
            if aligned {
                p.cell();
            } else {
                p.text(" ");
            }
        };
        let mut extra_cells = 2;
        if !field.names.is_empty() {
            self.text(&field.names.join(", "));
            sep(self);
            self.expr(&field.ty);
        } else {
            self.expr(&field.ty);
        }
        if let Some(tag) = &field.tag {
            sep(self);
            self.text(tag);
            extra_cells = 1;
        }
        if let Some(comment) = &field.comment {
            for _ in 1..extra_cells {
                sep(self);
            }
            self.trailing_comment(Some(comment));
        }
    }

    fn interface_elem(&mut self, field: &Field) {
        match (field.names.first(), &field.ty) {
            (Some(name), Expr::Func(sig)) => {
                self.text(name);
                self.signature(sig);
            }
            _ => self.expr(&field.ty),
        }
    }
}

#[derive(Clone, Copy)]
enum SpecLayout {
    /// Lone spec, separated by blanks.
    Single,
    /// Type spec inside a group.
    Grouped,
    /// Const or var spec in a group of several; `true` keeps the type column.
    Aligned(bool),
}

fn same_keyword(a: &DeclKind, b: &DeclKind) -> bool {
    match (a, b) {
        (DeclKind::Import(_), DeclKind::Import(_)) | (DeclKind::Func(_), DeclKind::Func(_)) => true,
        (DeclKind::Gen(a), DeclKind::Gen(b)) => a.keyword == b.keyword,
        _ => false,
    }
}

/// Marks the specs of each run with values that must keep an (empty) type
/// column because some spec in the run has a type.
fn keep_type_column(specs: &[Spec]) -> Vec<bool> {
    let mut keep = vec![false; specs.len()];
    let mut run_start: Option<usize> = None;
    let mut keep_type = false;
    for (i, spec) in specs.iter().enumerate() {
        let SpecKind::Value(value) = &spec.kind else {
            continue;
        };
        if !value.values.is_empty() {
            if run_start.is_none() {
                run_start = Some(i);
                keep_type = false;
            }
        } else if let Some(start) = run_start.take()
            && keep_type
        {
            keep[start..i].fill(true);
        }
        if value.ty.is_some() {
            keep_type = true;
        }
    }
    if let Some(start) = run_start
        && keep_type
    {
        keep[start..].fill(true);
    }
    keep
}

fn body_size(body: &Block) -> usize {
    let has_comments = body
        .stmts
        .iter()
        .any(|s| s.comment.is_some() || matches!(s.kind, StmtKind::Comment(_)));
    if !body.one_line || body.stmts.len() > 5 || has_comments {
        return MAX_ONE_LINE + 1;
    }
    let mut size = 0;
    for (i, stmt) in body.stmts.iter().enumerate() {
        if size > MAX_ONE_LINE {
            break;
        }
        if i > 0 {
            size += 2;
        }
        size += Printer::measure(|p| p.stmt(stmt)).unwrap_or(MAX_ONE_LINE + 1);
    }
    size
}

fn is_one_line_field(field: &Field) -> bool {
    if field.tag.is_some() || field.comment.is_some() || !field.doc.is_empty() {
        return false;
    }
    let names_size = usize::from(!field.names.is_empty());
    let type_size = Printer::measure(|p| p.expr(&field.ty)).unwrap_or(MAX_ONE_LINE_FIELD + 1);
    names_size + type_size <= MAX_ONE_LINE_FIELD
}

fn label_depth(stmt: &Stmt) -> usize {
    match &stmt.kind {
        StmtKind::Labeled { stmt, .. } => 1 + usize::from(stmt.blank_before) + label_depth(stmt),
        _ => 0,
    }
}

fn reduce_depth(depth: usize) -> usize {
    depth.saturating_sub(1).max(1)
}

fn diff_prec(x: &Expr, prec: u8) -> usize {
    match x {
        Expr::Binary { op, .. } if op.precedence() == prec => 0,
        _ => 1,
    }
}

/// Precedence below which binary operators get blanks around them.
fn cutoff(x: &Expr, depth: usize) -> u8 {
    let (has4, has5, max_problem) = walk_binary(x);
    if max_problem > 0 {
        return max_problem + 1;
    }
    match (has4 && has5, depth == 1) {
        (true, true) => 5,
        (true, false) => 4,
        (false, true) => 6,
        (false, false) => 4,
    }
}

fn walk_binary(x: &Expr) -> (bool, bool, u8) {
    let Expr::Binary { x: lhs, op, y, .. } = x else {
        return (false, false, 0);
    };
    let prec = op.precedence();
    let mut has4 = prec == 4;
    let mut has5 = prec == 5;
    let mut max_problem = 0;
    if let Expr::Binary { op: inner, .. } = &**lhs
        && inner.precedence() >= prec
    {
        let (h4, h5, mp) = walk_binary(lhs);
        has4 |= h4;
        has5 |= h5;
        max_problem = max_problem.max(mp);
    }
    match &**y {
        Expr::Binary { op: inner, .. } if inner.precedence() > prec => {
            let (h4, h5, mp) = walk_binary(y);
            has4 |= h4;
            has5 |= h5;
            max_problem = max_problem.max(mp);
        }
        Expr::Star(_) if *op == BinaryOp::Div => max_problem = 5,
        Expr::Unary { op: unary, .. } => {
            let pair = format!("{}{}", op.as_str(), unary.as_str());
            match pair.as_str() {
                "/*" | "&&" | "&^" => max_problem = 5,
                "++" | "--" => max_problem = max_problem.max(4),
                _ => {}
            }
        }
        _ => {}
    }
    (has4, has5, max_problem)
}

/// Drops redundant parentheses around a control clause expression unless
/// they protect a composite literal that would otherwise open the block.
fn strip_parens(x: &Expr) -> &Expr {
    match x {
        Expr::Paren(inner) if !has_bare_literal(inner) => strip_parens(inner),
        _ => x,
    }
}

fn strip_parens_always(x: &Expr) -> &Expr {
    match x {
        Expr::Paren(inner) => strip_parens_always(inner),
        _ => x,
    }
}

fn has_bare_literal(x: &Expr) -> bool {
    match x {
        Expr::Paren(_) => false,
        Expr::CompositeLit(lit) => lit.ty.as_deref().is_some_and(is_type_name),
        Expr::FuncLit(_) => true,
        Expr::Binary { x, y, .. } => has_bare_literal(x) || has_bare_literal(y),
        Expr::Unary { x, .. }
        | Expr::Star(x)
        | Expr::Selector { x, .. }
        | Expr::TypeAssert { x, .. } => has_bare_literal(x),
        Expr::Call(call) => has_bare_literal(&call.fun) || call.args.iter().any(has_bare_literal),
        Expr::Index { x, indices } => has_bare_literal(x) || indices.iter().any(has_bare_literal),
        Expr::Slice { x, low, high, max, .. } => {
            has_bare_literal(x)
                || [low, high, max].into_iter().flatten().any(|e| has_bare_literal(e))
        }
        Expr::KeyValue { key, value } => has_bare_literal(key) || has_bare_literal(value),
        _ => false,
    }
}

fn is_type_name(x: &Expr) -> bool {
    match x {
        Expr::Ident(_) => true,
        Expr::Selector { x, .. } => matches!(**x, Expr::Ident(_)),
        _ => false,
    }
}

/// `[P *T]` would otherwise parse as an array length `P * T`.
fn combines_with_name(x: &Expr) -> bool {
    match x {
        Expr::Star(inner) => !is_type_elem(inner),
        Expr::Binary { x, y, .. } => combines_with_name(x) && !is_type_elem(y),
        _ => false,
    }
}

fn is_type_elem(x: &Expr) -> bool {
    match x {
        Expr::Array { .. }
        | Expr::Struct(_)
        | Expr::Func(_)
        | Expr::Interface(_)
        | Expr::Map { .. }
        | Expr::Chan { .. } => true,
        Expr::Unary { op: UnaryOp::Tilde, .. } => true,
        Expr::Binary { x, y, .. } => is_type_elem(x) || is_type_elem(y),
        Expr::Paren(inner) => is_type_elem(inner),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::super::parse_file;
    use super::*;

    fn roundtrip(src: &str) -> String {
        print_file(&parse_file(src).unwrap())
    }

    #[track_caller]
    fn assert_stable(src: &str) {
        assert_eq!(roundtrip(src), src);
    }

    #[test]
    fn reprints_imports_and_functions() {
        assert_stable(
            r#"package main

import (
	"fmt"
	"net/http"

	"github.com/gorilla/mux"
)

func main() {
	r := mux.NewRouter()
	r.HandleFunc("/", func(w http.ResponseWriter, req *http.Request) {
		fmt.Fprintln(w, "hello")
	})
	http.ListenAndServe(":8080", r)
}
"#,
        );
    }

    #[test]
    fn aligns_struct_fields_and_comments() {
        assert_stable(
            "package main

type Config struct {
	Name    string `json:\"name\"`
	Timeout int    `json:\"timeout\"`
	debug   bool
}
",
        );
    }

    #[test]
    fn aligns_keyed_composite_literal() {
        assert_stable(
            r#"package main

func f() {
	cfg := Config{
		Name:    "svc",
		Timeout: 10,
	}
	use(cfg)
}
"#,
        );
    }

    #[test]
    fn keeps_control_flow_layout() {
        assert_stable(
            r#"package main

func f(xs []int, ch chan int) (int, error) {
	total := 0
	for i, x := range xs {
		if x < 0 {
			continue
		} else if x == 0 {
			break
		}
		total += x * i
	}

	switch {
	case total > 10:
		return total, nil
	default:
	}
	select {
	case v := <-ch:
		total = v
	}
	return 0, fmt.Errorf("total %d", total)
}
"#,
        );
    }

    #[test]
    fn blank_lines_after_labels_and_before_closing_braces_survive() {
        assert_stable(
            "package main

func f(xs []int) {
	for _, x := range xs {
		if x > 1 {
			goto EXIT
		}

	}

EXIT:

	if len(xs) > 0 {
		use(xs)
	}
}
",
        );
    }

    #[test]
    fn one_line_function_bodies_stay_on_one_line() {
        assert_stable(
            "package main

func (s *server) Name() string { return s.name }
func (s *server) Port() int    { return s.port }
",
        );
    }

    #[test]
    fn grouped_values_align() {
        assert_stable(
            "package main

const (
	a       = 1 // first
	bbb     = 2
	c   int = 3
)

var x = 1
",
        );
    }

    #[test]
    fn binary_expression_spacing_follows_precedence() {
        assert_stable(
            "package main

func f(a, b, c int) int {
	x := a*b + c
	y := (a + b) * c
	return x + y&c
}
",
        );
    }

    #[test]
    fn inserted_arguments_follow_the_list_layout() {
        let mut file = parse_file(
            "package main

func f() {
	g(
		a,
		b,
	)
	h(a)
}
",
        )
        .unwrap();
        let DeclKind::Func(func) = &mut file.decls[0].kind else {
            panic!("expected function");
        };
        let stmts = &mut func.body.as_mut().unwrap().stmts;
        for stmt in stmts.iter_mut() {
            if let StmtKind::Expr(Expr::Call(call)) = &mut stmt.kind {
                call.push_arg(Expr::ident("sensor"));
            }
        }
        assert_snapshot!(print_file(&file), @r"
package main

func f() {
	g(
		a,
		b,
		sensor,
	)
	h(a, sensor)
}
");
    }
}
