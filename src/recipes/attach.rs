use crate::syntax::ast::{Expr, File, Stmt};
use crate::tree::{CallSite, Cursor, Stack, VisitMut, binding, insert_after_once, walk_file};
use tracing::debug;

/// After `x := target.Constructor(...)` (or `x = ...`, `var x = ...`)
/// inserts `package.function(sensor, x)` as the next statement of the same
/// block, unless that block already has it further down.
#[derive(Debug)]
pub struct AttachAfterBinding<'a> {
    pub package: &'a str,
    pub function: &'a str,
    pub constructors: &'a [&'a str],
}

impl AttachAfterBinding<'_> {
    pub fn apply(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        let mut pass = Pass {
            attach: self,
            target,
            sensor,
            blocks: Stack::default(),
            changed: false,
        };
        walk_file(&mut pass, unit);
        pass.changed
    }

    fn statement(&self, sensor: &str, bound: &str) -> Stmt {
        Stmt::expr(Expr::call(
            Expr::qualified(self.package, self.function),
            vec![Expr::ident(sensor), Expr::ident(bound)],
        ))
    }
}

struct Pass<'a> {
    attach: &'a AttachAfterBinding<'a>,
    target: &'a str,
    sensor: &'a str,
    /// Per enclosing statement list: `(index, name)` of the eligible
    /// bindings found directly in it.
    blocks: Stack<Vec<(usize, String)>>,
    changed: bool,
}

impl VisitMut for Pass<'_> {
    fn enter_block(&mut self) {
        self.blocks.push(Vec::new());
    }

    fn enter_stmt(&mut self, stmt: &Stmt, cursor: &Cursor) {
        let Some(index) = cursor.index() else {
            return;
        };
        let Some((name, call)) = binding(stmt) else {
            return;
        };
        let eligible = CallSite::of(call).is_some_and(|site| {
            site.package.as_deref() == Some(self.target)
                && self.attach.constructors.contains(&site.function.as_str())
        });
        if eligible && let Some(bindings) = self.blocks.top_mut() {
            bindings.push((index, name.to_string()));
        }
    }

    fn leave_block(&mut self, stmts: &mut Vec<Stmt>) {
        let Some(bindings) = self.blocks.pop() else {
            return;
        };
        // indices were recorded before any insertion
        let mut inserted = 0;
        for (index, name) in bindings {
            if insert_after_once(
                stmts,
                index + inserted,
                self.attach.statement(self.sensor, &name),
            ) {
                debug!("attached {}.{} to {name}", self.attach.package, self.attach.function);
                inserted += 1;
                self.changed = true;
            }
        }
    }
}
