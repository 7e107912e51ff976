//! `github.com/julienschmidt/httprouter`: routers are wrapped by
//! `instahttprouter`, and `httprouter.Router` types follow.

use super::Recipe;
use crate::syntax::ast::{Expr, File};
use crate::tree::{CallSite, Cursor, VisitMut, walk_file};
use tracing::debug;

pub struct HttpRouter;

impl Recipe for HttpRouter {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instahttprouter"
    }

    fn instrument(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        let mut pass = Pass {
            package: self.package_name(),
            target,
            sensor,
            changed: false,
        };
        walk_file(&mut pass, unit);
        pass.changed
    }
}

struct Pass<'a> {
    package: &'a str,
    target: &'a str,
    sensor: &'a str,
    changed: bool,
}

impl VisitMut for Pass<'_> {
    fn leave_expr(&mut self, expr: &mut Expr, cursor: &Cursor) {
        if expr.as_qualified() == Some((self.target, "Router")) {
            debug!("retyping {}.Router", self.target);
            *expr = Expr::qualified(self.package, "WrappedRouter");
            self.changed = true;
            return;
        }
        let is_new = expr
            .as_call()
            .and_then(CallSite::of)
            .is_some_and(|site| site.is(self.target, "New"));
        if !is_new || cursor.inside_call(self.package, "Wrap") {
            return;
        }
        debug!("wrapping {}.New()", self.target);
        let router = std::mem::replace(expr, Expr::ident("nil"));
        *expr = Expr::call(
            Expr::qualified(self.package, "Wrap"),
            vec![router, Expr::ident(self.sensor)],
        );
        self.changed = true;
    }
}
