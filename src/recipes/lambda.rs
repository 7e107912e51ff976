//! `github.com/aws/aws-lambda-go/lambda`: handlers passed to the `Start*`
//! functions are wrapped by `instalambda`.

use super::Recipe;
use crate::syntax::ast::{Expr, File};
use crate::tree::{CallSite, Cursor, VisitMut, mentions, walk_file};
use tracing::debug;

/// `(function, handler argument, wrapper)`
const ENTRY_POINTS: &[(&str, usize, &str)] = &[
    ("Start", 0, "NewHandler"),
    ("StartHandler", 0, "WrapHandler"),
    ("StartHandlerWithContext", 1, "WrapHandler"),
    ("StartWithOptions", 0, "NewHandler"),
    ("StartWithContext", 1, "NewHandler"),
];

pub struct Lambda;

impl Recipe for Lambda {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instalambda"
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
    fn leave_expr(&mut self, expr: &mut Expr, _cursor: &Cursor) {
        let Expr::Call(call) = expr else {
            return;
        };
        let Some(site) = CallSite::of(call) else {
            return;
        };
        if site.package.as_deref() != Some(self.target) {
            return;
        }
        let Some(&(_, index, wrapper)) =
            ENTRY_POINTS.iter().find(|(function, ..)| *function == site.function)
        else {
            return;
        };
        if index >= call.args.len() || mentions(&call.args, self.sensor) {
            return;
        }
        debug!("wrapping handler of {}.{}", self.target, site.function);
        let handler = std::mem::replace(&mut call.args[index], Expr::ident("nil"));
        call.args[index] = Expr::call(
            Expr::qualified(self.package, wrapper),
            vec![handler, Expr::ident(self.sensor)],
        );
        self.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{instrument, main_with};

    #[test]
    fn every_entry_point_wraps_its_handler() {
        let src = main_with(
            "lambda.Start(handle)\nlambda.StartHandler(h)\nlambda.StartHandlerWithContext(ctx, h)\nlambda.StartWithOptions(handle, opt)\nlambda.StartWithContext(ctx, handle)",
        );
        let (changed, out) = instrument(&Lambda, &src, "lambda");
        assert!(changed);
        insta::assert_snapshot!(out, @r"
        package main

        func main() {
        	lambda.Start(instalambda.NewHandler(handle, __instanaSensor))
        	lambda.StartHandler(instalambda.WrapHandler(h, __instanaSensor))
        	lambda.StartHandlerWithContext(ctx, instalambda.WrapHandler(h, __instanaSensor))
        	lambda.StartWithOptions(instalambda.NewHandler(handle, __instanaSensor), opt)
        	lambda.StartWithContext(ctx, instalambda.NewHandler(handle, __instanaSensor))
        }
        ");
    }

    #[test]
    fn handlers_already_using_the_sensor_are_left_alone() {
        let src = main_with(
            "lambda.Start(func() { use(__instanaSensor) })\nlambda.StartWithContext(ctx)",
        );
        let (changed, _) = instrument(&Lambda, &src, "lambda");
        assert!(!changed);
    }
}
