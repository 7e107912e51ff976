//! `github.com/Shopify/sarama`: producers and consumers are created by
//! `instasarama`, and messages sent from functions taking a
//! `context.Context` carry the span found in that context.

use super::{Activation, ArgumentInjection, Recipe, SensorPosition};
use crate::imports::{import_name, specs};
use crate::syntax::ast::{
    DeclKind, Expr, Field, File, FuncDecl, GenDecl, SpecKind, Stmt, StmtKind, UnaryOp,
};
use crate::tree::{CallSite, Cursor, Stack, VisitMut, qualified_type, walk_file};
use std::collections::HashSet;
use tracing::debug;

const ACTIVATIONS: &[Activation] = &[
    Activation::new("NewAsyncProducer", SensorPosition::Last),
    Activation::new("NewAsyncProducerFromClient", SensorPosition::Last),
    Activation::new("NewConsumer", SensorPosition::Last),
    Activation::new("NewConsumerFromClient", SensorPosition::Last),
    Activation::new("NewSyncProducer", SensorPosition::Last),
    Activation::new("NewSyncProducerFromClient", SensorPosition::Last),
    Activation::new("NewConsumerGroup", SensorPosition::Last),
    Activation::new("NewConsumerGroupFromClient", SensorPosition::Last),
];

const SYNC_PRODUCER_CONSTRUCTORS: [&str; 2] = ["NewSyncProducer", "NewSyncProducerFromClient"];

const WRAPPER: &str = "ProducerMessageWithSpanFromContext";

pub struct Sarama;

impl Recipe for Sarama {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instasarama"
    }

    fn instrument(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        let package = self.package_name();
        let mut changed = ArgumentInjection {
            package,
            activations: ACTIVATIONS,
        }
        .apply(unit, target, sensor);

        let Some(context) = context_qualifier(unit) else {
            return changed;
        };
        let mut pass = ContextPass {
            package,
            target,
            context,
            globals: HashSet::new(),
            scopes: Stack::default(),
            changed: false,
        };
        pass.globals = pass.package_level_producers(unit);
        walk_file(&mut pass, unit);
        changed |= pass.changed;
        changed
    }
}

/// How `context.Context` is spelled in `unit`: `Some(Some(alias))` for a
/// qualified import, `Some(None)` for a dot import. `None` when the file
/// cannot name it.
fn context_qualifier(unit: &File) -> Option<Option<String>> {
    let spec = specs(unit).find(|spec| spec.path == "context")?;
    match import_name(spec) {
        "_" => None,
        "." => Some(None),
        name => Some(Some(name.to_string())),
    }
}

#[derive(Default)]
struct Scope {
    /// The single usable `context.Context` parameter of the function.
    ctx: Option<String>,
    producers: HashSet<String>,
}

struct ContextPass<'a> {
    package: &'a str,
    target: &'a str,
    context: Option<String>,
    globals: HashSet<String>,
    scopes: Stack<Scope>,
    changed: bool,
}

impl ContextPass<'_> {
    fn is_context(&self, ty: &Expr) -> bool {
        match (&self.context, ty) {
            (Some(alias), ty) => ty.as_qualified() == Some((alias.as_str(), "Context")),
            (None, ty) => ty.as_ident() == Some("Context"),
        }
    }

    fn is_sync_producer(&self, ty: &Expr) -> bool {
        qualified_type(ty).is_some_and(|(package, name)| {
            (package == self.target || package == self.package) && name == "SyncProducer"
        })
    }

    fn is_sync_producer_constructor(&self, value: &Expr) -> bool {
        value.as_call().and_then(CallSite::of).is_some_and(|site| {
            site.package
                .as_deref()
                .is_some_and(|package| package == self.target || package == self.package)
                && SYNC_PRODUCER_CONSTRUCTORS.contains(&site.function.as_str())
        })
    }

    fn package_level_producers(&self, unit: &File) -> HashSet<String> {
        let mut producers = HashSet::new();
        for decl in &unit.decls {
            if let DeclKind::Gen(decl) = &decl.kind {
                self.declared_producers(decl, &mut producers);
            }
        }
        producers
    }

    fn declared_producers(&self, decl: &GenDecl, producers: &mut HashSet<String>) {
        for spec in &decl.specs {
            let SpecKind::Value(spec) = &spec.kind else {
                continue;
            };
            if spec.ty.as_ref().is_some_and(|ty| self.is_sync_producer(ty)) {
                producers.extend(spec.names.iter().cloned());
            } else if let [value] = spec.values.as_slice()
                && self.is_sync_producer_constructor(value)
                && let Some(name) = spec.names.first()
            {
                producers.insert(name.clone());
            }
        }
    }

    fn scope_for(&self, params: &[Field]) -> Scope {
        let mut contexts = params
            .iter()
            .filter(|field| self.is_context(&field.ty))
            .flat_map(|field| &field.names)
            .filter(|name| *name != "_");
        let ctx = match (contexts.next(), contexts.next()) {
            (Some(name), None) => Some(name.clone()),
            (Some(_), Some(_)) => {
                debug!("more than one context parameter, not propagating");
                None
            }
            _ => None,
        };
        let producers = params
            .iter()
            .filter(|field| self.is_sync_producer(&field.ty))
            .flat_map(|field| field.names.iter().cloned())
            .collect();
        Scope { ctx, producers }
    }

    fn is_known_producer(&self, name: &str) -> bool {
        self.globals.contains(name)
            || self.scopes.top().is_some_and(|scope| scope.producers.contains(name))
    }

    fn wrap(&self, ctx: &str, message: Expr) -> Expr {
        Expr::call(
            Expr::qualified(self.package, WRAPPER),
            vec![Expr::ident(ctx), message],
        )
    }

    fn is_wrapped(&self, expr: &Expr) -> bool {
        expr.as_call()
            .and_then(CallSite::of)
            .is_some_and(|site| site.is(self.package, WRAPPER))
    }

    fn is_message_literal(&self, expr: &Expr) -> bool {
        let Expr::Unary { op: UnaryOp::Addr, x } = expr else {
            return false;
        };
        let Expr::CompositeLit(lit) = x.as_ref() else {
            return false;
        };
        lit.ty.as_deref().and_then(Expr::as_qualified) == Some((self.target, "ProducerMessage"))
    }
}

impl VisitMut for ContextPass<'_> {
    fn enter_func_decl(&mut self, decl: &FuncDecl) {
        let scope = self.scope_for(&decl.sig.params);
        self.scopes.push(scope);
    }

    fn leave_func_decl(&mut self, _decl: &FuncDecl) {
        self.scopes.pop();
    }

    fn enter_stmt(&mut self, stmt: &Stmt, _cursor: &Cursor) {
        let mut found = HashSet::new();
        match &stmt.kind {
            StmtKind::Assign { lhs, rhs, .. } => {
                if let [value] = rhs.as_slice()
                    && self.is_sync_producer_constructor(value)
                    && let Some(name) = lhs.first().and_then(Expr::as_ident)
                    && name != "_"
                {
                    found.insert(name.to_string());
                }
            }
            StmtKind::Decl(decl) => self.declared_producers(decl, &mut found),
            _ => {}
        }
        if let Some(scope) = self.scopes.top_mut() {
            scope.producers.extend(found);
        }
    }

    fn leave_expr(&mut self, expr: &mut Expr, cursor: &Cursor) {
        let Some(ctx) = self.scopes.top().and_then(|scope| scope.ctx.clone()) else {
            return;
        };
        if self.is_message_literal(expr) {
            if cursor.inside_call(self.package, WRAPPER) {
                return;
            }
            debug!("propagating {ctx} into {}.ProducerMessage", self.target);
            let message = std::mem::replace(expr, Expr::ident("nil"));
            *expr = self.wrap(&ctx, message);
            self.changed = true;
            return;
        }
        let Expr::Call(call) = expr else {
            return;
        };
        let sends = matches!(
            call.fun.as_ref(),
            Expr::Selector { x, sel, .. }
                if sel == "SendMessage" && x.as_ident().is_some_and(|p| self.is_known_producer(p))
        );
        if !sends || call.args.len() != 1 || self.is_wrapped(&call.args[0]) {
            return;
        }
        debug!("propagating {ctx} into SendMessage");
        let message = std::mem::replace(&mut call.args[0], Expr::ident("nil"));
        call.args[0] = self.wrap(&ctx, message);
        self.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{instrument, main_with};

    #[test]
    fn constructors_take_the_sensor_last() {
        let src = main_with("_, _ = sarama.NewAsyncProducer([]string{\"localhost\"}, config)\n\
            _, _ = sarama.NewConsumerGroup(addrs, \"g1\", config)");
        let (changed, out) = instrument(&Sarama, &src, "sarama");
        assert!(changed);
        assert!(
            out.contains(
                "instasarama.NewAsyncProducer([]string{\"localhost\"}, config, __instanaSensor)",
            ),
            "{out}"
        );
        assert!(
            out.contains("instasarama.NewConsumerGroup(addrs, \"g1\", config, __instanaSensor)"),
            "{out}"
        );
    }

    #[test]
    fn messages_pick_up_the_context_parameter() {
        let src = r#"package main

import (
	"context"

	"github.com/Shopify/sarama"
)

func send(ctx context.Context, producer sarama.SyncProducer, msg *sarama.ProducerMessage) {
	m := &sarama.ProducerMessage{Topic: "t"}
	producer.SendMessage(msg)
	producer.SendMessage(&sarama.ProducerMessage{Topic: "u"})
	use(m)
}
"#;
        let (changed, out) = instrument(&Sarama, src, "sarama");
        assert!(changed);
        insta::assert_snapshot!(out, @r#"
        package main

        import (
        	"context"

        	"github.com/Shopify/sarama"
        )

        func send(ctx context.Context, producer sarama.SyncProducer, msg *sarama.ProducerMessage) {
        	m := instasarama.ProducerMessageWithSpanFromContext(ctx, &sarama.ProducerMessage{Topic: "t"})
        	producer.SendMessage(instasarama.ProducerMessageWithSpanFromContext(ctx, msg))
        	producer.SendMessage(instasarama.ProducerMessageWithSpanFromContext(ctx, &sarama.ProducerMessage{Topic: "u"}))
        	use(m)
        }
        "#);
    }

    #[test]
    fn producers_bound_from_constructors_are_known() {
        let src = r#"package main

import "context"

func run(ctx context.Context) {
	p, err := sarama.NewSyncProducer(addrs, config)
	check(err)
	p.SendMessage(msg)
	other.SendMessage(msg)
}
"#;
        let (_, out) = instrument(&Sarama, src, "sarama");
        assert!(
            out.contains("p, err := instasarama.NewSyncProducer(addrs, config, __instanaSensor)"),
            "{out}"
        );
        assert!(
            out.contains("p.SendMessage(instasarama.ProducerMessageWithSpanFromContext(ctx, msg))"),
            "{out}"
        );
        assert!(out.contains("\tother.SendMessage(msg)\n"), "{out}");
    }

    #[test]
    fn package_level_producers_are_known() {
        let src = "package main\n\nimport \"context\"\n\nvar producer sarama.SyncProducer\n\nfunc run(ctx context.Context) {\n\tproducer.SendMessage(msg)\n}\n";
        let (changed, out) = instrument(&Sarama, src, "sarama");
        assert!(changed);
        assert!(
            out.contains(
                "producer.SendMessage(instasarama.ProducerMessageWithSpanFromContext(ctx, msg))",
            ),
            "{out}"
        );
    }

    #[test]
    fn ambiguous_or_missing_contexts_disable_wrapping() {
        let two = "package main\n\nimport \"context\"\n\nfunc a(ctx, other context.Context) {\n\tm := &sarama.ProducerMessage{}\n\tuse(m)\n}\n";
        assert!(!instrument(&Sarama, two, "sarama").0);

        let blank = "package main\n\nimport \"context\"\n\nfunc a(_ context.Context) {\n\tm := &sarama.ProducerMessage{}\n\tuse(m)\n}\n";
        assert!(!instrument(&Sarama, blank, "sarama").0);

        let unimported = "package main\n\nfunc a(ctx context.Context) {\n\tm := &sarama.ProducerMessage{}\n\tuse(m)\n}\n";
        assert!(!instrument(&Sarama, unimported, "sarama").0);
    }

    #[test]
    fn dot_imported_context_is_recognised() {
        let src = "package main\n\nimport . \"context\"\n\nfunc a(c Context) {\n\tm := &sarama.ProducerMessage{}\n\tuse(m)\n}\n";
        let (_, out) = instrument(&Sarama, src, "sarama");
        assert!(
            out.contains(
                "m := instasarama.ProducerMessageWithSpanFromContext(c, &sarama.ProducerMessage{})",
            ),
            "{out}"
        );
    }
}
