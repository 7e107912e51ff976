//! `google.golang.org/grpc`: servers and client connections get chained
//! `instagrpc` interceptors ahead of the options they already have.

use super::Recipe;
use crate::syntax::ast::{Call, Expr, File};
use crate::tree::{CallSite, Cursor, VisitMut, mentions, walk_file};
use tracing::debug;

/// `(option constructor, interceptor)` pairs, stream first.
const SERVER_OPTIONS: [(&str, &str); 2] = [
    ("ChainStreamInterceptor", "StreamServerInterceptor"),
    ("ChainUnaryInterceptor", "UnaryServerInterceptor"),
];

const DIAL_OPTIONS: [(&str, &str); 2] = [
    ("WithChainStreamInterceptor", "StreamClientInterceptor"),
    ("WithChainUnaryInterceptor", "UnaryClientInterceptor"),
];

pub struct Grpc;

impl Recipe for Grpc {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instagrpc"
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

impl Pass<'_> {
    /// Inserts the interceptor options at `index`, the first argument that
    /// is an option.
    fn prepend(&self, call: &mut Call, index: usize, options: &[(&str, &str); 2]) {
        for (offset, (option, interceptor)) in options.iter().enumerate() {
            let interceptor = Expr::call(
                Expr::qualified(self.package, interceptor),
                vec![Expr::ident(self.sensor)],
            );
            call.insert_arg(
                index + offset,
                Expr::call(Expr::qualified(self.target, option), vec![interceptor]),
            );
        }
    }
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
        let (index, options) = match site.function.as_str() {
            "NewServer" => (0, &SERVER_OPTIONS),
            "Dial" | "NewClient" => (1, &DIAL_OPTIONS),
            "DialContext" => (2, &DIAL_OPTIONS),
            _ => return,
        };
        if call.args.len() < index || call.ellipsis || mentions(&call.args, self.sensor) {
            return;
        }
        debug!("adding interceptors to {}.{}", self.target, site.function);
        self.prepend(call, index, options);
        self.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{instrument, main_with};

    #[test]
    fn server_interceptors_go_first() {
        let (changed, out) = instrument(
            &Grpc,
            &main_with("s := grpc.NewServer(grpc.MaxRecvMsgSize(n))"),
            "grpc",
        );
        assert!(changed);
        assert!(
            out.contains(
                "s := grpc.NewServer(grpc.ChainStreamInterceptor(instagrpc.StreamServerInterceptor(__instanaSensor)), grpc.ChainUnaryInterceptor(instagrpc.UnaryServerInterceptor(__instanaSensor)), grpc.MaxRecvMsgSize(n))"
            ),
            "{out}"
        );
    }

    #[test]
    fn client_interceptors_follow_the_target() {
        let src = main_with(
            "a, err := grpc.Dial(addr, grpc.WithInsecure())\nb, err := grpc.DialContext(ctx, addr)",
        );
        let (_, out) = instrument(&Grpc, &src, "grpc");
        insta::assert_snapshot!(out, @r"
        package main

        func main() {
        	a, err := grpc.Dial(addr, grpc.WithChainStreamInterceptor(instagrpc.StreamClientInterceptor(__instanaSensor)), grpc.WithChainUnaryInterceptor(instagrpc.UnaryClientInterceptor(__instanaSensor)), grpc.WithInsecure())
        	b, err := grpc.DialContext(ctx, addr, grpc.WithChainStreamInterceptor(instagrpc.StreamClientInterceptor(__instanaSensor)), grpc.WithChainUnaryInterceptor(instagrpc.UnaryClientInterceptor(__instanaSensor)))
        }
        ");
    }

    #[test]
    fn calls_that_cannot_take_options_are_skipped() {
        let src = main_with("grpc.NewServer(opts...)\ngrpc.Dial()\ngrpc.DialContext(ctx)\n\
            grpc.NewServer(withSensor(__instanaSensor))");
        let (changed, _) = instrument(&Grpc, &src, "grpc");
        assert!(!changed);
    }
}
