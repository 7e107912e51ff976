//! `net/http`: handlers registered on the default mux are traced, and
//! `http.Client` literals get a tracing transport.

use super::Recipe;
use crate::sensor;
use crate::syntax::ast::{Call, CompositeLit, Element, Expr, File};
use crate::tree::{CallSite, Cursor, VisitMut, walk_file};
use tracing::debug;

pub struct NetHttp;

impl Recipe for NetHttp {
    fn import_path(&self) -> &'static str {
        sensor::IMPORT_PATH
    }

    fn package_name(&self) -> &str {
        sensor::PACKAGE
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
    fn is_call_to(&self, expr: &Expr, package: &str, function: &str) -> bool {
        expr.as_call()
            .and_then(CallSite::of)
            .is_some_and(|site| site.is(package, function))
    }

    fn handler(&self, call: &mut Call) -> bool {
        let Some(site) = CallSite::of(call) else {
            return false;
        };
        if site.package.as_deref() != Some(self.target) || call.args.len() != 2 {
            return false;
        }
        match site.function.as_str() {
            "HandleFunc" => {
                if self.is_call_to(&call.args[1], self.package, "TracingHandlerFunc") {
                    return false;
                }
                debug!("tracing {}.HandleFunc handler", self.target);
                let handler = std::mem::replace(&mut call.args[1], Expr::ident("nil"));
                call.args[1] = self.tracing_handler(&call.args[0], handler);
                true
            }
            "Handle" => {
                // TracingHandlerFunc returns a func, so the registration
                // switches over to HandleFunc
                debug!("tracing {}.Handle handler", self.target);
                let handler = std::mem::replace(&mut call.args[1], Expr::ident("nil"));
                let handler = match handler {
                    x @ (Expr::Unary { .. } | Expr::Binary { .. } | Expr::Star(_)) => {
                        Expr::Paren(Box::new(x))
                    }
                    x => x,
                };
                *call.fun = Expr::qualified(self.target, "HandleFunc");
                call.args[1] = self.tracing_handler(
                    &call.args[0],
                    Expr::selector(handler, "ServeHTTP"),
                );
                true
            }
            _ => false,
        }
    }

    fn tracing_handler(&self, pattern: &Expr, handler: Expr) -> Expr {
        Expr::call(
            Expr::qualified(self.package, "TracingHandlerFunc"),
            vec![Expr::ident(self.sensor), pattern.clone(), handler],
        )
    }

    fn client(&self, lit: &mut CompositeLit) -> bool {
        if lit.ty.as_deref().and_then(Expr::as_qualified) != Some((self.target, "Client")) {
            return false;
        }
        // positional literals cannot take another field
        if lit.elts.iter().any(|elt| !matches!(elt.value, Expr::KeyValue { .. })) {
            return false;
        }
        let transport = lit.elts.iter_mut().find_map(|elt| match &mut elt.value {
            Expr::KeyValue { key, value } if key.as_ident() == Some("Transport") => Some(value),
            _ => None,
        });
        match transport {
            Some(value) => {
                if self.is_call_to(value, self.package, "RoundTripper") {
                    return false;
                }
                debug!("wrapping {}.Client transport", self.target);
                let previous = std::mem::replace(value.as_mut(), Expr::ident("nil"));
                **value = self.round_tripper(previous);
            }
            None => {
                debug!("adding a transport to {}.Client", self.target);
                let mut elt = Element::new(Expr::KeyValue {
                    key: Box::new(Expr::ident("Transport")),
                    value: Box::new(self.round_tripper(Expr::ident("nil"))),
                });
                elt.newline = lit.close_break || lit.elts.last().is_some_and(|last| last.newline);
                lit.elts.push(elt);
            }
        }
        true
    }

    fn round_tripper(&self, transport: Expr) -> Expr {
        Expr::call(
            Expr::qualified(self.package, "RoundTripper"),
            vec![Expr::ident(self.sensor), transport],
        )
    }
}

impl VisitMut for Pass<'_> {
    fn leave_expr(&mut self, expr: &mut Expr, _cursor: &Cursor) {
        let changed = match expr {
            Expr::Call(call) => self.handler(call),
            Expr::CompositeLit(lit) => self.client(lit),
            _ => false,
        };
        self.changed |= changed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{instrument, main_with};

    #[test]
    fn handle_func_handlers_are_traced() {
        let (changed, out) = instrument(
            &NetHttp,
            &main_with("http.HandleFunc(\"/\", index)"),
            "http",
        );
        assert!(changed);
        assert!(
            out.contains(
                "http.HandleFunc(\"/\", instana.TracingHandlerFunc(__instanaSensor, \"/\", index))",
            ),
            "{out}"
        );
    }

    #[test]
    fn handle_becomes_handle_func_over_serve_http() {
        let src = main_with("http.Handle(\"/a\", h)\nhttp.Handle(\"/b\", &handler{})");
        let (_, out) = instrument(&NetHttp, &src, "http");
        insta::assert_snapshot!(out, @r#"
        package main

        func main() {
        	http.HandleFunc("/a", instana.TracingHandlerFunc(__instanaSensor, "/a", h.ServeHTTP))
        	http.HandleFunc("/b", instana.TracingHandlerFunc(__instanaSensor, "/b", (&handler{}).ServeHTTP))
        }
        "#);
    }

    #[test]
    fn client_literals_get_a_transport() {
        let src = main_with("c := &http.Client{}\nd := http.Client{Timeout: t}");
        let (changed, out) = instrument(&NetHttp, &src, "http");
        assert!(changed);
        assert!(
            out.contains(
                "c := &http.Client{Transport: instana.RoundTripper(__instanaSensor, nil)}",
            ),
            "{out}"
        );
        assert!(
            out.contains(
                "d := http.Client{Timeout: t, Transport: instana.RoundTripper(__instanaSensor, nil)}",
            ),
            "{out}"
        );
    }

    #[test]
    fn existing_transport_is_wrapped() {
        let src = "package main\n\nvar c = &http.Client{\n\tTimeout:   t,\n\tTransport: tr,\n}\n";
        let (_, out) = instrument(&NetHttp, src, "http");
        insta::assert_snapshot!(out, @r"
        package main

        var c = &http.Client{
        	Timeout:   t,
        	Transport: instana.RoundTripper(__instanaSensor, tr),
        }
        ");
    }

    #[test]
    fn multi_line_client_keeps_one_field_per_line() {
        let src = "package main\n\nvar c = &http.Client{\n\tTimeout: t,\n}\n";
        let (_, out) = instrument(&NetHttp, src, "http");
        insta::assert_snapshot!(out, @r"
        package main

        var c = &http.Client{
        	Timeout:   t,
        	Transport: instana.RoundTripper(__instanaSensor, nil),
        }
        ");
    }

    #[test]
    fn other_muxes_and_types_are_ignored() {
        let src = main_with(
            "mux.HandleFunc(\"/\", index)\nr := http.Request{}\nhttp.HandleFunc(\"/\")",
        );
        let (changed, _) = instrument(&NetHttp, &src, "http");
        assert!(!changed);
    }
}
