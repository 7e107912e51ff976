//! `github.com/gorilla/mux`: routers get the `instamux` middleware.

use super::{AttachAfterBinding, Recipe};
use crate::syntax::ast::File;

pub struct Mux;

impl Recipe for Mux {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instamux"
    }

    fn instrument(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        AttachAfterBinding {
            package: self.package_name(),
            function: "AddMiddleware",
            constructors: &["NewRouter"],
        }
        .apply(unit, target, sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{instrument, main_with};

    #[test]
    fn new_routers_get_the_middleware() {
        let src = main_with(
            "r := mux.NewRouter()\nr.HandleFunc(\"/\", index)\nhttp.ListenAndServe(\":8080\", r)",
        );
        let (changed, out) = instrument(&Mux, &src, "mux");
        assert!(changed);
        insta::assert_snapshot!(out, @r#"
        package main

        func main() {
        	r := mux.NewRouter()
        	instamux.AddMiddleware(__instanaSensor, r)
        	r.HandleFunc("/", index)
        	http.ListenAndServe(":8080", r)
        }
        "#);
    }

    #[test]
    fn sub_routers_are_left_alone() {
        let (changed, _) = instrument(
            &Mux,
            &main_with("s := r.PathPrefix(\"/api\").Subrouter()"),
            "mux",
        );
        assert!(!changed);
    }
}
