//! `github.com/labstack/echo/v4`: engines are created by `instaecho`.

use super::{Activation, ArgumentInjection, Recipe, SensorPosition};
use crate::syntax::ast::File;

const ACTIVATIONS: &[Activation] = &[Activation::new("New", SensorPosition::First)];

pub struct Echo;

impl Recipe for Echo {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instaecho"
    }

    fn instrument(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        ArgumentInjection {
            package: self.package_name(),
            activations: ACTIVATIONS,
        }
        .apply(unit, target, sensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::{instrument, main_with};

    #[test]
    fn new_engine_is_instrumented() {
        let (changed, out) = instrument(
            &Echo,
            &main_with("e := echo.New()\ne.GET(\"/\", h)"),
            "echo",
        );
        assert!(changed);
        assert!(
            out.contains("\te := instaecho.New(__instanaSensor)\n\te.GET(\"/\", h)\n"),
            "{out}"
        );
    }

    #[test]
    fn aliased_import_is_matched_by_its_alias() {
        let (changed, out) = instrument(
            &Echo,
            &main_with("e := web.New()\nx := echo.New()"),
            "web",
        );
        assert!(changed);
        assert!(out.contains("x := echo.New()"), "{out}");
    }
}
