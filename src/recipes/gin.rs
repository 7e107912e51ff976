//! `github.com/gin-gonic/gin`: engines get the `instagin` middleware.

use super::{AttachAfterBinding, Recipe};
use crate::syntax::ast::File;

pub struct Gin;

impl Recipe for Gin {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instagin"
    }

    fn instrument(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        AttachAfterBinding {
            package: self.package_name(),
            function: "AddMiddleware",
            constructors: &["Default", "New"],
        }
        .apply(unit, target, sensor)
    }
}
