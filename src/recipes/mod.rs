//! Per-library rewrite recipes.
//!
//! A recipe recognises the call sites of one library inside a file and
//! rewrites them to go through the matching instrumentation library. Two
//! shared strategies cover most of them: [`ArgumentInjection`] splices the
//! sensor into constructor calls, [`AttachAfterBinding`] adds a statement
//! after the variable a constructor result is bound to. The rest wrap
//! arguments or rewrite types on their own.

mod attach;
mod awssdk;
mod database_sql;
mod echo;
mod gin;
mod grpc;
mod httprouter;
mod inject;
mod lambda;
mod mongo;
mod mux;
mod net_http;
mod sarama;

use crate::imports::local_name;
use crate::registry::Registry;
use crate::syntax::ast::File;
use std::sync::Arc;

pub use attach::AttachAfterBinding;
pub use inject::{Activation, ArgumentInjection, SensorPosition};

pub trait Recipe: Send + Sync {
    /// Import path of the instrumentation library rewritten code calls into.
    fn import_path(&self) -> &'static str;

    /// Name the instrumentation library is imported under.
    fn package_name(&self) -> &str {
        local_name(self.import_path())
    }

    /// Rewrites the call sites of the library imported as `target` in `unit`
    /// to use the handle variable `sensor`. Returns whether anything changed.
    /// Running it again on its own output changes nothing.
    fn instrument(&self, unit: &mut File, target: &str, sensor: &str) -> bool;
}

pub fn register_defaults(registry: &Registry) {
    registry.register("database/sql", Arc::new(database_sql::DatabaseSql));
    registry.register("net/http", Arc::new(net_http::NetHttp));
    registry.register("go.mongodb.org/mongo-driver/mongo", Arc::new(mongo::Mongo));
    registry.register("github.com/aws/aws-sdk-go/aws/session", Arc::new(awssdk::AwsSdk));
    registry.register("github.com/labstack/echo/v4", Arc::new(echo::Echo));
    registry.register("github.com/aws/aws-lambda-go/lambda", Arc::new(lambda::Lambda));
    registry.register("github.com/Shopify/sarama", Arc::new(sarama::Sarama));
    registry.register("google.golang.org/grpc", Arc::new(grpc::Grpc));
    registry.register("github.com/julienschmidt/httprouter", Arc::new(httprouter::HttpRouter));
    registry.register("github.com/gorilla/mux", Arc::new(mux::Mux));
    registry.register("github.com/gin-gonic/gin", Arc::new(gin::Gin));
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Recipe;
    use crate::syntax::{parse_file, print_file};

    pub const SENSOR: &str = "__instanaSensor";

    /// Instruments `src` with `recipe`, checks that a second pass is a
    /// no-op and returns whether the first pass changed anything together
    /// with the printed result.
    pub fn instrument(recipe: &dyn Recipe, src: &str, target: &str) -> (bool, String) {
        let mut file = parse_file(src).unwrap();
        let changed = recipe.instrument(&mut file, target, SENSOR);
        let first = print_file(&file);
        assert!(!recipe.instrument(&mut file, target, SENSOR), "second pass changed:\n{first}");
        assert_eq!(print_file(&file), first);
        (changed, first)
    }

    /// Body of `func main` wrapped in a file, for recipes that only look at
    /// statements.
    pub fn main_with(body: &str) -> String {
        let body: String = body.lines().map(|line| format!("\t{line}\n")).collect();
        format!("package main\n\nfunc main() {{\n{body}}}\n")
    }
}
