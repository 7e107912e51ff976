//! `go.mongodb.org/mongo-driver/mongo`: clients are created by `instamongo`.

use super::{Activation, ArgumentInjection, Recipe, SensorPosition};
use crate::syntax::ast::File;

const ACTIVATIONS: &[Activation] = &[
    Activation::new("Connect", SensorPosition::At(1)),
    Activation::new("NewClient", SensorPosition::First),
];

pub struct Mongo;

impl Recipe for Mongo {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instamongo"
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
    fn connect_takes_the_sensor_after_the_context() {
        let src = main_with("client, err := mongo.Connect(ctx, options.Client().ApplyURI(uri))\n\
            c, err := mongo.NewClient(opts)");
        let (changed, out) = instrument(&Mongo, &src, "mongo");
        assert!(changed);
        assert!(
            out.contains(
                "instamongo.Connect(ctx, __instanaSensor, options.Client().ApplyURI(uri))",
            ),
            "{out}"
        );
        assert!(out.contains("instamongo.NewClient(__instanaSensor, opts)"), "{out}");
    }

    #[test]
    fn connect_with_spread_options_keeps_the_spread_last() {
        let (_, out) = instrument(&Mongo, &main_with("mongo.Connect(ctx, opts...)"), "mongo");
        assert!(out.contains("instamongo.Connect(ctx, __instanaSensor, opts...)"), "{out}");
    }
}
