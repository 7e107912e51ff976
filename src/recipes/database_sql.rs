//! `database/sql`: connections are opened through the sensor.

use super::{Activation, ArgumentInjection, Recipe, SensorPosition};
use crate::sensor;
use crate::syntax::ast::File;

const ACTIVATIONS: &[Activation] = &[
    Activation::new("Open", SensorPosition::First).renamed("SQLInstrumentAndOpen"),
];

pub struct DatabaseSql;

impl Recipe for DatabaseSql {
    fn import_path(&self) -> &'static str {
        sensor::IMPORT_PATH
    }

    fn package_name(&self) -> &str {
        sensor::PACKAGE
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
    fn open_goes_through_the_sensor() {
        let (changed, out) = instrument(
            &DatabaseSql,
            &main_with("db, err := sql.Open(\"postgres\", dsn)"),
            "sql",
        );
        assert!(changed);
        assert!(
            out.contains(
                "db, err := instana.SQLInstrumentAndOpen(__instanaSensor, \"postgres\", dsn)",
            ),
            "{out}"
        );
    }

    #[test]
    fn respects_the_local_import_name() {
        let src = main_with(
            "db, err := database.Open(\"postgres\", dsn)\nsql.Open(\"other\", dsn)",
        );
        let (_, out) = instrument(&DatabaseSql, &src, "database");
        assert!(out.contains("instana.SQLInstrumentAndOpen(__instanaSensor, \"postgres\", dsn)"));
        assert!(out.contains("\tsql.Open(\"other\", dsn)"));
    }

    #[test]
    fn other_functions_are_untouched() {
        let (changed, _) = instrument(&DatabaseSql, &main_with("sql.Register(\"x\", d)"), "sql");
        assert!(!changed);
    }
}
