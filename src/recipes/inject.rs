use crate::syntax::ast::{Call, Expr, File};
use crate::tree::{CallSite, Cursor, VisitMut, walk_file};
use tracing::debug;

/// Where the sensor goes in the rewritten argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorPosition {
    First,
    Last,
    /// Inserted at this index, later arguments shift right. Indices past
    /// the end append.
    At(usize),
}

/// A function of the target library that gets rewritten.
#[derive(Debug, Clone, Copy)]
pub struct Activation {
    pub function: &'static str,
    pub position: SensorPosition,
    /// Name of the replacement in the instrumentation library when it
    /// differs from `function`.
    pub rename: Option<&'static str>,
}

impl Activation {
    pub const fn new(function: &'static str, position: SensorPosition) -> Self {
        Self {
            function,
            position,
            rename: None,
        }
    }

    pub const fn renamed(self, replacement: &'static str) -> Self {
        Self {
            rename: Some(replacement),
            ..self
        }
    }
}

/// Turns `target.Fn(args...)` into `package.Fn(args..., sensor)` for every
/// activating `Fn`, with the sensor at the activation's position.
#[derive(Debug)]
pub struct ArgumentInjection<'a> {
    pub package: &'a str,
    pub activations: &'a [Activation],
}

impl ArgumentInjection<'_> {
    pub fn apply(&self, unit: &mut File, target: &str, sensor: &str) -> bool {
        let mut pass = Pass {
            injection: self,
            target,
            sensor,
            changed: false,
        };
        walk_file(&mut pass, unit);
        pass.changed
    }

    fn inject(&self, call: &mut Call, activation: &Activation, sensor: &str) -> bool {
        if call.args.iter().any(|arg| arg.as_ident() == Some(sensor)) {
            return false;
        }
        let index = match activation.position {
            SensorPosition::First => 0,
            SensorPosition::Last => call.args.len(),
            SensorPosition::At(index) => index.min(call.args.len()),
        };
        // f(xs...) cannot take another trailing argument
        if call.ellipsis && index == call.args.len() {
            return false;
        }
        let function = activation.rename.unwrap_or(activation.function);
        *call.fun = Expr::qualified(self.package, function);
        call.insert_arg(index, Expr::ident(sensor));
        true
    }
}

struct Pass<'a> {
    injection: &'a ArgumentInjection<'a>,
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
        let Some(activation) = self
            .injection
            .activations
            .iter()
            .find(|activation| activation.function == site.function)
        else {
            return;
        };
        if self.injection.inject(call, activation, self.sensor) {
            debug!("{}.{} now calls {}", self.target, site.function, self.injection.package);
            self.changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::testing::SENSOR;
    use crate::syntax::{parse_file, print_file};

    const ACTIVATIONS: &[Activation] = &[
        Activation::new("First", SensorPosition::First),
        Activation::new("Last", SensorPosition::Last),
        Activation::new("Second", SensorPosition::At(1)),
        Activation::new("Open", SensorPosition::First).renamed("WrappedOpen"),
    ];

    fn inject(call: &str) -> (bool, String) {
        let mut file = parse_file(&format!("package p\n\nvar v = {call}\n")).unwrap();
        let injection = ArgumentInjection {
            package: "insta",
            activations: ACTIVATIONS,
        };
        let changed = injection.apply(&mut file, "lib", SENSOR);
        let printed = print_file(&file);
        let value = printed.trim_end().trim_start_matches("package p\n\nvar v = ");
        (changed, value.to_string())
    }

    #[test]
    fn sensor_lands_at_the_configured_position() {
        assert_eq!(inject("lib.First(a, b)").1, "insta.First(__instanaSensor, a, b)");
        assert_eq!(inject("lib.Last(a, b)").1, "insta.Last(a, b, __instanaSensor)");
        assert_eq!(inject("lib.Second(a, b)").1, "insta.Second(a, __instanaSensor, b)");
        assert_eq!(inject("lib.Second()").1, "insta.Second(__instanaSensor)");
        assert_eq!(inject("lib.Open(d, dsn)").1, "insta.WrappedOpen(__instanaSensor, d, dsn)");
    }

    #[test]
    fn other_packages_and_functions_are_left_alone() {
        assert_eq!(inject("other.First(a)"), (false, "other.First(a)".to_string()));
        assert_eq!(inject("lib.Unknown(a)"), (false, "lib.Unknown(a)".to_string()));
    }

    #[test]
    fn calls_already_passing_the_sensor_are_skipped() {
        assert_eq!(
            inject("lib.Last(a, __instanaSensor)"),
            (false, "lib.Last(a, __instanaSensor)".to_string())
        );
    }

    #[test]
    fn spread_arguments_never_get_a_trailing_sensor() {
        assert!(!inject("lib.Last(xs...)").0);
        assert_eq!(inject("lib.Second(a, xs...)").1, "insta.Second(a, __instanaSensor, xs...)");
    }

    #[test]
    fn nested_calls_are_rewritten_inside_out() {
        assert_eq!(
            inject("lib.First(lib.Last(a))").1,
            "insta.First(__instanaSensor, insta.Last(a, __instanaSensor))"
        );
    }
}
