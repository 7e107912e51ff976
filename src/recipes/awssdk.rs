//! `github.com/aws/aws-sdk-go/aws/session`: sessions are created by `instaawssdk`.

use super::{Activation, ArgumentInjection, Recipe, SensorPosition};
use crate::syntax::ast::File;

const ACTIVATIONS: &[Activation] = &[
    Activation::new("New", SensorPosition::First),
    Activation::new("NewSession", SensorPosition::First),
    Activation::new("NewSessionWithOptions", SensorPosition::First),
];

pub struct AwsSdk;

impl Recipe for AwsSdk {
    fn import_path(&self) -> &'static str {
        "github.com/instana/go-sensor/instrumentation/instaawssdk"
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
    fn session_constructors_take_the_sensor_first() {
        let src = main_with(
            "a := session.New()\nb, err := session.NewSession(cfg)\nc, err := session.NewSessionWithOptions(session.Options{Profile: \"p\"})\nsession.Must(b, err)",
        );
        let (changed, out) = instrument(&AwsSdk, &src, "session");
        assert!(changed);
        insta::assert_snapshot!(out, @r#"
        package main

        func main() {
        	a := instaawssdk.New(__instanaSensor)
        	b, err := instaawssdk.NewSession(__instanaSensor, cfg)
        	c, err := instaawssdk.NewSessionWithOptions(__instanaSensor, session.Options{Profile: "p"})
        	session.Must(b, err)
        }
        "#);
    }
}
