//! Declarative configuration loader: parses `motor.conf` and materialises
//! the resulting `Stepper`/`Axis` object graph.
//!
//! Entry points mirror the teacher crate's `load_config`/`parse_config`
//! split — `load_motor_config` does file I/O, `parse_motor_config` runs
//! against an in-memory string so the parser can be tested without a
//! filesystem.

mod model;
mod parser;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::axis::Axis;
use crate::error::{ConfigError, Error, Result};
use crate::gpio;
use crate::stepper::Stepper;
use crate::task;

/// Conventional file name for the configuration this loader expects.
pub const CONFIG_FILE_NAME: &str = "motor.conf";

/// Read and parse `motor.conf` at `path`, reserving GPIO lines through
/// `gpio_ctx` and spawning a pulser task per motor through `registry`.
pub fn load_motor_config(
    path: impl AsRef<Path>,
    gpio_ctx: Arc<gpio::Context>,
    registry: Arc<task::Registry>,
) -> Result<(Vec<Arc<Stepper>>, Vec<Axis>)> {
    let text = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::Config(ConfigError::Io(e.to_string())))?;
    parse_motor_config(&text, gpio_ctx, registry)
}

/// Parse configuration text directly, without touching the filesystem.
///
/// A file with no `[motor]`/`[axis]` sections parses successfully into two
/// empty lists, matching the original's treatment of an empty config as a
/// success rather than an error.
pub fn parse_motor_config(
    text: &str,
    gpio_ctx: Arc<gpio::Context>,
    registry: Arc<task::Registry>,
) -> Result<(Vec<Arc<Stepper>>, Vec<Axis>)> {
    let (motor_entries, axis_entries) = parser::parse(text)?;

    let mut motors: Vec<Arc<Stepper>> = Vec::with_capacity(motor_entries.len());
    for entry in &motor_entries {
        tracing::debug!(motor = entry.name.as_str(), "constructing stepper from config");
        let motor = Stepper::init(
            &entry.name,
            entry.step_pin.expect("parser guarantees completeness"),
            entry.dir_pin.expect("parser guarantees completeness"),
            entry.direction.expect("parser guarantees completeness"),
            entry.microstep.expect("parser guarantees completeness"),
            entry.steps_per_rotation.expect("parser guarantees completeness"),
            gpio_ctx.clone(),
            registry.clone(),
        )?;
        motors.push(motor);
    }

    let mut axes: Vec<Axis> = Vec::with_capacity(axis_entries.len());
    for entry in &axis_entries {
        let participants: Vec<Arc<Stepper>> = entry
            .motor_names
            .iter()
            .map(|name| {
                motors
                    .iter()
                    .find(|m| m.name() == name)
                    .cloned()
                    .expect("parser validated every axis motor reference")
            })
            .collect();
        tracing::debug!(axis = entry.name.as_str(), motors = entry.motor_names.len(), "constructing axis from config");
        let axis = Axis::init(
            participants,
            entry.mm_per_rotation.expect("parser guarantees completeness"),
        )?;
        axes.push(axis);
    }

    Ok((motors, axes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::mock;

    const SAMPLE: &str = "\
[motor]
name=left
step_pin=23
dir_pin=24
steps_per_rotation=200
direction=counterclockwise
microstep=2

[motor]
name=right
step_pin=21
dir_pin=19
steps_per_rotation=200
direction=clockwise
microstep=2

[axis]
name=x-axis
motors=left,right
mm_per_rotation=40
";

    #[test]
    fn materialises_motors_and_axes_in_file_order() {
        let gpio_ctx = Arc::new(mock::context());
        let registry = Arc::new(task::Registry::new());

        let (motors, axes) = parse_motor_config(SAMPLE, gpio_ctx, registry.clone()).unwrap();

        assert_eq!(motors.iter().map(|m| m.name()).collect::<Vec<_>>(), ["left", "right"]);
        assert_eq!(axes.len(), 1);

        for motor in &motors {
            motor.destroy();
        }
    }

    #[test]
    fn empty_config_is_not_an_error() {
        let gpio_ctx = Arc::new(mock::context());
        let registry = Arc::new(task::Registry::new());

        let (motors, axes) = parse_motor_config("# nothing here\n", gpio_ctx, registry).unwrap();
        assert!(motors.is_empty());
        assert!(axes.is_empty());
    }
}
