//! The axis layer: millimetre/second commands over a group of motors that
//! move together.
//!
//! Thin on top of [`stepper::Stepper`] — unit conversion and the
//! negative-move direction latch are the only state this layer owns.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::stepper::{EngineLimits, Stepper};
use crate::units::{self, DirectionRel};

/// A group of 1..=8 motors moved together along one linear dimension.
pub struct Axis {
    motors: Vec<Arc<Stepper>>,
    mm_per_rotation: f64,
    position: f64,
    speed_mm_per_s: f64,
    /// The relative direction this axis started in, restored once a
    /// negative move's latch is cleared by the next positive move. Fixes
    /// the original's hard-coded "restore to positive" (see `DESIGN.md`).
    initial_direction: DirectionRel,
    /// Set by a negative move; cleared (restoring `initial_direction`) by
    /// the next positive move.
    reset_direction: Option<DirectionRel>,
}

impl Axis {
    /// Group `motors` (1..=8, sharing the first motor's microstep
    /// configuration) into one axis with the given mm-per-rotation.
    pub fn init(motors: Vec<Arc<Stepper>>, mm_per_rotation: f64) -> Result<Self> {
        if motors.is_empty() || motors.len() > 8 {
            return Err(Error::InvalidArgument("axis motor count must be 1..=8"));
        }
        if !(mm_per_rotation > 0.0) {
            return Err(Error::InvalidArgument("mm_per_rotation must be positive"));
        }

        let initial_direction = motors[0].direction_rel();

        Ok(Self {
            motors,
            mm_per_rotation,
            position: 0.0,
            speed_mm_per_s: 0.0,
            initial_direction,
            reset_direction: None,
        })
    }

    fn microsteps_per_rotation(&self) -> u32 {
        self.motors[0].microsteps_per_rotation()
    }

    /// Set this axis's speed in mm/s, converting through the first motor's
    /// microstep configuration and fanning out to every participant.
    pub fn set_speed(&mut self, mm_per_second: f64, limits: &EngineLimits) -> Result<()> {
        if !(mm_per_second > 0.0) {
            return Err(Error::InvalidArgument("speed must be positive"));
        }
        let pps = mm_per_second * self.microsteps_per_rotation() as f64 / self.mm_per_rotation;
        let speeds = vec![pps; self.motors.len()];
        Stepper::set_speed_multiple(&self.motors, &speeds, limits)?;
        self.speed_mm_per_s = mm_per_second;
        Ok(())
    }

    /// Set every participating motor's relative direction.
    pub fn set_direction(&self, direction: DirectionRel) -> Result<()> {
        for motor in &self.motors {
            motor.set_direction_rel(direction)?;
        }
        Ok(())
    }

    /// Move this axis by a signed distance in millimetres. Zero is a no-op.
    /// A negative distance flips direction and sets the latch; the next
    /// positive move restores the axis's original relative direction
    /// (rather than a hard-coded positive sense).
    pub fn move_by(&mut self, distance_mm: f64) -> Result<()> {
        if distance_mm == 0.0 {
            return Ok(());
        }

        if distance_mm > 0.0 {
            if self.reset_direction.take().is_some() {
                self.set_direction(self.initial_direction)?;
            }
        } else {
            self.set_direction(DirectionRel::Negative)?;
            self.reset_direction = Some(DirectionRel::Negative);
        }

        let steps = units::mm_to_steps(distance_mm.abs(), self.mm_per_rotation, self.microsteps_per_rotation());
        let n_steps = u32::try_from(steps).map_err(|_| Error::InvalidArgument("move distance out of range"))?;
        Stepper::step_multiple(&self.motors, n_steps)?;
        Ok(())
    }

    /// Block until the first motor's in-flight move completes.
    pub fn wait(&self) {
        self.motors[0].wait();
    }

    /// Flag the in-flight move to stop, blocking until torn down.
    pub fn stop(&self) {
        self.motors[0].stop();
    }

    /// Whether this axis is idle.
    pub fn ready(&self) -> bool {
        self.motors[0].ready()
    }

    /// Read the first motor's step accumulator, convert to millimetres,
    /// and update the cached position.
    pub fn position(&mut self) -> f64 {
        let steps = self.motors[0].get_steps();
        self.position = units::steps_to_mm(steps as i64, self.mm_per_rotation, self.microsteps_per_rotation());
        self.position
    }

    /// Last speed accepted by `set_speed`, in mm/s.
    pub fn speed(&self) -> f64 {
        self.speed_mm_per_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{self, PinId};
    use crate::task;
    use crate::units::{DirectionAbs, Microstep};

    fn harness() -> (Arc<gpio::Context>, Arc<task::Registry>) {
        (Arc::new(gpio::mock::context()), Arc::new(task::Registry::new()))
    }

    fn make_motor(name: &str, gpio_ctx: &Arc<gpio::Context>, registry: &Arc<task::Registry>) -> Arc<Stepper> {
        Stepper::init(
            name,
            PinId::Pin23,
            PinId::Pin24,
            DirectionAbs::Clockwise,
            Microstep::new(2).unwrap(),
            200,
            gpio_ctx.clone(),
            registry.clone(),
        )
        .unwrap()
    }

    #[test]
    fn negative_move_then_positive_restores_original_direction() {
        let (gpio_ctx, registry) = harness();
        let m1 = make_motor("m1", &gpio_ctx, &registry);
        let m2 = make_motor("m2", &gpio_ctx, &registry);
        let mut axis = Axis::init(vec![m1.clone(), m2.clone()], 40.0).unwrap();

        axis.set_speed(20.0, &EngineLimits::default()).unwrap();
        axis.move_by(-100.0).unwrap();
        axis.wait();

        assert!((axis.position() - -100.0).abs() < 1.0);
        assert_eq!(m1.direction_rel(), DirectionRel::Negative);

        axis.move_by(100.0).unwrap();
        axis.wait();

        assert!(axis.position().abs() < 1.0);
        assert_eq!(m1.direction_rel(), axis.initial_direction);

        m1.destroy();
        m2.destroy();
    }

    #[test]
    fn latch_restores_axis_original_sense_not_hardcoded_positive() {
        let (gpio_ctx, registry) = harness();
        let m1 = make_motor("m1", &gpio_ctx, &registry);
        m1.set_direction_abs(DirectionAbs::CounterClockwise).unwrap();
        let axis = Axis::init(vec![m1.clone()], 40.0).unwrap();

        assert_eq!(axis.initial_direction, DirectionRel::Negative);
        m1.destroy();
    }

    #[test]
    fn zero_distance_move_is_a_no_op() {
        let (gpio_ctx, registry) = harness();
        let m1 = make_motor("m1", &gpio_ctx, &registry);
        let mut axis = Axis::init(vec![m1.clone()], 40.0).unwrap();
        axis.set_speed(20.0, &EngineLimits::default()).unwrap();

        axis.move_by(0.0).unwrap();
        assert!(axis.ready());
        assert_eq!(axis.position(), 0.0);
        m1.destroy();
    }
}
