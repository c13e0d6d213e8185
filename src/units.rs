//! Unit types for physical quantities.
//!
//! Provides type-safe representations of motor steps, millimetres, and the
//! absolute/relative direction pair used throughout the stepper engine and
//! axis layer, so the two senses of "direction" can't be mixed up at a call
//! site.

use core::fmt;

/// Microstep configuration of a stepper driver.
///
/// Only the five values the original driver firmware actually accepts are
/// representable; `32` is mentioned in the configuration file grammar but
/// was never wired up in the validator (see `DESIGN.md`), and this type
/// preserves that restriction rather than silently widening it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Microstep(u16);

impl Microstep {
    /// Full step.
    pub const FULL: Self = Self(1);
    /// Half step.
    pub const HALF: Self = Self(2);
    /// Quarter step.
    pub const QUARTER: Self = Self(4);
    /// Eighth step.
    pub const EIGHTH: Self = Self(8);
    /// Sixteenth step.
    pub const SIXTEENTH: Self = Self(16);

    const VALID_VALUES: [u16; 5] = [1, 2, 4, 8, 16];

    /// Validate and construct a microstep factor.
    pub fn new(value: u16) -> Option<Self> {
        Self::VALID_VALUES.contains(&value).then_some(Self(value))
    }

    /// Raw divisor value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Microstep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Absolute rotational direction: the motor's physical turning sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionAbs {
    /// Counterclockwise.
    CounterClockwise,
    /// Clockwise.
    Clockwise,
}

impl DirectionAbs {
    /// The other absolute direction.
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            DirectionAbs::Clockwise => DirectionAbs::CounterClockwise,
            DirectionAbs::CounterClockwise => DirectionAbs::Clockwise,
        }
    }

    /// GPIO line level that represents this direction.
    #[inline]
    pub const fn level(self) -> u8 {
        match self {
            DirectionAbs::CounterClockwise => 0,
            DirectionAbs::Clockwise => 1,
        }
    }
}

/// Relative rotational direction: positive/negative with respect to a
/// motor's or axis's declared "positive" sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionRel {
    /// Negative direction.
    Negative,
    /// Positive direction.
    Positive,
}

impl DirectionRel {
    /// Resolve a relative direction to an absolute one given the owner's
    /// declared positive sense.
    #[inline]
    pub fn resolve(self, pos_direction: DirectionAbs) -> DirectionAbs {
        match self {
            DirectionRel::Positive => pos_direction,
            DirectionRel::Negative => pos_direction.opposite(),
        }
    }

    /// The sign (+1/-1) this direction contributes to a step accumulator.
    #[inline]
    pub const fn sign(self) -> i32 {
        match self {
            DirectionRel::Positive => 1,
            DirectionRel::Negative => -1,
        }
    }
}

/// Microsteps per rotation, derived as `microstep_factor * full_steps_per_rotation`.
#[inline]
pub fn microsteps_per_rotation(microstep: Microstep, full_steps_per_rotation: u32) -> u32 {
    microstep.value() as u32 * full_steps_per_rotation
}

/// Convert a millimetre distance to a (possibly negative) step count, using
/// the first motor's microsteps-per-rotation as the conversion factor.
#[inline]
pub fn mm_to_steps(mm: f64, mm_per_rotation: f64, microsteps_per_rotation: u32) -> i64 {
    (mm * microsteps_per_rotation as f64 / mm_per_rotation).round() as i64
}

/// Convert a step count back to millimetres.
#[inline]
pub fn steps_to_mm(steps: i64, mm_per_rotation: f64, microsteps_per_rotation: u32) -> f64 {
    steps as f64 * mm_per_rotation / microsteps_per_rotation as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microstep_accepts_only_documented_values() {
        for v in [1, 2, 4, 8, 16] {
            assert!(Microstep::new(v).is_some(), "{v} should be valid");
        }
        for v in [0, 3, 32, 17, 256] {
            assert!(Microstep::new(v).is_none(), "{v} should be invalid");
        }
    }

    #[test]
    fn direction_rel_resolves_against_positive_sense() {
        assert_eq!(
            DirectionRel::Positive.resolve(DirectionAbs::Clockwise),
            DirectionAbs::Clockwise
        );
        assert_eq!(
            DirectionRel::Negative.resolve(DirectionAbs::Clockwise),
            DirectionAbs::CounterClockwise
        );
    }

    #[test]
    fn mm_round_trips_through_steps() {
        let microsteps_per_rev = microsteps_per_rotation(Microstep::HALF, 200);
        assert_eq!(microsteps_per_rev, 400);

        let steps = mm_to_steps(100.0, 40.0, microsteps_per_rev);
        let mm = steps_to_mm(steps, 40.0, microsteps_per_rev);
        assert!((mm - 100.0).abs() < 1e-9);
    }
}
