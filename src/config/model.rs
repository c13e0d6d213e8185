//! Intermediate representation the parser builds before motors and axes
//! are instantiated against a live [`crate::gpio::Context`].

use crate::gpio::PinId;
use crate::units::{DirectionAbs, Microstep};

#[derive(Default, Clone)]
pub(crate) struct MotorEntry {
    pub(crate) name: String,
    pub(crate) step_pin: Option<PinId>,
    pub(crate) dir_pin: Option<PinId>,
    pub(crate) steps_per_rotation: Option<u32>,
    pub(crate) direction: Option<DirectionAbs>,
    pub(crate) microstep: Option<Microstep>,
}

impl MotorEntry {
    pub(crate) fn is_complete(&self) -> bool {
        !self.name.is_empty()
            && self.step_pin.is_some()
            && self.dir_pin.is_some()
            && self.steps_per_rotation.is_some()
            && self.direction.is_some()
            && self.microstep.is_some()
    }
}

#[derive(Default, Clone)]
pub(crate) struct AxisEntry {
    pub(crate) name: String,
    pub(crate) motor_names: Vec<String>,
    pub(crate) mm_per_rotation: Option<f64>,
}

impl AxisEntry {
    pub(crate) fn is_complete(&self) -> bool {
        !self.motor_names.is_empty() && self.mm_per_rotation.map(|v| v > 0.0).unwrap_or(false)
    }
}
