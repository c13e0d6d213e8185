//! The transient move request shared between participating motors and the
//! worker driving them.
//!
//! `RequestData` (motor list, bulk line handle, total step count) is set
//! once at creation and never mutated, so the driving worker reads it
//! without taking any lock during the hot pulse loop — only
//! `Teardown` is behind a mutex, used purely to make "register as the
//! waiting motor" and "tear down and notify" atomic with respect to each
//! other (see `DESIGN.md`, "shared-mutex lifetime").

use std::sync::{Arc, Mutex};

use crate::gpio;

use super::Stepper;

pub(crate) struct RequestData {
    pub(crate) motors: Vec<Arc<Stepper>>,
    pub(crate) bulk: Box<dyn gpio::BulkSink>,
    pub(crate) total_steps: u32,
}

pub(crate) struct Teardown {
    /// The motor whose caller is blocked in `wait`, if any. Only one slot:
    /// if two callers `wait()` on two different participants of the same
    /// request, the second registration silently displaces the first,
    /// which then never wakes — a limitation carried over from the
    /// original implementation, not something this crate fixes.
    pub(crate) motor_waiting: Option<Arc<Stepper>>,
}

pub(crate) struct SharedRequest {
    pub(crate) data: RequestData,
    pub(crate) teardown: Mutex<Teardown>,
}

impl SharedRequest {
    pub(crate) fn new(motors: Vec<Arc<Stepper>>, bulk: Box<dyn gpio::BulkSink>, total_steps: u32) -> Arc<Self> {
        Arc::new(Self {
            data: RequestData { motors, bulk, total_steps },
            teardown: Mutex::new(Teardown { motor_waiting: None }),
        })
    }
}
