//! Process-wide context bundling the three pieces of global state the rest
//! of the core needs: the GPIO façade, the task registry, and the engine's
//! speed ceiling. Hoisting these into one explicit value (rather than
//! process-wide statics) is the Design Note realisation for "hoist globals
//! into an explicit context."
//!
//! Construct one `Context` at process startup, load `motor.conf` through
//! it, and hand the resulting motors/axes to a supervisor.

use std::sync::Arc;

use crate::axis::Axis;
use crate::config;
use crate::error::Result;
use crate::gpio;
use crate::stepper::{EngineLimits, Stepper};
use crate::task;

/// Bundles the GPIO façade, task registry, and engine limits that every
/// `Stepper`/`Axis` constructed through this context shares.
pub struct Context {
    gpio: Arc<gpio::Context>,
    tasks: Arc<task::Registry>,
    limits: EngineLimits,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Build a context with the default speed ceiling
    /// ([`EngineLimits::default`]). GPIO controllers are opened lazily on
    /// first pin request, not here.
    pub fn new() -> Self {
        Self { gpio: Arc::new(gpio::Context::new()), tasks: Arc::new(task::Registry::new()), limits: EngineLimits::default() }
    }

    /// Build a context with a caller-supplied speed ceiling.
    pub fn with_limits(limits: EngineLimits) -> Self {
        Self { gpio: Arc::new(gpio::Context::new()), tasks: Arc::new(task::Registry::new()), limits }
    }

    /// The engine's configured speed ceiling.
    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// The shared GPIO façade.
    pub fn gpio(&self) -> &Arc<gpio::Context> {
        &self.gpio
    }

    /// The shared task registry.
    pub fn tasks(&self) -> &Arc<task::Registry> {
        &self.tasks
    }

    /// Load `motor.conf` at `path`, constructing every declared motor and
    /// axis against this context's GPIO façade and task registry.
    pub fn load_config(&self, path: impl AsRef<std::path::Path>) -> Result<(Vec<Arc<Stepper>>, Vec<Axis>)> {
        config::load_motor_config(path, self.gpio.clone(), self.tasks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_engine_default() {
        let ctx = Context::new();
        assert_eq!(ctx.limits().max_pulses_per_second, EngineLimits::default().max_pulses_per_second);
    }

    #[test]
    fn with_limits_overrides_default() {
        let ctx = Context::with_limits(EngineLimits { max_pulses_per_second: 1000.0 });
        assert_eq!(ctx.limits().max_pulses_per_second, 1000.0);
    }
}
