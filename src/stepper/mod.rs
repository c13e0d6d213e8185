//! The stepper engine: one motor, one dedicated pulser thread, driven
//! through fixed-speed square-wave pulse trains.
//!
//! This is the component the rest of the crate is built around. Each
//! [`Stepper`] owns a DIR line, a claimed (not-yet-requested) STEP line,
//! and a worker thread parked on a condition variable. `step_multiple`
//! groups several motors' STEP lines into one atomic [`gpio::Bulk`] write
//! so they pulse in lockstep, matching the original's `gpiod_line_bulk`
//! based design (see `DESIGN.md`).

mod request;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::{Error, Result};
use crate::gpio;
use crate::task;
use crate::units::{DirectionAbs, DirectionRel};

use request::SharedRequest;

/// Upper bound on pulse rate, guarding against both electrical limits of
/// real drivers and runaway configuration values.
///
/// The original implementation silently clamped requested speeds to an
/// internal ceiling; this rewrite instead rejects the call, so a caller
/// asking for more than the hardware can do finds out immediately instead
/// of quietly running slower than requested.
#[derive(Debug, Clone, Copy)]
pub struct EngineLimits {
    /// Maximum pulses per second accepted by `set_speed`/`set_speed_multiple`.
    pub max_pulses_per_second: f64,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self { max_pulses_per_second: 4160.0 }
    }
}

struct StepperState {
    curr_direction: DirectionAbs,
    half_period_us: Option<u64>,
    req_available: bool,
    current_request: Option<Arc<SharedRequest>>,
}

/// A single stepper motor: a DIR line, a STEP line, and the pulser thread
/// driving it.
pub struct Stepper {
    name: String,
    gpio: Arc<gpio::Context>,
    registry: Arc<task::Registry>,
    dir_pin: gpio::Pin,
    step_claim: gpio::Claim,
    /// The mechanical sense this motor calls "positive" — fixed at `init`,
    /// used to resolve relative directions and to sign the step accumulator.
    pos_direction: DirectionAbs,
    microsteps_per_rotation: u32,
    state: Mutex<StepperState>,
    req_cv: Condvar,
    wait_cv: Condvar,
    steps: AtomicI32,
    stop_flag: AtomicBool,
    worker_task: Mutex<task::TaskId>,
}

impl Stepper {
    /// Claim a motor's DIR/STEP lines and spawn its pulser thread.
    ///
    /// `pos_direction` fixes which absolute direction this motor treats as
    /// its positive relative sense; it never changes after construction.
    /// `full_steps_per_rotation` must be positive; `microstep` is already
    /// validated to one of the documented factors by its own type.
    pub fn init(
        name: &str,
        step_pin: gpio::PinId,
        dir_pin: gpio::PinId,
        pos_direction: DirectionAbs,
        microstep: crate::units::Microstep,
        full_steps_per_rotation: u32,
        gpio_ctx: Arc<gpio::Context>,
        registry: Arc<task::Registry>,
    ) -> Result<Arc<Self>> {
        if full_steps_per_rotation == 0 {
            return Err(Error::InvalidArgument("full_steps_per_rotation must be positive"));
        }

        let dir_handle = gpio_ctx.init_pin(dir_pin, gpio::Mode::Output, 0)?.into_pin();
        dir_handle.write(pos_direction.level())?;
        let step_handle = gpio_ctx.init_pin(step_pin, gpio::Mode::Reserved, 0)?;
        let step_claim = step_handle.claim().expect("Mode::Reserved always returns a Claim");
        let microsteps_per_rotation = crate::units::microsteps_per_rotation(microstep, full_steps_per_rotation);

        let motor = Arc::new(Self {
            name: name.to_string(),
            gpio: gpio_ctx,
            registry: registry.clone(),
            dir_pin: dir_handle,
            step_claim,
            pos_direction,
            microsteps_per_rotation,
            state: Mutex::new(StepperState {
                curr_direction: pos_direction,
                half_period_us: None,
                req_available: false,
                current_request: None,
            }),
            req_cv: Condvar::new(),
            wait_cv: Condvar::new(),
            steps: AtomicI32::new(0),
            stop_flag: AtomicBool::new(false),
            worker_task: Mutex::new(task::TaskId::NONE),
        });

        let worker_motor = motor.clone();
        let task_id = registry.create(
            &format!("stepper-{}", motor.name),
            task::MAX_STACK_SIZE,
            move |cancel| worker::run(worker_motor, cancel),
        )?;
        *motor.worker_task.lock().expect("stepper state poisoned") = task_id;

        tracing::info!(motor = name, "stepper initialized");
        Ok(motor)
    }

    /// Stop the pulser thread and release it from the task registry.
    /// Blocks until the worker has exited.
    pub fn destroy(self: &Arc<Self>) {
        let task_id = *self.worker_task.lock().expect("stepper state poisoned");
        self.req_cv.notify_all();
        self.registry.kill(task_id);
    }

    /// Name given at `init`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `microstep_factor × full_steps_per_rotation`, fixed at `init`. Used
    /// by the axis layer to convert between millimetres and microsteps.
    pub fn microsteps_per_rotation(&self) -> u32 {
        self.microsteps_per_rotation
    }

    /// Whether this motor is currently executing (or queued into) a move.
    pub fn ready(&self) -> bool {
        !self.is_busy()
    }

    fn is_busy(&self) -> bool {
        self.state.lock().expect("stepper state poisoned").current_request.is_some()
    }

    fn step_sign(&self) -> i32 {
        let state = self.state.lock().expect("stepper state poisoned");
        if state.curr_direction == self.pos_direction {
            1
        } else {
            -1
        }
    }

    /// Set the motor's direction in absolute terms. Rejected while busy.
    /// Writes the DIR line immediately; the pulser never re-asserts it.
    pub fn set_direction_abs(&self, direction: DirectionAbs) -> Result<()> {
        let mut state = self.state.lock().expect("stepper state poisoned");
        if state.current_request.is_some() {
            return Err(Error::Busy { motor: self.name.clone() });
        }
        self.dir_pin.write(direction.level())?;
        state.curr_direction = direction;
        Ok(())
    }

    /// Set the motor's direction relative to its fixed positive sense.
    /// Rejected while busy.
    pub fn set_direction_rel(&self, direction: DirectionRel) -> Result<()> {
        self.set_direction_abs(direction.resolve(self.pos_direction))
    }

    /// Current absolute direction.
    pub fn direction_abs(&self) -> DirectionAbs {
        self.state.lock().expect("stepper state poisoned").curr_direction
    }

    /// Current direction relative to this motor's positive sense.
    pub fn direction_rel(&self) -> DirectionRel {
        if self.direction_abs() == self.pos_direction {
            DirectionRel::Positive
        } else {
            DirectionRel::Negative
        }
    }

    /// Net signed step count since `init` (or the last wraparound). A
    /// lock-free read: may be stale by at most one in-flight pulse, which
    /// is the intended tradeoff for not serializing every caller behind the
    /// pulser's mutex.
    pub fn steps(&self) -> i32 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Set this motor's pulse rate. Rejected while busy, if `pps` is not
    /// positive, or if it exceeds `limits.max_pulses_per_second`.
    pub fn set_speed(&self, pps: f64, limits: &EngineLimits) -> Result<()> {
        validate_speed(pps, limits)?;
        let mut state = self.state.lock().expect("stepper state poisoned");
        if state.current_request.is_some() {
            return Err(Error::Busy { motor: self.name.clone() });
        }
        state.half_period_us = Some(half_period_micros(pps));
        Ok(())
    }

    /// Set a shared pulse rate across several motors atomically: either
    /// every motor accepts the new speed, or none do.
    pub fn set_speed_multiple(motors: &[Arc<Stepper>], pps: &[f64], limits: &EngineLimits) -> Result<()> {
        if motors.is_empty() || motors.len() != pps.len() {
            return Err(Error::InvalidArgument("motors and speeds must be equal-length and non-empty"));
        }
        for &p in pps {
            validate_speed(p, limits)?;
        }
        for motor in motors {
            if motor.is_busy() {
                return Err(Error::Busy { motor: motor.name.clone() });
            }
        }
        for (motor, &p) in motors.iter().zip(pps) {
            let mut state = motor.state.lock().expect("stepper state poisoned");
            state.half_period_us = Some(half_period_micros(p));
        }
        Ok(())
    }

    /// Advance this motor alone by `n_steps` microsteps at its configured
    /// speed and direction. Returns immediately; use `wait` to block for
    /// completion.
    pub fn step(self: &Arc<Self>, n_steps: u32) -> Result<()> {
        Self::step_multiple(std::slice::from_ref(self), n_steps)
    }

    /// Advance several motors together by `n_steps` microsteps each,
    /// pulsing their STEP lines from one atomic GPIO bulk write.
    ///
    /// Rejected if `motors` is empty, exceeds [`gpio::BULK_MAX_PINS`], or
    /// the first motor in the list is already busy.
    pub fn step_multiple(motors: &[Arc<Stepper>], n_steps: u32) -> Result<()> {
        if motors.is_empty() || motors.len() > gpio::BULK_MAX_PINS {
            return Err(Error::InvalidArgument("motor count must be 1..=8"));
        }
        if n_steps == 0 {
            return Ok(());
        }

        let first = &motors[0];
        {
            let state = first.state.lock().expect("stepper state poisoned");
            if state.current_request.is_some() {
                return Err(Error::Busy { motor: first.name.clone() });
            }
            if state.half_period_us.is_none() {
                return Err(Error::InvalidArgument("speed must be set before stepping"));
            }
        }

        let claims: Vec<gpio::Claim> = motors.iter().map(|m| m.step_claim).collect();
        let init_levels = vec![0u8; motors.len()];
        let bulk = first.gpio.init_bulk_from_claims(&claims, gpio::Mode::Output, &init_levels)?;

        let request = SharedRequest::new(motors.to_vec(), Box::new(bulk), n_steps);

        for motor in motors {
            let mut state = motor.state.lock().expect("stepper state poisoned");
            state.current_request = Some(request.clone());
            motor.stop_flag.store(false, Ordering::Release);
        }

        {
            let mut state = first.state.lock().expect("stepper state poisoned");
            state.req_available = true;
        }
        first.req_cv.notify_one();

        Ok(())
    }

    /// Net step count; same accumulator as [`Stepper::steps`]. Kept as a
    /// separate name for call sites that read the original's `get_steps`.
    pub fn get_steps(&self) -> i32 {
        self.steps()
    }

    /// Flag this motor's in-flight move to stop after its current pulse,
    /// then block until the pulser has torn the request down. A no-op if
    /// the motor is already idle.
    pub fn stop(self: &Arc<Self>) {
        self.stop_flag.store(true, Ordering::Release);
        self.wait();
    }

    /// Block until this motor's in-flight move (if any) completes.
    pub fn wait(self: &Arc<Self>) {
        let shared = {
            let state = self.state.lock().expect("stepper state poisoned");
            state.current_request.clone()
        };
        let Some(shared) = shared else {
            return;
        };

        {
            let mut teardown = shared.teardown.lock().expect("request teardown mutex poisoned");
            teardown.motor_waiting = Some(self.clone());
        }

        let mut state = self.state.lock().expect("stepper state poisoned");
        while state.current_request.is_some() {
            state = self.wait_cv.wait(state).expect("stepper state poisoned");
        }
    }
}

fn validate_speed(pps: f64, limits: &EngineLimits) -> Result<()> {
    if !(pps > 0.0) {
        return Err(Error::InvalidArgument("speed must be positive"));
    }
    if pps > limits.max_pulses_per_second {
        return Err(Error::InvalidArgument("speed exceeds the configured pulse-rate ceiling"));
    }
    Ok(())
}

fn half_period_micros(pps: f64) -> u64 {
    (1_000_000.0 / (2.0 * pps)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio;
    use crate::units::Microstep;
    use proptest::prelude::*;

    fn harness() -> (Arc<gpio::Context>, Arc<task::Registry>) {
        (Arc::new(gpio::mock::context()), Arc::new(task::Registry::new()))
    }

    fn make_motor(name: &str, gpio_ctx: &Arc<gpio::Context>, registry: &Arc<task::Registry>) -> Arc<Stepper> {
        Stepper::init(
            name,
            gpio::PinId::Pin23,
            gpio::PinId::Pin24,
            DirectionAbs::Clockwise,
            Microstep::new(2).unwrap(),
            200,
            gpio_ctx.clone(),
            registry.clone(),
        )
        .expect("mock gpio backend never fails reservation")
    }

    #[test]
    fn single_motor_round_trip() {
        let (gpio_ctx, registry) = harness();
        let motor = make_motor("m1", &gpio_ctx, &registry);

        motor.set_speed(2000.0, &EngineLimits::default()).unwrap();
        motor.step(400).unwrap();
        motor.wait();

        assert_eq!(motor.steps(), 400);
        assert!(motor.ready());
        motor.destroy();
    }

    #[test]
    fn rejects_mutation_while_busy() {
        let (gpio_ctx, registry) = harness();
        let motor = make_motor("m1", &gpio_ctx, &registry);

        motor.set_speed(50.0, &EngineLimits::default()).unwrap();
        motor.step(10_000).unwrap();

        assert!(!motor.ready());
        assert!(matches!(motor.set_speed(100.0, &EngineLimits::default()), Err(Error::Busy { .. })));
        assert!(matches!(motor.set_direction_abs(DirectionAbs::CounterClockwise), Err(Error::Busy { .. })));
        assert!(matches!(motor.step(1), Err(Error::Busy { .. })));

        motor.stop();
        motor.destroy();
    }

    #[test]
    fn mid_motion_stop_bounds_the_accumulator() {
        let (gpio_ctx, registry) = harness();
        let motor = make_motor("m1", &gpio_ctx, &registry);

        motor.set_speed(2000.0, &EngineLimits::default()).unwrap();
        motor.step(10_000).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        motor.stop();

        let steps = motor.steps();
        assert!(steps > 0 && steps <= 10_000, "steps out of bounds: {steps}");
        assert!(motor.ready());

        motor.step(100).unwrap();
        motor.wait();
        assert_eq!(motor.steps(), steps + 100);
        motor.destroy();
    }

    #[test]
    fn simultaneous_motion_ticks_in_lockstep() {
        let (gpio_ctx, registry) = harness();
        let m1 = make_motor("m1", &gpio_ctx, &registry);
        let m2 = make_motor("m2", &gpio_ctx, &registry);

        Stepper::set_speed_multiple(&[m1.clone(), m2.clone()], &[2000.0, 2000.0], &EngineLimits::default()).unwrap();
        Stepper::step_multiple(&[m1.clone(), m2.clone()], 1000).unwrap();
        m1.wait();
        m2.wait(); // already idle; must return immediately

        assert_eq!(m1.steps(), 1000);
        assert_eq!(m2.steps(), 1000);
        m1.destroy();
        m2.destroy();
    }

    #[test]
    fn speed_above_ceiling_is_rejected_not_clamped() {
        let (gpio_ctx, registry) = harness();
        let motor = make_motor("m1", &gpio_ctx, &registry);
        let limits = EngineLimits { max_pulses_per_second: 1000.0 };

        assert!(matches!(motor.set_speed(1000.1, &limits), Err(Error::InvalidArgument(_))));
        motor.destroy();
    }

    #[test]
    fn half_period_matches_requested_frequency() {
        assert_eq!(half_period_micros(200.0), 2500);
        assert_eq!(half_period_micros(4160.0), 60);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn accumulator_never_exceeds_requested_steps(n in 1u32..200) {
            let (gpio_ctx, registry) = harness();
            let motor = make_motor("m1", &gpio_ctx, &registry);

            motor.set_speed(50_000.0, &EngineLimits::default()).unwrap();
            motor.step(n).unwrap();
            motor.wait();

            let steps = motor.steps();
            prop_assert!(steps.unsigned_abs() <= n);
            prop_assert!(motor.ready());
            motor.destroy();
        }
    }
}
