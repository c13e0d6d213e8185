//! The pulser: one of these loops drives every active [`Stepper`], spawned
//! once at `init` and parked on its motor's `req_cv` the rest of the time.
//!
//! Only the motor named first in a `step_multiple` call ever wakes its own
//! pulser; the other participants stay idle but busy (`current_request`
//! set) for the duration of the move, and have their STEP line driven by
//! the first motor's bulk write. DIR lines are never touched here — they're
//! set once by `set_direction_abs`/`set_direction_rel` before the move is
//! queued, not re-asserted by the pulser.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::task;

use super::request::SharedRequest;
use super::Stepper;

pub(crate) fn run(motor: Arc<Stepper>, cancel: task::CancelToken) {
    loop {
        let request = match wait_for_request(&motor, &cancel) {
            Some(request) => request,
            None => return,
        };

        let half_period_us = {
            let state = motor.state.lock().expect("stepper state poisoned");
            match state.half_period_us {
                Some(us) => us,
                None => {
                    tracing::error!(motor = %motor.name, "request woke pulser with no speed set");
                    teardown(&request);
                    continue;
                }
            }
        };
        let pulse_delay = Duration::from_micros(half_period_us);

        pulse(&request, pulse_delay);
        teardown(&request);
    }
}

fn wait_for_request(motor: &Arc<Stepper>, cancel: &task::CancelToken) -> Option<Arc<SharedRequest>> {
    let mut state = motor.state.lock().expect("stepper state poisoned");
    loop {
        if cancel.is_cancelled() {
            return None;
        }
        if state.req_available {
            state.req_available = false;
            return state.current_request.clone();
        }
        let (guard, _timeout) = motor
            .req_cv
            .wait_timeout(state, Duration::from_millis(200))
            .expect("stepper state poisoned");
        state = guard;
    }
}

fn pulse(request: &SharedRequest, pulse_delay: Duration) {
    let count = request.data.motors.len();
    let high = vec![1u8; count];
    let low = vec![0u8; count];

    let mut remaining = request.data.total_steps;
    let mut deadline = std::time::Instant::now();
    while remaining > 0 {
        if request.data.motors.iter().any(|m| m.stop_flag.load(Ordering::Acquire)) {
            break;
        }

        if let Err(e) = request.data.bulk.write(&high) {
            tracing::error!(error = %e, "bulk write failed, aborting in-flight move");
            break;
        }
        deadline += pulse_delay;
        sleep_until(deadline);
        if let Err(e) = request.data.bulk.write(&low) {
            tracing::error!(error = %e, "bulk write failed, aborting in-flight move");
            break;
        }
        deadline += pulse_delay;
        sleep_until(deadline);

        for motor in &request.data.motors {
            motor.steps.fetch_add(motor.step_sign(), Ordering::Relaxed);
        }
        remaining -= 1;
    }
}

/// Sleep against an absolute deadline rather than a relative duration, so
/// scheduling delay on one half-pulse doesn't accumulate into the next.
fn sleep_until(deadline: std::time::Instant) {
    let now = std::time::Instant::now();
    if deadline > now {
        std::thread::sleep(deadline - now);
    }
}

fn teardown(request: &SharedRequest) {
    let waiting = {
        let mut teardown = request.teardown.lock().expect("request teardown mutex poisoned");
        teardown.motor_waiting.take()
    };

    for motor in &request.data.motors {
        let mut state = motor.state.lock().expect("stepper state poisoned");
        state.current_request = None;
    }

    if let Some(motor) = waiting {
        motor.stop_flag.store(false, Ordering::Release);
        motor.wait_cv.notify_one();
    }
}
