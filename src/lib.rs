//! # cnc-motion-core
//!
//! Real-time stepper motor motion control core for GPIO-driven CNC robots.
//!
//! ## Architecture
//!
//! - [`gpio`] — façade over the Linux GPIO character device (`gpio-cdev`),
//!   abstracted behind a backend trait so the rest of the crate can be
//!   tested against an in-process mock.
//! - [`task`] — a name-addressable thread registry with cooperative
//!   cancellation, the concurrency primitive everything else builds on.
//! - [`stepper`] — one dedicated pulser thread per motor, driven through
//!   fixed-speed square-wave pulse trains and synchronized multi-motor
//!   moves.
//! - [`axis`] — millimetre/second commands over a group of motors moved
//!   together.
//! - [`config`] — parses a declarative `motor.conf` into the motor/axis
//!   object graph.
//! - [`context`] — bundles the GPIO façade, task registry, and engine speed
//!   ceiling that every component shares.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use cnc_motion_core::Context;
//!
//! let ctx = Context::new();
//! let (motors, mut axes) = ctx.load_config("motor.conf")?;
//!
//! axes[0].set_speed(20.0, ctx.limits())?;
//! axes[0].move_by(100.0)?;
//! axes[0].wait();
//! # Ok::<(), cnc_motion_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod axis;
pub mod config;
mod context;
pub mod error;
pub mod gpio;
pub mod stepper;
pub mod task;
pub mod units;

pub use axis::Axis;
pub use context::Context;
pub use error::{Error, Result};
pub use stepper::{EngineLimits, Stepper};
