//! GPIO façade over the Linux GPIO character device.
//!
//! The only component permitted to touch `gpio_cdev` directly. Named pin
//! enumeration mirrors the J21 header table from the board this library was
//! originally written for; `Context` lazily opens each controller chip at
//! most once and leaks it for the life of the process, matching the
//! original's "created on first use, never explicitly destroyed."
//!
//! Line access goes through the [`PinSink`]/[`BulkSink`] traits rather than
//! directly against `gpio_cdev` types, so the stepper engine's tests can run
//! against [`mock::context`] instead of a real `/dev/gpiochipN`.

mod pin;

#[cfg(test)]
pub(crate) mod mock;

pub use pin::PinId;

use std::sync::{Mutex, OnceLock};

use gpio_cdev::{Chip, LineRequestFlags};

use crate::error::{Error, ResourceError, Result};

/// Path to the main GPIO controller's character device.
pub const MAIN_CONTROLLER_PATH: &str = "/dev/gpiochip0";
/// Path to the always-on GPIO controller's character device.
pub const AON_CONTROLLER_PATH: &str = "/dev/gpiochip1";

/// Which physical GPIO chip a pin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Controller {
    /// The main GPIO controller.
    Main,
    /// The always-on GPIO controller.
    AlwaysOn,
}

impl Controller {
    fn path(self) -> &'static str {
        match self {
            Controller::Main => MAIN_CONTROLLER_PATH,
            Controller::AlwaysOn => AON_CONTROLLER_PATH,
        }
    }
}

/// Reservation mode for a pin or bulk of pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Drive the line; `init_level` sets the initial output value.
    Output,
    /// Read the line.
    Input,
    /// Reserve the line for later inclusion in a bulk request, without
    /// requesting it from the kernel yet.
    Reserved,
}

/// A single line's write/read operations, behind a trait so the stepper
/// engine can be tested without a real character device.
pub(crate) trait PinSink: Send + Sync {
    fn write(&self, level: u8) -> Result<()>;
    fn read(&self) -> Result<u8>;
}

/// The atomic multi-line write operation the stepper pulser depends on.
///
/// Exists so the pulse loop can be driven in tests against an in-process
/// fake instead of a real `/dev/gpiochipN`, the same seam the teacher crate
/// gets from `embedded-hal`'s digital output trait.
pub trait BulkSink: Send + Sync {
    /// Write a level to every line in the bulk atomically.
    fn write(&self, levels: &[u8]) -> Result<()>;
    /// Read the current level of every line in the bulk atomically.
    fn read(&self) -> Result<Vec<u8>>;
    /// Number of pins in this bulk.
    fn len(&self) -> usize;
}

/// A chip's line-reservation operations, behind a trait so `Context` can be
/// backed by either `gpio_cdev` or an in-memory fake.
pub(crate) trait ChipBackend: Send + Sync {
    fn request_pin(&self, offset: u32, mode: Mode, init_level: u8) -> Result<Box<dyn PinSink>>;
    fn request_bulk(&self, offsets: &[u32], mode: Mode, init_levels: &[u8]) -> Result<Box<dyn BulkSink>>;
}

struct CdevBackend {
    chip: Mutex<Chip>,
}

struct CdevPin {
    handle: gpio_cdev::LineHandle,
}

impl PinSink for CdevPin {
    fn write(&self, level: u8) -> Result<()> {
        self.handle
            .set_value(level)
            .map_err(|e| Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() }))
    }

    fn read(&self) -> Result<u8> {
        self.handle
            .get_value()
            .map(|v| v as u8)
            .map_err(|e| Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() }))
    }
}

struct CdevBulk {
    handle: gpio_cdev::MultiLineHandle,
    count: usize,
}

impl BulkSink for CdevBulk {
    fn write(&self, levels: &[u8]) -> Result<()> {
        debug_assert_eq!(levels.len(), self.count);
        self.handle
            .set_values(levels)
            .map_err(|e| Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() }))
    }

    fn read(&self) -> Result<Vec<u8>> {
        self.handle
            .get_values()
            .map_err(|e| Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() }))
    }

    fn len(&self) -> usize {
        self.count
    }
}

impl ChipBackend for CdevBackend {
    fn request_pin(&self, offset: u32, mode: Mode, init_level: u8) -> Result<Box<dyn PinSink>> {
        let mut chip = self.chip.lock().expect("gpio chip mutex poisoned");
        let line = chip
            .get_line(offset)
            .map_err(|e| Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() }))?;

        let flags = match mode {
            Mode::Output => LineRequestFlags::OUTPUT,
            Mode::Input => LineRequestFlags::INPUT,
            Mode::Reserved => return Err(Error::InvalidArgument("cannot request a line in Reserved mode")),
        };
        let default = if mode == Mode::Output { init_level } else { 0 };
        let handle = line
            .request(flags, default, "cnc-motion-core")
            .map_err(|e| {
                tracing::error!(offset, error = %e, "GPIO reservation denied");
                Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() })
            })?;

        Ok(Box::new(CdevPin { handle }))
    }

    fn request_bulk(&self, offsets: &[u32], mode: Mode, init_levels: &[u8]) -> Result<Box<dyn BulkSink>> {
        let mut chip = self.chip.lock().expect("gpio chip mutex poisoned");
        let lines = chip
            .get_lines(offsets)
            .map_err(|e| Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() }))?;

        let flags = match mode {
            Mode::Output => LineRequestFlags::OUTPUT,
            Mode::Input => LineRequestFlags::INPUT,
            Mode::Reserved => return Err(Error::InvalidArgument("bulk request needs output or input mode")),
        };
        let defaults: Vec<u8> = if mode == Mode::Output {
            init_levels.to_vec()
        } else {
            vec![0; offsets.len()]
        };

        let handle = lines.request(flags, &defaults, "cnc-motion-core").map_err(|e| {
            tracing::error!(error = %e, count = offsets.len(), "bulk GPIO reservation denied");
            Error::Resource(ResourceError::LineUnavailable { detail: e.to_string() })
        })?;

        Ok(Box::new(CdevBulk { handle, count: offsets.len() }))
    }
}

fn open_cdev_backend(controller: Controller) -> Result<Box<dyn ChipBackend>> {
    let path = controller.path();
    let chip = Chip::new(path).map_err(|e| {
        tracing::error!(path, error = %e, "failed to open GPIO controller");
        Error::Resource(ResourceError::ControllerUnavailable { path })
    })?;
    Ok(Box::new(CdevBackend { chip: Mutex::new(chip) }))
}

/// A single reserved GPIO line, requested from the kernel individually.
pub struct Pin(Box<dyn PinSink>);

impl Pin {
    /// Write a level (0 or 1) to the line.
    pub fn write(&self, level: u8) -> Result<()> {
        self.0.write(level)
    }

    /// Read the current level of the line.
    pub fn read(&self) -> Result<u8> {
        self.0.read()
    }

    /// Release the line back to the kernel. Equivalent to dropping the
    /// `Pin`; named explicitly so a caller can free a reservation before
    /// the handle would otherwise go out of scope.
    pub fn release(self) {
        drop(self);
    }
}

/// A pin that has been claimed (its offset resolved) but not yet requested
/// from the kernel. Folded into a [`Bulk`] request later.
#[derive(Debug, Clone, Copy)]
pub struct Claim {
    pub(crate) controller: Controller,
    pub(crate) offset: u32,
}

/// A group of up to 8 pins requested atomically for a combined read/write.
pub struct Bulk(Box<dyn BulkSink>);

/// Maximum number of pins that may be grouped into one [`Bulk`].
pub const BULK_MAX_PINS: usize = 8;

impl BulkSink for Bulk {
    fn write(&self, levels: &[u8]) -> Result<()> {
        self.0.write(levels)
    }

    fn read(&self) -> Result<Vec<u8>> {
        self.0.read()
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

impl Bulk {
    /// Write levels to every line in the bulk atomically.
    pub fn write(&self, levels: &[u8]) -> Result<()> {
        self.0.write(levels)
    }

    /// Read the current level of every line in the bulk atomically.
    pub fn read(&self) -> Result<Vec<u8>> {
        self.0.read()
    }

    /// Number of pins in this bulk.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this bulk has no pins (never true for a successfully
    /// constructed bulk, kept for API symmetry).
    pub fn is_empty(&self) -> bool {
        self.0.len() == 0
    }

    /// Release every line in the bulk back to the kernel. Equivalent to
    /// dropping the `Bulk`; named explicitly for the same reason as
    /// `Pin::release`.
    pub fn release(self) {
        drop(self);
    }
}

/// Process-wide GPIO context: owns the lazily-opened controller chips.
///
/// Construct one `Context` per process and share it (typically behind an
/// `Arc`) with every component that reserves lines.
pub struct Context {
    main: OnceLock<Box<dyn ChipBackend>>,
    aon: OnceLock<Box<dyn ChipBackend>>,
    opener: fn(Controller) -> Result<Box<dyn ChipBackend>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create an unopened context backed by the real GPIO character
    /// device. Controllers are opened lazily on first use.
    pub fn new() -> Self {
        Self { main: OnceLock::new(), aon: OnceLock::new(), opener: open_cdev_backend }
    }

    fn with_opener(opener: fn(Controller) -> Result<Box<dyn ChipBackend>>) -> Self {
        Self { main: OnceLock::new(), aon: OnceLock::new(), opener }
    }

    fn backend(&self, controller: Controller) -> Result<&dyn ChipBackend> {
        let cell = match controller {
            Controller::Main => &self.main,
            Controller::AlwaysOn => &self.aon,
        };
        if let Some(backend) = cell.get() {
            return Ok(backend.as_ref());
        }
        let backend = (self.opener)(controller)?;
        Ok(cell.get_or_init(|| backend).as_ref())
    }

    /// Reserve a single pin.
    ///
    /// For `Mode::Reserved`, the pin is not actually requested from the
    /// kernel; the returned [`Claim`] is folded into a [`Bulk`] request
    /// later via [`Context::init_bulk_from_claims`].
    pub fn init_pin(&self, id: PinId, mode: Mode, init_level: u8) -> Result<PinHandle> {
        if mode == Mode::Reserved {
            return Ok(PinHandle::Claim(Claim { controller: id.controller(), offset: id.offset() }));
        }
        let backend = self.backend(id.controller())?;
        let sink = backend.request_pin(id.offset(), mode, init_level)?;
        Ok(PinHandle::Pin(Pin(sink)))
    }

    /// Reserve a bulk of pins atomically for output or input.
    pub fn init_bulk(&self, ids: &[PinId], mode: Mode, init_levels: &[u8]) -> Result<Bulk> {
        if ids.is_empty() || ids.len() > BULK_MAX_PINS {
            return Err(Error::InvalidArgument("bulk pin count must be 1..=8"));
        }
        let claims: Vec<Claim> = ids.iter().map(|id| Claim { controller: id.controller(), offset: id.offset() }).collect();
        self.init_bulk_from_claims(&claims, mode, init_levels)
    }

    /// Reserve a bulk of pins that were previously claimed with
    /// `Mode::Reserved`, atomically requesting them from the kernel now.
    pub fn init_bulk_from_claims(&self, claims: &[Claim], mode: Mode, init_levels: &[u8]) -> Result<Bulk> {
        if claims.is_empty() || claims.len() > BULK_MAX_PINS {
            return Err(Error::InvalidArgument("bulk pin count must be 1..=8"));
        }
        let controller = claims[0].controller;
        if claims.iter().any(|c| c.controller != controller) {
            return Err(Error::InvalidArgument("bulk pins must share one controller"));
        }
        if mode == Mode::Output && init_levels.len() != claims.len() {
            return Err(Error::InvalidArgument("init_levels length must match pin count"));
        }

        let backend = self.backend(controller)?;
        let offsets: Vec<u32> = claims.iter().map(|c| c.offset).collect();
        let sink = backend.request_bulk(&offsets, mode, init_levels)?;
        Ok(Bulk(sink))
    }
}

/// Result of [`Context::init_pin`]: either a live [`Pin`] or a [`Claim`]
/// awaiting inclusion in a bulk request.
pub enum PinHandle {
    /// A pin requested individually from the kernel.
    Pin(Pin),
    /// A pin claimed for later bulk inclusion.
    Claim(Claim),
}

impl PinHandle {
    /// Get the underlying claim if this handle hasn't been requested yet.
    pub fn claim(&self) -> Option<Claim> {
        match self {
            PinHandle::Claim(c) => Some(*c),
            PinHandle::Pin(_) => None,
        }
    }

    /// Unwrap as a live `Pin`, panicking if this is still a bare claim.
    pub fn into_pin(self) -> Pin {
        match self {
            PinHandle::Pin(p) => p,
            PinHandle::Claim(_) => panic!("pin was reserved but never requested"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_write_then_read_round_trips() {
        let ctx = mock::context();
        let pin = ctx.init_pin(PinId::Pin23, Mode::Output, 0).unwrap().into_pin();
        pin.write(1).unwrap();
        assert_eq!(pin.read().unwrap(), 1);
        pin.release();
    }

    #[test]
    fn bulk_write_then_read_round_trips() {
        let ctx = mock::context();
        let bulk = ctx.init_bulk(&[PinId::Pin23, PinId::Pin24], Mode::Output, &[0, 0]).unwrap();
        bulk.write(&[1, 0]).unwrap();
        assert_eq!(bulk.read().unwrap(), vec![1, 0]);
        assert_eq!(bulk.len(), 2);
        bulk.release();
    }

    #[test]
    fn reserved_pin_folds_into_bulk_without_touching_the_kernel() {
        let ctx = mock::context();
        let handle = ctx.init_pin(PinId::Pin23, Mode::Reserved, 0).unwrap();
        let claim = handle.claim().expect("reserved mode always yields a claim");
        let bulk = ctx.init_bulk_from_claims(&[claim], Mode::Output, &[1]).unwrap();
        assert_eq!(bulk.read().unwrap(), vec![1]);
    }

    #[test]
    fn bulk_rejects_pins_spanning_controllers() {
        let ctx = mock::context();
        let claims = [Claim { controller: Controller::Main, offset: 1 }, Claim { controller: Controller::AlwaysOn, offset: 2 }];
        let err = ctx.init_bulk_from_claims(&claims, Mode::Output, &[0, 0]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
