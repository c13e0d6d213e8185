//! In-memory GPIO backend used by this crate's own test suite.
//!
//! Mirrors `gpio_cdev` semantics closely enough for the stepper/axis/config
//! tests to exercise real pulse-loop and teardown logic without a
//! `/dev/gpiochipN` behind it.

use std::sync::Mutex;

use super::{BulkSink, ChipBackend, Context, Controller, Mode, PinSink};
use crate::error::{Error, Result};

struct MockPin {
    level: Mutex<u8>,
}

impl PinSink for MockPin {
    fn write(&self, level: u8) -> Result<()> {
        *self.level.lock().expect("mock pin mutex poisoned") = level;
        Ok(())
    }

    fn read(&self) -> Result<u8> {
        Ok(*self.level.lock().expect("mock pin mutex poisoned"))
    }
}

/// Records every bulk write so tests can assert on the pulse train that was
/// actually driven.
pub(crate) struct MockBulk {
    levels: Mutex<Vec<u8>>,
    pub(crate) writes: Mutex<Vec<Vec<u8>>>,
}

impl BulkSink for MockBulk {
    fn write(&self, levels: &[u8]) -> Result<()> {
        *self.levels.lock().expect("mock bulk mutex poisoned") = levels.to_vec();
        self.writes.lock().expect("mock bulk mutex poisoned").push(levels.to_vec());
        Ok(())
    }

    fn read(&self) -> Result<Vec<u8>> {
        Ok(self.levels.lock().expect("mock bulk mutex poisoned").clone())
    }

    fn len(&self) -> usize {
        self.levels.lock().expect("mock bulk mutex poisoned").len()
    }
}

struct MockBackend;

impl ChipBackend for MockBackend {
    fn request_pin(&self, _offset: u32, _mode: Mode, init_level: u8) -> Result<Box<dyn PinSink>> {
        Ok(Box::new(MockPin { level: Mutex::new(init_level) }))
    }

    fn request_bulk(&self, offsets: &[u32], mode: Mode, init_levels: &[u8]) -> Result<Box<dyn BulkSink>> {
        if mode == Mode::Reserved {
            return Err(Error::InvalidArgument("bulk request needs output or input mode"));
        }
        let levels = if init_levels.is_empty() { vec![0; offsets.len()] } else { init_levels.to_vec() };
        Ok(Box::new(MockBulk { levels: Mutex::new(levels), writes: Mutex::new(Vec::new()) }))
    }
}

fn open_mock_backend(_controller: Controller) -> Result<Box<dyn ChipBackend>> {
    Ok(Box::new(MockBackend))
}

/// Build a `Context` backed entirely by in-process pin/bulk simulation; no
/// real GPIO controller is touched.
pub(crate) fn context() -> Context {
    Context::with_opener(open_mock_backend)
}
