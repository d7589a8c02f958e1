//! Test and helper mocks for ecu_core
//!
//! Every mock is a cheap `Clone` handle over shared cells, so a test can hand
//! one clone to a [`MotorDriver`](crate::MotorDriver) and keep another to
//! observe or steer it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use ecu_traits::{AnalogInput, DigitalInput, DigitalOutput, HwResult};

use crate::driver::DriverPins;

/// Digital output that remembers its level and counts writes.
#[derive(Clone, Default)]
pub struct MockOutput {
    level: Rc<Cell<bool>>,
    writes: Rc<Cell<u32>>,
    fail: Rc<Cell<bool>>,
}

impl MockOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> bool {
        self.level.get()
    }

    pub fn writes(&self) -> u32 {
        self.writes.get()
    }

    /// Make subsequent writes fail.
    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl DigitalOutput for MockOutput {
    fn set_level(&mut self, high: bool) -> HwResult<()> {
        if self.fail.get() {
            return Err(Box::new(std::io::Error::other("mock output write failed")));
        }
        self.level.set(high);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Active-low fault line; reads high (healthy) until asserted.
#[derive(Clone)]
pub struct MockFault {
    high: Rc<Cell<bool>>,
}

impl Default for MockFault {
    fn default() -> Self {
        Self {
            high: Rc::new(Cell::new(true)),
        }
    }
}

impl MockFault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull the line low (`true`) or release it.
    pub fn assert_fault(&self, asserted: bool) {
        self.high.set(!asserted);
    }
}

impl DigitalInput for MockFault {
    fn is_high(&mut self) -> HwResult<bool> {
        Ok(self.high.get())
    }
}

/// Analog input replaying queued raw codes, then a steady value.
#[derive(Clone, Default)]
pub struct MockCurrent {
    queue: Rc<RefCell<VecDeque<u16>>>,
    steady: Rc<Cell<u16>>,
    reads: Rc<Cell<u32>>,
    calibrated: Rc<Cell<bool>>,
}

impl MockCurrent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw codes returned by the next reads, in order.
    pub fn push_raw(&self, raws: impl IntoIterator<Item = u16>) {
        self.queue.borrow_mut().extend(raws);
    }

    /// Raw code returned once the queue is drained.
    pub fn set_steady(&self, raw: u16) {
        self.steady.set(raw);
    }

    pub fn reads(&self) -> u32 {
        self.reads.get()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated.get()
    }
}

impl AnalogInput for MockCurrent {
    fn calibrate(&mut self) -> HwResult<()> {
        self.calibrated.set(true);
        Ok(())
    }

    fn read_raw(&mut self, _timeout: Duration) -> HwResult<u16> {
        self.reads.set(self.reads.get() + 1);
        let raw = self
            .queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.steady.get());
        Ok(raw)
    }
}

/// One mocked H-bridge channel with observer handles.
#[derive(Clone, Default)]
pub struct MockBridge {
    pub in1: MockOutput,
    pub in2: MockOutput,
    pub enable: MockOutput,
    pub fault: MockFault,
    pub current: MockCurrent,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins for a driver; they share state with this bridge.
    pub fn pins(&self) -> DriverPins<MockOutput, MockFault, MockCurrent> {
        DriverPins {
            in1: self.in1.clone(),
            in2: self.in2.clone(),
            enable: self.enable.clone(),
            fault: self.fault.clone(),
            current: self.current.clone(),
        }
    }

    /// Pin levels as (in1, in2, enable).
    pub fn levels(&self) -> (bool, bool, bool) {
        (self.in1.level(), self.in2.level(), self.enable.level())
    }

    /// Total writes across the three outputs.
    pub fn writes(&self) -> u32 {
        self.in1.writes() + self.in2.writes() + self.enable.writes()
    }
}
