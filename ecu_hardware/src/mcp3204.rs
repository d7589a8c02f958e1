//! MCP3204 4-channel 12-bit SPI ADC used for the bridge current-sense outputs.
//!
//! One converter serves every driver. Each [`AdcChannel`] holds a shared
//! handle and selects its channel on every conversion, so reads must stay on
//! one thread and never interleave.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use ecu_traits::{AnalogInput, HwResult};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};

pub const CHANNELS: u8 = 4;

pub struct Mcp3204 {
    spi: Spi,
    offset: i16,
}

impl Mcp3204 {
    pub fn open(bus: u8, slave_select: u8, clock_hz: u32) -> Result<Self> {
        let bus = match bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            other => return Err(HwError::Spi(format!("unsupported spi bus {other}"))),
        };
        let ss = match slave_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(HwError::Spi(format!("unsupported slave select {other}"))),
        };
        let spi = Spi::new(bus, ss, clock_hz, Mode::Mode0)
            .map_err(|e| HwError::Spi(format!("open spi: {e}")))?;
        Ok(Self { spi, offset: 0 })
    }

    /// Single-ended conversion on `channel`.
    pub fn convert(&mut self, channel: u8, timeout: Duration) -> Result<u16> {
        if channel >= CHANNELS {
            return Err(HwError::Channel(channel));
        }
        let started = Instant::now();
        // start bit + single-ended, then D1..D0 in the top bits of byte 2
        let tx = [0x06, (channel & 0x03) << 6, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(format!("transfer: {e}")))?;
        if started.elapsed() > timeout {
            return Err(HwError::Timeout);
        }
        let code = (u16::from(rx[1] & 0x0F) << 8) | u16::from(rx[2]);
        let code = (i32::from(code) - i32::from(self.offset)).clamp(0, 4095) as u16;
        trace!(channel, code, "mcp3204 conversion");
        Ok(code)
    }

    /// Zero-offset calibration: sample a grounded channel and remember its code.
    pub fn calibrate_offset(&mut self, grounded_channel: u8) -> Result<()> {
        self.offset = 0;
        let code = self.convert(grounded_channel, Duration::from_millis(5))?;
        self.offset = code.min(64) as i16;
        trace!(offset = self.offset, "mcp3204 offset calibrated");
        Ok(())
    }
}

/// One channel of a shared [`Mcp3204`].
pub struct AdcChannel {
    adc: Rc<RefCell<Mcp3204>>,
    channel: u8,
}

impl AdcChannel {
    pub fn new(adc: Rc<RefCell<Mcp3204>>, channel: u8) -> Result<Self> {
        if channel >= CHANNELS {
            return Err(HwError::Channel(channel));
        }
        Ok(Self { adc, channel })
    }
}

impl AnalogInput for AdcChannel {
    fn calibrate(&mut self) -> HwResult<()> {
        // The bridge is de-energized during init, so the sense channel reads its zero.
        self.adc.borrow_mut().calibrate_offset(self.channel)?;
        Ok(())
    }

    fn read_raw(&mut self, timeout: Duration) -> HwResult<u16> {
        Ok(self.adc.borrow_mut().convert(self.channel, timeout)?)
    }
}
