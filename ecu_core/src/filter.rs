//! Fixed-window moving average over unsigned current samples.

/// Moving average of the last `N` samples.
///
/// The running sum is kept in a `u32` so `N` full-scale `u16` samples never
/// overflow for any realistic window. Until `N` samples have been pushed the
/// slots still hold whatever [`reset`](Self::reset) seeded them with, so the
/// average is biased toward that seed.
#[derive(Debug, Clone)]
pub struct SampleFilter<const N: usize> {
    buf: [u16; N],
    sum: u32,
    next: usize,
}

/// Window used for motor current readings.
pub type CurrentFilter = SampleFilter<8>;

impl<const N: usize> SampleFilter<N> {
    /// Empty filter; every slot starts at zero.
    pub fn new() -> Self {
        const { assert!(N > 0, "filter window must be non-empty") };
        Self {
            buf: [0; N],
            sum: 0,
            next: 0,
        }
    }

    /// Seed every slot with `value`, so the average becomes `value`.
    pub fn reset(&mut self, value: u16) {
        self.buf = [value; N];
        self.sum = u32::from(value) * N as u32;
        self.next = 0;
    }

    /// Replace the oldest sample with `value`.
    pub fn push(&mut self, value: u16) {
        let old = std::mem::replace(&mut self.buf[self.next], value);
        self.sum = self.sum - u32::from(old) + u32::from(value);
        self.next = (self.next + 1) % N;
    }

    /// Integer mean of the window, rounded down.
    pub fn average(&self) -> u16 {
        // sum <= N * u16::MAX, so the quotient always fits
        (self.sum / N as u32) as u16
    }
}

impl<const N: usize> Default for SampleFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}
