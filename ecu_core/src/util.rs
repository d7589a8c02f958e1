//! Tick-counter arithmetic shared by the drivers, controllers and runner.

/// Milliseconds from `then` to `now` on a wrapping u32 counter.
///
/// Correct across a wrap of `now` past zero as long as the real interval is
/// shorter than one full counter period.
#[inline]
pub fn elapsed_ms(now: u32, then: u32) -> u32 {
    now.wrapping_sub(then)
}
