use std::time::Instant;

/// Returns true if timestamp `a` is strictly later than `b`, tolerating wraparound of the
/// millisecond counter.
pub fn after(a: u32, b: u32) -> bool {
    (b.wrapping_sub(a) as i32) < 0
}

/// Milliseconds elapsed from `since` until `now`, modulo 2^32.
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}

/// A wrapping millisecond clock for hosts that do not keep their own.
pub struct Epoch {
    time_base: Instant,
}

impl Epoch {
    pub fn new() -> Self {
        Self {
            time_base: Instant::now(),
        }
    }

    pub fn time_now_ms(&self) -> u32 {
        // Truncation is the wraparound
        self.time_base.elapsed().as_millis() as u32
    }
}

impl Default for Epoch {
    fn default() -> Self {
        Self::new()
    }
}
