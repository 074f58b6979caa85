//! Millisecond time keeping for the master's timeout and polling timers.

use fugit::MillisDurationU32;

/// A point in time on a free running millisecond counter.
pub type Instant = fugit::Instant<u32, 1, 1_000>;

/// Monotonic millisecond clock. The counter is allowed to wrap.
pub trait Clock {
    fn now(&mut self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &mut C {
    fn now(&mut self) -> Instant {
        (**self).now()
    }
}

/// Whether strictly more than `period` has passed between `since` and `now`.
///
/// Works across the counter wrapping, as long as the real gap is under ~49 days.
pub fn elapsed(now: Instant, since: Instant, period: MillisDurationU32) -> bool {
    now.ticks().wrapping_sub(since.ticks()) > period.ticks()
}
