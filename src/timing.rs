//! Character timing derived from the baud rate.
//!
//! Modbus fixes the inter character timeout (T1.5) at 750us and the frame delay
//! (T3.5) at 1.75ms above 19200 baud. Below that they are computed from the
//! character time of a 10 bit character: at 9600 baud 1.5 characters take
//! 15_000_000 / 9600 = 1562us.

use fugit::MicrosDurationU32;

/// Baud rates above this use the fixed delays.
const FIXED_TIMING_ABOVE: u32 = 19_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// T1.5, how long the receiver waits after each byte for the next one.
    pub inter_char: MicrosDurationU32,
    /// T3.5, idle time held after a frame before releasing the line.
    pub frame_delay: MicrosDurationU32,
}

impl Timing {
    /// Standard Modbus timing for `baud_rate`.
    ///
    /// `baud_rate` must be non-zero, the engine configs reject zero before we get here.
    pub fn standard(baud_rate: u32) -> Self {
        if baud_rate > FIXED_TIMING_ABOVE {
            Self::from_micros(750, 1750)
        } else {
            Self::from_micros(15_000_000 / baud_rate, 35_000_000 / baud_rate)
        }
    }

    /// Shortened delays for fast lines.
    ///
    /// __Note:__ This is outside of the Modbus standard but works with all the common
    /// master implementations.
    pub fn low_latency(baud_rate: u32) -> Self {
        if baud_rate == 1_000_000 {
            Self::from_micros(1, 10)
        } else if baud_rate >= 115_200 {
            Self::from_micros(75, 175)
        } else {
            Self::standard(baud_rate)
        }
    }

    /// Timing used by a slave, honouring its low latency setting.
    pub fn for_slave(baud_rate: u32, low_latency: bool) -> Self {
        if low_latency {
            Self::low_latency(baud_rate)
        } else {
            Self::standard(baud_rate)
        }
    }

    const fn from_micros(inter_char: u32, frame_delay: u32) -> Self {
        Self {
            inter_char: MicrosDurationU32::from_ticks(inter_char),
            frame_delay: MicrosDurationU32::from_ticks(frame_delay),
        }
    }
}
