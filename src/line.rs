//! The half-duplex serial line shared by both roles.
//!
//! RTU frames carry no length field, a frame ends when the line goes quiet for
//! longer than T1.5. The receiver therefore drains whatever is available, waiting
//! T1.5 after every byte before checking again.

use core::convert::Infallible;

use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorType, OutputPin},
};
use embedded_io::{Read, ReadReady, Write};

use crate::{
    error::{Error, Result},
    frame::{FrameBuffer, Phase},
    timing::Timing,
};

/// Outcome of draining the serial input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reception {
    /// No bytes were waiting.
    Nothing,
    /// A frame of this many bytes is in the buffer.
    Frame(usize),
    /// More bytes than the buffer holds arrived. They were discarded until the line went quiet.
    Overflow,
}

/// Use this as the pin type when the transceiver switches direction on its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTxEnable;

impl ErrorType for NoTxEnable {
    type Error = Infallible;
}

impl OutputPin for NoTxEnable {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// A serial port plus everything needed to frame RTU traffic on it.
pub struct SerialLine<S, P, D> {
    pub(crate) port: S,
    /// Drives the transceiver's driver enable. `None` leaves it alone.
    pub(crate) tx_enable: Option<P>,
    pub(crate) delay: D,
    timing: Timing,
}

impl<S, P, D> SerialLine<S, P, D>
where
    S: Read + Write + ReadReady,
    P: OutputPin,
    D: DelayNs,
{
    /// Build a line. The transmit enable pin, if any, is driven low (receive).
    pub fn new(port: S, tx_enable: Option<P>, delay: D, timing: Timing) -> Result<Self, S::Error> {
        let mut line = Self {
            port,
            tx_enable,
            delay,
            timing,
        };
        line.set_tx_enable(false)?;
        Ok(line)
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Give back the port, the pin and the delay provider.
    pub fn release(self) -> (S, Option<P>, D) {
        (self.port, self.tx_enable, self.delay)
    }

    /// Drain all available input into `frame`.
    pub fn receive(&mut self, frame: &mut FrameBuffer) -> Result<Reception, S::Error> {
        frame.clear();
        let mut overflow = false;
        let mut byte = [0u8; 1];

        while self.port.read_ready().map_err(Error::Serial)? {
            let read = self.port.read(&mut byte).map_err(Error::Serial)?;
            if read == 0 {
                break;
            }
            // Once overflowed keep reading so we stay in step with the next frame.
            if !overflow && frame.push(byte[0]).is_err() {
                overflow = true;
            }
            self.delay.delay_us(self.timing.inter_char.ticks());
        }

        if overflow {
            log::warn!("receive overflow, frame discarded");
            frame.clear();
            return Ok(Reception::Overflow);
        }
        if frame.is_empty() {
            return Ok(Reception::Nothing);
        }
        log::trace!("rx {:02x?}", frame.as_slice());
        Ok(Reception::Frame(frame.len()))
    }

    /// Transmit a sealed frame and hold the line for the frame delay.
    pub fn send(&mut self, frame: &FrameBuffer) -> Result<(), S::Error> {
        if frame.phase() != Phase::ReadyToSend {
            return Err(Error::FrameNotSealed);
        }
        log::trace!("tx {:02x?}", frame.as_slice());

        self.set_tx_enable(true)?;
        let written = self
            .port
            .write_all(frame.as_slice())
            .and_then(|()| self.port.flush())
            .map_err(Error::Serial);
        if written.is_ok() {
            // The frame delay marks the end of the transmission.
            self.delay.delay_us(self.timing.frame_delay.ticks());
        }
        // Release the bus even when the write failed.
        let released = self.set_tx_enable(false);
        written.and(released)
    }

    fn set_tx_enable(&mut self, transmit: bool) -> Result<(), S::Error> {
        if let Some(pin) = self.tx_enable.as_mut() {
            let res = if transmit { pin.set_high() } else { pin.set_low() };
            res.map_err(|e| Error::TxEnable(e.kind()))?;
        }
        Ok(())
    }
}
