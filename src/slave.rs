//! Modbus RTU slave serving a holding register array.
//!
//! Every call to [`Slave::update`] runs to completion: it drains the line, checks
//! the request, applies it to the registers and sends the reply before returning.
//! Requests that cannot be trusted (overflow, too short, bad CRC, inconsistent byte
//! count) are dropped without a reply so the master times out instead of acting
//! on a garbled answer.

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_io::{Read, ReadReady, Write};

use crate::{
    error::{ConfigError, Result},
    frame::{
        FRAME_CAPACITY, FrameBuffer, MIN_REQUEST_LEN, READ_RESPONSE_OVERHEAD,
        WRITE_REQUEST_OVERHEAD,
    },
    line::{Reception, SerialLine},
    packet::bump,
    timing::Timing,
    types::{BROADCAST_ID, EXCEPTION_FLAG, ExceptionCode, FunctionCode},
};

/// Bytes of a request echoed back by function 6 and 16 replies (before the CRC).
const ECHO_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    pub baud_rate: u32,
    /// Our unit id, 1 to 247.
    pub slave_id: u8,
    /// Use the shortened non-standard delays at 115200 baud and above.
    pub low_latency: bool,
}

impl SlaveConfig {
    pub fn new(baud_rate: u32, slave_id: u8) -> Self {
        Self {
            baud_rate,
            slave_id,
            low_latency: false,
        }
    }

    pub fn with_low_latency(mut self, low_latency: bool) -> Self {
        self.low_latency = low_latency;
        self
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate);
        }
        if self.slave_id == BROADCAST_ID {
            return Err(ConfigError::InvalidSlaveId);
        }
        Ok(())
    }
}

/// What a validated request turned into.
enum Outcome {
    /// Send whatever is sealed in the frame buffer.
    Reply,
    /// Nothing to send.
    Silent,
    Exception(ExceptionCode),
}

pub struct Slave<'r, S, P, D> {
    pub(crate) line: SerialLine<S, P, D>,
    config: SlaveConfig,
    frame: FrameBuffer,
    registers: &'r mut [u16],
    error_count: u32,
}

impl<'r, S, P, D> Slave<'r, S, P, D>
where
    S: Read + Write + ReadReady,
    P: OutputPin,
    D: DelayNs,
{
    /// Serve `registers` on `port`. Their number is fixed for the life of the slave.
    pub fn new(
        config: SlaveConfig,
        port: S,
        tx_enable: Option<P>,
        delay: D,
        registers: &'r mut [u16],
    ) -> Result<Self, S::Error> {
        config.validate()?;
        if registers.is_empty() {
            return Err(ConfigError::NoRegisters.into());
        }
        let timing = Timing::for_slave(config.baud_rate, config.low_latency);
        let line = SerialLine::new(port, tx_enable, delay, timing)?;
        Ok(Self {
            line,
            config,
            frame: FrameBuffer::new(),
            registers,
            error_count: 0,
        })
    }

    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Requests dropped or answered with an exception since construction.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn registers(&self) -> &[u16] {
        &*self.registers
    }

    pub fn registers_mut(&mut self) -> &mut [u16] {
        &mut *self.registers
    }

    /// Give back the port, the pin and the delay provider.
    pub fn release(self) -> (S, Option<P>, D) {
        self.line.release()
    }

    /// Service at most one request. Returns the lifetime error count.
    pub fn update(&mut self) -> Result<u32, S::Error> {
        let len = match self.line.receive(&mut self.frame)? {
            Reception::Nothing => return Ok(self.error_count),
            Reception::Overflow => return Ok(self.count_error()),
            Reception::Frame(len) if len < MIN_REQUEST_LEN => {
                log::debug!("dropping {len} byte request");
                return Ok(self.count_error());
            }
            Reception::Frame(len) => len,
        };

        let id = self.frame.byte(0);
        let broadcast = id == BROADCAST_ID;
        if id != self.config.slave_id && !broadcast {
            return Ok(self.error_count);
        }
        if !self.frame.has_valid_crc() {
            log::debug!("dropping request with bad CRC");
            return Ok(self.count_error());
        }

        let function = self.frame.byte(1);
        let outcome = match FunctionCode::try_from(function) {
            Ok(FunctionCode::ReadHoldingRegisters) if !broadcast => self.read_holding_registers()?,
            Ok(FunctionCode::WriteSingleRegister) => self.write_single_register()?,
            Ok(FunctionCode::WriteMultipleRegisters) => self.write_multiple_registers(len, broadcast)?,
            // Reading has no meaning for a broadcast, it is handled as an unknown function.
            _ => Outcome::Exception(ExceptionCode::IllegalFunction),
        };

        match outcome {
            Outcome::Reply => self.line.send(&self.frame)?,
            Outcome::Silent => {}
            Outcome::Exception(code) => self.exception_response(function, code, broadcast)?,
        }
        Ok(self.error_count)
    }

    fn count_error(&mut self) -> u32 {
        bump(&mut self.error_count);
        self.error_count
    }

    /// Check that `count` registers from `address` lie inside the array.
    fn check_range(&self, address: u16, count: u16) -> core::result::Result<(), ExceptionCode> {
        let len = self.registers.len();
        if address as usize >= len {
            Err(ExceptionCode::IllegalDataAddress)
        } else if address as usize + count as usize > len {
            Err(ExceptionCode::IllegalDataValue)
        } else {
            Ok(())
        }
    }

    fn read_holding_registers(&mut self) -> Result<Outcome, S::Error> {
        let address = self.frame.word(2);
        let count = self.frame.word(4);

        if let Err(code) = self.check_range(address, count) {
            return Ok(Outcome::Exception(code));
        }
        // The reply has to fit in the frame buffer.
        if count == 0 || READ_RESPONSE_OVERHEAD + 2 * count as usize > FRAME_CAPACITY {
            return Ok(Outcome::Exception(ExceptionCode::IllegalDataValue));
        }

        let start = address as usize;
        let end = start + count as usize;
        self.frame
            .start(self.config.slave_id, FunctionCode::ReadHoldingRegisters.into())?;
        self.frame.push((count * 2) as u8)?;
        for &value in &self.registers[start..end] {
            self.frame.push_word(value)?;
        }
        self.frame.seal()?;
        Ok(Outcome::Reply)
    }

    fn write_single_register(&mut self) -> Result<Outcome, S::Error> {
        let address = self.frame.word(2);
        let value = self.frame.word(4);

        if let Err(code) = self.check_range(address, 1) {
            return Ok(Outcome::Exception(code));
        }
        self.registers[address as usize] = value;

        // Answered even when broadcast.
        self.frame.truncate(ECHO_LEN);
        self.frame.seal()?;
        Ok(Outcome::Reply)
    }

    fn write_multiple_registers(&mut self, len: usize, broadcast: bool) -> Result<Outcome, S::Error> {
        let address = self.frame.word(2);
        let count = self.frame.word(4);
        let byte_count = self.frame.byte(6) as usize;

        if len.checked_sub(WRITE_REQUEST_OVERHEAD) != Some(byte_count) || byte_count != 2 * count as usize {
            log::debug!("dropping write with byte count {byte_count} in {len} byte frame");
            self.count_error();
            return Ok(Outcome::Silent);
        }
        if let Err(code) = self.check_range(address, count) {
            return Ok(Outcome::Exception(code));
        }

        let start = address as usize;
        for (i, register) in self.registers[start..start + count as usize]
            .iter_mut()
            .enumerate()
        {
            *register = self.frame.word(7 + 2 * i);
        }

        if broadcast {
            return Ok(Outcome::Silent);
        }
        self.frame.truncate(ECHO_LEN);
        self.frame.seal()?;
        Ok(Outcome::Reply)
    }

    fn exception_response(
        &mut self,
        function: u8,
        code: ExceptionCode,
        broadcast: bool,
    ) -> Result<(), S::Error> {
        self.count_error();
        log::debug!("function {function}: exception {code:?}");
        if broadcast {
            return Ok(());
        }
        self.frame
            .start(self.config.slave_id, function | EXCEPTION_FLAG)?;
        self.frame.push(code.into())?;
        self.frame.seal()?;
        self.line.send(&self.frame)
    }
}
