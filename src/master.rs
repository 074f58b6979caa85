//! Modbus RTU master that round-robin polls a list of [`Packet`]s.
//!
//! Nothing here blocks for longer than a frame: every call to [`Master::update`]
//! does at most one of sending a request, collecting a response and advancing the
//! timeout/polling state machine, then hands control back to the caller's loop.
//!
//! A packet whose slave fails `retry_count` transactions in a row is disconnected
//! and skipped until the caller calls [`Packet::reconnect`]. Each silent slave
//! costs one full timeout per round, so disconnecting them keeps the line usable.

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use embedded_io::{Read, ReadReady, Write};
use fugit::{ExtU32, MillisDurationU32};

use crate::{
    clock::{Clock, Instant, elapsed},
    error::{ConfigError, Result},
    frame::{FrameBuffer, MIN_FRAME_LEN, READ_RESPONSE_OVERHEAD},
    line::{Reception, SerialLine},
    packet::{Packet, bump},
    timing::Timing,
    types::{EXCEPTION_FLAG, FunctionCode},
};

/// Length of a function 16 response: echoed header plus CRC.
const WRITE_RESPONSE_LEN: usize = 8;

/// Master settings, see [`MasterConfig::new`] for the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterConfig {
    pub baud_rate: u32,
    /// How long to wait for a response before counting a timeout.
    pub timeout: MillisDurationU32,
    /// Pause after each completed transaction before the next request.
    pub polling: MillisDurationU32,
    /// Consecutive failures after which a packet is disconnected.
    pub retry_count: u8,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: 1000.millis(),
            polling: 200.millis(),
            retry_count: 10,
        }
    }
}

impl MasterConfig {
    /// Defaults are a 1s timeout, 200ms polling delay and 10 retries.
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_polling(mut self, polling: MillisDurationU32) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_retry_count(mut self, retry_count: u8) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate);
        }
        if self.retry_count == 0 {
            return Err(ConfigError::InvalidRetryCount);
        }
        Ok(())
    }
}

/// Where the current transaction is at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Ready to send the next request.
    Idle,
    /// Request sent, waiting for the response or the timeout.
    AwaitingResponse,
    /// Valid response received, waiting out the polling delay.
    Succeeded,
    /// Bad response received, waiting out the polling delay.
    Failed,
}

pub struct Master<S, P, D, C> {
    line: SerialLine<S, P, D>,
    clock: C,
    config: MasterConfig,
    frame: FrameBuffer,
    status: TransactionStatus,
    /// Next packet index the scan starts from.
    cursor: usize,
    /// Packet the current transaction belongs to.
    active: Option<usize>,
    previous_timeout: Instant,
    previous_polling: Instant,
}

impl<S, P, D, C> Master<S, P, D, C>
where
    S: Read + Write + ReadReady,
    P: OutputPin,
    D: DelayNs,
    C: Clock,
{
    /// Set up a master on `port`. `tx_enable` drives an RS485 transceiver's
    /// driver enable line, pass `None` if it switches direction by itself.
    pub fn new(
        config: MasterConfig,
        port: S,
        tx_enable: Option<P>,
        delay: D,
        clock: C,
    ) -> Result<Self, S::Error> {
        config.validate()?;
        let line = SerialLine::new(port, tx_enable, delay, Timing::standard(config.baud_rate))?;
        Ok(Self {
            line,
            clock,
            config,
            frame: FrameBuffer::new(),
            status: TransactionStatus::Idle,
            cursor: 0,
            active: None,
            previous_timeout: Instant::from_ticks(0),
            previous_polling: Instant::from_ticks(0),
        })
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Index of the packet the current (or last) transaction belongs to.
    pub fn active_packet(&self) -> Option<usize> {
        self.active
    }

    /// Give back the port, pin, delay and clock.
    pub fn release(self) -> (S, Option<P>, D, C) {
        let (port, tx_enable, delay) = self.line.release();
        (port, tx_enable, delay, self.clock)
    }

    /// Run one step of the polling cycle.
    ///
    /// Pass the same packet list on every call, it is what the round-robin cursor
    /// walks. Returns `packets.len()` when no packet is connected, otherwise the
    /// index of the packet being serviced. The value is informational only.
    pub fn update(&mut self, packets: &mut [Packet<'_>]) -> Result<usize, S::Error> {
        if self.status == TransactionStatus::Idle {
            let Some(index) = self.next_packet(packets) else {
                self.active = None;
                return Ok(packets.len());
            };
            self.active = Some(index);
            self.send_request(&mut packets[index])?;
        }

        let Some(index) = self.active else {
            return Ok(packets.len());
        };
        let Some(packet) = packets.get_mut(index) else {
            // The list shrank under an in-flight transaction, forget about it.
            self.status = TransactionStatus::Idle;
            self.active = None;
            return Ok(packets.len());
        };

        if self.status == TransactionStatus::AwaitingResponse {
            self.check_response(packet)?;
        }
        self.check_packet_status(packet);

        Ok(index)
    }

    /// Pick the next connected packet, starting at the cursor and wrapping once.
    fn next_packet(&mut self, packets: &[Packet<'_>]) -> Option<usize> {
        let total = packets.len();
        for _ in 0..total {
            if self.cursor >= total {
                self.cursor = 0;
            }
            let index = self.cursor;
            self.cursor += 1;
            if packets[index].connection {
                return Some(index);
            }
        }
        None
    }

    fn send_request(&mut self, packet: &mut Packet<'_>) -> Result<(), S::Error> {
        bump(&mut packet.diagnostics.requests);

        self.frame.start(packet.id(), packet.function().into())?;
        self.frame.push_word(packet.address())?;
        self.frame.push_word(packet.count())?;
        if packet.function() == FunctionCode::WriteMultipleRegisters {
            self.frame.push((packet.count() * 2) as u8)?;
            for &value in packet.registers() {
                self.frame.push_word(value)?;
            }
        }
        self.frame.seal()?;
        self.line.send(&self.frame)?;

        let now = self.clock.now();
        self.previous_timeout = now;
        if packet.is_broadcast() {
            // Nobody answers a broadcast, go straight to the polling delay.
            self.status = TransactionStatus::Succeeded;
            self.previous_polling = now;
        } else {
            self.status = TransactionStatus::AwaitingResponse;
        }
        Ok(())
    }

    fn check_response(&mut self, packet: &mut Packet<'_>) -> Result<(), S::Error> {
        self.status = match self.line.receive(&mut self.frame)? {
            Reception::Nothing => return Ok(()),
            Reception::Frame(len) if len >= MIN_FRAME_LEN => {
                validate_response(&self.frame, packet)
            }
            Reception::Frame(_) | Reception::Overflow => {
                log::debug!("slave {}: short or oversized response", packet.id());
                bump(&mut packet.diagnostics.buffer_errors);
                TransactionStatus::Failed
            }
        };
        self.previous_polling = self.clock.now();
        Ok(())
    }

    /// Timeout, polling delay and retry bookkeeping, run on every update.
    fn check_packet_status(&mut self, packet: &mut Packet<'_>) {
        let id = packet.id();
        let now = self.clock.now();
        let polling_finished = elapsed(now, self.previous_polling, self.config.polling);
        let diagnostics = &mut packet.diagnostics;

        match self.status {
            TransactionStatus::Succeeded if polling_finished => {
                bump(&mut diagnostics.successful_requests);
                diagnostics.retries = 0;
                self.status = TransactionStatus::Idle;
            }
            TransactionStatus::Failed if polling_finished => {
                bump(&mut diagnostics.retries);
                self.status = TransactionStatus::Idle;
            }
            TransactionStatus::AwaitingResponse
                if elapsed(now, self.previous_timeout, self.config.timeout) =>
            {
                log::debug!("slave {id}: response timeout");
                bump(&mut diagnostics.timeout);
                bump(&mut diagnostics.retries);
                self.status = TransactionStatus::Idle;
            }
            _ => {}
        }

        if diagnostics.retries == self.config.retry_count as u32 {
            log::warn!("slave {id}: {} failed transactions, disconnecting", diagnostics.retries);
            diagnostics.retries = 0;
            packet.connection = false;
        }

        if self.status == TransactionStatus::Idle {
            packet.diagnostics.refresh_total_errors();
        }
    }
}

/// Check a response of at least [`MIN_FRAME_LEN`] bytes against the request it answers.
fn validate_response(frame: &FrameBuffer, packet: &mut Packet<'_>) -> TransactionStatus {
    if frame.byte(0) != packet.id() {
        log::debug!("slave {}: response from id {}", packet.id(), frame.byte(0));
        bump(&mut packet.diagnostics.incorrect_id_returned);
        return TransactionStatus::Failed;
    }

    let function = frame.byte(1);
    if function & EXCEPTION_FLAG != 0 {
        log::debug!("slave {}: exception {}", packet.id(), frame.byte(2));
        packet.diagnostics.record_exception(frame.byte(2));
        return TransactionStatus::Failed;
    }
    if function != u8::from(packet.function()) {
        bump(&mut packet.diagnostics.incorrect_function_returned);
        return TransactionStatus::Failed;
    }

    match packet.function() {
        FunctionCode::WriteMultipleRegisters => check_write_echo(frame, packet),
        _ => check_read_data(frame, packet),
    }
}

fn check_read_data(frame: &FrameBuffer, packet: &mut Packet<'_>) -> TransactionStatus {
    let byte_count = packet.count() as usize * 2;
    if frame.byte(2) as usize != byte_count {
        bump(&mut packet.diagnostics.incorrect_bytes_returned);
        return TransactionStatus::Failed;
    }
    if !frame.has_valid_crc() {
        bump(&mut packet.diagnostics.checksum_failed);
        return TransactionStatus::Failed;
    }
    if frame.len() != READ_RESPONSE_OVERHEAD + byte_count {
        bump(&mut packet.diagnostics.incorrect_bytes_returned);
        return TransactionStatus::Failed;
    }

    for (i, register) in packet.registers_mut().iter_mut().enumerate() {
        *register = frame.word(3 + 2 * i);
    }
    TransactionStatus::Succeeded
}

fn check_write_echo(frame: &FrameBuffer, packet: &mut Packet<'_>) -> TransactionStatus {
    if frame.len() == WRITE_RESPONSE_LEN
        && frame.word(2) == packet.address()
        && frame.word(4) == packet.count()
        && frame.has_valid_crc()
    {
        TransactionStatus::Succeeded
    } else {
        bump(&mut packet.diagnostics.checksum_failed);
        TransactionStatus::Failed
    }
}
