//! The single reusable frame buffer shared by the receive and transmit phases.

use crate::crc;

/// Bytes that fit in one frame. This bounds the registers per transaction.
pub const FRAME_CAPACITY: usize = 128;

/// The smallest legal RTU frame: an exception response (id, function, code, 2 x CRC).
pub const MIN_FRAME_LEN: usize = 5;

/// The smallest request a slave can act on (function 3, 6 and 16 are all at least 8 bytes).
pub const MIN_REQUEST_LEN: usize = 8;

/// Id, function, byte count and CRC around the data of a function 3 response.
pub const READ_RESPONSE_OVERHEAD: usize = 5;

/// Id, function, address, count, byte count and CRC around the data of a function 16 request.
pub const WRITE_REQUEST_OVERHEAD: usize = 9;

/// Most registers a function 3 response can carry in one frame.
pub const MAX_READ_REGISTERS: u16 = ((FRAME_CAPACITY - READ_RESPONSE_OVERHEAD) / 2) as u16;

/// Most registers a function 16 request can carry in one frame.
pub const MAX_WRITE_REGISTERS: u16 = ((FRAME_CAPACITY - WRITE_REQUEST_OVERHEAD) / 2) as u16;

/// Returned when a byte does not fit in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError;

/// What the buffer currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Being filled, either by the receiver or while a reply is assembled.
    Filling,
    /// Complete frame with its CRC appended.
    ReadyToSend,
}

#[derive(Debug)]
pub struct FrameBuffer {
    bytes: heapless::Vec<u8, FRAME_CAPACITY>,
    phase: Phase,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: heapless::Vec::new(),
            phase: Phase::Filling,
        }
    }

    /// Empty the buffer and go back to filling it.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.phase = Phase::Filling;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Byte at `index`, 0 when the frame is shorter.
    pub fn byte(&self, index: usize) -> u8 {
        self.bytes.get(index).copied().unwrap_or(0)
    }

    /// Big endian word starting at `index`, 0 when the frame is shorter.
    pub fn word(&self, index: usize) -> u16 {
        ((self.byte(index) as u16) << 8) | self.byte(index + 1) as u16
    }

    pub fn push(&mut self, byte: u8) -> Result<(), CapacityError> {
        self.phase = Phase::Filling;
        self.bytes.push(byte).map_err(|_| CapacityError)
    }

    /// Push a 16 bit value high byte first.
    pub fn push_word(&mut self, value: u16) -> Result<(), CapacityError> {
        self.push((value >> 8) as u8)?;
        self.push((value & 0xFF) as u8)
    }

    /// Start a new frame with the `id` and `function` header.
    pub fn start(&mut self, id: u8, function: u8) -> Result<(), CapacityError> {
        self.clear();
        self.push(id)?;
        self.push(function)
    }

    /// Keep the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
        self.phase = Phase::Filling;
    }

    /// Append the CRC of the current contents and mark the frame ready to send.
    pub fn seal(&mut self) -> Result<(), CapacityError> {
        let crc = crc::crc_bytes(&self.bytes);
        self.bytes.extend_from_slice(&crc).map_err(|_| CapacityError)?;
        self.phase = Phase::ReadyToSend;
        Ok(())
    }

    /// Whether the trailing two bytes are the CRC of the rest of the frame.
    pub fn has_valid_crc(&self) -> bool {
        crc::matches(&self.bytes)
    }
}
