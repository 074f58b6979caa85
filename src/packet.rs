//! Request descriptors polled by the master, with their diagnostic counters.

use crate::{
    error::PacketError,
    frame::{MAX_READ_REGISTERS, MAX_WRITE_REGISTERS},
    types::{BROADCAST_ID, ExceptionCode, FunctionCode},
};

/// Counters kept per packet.
///
/// All of them only ever go up (saturating) until [`Diagnostics::reset`] is called.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    /// Requests sent.
    pub requests: u32,
    /// Transactions that completed with a valid response (or a broadcast write).
    pub successful_requests: u32,
    /// Consecutive failed transactions, cleared by a success or a disconnect.
    pub retries: u32,
    /// No response before the timeout.
    pub timeout: u32,
    pub incorrect_id_returned: u32,
    pub incorrect_function_returned: u32,
    /// Byte count field (or frame length) of a read response did not match the request.
    pub incorrect_bytes_returned: u32,
    pub checksum_failed: u32,
    /// Responses that were too short or overflowed the frame buffer.
    pub buffer_errors: u32,
    pub illegal_function: u32,
    pub illegal_data_address: u32,
    pub illegal_data_value: u32,
    /// Exception codes other than 1, 2 and 3.
    pub misc_exceptions: u32,
    /// Sum of the error counters, refreshed every time the master becomes ready.
    pub total_errors: u64,
}

impl Diagnostics {
    /// Sum of the nine error counters that make up `total_errors`.
    pub fn error_sum(&self) -> u64 {
        [
            self.timeout,
            self.incorrect_id_returned,
            self.incorrect_function_returned,
            self.incorrect_bytes_returned,
            self.checksum_failed,
            self.buffer_errors,
            self.illegal_function,
            self.illegal_data_address,
            self.illegal_data_value,
        ]
        .iter()
        .map(|&count| count as u64)
        .sum()
    }

    pub(crate) fn refresh_total_errors(&mut self) {
        self.total_errors = self.error_sum();
    }

    /// Record an exception response by its raw code.
    pub(crate) fn record_exception(&mut self, code: u8) {
        let counter = match ExceptionCode::from_repr(code) {
            Some(ExceptionCode::IllegalFunction) => &mut self.illegal_function,
            Some(ExceptionCode::IllegalDataAddress) => &mut self.illegal_data_address,
            Some(ExceptionCode::IllegalDataValue) => &mut self.illegal_data_value,
            None => &mut self.misc_exceptions,
        };
        bump(counter);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Increment a monotonic counter.
pub(crate) fn bump(counter: &mut u32) {
    *counter = counter.saturating_add(1);
}

/// One transaction the master repeats against a slave.
///
/// The register array is borrowed from the caller for the lifetime of the packet.
/// Reads (function 3) copy the slave's values into it, writes (function 16) send
/// its contents.
#[derive(Debug)]
pub struct Packet<'r> {
    id: u8,
    function: FunctionCode,
    address: u16,
    count: u16,
    registers: &'r mut [u16],
    /// False once the retry budget is used up. The master skips the packet until
    /// [`Packet::reconnect`] is called.
    pub connection: bool,
    pub diagnostics: Diagnostics,
}

impl<'r> Packet<'r> {
    /// Describe a transaction. Only function 3 and 16 are polled by the master.
    pub fn new(
        id: u8,
        function: FunctionCode,
        address: u16,
        count: u16,
        registers: &'r mut [u16],
    ) -> Result<Self, PacketError> {
        let max_count = match function {
            FunctionCode::ReadHoldingRegisters if id == BROADCAST_ID => {
                return Err(PacketError::BroadcastRead);
            }
            FunctionCode::ReadHoldingRegisters => MAX_READ_REGISTERS,
            FunctionCode::WriteMultipleRegisters => MAX_WRITE_REGISTERS,
            other => return Err(PacketError::UnsupportedFunction(other.into())),
        };
        if count == 0 || count > max_count {
            return Err(PacketError::InvalidRegisterCount(count));
        }
        if registers.len() < count as usize {
            return Err(PacketError::RegisterArrayTooShort {
                len: registers.len(),
                count,
            });
        }

        Ok(Self {
            id,
            function,
            address,
            count,
            registers,
            connection: true,
            diagnostics: Diagnostics::default(),
        })
    }

    /// Read `count` holding registers starting at `address` into `registers`.
    pub fn read_holding_registers(
        id: u8,
        address: u16,
        count: u16,
        registers: &'r mut [u16],
    ) -> Result<Self, PacketError> {
        Self::new(id, FunctionCode::ReadHoldingRegisters, address, count, registers)
    }

    /// Write `count` values from `registers` starting at `address`.
    pub fn write_multiple_registers(
        id: u8,
        address: u16,
        count: u16,
        registers: &'r mut [u16],
    ) -> Result<Self, PacketError> {
        Self::new(id, FunctionCode::WriteMultipleRegisters, address, count, registers)
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn function(&self) -> FunctionCode {
        self.function
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    pub fn is_broadcast(&self) -> bool {
        self.id == BROADCAST_ID
    }

    /// The registers this packet transfers.
    pub fn registers(&self) -> &[u16] {
        &self.registers[..self.count as usize]
    }

    /// Mutable view, used to stage values before a write.
    pub fn registers_mut(&mut self) -> &mut [u16] {
        &mut self.registers[..self.count as usize]
    }

    /// Put a disconnected packet back in the polling rotation.
    pub fn reconnect(&mut self) {
        self.connection = true;
    }

    /// Take the packet out of the polling rotation.
    pub fn disconnect(&mut self) {
        self.connection = false;
    }
}
