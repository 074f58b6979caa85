//! Modbus function and exception codes handled by the engines.

use strum_macros::{EnumIter, FromRepr};

/// Unit id every slave accepts. Requests sent to it must not be answered.
pub const BROADCAST_ID: u8 = 0;

/// Bit set in the function byte of an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Supported Modbus function codes.
#[derive(Debug, EnumIter, FromRepr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum FunctionCode {
    /// 3: Read a contiguous block of holding registers.
    ReadHoldingRegisters = 0x03,
    /// 6: Write a single holding register. Slave side only.
    WriteSingleRegister = 0x06,
    /// 16: Write a contiguous block of holding registers.
    WriteMultipleRegisters = 0x10,
}

impl From<FunctionCode> for u8 {
    fn from(value: FunctionCode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = u8;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(value)
    }
}

/// Exception codes a slave reports back.
#[derive(Debug, EnumIter, FromRepr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum ExceptionCode {
    /// 1: The function code is not supported.
    IllegalFunction = 0x01,
    /// 2: The starting address is outside of the register array.
    IllegalDataAddress = 0x02,
    /// 3: The register count runs past the end of the array, or is not allowed.
    IllegalDataValue = 0x03,
}

impl From<ExceptionCode> for u8 {
    fn from(value: ExceptionCode) -> Self {
        value as u8
    }
}
