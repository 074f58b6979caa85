//! Our error types for the RTU engines.
//!
//! Modbus protocol faults (bad CRC, wrong id, exception replies...) are never
//! returned as errors, they are tallied in the diagnostic counters. These types
//! only cover collaborator failures and misuse.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for the master and slave engines.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    Serial(I),
    #[error("Transmit enable pin error: {0:?}")]
    TxEnable(embedded_hal::digital::ErrorKind),
    #[error("Frame buffer capacity exceeded")]
    FrameOverflow,
    #[error("Frame was not sealed with a CRC before sending")]
    FrameNotSealed,
    #[error("Invalid configuration: {0}")]
    Config(ConfigError),
}

impl<I: embedded_io::Error> From<ConfigError> for Error<I> {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl<I: embedded_io::Error> From<crate::frame::CapacityError> for Error<I> {
    fn from(_: crate::frame::CapacityError) -> Self {
        Error::FrameOverflow
    }
}

/// Rejected engine configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Baud rate must be non-zero")]
    InvalidBaudRate,
    #[error("Retry count must be at least one")]
    InvalidRetryCount,
    #[error("Slave id 0 is reserved for broadcast")]
    InvalidSlaveId,
    #[error("Holding register array is empty")]
    NoRegisters,
}

/// Rejected master packet definition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    #[error("Function code {0} is not supported by the master")]
    UnsupportedFunction(u8),
    #[error("Reading holding registers cannot be broadcast")]
    BroadcastRead,
    #[error("Register count {0} does not fit a single frame")]
    InvalidRegisterCount(u16),
    #[error("Register array holds {len} values, packet needs {count}")]
    RegisterArrayTooShort { len: usize, count: u16 },
}
