//! This crate provides Modbus RTU master and slave engines for half-duplex serial lines (RS485 and friends).
//!
//! It supports `no-std` environments by use of the `no_std` feature flag, and never allocates.
//!
//! Both engines are cooperative: they are driven by calling `update()` from the application's
//! main loop and only ever block for the inter character and frame delays of RTU framing.
//!
//! * [`master::Master`] round-robin polls a list of [`packet::Packet`]s (function 3 and 16, with
//!   broadcast writes), tracking per-packet diagnostics and disconnecting slaves that stop answering.
//! * [`slave::Slave`] serves function 3, 6 and 16 requests against a holding register array,
//!   answering with Modbus exceptions where required.
//!
//! The hardware is reached through traits only:
//! * the serial port implements [embedded_io::Read], [embedded_io::Write] & [embedded_io::ReadReady],
//! * the optional transmit enable pin implements [embedded_hal::digital::OutputPin],
//! * delays come from [embedded_hal::delay::DelayNs],
//! * the master's timers read a [`clock::Clock`].
//!
//! A frame is limited to 128 bytes, which allows up to 61 registers per read and 59 per write.

#![cfg_attr(all(feature = "no_std", not(test)), no_std)]

pub mod clock;
pub mod crc;
pub mod error;
pub mod frame;
pub mod line;
pub mod master;
pub mod packet;
pub mod slave;
pub mod timing;
pub mod types;

#[cfg(test)]
mod mock_serial;

pub use clock::Clock;
pub use error::{ConfigError, Error, PacketError};
pub use line::NoTxEnable;
pub use master::{Master, MasterConfig, TransactionStatus};
pub use packet::{Diagnostics, Packet};
pub use slave::{Slave, SlaveConfig};
pub use types::{ExceptionCode, FunctionCode};
