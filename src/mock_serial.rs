//! We use this mocking module in unit tests to emulate the serial line collaborators:
//! the port, the transmit enable pin, the microsecond delay and the millisecond clock.

use crate::clock::{Clock, Instant};

/// Our mock type used to emulate a serial port.
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, 1024>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: heapless::Vec<u8, 256>,
    /// Current position in the read buffer
    read_position: usize,
    /// Number of completed flushes
    flushes: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    #[error("Mock buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("Simulated serial error")]
    SimulatedError,
    /// Would block - no data available
    #[error("No data available")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        let available_space = self.write_buffer.capacity() - self.write_buffer.len();
        if buf.len() > available_space {
            return Err(MockSerialError::BufferOverflow);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.flushes += 1;
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_position >= self.read_buffer.len() {
            return Err(MockSerialError::WouldBlock);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let bytes_to_read = core::cmp::min(buf.len(), available_bytes);

        buf[..bytes_to_read].copy_from_slice(
            &self.read_buffer[self.read_position..self.read_position + bytes_to_read],
        );

        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl embedded_io::ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_position < self.read_buffer.len())
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            read_buffer: heapless::Vec::new(),
            read_position: 0,
            flushes: 0,
            should_error_on_write: false,
            should_error_on_read: false,
        }
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;

        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Return everything written so far and clear the write buffer
    pub fn take_written_data(&mut self) -> Vec<u8> {
        let data = self.write_buffer.to_vec();
        self.write_buffer.clear();
        data
    }

    /// Number of times flush() completed
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

#[derive(Debug)]
pub struct MockPinError;

impl embedded_hal::digital::Error for MockPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// Transmit enable pin that records every level it is driven to.
pub struct MockPin {
    history: Vec<PinLevel>,
    should_error: bool,
}

impl MockPin {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            should_error: false,
        }
    }

    pub fn history(&self) -> &[PinLevel] {
        &self.history
    }

    pub fn set_error(&mut self, should_error: bool) {
        self.should_error = should_error;
    }

    fn drive(&mut self, level: PinLevel) -> Result<(), MockPinError> {
        if self.should_error {
            return Err(MockPinError);
        }
        self.history.push(level);
        Ok(())
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = MockPinError;
}

impl embedded_hal::digital::OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(PinLevel::Low)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(PinLevel::High)
    }
}

/// Delay provider that only adds up the requested time.
pub struct MockDelay {
    total_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self { total_ns: 0 }
    }

    pub fn total_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns += us as u64 * 1_000;
    }
}

/// Millisecond clock that only moves when told to.
pub struct MockClock {
    now_ms: u32,
}

impl MockClock {
    pub fn new() -> Self {
        Self { now_ms: 0 }
    }

    /// Start at an arbitrary tick count, used to exercise wrap around.
    pub fn starting_at(now_ms: u32) -> Self {
        Self { now_ms }
    }

    pub fn advance(&mut self, ms: u32) {
        self.now_ms = self.now_ms.wrapping_add(ms);
    }
}

impl Clock for MockClock {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::{delay::DelayNs, digital::OutputPin};
    use embedded_io::{Read, ReadReady, Write};

    #[test]
    fn test_write_data() {
        let mut mock = MockSerial::new();
        let test_data = b"Hello, World!";

        let result = mock.write(test_data);
        assert_eq!(result.unwrap(), test_data.len());
        assert_eq!(mock.written_data(), test_data);
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; 1100];

        let result = mock.write(&large_data);
        assert!(matches!(result.unwrap_err(), MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_take_written_data_clears() {
        let mut mock = MockSerial::new();
        mock.write(b"abc").unwrap();
        assert_eq!(mock.take_written_data(), b"abc".to_vec());
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_flush_counted() {
        let mut mock = MockSerial::new();
        mock.flush().unwrap();
        mock.flush().unwrap();
        assert_eq!(mock.flush_count(), 2);
    }

    #[test]
    fn test_read_ready_tracks_remaining_data() {
        let mut mock = MockSerial::new();
        assert!(!mock.read_ready().unwrap());

        mock.set_read_data(b"Hi").unwrap();
        assert!(mock.read_ready().unwrap());

        let mut buffer = [0u8; 1];
        mock.read(&mut buffer).unwrap();
        assert!(mock.read_ready().unwrap());
        mock.read(&mut buffer).unwrap();
        assert!(!mock.read_ready().unwrap());
        assert!(matches!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::WouldBlock
        ));
    }

    #[test]
    fn test_read_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"test data").unwrap();
        mock.set_read_error(true);

        let mut buffer = [0u8; 10];
        assert!(matches!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::SimulatedError
        ));
    }

    #[test]
    fn test_errors_map_to_io_kinds() {
        use embedded_io::Error as _;

        let err = MockSerialError::BufferOverflow;
        assert_eq!(err.kind(), embedded_io::ErrorKind::OutOfMemory);
        assert_eq!(err.to_string(), "Mock buffer overflow");
        assert_eq!(MockSerialError::SimulatedError.kind(), embedded_io::ErrorKind::Other);
    }

    #[test]
    fn test_pin_history_and_errors() {
        let mut pin = MockPin::new();
        pin.set_high().unwrap();
        pin.set_low().unwrap();
        assert_eq!(pin.history(), &[PinLevel::High, PinLevel::Low]);

        pin.set_error(true);
        assert!(pin.set_high().is_err());
        assert_eq!(pin.history().len(), 2);
    }

    #[test]
    fn test_delay_accumulates() {
        let mut delay = MockDelay::new();
        delay.delay_us(750);
        delay.delay_ns(250_000);
        assert_eq!(delay.total_us(), 1000);
    }

    #[test]
    fn test_clock_wraps() {
        let mut clock = MockClock::starting_at(u32::MAX);
        clock.advance(2);
        assert_eq!(clock.now().ticks(), 1);
    }
}
