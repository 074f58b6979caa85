use std::{env, time::Duration};

use fugit::ExtU32;
use inquire::Select;
use rtu_line::{Master, MasterConfig, NoTxEnable, Packet, clock::Instant};
use serialport::SerialPort;

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 9600;
const SLAVE_ID: u8 = 0x01;
const READ_ADDRESS: u16 = 0;
const READ_COUNT: u16 = 4;
const WRITE_ADDRESS: u16 = 10;
const WRITE_COUNT: u16 = 2;
const ROUNDS: u32 = 20;

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        self.0
            .bytes_to_read()
            .map(|pending| pending > 0)
            .map_err(|e| IoError(e.into()))
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// Milliseconds since the program started, wrapping like a hardware tick counter.
struct StdClock(std::time::Instant);

impl rtu_line::Clock for StdClock {
    fn now(&mut self) -> Instant {
        // Keep the low 32 bits, the engine expects the counter to wrap.
        let millis = self.0.elapsed().as_millis() & u32::MAX as u128;
        Instant::from_ticks(millis as u32)
    }
}

struct StdDelay;

impl embedded_hal::delay::DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns as u64));
    }
}

fn main() {
    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    // Reads are driven by read_ready, so a short timeout is enough.
    let port = serialport::new(&port_name, BAUD_RATE)
        .timeout(Duration::from_millis(10))
        .open()
        .expect("Failed to open serial port");

    let config = MasterConfig::new(BAUD_RATE)
        .with_timeout(500.millis())
        .with_polling(100.millis())
        .with_retry_count(3);

    let mut master = Master::new(
        config,
        PortWrapper(port),
        None::<NoTxEnable>,
        StdDelay,
        StdClock(std::time::Instant::now()),
    )
    .expect("Failed to set up the master");

    let mut read_regs = [0u16; READ_COUNT as usize];
    let mut write_regs = [0u16; WRITE_COUNT as usize];
    let mut packets = [
        Packet::read_holding_registers(SLAVE_ID, READ_ADDRESS, READ_COUNT, &mut read_regs)
            .expect("Invalid read packet"),
        Packet::write_multiple_registers(SLAVE_ID, WRITE_ADDRESS, WRITE_COUNT, &mut write_regs)
            .expect("Invalid write packet"),
    ];

    let mut completed = 0;
    let mut last_requests = 0;
    while completed < ROUNDS {
        master.update(&mut packets).expect("Serial port failure");

        let requests: u32 = packets.iter().map(|p| p.diagnostics.requests).sum();
        if requests != last_requests {
            last_requests = requests;
            completed += 1;

            // Count up on the write packet so changes are visible on the slave.
            for value in packets[1].registers_mut() {
                *value = value.wrapping_add(1);
            }
            println!("Read registers: {:?}", packets[0].registers());
        }

        if packets.iter().all(|p| !p.connection) {
            eprintln!("Slave {} stopped responding", SLAVE_ID);
            break;
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    for (index, packet) in packets.iter().enumerate() {
        println!("\n--- Packet {} ({:?}) ---", index, packet.function());
        println!("{:#?}", packet.diagnostics);
    }
}
