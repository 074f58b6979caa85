//! Modbus CRC-16.

use ::crc::{CRC_16_MODBUS, Crc};

const MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the Modbus CRC-16 of `data`.
///
/// The two bytes of the result are swapped compared to the textbook value, so the
/// high byte of the returned value is the CRC low byte. Writing
/// `[crc >> 8, crc & 0xFF]` puts the checksum on the wire in the order Modbus
/// expects (low byte first).
pub fn crc16(data: &[u8]) -> u16 {
    MODBUS.checksum(data).swap_bytes()
}

/// The checksum of `data` in wire order.
pub fn crc_bytes(data: &[u8]) -> [u8; 2] {
    let crc = crc16(data);
    [(crc >> 8) as u8, (crc & 0xFF) as u8]
}

/// Check the trailing two bytes of `frame` against the CRC of everything before them.
pub fn matches(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, tail) = frame.split_at(frame.len() - 2);
    let received = ((tail[0] as u16) << 8) | tail[1] as u16;
    crc16(body) == received
}
