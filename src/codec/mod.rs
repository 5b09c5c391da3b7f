//! Low-level encodings shared by every channel.

pub mod bit;
pub mod genotype;
pub mod variant;

pub use bit::{BitBuffer, BitReader, BitWriter, read_at};
pub use genotype::{GenotypeCodec, ParentsCode, UNKNOWN_CODE};
pub use variant::{AlleleSnvCodec, EncodedVariant, read_variant, write_variant};

use crate::{Error, Result};

/// Append `value` as an unsigned LEB128 varint.
pub fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Read an unsigned LEB128 varint at `offset`, returning the value and the bytes consumed.
pub fn read_varint(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in data.iter().skip(offset).enumerate() {
        if i >= 10 {
            return Err(Error::Decode("varint longer than 10 bytes".to_string()));
        }
        value |= ((byte & 0x7F) as u64) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::Bounds("truncated varint".to_string()))
}
