use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::fmt;

/// Mask with the lowest `n` bits set.
pub(crate) fn mask(n: u32) -> u64 {
    if n >= 64 { u64::MAX } else { (1u64 << n) - 1 }
}

/// Forward-only, MSB-first bit reader over a borrowed channel view.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.bit_pos
    }

    pub fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    pub fn remaining(&self) -> usize {
        self.bit_len() - self.bit_pos
    }

    pub fn seek(&mut self, bit: usize) -> Result<()> {
        if bit > self.bit_len() {
            return Err(Error::bounds("bit", bit, self.bit_len()));
        }
        self.bit_pos = bit;
        Ok(())
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::bounds("bit", n, self.remaining()));
        }
        self.bit_pos += n;
        Ok(())
    }

    /// Read the next `n` bits (at most 64) as an unsigned value.
    pub fn read(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(Error::InvalidInput(format!("cannot read {} bits at once", n)));
        }
        if n as usize > self.remaining() {
            return Err(Error::bounds("bit", n as usize, self.remaining()));
        }

        let mut value = 0u64;
        let mut left = n;
        while left > 0 {
            let byte = self.data[self.bit_pos / 8];
            let available = 8 - (self.bit_pos % 8) as u32;
            let take = available.min(left);
            let shift = available - take;
            let bits = (byte >> shift) as u64 & mask(take);
            value = (value << take) | bits;
            self.bit_pos += take as usize;
            left -= take;
        }
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read(1)? == 1)
    }

    pub fn read_buffer(&mut self, n: u32) -> Result<BitBuffer> {
        let bits = self.read(n)?;
        Ok(BitBuffer::new(bits, n))
    }
}

/// Random access read of `n` bits starting at `bit_offset`.
pub fn read_at(data: &[u8], bit_offset: usize, n: u32) -> Result<u64> {
    let mut reader = BitReader::new(data);
    reader.seek(bit_offset)?;
    reader.read(n)
}

/// Growable MSB-first bit sink.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64);
        for i in (0..n).rev() {
            self.push((value >> i) & 1 == 1);
        }
    }

    pub fn write_bool(&mut self, bit: bool) {
        self.push(bit);
    }

    pub fn write_buffer(&mut self, buffer: &BitBuffer) {
        self.write(buffer.bits(), buffer.len());
    }

    fn push(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (7 - self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Owned bit string of at most 64 bits, first bit is the most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitBuffer {
    bits: u64,
    len: u32,
}

impl BitBuffer {
    pub fn new(bits: u64, len: u32) -> Self {
        debug_assert!(len <= 64);
        Self {
            bits: bits & mask(len),
            len,
        }
    }

    pub fn bits(&self) -> u64 {
        self.bits
    }

    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of the `len` bits starting at `offset`.
    pub fn get(&self, offset: u32, len: u32) -> Result<u64> {
        if offset + len > self.len {
            return Err(Error::bounds(
                "bit buffer",
                (offset + len) as usize,
                self.len as usize,
            ));
        }
        if len == 0 {
            return Ok(0);
        }
        let shift = self.len - offset - len;
        Ok((self.bits >> shift) & mask(len))
    }

    /// MSB-first bytes, zero padded to a whole byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.len == 0 {
            return Vec::new();
        }
        let aligned = self.bits << (64 - self.len);
        let n = self.len.div_ceil(8) as usize;
        aligned.to_be_bytes()[..n].to_vec()
    }
}

impl fmt::Display for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.len).rev() {
            let bit = (self.bits >> i) & 1;
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}

impl Serialize for BitBuffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_across_byte_boundary() {
        let data = [0b1010_1100, 0b0101_0011];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read(3).unwrap(), 0b101);
        assert_eq!(reader.read(7).unwrap(), 0b0_1100_01);
        assert_eq!(reader.read(6).unwrap(), 0b01_0011);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_is_bounds_error() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);
        reader.read(6).unwrap();
        assert!(matches!(reader.read(3), Err(Error::Bounds(_))));
    }

    #[test]
    fn test_reader_over_sub_slice_does_not_see_neighbours() {
        let backing = [0xFF, 0x00, 0xFF];
        let mut reader = BitReader::new(&backing[1..2]);
        assert_eq!(reader.read(8).unwrap(), 0);
        assert!(reader.read(1).is_err());
    }

    #[test]
    fn test_writer_then_reader() {
        let mut writer = BitWriter::new();
        writer.write(0b11, 2);
        writer.write(0x1FF, 9);
        writer.write_bool(false);
        writer.write(u64::MAX, 64);
        assert_eq!(writer.bit_len(), 76);

        let bytes = writer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read(2).unwrap(), 0b11);
        assert_eq!(reader.read(9).unwrap(), 0x1FF);
        assert!(!reader.read_bool().unwrap());
        assert_eq!(reader.read(64).unwrap(), u64::MAX);
    }

    #[test]
    fn test_read_at_random_access() {
        let data = [0b0001_0010, 0b0011_0100];
        assert_eq!(read_at(&data, 4, 4).unwrap(), 0b0010);
        assert_eq!(read_at(&data, 8, 8).unwrap(), 0b0011_0100);
        assert!(read_at(&data, 17, 1).is_err());
    }

    #[test]
    fn test_bit_buffer_get_and_bytes() {
        let buffer = BitBuffer::new(0b1_011_0001_11, 10);
        assert_eq!(buffer.get(0, 1).unwrap(), 1);
        assert_eq!(buffer.get(1, 3).unwrap(), 0b011);
        assert_eq!(buffer.get(4, 6).unwrap(), 0b0001_11);
        assert!(buffer.get(8, 3).is_err());
        assert_eq!(buffer.to_bytes(), vec![0b1011_0001, 0b1100_0000]);
        assert_eq!(buffer.to_string(), "1011000111");
    }
}
