//! Element encoding of the "variants" channel.
//!
//! Each element starts with a 24-bit big-endian start position relative to the
//! chunk start. Positions stay below 2^20, which leaves the top nibble of the
//! first byte free: when non-zero it carries an [`AlleleSnvCodec`] code and the
//! element is complete. Otherwise `reference 0x00 alternate 0x00` follows.

use crate::{Error, Result};

pub const INT24_LENGTH: usize = 3;
pub const SEPARATOR: u8 = 0;
/// Largest chunk stride the element encoding can address.
pub const MAX_CHUNK_SIZE: u32 = 1 << 20;

const BASES: [&str; 4] = ["A", "C", "G", "T"];

/// The twelve single-nucleotide substitutions packed into one nibble (1..=12).
pub struct AlleleSnvCodec;

impl AlleleSnvCodec {
    pub fn encode(reference: &str, alternate: &str) -> Option<u8> {
        let r = base_index(reference)?;
        let a = base_index(alternate)?;
        if r == a {
            return None;
        }
        let a = if a > r { a - 1 } else { a };
        Some((r * 3 + a + 1) as u8)
    }

    pub fn decode(code: u8) -> Result<(&'static str, &'static str)> {
        if !(1..=12).contains(&code) {
            return Err(Error::Decode(format!("invalid SNV allele code {}", code)));
        }
        let idx = (code - 1) as usize;
        let r = idx / 3;
        let mut a = idx % 3;
        if a >= r {
            a += 1;
        }
        Ok((BASES[r], BASES[a]))
    }

    pub fn valid(reference: &str, alternate: &str) -> bool {
        Self::encode(reference, alternate).is_some()
    }
}

fn base_index(allele: &str) -> Option<usize> {
    BASES.iter().position(|b| *b == allele)
}

/// One decoded element, borrowing allele text from the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVariant<'a> {
    pub relative_start: u32,
    pub reference: &'a str,
    pub alternate: &'a str,
    /// Bytes the element occupies in the channel.
    pub length: usize,
}

pub fn expected_size(reference: &str, alternate: &str) -> usize {
    if AlleleSnvCodec::valid(reference, alternate) {
        INT24_LENGTH
    } else {
        INT24_LENGTH + reference.len() + 1 + alternate.len() + 1
    }
}

pub fn write_variant(
    buf: &mut Vec<u8>,
    relative_start: u32,
    reference: &str,
    alternate: &str,
) -> Result<usize> {
    if relative_start >= MAX_CHUNK_SIZE {
        return Err(Error::InvalidInput(format!(
            "relative start {} does not fit the element encoding",
            relative_start
        )));
    }
    if reference.as_bytes().contains(&SEPARATOR) || alternate.as_bytes().contains(&SEPARATOR) {
        return Err(Error::InvalidInput("alleles cannot contain NUL bytes".to_string()));
    }

    let mut head = [
        (relative_start >> 16) as u8,
        (relative_start >> 8) as u8,
        relative_start as u8,
    ];
    match AlleleSnvCodec::encode(reference, alternate) {
        Some(code) => {
            head[0] |= code << 4;
            buf.extend_from_slice(&head);
        }
        None => {
            buf.extend_from_slice(&head);
            buf.extend_from_slice(reference.as_bytes());
            buf.push(SEPARATOR);
            buf.extend_from_slice(alternate.as_bytes());
            buf.push(SEPARATOR);
        }
    }
    Ok(expected_size(reference, alternate))
}

pub fn has_encoded_alleles(first_byte: u8) -> bool {
    first_byte & 0xF0 != 0
}

pub fn read_variant(bytes: &[u8], offset: usize) -> Result<EncodedVariant<'_>> {
    let available = bytes.len().saturating_sub(offset);
    if available < INT24_LENGTH {
        return Err(Error::bounds("variants", INT24_LENGTH, available));
    }
    let b0 = bytes[offset];
    let relative_start =
        (((b0 & 0x0F) as u32) << 16) | ((bytes[offset + 1] as u32) << 8) | bytes[offset + 2] as u32;

    if has_encoded_alleles(b0) {
        let (reference, alternate) = AlleleSnvCodec::decode(b0 >> 4)?;
        return Ok(EncodedVariant {
            relative_start,
            reference,
            alternate,
            length: INT24_LENGTH,
        });
    }

    let ref_start = offset + INT24_LENGTH;
    let reference = read_until_separator(bytes, ref_start)?;
    let alt_start = ref_start + reference.len() + 1;
    let alternate = read_until_separator(bytes, alt_start)?;
    Ok(EncodedVariant {
        relative_start,
        reference,
        alternate,
        length: INT24_LENGTH + reference.len() + 1 + alternate.len() + 1,
    })
}

fn read_until_separator(bytes: &[u8], start: usize) -> Result<&str> {
    let tail = bytes.get(start..).unwrap_or(&[]);
    let end = tail
        .iter()
        .position(|b| *b == SEPARATOR)
        .ok_or_else(|| Error::Bounds("unterminated allele in variants channel".to_string()))?;
    std::str::from_utf8(&tail[..end])
        .map_err(|e| Error::Decode(format!("allele is not valid UTF-8: {}", e)))
}
