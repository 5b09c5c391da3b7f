use super::configuration::{FileDataConfiguration, FileIndexConfiguration};
use super::field::{FieldInput, IndexField};
use crate::codec::{BitBuffer, BitReader, read_varint, write_varint};
use crate::{Error, Result};
use std::collections::BTreeMap;

const MULTI_FILE_BITS: u32 = 1;

/// Layout of one file-index entry: `[multiFile:1][filePosition:N][custom fields...]`.
///
/// Entries have a fixed width, so the channel supports random access by entry
/// ordinal. A set multi-file bit means another entry for the same variant
/// follows.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIndexSchema {
    file_position_bits: u32,
    custom_fields: Vec<IndexField>,
    entry_bits: u32,
}

impl FileIndexSchema {
    pub fn new(configuration: &FileIndexConfiguration) -> Result<Self> {
        let file_position_bits = configuration.file_position_bits;
        let mut offset = MULTI_FILE_BITS + file_position_bits;
        let mut custom_fields = Vec::with_capacity(configuration.custom_fields.len());
        for field in &configuration.custom_fields {
            let field = IndexField::new(field, offset)?;
            offset = field.end_bit();
            custom_fields.push(field);
        }
        if offset > 64 {
            return Err(Error::InvalidSchema(format!(
                "file index entry needs {} bits, at most 64 are supported",
                offset
            )));
        }
        Ok(Self {
            file_position_bits,
            custom_fields,
            entry_bits: offset,
        })
    }

    pub fn entry_bits(&self) -> u32 {
        self.entry_bits
    }

    pub fn file_position_bits(&self) -> u32 {
        self.file_position_bits
    }

    pub fn max_file_position(&self) -> u32 {
        (1u32 << self.file_position_bits) - 1
    }

    pub fn custom_fields(&self) -> &[IndexField] {
        &self.custom_fields
    }

    pub fn custom_field(&self, key: &str) -> Option<&IndexField> {
        self.custom_fields.iter().find(|f| f.key() == key)
    }

    pub fn is_multi_file(&self, entry: &BitBuffer) -> bool {
        entry.get(0, MULTI_FILE_BITS).map(|b| b == 1).unwrap_or(false)
    }

    pub fn file_position(&self, entry: &BitBuffer) -> Result<u64> {
        entry.get(MULTI_FILE_BITS, self.file_position_bits)
    }

    /// Entry number `i` of a file-index channel.
    pub fn read_entry(&self, view: &[u8], i: usize) -> Result<BitBuffer> {
        let mut reader = BitReader::new(view);
        reader.seek(i * self.entry_bits as usize)?;
        reader.read_buffer(self.entry_bits)
    }

    pub fn is_multi_file_at(&self, view: &[u8], i: usize) -> Result<bool> {
        Ok(self.is_multi_file(&self.read_entry(view, i)?))
    }

    pub fn encode_entry(
        &self,
        multi_file: bool,
        file_position: u32,
        values: &BTreeMap<String, FieldInput>,
    ) -> Result<BitBuffer> {
        if file_position > self.max_file_position() {
            return Err(Error::InvalidInput(format!(
                "file position {} does not fit in {} bits",
                file_position, self.file_position_bits
            )));
        }
        let mut bits = (u64::from(multi_file) << self.file_position_bits) | file_position as u64;
        for field in &self.custom_fields {
            let input = values.get(field.key()).unwrap_or(&FieldInput::Missing);
            bits = (bits << field.bit_length()) | field.encode(input)?;
        }
        Ok(BitBuffer::new(bits, self.entry_bits))
    }

    /// Decoded custom fields, keyed by field name.
    pub fn describe(&self, entry: &BitBuffer) -> Result<BTreeMap<String, Vec<String>>> {
        let mut out = BTreeMap::new();
        for field in &self.custom_fields {
            out.insert(field.key().to_string(), field.decode(field.read(entry)?)?);
        }
        Ok(out)
    }
}

/// Per-file payload stored in the "fileData" channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileData {
    pub original_call: Option<String>,
    pub secondary_alternates: Vec<String>,
}

/// One varint-length-prefixed payload per file-index entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDataSchema {
    include_original_call: bool,
    include_secondary_alternates: bool,
}

impl FileDataSchema {
    pub fn new(configuration: &FileDataConfiguration) -> Self {
        Self {
            include_original_call: configuration.include_original_call,
            include_secondary_alternates: configuration.include_secondary_alternates,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.include_original_call || self.include_secondary_alternates
    }

    /// Byte range `(start, end)` of the payload at `offset`, plus the offset of the next entry.
    pub fn read_entry(&self, view: &[u8], offset: usize) -> Result<((usize, usize), usize)> {
        let (len, prefix) = read_varint(view, offset)?;
        let start = offset + prefix;
        let end = payload_end(start, len, view.len())?;
        Ok(((start, end), end))
    }

    pub fn write_entry(&self, buf: &mut Vec<u8>, data: &FileData) {
        let payload = self.encode(data);
        write_varint(buf, payload.len() as u64);
        buf.extend_from_slice(&payload);
    }

    pub fn encode(&self, data: &FileData) -> Vec<u8> {
        let mut payload = Vec::new();
        if self.include_original_call {
            match &data.original_call {
                Some(call) => {
                    write_varint(&mut payload, call.len() as u64 + 1);
                    payload.extend_from_slice(call.as_bytes());
                }
                None => write_varint(&mut payload, 0),
            }
        }
        if self.include_secondary_alternates {
            write_varint(&mut payload, data.secondary_alternates.len() as u64);
            for alternate in &data.secondary_alternates {
                write_varint(&mut payload, alternate.len() as u64);
                payload.extend_from_slice(alternate.as_bytes());
            }
        }
        payload
    }

    pub fn read_original_call(&self, payload: &[u8]) -> Result<Option<String>> {
        if !self.include_original_call {
            return Ok(None);
        }
        let (len, used) = read_varint(payload, 0)?;
        if len == 0 {
            return Ok(None);
        }
        read_string(payload, used, len - 1).map(|(s, _)| Some(s))
    }

    pub fn read_secondary_alternates(&self, payload: &[u8]) -> Result<Vec<String>> {
        if !self.include_secondary_alternates {
            return Ok(Vec::new());
        }
        let mut offset = 0;
        if self.include_original_call {
            let (len, used) = read_varint(payload, 0)?;
            offset = payload_end(used, len.saturating_sub(1), payload.len())?;
        }
        let (count, used) = read_varint(payload, offset)?;
        offset += used;
        // every alternate takes at least its one-byte length prefix
        if count > (payload.len() - offset) as u64 {
            return Err(Error::bounds("fileData", count as usize, payload.len() - offset));
        }
        let mut alternates = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (len, used) = read_varint(payload, offset)?;
            let (alternate, next) = read_string(payload, offset + used, len)?;
            alternates.push(alternate);
            offset = next;
        }
        Ok(alternates)
    }

    pub fn decode(&self, payload: &[u8]) -> Result<FileData> {
        Ok(FileData {
            original_call: self.read_original_call(payload)?,
            secondary_alternates: self.read_secondary_alternates(payload)?,
        })
    }
}

/// End of a `len`-byte payload starting at `start`, checked against `available`.
fn payload_end(start: usize, len: u64, available: usize) -> Result<usize> {
    usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= available)
        .ok_or_else(|| {
            Error::Bounds(format!(
                "fileData channel needs {} bytes at {} but only {} available",
                len, start, available
            ))
        })
}

fn read_string(payload: &[u8], start: usize, len: u64) -> Result<(String, usize)> {
    let end = payload_end(start, len, payload.len())?;
    let bytes = &payload[start..end];
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("file data is not valid UTF-8: {}", e)))?;
    Ok((text.to_string(), end))
}
