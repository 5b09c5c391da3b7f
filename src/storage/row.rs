//! Binary layout of one stored row (one sample, one chunk).
//!
//! ```text
//! "SIDX" u16:format u32:schemaVersion
//! str:sample str:chromosome u32:batchStart u32:discrepancies
//! u16:buckets
//!   per bucket: str:genotype u32:count u16:channelMask u32:length per present channel
//! u8:hasMendelian [u32:length]
//! data: channel bytes in table order, then the mendelian blob
//! ```
//!
//! Strings are `u16` length prefixed. All integers are big-endian.

use crate::models::{Channel, ChannelView, SampleIndexEntry, SampleIndexEntryChunk, SampleIndexGtEntry};
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

const MAGIC: &[u8; 4] = b"SIDX";
const FORMAT_VERSION: u16 = 1;

/// Decoded row header, without the data section.
#[derive(Debug, Clone, PartialEq)]
pub struct RowHeader {
    pub schema_version: u32,
    pub sample_id: String,
    pub chunk: SampleIndexEntryChunk,
    pub discrepancies: u32,
}

pub struct RowCodec;

impl RowCodec {
    pub fn encode(entry: &SampleIndexEntry, schema_version: u32) -> Result<Bytes> {
        let mut header = BytesMut::new();
        let mut data = BytesMut::new();
        header.put_slice(MAGIC);
        header.put_u16(FORMAT_VERSION);
        header.put_u32(schema_version);
        put_str(&mut header, entry.sample_id())?;
        put_str(&mut header, entry.chromosome())?;
        header.put_u32(entry.batch_start());
        header.put_u32(entry.discrepancies());

        let buckets: Vec<&SampleIndexGtEntry> = entry.gt_entries().collect();
        header.put_u16(checked_u16(buckets.len(), "genotype buckets")?);
        for gt in buckets {
            put_str(&mut header, gt.genotype())?;
            header.put_u32(checked_u32(gt.count(), "bucket count")?);
            let mask = gt
                .channels()
                .fold(0u16, |mask, (channel, _)| mask | channel_bit(channel));
            header.put_u16(mask);
            for (_, view) in gt.channels() {
                header.put_u32(checked_u32(view.len(), "channel length")?);
                data.put_slice(view);
            }
        }
        match entry.mendelian_variants() {
            Some(blob) => {
                header.put_u8(1);
                header.put_u32(checked_u32(blob.len(), "mendelian blob")?);
                data.put_slice(blob);
            }
            None => header.put_u8(0),
        }
        header.unsplit(data);
        Ok(header.freeze())
    }

    pub fn decode_header(row: &Bytes) -> Result<RowHeader> {
        let mut buf = row.clone();
        read_header(&mut buf)
    }

    /// Decode a row. Every channel view is a slice of `row`.
    pub fn decode(row: Bytes) -> Result<(RowHeader, SampleIndexEntry)> {
        let mut buf = row.clone();
        let header = read_header(&mut buf)?;

        let buckets = get_u16(&mut buf)? as usize;
        let mut layouts = Vec::with_capacity(buckets);
        for _ in 0..buckets {
            let genotype = get_str(&mut buf)?;
            let count = get_u32(&mut buf)? as usize;
            let mask = get_u16(&mut buf)?;
            let mut lengths = Vec::new();
            for channel in Channel::ALL {
                if mask & channel_bit(channel) != 0 {
                    lengths.push((channel, get_u32(&mut buf)? as usize));
                }
            }
            layouts.push((genotype, count, lengths));
        }
        let mendelian_length = match get_u8(&mut buf)? {
            0 => None,
            1 => Some(get_u32(&mut buf)? as usize),
            other => return Err(Error::Decode(format!("invalid mendelian flag {}", other))),
        };

        let mut offset = row.len() - buf.remaining();
        let mut gts = Vec::with_capacity(layouts.len());
        for (genotype, count, lengths) in layouts {
            let mut views = BTreeMap::new();
            for (channel, length) in lengths {
                views.insert(channel, ChannelView::slice(&row, offset, length)?);
                offset += length;
            }
            gts.push(SampleIndexGtEntry::new(&genotype, count, views));
        }
        let mendelian = match mendelian_length {
            Some(length) => Some(ChannelView::slice(&row, offset, length)?),
            None => None,
        };

        let entry = SampleIndexEntry::new(
            &header.sample_id,
            header.chunk.clone(),
            gts,
            mendelian,
            header.discrepancies,
        );
        Ok((header, entry))
    }
}

fn read_header(buf: &mut Bytes) -> Result<RowHeader> {
    need(buf, MAGIC.len())?;
    if &buf[..MAGIC.len()] != MAGIC {
        return Err(Error::Decode("not a sample index row".to_string()));
    }
    buf.advance(MAGIC.len());
    let format = get_u16(buf)?;
    if format != FORMAT_VERSION {
        return Err(Error::Decode(format!("unsupported row format {}", format)));
    }
    let schema_version = get_u32(buf)?;
    let sample_id = get_str(buf)?;
    let chromosome = get_str(buf)?;
    let batch_start = get_u32(buf)?;
    let discrepancies = get_u32(buf)?;
    Ok(RowHeader {
        schema_version,
        sample_id,
        chunk: SampleIndexEntryChunk::new(&chromosome, batch_start),
        discrepancies,
    })
}

fn channel_bit(channel: Channel) -> u16 {
    1 << (channel as u16)
}

fn checked_u16(value: usize, what: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| Error::InvalidInput(format!("too many {}: {}", what, value)))
}

fn checked_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::InvalidInput(format!("{} too large: {}", what, value)))
}

fn put_str(buf: &mut BytesMut, value: &str) -> Result<()> {
    buf.put_u16(checked_u16(value.len(), "string bytes")?);
    buf.put_slice(value.as_bytes());
    Ok(())
}

fn need(buf: &Bytes, n: usize) -> Result<()> {
    if buf.remaining() < n {
        return Err(Error::bounds("row header", n, buf.remaining()));
    }
    Ok(())
}

fn get_u8(buf: &mut Bytes) -> Result<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

fn get_u16(buf: &mut Bytes) -> Result<u16> {
    need(buf, 2)?;
    Ok(buf.get_u16())
}

fn get_u32(buf: &mut Bytes) -> Result<u32> {
    need(buf, 4)?;
    Ok(buf.get_u32())
}

fn get_str(buf: &mut Bytes) -> Result<String> {
    let len = get_u16(buf)? as usize;
    need(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|e| Error::Decode(format!("invalid string in row: {}", e)))
}
