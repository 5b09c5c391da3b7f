use super::chunk::SampleIndexEntryChunk;
use super::mendelian::MendelianErrorIterator;
use crate::schema::AnnotationSummary;
use crate::{Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;

/// Named byte channels of a genotype bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Variants,
    FileIndex,
    FileData,
    Annotation,
    ConsequenceType,
    Biotype,
    TranscriptFlag,
    CtBtTf,
    PopulationFrequency,
    Clinical,
    Parents,
}

impl Channel {
    pub const ALL: [Channel; 11] = [
        Channel::Variants,
        Channel::FileIndex,
        Channel::FileData,
        Channel::Annotation,
        Channel::ConsequenceType,
        Channel::Biotype,
        Channel::TranscriptFlag,
        Channel::CtBtTf,
        Channel::PopulationFrequency,
        Channel::Clinical,
        Channel::Parents,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Variants => "variants",
            Channel::FileIndex => "fileIndex",
            Channel::FileData => "fileData",
            Channel::Annotation => "annotationIndex",
            Channel::ConsequenceType => "consequenceTypeIndex",
            Channel::Biotype => "biotypeIndex",
            Channel::TranscriptFlag => "transcriptFlagIndex",
            Channel::CtBtTf => "ctBtTfIndex",
            Channel::PopulationFrequency => "populationFrequencyIndex",
            Channel::Clinical => "clinicalIndex",
            Channel::Parents => "parentsIndex",
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

/// Checked sub-views of a shared row buffer.
pub struct ChannelView;

impl ChannelView {
    /// `length` bytes of `backing` starting at `offset`, sharing the allocation.
    pub fn slice(backing: &Bytes, offset: usize, length: usize) -> Result<Bytes> {
        let end = offset
            .checked_add(length)
            .ok_or_else(|| Error::Bounds(format!("view {}+{} overflows", offset, length)))?;
        if end > backing.len() {
            return Err(Error::Bounds(format!(
                "view [{}, {}) exceeds backing buffer of {} bytes",
                offset,
                end,
                backing.len()
            )));
        }
        Ok(backing.slice(offset..end))
    }
}

/// One genotype bucket: `count` elements spread over parallel channels.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleIndexGtEntry {
    genotype: String,
    count: usize,
    channels: [Option<Bytes>; 11],
    annotation_counts: Option<[u32; 8]>,
}

impl SampleIndexGtEntry {
    pub fn new(genotype: &str, count: usize, channels: BTreeMap<Channel, Bytes>) -> Self {
        let mut slots: [Option<Bytes>; 11] = Default::default();
        for (channel, view) in channels {
            slots[channel.slot()] = Some(view);
        }
        let annotation_counts = slots[Channel::Annotation.slot()]
            .as_ref()
            .map(|view| count_summary_bits(view));
        Self {
            genotype: genotype.to_string(),
            count,
            channels: slots,
            annotation_counts,
        }
    }

    pub fn genotype(&self) -> &str {
        &self.genotype
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn channel(&self, channel: Channel) -> Option<&Bytes> {
        self.channels[channel.slot()].as_ref()
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channel(channel).is_some()
    }

    /// Present channels in declaration order.
    pub fn channels(&self) -> impl Iterator<Item = (Channel, &Bytes)> {
        Channel::ALL
            .iter()
            .filter_map(|c| self.channel(*c).map(|view| (*c, view)))
    }

    pub fn variants(&self) -> Option<&Bytes> {
        self.channel(Channel::Variants)
    }

    pub fn file_index(&self) -> Option<&Bytes> {
        self.channel(Channel::FileIndex)
    }

    pub fn file_data(&self) -> Option<&Bytes> {
        self.channel(Channel::FileData)
    }

    pub fn annotation_index(&self) -> Option<&Bytes> {
        self.channel(Channel::Annotation)
    }

    pub fn parents_index(&self) -> Option<&Bytes> {
        self.channel(Channel::Parents)
    }

    /// Elements with each summary bit set, indexed by bit position.
    pub fn annotation_counts(&self) -> Option<&[u32; 8]> {
        self.annotation_counts.as_ref()
    }
}

fn count_summary_bits(view: &[u8]) -> [u32; 8] {
    let mut counts = [0u32; 8];
    for summary in view {
        for (bit, count) in counts.iter_mut().enumerate() {
            if summary & (1 << bit) != 0 {
                *count += 1;
            }
        }
    }
    counts
}

/// Everything stored for one sample in one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleIndexEntry {
    sample_id: String,
    chunk: SampleIndexEntryChunk,
    gts: BTreeMap<String, SampleIndexGtEntry>,
    mendelian_variants: Option<Bytes>,
    discrepancies: u32,
}

impl SampleIndexEntry {
    pub fn new(
        sample_id: &str,
        chunk: SampleIndexEntryChunk,
        gts: Vec<SampleIndexGtEntry>,
        mendelian_variants: Option<Bytes>,
        discrepancies: u32,
    ) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            chunk,
            gts: gts
                .into_iter()
                .map(|gt| (gt.genotype().to_string(), gt))
                .collect(),
            mendelian_variants,
            discrepancies,
        }
    }

    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn chunk(&self) -> &SampleIndexEntryChunk {
        &self.chunk
    }

    pub fn chromosome(&self) -> &str {
        &self.chunk.chromosome
    }

    pub fn batch_start(&self) -> u32 {
        self.chunk.batch_start
    }

    /// Bucket of `genotype`, if any variant has that call here.
    pub fn gt_entry(&self, genotype: &str) -> Option<&SampleIndexGtEntry> {
        self.gts.get(genotype)
    }

    pub fn gt_entries(&self) -> impl Iterator<Item = &SampleIndexGtEntry> {
        self.gts.values()
    }

    pub fn genotypes(&self) -> impl Iterator<Item = &str> {
        self.gts.keys().map(String::as_str)
    }

    pub fn mendelian_variants(&self) -> Option<&Bytes> {
        self.mendelian_variants.as_ref()
    }

    pub fn mendelian_errors(&self) -> MendelianErrorIterator<'_> {
        let blob = self.mendelian_variants.as_deref().unwrap_or(&[]);
        MendelianErrorIterator::new(blob, self.chromosome(), self.batch_start())
    }

    pub fn discrepancies(&self) -> u32 {
        self.discrepancies
    }

    /// Total number of variants across every genotype.
    pub fn count(&self) -> usize {
        self.gts.values().map(|gt| gt.count()).sum()
    }

    /// Index of `summary_mask`'s lowest bit, for reading [`SampleIndexGtEntry::annotation_counts`].
    /// `None` for an empty mask.
    pub fn summary_bit(summary_mask: u8) -> Option<usize> {
        (summary_mask != 0).then(|| summary_mask.trailing_zeros() as usize)
    }

    pub fn count_with_summary(&self, summary_mask: u8) -> Option<u32> {
        let bit = Self::summary_bit(summary_mask)?;
        let mut total = 0;
        for gt in self.gts.values() {
            total += gt.annotation_counts()?[bit];
        }
        Some(total)
    }

    pub fn clinical_count(&self) -> Option<u32> {
        self.count_with_summary(AnnotationSummary::CLINICAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_view_bounds() {
        let backing = Bytes::from_static(b"0123456789");
        let view = ChannelView::slice(&backing, 2, 3).unwrap();
        assert_eq!(&view[..], b"234");
        assert!(ChannelView::slice(&backing, 8, 2).is_ok());
        assert!(matches!(ChannelView::slice(&backing, 8, 3), Err(Error::Bounds(_))));
        assert!(matches!(
            ChannelView::slice(&backing, usize::MAX, 2),
            Err(Error::Bounds(_))
        ));
    }

    #[test]
    fn test_gt_entry_accessors_and_counts() {
        let backing = Bytes::from_static(&[
            AnnotationSummary::INTERGENIC,
            AnnotationSummary::LOF | AnnotationSummary::CLINICAL,
            AnnotationSummary::LOF,
            0xAA,
        ]);
        let mut channels = BTreeMap::new();
        channels.insert(Channel::Annotation, ChannelView::slice(&backing, 0, 3).unwrap());
        channels.insert(Channel::Parents, ChannelView::slice(&backing, 3, 1).unwrap());
        let gt = SampleIndexGtEntry::new("0/1", 3, channels);

        assert_eq!(gt.count(), 3);
        assert!(gt.variants().is_none());
        assert!(gt.has_channel(Channel::Parents));
        let counts = gt.annotation_counts().unwrap();
        assert_eq!(counts[SampleIndexEntry::summary_bit(AnnotationSummary::LOF).unwrap()], 2);
        assert_eq!(counts[SampleIndexEntry::summary_bit(AnnotationSummary::INTERGENIC).unwrap()], 1);
        assert_eq!(
            gt.channels().map(|(c, _)| c).collect::<Vec<_>>(),
            vec![Channel::Annotation, Channel::Parents]
        );

        let entry = SampleIndexEntry::new("s1", SampleIndexEntryChunk::new("1", 0), vec![gt], None, 2);
        assert!(entry.gt_entry("0/1").is_some());
        assert!(entry.gt_entry("1/1").is_none());
        assert_eq!(entry.count(), 3);
        assert_eq!(entry.clinical_count(), Some(1));
        assert_eq!(entry.count_with_summary(0), None);
        assert_eq!(SampleIndexEntry::summary_bit(0), None);
        assert_eq!(entry.count_with_summary(AnnotationSummary::LOF), Some(2));
        assert_eq!(entry.discrepancies(), 2);
        assert_eq!(entry.mendelian_errors().count(), 0);
    }
}
