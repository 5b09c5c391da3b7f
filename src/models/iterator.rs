//! Single-pass cursor over one genotype bucket.
//!
//! [`SampleIndexEntryIterator::next_sample_index_variant`] (and the
//! `Iterator` impl) decode one element from every channel at once and are the
//! surface most callers want. The per-channel accessors are the low-level
//! hot path: each may be called at most once per element, a second call
//! returns [`Error::CursorMisuse`]. Sequential channels (file index, file data
//! and the ct/bt/tf combinations) catch up by themselves when an accessor was
//! not called for earlier elements.

use super::entry::{Channel, SampleIndexEntry, SampleIndexGtEntry};
use super::mendelian::MendelianRecord;
use super::variant::{SampleIndexVariant, Variant};
use crate::codec::{BitBuffer, BitReader, read_at, read_variant};
use crate::schema::{AnnotationIndexEntry, AnnotationSummary, CombinationTriple, CombinationTripleField, SampleIndexSchema};
use crate::{Error, Result};
use bytes::Bytes;

/// Accessors already used for the current element.
#[derive(Debug, Default, Clone, Copy)]
struct StepState {
    genotype: bool,
    parents: bool,
    annotation: bool,
    /// Ordinal of the last file-index entry read for this element.
    file_entry: Option<usize>,
    /// Ordinal of the file-index entry whose data was last read.
    file_data: Option<usize>,
}

pub struct SampleIndexEntryIterator<'a> {
    entry: &'a SampleIndexEntry,
    gt: &'a SampleIndexGtEntry,
    schema: &'a SampleIndexSchema,
    count: usize,

    variants_offset: usize,
    next_index: usize,
    next_non_intergenic_index: usize,
    next_clinical_index: usize,

    // file index: ordinal of the first entry of element `file_element`
    file_cursor: usize,
    file_element: usize,
    // file data: byte offset of entry number `data_entry`
    data_offset: usize,
    data_entry: usize,
    // ct/bt/tf: bit position of non-intergenic element `combination_element`
    combination_bit: usize,
    combination_element: usize,

    step: StepState,
    annotation: AnnotationIndexEntry,
    spare_triple: Option<CombinationTriple>,
    // ascending by start; `mendelian_cursor` is the first record not before the current element
    mendelian: Vec<MendelianRecord>,
    mendelian_cursor: usize,
}

impl<'a> SampleIndexEntryIterator<'a> {
    pub fn new(
        entry: &'a SampleIndexEntry,
        gt: &'a SampleIndexGtEntry,
        schema: &'a SampleIndexSchema,
    ) -> Result<Self> {
        let mut mendelian = Vec::new();
        if entry.mendelian_variants().is_some() {
            for record in entry.mendelian_errors() {
                let record = record?;
                if record.genotype == gt.genotype() {
                    mendelian.push(record);
                }
            }
            mendelian.sort_by_key(|record| record.variant.start);
        }
        Ok(Self {
            entry,
            gt,
            schema,
            count: gt.count(),
            variants_offset: 0,
            next_index: 0,
            next_non_intergenic_index: 0,
            next_clinical_index: 0,
            file_cursor: 0,
            file_element: 0,
            data_offset: 0,
            data_entry: 0,
            combination_bit: 0,
            combination_element: 0,
            step: StepState::default(),
            annotation: AnnotationIndexEntry::default(),
            spare_triple: None,
            mendelian,
            mendelian_cursor: 0,
        })
    }

    /// Iterator over the bucket of `genotype`, or `None` if the entry has no such bucket.
    pub fn for_genotype(
        entry: &'a SampleIndexEntry,
        genotype: &str,
        schema: &'a SampleIndexSchema,
    ) -> Result<Option<Self>> {
        match entry.gt_entry(genotype) {
            Some(gt) => Self::new(entry, gt, schema).map(Some),
            None => Ok(None),
        }
    }

    pub fn genotype(&self) -> &'a str {
        self.gt.genotype()
    }

    /// Whether another element is available. Has no side effects.
    pub fn has_next(&self) -> bool {
        match self.gt.variants() {
            Some(variants) => self.variants_offset < variants.len(),
            None => self.next_index < self.count,
        }
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    pub fn next_non_intergenic_index(&self) -> usize {
        self.next_non_intergenic_index
    }

    pub fn next_clinical_index(&self) -> usize {
        self.next_clinical_index
    }

    /// Elements left, by the bucket's declared count.
    pub fn approx_size(&self) -> usize {
        self.count.saturating_sub(self.next_index)
    }

    /// Whether only counting is possible (no "variants" channel).
    pub fn is_count_only(&self) -> bool {
        self.gt.variants().is_none()
    }

    fn ensure_next(&self) -> Result<()> {
        if self.has_next() { Ok(()) } else { Err(Error::Exhausted) }
    }

    fn channel(&self, channel: Channel) -> Result<&'a Bytes> {
        self.gt
            .channel(channel)
            .ok_or(Error::MissingChannel(channel.name()))
    }

    fn summary_at(&self, index: usize) -> Result<Option<u8>> {
        match self.gt.annotation_index() {
            Some(view) => view
                .get(index)
                .copied()
                .map(Some)
                .ok_or_else(|| Error::bounds("annotationIndex", index + 1, view.len())),
            None => Ok(None),
        }
    }

    /// Decode the current element's coordinates and move to the following element.
    pub fn next_variant(&mut self) -> Result<Variant> {
        self.ensure_next()?;
        let variants = self.channel(Channel::Variants)?;
        self.check_count()?;
        let element = read_variant(variants, self.variants_offset)?;
        let variant = Variant::from_element(self.entry.chromosome(), self.entry.batch_start(), &element)?;
        let length = element.length;
        self.advance(length)?;
        Ok(variant)
    }

    /// Same cursor movement as [`Self::next_variant`] without building the variant.
    pub fn skip_variant(&mut self) -> Result<()> {
        self.ensure_next()?;
        let length = match self.gt.variants() {
            Some(variants) => {
                self.check_count()?;
                read_variant(variants, self.variants_offset)?.length
            }
            None => 0,
        };
        self.advance(length)
    }

    fn check_count(&self) -> Result<()> {
        if self.count > 0 && self.next_index >= self.count {
            return Err(Error::Bounds(format!(
                "variants channel holds more than the {} declared elements",
                self.count
            )));
        }
        Ok(())
    }

    fn advance(&mut self, element_length: usize) -> Result<()> {
        if let Some(summary) = self.summary_at(self.next_index)? {
            if AnnotationSummary::is_non_intergenic(summary) {
                self.next_non_intergenic_index += 1;
            }
            if AnnotationSummary::is_clinical(summary) {
                self.next_clinical_index += 1;
            }
        }
        self.variants_offset += element_length;
        self.next_index += 1;
        self.step = StepState::default();
        Ok(())
    }

    pub fn next_genotype(&mut self) -> Result<&'a str> {
        self.ensure_next()?;
        if self.step.genotype {
            return Err(Error::CursorMisuse("genotype already read for this element".to_string()));
        }
        self.step.genotype = true;
        Ok(self.gt.genotype())
    }

    pub fn next_parents_index_entry(&mut self) -> Result<u8> {
        self.ensure_next()?;
        let parents = self.channel(Channel::Parents)?;
        if self.step.parents {
            return Err(Error::CursorMisuse("parents already read for this element".to_string()));
        }
        let code = *parents
            .get(self.next_index)
            .ok_or_else(|| Error::bounds("parentsIndex", self.next_index + 1, parents.len()))?;
        self.step.parents = true;
        Ok(code)
    }

    // --- file index -------------------------------------------------------

    fn group_end(&self, view: &[u8], first: usize) -> Result<usize> {
        let schema = self.schema.file_index();
        let mut ordinal = first;
        while schema.is_multi_file_at(view, ordinal)? {
            ordinal += 1;
        }
        Ok(ordinal + 1)
    }

    /// First file-index entry of the current element.
    pub fn next_file_index_entry(&mut self) -> Result<BitBuffer> {
        self.ensure_next()?;
        let view = self.channel(Channel::FileIndex)?;
        if self.step.file_entry.is_some() {
            return Err(Error::CursorMisuse("file index already read for this element".to_string()));
        }
        while self.file_element < self.next_index {
            self.file_cursor = self.group_end(view, self.file_cursor)?;
            self.file_element += 1;
        }
        let entry = self.schema.file_index().read_entry(view, self.file_cursor)?;
        self.step.file_entry = Some(self.file_cursor);
        Ok(entry)
    }

    /// Whether the last file-index entry read for this element has another one after it.
    pub fn is_multi_file_index(&self) -> Result<bool> {
        match self.step.file_entry {
            Some(ordinal) => {
                let view = self.channel(Channel::FileIndex)?;
                self.schema.file_index().is_multi_file_at(view, ordinal)
            }
            None => Ok(false),
        }
    }

    pub fn next_multi_file_index_entry(&mut self) -> Result<BitBuffer> {
        self.ensure_next()?;
        let view = self.channel(Channel::FileIndex)?;
        let Some(ordinal) = self.step.file_entry else {
            return Err(Error::CursorMisuse(
                "multi-file entry requested before the first file index entry".to_string(),
            ));
        };
        if !self.schema.file_index().is_multi_file_at(view, ordinal)? {
            return Err(Error::CursorMisuse("element has no further file entries".to_string()));
        }
        let entry = self.schema.file_index().read_entry(view, ordinal + 1)?;
        self.step.file_entry = Some(ordinal + 1);
        Ok(entry)
    }

    /// Payload for the file-index entry read last, as a view of the row buffer.
    pub fn file_data_entry(&mut self) -> Result<Bytes> {
        self.ensure_next()?;
        let view = self.channel(Channel::FileData)?;
        let Some(target) = self.step.file_entry else {
            return Err(Error::CursorMisuse("file data requested before file index".to_string()));
        };
        if self.step.file_data == Some(target) {
            return Err(Error::CursorMisuse("file data already read for this file entry".to_string()));
        }
        let schema = self.schema.file_data();
        while self.data_entry < target {
            let (_, next) = schema.read_entry(view, self.data_offset)?;
            self.data_offset = next;
            self.data_entry += 1;
        }
        let ((start, end), next) = schema.read_entry(view, self.data_offset)?;
        self.data_offset = next;
        self.data_entry += 1;
        self.step.file_data = Some(target);
        Ok(view.slice(start..end))
    }

    // --- annotation -------------------------------------------------------

    /// Owned copy of the current element's annotation.
    pub fn next_annotation_index_entry(&mut self) -> Result<AnnotationIndexEntry> {
        self.next_annotation_index_entry_ref().cloned()
    }

    /// Decode into the reused buffer. The reference is only valid until the next call.
    pub(crate) fn next_annotation_index_entry_ref(&mut self) -> Result<&AnnotationIndexEntry> {
        self.ensure_next()?;
        let summary_view = self.channel(Channel::Annotation)?;
        if self.step.annotation {
            return Err(Error::CursorMisuse("annotation already read for this element".to_string()));
        }
        let summary = *summary_view
            .get(self.next_index)
            .ok_or_else(|| Error::bounds("annotationIndex", self.next_index + 1, summary_view.len()))?;

        let mut annotation = std::mem::take(&mut self.annotation);
        annotation.reset();
        let decoded = self.decode_annotation(summary, &mut annotation);
        self.annotation = annotation;
        decoded?;
        self.step.annotation = true;
        Ok(&self.annotation)
    }

    fn decode_annotation(&mut self, summary: u8, out: &mut AnnotationIndexEntry) -> Result<()> {
        let gt = self.gt;
        let schema = self.schema;
        let schema = schema.annotation();
        out.summary = summary;
        let mut spare = out.ct_bt_tf.take().or_else(|| self.spare_triple.take());

        if AnnotationSummary::is_non_intergenic(summary) {
            let nni = self.next_non_intergenic_index;
            let ct = self.fixed_code(Channel::ConsequenceType, nni, schema.consequence_type.bit_length())?;
            let bt = self.fixed_code(Channel::Biotype, nni, schema.biotype.bit_length())?;
            let tf = self.fixed_code(Channel::TranscriptFlag, nni, schema.transcript_flag.bit_length())?;
            out.consequence_type = ct;
            out.biotype = bt;
            out.transcript_flag = tf;
            if let (Some(ct), Some(bt), Some(tf)) = (ct, bt, tf) {
                if ct != 0 && bt != 0 && tf != 0 {
                    if let Some(view) = gt.channel(Channel::CtBtTf) {
                        let mut triple = spare.take().unwrap_or_default();
                        self.read_combination(view, nni, ct, bt, tf, &mut triple)?;
                        out.ct_bt_tf = Some(triple);
                    }
                }
            }
        }
        if spare.is_some() {
            self.spare_triple = spare;
        }

        if let Some(view) = gt.channel(Channel::PopulationFrequency) {
            out.population_frequency = Some(schema.population_frequency.read(view, self.next_index)?);
        }
        if AnnotationSummary::is_clinical(summary) {
            if let Some(view) = gt.channel(Channel::Clinical) {
                out.clinical = Some(schema.clinical.read(view, self.next_clinical_index)?);
            }
        }
        Ok(())
    }

    fn fixed_code(&self, channel: Channel, index: usize, bits: u32) -> Result<Option<u64>> {
        match self.gt.channel(channel) {
            Some(view) => read_at(view, index * bits as usize, bits).map(Some),
            None => Ok(None),
        }
    }

    /// Position the combination reader on non-intergenic element `nni` and decode it.
    fn read_combination(
        &mut self,
        view: &[u8],
        nni: usize,
        ct: u64,
        bt: u64,
        tf: u64,
        out: &mut CombinationTriple,
    ) -> Result<()> {
        let schema = self.schema;
        let schema = schema.annotation();
        while self.combination_element < nni {
            let element = self.combination_element;
            let width = match (
                self.fixed_code(Channel::ConsequenceType, element, schema.consequence_type.bit_length())?,
                self.fixed_code(Channel::Biotype, element, schema.biotype.bit_length())?,
                self.fixed_code(Channel::TranscriptFlag, element, schema.transcript_flag.bit_length())?,
            ) {
                (Some(x), Some(y), Some(z)) => CombinationTripleField::element_bits(x, y, z),
                _ => 0,
            };
            self.combination_bit += width;
            self.combination_element += 1;
        }
        let mut reader = BitReader::new(view);
        reader.seek(self.combination_bit)?;
        schema.ct_bt_tf.read_into(&mut reader, ct, bt, tf, out)?;
        self.combination_bit = reader.position();
        self.combination_element += 1;
        Ok(())
    }

    // --- composed -----------------------------------------------------------

    /// Decode every present channel for the current element and advance.
    pub fn next_sample_index_variant(&mut self) -> Result<SampleIndexVariant> {
        self.ensure_next()?;
        if self.step.genotype
            || self.step.parents
            || self.step.annotation
            || self.step.file_entry.is_some()
        {
            return Err(Error::CursorMisuse(
                "element partially consumed through low-level accessors".to_string(),
            ));
        }

        let annotation = if self.gt.has_channel(Channel::Annotation) {
            Some(self.next_annotation_index_entry_ref()?.clone())
        } else {
            None
        };

        let mut file_index = Vec::new();
        let mut file_data = Vec::new();
        if self.gt.has_channel(Channel::FileIndex) {
            let with_data = self.gt.has_channel(Channel::FileData);
            file_index.push(self.next_file_index_entry()?);
            if with_data {
                file_data.push(Bytes::copy_from_slice(&self.file_data_entry()?));
            }
            while self.is_multi_file_index()? {
                file_index.push(self.next_multi_file_index_entry()?);
                if with_data {
                    file_data.push(Bytes::copy_from_slice(&self.file_data_entry()?));
                }
            }
        }

        let parents_code = if self.gt.has_channel(Channel::Parents) {
            Some(self.next_parents_index_entry()?)
        } else {
            None
        };
        let genotype = self.next_genotype()?.to_string();
        let variant = self.next_variant()?;
        let mendelian_code = self.mendelian_code(&variant);

        Ok(SampleIndexVariant {
            variant,
            genotype,
            file_index,
            file_data,
            annotation,
            parents_code,
            mendelian_code,
        })
    }
}

impl SampleIndexEntryIterator<'_> {
    /// Code of the mendelian record matching `variant`. Elements arrive in ascending
    /// order, so records before `variant` are never looked at again.
    fn mendelian_code(&mut self, variant: &Variant) -> Option<u8> {
        while self
            .mendelian
            .get(self.mendelian_cursor)
            .is_some_and(|record| record.variant.start < variant.start)
        {
            self.mendelian_cursor += 1;
        }
        self.mendelian[self.mendelian_cursor..]
            .iter()
            .take_while(|record| record.variant.start == variant.start)
            .find(|record| record.variant == *variant)
            .map(|record| record.code)
    }
}

impl Iterator for SampleIndexEntryIterator<'_> {
    type Item = Result<SampleIndexVariant>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let item = self.next_sample_index_variant();
        if item.is_err() {
            // a corrupted bucket fails as a whole
            self.variants_offset = usize::MAX;
            self.next_index = self.count;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::builder::{
        IndexedFile, IndexedVariant, SampleIndexEntryBuilder, TranscriptAnnotation, VariantAnnotation,
    };
    use crate::models::entry::ChannelView;
    use crate::schema::{FieldInput, FileData};
    use std::collections::BTreeMap;

    fn schema() -> SampleIndexSchema {
        SampleIndexSchema::default_schema().unwrap()
    }

    fn small_chunk_schema() -> SampleIndexSchema {
        let mut configuration = crate::schema::SampleIndexConfiguration::default_configuration();
        configuration.chunk_size = 1000;
        SampleIndexSchema::new(1, &configuration).unwrap()
    }

    fn snv(position: u32) -> IndexedVariant {
        IndexedVariant::new(Variant::new("1", position, "A", "C"))
    }

    fn file(position: u32, qual: f64) -> IndexedFile {
        let mut fields = BTreeMap::new();
        fields.insert("QUAL".to_string(), FieldInput::Number(qual));
        fields.insert("FILTER".to_string(), FieldInput::term("PASS"));
        IndexedFile {
            file_position: position,
            fields,
            data: FileData {
                original_call: Some(format!("call-{}", position)),
                secondary_alternates: vec![],
            },
        }
    }

    fn annotation(ct: &str, clinical: bool) -> VariantAnnotation {
        VariantAnnotation {
            transcripts: vec![TranscriptAnnotation {
                consequence_types: vec![ct.to_string()],
                biotype: "protein_coding".to_string(),
                flags: vec!["canonical".to_string(), "basic".to_string()],
            }],
            population_frequencies: BTreeMap::new(),
            clinical: if clinical {
                vec![("clinvar".to_string(), "pathogenic".to_string())]
            } else {
                vec![]
            },
        }
    }

    fn three_variant_entry(schema: &SampleIndexSchema) -> SampleIndexEntry {
        let mut builder = SampleIndexEntryBuilder::new(schema, "s1", "1", 0);
        for position in [400, 100, 250] {
            builder.add("0/1", snv(position)).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_iterates_in_position_order() {
        let schema = small_chunk_schema();
        let entry = three_variant_entry(&schema);
        let iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        let variants: Vec<SampleIndexVariant> = iter.collect::<Result<_>>().unwrap();
        let positions: Vec<u32> = variants.iter().map(|v| v.variant.start).collect();
        assert_eq!(positions, vec![100, 250, 400]);
        assert!(variants.iter().all(|v| v.genotype == "0/1"));
        assert!(variants.iter().all(|v| v.variant.chromosome == "1"));
    }

    #[test]
    fn test_skip_after_first_returns_third() {
        let schema = small_chunk_schema();
        let entry = three_variant_entry(&schema);
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        assert_eq!(iter.next_variant().unwrap().start, 100);
        iter.skip_variant().unwrap();
        assert_eq!(iter.next_variant().unwrap().start, 400);
        assert!(!iter.has_next());
    }

    #[test]
    fn test_skip_is_next_and_discard() {
        let schema = schema();
        let entry = three_variant_entry(&schema);
        let gt = entry.gt_entry("0/1").unwrap();

        let mut plain = SampleIndexEntryIterator::new(&entry, gt, &schema).unwrap();
        plain.next_variant().unwrap();
        let second_plain = plain.next_variant().unwrap();

        let mut skipping = SampleIndexEntryIterator::new(&entry, gt, &schema).unwrap();
        skipping.skip_variant().unwrap();
        assert_eq!(skipping.next_variant().unwrap(), second_plain);
        assert_eq!(skipping.next_index(), plain.next_index());
    }

    #[test]
    fn test_has_next_true_exactly_count_times() {
        let schema = schema();
        let entry = three_variant_entry(&schema);
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        let mut seen = 0;
        while iter.has_next() {
            assert!(iter.has_next(), "has_next has no side effects");
            iter.next_variant().unwrap();
            seen += 1;
        }
        assert_eq!(seen, 3);
        assert!(matches!(iter.next_variant(), Err(Error::Exhausted)));
        assert!(matches!(iter.skip_variant(), Err(Error::Exhausted)));
        assert!(iter.next_sample_index_variant().is_err());
        assert_eq!(iter.approx_size(), 0);
    }

    #[test]
    fn test_missing_genotype_bucket() {
        let schema = schema();
        let entry = three_variant_entry(&schema);
        assert!(
            SampleIndexEntryIterator::for_genotype(&entry, "1/1", &schema)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_count_only_bucket() {
        let schema = schema();
        let gt = SampleIndexGtEntry::new("0/1", 2, BTreeMap::new());
        let entry = SampleIndexEntry::new(
            "s1",
            crate::models::SampleIndexEntryChunk::new("1", 0),
            vec![gt.clone()],
            None,
            0,
        );
        let mut iter = SampleIndexEntryIterator::new(&entry, entry.gt_entry("0/1").unwrap(), &schema).unwrap();
        assert!(iter.is_count_only());
        assert!(matches!(iter.next_variant(), Err(Error::MissingChannel("variants"))));
        iter.skip_variant().unwrap();
        iter.skip_variant().unwrap();
        assert!(!iter.has_next());
    }

    #[test]
    fn test_more_elements_than_count_is_bounds_error() {
        let schema = schema();
        let full = three_variant_entry(&schema);
        let variants = full.gt_entry("0/1").unwrap().variants().unwrap().clone();
        let mut channels = BTreeMap::new();
        channels.insert(Channel::Variants, variants);
        let gt = SampleIndexGtEntry::new("0/1", 2, channels);
        let entry = SampleIndexEntry::new("s1", full.chunk().clone(), vec![gt], None, 0);
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        iter.next_variant().unwrap();
        iter.next_variant().unwrap();
        assert!(iter.has_next());
        assert!(matches!(iter.next_variant(), Err(Error::Bounds(_))));
    }

    #[test]
    fn test_truncated_variants_channel_fails() {
        let schema = schema();
        let full = three_variant_entry(&schema);
        let variants = full.gt_entry("0/1").unwrap().variants().unwrap();
        let mut channels = BTreeMap::new();
        channels.insert(Channel::Variants, ChannelView::slice(variants, 0, 7).unwrap());
        let gt = SampleIndexGtEntry::new("0/1", 3, channels);
        let entry = SampleIndexEntry::new("s1", full.chunk().clone(), vec![gt], None, 0);
        let iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        let results: Vec<_> = iter.collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok() && results[1].is_ok());
        assert!(matches!(results[2], Err(Error::Bounds(_))));
    }

    #[test]
    fn test_corrupt_file_data_length_fails() {
        let schema = schema();
        let mut builder = SampleIndexEntryBuilder::new(&schema, "s1", "1", 0);
        builder.add("0/1", snv(10)).unwrap();
        let full = builder.build().unwrap();
        let source = full.gt_entry("0/1").unwrap();
        let mut corrupt = vec![0xFF; 9];
        corrupt.push(0x01);
        let mut channels = BTreeMap::new();
        channels.insert(Channel::Variants, source.variants().unwrap().clone());
        channels.insert(Channel::FileIndex, source.file_index().unwrap().clone());
        channels.insert(Channel::FileData, bytes::Bytes::from(corrupt));
        let gt = SampleIndexGtEntry::new("0/1", 1, channels);
        let entry = SampleIndexEntry::new("s1", full.chunk().clone(), vec![gt], None, 0);
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        assert!(matches!(iter.next_sample_index_variant(), Err(Error::Bounds(_))));
    }

    fn multi_file_entry(schema: &SampleIndexSchema) -> SampleIndexEntry {
        let mut builder = SampleIndexEntryBuilder::new(schema, "s1", "1", 0);
        builder
            .add("0/1", snv(10).with_files(vec![file(0, 5.0)]))
            .unwrap()
            .add("0/1", snv(20).with_files(vec![file(0, 15.0), file(1, 25.0), file(2, 35.0)]))
            .unwrap()
            .add("0/1", snv(30).with_files(vec![file(3, 25.0)]))
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_multi_file_entries() {
        let schema = schema();
        let entry = multi_file_entry(&schema);
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        let file_schema = schema.file_index();

        let first = iter.next_file_index_entry().unwrap();
        assert!(!iter.is_multi_file_index().unwrap());
        assert!(matches!(iter.next_multi_file_index_entry(), Err(Error::CursorMisuse(_))));
        assert_eq!(file_schema.file_position(&first).unwrap(), 0);
        iter.next_variant().unwrap();

        let mut entries = vec![iter.next_file_index_entry().unwrap()];
        let mut data = vec![iter.file_data_entry().unwrap()];
        let mut repeats = 0;
        while iter.is_multi_file_index().unwrap() {
            entries.push(iter.next_multi_file_index_entry().unwrap());
            data.push(iter.file_data_entry().unwrap());
            repeats += 1;
        }
        assert_eq!(repeats, 2);
        let positions: Vec<u64> = entries.iter().map(|e| file_schema.file_position(e).unwrap()).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_ne!(entries[0], entries[1]);
        assert_ne!(entries[1], entries[2]);
        let calls: Vec<_> = data
            .iter()
            .map(|d| schema.file_data().read_original_call(d).unwrap().unwrap())
            .collect();
        assert_eq!(calls, vec!["call-0", "call-1", "call-2"]);
        assert_eq!(iter.next_variant().unwrap().start, 20);

        let last = iter.next_file_index_entry().unwrap();
        assert_eq!(file_schema.file_position(&last).unwrap(), 3);
        let qual = file_schema.custom_field("QUAL").unwrap();
        assert_eq!(qual.decode(qual.read(&last).unwrap()).unwrap(), vec!["[20, 30)"]);
    }

    #[test]
    fn test_skipped_file_accessors_catch_up() {
        let schema = schema();
        let entry = multi_file_entry(&schema);
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        iter.skip_variant().unwrap();
        iter.skip_variant().unwrap();
        let entry3 = iter.next_file_index_entry().unwrap();
        assert_eq!(schema.file_index().file_position(&entry3).unwrap(), 3);
        let data = iter.file_data_entry().unwrap();
        assert_eq!(
            schema.file_data().read_original_call(&data).unwrap().as_deref(),
            Some("call-3")
        );
    }

    #[test]
    fn test_repeated_accessors_are_rejected() {
        let schema = schema();
        let mut builder = SampleIndexEntryBuilder::new(&schema, "s1", "1", 0);
        builder
            .add(
                "0/1",
                snv(10)
                    .with_annotation(annotation("stop_gained", false))
                    .with_parents(Some("0/0"), Some("0/1")),
            )
            .unwrap()
            .add("0/1", snv(20))
            .unwrap();
        let entry = builder.build().unwrap();
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();

        assert!(matches!(iter.file_data_entry(), Err(Error::CursorMisuse(_))));
        iter.next_genotype().unwrap();
        assert!(matches!(iter.next_genotype(), Err(Error::CursorMisuse(_))));
        iter.next_parents_index_entry().unwrap();
        assert!(matches!(iter.next_parents_index_entry(), Err(Error::CursorMisuse(_))));
        iter.next_annotation_index_entry().unwrap();
        assert!(matches!(iter.next_annotation_index_entry(), Err(Error::CursorMisuse(_))));
        iter.next_file_index_entry().unwrap();
        assert!(matches!(iter.next_file_index_entry(), Err(Error::CursorMisuse(_))));
        iter.file_data_entry().unwrap();
        assert!(matches!(iter.file_data_entry(), Err(Error::CursorMisuse(_))));
        assert!(matches!(iter.next_sample_index_variant(), Err(Error::CursorMisuse(_))));

        iter.next_variant().unwrap();
        // the following element starts with a clean slate
        assert_eq!(iter.next_genotype().unwrap(), "0/1");
        let second = iter.next_annotation_index_entry().unwrap();
        assert!(second.is_intergenic());
    }

    #[test]
    fn test_annotation_snapshot_outlives_the_step() {
        let schema = schema();
        let mut builder = SampleIndexEntryBuilder::new(&schema, "s1", "1", 0);
        builder
            .add("0/1", snv(10).with_annotation(annotation("stop_gained", true)))
            .unwrap()
            .add("0/1", snv(20).with_annotation(annotation("missense_variant", false)))
            .unwrap()
            .add("0/1", snv(30))
            .unwrap();
        let entry = builder.build().unwrap();
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();

        let first = iter.next_sample_index_variant().unwrap();
        let snapshot = first.annotation.clone().unwrap();
        let second = iter.next_sample_index_variant().unwrap();
        let third = iter.next_sample_index_variant().unwrap();

        let first_annotation = first.annotation.as_ref().unwrap();
        assert_eq!(first_annotation, &snapshot);
        assert!(first_annotation.has(AnnotationSummary::LOF | AnnotationSummary::CLINICAL));
        assert!(first_annotation.clinical.is_some());
        let ct = schema.annotation().consequence_type.encode_term("stop_gained");
        assert_eq!(first_annotation.consequence_type, Some(ct));
        let triple = first_annotation.ct_bt_tf.as_ref().unwrap();
        let bt = schema.annotation().biotype.encode_term("protein_coding");
        let tf = schema.annotation().transcript_flag.encode_term("basic");
        assert!(triple.contains(ct, bt, tf));

        let second_annotation = second.annotation.unwrap();
        assert!(second_annotation.has(AnnotationSummary::MISSENSE));
        assert!(second_annotation.clinical.is_none());
        assert_ne!(&second_annotation, first_annotation);

        assert!(third.annotation.unwrap().is_intergenic());
        assert_eq!(iter.next_non_intergenic_index(), 2);
        assert_eq!(iter.next_clinical_index(), 1);
    }

    #[test]
    fn test_combination_channel_catches_up() {
        let schema = schema();
        let mut builder = SampleIndexEntryBuilder::new(&schema, "s1", "1", 0);
        builder
            .add("0/1", snv(10).with_annotation(annotation("stop_gained", false)))
            .unwrap()
            .add("0/1", snv(20).with_annotation(annotation("missense_variant", true)))
            .unwrap();
        let entry = builder.build().unwrap();
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        iter.skip_variant().unwrap();
        let annotation = iter.next_annotation_index_entry().unwrap();
        let ct = schema.annotation().consequence_type.encode_term("missense_variant");
        let bt = schema.annotation().biotype.encode_term("protein_coding");
        let tf = schema.annotation().transcript_flag.encode_term("canonical");
        assert!(annotation.ct_bt_tf.unwrap().contains(ct, bt, tf));
        assert!(annotation.clinical.is_some());
    }

    #[test]
    fn test_mendelian_codes_are_attached() {
        let schema = schema();
        let mut builder = SampleIndexEntryBuilder::new(&schema, "s1", "1", 0);
        builder
            .add("0/1", snv(10).with_parents(Some("0/0"), Some("0/0")))
            .unwrap()
            .add("0/1", snv(20).with_parents(Some("0/1"), Some("0/0")))
            .unwrap()
            .add_mendelian_error(Variant::new("1", 10, "A", "C"), "0/1", 8)
            .unwrap();
        let entry = builder.build().unwrap();
        let variants: Vec<_> = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(variants[0].mendelian_code, Some(8));
        assert_eq!(variants[0].father_genotype().unwrap(), Some("0/0"));
        assert_eq!(variants[1].mendelian_code, None);
        assert_eq!(variants[1].father_genotype().unwrap(), Some("0/1"));
    }

    #[test]
    fn test_mendelian_codes_follow_skips_and_shared_positions() {
        let schema = schema();
        let mut builder = SampleIndexEntryBuilder::new(&schema, "s1", "1", 0);
        for (position, alternate) in [(10, "C"), (20, "G"), (20, "T"), (30, "C"), (40, "C")] {
            builder
                .add("0/1", IndexedVariant::new(Variant::new("1", position, "A", alternate)))
                .unwrap();
        }
        builder
            .add_mendelian_error(Variant::new("1", 40, "A", "C"), "0/1", 9)
            .unwrap()
            .add_mendelian_error(Variant::new("1", 20, "A", "T"), "0/1", 5)
            .unwrap()
            .add_mendelian_error(Variant::new("1", 10, "A", "C"), "0/1", 1)
            .unwrap()
            .add_mendelian_error(Variant::new("1", 30, "A", "C"), "1/1", 6)
            .unwrap();
        let entry = builder.build().unwrap();
        let mut iter = SampleIndexEntryIterator::for_genotype(&entry, "0/1", &schema)
            .unwrap()
            .unwrap();
        iter.skip_variant().unwrap();
        let codes: Vec<_> = iter
            .map(|v| v.map(|v| (v.variant.to_string(), v.mendelian_code)))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            codes,
            vec![
                ("1:20:A:G".to_string(), None),
                ("1:20:A:T".to_string(), Some(5)),
                ("1:30:A:C".to_string(), None),
                ("1:40:A:C".to_string(), Some(9)),
            ]
        );
    }
}
