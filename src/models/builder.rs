//! Write path: turns decoded variants into the packed channels of an entry.

use super::chunk::SampleIndexEntryChunk;
use super::entry::{Channel, ChannelView, SampleIndexEntry, SampleIndexGtEntry};
use super::mendelian;
use super::variant::Variant;
use crate::codec::{BitWriter, ParentsCode, write_variant};
use crate::schema::annotation::{BASIC_FLAG, LOF_CONSEQUENCE_TYPES, MISSENSE_VARIANT};
use crate::schema::{
    AnnotationSummary, FieldInput, FileData, PopulationFrequencySchema, SampleIndexSchema,
};
use crate::{Error, Result};
use bytes::Bytes;
use std::collections::BTreeMap;

/// One call of the sample in one source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedFile {
    pub file_position: u32,
    pub fields: BTreeMap<String, FieldInput>,
    pub data: FileData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptAnnotation {
    pub consequence_types: Vec<String>,
    pub biotype: String,
    pub flags: Vec<String>,
}

/// Annotation of a variant; no transcripts means intergenic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantAnnotation {
    pub transcripts: Vec<TranscriptAnnotation>,
    /// Keyed by `study:population`.
    pub population_frequencies: BTreeMap<String, f64>,
    /// `(source, significance)` pairs.
    pub clinical: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedVariant {
    pub variant: Variant,
    pub files: Vec<IndexedFile>,
    pub annotation: Option<VariantAnnotation>,
    pub father_genotype: Option<String>,
    pub mother_genotype: Option<String>,
}

impl IndexedVariant {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            files: vec![IndexedFile::default()],
            annotation: None,
            father_genotype: None,
            mother_genotype: None,
        }
    }

    pub fn with_files(mut self, files: Vec<IndexedFile>) -> Self {
        self.files = files;
        self
    }

    pub fn with_annotation(mut self, annotation: VariantAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn with_parents(mut self, father: Option<&str>, mother: Option<&str>) -> Self {
        self.father_genotype = father.map(str::to_string);
        self.mother_genotype = mother.map(str::to_string);
        self
    }

    fn has_parents(&self) -> bool {
        self.father_genotype.is_some() || self.mother_genotype.is_some()
    }
}

/// Accumulates the variants of one genotype bucket.
#[derive(Debug, Clone, Default)]
pub struct SampleIndexGtEntryBuilder {
    variants: Vec<IndexedVariant>,
}

impl SampleIndexGtEntryBuilder {
    pub fn add(&mut self, variant: IndexedVariant) {
        self.variants.push(variant);
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

pub struct SampleIndexEntryBuilder<'a> {
    schema: &'a SampleIndexSchema,
    sample_id: String,
    chunk: SampleIndexEntryChunk,
    gts: BTreeMap<String, SampleIndexGtEntryBuilder>,
    mendelian: Vec<(Variant, String, u8)>,
    discrepancies: u32,
}

impl<'a> SampleIndexEntryBuilder<'a> {
    pub fn new(schema: &'a SampleIndexSchema, sample_id: &str, chromosome: &str, batch_start: u32) -> Self {
        Self {
            schema,
            sample_id: sample_id.to_string(),
            chunk: SampleIndexEntryChunk::new(chromosome, schema.chunk_start(batch_start)),
            gts: BTreeMap::new(),
            mendelian: Vec::new(),
            discrepancies: 0,
        }
    }

    pub fn chunk(&self) -> &SampleIndexEntryChunk {
        &self.chunk
    }

    /// Bucket for `genotype`, created on first access.
    pub fn gt_entry_mut(&mut self, genotype: &str) -> &mut SampleIndexGtEntryBuilder {
        self.gts.entry(genotype.to_string()).or_default()
    }

    pub fn add(&mut self, genotype: &str, variant: IndexedVariant) -> Result<&mut Self> {
        self.check_in_chunk(&variant.variant)?;
        if variant.files.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} has no file entries",
                variant.variant
            )));
        }
        let file_index = self.schema.file_index();
        for file in &variant.files {
            file_index
                .encode_entry(false, file.file_position, &file.fields)
                .map_err(|e| Error::InvalidInput(format!("{}: {}", variant.variant, e)))?;
        }
        if variant.has_parents() {
            ParentsCode::encode(variant.father_genotype.as_deref(), variant.mother_genotype.as_deref())?;
        }
        self.gt_entry_mut(genotype).add(variant);
        Ok(self)
    }

    pub fn add_mendelian_error(&mut self, variant: Variant, genotype: &str, code: u8) -> Result<&mut Self> {
        self.check_in_chunk(&variant)?;
        self.mendelian.push((variant, genotype.to_string(), code));
        Ok(self)
    }

    pub fn add_discrepancy(&mut self) -> &mut Self {
        self.discrepancies += 1;
        self
    }

    fn check_in_chunk(&self, variant: &Variant) -> Result<()> {
        let region = self.chunk.region(self.schema);
        if !region.contains(&variant.chromosome, variant.start) {
            return Err(Error::InvalidInput(format!(
                "{} is outside chunk {}",
                variant, region
            )));
        }
        Ok(())
    }

    /// Encode every bucket into one shared buffer and slice the channels out of it.
    pub fn build(self) -> Result<SampleIndexEntry> {
        let mut backing = Vec::new();
        let mut layouts = Vec::with_capacity(self.gts.len());
        for (genotype, mut gt) in self.gts {
            if gt.is_empty() {
                continue;
            }
            gt.variants.sort_by(|a, b| {
                (a.variant.start, &a.variant.reference, &a.variant.alternate).cmp(&(
                    b.variant.start,
                    &b.variant.reference,
                    &b.variant.alternate,
                ))
            });
            let channels = encode_channels(self.schema, self.chunk.batch_start, &gt.variants)?;
            let mut offsets = BTreeMap::new();
            for (channel, bytes) in channels {
                offsets.insert(channel, (backing.len(), bytes.len()));
                backing.extend_from_slice(&bytes);
            }
            layouts.push((genotype, gt.variants.len(), offsets));
        }

        let mut mendelian_blob = Vec::new();
        let mut mendelian = self.mendelian;
        mendelian.sort_by_key(|(variant, _, _)| variant.start);
        for (variant, genotype, code) in &mendelian {
            mendelian::write_record(
                &mut mendelian_blob,
                self.chunk.batch_start,
                variant,
                genotype,
                *code,
            )?;
        }
        let mendelian_offset = backing.len();
        backing.extend_from_slice(&mendelian_blob);

        let backing = Bytes::from(backing);
        let mut gts = Vec::with_capacity(layouts.len());
        for (genotype, count, offsets) in layouts {
            let mut views = BTreeMap::new();
            for (channel, (offset, length)) in offsets {
                views.insert(channel, ChannelView::slice(&backing, offset, length)?);
            }
            gts.push(SampleIndexGtEntry::new(&genotype, count, views));
        }
        let mendelian_variants = if mendelian.is_empty() {
            None
        } else {
            Some(ChannelView::slice(&backing, mendelian_offset, mendelian_blob.len())?)
        };
        Ok(SampleIndexEntry::new(
            &self.sample_id,
            self.chunk,
            gts,
            mendelian_variants,
            self.discrepancies,
        ))
    }
}

/// Summary byte of one annotated variant.
pub fn annotation_summary(annotation: &VariantAnnotation, population_keys: &[String]) -> u8 {
    let mut summary = 0;
    if annotation.transcripts.is_empty() {
        summary |= AnnotationSummary::INTERGENIC;
    }
    if !annotation.clinical.is_empty() {
        summary |= AnnotationSummary::CLINICAL;
    }
    for transcript in &annotation.transcripts {
        let lof = transcript
            .consequence_types
            .iter()
            .any(|ct| LOF_CONSEQUENCE_TYPES.contains(&ct.as_str()));
        let missense = transcript.consequence_types.iter().any(|ct| ct == MISSENSE_VARIANT);
        if lof {
            summary |= AnnotationSummary::LOF;
        }
        if missense {
            summary |= AnnotationSummary::MISSENSE;
        }
        if lof || missense {
            summary |= AnnotationSummary::LOFE;
            if transcript.flags.iter().any(|f| f == BASIC_FLAG) {
                summary |= AnnotationSummary::LOF_EXTENDED_BASIC;
            }
        }
    }
    if PopulationFrequencySchema::is_rare_everywhere(&annotation.population_frequencies, population_keys) {
        summary |= AnnotationSummary::POP_FREQ_ANY_001;
    }
    summary
}

fn single_bits(code: u64) -> impl Iterator<Item = u64> {
    (0..64).map(|i| 1u64 << i).filter(move |bit| code & bit != 0)
}

fn encode_channels(
    schema: &SampleIndexSchema,
    batch_start: u32,
    variants: &[IndexedVariant],
) -> Result<Vec<(Channel, Vec<u8>)>> {
    let file_index_schema = schema.file_index();
    let file_data_schema = schema.file_data();
    let annotation_schema = schema.annotation();

    let mut positions = Vec::new();
    let mut file_index = BitWriter::new();
    let mut file_data = Vec::new();
    for indexed in variants {
        let variant = &indexed.variant;
        write_variant(
            &mut positions,
            variant.start - batch_start,
            &variant.reference,
            &variant.alternate,
        )?;
        let last = indexed.files.len() - 1;
        for (i, file) in indexed.files.iter().enumerate() {
            let entry = file_index_schema.encode_entry(i != last, file.file_position, &file.fields)?;
            file_index.write_buffer(&entry);
            if file_data_schema.is_enabled() {
                file_data_schema.write_entry(&mut file_data, &file.data);
            }
        }
    }

    let mut channels = vec![
        (Channel::Variants, positions),
        (Channel::FileIndex, file_index.into_bytes()),
    ];
    if file_data_schema.is_enabled() {
        channels.push((Channel::FileData, file_data));
    }

    if variants.iter().any(|v| v.annotation.is_some()) {
        let ct_field = &annotation_schema.consequence_type;
        let bt_field = &annotation_schema.biotype;
        let tf_field = &annotation_schema.transcript_flag;
        let mut summaries = Vec::with_capacity(variants.len());
        let mut ct = BitWriter::new();
        let mut bt = BitWriter::new();
        let mut tf = BitWriter::new();
        let mut ct_bt_tf = BitWriter::new();
        let mut population_frequency = BitWriter::new();
        let mut clinical = BitWriter::new();
        let empty = VariantAnnotation::default();

        for indexed in variants {
            let (annotation, summary) = match &indexed.annotation {
                Some(annotation) => (
                    annotation,
                    annotation_summary(annotation, annotation_schema.population_keys()),
                ),
                None => (&empty, AnnotationSummary::INTERGENIC),
            };
            summaries.push(summary);

            if AnnotationSummary::is_non_intergenic(summary) {
                let mut triples = Vec::new();
                let (mut ct_code, mut bt_code, mut tf_code) = (0u64, 0u64, 0u64);
                for transcript in &annotation.transcripts {
                    let transcript_bt = bt_field.encode_term(&transcript.biotype);
                    let transcript_tf = transcript
                        .flags
                        .iter()
                        .fold(0, |code, flag| code | tf_field.encode_term(flag));
                    bt_code |= transcript_bt;
                    tf_code |= transcript_tf;
                    for consequence in &transcript.consequence_types {
                        let transcript_ct = ct_field.encode_term(consequence);
                        ct_code |= transcript_ct;
                        for x in single_bits(transcript_ct) {
                            for y in single_bits(transcript_bt) {
                                for z in single_bits(transcript_tf) {
                                    triples.push((x, y, z));
                                }
                            }
                        }
                    }
                }
                ct.write(ct_code, ct_field.bit_length());
                bt.write(bt_code, bt_field.bit_length());
                tf.write(tf_code, tf_field.bit_length());
                annotation_schema
                    .ct_bt_tf
                    .write(&mut ct_bt_tf, ct_code, bt_code, tf_code, &triples);
            }

            population_frequency.write_buffer(
                &annotation_schema
                    .population_frequency
                    .encode(&annotation.population_frequencies)?,
            );
            if AnnotationSummary::is_clinical(summary) {
                clinical.write_buffer(&annotation_schema.clinical.encode(&annotation.clinical));
            }
        }

        channels.push((Channel::Annotation, summaries));
        channels.push((Channel::ConsequenceType, ct.into_bytes()));
        channels.push((Channel::Biotype, bt.into_bytes()));
        channels.push((Channel::TranscriptFlag, tf.into_bytes()));
        channels.push((Channel::CtBtTf, ct_bt_tf.into_bytes()));
        channels.push((Channel::PopulationFrequency, population_frequency.into_bytes()));
        channels.push((Channel::Clinical, clinical.into_bytes()));
    }

    if variants.iter().any(IndexedVariant::has_parents) {
        let parents = variants
            .iter()
            .map(|v| ParentsCode::encode(v.father_genotype.as_deref(), v.mother_genotype.as_deref()))
            .collect::<Result<Vec<u8>>>()?;
        channels.push((Channel::Parents, parents));
    }

    Ok(channels)
}
