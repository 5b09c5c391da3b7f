pub mod builder;
pub mod chunk;
pub mod comparator;
pub mod entry;
pub mod iterator;
pub mod mendelian;
pub mod variant;

pub use builder::{
    IndexedFile, IndexedVariant, SampleIndexEntryBuilder, SampleIndexGtEntryBuilder,
    TranscriptAnnotation, VariantAnnotation,
};
pub use chunk::SampleIndexEntryChunk;
pub use comparator::SampleIndexVariantComparator;
pub use entry::{Channel, ChannelView, SampleIndexEntry, SampleIndexGtEntry};
pub use iterator::SampleIndexEntryIterator;
pub use mendelian::{MendelianErrorIterator, MendelianFilter, MendelianRecord};
pub use variant::{SampleIndexVariant, Variant};

use crate::Result;
use crate::schema::SampleIndexSchema;

impl SampleIndexEntry {
    /// Iterator over the bucket of `genotype`, or `None` if there is no such bucket.
    pub fn iterator<'a>(
        &'a self,
        genotype: &str,
        schema: &'a SampleIndexSchema,
    ) -> Result<Option<SampleIndexEntryIterator<'a>>> {
        SampleIndexEntryIterator::for_genotype(self, genotype, schema)
    }
}
