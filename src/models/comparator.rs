use super::variant::SampleIndexVariant;
use crate::schema::FileIndexSchema;
use std::cmp::Ordering;

/// Total order over materialized variants used when merging genotype buckets.
///
/// Position first. At equal positions, variants seen in several files sort
/// before single-file ones, then by the first entry's file position, then by
/// the raw file-index bytes.
#[derive(Debug, Clone, Copy)]
pub struct SampleIndexVariantComparator<'a> {
    schema: &'a FileIndexSchema,
}

impl<'a> SampleIndexVariantComparator<'a> {
    pub fn new(schema: &'a FileIndexSchema) -> Self {
        Self { schema }
    }

    pub fn compare(&self, a: &SampleIndexVariant, b: &SampleIndexVariant) -> Ordering {
        let (va, vb) = (&a.variant, &b.variant);
        va.chromosome
            .cmp(&vb.chromosome)
            .then(va.start.cmp(&vb.start))
            .then(va.end.cmp(&vb.end))
            .then_with(|| self.is_multi_file(b).cmp(&self.is_multi_file(a)))
            .then_with(|| self.file_position(a).cmp(&self.file_position(b)))
            .then_with(|| {
                let first = |v: &SampleIndexVariant| v.file_index.first().map(|e| e.to_bytes());
                first(a).cmp(&first(b))
            })
    }

    fn is_multi_file(&self, variant: &SampleIndexVariant) -> bool {
        variant.file_index.len() > 1
            || variant
                .file_index
                .first()
                .is_some_and(|entry| self.schema.is_multi_file(entry))
    }

    fn file_position(&self, variant: &SampleIndexVariant) -> Option<u64> {
        variant
            .file_index
            .first()
            .and_then(|entry| self.schema.file_position(entry).ok())
    }

    /// Sort in place.
    pub fn sort(&self, variants: &mut [SampleIndexVariant]) {
        variants.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Variant;
    use crate::schema::SampleIndexSchema;
    use std::collections::BTreeMap;

    fn sample_variant(schema: &FileIndexSchema, start: u32, files: &[u32]) -> SampleIndexVariant {
        let last = files.len() - 1;
        let file_index = files
            .iter()
            .enumerate()
            .map(|(i, pos)| schema.encode_entry(i != last, *pos, &BTreeMap::new()).unwrap())
            .collect();
        SampleIndexVariant {
            variant: Variant::new("1", start, "A", "T"),
            genotype: "0/1".to_string(),
            file_index,
            file_data: vec![],
            annotation: None,
            parents_code: None,
            mendelian_code: None,
        }
    }

    #[test]
    fn test_position_order_wins() {
        let schema = SampleIndexSchema::default_schema().unwrap();
        let comparator = SampleIndexVariantComparator::new(schema.file_index());
        let a = sample_variant(schema.file_index(), 100, &[3, 4]);
        let b = sample_variant(schema.file_index(), 200, &[0]);
        assert_eq!(comparator.compare(&a, &b), Ordering::Less);
        assert_eq!(comparator.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn test_multi_file_sorts_first_at_equal_position() {
        let schema = SampleIndexSchema::default_schema().unwrap();
        let file_index = schema.file_index();
        let comparator = SampleIndexVariantComparator::new(file_index);
        let single = sample_variant(file_index, 100, &[0]);
        let multi = sample_variant(file_index, 100, &[5, 6]);
        assert_eq!(comparator.compare(&multi, &single), Ordering::Less);

        let mut variants = vec![
            sample_variant(file_index, 100, &[2]),
            single.clone(),
            multi.clone(),
            sample_variant(file_index, 50, &[7]),
        ];
        comparator.sort(&mut variants);
        let order: Vec<(u32, usize)> = variants
            .iter()
            .map(|v| (v.variant.start, v.file_count()))
            .collect();
        assert_eq!(order, vec![(50, 1), (100, 2), (100, 1), (100, 1)]);
        assert_eq!(variants[2], single);
    }

    #[test]
    fn test_equal_variants_compare_equal() {
        let schema = SampleIndexSchema::default_schema().unwrap();
        let comparator = SampleIndexVariantComparator::new(schema.file_index());
        let a = sample_variant(schema.file_index(), 100, &[1]);
        assert_eq!(comparator.compare(&a, &a.clone()), Ordering::Equal);
    }
}
