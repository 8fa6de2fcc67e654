//! Compact hit index
//!
//! Accumulates `(query start, subject start)` pairs found while searching the
//! codes of one query sequence, grouped by subject sequence. Each pair is
//! packed into a single `u64` and appended to a per-subject row. Rows and the
//! subject to row table grow by doubling, using fallible reservation so that
//! memory exhaustion surfaces as [`LayoutError::Resource`].

use fnv::{FnvHashMap, FnvHashSet};

use crate::error::LayoutResult;
use crate::types::SequenceId;

/// Pack a hit. The query position goes to the high 32 bits and the subject
/// position to the low 32 bits.
#[inline]
pub fn encode_hit(query_start: u32, subject_start: u32) -> u64 {
    (u64::from(query_start) << 32) | u64::from(subject_start)
}

/// Inverse of [`encode_hit`]: returns `(query_start, subject_start)`
#[inline]
pub fn decode_hit(code: u64) -> (u32, u32) {
    ((code >> 32) as u32, (code & 0xFFFF_FFFF) as u32)
}

/// Typed hit reconstructed from the compact representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmerHit {
    pub subject_id: SequenceId,
    pub query_start: u32,
    pub subject_start: u32,
    pub length: u32,
    pub weight: f64,
}

impl KmerHit {
    /// Diagonal of the hit in subject coordinates
    pub fn diagonal(&self) -> i64 {
        i64::from(self.subject_start) - i64::from(self.query_start)
    }
}

#[derive(Debug, Default)]
struct HitRow {
    entries: Vec<u64>,
}

impl HitRow {
    fn push(&mut self, value: u64) -> LayoutResult<()> {
        if self.entries.len() == self.entries.capacity() {
            let extra = self.entries.capacity().max(1);
            self.entries.try_reserve_exact(extra)?;
        }
        self.entries.push(value);
        Ok(())
    }
}

/// Hits of one query against every subject, grouped by subject
#[derive(Debug, Default)]
pub struct KmerHitsTable {
    row_by_subject: FnvHashMap<SequenceId, usize>,
    rows: Vec<HitRow>,
    total_hits: usize,
    /// Query position -> code of the k-mer starting there
    query_codes: FnvHashMap<u32, u64>,
    /// Code -> weight of its hits
    code_weights: FnvHashMap<u64, f64>,
    not_found_codes: usize,
    multihit_codes: usize,
    repetitive_codes: usize,
}

impl KmerHitsTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with room for `capacity` subject rows
    pub fn with_capacity(capacity: usize) -> LayoutResult<Self> {
        let mut table = Self::default();
        table.rows.try_reserve_exact(capacity)?;
        table.row_by_subject.try_reserve(capacity)?;
        Ok(table)
    }

    fn row_for(&mut self, subject_id: SequenceId) -> LayoutResult<usize> {
        if let Some(&row) = self.row_by_subject.get(&subject_id) {
            return Ok(row);
        }
        if self.rows.len() == self.rows.capacity() {
            let extra = self.rows.capacity().max(1);
            self.rows.try_reserve_exact(extra)?;
        }
        let row = self.rows.len();
        self.rows.push(HitRow::default());
        self.row_by_subject.insert(subject_id, row);
        Ok(row)
    }

    /// Record a hit of the query k-mer starting at `query_start` against
    /// `subject_id` at `subject_start`
    pub fn add_hit(&mut self, subject_id: SequenceId, query_start: u32, subject_start: u32) -> LayoutResult<()> {
        let row = self.row_for(subject_id)?;
        self.rows[row].push(encode_hit(query_start, subject_start))?;
        self.total_hits += 1;
        Ok(())
    }

    /// Register the code of the query k-mer starting at `query_start`
    pub fn register_query_code(&mut self, query_start: u32, code: u64) {
        self.query_codes.insert(query_start, code);
    }

    pub fn set_code_weight(&mut self, code: u64, weight: f64) {
        self.code_weights.insert(code, weight);
    }

    pub fn set_code_weights(&mut self, weights: FnvHashMap<u64, f64>) {
        self.code_weights = weights;
    }

    pub fn code_weights(&self) -> &FnvHashMap<u64, f64> {
        &self.code_weights
    }

    pub(crate) fn record_not_found(&mut self) {
        self.not_found_codes += 1;
    }

    pub(crate) fn record_multihit(&mut self) {
        self.multihit_codes += 1;
    }

    pub(crate) fn record_repetitive(&mut self) {
        self.repetitive_codes += 1;
    }

    pub fn total_hits(&self) -> usize {
        self.total_hits
    }

    pub fn hit_count(&self, subject_id: SequenceId) -> usize {
        self.row_by_subject
            .get(&subject_id)
            .map_or(0, |&row| self.rows[row].entries.len())
    }

    pub fn hit_counts_by_subject(&self) -> FnvHashMap<SequenceId, usize> {
        self.row_by_subject
            .iter()
            .map(|(&subject, &row)| (subject, self.rows[row].entries.len()))
            .collect()
    }

    /// Subjects with at least one hit, in increasing id order
    pub fn subjects(&self) -> Vec<SequenceId> {
        let mut subjects: Vec<SequenceId> = self.row_by_subject.keys().copied().collect();
        subjects.sort_unstable();
        subjects
    }

    /// Number of distinct query codes with at least one hit against the subject
    pub fn distinct_kmer_count(&self, subject_id: SequenceId) -> usize {
        let Some(&row) = self.row_by_subject.get(&subject_id) else {
            return 0;
        };
        let entries = &self.rows[row].entries;
        let mut codes = FnvHashSet::with_capacity_and_hasher(entries.len(), Default::default());
        for &entry in entries {
            let (query_start, _) = decode_hit(entry);
            if let Some(&code) = self.query_codes.get(&query_start) {
                codes.insert(code);
            }
        }
        codes.len()
    }

    /// Typed hits against one subject, in insertion order. Hits whose query
    /// position has no registered code are skipped.
    pub fn hits(&self, subject_id: SequenceId, kmer_length: u32) -> Vec<KmerHit> {
        let Some(&row) = self.row_by_subject.get(&subject_id) else {
            return Vec::new();
        };
        let entries = &self.rows[row].entries;
        let mut hits = Vec::with_capacity(entries.len());
        for &entry in entries {
            let (query_start, subject_start) = decode_hit(entry);
            let Some(code) = self.query_codes.get(&query_start) else {
                continue;
            };
            let weight = self.code_weights.get(code).copied().unwrap_or(1.0);
            hits.push(KmerHit {
                subject_id,
                query_start,
                subject_start,
                length: kmer_length,
                weight,
            });
        }
        hits
    }

    pub fn query_code(&self, query_start: u32) -> Option<u64> {
        self.query_codes.get(&query_start).copied()
    }

    pub fn query_codes(&self) -> &FnvHashMap<u32, u64> {
        &self.query_codes
    }

    /// Number of query codes retained for evidence computation
    pub fn informative_codes(&self) -> usize {
        self.query_codes.len()
    }

    /// Distinct query codes whose k-mer lies entirely within `[start, end)`
    pub fn distinct_codes_in_region(&self, start: i64, end: i64, kmer_length: u32) -> usize {
        let k = i64::from(kmer_length);
        self.query_codes
            .iter()
            .filter(|(&pos, _)| {
                let pos = i64::from(pos);
                pos >= start && pos + k <= end
            })
            .map(|(_, &code)| code)
            .collect::<FnvHashSet<u64>>()
            .len()
    }

    pub fn not_found_codes(&self) -> usize {
        self.not_found_codes
    }

    pub fn multihit_codes(&self) -> usize {
        self.multihit_codes
    }

    pub fn repetitive_codes(&self) -> usize {
        self.repetitive_codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> KmerHitsTable {
        let mut table = KmerHitsTable::new();
        table.register_query_code(0, 11);
        table.register_query_code(5, 22);
        table.register_query_code(9, 11);
        table.set_code_weight(22, 0.5);
        table.add_hit(3, 0, 100).unwrap();
        table.add_hit(3, 5, 105).unwrap();
        table.add_hit(3, 9, 109).unwrap();
        table.add_hit(7, 5, 40).unwrap();
        table
    }

    #[test]
    fn test_encode_decode_boundaries() {
        for &(q, s) in &[(0, 0), (0, u32::MAX), (u32::MAX, 0), (u32::MAX, u32::MAX), (123, 456)] {
            assert_eq!(decode_hit(encode_hit(q, s)), (q, s));
        }
    }

    #[test]
    fn test_counts() {
        let table = sample_table();
        assert_eq!(table.total_hits(), 4);
        assert_eq!(table.hit_count(3), 3);
        assert_eq!(table.hit_count(7), 1);
        assert_eq!(table.hit_count(99), 0);
        assert_eq!(table.subjects(), vec![3, 7]);
        assert_eq!(table.hit_counts_by_subject().get(&3), Some(&3));
    }

    #[test]
    fn test_distinct_kmer_count_dedupes_codes() {
        let table = sample_table();
        // positions 0 and 9 share code 11
        assert_eq!(table.distinct_kmer_count(3), 2);
        assert_eq!(table.distinct_kmer_count(7), 1);
        assert_eq!(table.distinct_kmer_count(42), 0);
    }

    #[test]
    fn test_hits_carry_weights() {
        let table = sample_table();
        let hits = table.hits(3, 15);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].query_start, 0);
        assert_eq!(hits[0].subject_start, 100);
        assert_eq!(hits[0].weight, 1.0);
        assert_eq!(hits[1].weight, 0.5);
        assert_eq!(hits[1].length, 15);
        assert_eq!(hits[2].diagonal(), 100);
        assert!(table.hits(1000, 15).is_empty());
    }

    #[test]
    fn test_hits_without_code_are_skipped() {
        let mut table = KmerHitsTable::new();
        table.add_hit(1, 50, 60).unwrap();
        assert_eq!(table.hit_count(1), 1);
        assert!(table.hits(1, 15).is_empty());
    }

    #[test]
    fn test_growth_by_doubling() {
        let mut table = KmerHitsTable::with_capacity(1).unwrap();
        for subject in 0..64u32 {
            for q in 0..33u32 {
                table.add_hit(subject, q, q + subject).unwrap();
            }
        }
        assert_eq!(table.total_hits(), 64 * 33);
        assert_eq!(table.hit_count(63), 33);
        assert!(table.rows.capacity() >= 64);
        assert!(table.rows[0].entries.capacity() >= 33);
    }

    #[test]
    fn test_distinct_codes_in_region() {
        let table = sample_table();
        assert_eq!(table.distinct_codes_in_region(0, 30, 15), 2);
        assert_eq!(table.distinct_codes_in_region(0, 15, 15), 1);
        assert_eq!(table.distinct_codes_in_region(1, 20, 15), 1);
    }
}
