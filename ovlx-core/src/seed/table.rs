//! Minimizer search table
//!
//! Maps k-mer codes to every `(sequence, position)` where the codec selected
//! them. Indexing runs concurrently from the worker pool, so occurrences are
//! kept in a sharded [`DashMap`]. Searching a query fills a
//! [`KmerHitsTable`] with one hit per occurrence.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use fnv::FnvHashMap;

use super::hits::{decode_hit, encode_hit, KmerHitsTable};
use super::minimizer::{KmerCodec, MinimizerCodec};
use crate::error::LayoutResult;
use crate::types::SequenceId;

/// Codes seen in more sequences than this are never considered repetitive
const MIN_REPETITIVE_OCCURRENCES: usize = 100;

pub struct MinimizerTable {
    codec: Box<dyn KmerCodec>,
    /// Code -> packed (sequence id, position) occurrences
    entries: DashMap<u64, Vec<u64>>,
    /// Indexed sequence -> number of codes stored for it
    indexed: DashMap<SequenceId, usize>,
    total_entries: AtomicUsize,
    expected_depth: f64,
    max_code_occurrences: usize,
}

impl MinimizerTable {
    /// Create a table backed by the default minimizer codec. `mode_depth` is
    /// the expected sequencing depth used to weight and filter codes.
    pub fn new(kmer_length: usize, window_length: usize, mode_depth: u32) -> Self {
        Self::with_codec(Box::new(MinimizerCodec::new(kmer_length, window_length)), mode_depth)
    }

    pub fn with_codec(codec: Box<dyn KmerCodec>, mode_depth: u32) -> Self {
        let depth = mode_depth.max(1) as usize;
        Self {
            codec,
            entries: DashMap::new(),
            indexed: DashMap::new(),
            total_entries: AtomicUsize::new(0),
            expected_depth: depth as f64,
            max_code_occurrences: MIN_REPETITIVE_OCCURRENCES.max(5 * depth),
        }
    }

    /// Override the occurrence count above which a code is dropped as repetitive
    pub fn set_max_code_occurrences(&mut self, max: usize) {
        self.max_code_occurrences = max.max(1);
    }

    pub fn max_code_occurrences(&self) -> usize {
        self.max_code_occurrences
    }

    pub fn codec(&self) -> &dyn KmerCodec {
        self.codec.as_ref()
    }

    /// Index the codes of one sequence. Safe to call from several threads.
    pub fn add_sequence(&self, sequence_id: SequenceId, sequence: &[u8]) -> LayoutResult<()> {
        let mut count = 0usize;
        for kmer in self.codec.codes(sequence) {
            let mut occurrences = self.entries.entry(kmer.code).or_default();
            if occurrences.len() == occurrences.capacity() {
                let extra = occurrences.capacity().max(1);
                occurrences.try_reserve_exact(extra)?;
            }
            occurrences.push(encode_hit(sequence_id, kmer.position));
            count += 1;
        }
        self.indexed.insert(sequence_id, count);
        self.total_entries.fetch_add(count, Ordering::Relaxed);
        Ok(())
    }

    /// Search the codes of a query. Occurrences in the query itself are
    /// skipped and so are codes above the repetitive threshold. Each kept
    /// code is weighted by `min(1, expected depth / occurrences)`.
    pub fn match_query(&self, query_id: SequenceId, sequence: &[u8]) -> LayoutResult<KmerHitsTable> {
        let mut hits = KmerHitsTable::new();
        let mut weights: FnvHashMap<u64, f64> = FnvHashMap::default();
        for kmer in self.codec.codes(sequence) {
            let Some(occurrences) = self.entries.get(&kmer.code) else {
                hits.register_query_code(kmer.position, kmer.code);
                hits.record_not_found();
                continue;
            };
            if occurrences.len() > self.max_code_occurrences {
                hits.record_repetitive();
                continue;
            }
            hits.register_query_code(kmer.position, kmer.code);
            let mut found = 0usize;
            for &packed in occurrences.iter() {
                let (subject_id, subject_start) = decode_hit(packed);
                if subject_id == query_id {
                    continue;
                }
                hits.add_hit(subject_id, kmer.position, subject_start)?;
                found += 1;
            }
            match found {
                0 => hits.record_not_found(),
                1 => {}
                _ => hits.record_multihit(),
            }
            let weight = (self.expected_depth / occurrences.len() as f64).min(1.0);
            weights.insert(kmer.code, weight);
        }
        hits.set_code_weights(weights);
        Ok(hits)
    }

    /// Number of distinct codes
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn total_entries(&self) -> usize {
        self.total_entries.load(Ordering::Relaxed)
    }

    pub fn contains(&self, sequence_id: SequenceId) -> bool {
        self.indexed.contains_key(&sequence_id)
    }

    pub fn indexed_sequences(&self) -> usize {
        self.indexed.len()
    }
}
