//! Relationship discovery from k-mer hits
//!
//! For one query, the hits against each subject (forward strand and
//! reverse complement) are chained into co-linear clusters. Each cluster
//! predicts where the query lies on the subject, which classifies it as an
//! overlap edge between two sequence ends or as a containment. The
//! discovery never touches the graph; it returns scored candidates.

use std::cmp::Ordering;

use fnv::FnvHashSet;

use crate::config::LayoutConfig;
use crate::error::LayoutResult;
use crate::graph::relationship::{AssemblyEdge, AssemblyEmbedded, AssemblyVertex, Evidence, Relationship};
use crate::scoring::ScoresCalculator;
use crate::seed::hits::{KmerHit, KmerHitsTable};
use crate::types::SequenceId;

/// Predecessors examined for each hit while chaining
const MAX_CHAIN_LOOKBACK: usize = 64;

/// Thresholds a containment must pass in the embedded-only pass
const GOOD_EMBEDDED_MIN_EVIDENCE: f64 = 0.99;
const GOOD_EMBEDDED_MAX_INDELS_PER_KBP: f64 = 10.0;
const GOOD_EMBEDDED_MIN_COVERAGE_FRACTION: f64 = 0.5;

/// Which subjects a query is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchMode {
    /// Subjects with this id or larger are ignored
    pub subject_limit: Option<SequenceId>,
    /// Report only containments of the query in a subject
    pub only_embedded: bool,
}

impl SearchMode {
    pub fn overlaps() -> Self {
        Self::default()
    }

    pub fn only_embedded() -> Self {
        Self {
            subject_limit: None,
            only_embedded: true,
        }
    }

    pub fn with_subject_limit(mut self, limit: SequenceId) -> Self {
        self.subject_limit = Some(limit);
        self
    }
}

/// Co-linear hits of the query against one subject, sorted by query position
#[derive(Debug, Clone)]
pub struct HitCluster {
    pub subject_id: SequenceId,
    /// Hits come from the reverse complement of the query
    pub reverse: bool,
    pub hits: Vec<KmerHit>,
}

impl HitCluster {
    fn first(&self) -> &KmerHit {
        &self.hits[0]
    }

    fn last(&self) -> &KmerHit {
        &self.hits[self.hits.len() - 1]
    }

    /// Subject coordinate where the query would start
    pub fn predicted_start(&self) -> i64 {
        self.first().diagonal()
    }

    /// Subject coordinate where the query would end
    pub fn predicted_end(&self, query_length: i64) -> i64 {
        let last = self.last();
        i64::from(last.subject_start) + query_length - i64::from(last.query_start)
    }

    /// Query bases covered by hits, each base weighted by its hit
    pub fn weighted_coverage(&self) -> f64 {
        let mut covered_end = 0u32;
        let mut total = 0.0;
        for hit in &self.hits {
            let end = hit.query_start + hit.length;
            let start = hit.query_start.max(covered_end);
            if end > start {
                total += f64::from(end - start) * hit.weight;
                covered_end = end;
            }
        }
        total
    }

    /// Coordinate drift between consecutive hits per kbp of query span
    pub fn indels_per_kbp(&self) -> f64 {
        let mut drift = 0i64;
        for pair in self.hits.windows(2) {
            let dq = i64::from(pair[1].query_start) - i64::from(pair[0].query_start);
            let ds = i64::from(pair[1].subject_start) - i64::from(pair[0].subject_start);
            drift += (ds - dq).abs();
        }
        let span = i64::from(self.last().query_start + self.last().length) - i64::from(self.first().query_start);
        if span <= 0 {
            return 0.0;
        }
        1000.0 * drift as f64 / span as f64
    }

    /// Standard deviation of the hit diagonals
    pub fn diagonal_standard_deviation(&self) -> f64 {
        let n = self.hits.len() as f64;
        let mean = self.hits.iter().map(|h| h.diagonal() as f64).sum::<f64>() / n;
        let variance = self
            .hits
            .iter()
            .map(|h| (h.diagonal() as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt()
    }
}

/// Query side of an overlap, in the coordinates the hits use
#[derive(Debug, Clone, Copy)]
struct QueryRegion {
    start: i64,
    end: i64,
}

pub struct RelationshipFinder {
    sequence_lengths: Vec<u32>,
    kmer_length: u32,
    min_kmer_percentage: f64,
    max_clusters_per_subject: usize,
    max_diagonal_drift: i64,
    calculator: ScoresCalculator,
}

impl RelationshipFinder {
    pub fn new(config: &LayoutConfig, sequence_lengths: Vec<u32>) -> LayoutResult<Self> {
        Ok(Self {
            sequence_lengths,
            kmer_length: config.kmer_length as u32,
            min_kmer_percentage: config.min_kmer_percentage,
            max_clusters_per_subject: config.max_clusters_per_subject,
            max_diagonal_drift: config.max_diagonal_drift,
            calculator: ScoresCalculator::new(config.secondary_features_weight)?,
        })
    }

    pub fn sequence_length(&self, id: SequenceId) -> Option<u32> {
        self.sequence_lengths.get(id as usize).copied()
    }

    /// Hits a subject needs before it is examined
    pub fn min_hits(&self, informative_codes: usize) -> usize {
        let required = (self.min_kmer_percentage / 100.0 * informative_codes as f64).ceil() as usize;
        required.max(2)
    }

    /// Candidate relationships of a query from its forward and reverse
    /// complement hits. At most one relationship per subject is returned.
    pub fn infer_relationships(
        &self,
        query_id: SequenceId,
        forward: &KmerHitsTable,
        reverse: &KmerHitsTable,
        mode: SearchMode,
    ) -> Vec<Relationship> {
        let Some(query_length) = self.sequence_length(query_id) else {
            log::warn!("Discovery requested for unknown sequence {}", query_id);
            return Vec::new();
        };
        let informative = forward.informative_codes().max(reverse.informative_codes());
        if informative == 0 {
            return Vec::new();
        }
        let min_hits = self.min_hits(informative);

        let mut best: Vec<(SequenceId, Relationship)> = Vec::new();
        for (table, is_reverse) in [(forward, false), (reverse, true)] {
            for subject_id in table.subjects() {
                if subject_id == query_id {
                    continue;
                }
                if !mode.only_embedded && subject_id > query_id {
                    continue;
                }
                if mode.subject_limit.map_or(false, |limit| subject_id >= limit) {
                    continue;
                }
                if table.hit_count(subject_id) < min_hits {
                    continue;
                }
                let Some(subject_length) = self.sequence_length(subject_id) else {
                    log::debug!("Skipping hits against unknown sequence {}", subject_id);
                    continue;
                };
                for cluster in self.cluster_hits(table, subject_id, is_reverse, min_hits) {
                    let Some(rel) = self.classify(query_id, query_length, subject_length, &cluster, table) else {
                        continue;
                    };
                    if mode.only_embedded && !is_query_embedded(&rel, query_id) {
                        continue;
                    }
                    match best.iter_mut().find(|(s, _)| *s == subject_id) {
                        Some((_, current)) => {
                            if compare_candidates(&rel, current) == Ordering::Greater {
                                *current = rel;
                            }
                        }
                        None => best.push((subject_id, rel)),
                    }
                }
            }
        }
        best.sort_by_key(|(subject, _)| *subject);
        best.into_iter()
            .map(|(_, mut rel)| {
                let score = self.calculator.score(&rel);
                rel.set_score(score);
                rel
            })
            .collect()
    }

    /// Extract up to `max_clusters_per_subject` chains of at least
    /// `min_hits` hits
    pub fn cluster_hits(
        &self,
        table: &KmerHitsTable,
        subject_id: SequenceId,
        reverse: bool,
        min_hits: usize,
    ) -> Vec<HitCluster> {
        let mut hits = table.hits(subject_id, self.kmer_length);
        hits.sort_unstable_by_key(|h| (h.query_start, h.subject_start));
        let mut used = vec![false; hits.len()];
        let mut clusters = Vec::new();
        while clusters.len() < self.max_clusters_per_subject {
            let chain = self.best_chain(&hits, &used);
            if chain.len() < min_hits {
                break;
            }
            for &i in &chain {
                used[i] = true;
            }
            clusters.push(HitCluster {
                subject_id,
                reverse,
                hits: chain.iter().map(|&i| hits[i]).collect(),
            });
        }
        clusters
    }

    /// Highest scoring co-linear chain among unused hits, as indices in
    /// increasing query order
    fn best_chain(&self, hits: &[KmerHit], used: &[bool]) -> Vec<usize> {
        let n = hits.len();
        let k = f64::from(self.kmer_length);
        let mut score = vec![0.0f64; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut best: Option<usize> = None;
        for i in 0..n {
            if used[i] {
                continue;
            }
            let hi = &hits[i];
            score[i] = k * hi.weight;
            for j in (i.saturating_sub(MAX_CHAIN_LOOKBACK)..i).rev() {
                if used[j] {
                    continue;
                }
                let hj = &hits[j];
                let dq = i64::from(hi.query_start) - i64::from(hj.query_start);
                let ds = i64::from(hi.subject_start) - i64::from(hj.subject_start);
                if dq <= 0 || ds <= 0 {
                    continue;
                }
                let drift = (ds - dq).abs();
                if drift > self.max_diagonal_drift {
                    continue;
                }
                let matched = dq.min(ds).min(i64::from(self.kmer_length)) as f64;
                let gap_cost = if drift > 0 {
                    0.01 * k * drift as f64 + 0.5 * (drift as f64 + 1.0).log2()
                } else {
                    0.0
                };
                let candidate = score[j] + matched * hi.weight - gap_cost;
                if candidate > score[i] {
                    score[i] = candidate;
                    parent[i] = Some(j);
                }
            }
            if best.map_or(true, |b| score[i] > score[b]) {
                best = Some(i);
            }
        }
        let mut chain = Vec::new();
        let mut current = best;
        while let Some(i) = current {
            chain.push(i);
            current = parent[i];
        }
        chain.reverse();
        chain
    }

    /// Turn a cluster into an edge or a containment. `None` when the
    /// predicted placement leaves no overlap.
    fn classify(
        &self,
        query_id: SequenceId,
        query_length: u32,
        subject_length: u32,
        cluster: &HitCluster,
        table: &KmerHitsTable,
    ) -> Option<Relationship> {
        let qlen = i64::from(query_length);
        let slen = i64::from(subject_length);
        let margin = 2 * i64::from(self.kmer_length);
        let start = cluster.predicted_start();
        let end = cluster.predicted_end(qlen);
        let subject_id = cluster.subject_id;
        let reverse = cluster.reverse;

        if start >= -margin && end <= slen + margin {
            let host_start = start.clamp(0, slen);
            let host_end = end.clamp(0, slen);
            if host_end <= host_start {
                return None;
            }
            let region = QueryRegion { start: 0, end: qlen };
            let evidence = self.evidence(cluster, table, region, (host_end - host_start) as u32);
            return Some(
                AssemblyEmbedded::new(query_id, subject_id, host_start as u32, host_end as u32, reverse, evidence).into(),
            );
        }
        if start <= margin && end >= slen - margin {
            let region = QueryRegion {
                start: (-start).clamp(0, qlen),
                end: (slen - start).clamp(0, qlen),
            };
            if region.end <= region.start {
                return None;
            }
            let (host_start, host_end) = if reverse {
                (qlen - region.end, qlen - region.start)
            } else {
                (region.start, region.end)
            };
            let evidence = self.evidence(cluster, table, region, (region.end - region.start) as u32);
            return Some(
                AssemblyEmbedded::new(subject_id, query_id, host_start as u32, host_end as u32, reverse, evidence).into(),
            );
        }
        let max_overlap = qlen.min(slen);
        let (query_vertex, subject_vertex, overlap, region) = if start < 0 {
            // the end of the hit strand meets the start of the subject
            let overlap = end.clamp(0, max_overlap);
            let query_vertex = if reverse {
                AssemblyVertex::start(query_id)
            } else {
                AssemblyVertex::end(query_id)
            };
            let region = QueryRegion { start: (-start).min(qlen), end: qlen };
            (query_vertex, AssemblyVertex::start(subject_id), overlap, region)
        } else {
            let overlap = (slen - start).clamp(0, max_overlap);
            let query_vertex = if reverse {
                AssemblyVertex::end(query_id)
            } else {
                AssemblyVertex::start(query_id)
            };
            let region = QueryRegion {
                start: 0,
                end: (qlen - (end - slen)).max(0),
            };
            (query_vertex, AssemblyVertex::end(subject_id), overlap, region)
        };
        if overlap <= 0 || region.end <= region.start {
            return None;
        }
        let evidence = self.evidence(cluster, table, region, overlap as u32);
        let mut edge = AssemblyEdge::new(query_vertex, subject_vertex, evidence);
        edge.overlap_standard_deviation = cluster.diagonal_standard_deviation();
        Some(edge.into())
    }

    fn evidence(&self, cluster: &HitCluster, table: &KmerHitsTable, region: QueryRegion, overlap: u32) -> Evidence {
        let cluster_codes: FnvHashSet<u64> = cluster
            .hits
            .iter()
            .filter_map(|h| table.query_code(h.query_start))
            .collect();
        let region_codes = table.distinct_codes_in_region(region.start, region.end, self.kmer_length);
        let evidence_proportion = if region_codes == 0 {
            0.0
        } else {
            (cluster_codes.len() as f64 / region_codes as f64).min(1.0)
        };
        Evidence {
            overlap,
            shared_kmers: cluster.hits.len() as u32,
            weighted_coverage: cluster.weighted_coverage(),
            evidence_proportion,
            indels_per_kbp: cluster.indels_per_kbp(),
        }
    }
}

fn is_query_embedded(rel: &Relationship, query_id: SequenceId) -> bool {
    matches!(rel, Relationship::Embedded(e) if e.sequence_id == query_id)
}

/// Higher coverage wins, then lower indel rate, then longer overlap
fn compare_candidates(a: &Relationship, b: &Relationship) -> Ordering {
    let (ea, eb) = (a.evidence(), b.evidence());
    ea.weighted_coverage
        .total_cmp(&eb.weighted_coverage)
        .then_with(|| eb.indels_per_kbp.total_cmp(&ea.indels_per_kbp))
        .then_with(|| ea.overlap.cmp(&eb.overlap))
}

/// Containments reliable enough to settle a sequence without indexing it
pub fn select_good_embedded(relationships: Vec<Relationship>, sequence_lengths: &[u32]) -> Vec<Relationship> {
    relationships
        .into_iter()
        .filter(|rel| match rel {
            Relationship::Embedded(e) => {
                let length = sequence_lengths.get(e.sequence_id as usize).copied().unwrap_or(0);
                e.evidence.evidence_proportion > GOOD_EMBEDDED_MIN_EVIDENCE
                    && e.evidence.indels_per_kbp < GOOD_EMBEDDED_MAX_INDELS_PER_KBP
                    && e.evidence.weighted_coverage > GOOD_EMBEDDED_MIN_COVERAGE_FRACTION * f64::from(length)
            }
            Relationship::Edge(_) => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LayoutConfig {
        LayoutConfig {
            kmer_length: 15,
            window_length: 5,
            ..Default::default()
        }
    }

    fn hit(q: u32, s: u32) -> KmerHit {
        KmerHit {
            subject_id: 0,
            query_start: q,
            subject_start: s,
            length: 15,
            weight: 1.0,
        }
    }

    /// Table with hits of query positions `qs` against subject 0 shifted by `offset`
    fn table(qs: &[u32], offset: i64, extra_codes: &[u32]) -> KmerHitsTable {
        let mut table = KmerHitsTable::new();
        for (i, &q) in qs.iter().enumerate() {
            table.register_query_code(q, 1000 + i as u64);
            table.add_hit(0, q, (i64::from(q) + offset) as u32).unwrap();
        }
        for (i, &q) in extra_codes.iter().enumerate() {
            table.register_query_code(q, 5000 + i as u64);
        }
        table
    }

    #[test]
    fn test_min_hits() {
        let finder = RelationshipFinder::new(&config(), vec![1000, 1000]).unwrap();
        assert_eq!(finder.min_hits(0), 2);
        assert_eq!(finder.min_hits(100), 5);
        assert_eq!(finder.min_hits(101), 6);
    }

    #[test]
    fn test_cluster_metrics() {
        let cluster = HitCluster {
            subject_id: 0,
            reverse: false,
            hits: vec![hit(0, 100), hit(10, 110), hit(20, 122)],
        };
        assert_eq!(cluster.predicted_start(), 100);
        assert_eq!(cluster.predicted_end(500), 602);
        // 15 + 10 + 10 new bases
        assert!((cluster.weighted_coverage() - 35.0).abs() < 1e-9);
        assert!((cluster.indels_per_kbp() - 2000.0 / 35.0).abs() < 1e-9);
        assert!(cluster.diagonal_standard_deviation() > 0.0);
    }

    #[test]
    fn test_chaining_separates_diagonals() {
        let finder = RelationshipFinder::new(&config(), vec![1000, 1000]).unwrap();
        let mut table = KmerHitsTable::new();
        for q in (0..400).step_by(10) {
            table.register_query_code(q, u64::from(q));
            table.add_hit(0, q, q + 100).unwrap();
        }
        // a repeat far away on another diagonal
        for q in (0..100).step_by(10) {
            table.add_hit(0, q, q + 700).unwrap();
        }
        let clusters = finder.cluster_hits(&table, 0, false, 5);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].hits.len(), 40);
        assert!(clusters[0].hits.iter().all(|h| h.diagonal() == 100));
        assert!(clusters[1].hits.iter().all(|h| h.diagonal() == 700));
    }

    #[test]
    fn test_query_embedded_in_subject() {
        let finder = RelationshipFinder::new(&config(), vec![1000, 500]).unwrap();
        let qs: Vec<u32> = (0..480).step_by(8).collect();
        let forward = table(&qs, 250, &[]);
        let rels = finder.infer_relationships(1, &forward, &KmerHitsTable::new(), SearchMode::overlaps());
        assert_eq!(rels.len(), 1);
        let Relationship::Embedded(e) = &rels[0] else {
            panic!("expected a containment");
        };
        assert_eq!((e.sequence_id, e.host_id), (1, 0));
        assert_eq!((e.host_start, e.host_end), (250, 750));
        assert!(!e.reverse);
        assert!((e.evidence.evidence_proportion - 1.0).abs() < 1e-9);
        assert_eq!(e.evidence.indels_per_kbp, 0.0);
        assert!(rels[0].score() > 0);
    }

    #[test]
    fn test_query_start_overlaps_subject_end() {
        // query 1 (900bp) starts where the last 100bp of subject 0 begin
        let finder = RelationshipFinder::new(&config(), vec![1000, 900]).unwrap();
        let qs: Vec<u32> = (0..85).step_by(5).collect();
        let forward = table(&qs, 900, &[200, 400, 600]);
        let rels = finder.infer_relationships(1, &forward, &KmerHitsTable::new(), SearchMode::overlaps());
        assert_eq!(rels.len(), 1);
        let Relationship::Edge(edge) = &rels[0] else {
            panic!("expected an edge");
        };
        assert_eq!(edge.vertex1, AssemblyVertex::start(1));
        assert_eq!(edge.vertex2, AssemblyVertex::end(0));
        assert_eq!(edge.overlap(), 100);
        assert_eq!(edge.indels_per_kbp(), 0.0);
        // codes outside the overlap do not dilute the evidence
        assert!((edge.evidence.evidence_proportion - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reverse_hits_flip_query_vertex() {
        let finder = RelationshipFinder::new(&config(), vec![1000, 900]).unwrap();
        let qs: Vec<u32> = (0..85).step_by(5).collect();
        let reverse = table(&qs, 900, &[]);
        let rels = finder.infer_relationships(1, &KmerHitsTable::new(), &reverse, SearchMode::overlaps());
        let Relationship::Edge(edge) = &rels[0] else {
            panic!("expected an edge");
        };
        assert_eq!(edge.vertex1, AssemblyVertex::end(1));
        assert_eq!(edge.vertex2, AssemblyVertex::end(0));
    }

    #[test]
    fn test_larger_subjects_are_skipped() {
        let finder = RelationshipFinder::new(&config(), vec![500, 1000]).unwrap();
        let qs: Vec<u32> = (0..480).step_by(8).collect();
        let mut forward = KmerHitsTable::new();
        for (i, &q) in qs.iter().enumerate() {
            forward.register_query_code(q, i as u64);
            forward.add_hit(1, q, q + 250).unwrap();
        }
        let none = finder.infer_relationships(0, &forward, &KmerHitsTable::new(), SearchMode::overlaps());
        assert!(none.is_empty());
        let some = finder.infer_relationships(0, &forward, &KmerHitsTable::new(), SearchMode::only_embedded());
        assert_eq!(some.len(), 1);
        let limited = finder.infer_relationships(
            0,
            &forward,
            &KmerHitsTable::new(),
            SearchMode::only_embedded().with_subject_limit(1),
        );
        assert!(limited.is_empty());
    }

    #[test]
    fn test_too_few_hits() {
        let finder = RelationshipFinder::new(&config(), vec![1000, 1000]).unwrap();
        let codes: Vec<u32> = (0..900).step_by(5).collect();
        let forward = table(&[0, 5, 10], 500, &codes[3..]);
        let rels = finder.infer_relationships(1, &forward, &KmerHitsTable::new(), SearchMode::overlaps());
        assert!(rels.is_empty());
        assert!(finder
            .infer_relationships(1, &KmerHitsTable::new(), &KmerHitsTable::new(), SearchMode::overlaps())
            .is_empty());
    }

    #[test]
    fn test_select_good_embedded() {
        let good = Evidence {
            overlap: 500,
            shared_kmers: 60,
            weighted_coverage: 480.0,
            evidence_proportion: 1.0,
            indels_per_kbp: 0.5,
        };
        let weak = Evidence {
            evidence_proportion: 0.8,
            ..good
        };
        let rels: Vec<Relationship> = vec![
            AssemblyEmbedded::new(1, 0, 0, 500, false, good).into(),
            AssemblyEmbedded::new(1, 2, 0, 500, false, weak).into(),
            AssemblyEdge::new(AssemblyVertex::end(1), AssemblyVertex::start(0), good).into(),
        ];
        let kept = select_good_embedded(rels, &[1000, 500, 1000]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].sequences(), (1, 0));
    }
}
