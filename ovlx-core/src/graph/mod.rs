//! Sequence relationship graph
//!
//! Two vertices per sequence, overlap edges between vertices of different
//! sequences, one identity edge per sequence and containment records keyed
//! both by host and by embedded sequence. Edges live in an arena indexed by
//! [`EdgeId`]; removed slots are left empty and never reused, so ids held by
//! paths stay stable.
//!
//! The graph is mutated by a single owner (the drain side of the worker
//! pool), which serialises insertion of the relationships of each sequence.

pub mod distribution;
pub mod path;
pub mod relationship;

use fnv::{FnvHashMap, FnvHashSet};

use crate::scoring::ScoresCalculator;
use crate::types::SequenceId;
use distribution::{Distribution, EdgeDistributions, NStatistics, NormalDistribution};
use path::AssemblyPath;
use relationship::{AssemblyEdge, AssemblyEmbedded, AssemblyVertex, EdgeId, Relationship, VertexId};

/// Fraction of the host at each end where coverage gaps are not evidence of a chimera
const CHIMERA_END_FRACTION: f64 = 0.1;

/// Final classification of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    Embedded,
    /// Index of the path in [`AssemblyGraph::paths`]
    InPath(usize),
    Isolated,
}

#[derive(Debug, Default)]
pub struct AssemblyGraph {
    sequence_lengths: Vec<u32>,
    edges: Vec<Option<AssemblyEdge>>,
    /// Vertex id -> live edges touching it, identity edge included
    adjacency: Vec<Vec<EdgeId>>,
    edge_index: FnvHashMap<(VertexId, VertexId), EdgeId>,
    embedded_by_host: FnvHashMap<SequenceId, Vec<AssemblyEmbedded>>,
    embedded_by_sequence: FnvHashMap<SequenceId, Vec<AssemblyEmbedded>>,
    chimeric: Vec<bool>,
    /// Vertex id -> lost its last overlap edge
    isolated: Vec<bool>,
    paths: Vec<AssemblyPath>,
    path_of_sequence: Vec<Option<usize>>,
    num_overlap_edges: usize,
    expected_assembly_length: u64,
    ploidy: usize,
}

impl AssemblyGraph {
    /// Create the vertices and identity edges of the given sequences
    pub fn new(sequence_lengths: &[u32]) -> Self {
        let n = sequence_lengths.len();
        let mut graph = Self {
            sequence_lengths: sequence_lengths.to_vec(),
            edges: Vec::with_capacity(n),
            adjacency: vec![Vec::new(); 2 * n],
            chimeric: vec![false; n],
            isolated: vec![false; 2 * n],
            path_of_sequence: vec![None; n],
            ploidy: 1,
            ..Default::default()
        };
        for (sequence, &length) in sequence_lengths.iter().enumerate() {
            graph.insert_edge(AssemblyEdge::identity(sequence as SequenceId, length));
        }
        graph
    }

    pub fn num_sequences(&self) -> usize {
        self.sequence_lengths.len()
    }

    pub fn sequence_length(&self, sequence: SequenceId) -> Option<u32> {
        self.sequence_lengths.get(sequence as usize).copied()
    }

    pub fn set_expected_assembly_length(&mut self, length: u64) {
        self.expected_assembly_length = length;
    }

    pub fn expected_assembly_length(&self) -> u64 {
        self.expected_assembly_length
    }

    pub fn set_ploidy(&mut self, ploidy: usize) {
        self.ploidy = ploidy.max(1);
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    fn contains_sequence(&self, sequence: SequenceId) -> bool {
        (sequence as usize) < self.sequence_lengths.len()
    }

    pub fn vertex(&self, sequence: SequenceId, start: bool) -> Option<AssemblyVertex> {
        self.contains_sequence(sequence)
            .then_some(AssemblyVertex { sequence, start })
    }

    pub fn vertex_by_id(&self, id: VertexId) -> Option<AssemblyVertex> {
        self.vertex(id / 2, id % 2 == 0)
    }

    /// Live edge by id; stale ids read as absent
    pub fn edge(&self, id: EdgeId) -> Option<&AssemblyEdge> {
        self.edges.get(id).and_then(Option::as_ref)
    }

    pub fn identity_edge(&self, sequence: SequenceId) -> Option<EdgeId> {
        let id = sequence as EdgeId;
        self.edge(id).map(|_| id)
    }

    pub fn find_edge(&self, v1: AssemblyVertex, v2: AssemblyVertex) -> Option<EdgeId> {
        let (a, b) = (v1.id(), v2.id());
        let key = if a <= b { (a, b) } else { (b, a) };
        self.edge_index.get(&key).copied()
    }

    /// Live edges touching a vertex, identity edge included
    pub fn edges_of(&self, vertex: AssemblyVertex) -> impl Iterator<Item = (EdgeId, &AssemblyEdge)> + '_ {
        self.adjacency
            .get(vertex.id() as usize)
            .into_iter()
            .flatten()
            .filter_map(move |&id| self.edge(id).map(|edge| (id, edge)))
    }

    /// Overlap edges touching a vertex whose other end is not embedded
    fn active_overlap_edges(&self, vertex: AssemblyVertex) -> impl Iterator<Item = (EdgeId, &AssemblyEdge)> + '_ {
        self.edges_of(vertex).filter(move |(_, edge)| {
            !edge.is_same_sequence_edge()
                && !self.is_embedded(edge.vertex1.sequence)
                && !self.is_embedded(edge.vertex2.sequence)
        })
    }

    /// Live overlap edges
    pub fn overlap_edges(&self) -> impl Iterator<Item = (EdgeId, &AssemblyEdge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(id, edge)| edge.as_ref().map(|e| (id, e)))
            .filter(|(_, edge)| !edge.is_same_sequence_edge())
    }

    pub fn num_edges(&self) -> usize {
        self.num_overlap_edges
    }

    fn insert_edge(&mut self, edge: AssemblyEdge) -> EdgeId {
        let id = self.edges.len();
        let key = edge.key();
        let overlap = !edge.is_same_sequence_edge();
        for vertex in [edge.vertex1, edge.vertex2] {
            self.adjacency[vertex.id() as usize].push(id);
            if overlap {
                self.isolated[vertex.id() as usize] = false;
            }
        }
        if overlap {
            self.num_overlap_edges += 1;
        }
        self.edge_index.insert(key, id);
        self.edges.push(Some(edge));
        id
    }

    fn remove_edge(&mut self, id: EdgeId) -> bool {
        let Some(edge) = self.edges.get_mut(id).and_then(Option::take) else {
            return false;
        };
        self.edge_index.remove(&edge.key());
        for vertex in [edge.vertex1, edge.vertex2] {
            let slot = vertex.id() as usize;
            self.adjacency[slot].retain(|&e| e != id);
            if !edge.is_same_sequence_edge() && !self.has_overlap_edges(vertex) {
                log::trace!("Vertex {} lost its last overlap edge", slot);
                self.isolated[slot] = true;
            }
        }
        if !edge.is_same_sequence_edge() {
            self.num_overlap_edges -= 1;
        }
        true
    }

    fn has_overlap_edges(&self, vertex: AssemblyVertex) -> bool {
        self.edges_of(vertex).any(|(_, e)| !e.is_same_sequence_edge())
    }

    /// Insert a candidate. Candidates naming unknown sequences or relating
    /// a sequence to itself are skipped. When an edge between the same
    /// vertices already exists the better supported one is kept.
    pub fn add_relationship(&mut self, relationship: Relationship) -> bool {
        let (a, b) = relationship.sequences();
        if !self.contains_sequence(a) || !self.contains_sequence(b) {
            log::warn!("Skipping relationship between unknown sequences {} and {}", a, b);
            return false;
        }
        if a == b {
            log::debug!("Skipping self relationship of sequence {}", a);
            return false;
        }
        match relationship {
            Relationship::Edge(edge) => {
                if let Some(existing) = self.find_edge(edge.vertex1, edge.vertex2) {
                    let keep_existing = self
                        .edge(existing)
                        .map_or(false, |old| (old.cost, std::cmp::Reverse(old.score)) <= (edge.cost, std::cmp::Reverse(edge.score)));
                    if keep_existing {
                        return false;
                    }
                    self.remove_edge(existing);
                }
                self.insert_edge(edge);
                true
            }
            Relationship::Embedded(embedded) => {
                let known = self
                    .embedded_by_sequence
                    .get(&embedded.sequence_id)
                    .map_or(false, |list| list.iter().any(|e| e.same_placement(&embedded)));
                if known {
                    return false;
                }
                self.embedded_by_host
                    .entry(embedded.host_id)
                    .or_default()
                    .push(embedded.clone());
                self.embedded_by_sequence
                    .entry(embedded.sequence_id)
                    .or_default()
                    .push(embedded);
                true
            }
        }
    }

    /// Remove a relationship from both of its endpoints. Removing something
    /// absent is a no-op.
    pub fn remove_relationship(&mut self, relationship: &Relationship) -> bool {
        match relationship {
            Relationship::Edge(edge) => {
                if edge.is_same_sequence_edge() {
                    return false;
                }
                match self.find_edge(edge.vertex1, edge.vertex2) {
                    Some(id) => self.remove_edge(id),
                    None => false,
                }
            }
            Relationship::Embedded(embedded) => self.remove_embedded(embedded),
        }
    }

    fn remove_embedded(&mut self, embedded: &AssemblyEmbedded) -> bool {
        let mut removed = false;
        if let Some(list) = self.embedded_by_sequence.get_mut(&embedded.sequence_id) {
            let before = list.len();
            list.retain(|e| !e.same_placement(embedded));
            removed = list.len() != before;
            if list.is_empty() {
                self.embedded_by_sequence.remove(&embedded.sequence_id);
            }
        }
        if let Some(list) = self.embedded_by_host.get_mut(&embedded.host_id) {
            list.retain(|e| !e.same_placement(embedded));
            if list.is_empty() {
                self.embedded_by_host.remove(&embedded.host_id);
            }
        }
        removed
    }

    /// Hosts of a sequence
    pub fn embedded_by_sequence(&self, sequence: SequenceId) -> &[AssemblyEmbedded] {
        self.embedded_by_sequence
            .get(&sequence)
            .map_or(&[], Vec::as_slice)
    }

    /// Sequences contained in a host
    pub fn embedded_by_host(&self, host: SequenceId) -> &[AssemblyEmbedded] {
        self.embedded_by_host.get(&host).map_or(&[], Vec::as_slice)
    }

    pub fn is_embedded(&self, sequence: SequenceId) -> bool {
        self.embedded_by_sequence.contains_key(&sequence)
    }

    /// Number of containment records
    pub fn embedded_count(&self) -> usize {
        self.embedded_by_sequence.values().map(Vec::len).sum()
    }

    /// Number of sequences contained in at least one host
    pub fn embedded_sequences_count(&self) -> usize {
        self.embedded_by_sequence.len()
    }

    /// Keep only the relationships of a sequence scoring at least `ratio`
    /// times the best one at the same vertex (edges) or among its hosts
    /// (embeddings). Run once all candidates of the sequence are known.
    pub fn filter_edges_and_embedded(&mut self, sequence: SequenceId, ratio: f64) {
        if !self.contains_sequence(sequence) {
            return;
        }
        let hosts = self.embedded_by_sequence(sequence).to_vec();
        if let Some(best) = hosts.iter().map(|e| e.score).max() {
            for embedded in hosts.iter().filter(|e| (e.score as f64) < ratio * best as f64) {
                log::trace!("Filtering host {} of sequence {}", embedded.host_id, sequence);
                self.remove_embedded(embedded);
            }
        }
        for vertex in [AssemblyVertex::start(sequence), AssemblyVertex::end(sequence)] {
            let candidates: Vec<(EdgeId, u64)> = self
                .edges_of(vertex)
                .filter(|(_, e)| !e.is_same_sequence_edge())
                .map(|(id, e)| (id, e.score))
                .collect();
            let Some(best) = candidates.iter().map(|&(_, score)| score).max() else {
                continue;
            };
            for (id, _) in candidates.iter().filter(|(_, s)| (*s as f64) < ratio * best as f64) {
                log::trace!("Filtering edge {} at vertex {}", id, vertex.id());
                self.remove_edge(*id);
            }
        }
    }

    /// Remove the overlap edges of every embedded sequence. Returns the
    /// number of sequences pruned.
    pub fn prune_embedded_sequences(&mut self) -> usize {
        let mut embedded: Vec<SequenceId> = self.embedded_by_sequence.keys().copied().collect();
        embedded.sort_unstable();
        for &sequence in &embedded {
            for vertex in [AssemblyVertex::start(sequence), AssemblyVertex::end(sequence)] {
                let ids: Vec<EdgeId> = self
                    .edges_of(vertex)
                    .filter(|(_, e)| !e.is_same_sequence_edge())
                    .map(|(id, _)| id)
                    .collect();
                for id in ids {
                    self.remove_edge(id);
                }
            }
        }
        log::info!(
            "Pruned edges of {} embedded sequences. Remaining edges: {}",
            embedded.len(),
            self.num_overlap_edges
        );
        embedded.len()
    }

    /// Flag hosts whose embedded reads leave an uncovered gap away from the
    /// host ends while both sides are covered by at least `min_flank_depth`
    /// reads. Returns the newly flagged hosts.
    pub fn detect_chimeric_sequences(&mut self, min_flank_depth: usize) -> Vec<SequenceId> {
        let mut hosts: Vec<SequenceId> = self.embedded_by_host.keys().copied().collect();
        hosts.sort_unstable();
        let mut flagged = Vec::new();
        for host in hosts {
            if self.chimeric[host as usize] {
                continue;
            }
            let Some(length) = self.sequence_length(host) else {
                continue;
            };
            if self.has_internal_gap(self.embedded_by_host(host), length, min_flank_depth) {
                log::debug!("Sequence {} flagged as chimeric", host);
                self.chimeric[host as usize] = true;
                flagged.push(host);
            }
        }
        log::info!("Detected {} chimeric sequences", flagged.len());
        flagged
    }

    fn has_internal_gap(&self, embedded: &[AssemblyEmbedded], length: u32, min_flank_depth: usize) -> bool {
        if embedded.len() < 2 * min_flank_depth.max(1) || length == 0 {
            return false;
        }
        let length = length as usize;
        let mut delta = vec![0i64; length + 1];
        for e in embedded {
            let start = (e.host_start as usize).min(length);
            let end = (e.host_end as usize).min(length);
            if start < end {
                delta[start] += 1;
                delta[end] -= 1;
            }
        }
        let margin = (CHIMERA_END_FRACTION * length as f64) as usize;
        let mut depth = 0i64;
        let mut run_checked = false;
        for (pos, change) in delta.iter().enumerate().take(length) {
            depth += change;
            if depth > 0 {
                run_checked = false;
                continue;
            }
            // flank counts are constant along an uncovered run
            if run_checked || pos < margin || pos + margin >= length {
                continue;
            }
            run_checked = true;
            let left = embedded.iter().filter(|e| (e.host_end as usize) <= pos).count();
            let right = embedded.iter().filter(|e| (e.host_start as usize) > pos).count();
            if left >= min_flank_depth && right >= min_flank_depth {
                return true;
            }
        }
        false
    }

    pub fn mark_chimeric(&mut self, sequence: SequenceId) {
        if let Some(flag) = self.chimeric.get_mut(sequence as usize) {
            *flag = true;
        }
    }

    pub fn is_chimeric(&self, sequence: SequenceId) -> bool {
        self.chimeric.get(sequence as usize).copied().unwrap_or(false)
    }

    /// Sequences whose every host is chimeric. Their containment cannot be
    /// trusted, so they must be processed again as regular reads.
    pub fn calculate_embedded_to_chimeric(&self) -> FnvHashSet<SequenceId> {
        self.embedded_by_sequence
            .iter()
            .filter(|(_, hosts)| !hosts.is_empty() && hosts.iter().all(|e| self.is_chimeric(e.host_id)))
            .map(|(&sequence, _)| sequence)
            .collect()
    }

    /// Whether the vertex lost all its overlap edges to filtering or pruning
    pub fn is_vertex_isolated(&self, vertex: AssemblyVertex) -> bool {
        self.isolated.get(vertex.id() as usize).copied().unwrap_or(false)
    }

    /// A non-embedded sequence with no overlap edge left at either end
    pub fn is_isolated(&self, sequence: SequenceId) -> bool {
        self.contains_sequence(sequence)
            && !self.is_embedded(sequence)
            && !self.has_overlap_edges(AssemblyVertex::start(sequence))
            && !self.has_overlap_edges(AssemblyVertex::end(sequence))
    }

    /// Cheapest overlap edge at a vertex, ignoring embedded sequences. Ties
    /// go to the higher score, then to the older edge.
    pub fn edge_min_cost(&self, vertex: AssemblyVertex) -> Option<EdgeId> {
        self.active_overlap_edges(vertex)
            .min_by_key(|(id, e)| (e.cost, std::cmp::Reverse(e.score), *id))
            .map(|(id, _)| id)
    }

    /// Highest scoring overlap edge at a vertex
    fn edge_max_score(&self, vertex: AssemblyVertex) -> Option<EdgeId> {
        self.active_overlap_edges(vertex)
            .min_by_key(|(id, e)| (std::cmp::Reverse(e.score), e.cost, *id))
            .map(|(id, _)| id)
    }

    /// Longest overlap edge at a vertex, ignoring embedded sequences
    pub fn edge_best_overlap(&self, vertex: AssemblyVertex) -> Option<EdgeId> {
        self.active_overlap_edges(vertex)
            .min_by_key(|(id, e)| (std::cmp::Reverse(e.overlap()), e.cost, *id))
            .map(|(id, _)| id)
    }

    fn select_mutual_best<F>(&self, best_at: F) -> Vec<EdgeId>
    where
        F: Fn(AssemblyVertex) -> Option<EdgeId>,
    {
        let mut selected: Vec<EdgeId> = self
            .overlap_edges()
            .filter(|(_, e)| !self.is_embedded(e.vertex1.sequence) && !self.is_embedded(e.vertex2.sequence))
            .filter(|(id, e)| best_at(e.vertex1) == Some(*id) && best_at(e.vertex2) == Some(*id))
            .map(|(id, _)| id)
            .collect();
        selected.sort_unstable();
        selected
    }

    /// Overlap edges that are the minimum cost edge at both of their ends
    pub fn select_safe_edges(&self) -> Vec<EdgeId> {
        self.select_mutual_best(|v| self.edge_min_cost(v))
    }

    /// Assemble maximal non-branching paths from a subset of overlap edges.
    /// Every non-embedded sequence ends in exactly one path, possibly alone.
    /// Vertices offered more than one edge keep the cheapest and edges
    /// closing a cycle are dropped. Stale ids are skipped.
    pub fn build_paths(&self, edges: &[EdgeId]) -> Vec<AssemblyPath> {
        let n = self.num_sequences();
        let mut candidates: Vec<(EdgeId, &AssemblyEdge)> = edges
            .iter()
            .filter_map(|&id| self.edge(id).map(|e| (id, e)))
            .filter(|(_, e)| !e.is_same_sequence_edge())
            .filter(|(_, e)| !self.is_embedded(e.vertex1.sequence) && !self.is_embedded(e.vertex2.sequence))
            .collect();
        candidates.sort_unstable_by_key(|(id, e)| (e.cost, *id));
        candidates.dedup_by_key(|(id, _)| *id);

        let mut partner: Vec<Option<EdgeId>> = vec![None; 2 * n];
        let mut components = DisjointSet::new(n);
        for (id, edge) in candidates {
            let (a, b) = (edge.vertex1.id() as usize, edge.vertex2.id() as usize);
            if partner[a].is_some() || partner[b].is_some() {
                continue;
            }
            if !components.union(edge.vertex1.sequence as usize, edge.vertex2.sequence as usize) {
                log::trace!("Edge {} would close a cycle", id);
                continue;
            }
            partner[a] = Some(id);
            partner[b] = Some(id);
        }

        let mut visited = vec![false; n];
        let mut paths = Vec::new();
        for sequence in 0..n as SequenceId {
            if visited[sequence as usize] || self.is_embedded(sequence) {
                continue;
            }
            // walk to one end of the component
            let mut end = AssemblyVertex::start(sequence);
            while let Some(next) = partner[end.id() as usize]
                .and_then(|id| self.edge(id))
                .and_then(|e| e.connecting_vertex(end))
            {
                end = next.opposite();
                if end.sequence == sequence {
                    break;
                }
            }
            let Some(mut path) = AssemblyPath::singleton(self, end.sequence) else {
                continue;
            };
            if path.left() != end {
                path.reverse();
            }
            visited[end.sequence as usize] = true;
            loop {
                let right = path.right();
                let Some(id) = partner[right.id() as usize] else {
                    break;
                };
                if !path.connect_edge_right(self, id) {
                    break;
                }
                let next = path.right().sequence;
                if visited[next as usize] {
                    break;
                }
                visited[next as usize] = true;
                let Some(identity) = self.identity_edge(next) else {
                    break;
                };
                path.connect_edge_right(self, identity);
            }
            paths.push(path);
        }
        paths
    }

    /// Fit the edge feature distributions over a subset of overlap edges,
    /// skipping edges touching the excluded sequences
    pub fn estimate_distributions(&self, edges: &[EdgeId], excluded: &FnvHashSet<SequenceId>) -> EdgeDistributions {
        let mut overlap = Distribution::new();
        let mut coverage = Distribution::new();
        let mut coverage_prop = Distribution::new();
        let mut overlap_sd = Distribution::new();
        let mut ev_prop = Distribution::new();
        let mut ikbp = Distribution::new();
        for edge in edges.iter().filter_map(|&id| self.edge(id)) {
            if edge.is_same_sequence_edge()
                || excluded.contains(&edge.vertex1.sequence)
                || excluded.contains(&edge.vertex2.sequence)
            {
                continue;
            }
            let evidence = &edge.evidence;
            overlap.process_datapoint(f64::from(evidence.overlap));
            coverage.process_datapoint(evidence.weighted_coverage);
            coverage_prop.process_datapoint(evidence.coverage_proportion());
            overlap_sd.process_datapoint(edge.overlap_standard_deviation);
            ev_prop.process_datapoint(evidence.evidence_proportion);
            ikbp.process_datapoint(evidence.indels_per_kbp);
        }
        EdgeDistributions {
            overlap: NormalDistribution::from(&overlap),
            weighted_coverage: NormalDistribution::from(&coverage),
            coverage_proportion: NormalDistribution::from(&coverage_prop),
            overlap_standard_deviation: NormalDistribution::from(&overlap_sd),
            evidence_proportion: NormalDistribution::from(&ev_prop),
            indels_per_kbp: NormalDistribution::from(&ikbp),
        }
    }

    /// Recompute score and cost of every relationship. Distributions are
    /// fitted over the mutually best scoring edges, or over every edge when
    /// there are none.
    pub fn update_scores(&mut self, calculator: &ScoresCalculator) {
        let mut trusted = self.select_mutual_best(|v| self.edge_max_score(v));
        if trusted.is_empty() {
            trusted = self.overlap_edges().map(|(id, _)| id).collect();
        }
        let dists = self.estimate_distributions(&trusted, &FnvHashSet::default());
        log::info!(
            "Fitted edge distributions on {} edges. Overlap mean {:.1}, indels/kbp mean {:.2}",
            trusted.len(),
            dists.overlap.mean(),
            dists.indels_per_kbp.mean()
        );
        for slot in self.edges.iter_mut() {
            let Some(edge) = slot.take() else {
                continue;
            };
            if edge.is_same_sequence_edge() {
                *slot = Some(edge);
                continue;
            }
            let mut rel = Relationship::Edge(edge);
            calculator.update(&mut rel, &dists);
            if let Relationship::Edge(edge) = rel {
                *slot = Some(edge);
            }
        }
        for lists in [&mut self.embedded_by_sequence, &mut self.embedded_by_host] {
            for embedded in lists.values_mut().flatten() {
                let mut rel = Relationship::Embedded(embedded.clone());
                calculator.update(&mut rel, &dists);
                embedded.score = rel.score();
                embedded.cost = rel.cost();
            }
        }
    }

    /// Store a final path. Its id becomes its 1-based position. Sequences
    /// of absorbed alternative paths are assigned to it as well.
    pub fn add_path(&mut self, mut path: AssemblyPath) {
        let index = self.paths.len();
        path.set_id(index + 1);
        let mut sequences = path.sequence_ids(self);
        for alternative in path.alternative_paths() {
            sequences.extend(alternative.sequence_ids(self));
        }
        for sequence in sequences {
            if let Some(slot) = self.path_of_sequence.get_mut(sequence as usize) {
                *slot = Some(index);
            }
        }
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[AssemblyPath] {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut [AssemblyPath] {
        &mut self.paths
    }

    pub fn sequence_status(&self, sequence: SequenceId) -> SequenceStatus {
        if self.is_embedded(sequence) {
            return SequenceStatus::Embedded;
        }
        match self.path_of_sequence.get(sequence as usize).copied().flatten() {
            Some(index) => SequenceStatus::InPath(index),
            None => SequenceStatus::Isolated,
        }
    }

    /// Contiguity of the final paths
    pub fn estimate_n_statistics(&self) -> Option<NStatistics> {
        let lengths: Vec<u64> = self.paths.iter().map(|p| p.estimated_length(self)).collect();
        NStatistics::from_lengths(&lengths)
    }
}

/// Union-find with path halving and union by size
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Join the sets of `a` and `b`; false if they were already joined
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }
}
