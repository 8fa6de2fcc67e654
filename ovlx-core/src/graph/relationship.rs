//! Vertices, edges and embeddings of the sequence relationship graph

use serde::{Deserialize, Serialize};

use crate::types::SequenceId;

/// Unique vertex number: `2 * sequence` for the start, `2 * sequence + 1`
/// for the end
pub type VertexId = u32;

/// Index of an edge in the graph arena
pub type EdgeId = usize;

/// One of the two ends of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssemblyVertex {
    pub sequence: SequenceId,
    pub start: bool,
}

impl AssemblyVertex {
    pub fn start(sequence: SequenceId) -> Self {
        Self { sequence, start: true }
    }

    pub fn end(sequence: SequenceId) -> Self {
        Self { sequence, start: false }
    }

    pub fn from_id(id: VertexId) -> Self {
        Self {
            sequence: id / 2,
            start: id % 2 == 0,
        }
    }

    pub fn id(&self) -> VertexId {
        2 * self.sequence + u32::from(!self.start)
    }

    /// The other end of the same sequence
    pub fn opposite(&self) -> Self {
        Self {
            sequence: self.sequence,
            start: !self.start,
        }
    }
}

/// Raw support of a relationship, shared by edges and embeddings
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    /// Length of the overlapping region in bp
    pub overlap: u32,
    /// Number of k-mer hits supporting the relationship
    pub shared_kmers: u32,
    /// Query bases covered by hits, weighted by k-mer uniqueness
    pub weighted_coverage: f64,
    /// Fraction of the query k-mers in the overlap explained by the hits
    pub evidence_proportion: f64,
    pub indels_per_kbp: f64,
}

impl Evidence {
    /// Weighted coverage relative to the overlap length
    pub fn coverage_proportion(&self) -> f64 {
        self.weighted_coverage / (f64::from(self.overlap) + 1.0)
    }
}

/// Overlap between the ends of two different sequences, or the identity
/// edge joining the two ends of one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyEdge {
    pub vertex1: AssemblyVertex,
    pub vertex2: AssemblyVertex,
    pub evidence: Evidence,
    /// Spread of the hit diagonals
    pub overlap_standard_deviation: f64,
    pub score: u64,
    pub cost: u64,
}

impl AssemblyEdge {
    pub fn new(vertex1: AssemblyVertex, vertex2: AssemblyVertex, evidence: Evidence) -> Self {
        Self {
            vertex1,
            vertex2,
            evidence,
            overlap_standard_deviation: 0.0,
            score: 0,
            cost: 0,
        }
    }

    /// Edge joining both ends of a sequence. It never takes part in cost
    /// based selection.
    pub fn identity(sequence: SequenceId, length: u32) -> Self {
        let evidence = Evidence {
            overlap: length,
            shared_kmers: 0,
            weighted_coverage: f64::from(length),
            evidence_proportion: 1.0,
            indels_per_kbp: 0.0,
        };
        Self::new(AssemblyVertex::start(sequence), AssemblyVertex::end(sequence), evidence)
    }

    pub fn is_same_sequence_edge(&self) -> bool {
        self.vertex1.sequence == self.vertex2.sequence
    }

    /// Vertex at the other side of the edge, `None` if the edge does not
    /// touch `vertex`
    pub fn connecting_vertex(&self, vertex: AssemblyVertex) -> Option<AssemblyVertex> {
        if self.vertex1 == vertex {
            Some(self.vertex2)
        } else if self.vertex2 == vertex {
            Some(self.vertex1)
        } else {
            None
        }
    }

    pub fn touches_sequence(&self, sequence: SequenceId) -> bool {
        self.vertex1.sequence == sequence || self.vertex2.sequence == sequence
    }

    /// Vertex ids in increasing order, the key of the edge in the graph
    pub fn key(&self) -> (VertexId, VertexId) {
        let (a, b) = (self.vertex1.id(), self.vertex2.id());
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    pub fn overlap(&self) -> u32 {
        self.evidence.overlap
    }

    pub fn indels_per_kbp(&self) -> f64 {
        self.evidence.indels_per_kbp
    }
}

/// A sequence fully contained in a longer host sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyEmbedded {
    pub sequence_id: SequenceId,
    pub host_id: SequenceId,
    /// Start of the embedded sequence within the host
    pub host_start: u32,
    pub host_end: u32,
    /// Embedded in reverse complement
    pub reverse: bool,
    pub evidence: Evidence,
    pub score: u64,
    pub cost: u64,
}

impl AssemblyEmbedded {
    pub fn new(
        sequence_id: SequenceId,
        host_id: SequenceId,
        host_start: u32,
        host_end: u32,
        reverse: bool,
        evidence: Evidence,
    ) -> Self {
        Self {
            sequence_id,
            host_id,
            host_start,
            host_end,
            reverse,
            evidence,
            score: 0,
            cost: 0,
        }
    }

    /// Two records describe the same containment
    pub fn same_placement(&self, other: &AssemblyEmbedded) -> bool {
        self.sequence_id == other.sequence_id
            && self.host_id == other.host_id
            && self.host_start == other.host_start
            && self.reverse == other.reverse
    }
}

/// Candidate produced by relationship discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Relationship {
    Edge(AssemblyEdge),
    Embedded(AssemblyEmbedded),
}

impl Relationship {
    pub fn evidence(&self) -> &Evidence {
        match self {
            Relationship::Edge(edge) => &edge.evidence,
            Relationship::Embedded(embedded) => &embedded.evidence,
        }
    }

    pub fn score(&self) -> u64 {
        match self {
            Relationship::Edge(edge) => edge.score,
            Relationship::Embedded(embedded) => embedded.score,
        }
    }

    pub fn cost(&self) -> u64 {
        match self {
            Relationship::Edge(edge) => edge.cost,
            Relationship::Embedded(embedded) => embedded.cost,
        }
    }

    pub fn set_score(&mut self, score: u64) {
        match self {
            Relationship::Edge(edge) => edge.score = score,
            Relationship::Embedded(embedded) => embedded.score = score,
        }
    }

    pub fn set_cost(&mut self, cost: u64) {
        match self {
            Relationship::Edge(edge) => edge.cost = cost,
            Relationship::Embedded(embedded) => embedded.cost = cost,
        }
    }

    /// Diagonal spread; embeddings do not record it
    pub fn overlap_standard_deviation(&self) -> Option<f64> {
        match self {
            Relationship::Edge(edge) => Some(edge.overlap_standard_deviation),
            Relationship::Embedded(_) => None,
        }
    }

    /// Sequences related by this candidate
    pub fn sequences(&self) -> (SequenceId, SequenceId) {
        match self {
            Relationship::Edge(edge) => (edge.vertex1.sequence, edge.vertex2.sequence),
            Relationship::Embedded(embedded) => (embedded.sequence_id, embedded.host_id),
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Relationship::Embedded(_))
    }
}

impl From<AssemblyEdge> for Relationship {
    fn from(edge: AssemblyEdge) -> Self {
        Relationship::Edge(edge)
    }
}

impl From<AssemblyEmbedded> for Relationship {
    fn from(embedded: AssemblyEmbedded) -> Self {
        Relationship::Embedded(embedded)
    }
}
