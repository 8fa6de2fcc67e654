//! Non-branching paths through the relationship graph
//!
//! A path stores edge ids only. Every operation that needs the edges
//! themselves takes the owning [`AssemblyGraph`] as context.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::relationship::{AssemblyVertex, EdgeId};
use super::AssemblyGraph;
use crate::types::SequenceId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyPath {
    id: usize,
    left: AssemblyVertex,
    right: AssemblyVertex,
    edges: VecDeque<EdgeId>,
    alternatives: Vec<AssemblyPath>,
    consensus: Option<String>,
}

impl AssemblyPath {
    /// Path made of a single edge. `None` if the edge is not live.
    pub fn from_edge(graph: &AssemblyGraph, edge_id: EdgeId) -> Option<Self> {
        let edge = graph.edge(edge_id)?;
        let mut edges = VecDeque::with_capacity(1);
        edges.push_back(edge_id);
        Some(Self {
            id: 0,
            left: edge.vertex1,
            right: edge.vertex2,
            edges,
            alternatives: Vec::new(),
            consensus: None,
        })
    }

    /// Path spanning one sequence through its identity edge
    pub fn singleton(graph: &AssemblyGraph, sequence: SequenceId) -> Option<Self> {
        Self::from_edge(graph, graph.identity_edge(sequence)?)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    pub fn left(&self) -> AssemblyVertex {
        self.left
    }

    pub fn right(&self) -> AssemblyVertex {
        self.right
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.iter().copied()
    }

    /// Length in edges, identity edges included
    pub fn path_length(&self) -> usize {
        self.edges.len()
    }

    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.left, &mut self.right);
        self.edges.make_contiguous().reverse();
    }

    /// Extend the left end with an edge touching it
    pub fn connect_edge_left(&mut self, graph: &AssemblyGraph, edge_id: EdgeId) -> bool {
        let Some(next) = graph.edge(edge_id).and_then(|e| e.connecting_vertex(self.left)) else {
            return false;
        };
        self.edges.push_front(edge_id);
        self.left = next;
        true
    }

    /// Extend the right end with an edge touching it
    pub fn connect_edge_right(&mut self, graph: &AssemblyGraph, edge_id: EdgeId) -> bool {
        let Some(next) = graph.edge(edge_id).and_then(|e| e.connecting_vertex(self.right)) else {
            return false;
        };
        self.edges.push_back(edge_id);
        self.right = next;
        true
    }

    /// Append `other` after the right end, reversed first when `reverse` is
    /// set. Needs a live edge joining the two ends; the path is left
    /// untouched otherwise.
    pub fn connect_path_right(&mut self, graph: &AssemblyGraph, other: &AssemblyPath, reverse: bool) -> bool {
        let (other_left, other_right) = if reverse {
            (other.right, other.left)
        } else {
            (other.left, other.right)
        };
        let Some(junction) = graph.find_edge(self.right, other_left) else {
            return false;
        };
        if graph.edge(junction).map_or(true, |e| e.is_same_sequence_edge()) {
            return false;
        }
        self.edges.push_back(junction);
        if reverse {
            self.edges.extend(other.edges.iter().rev().copied());
        } else {
            self.edges.extend(other.edges.iter().copied());
        }
        self.right = other_right;
        self.alternatives.extend(other.alternatives.iter().cloned());
        true
    }

    /// Vertices from left to right; `path_length() + 1` entries
    pub fn vertices(&self, graph: &AssemblyGraph) -> Vec<AssemblyVertex> {
        let mut vertices = Vec::with_capacity(self.edges.len() + 1);
        let mut last = self.left;
        vertices.push(last);
        for &edge_id in &self.edges {
            let Some(next) = graph.edge(edge_id).and_then(|e| e.connecting_vertex(last)) else {
                log::debug!("Path {} references stale edge {}", self.id, edge_id);
                break;
            };
            vertices.push(next);
            last = next;
        }
        vertices
    }

    /// Sequences in path order
    pub fn sequence_ids(&self, graph: &AssemblyGraph) -> Vec<SequenceId> {
        let mut ids: Vec<SequenceId> = Vec::new();
        for vertex in self.vertices(graph) {
            if ids.last() != Some(&vertex.sequence) {
                ids.push(vertex.sequence);
            }
        }
        ids
    }

    /// Length in bp of the sequence the path spells
    pub fn estimated_length(&self, graph: &AssemblyGraph) -> u64 {
        let mut length = 0u64;
        for edge in self.edges.iter().filter_map(|&id| graph.edge(id)) {
            if edge.is_same_sequence_edge() {
                length += u64::from(graph.sequence_length(edge.vertex1.sequence).unwrap_or(0));
            } else {
                length = length.saturating_sub(u64::from(edge.overlap()));
            }
        }
        length
    }

    pub fn add_alternative_path(&mut self, path: AssemblyPath) {
        self.alternatives.push(path);
    }

    /// Short paths absorbed into this one
    pub fn alternative_paths(&self) -> &[AssemblyPath] {
        &self.alternatives
    }

    pub fn consensus(&self) -> Option<&str> {
        self.consensus.as_deref()
    }

    /// Store the consensus computed downstream
    pub fn set_consensus(&mut self, consensus: String) {
        self.consensus = Some(consensus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::relationship::{AssemblyEdge, Evidence};

    fn overlap_edge(v1: AssemblyVertex, v2: AssemblyVertex, overlap: u32) -> AssemblyEdge {
        AssemblyEdge::new(
            v1,
            v2,
            Evidence {
                overlap,
                evidence_proportion: 1.0,
                weighted_coverage: f64::from(overlap),
                ..Default::default()
            },
        )
    }

    fn chain_graph() -> AssemblyGraph {
        let mut graph = AssemblyGraph::new(&[1000, 800, 900]);
        graph.add_relationship(overlap_edge(AssemblyVertex::end(0), AssemblyVertex::start(1), 200).into());
        graph.add_relationship(overlap_edge(AssemblyVertex::end(1), AssemblyVertex::end(2), 300).into());
        graph
    }

    #[test]
    fn test_extend_both_sides() {
        let graph = chain_graph();
        let mut path = AssemblyPath::singleton(&graph, 1).unwrap();
        assert_eq!(path.path_length(), 1);

        let left = graph.find_edge(AssemblyVertex::start(1), AssemblyVertex::end(0)).unwrap();
        assert!(path.connect_edge_left(&graph, left));
        assert!(path.connect_edge_left(&graph, graph.identity_edge(0).unwrap()));
        let right = graph.find_edge(AssemblyVertex::end(1), AssemblyVertex::end(2)).unwrap();
        assert!(path.connect_edge_right(&graph, right));
        assert!(path.connect_edge_right(&graph, graph.identity_edge(2).unwrap()));
        // edge not touching the right end
        assert!(!path.connect_edge_right(&graph, left));

        assert_eq!(path.path_length(), 5);
        assert_eq!(path.left(), AssemblyVertex::start(0));
        assert_eq!(path.right(), AssemblyVertex::start(2));
        assert_eq!(path.sequence_ids(&graph), vec![0, 1, 2]);
        assert_eq!(path.estimated_length(&graph), 1000 + 800 - 200 + 900 - 300);
    }

    #[test]
    fn test_reverse() {
        let graph = chain_graph();
        let mut path = AssemblyPath::singleton(&graph, 0).unwrap();
        let edge = graph.find_edge(AssemblyVertex::end(0), AssemblyVertex::start(1)).unwrap();
        assert!(path.connect_edge_right(&graph, edge));
        path.reverse();
        assert_eq!(path.left(), AssemblyVertex::start(1));
        assert_eq!(path.right(), AssemblyVertex::start(0));
        assert_eq!(path.sequence_ids(&graph), vec![1, 0]);
    }

    #[test]
    fn test_connect_paths() {
        let graph = chain_graph();
        let mut first = AssemblyPath::singleton(&graph, 0).unwrap();
        let second = AssemblyPath::singleton(&graph, 1).unwrap();
        assert!(first.connect_path_right(&graph, &second, false));
        assert_eq!(first.right(), AssemblyVertex::end(1));

        // sequence 2 joins through its end, so it must be reversed
        let third = AssemblyPath::singleton(&graph, 2).unwrap();
        assert!(!first.connect_path_right(&graph, &third, false));
        assert_eq!(first.path_length(), 3);
        assert!(first.connect_path_right(&graph, &third, true));
        assert_eq!(first.right(), AssemblyVertex::start(2));
        assert_eq!(first.sequence_ids(&graph), vec![0, 1, 2]);
        assert_eq!(first.vertices(&graph).len(), first.path_length() + 1);
    }

    #[test]
    fn test_alternatives_and_consensus() {
        let graph = chain_graph();
        let mut host = AssemblyPath::singleton(&graph, 0).unwrap();
        host.add_alternative_path(AssemblyPath::singleton(&graph, 2).unwrap());
        host.set_consensus("ACGT".to_string());
        assert_eq!(host.alternative_paths().len(), 1);
        assert_eq!(host.consensus(), Some("ACGT"));
    }
}
