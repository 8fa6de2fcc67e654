//! Kruskal style path layout
//!
//! Paths start from the safe (mutually cheapest) edges and are then joined
//! greedily through the cheapest edges between path ends, keeping every
//! end at degree one so the result stays a set of disjoint paths. Two
//! optional passes follow: short paths hanging off a longer one are
//! absorbed as alternative branches, and paths whose ends attract votes
//! from each other are merged.

use std::collections::{BTreeMap, VecDeque};

use fnv::{FnvHashMap, FnvHashSet};

use crate::config::LayoutThresholds;
use crate::error::LayoutResult;
use crate::graph::distribution::{Distribution, NStatistics};
use crate::graph::path::AssemblyPath;
use crate::graph::relationship::{AssemblyVertex, EdgeId, VertexId};
use crate::graph::{AssemblyGraph, DisjointSet};
use crate::pool::WorkerPool;

/// Where a vertex sits inside the current path list
#[derive(Debug, Clone, Copy)]
struct VertexPathLocation {
    path: usize,
    path_length: usize,
    position: usize,
}

/// Averaged votes for joining two signed path ends
#[derive(Debug, Clone, Copy, Default)]
struct JunctionVotes {
    total_cost: u64,
    votes: u64,
}

impl JunctionVotes {
    fn add_vote(&mut self, cost: u64) {
        self.total_cost = self.total_cost.saturating_add(cost);
        self.votes += 1;
    }

    fn cost(&self) -> u64 {
        if self.votes == 0 {
            u64::MAX
        } else {
            self.total_cost / self.votes
        }
    }
}

pub struct KruskalPathLayout {
    thresholds: LayoutThresholds,
}

impl KruskalPathLayout {
    pub fn new(thresholds: LayoutThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &LayoutThresholds {
        &self.thresholds
    }

    /// Select the final paths and store them in the graph. Returns the
    /// contiguity of the stored paths, `None` when no path survived.
    pub fn find_paths(&self, graph: &mut AssemblyGraph, pool: &WorkerPool) -> LayoutResult<Option<NStatistics>> {
        let mut path_edges = graph.select_safe_edges();
        log::info!("Number of safe edges: {}", path_edges.len());
        let safe_paths = graph.build_paths(&path_edges);
        log::info!("Number of paths from safe edges: {}", safe_paths.len());

        let connecting = self.select_connecting_edges(graph, &safe_paths, &path_edges, pool)?;
        log::info!("Selected {} edges connecting safe paths", connecting.len());
        path_edges.extend(connecting);
        let mut paths = graph.build_paths(&path_edges);

        if self.thresholds.run_improvement_algorithms {
            let costs = path_edge_costs(graph, &path_edges);
            log::info!("Paths before improvements: {}", paths.len());
            paths = self.collect_alternative_small_paths(graph, paths);
            log::info!("Paths after collecting small alternative paths: {}", paths.len());
            paths = self.merge_close_paths(graph, paths, &costs);
            log::info!("Paths after merging close paths: {}", paths.len());
        }

        for path in paths {
            if path.path_length() < self.thresholds.min_path_length {
                continue;
            }
            graph.add_path(path);
        }
        log::info!("Final number of paths: {}", graph.paths().len());
        let stats = graph.estimate_n_statistics();
        match &stats {
            Some(stats) => log::info!("Estimated N statistics: {}", stats),
            None => log::info!("No paths left for N statistics"),
        }
        Ok(stats)
    }

    /// Kruskal over the edges joining path ends. Ends are used at most once
    /// and edges joining two ends of an already connected group are skipped.
    fn select_connecting_edges(
        &self,
        graph: &AssemblyGraph,
        paths: &[AssemblyPath],
        path_edges: &[EdgeId],
        pool: &WorkerPool,
    ) -> LayoutResult<Vec<EdgeId>> {
        let ikbp = graph.estimate_distributions(path_edges, &FnvHashSet::default()).indels_per_kbp;
        let limit_ikbp = ikbp.mean() + self.thresholds.ikbp_stddev_factor * ikbp.standard_deviation();
        log::info!(
            "Limit for indels/kbp: {:.3}. Average: {:.3} variance: {:.3}",
            limit_ikbp,
            ikbp.mean(),
            ikbp.variance()
        );

        let vertices: Vec<AssemblyVertex> = paths.iter().flat_map(|p| [p.left(), p.right()]).collect();
        let per_vertex = pool.map("layout-candidates", &vertices, |&vertex| {
            graph
                .edges_of(vertex)
                .filter(|(_, e)| !e.is_same_sequence_edge())
                .filter(|(_, e)| !graph.is_embedded(e.vertex1.sequence) && !graph.is_embedded(e.vertex2.sequence))
                .map(|(id, _)| id)
                .collect::<Vec<EdgeId>>()
        })?;
        let mut candidates: Vec<EdgeId> = per_vertex.into_iter().flatten().collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates.sort_by_key(|&id| (graph.edge(id).map_or(u64::MAX, |e| e.cost), id));
        log::debug!(
            "Extracted {} end vertices and {} candidate edges",
            vertices.len(),
            candidates.len()
        );

        let positions: FnvHashMap<VertexId, usize> =
            vertices.iter().enumerate().map(|(i, v)| (v.id(), i)).collect();
        let mut clusters = DisjointSet::new(vertices.len());
        for i in (0..vertices.len()).step_by(2) {
            clusters.union(i, i + 1);
        }
        let mut used = vec![false; vertices.len()];
        let mut selected = Vec::new();
        for id in candidates {
            let Some(edge) = graph.edge(id) else {
                continue;
            };
            let (Some(&p1), Some(&p2)) = (positions.get(&edge.vertex1.id()), positions.get(&edge.vertex2.id())) else {
                continue;
            };
            if used[p1] || used[p2] {
                continue;
            }
            if edge.indels_per_kbp() > limit_ikbp {
                log::trace!("Edge {} skipped for indels/kbp {:.2}", id, edge.indels_per_kbp());
                continue;
            }
            if clusters.union(p1, p2) {
                used[p1] = true;
                used[p2] = true;
                selected.push(id);
            }
        }
        Ok(selected)
    }

    /// Move short paths whose ends both attach close together inside one
    /// much longer path into that path's alternatives
    fn collect_alternative_small_paths(&self, graph: &AssemblyGraph, paths: Vec<AssemblyPath>) -> Vec<AssemblyPath> {
        let positions = path_positions(graph, &paths);
        let mut absorbed: Vec<(usize, usize)> = Vec::new();
        for (i, path) in paths.iter().enumerate() {
            let length = path.path_length();
            if length > self.thresholds.absorb_max_path_length {
                continue;
            }
            let Some(left) = connected_location(graph, &positions, path.left()) else {
                continue;
            };
            let Some(right) = connected_location(graph, &positions, path.right()) else {
                continue;
            };
            if left.path == i || left.path != right.path {
                continue;
            }
            let host_length = paths[left.path].path_length();
            if self.thresholds.absorb_max_length_ratio * (host_length as f64) < length as f64 {
                continue;
            }
            let distance = left.position.abs_diff(right.position) as f64;
            if distance > self.thresholds.absorb_max_distance_factor * length as f64 {
                continue;
            }
            absorbed.push((left.path, i));
        }
        log::info!("Short paths absorbed as alternatives: {}", absorbed.len());

        // shorter paths first so a path carries its own alternatives when it moves
        absorbed.sort_by_key(|&(_, small)| (paths[small].path_length(), small));
        let mut slots: Vec<Option<AssemblyPath>> = paths.into_iter().map(Some).collect();
        for (host, small) in absorbed {
            let Some(path) = slots[small].take() else {
                continue;
            };
            match slots[host].as_mut() {
                Some(host_path) => host_path.add_alternative_path(path),
                None => slots[small] = Some(path),
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// Join paths whose ends vote for each other through their best overlap
    /// and cheapest edges
    fn merge_close_paths(&self, graph: &AssemblyGraph, mut paths: Vec<AssemblyPath>, costs: &Distribution) -> Vec<AssemblyPath> {
        for (i, path) in paths.iter_mut().enumerate() {
            path.set_id(i + 1);
        }
        let positions = path_positions(graph, &paths);
        let mut end_vertices: Vec<AssemblyVertex> = paths.iter().flat_map(|p| [p.left(), p.right()]).collect();
        end_vertices.sort_unstable();
        end_vertices.dedup();

        let max_cost = self.thresholds.merge_max_cost_factor * costs.average();
        let mut junctions: FnvHashMap<(i64, i64), JunctionVotes> = FnvHashMap::default();
        for vertex in end_vertices {
            let best_overlap = graph.edge_best_overlap(vertex);
            self.add_vote(graph, vertex, best_overlap, max_cost, &positions, &mut junctions);
            let min_cost = graph.edge_min_cost(vertex);
            if min_cost != best_overlap {
                self.add_vote(graph, vertex, min_cost, max_cost, &positions, &mut junctions);
            }
        }
        log::info!("Found {} candidate junctions between path ends", junctions.len());

        let groups = find_paths_to_merge(&junctions, paths.len());
        let mut slots: Vec<Option<AssemblyPath>> = paths.into_iter().map(Some).collect();
        let mut merged = Vec::with_capacity(groups.len());
        for ends in groups.values() {
            let mut current: Option<AssemblyPath> = None;
            let mut last_end = 0i64;
            for &end in ends {
                if end != -last_end {
                    last_end = end;
                    continue;
                }
                // a positive end closing a pair means the path is traversed right to left
                let (index, reverse) = if end > 0 { (end - 1, true) } else { (last_end - 1, false) };
                last_end = end;
                let Some(mut next) = slots.get_mut(index as usize).and_then(Option::take) else {
                    log::debug!("Path {} already consumed while merging", index + 1);
                    continue;
                };
                let joined = match current.as_mut() {
                    Some(path) => path.connect_path_right(graph, &next, reverse),
                    None => false,
                };
                if !joined {
                    if reverse {
                        next.reverse();
                    }
                    if let Some(finished) = current.replace(next) {
                        merged.push(finished);
                    }
                }
            }
            if let Some(path) = current {
                merged.push(path);
            }
        }
        merged
    }

    fn add_vote(
        &self,
        graph: &AssemblyGraph,
        vertex: AssemblyVertex,
        edge_id: Option<EdgeId>,
        max_cost: f64,
        positions: &FnvHashMap<VertexId, VertexPathLocation>,
        junctions: &mut FnvHashMap<(i64, i64), JunctionVotes>,
    ) {
        let Some(edge) = edge_id.and_then(|id| graph.edge(id)) else {
            return;
        };
        if edge.cost as f64 > max_cost {
            return;
        }
        let Some(first) = positions.get(&vertex.id()) else {
            return;
        };
        let Some(other) = edge.connecting_vertex(vertex) else {
            return;
        };
        let Some(second) = positions.get(&other.id()) else {
            return;
        };
        if first.path == second.path {
            return;
        }
        let (Some(end1), Some(end2)) = (self.path_end_id(first), self.path_end_id(second)) else {
            return;
        };
        let key = (end1.min(end2), end1.max(end2));
        log::trace!("Vote for junction {:?} with cost {}", key, edge.cost);
        junctions.entry(key).or_default().add_vote(edge.cost);
    }

    /// Signed 1-based id of the path end a location is close to. Positive
    /// for the left end, negative for the right end, `None` in the middle.
    fn path_end_id(&self, location: &VertexPathLocation) -> Option<i64> {
        let id = location.path as i64 + 1;
        let window = self.thresholds.merge_end_window as i64;
        let position = location.position as i64;
        if position > location.path_length as i64 - window {
            Some(-id)
        } else if position > window {
            None
        } else {
            Some(id)
        }
    }
}

/// Greedy pairing of path ends by ascending junction cost. Each returned
/// list holds signed ends, two per path, in traversal order.
fn find_paths_to_merge(junctions: &FnvHashMap<(i64, i64), JunctionVotes>, n: usize) -> BTreeMap<i64, VecDeque<i64>> {
    let mut sorted: Vec<((i64, i64), u64)> = junctions.iter().map(|(&key, votes)| (key, votes.cost())).collect();
    sorted.sort_unstable_by_key(|&(key, cost)| (cost, key));

    let mut groups: FnvHashMap<i64, i64> = FnvHashMap::default();
    let mut lists: BTreeMap<i64, VecDeque<i64>> = BTreeMap::new();
    for i in 1..=n as i64 {
        groups.insert(i, i);
        groups.insert(-i, i);
        lists.insert(i, VecDeque::from([i, -i]));
    }
    let mut used: FnvHashSet<i64> = FnvHashSet::default();
    for ((p1, p2), _) in sorted {
        if used.contains(&p1) || used.contains(&p2) {
            continue;
        }
        let (Some(&g1), Some(&g2)) = (groups.get(&p1), groups.get(&p2)) else {
            continue;
        };
        if g1 == g2 {
            continue;
        }
        let (Some(first), Some(second)) = (lists.get(&g1), lists.get(&g2)) else {
            continue;
        };
        let reverse_second = if second.back() == Some(&p2) {
            true
        } else if second.front() == Some(&p2) {
            false
        } else {
            continue;
        };
        let append = if first.back() == Some(&p1) {
            true
        } else if first.front() == Some(&p1) {
            false
        } else {
            continue;
        };
        let Some(mut second) = lists.remove(&g2) else {
            continue;
        };
        if reverse_second {
            second.make_contiguous().reverse();
        }
        for &end in &second {
            groups.insert(end, g1);
        }
        if let Some(first) = lists.get_mut(&g1) {
            for end in second {
                if append {
                    first.push_back(end);
                } else {
                    first.push_front(end);
                }
            }
        }
        used.insert(p1);
        used.insert(p2);
    }
    lists
}

/// Position of every vertex along the path holding it
fn path_positions(graph: &AssemblyGraph, paths: &[AssemblyPath]) -> FnvHashMap<VertexId, VertexPathLocation> {
    let mut positions = FnvHashMap::default();
    for (i, path) in paths.iter().enumerate() {
        let path_length = path.path_length();
        for (position, vertex) in path.vertices(graph).into_iter().enumerate() {
            positions.insert(
                vertex.id(),
                VertexPathLocation {
                    path: i,
                    path_length,
                    position,
                },
            );
        }
    }
    positions
}

/// Location of the vertex reached from `vertex` through its cheapest edge
fn connected_location(
    graph: &AssemblyGraph,
    positions: &FnvHashMap<VertexId, VertexPathLocation>,
    vertex: AssemblyVertex,
) -> Option<VertexPathLocation> {
    let edge = graph.edge(graph.edge_min_cost(vertex)?)?;
    let connecting = edge.connecting_vertex(vertex)?;
    positions.get(&connecting.id()).copied()
}

/// Cost of the non-identity path edges
fn path_edge_costs(graph: &AssemblyGraph, path_edges: &[EdgeId]) -> Distribution {
    path_edges
        .iter()
        .filter_map(|&id| graph.edge(id))
        .filter(|e| !e.is_same_sequence_edge())
        .map(|e| e.cost as f64)
        .collect()
}
