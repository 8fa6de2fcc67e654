//! Graph construction phases
//!
//! The longest-running part of the engine. A backbone prefix of the reads is
//! indexed and compared all against all; the remaining reads are first
//! checked for containment in the backbone and only indexed when no good
//! host was found. Discovery results are drained into the graph in read
//! order by the calling thread, which is the only writer of the graph.

use std::time::Instant;

use crate::config::LayoutConfig;
use crate::discovery::{select_good_embedded, RelationshipFinder, SearchMode};
use crate::error::{LayoutError, LayoutResult};
use crate::graph::relationship::Relationship;
use crate::graph::AssemblyGraph;
use crate::layout::KruskalPathLayout;
use crate::pool::WorkerPool;
use crate::scoring::ScoresCalculator;
use crate::seed::table::MinimizerTable;
use crate::seed::utils::reverse_complement;
use crate::types::{KmerFrequencyModel, Sequence, SequenceId};

/// Progress is logged every this many drained sequences
const PROGRESS_INTERVAL: usize = 1000;

pub struct GraphBuilder {
    config: LayoutConfig,
    pool: WorkerPool,
}

/// Read-only state shared by the discovery jobs
struct DiscoveryContext<'a> {
    sequences: &'a [Sequence],
    table: &'a MinimizerTable,
    finder: &'a RelationshipFinder,
}

impl DiscoveryContext<'_> {
    fn relationships(&self, id: SequenceId, mode: SearchMode) -> LayoutResult<Vec<Relationship>> {
        let Some(sequence) = self.sequences.get(id as usize) else {
            log::warn!("Sequence {} is not part of the input", id);
            return Ok(Vec::new());
        };
        let forward = self.table.match_query(id, &sequence.characters)?;
        let reverse = self.table.match_query(id, &reverse_complement(&sequence.characters))?;
        Ok(self.finder.infer_relationships(id, &forward, &reverse, mode))
    }
}

impl GraphBuilder {
    /// Validate the configuration and start the worker pool
    pub fn new(config: LayoutConfig) -> LayoutResult<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.num_threads)?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Build the graph and run the path layout on it
    pub fn assemble<M>(&self, sequences: &[Sequence], model: &M) -> LayoutResult<AssemblyGraph>
    where
        M: KmerFrequencyModel + ?Sized,
    {
        let mut graph = self.build(sequences, model)?;
        let started = Instant::now();
        KruskalPathLayout::new(self.config.layout.clone()).find_paths(&mut graph, &self.pool)?;
        log::info!("Layout finished in {:.2?}", started.elapsed());
        Ok(graph)
    }

    /// Discover, score and prune the relationships between the sequences.
    /// Sequence ids must be `0..n` in input order.
    pub fn build<M>(&self, sequences: &[Sequence], model: &M) -> LayoutResult<AssemblyGraph>
    where
        M: KmerFrequencyModel + ?Sized,
    {
        let started = Instant::now();
        let lengths = sequence_lengths(sequences)?;
        let n = sequences.len();
        let mut graph = AssemblyGraph::new(&lengths);
        graph.set_expected_assembly_length(model.expected_assembly_length());
        graph.set_ploidy(self.config.ploidy);
        if n == 0 {
            log::warn!("No sequences to build a graph from");
            return Ok(graph);
        }

        let table = MinimizerTable::new(self.config.kmer_length, self.config.window_length, model.mode_depth());
        let finder = RelationshipFinder::new(&self.config, lengths.clone())?;
        let calculator = ScoresCalculator::new(self.config.secondary_features_weight)?;
        let context = DiscoveryContext {
            sequences,
            table: &table,
            finder: &finder,
        };

        // 1. index the backbone prefix
        let prefix = self.backbone_prefix(sequences, model.expected_assembly_length());
        let backbone: Vec<SequenceId> = (0..prefix as SequenceId).collect();
        self.index(&table, sequences, &backbone, "index-backbone")?;
        log::info!(
            "Indexed {} of {} sequences. Distinct codes: {} entries: {}",
            prefix,
            n,
            table.size(),
            table.total_entries()
        );

        // 2. all against all within the backbone
        self.discover(&context, &backbone, SearchMode::overlaps(), &mut graph, "discovery-backbone")?;
        log::info!(
            "Backbone relationships: {} edges, {} embedded",
            graph.num_edges(),
            graph.embedded_count()
        );

        // 3. containment of the remaining sequences in the backbone
        let remaining: Vec<SequenceId> = (prefix as SequenceId..n as SequenceId).collect();
        let mut settled: Vec<Option<Vec<Relationship>>> = vec![None; n];
        self.pool.run_ordered(
            "discovery-embedded",
            &remaining,
            |&id| context.relationships(id, SearchMode::only_embedded()),
            |index, relationships| {
                let id = remaining[index];
                let good = select_good_embedded(relationships, &lengths);
                if !good.is_empty() {
                    for relationship in &good {
                        graph.add_relationship(relationship.clone());
                    }
                    settled[id as usize] = Some(good);
                }
                Ok(())
            },
        )?;
        let settled_count = settled.iter().filter(|s| s.is_some()).count();
        log::info!(
            "Sequences settled as embedded without indexing: {} of {}",
            settled_count,
            remaining.len()
        );

        // 4. release sequences embedded only in chimeric hosts
        let chimeric = graph.detect_chimeric_sequences(self.config.min_chimeric_flank_depth);
        let orphans = graph.calculate_embedded_to_chimeric();
        let mut released = 0usize;
        for &orphan in &orphans {
            if (orphan as usize) < prefix {
                continue;
            }
            if let Some(relationships) = settled.get_mut(orphan as usize).and_then(Option::take) {
                for relationship in &relationships {
                    graph.remove_relationship(relationship);
                }
                released += 1;
            }
        }
        log::info!(
            "Chimeric sequences: {}. Orphan embedded sequences: {}. Released: {}",
            chimeric.len(),
            orphans.len(),
            released
        );

        // 5. index what is still unplaced
        let unplaced: Vec<SequenceId> = remaining
            .iter()
            .copied()
            .filter(|&id| settled[id as usize].is_none())
            .collect();
        self.index(&table, sequences, &unplaced, "index-remaining")?;
        log::info!("Indexed {} remaining sequences", unplaced.len());

        // 6. relationships of the newly indexed sequences
        self.discover(&context, &unplaced, SearchMode::overlaps(), &mut graph, "discovery-remaining")?;

        // 7. final scores and pruning
        graph.update_scores(&calculator);
        let pruned = graph.prune_embedded_sequences();
        log::info!(
            "Graph built in {:.2?}: {} sequences, {} edges, {} embedded sequences, {} edges pruned",
            started.elapsed(),
            n,
            graph.num_edges(),
            graph.embedded_sequences_count(),
            pruned
        );
        Ok(graph)
    }

    /// Number of leading sequences whose total length first exceeds the
    /// backbone coverage of the expected assembly. Everything when the
    /// assembly length is unknown.
    pub fn backbone_prefix(&self, sequences: &[Sequence], expected_assembly_length: u64) -> usize {
        if expected_assembly_length == 0 {
            return sequences.len();
        }
        let limit = self.config.backbone_coverage * self.config.ploidy as f64 * expected_assembly_length as f64;
        let mut total = 0u64;
        for (i, sequence) in sequences.iter().enumerate() {
            total += sequence.len() as u64;
            if total as f64 > limit {
                return i + 1;
            }
        }
        sequences.len()
    }

    fn index(&self, table: &MinimizerTable, sequences: &[Sequence], ids: &[SequenceId], phase: &str) -> LayoutResult<()> {
        self.pool.run_phase(phase, ids, |&id| {
            let sequence = &sequences[id as usize];
            table.add_sequence(id, &sequence.characters)
        })
    }

    /// Ordered discovery: each sequence's candidates are added and filtered
    /// before the next sequence is drained
    fn discover(
        &self,
        context: &DiscoveryContext<'_>,
        ids: &[SequenceId],
        mode: SearchMode,
        graph: &mut AssemblyGraph,
        phase: &str,
    ) -> LayoutResult<()> {
        let ratio = self.config.filter_score_ratio;
        let mut drained = 0usize;
        self.pool.run_ordered(
            phase,
            ids,
            |&id| context.relationships(id, mode),
            |index, relationships| {
                let id = ids[index];
                for relationship in relationships {
                    graph.add_relationship(relationship);
                }
                graph.filter_edges_and_embedded(id, ratio);
                drained += 1;
                if drained % PROGRESS_INTERVAL == 0 {
                    log::debug!("Phase '{}': {} of {} sequences processed", phase, drained, ids.len());
                }
                Ok(())
            },
        )
    }
}

fn sequence_lengths(sequences: &[Sequence]) -> LayoutResult<Vec<u32>> {
    sequences
        .iter()
        .enumerate()
        .map(|(i, sequence)| {
            if sequence.id as usize != i {
                return Err(LayoutError::config(format!(
                    "sequence ids must be contiguous: found id {} at position {}",
                    sequence.id, i
                )));
            }
            u32::try_from(sequence.len())
                .map_err(|_| LayoutError::config(format!("sequence {} is too long", sequence.name)))
        })
        .collect()
}
