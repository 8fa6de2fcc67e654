use ovlx_core::graph::relationship::EdgeId;
use ovlx_core::{
    AssemblyEdge, AssemblyGraph, AssemblyVertex, Evidence, GenomeEstimate, GraphBuilder, LayoutConfig,
    ScoresCalculator, Sequence, SequenceStatus,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_dna(rng: &mut StdRng, length: usize) -> Vec<u8> {
    (0..length).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn config() -> LayoutConfig {
    let mut config = LayoutConfig {
        kmer_length: 15,
        window_length: 5,
        num_threads: 2,
        ..Default::default()
    };
    config.layout.min_path_length = 3;
    config
}

/// A (1000bp), B = A[250..750], C (900bp) starting with the last 100bp of A
fn scenario_a_reads() -> Vec<Sequence> {
    let mut rng = StdRng::seed_from_u64(7);
    let a = random_dna(&mut rng, 1000);
    let b = a[250..750].to_vec();
    let mut c = a[900..].to_vec();
    c.extend(random_dna(&mut rng, 800));
    vec![Sequence::new(0, "A", a), Sequence::new(1, "B", b), Sequence::new(2, "C", c)]
}

#[test]
fn scenario_a_embedded_read_and_single_path() {
    init_logging();
    let builder = GraphBuilder::new(config()).unwrap();
    let reads = scenario_a_reads();
    let graph = builder.assemble(&reads, &GenomeEstimate::new(1, 0)).unwrap();

    assert_eq!(graph.sequence_status(1), SequenceStatus::Embedded);
    let placement = &graph.embedded_by_sequence(1)[0];
    assert_eq!(placement.host_id, 0);
    assert!(!placement.reverse);
    assert!(placement.host_start.abs_diff(250) <= 15, "host start {}", placement.host_start);
    assert!(placement.host_end.abs_diff(750) <= 15, "host end {}", placement.host_end);

    let id = graph
        .find_edge(AssemblyVertex::end(0), AssemblyVertex::start(2))
        .expect("edge between the end of A and the start of C");
    let edge = graph.edge(id).unwrap();
    assert!(edge.overlap().abs_diff(100) <= 15, "overlap {}", edge.overlap());
    assert!(edge.indels_per_kbp() < 1.0);

    assert_eq!(graph.paths().len(), 1);
    let path = &graph.paths()[0];
    let mut ids = path.sequence_ids(&graph);
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 2]);
    assert_eq!(path.path_length(), 3);
    assert!(matches!(graph.sequence_status(0), SequenceStatus::InPath(0)));
    assert!(matches!(graph.sequence_status(2), SequenceStatus::InPath(0)));
}

#[test]
fn scenario_a_reverse_complemented_read() {
    init_logging();
    let builder = GraphBuilder::new(config()).unwrap();
    let mut reads = scenario_a_reads();
    reads[2].characters = ovlx_core::seed::utils::reverse_complement(&reads[2].characters);
    let graph = builder.assemble(&reads, &GenomeEstimate::new(1, 0)).unwrap();

    // the end of A now meets the end of the stored C
    let id = graph
        .find_edge(AssemblyVertex::end(0), AssemblyVertex::end(2))
        .expect("edge between the end of A and the end of reversed C");
    assert!(graph.edge(id).unwrap().overlap().abs_diff(100) <= 15);
    assert_eq!(graph.paths().len(), 1);
}

#[test]
fn scenario_b_unrelated_reads_stay_isolated() {
    init_logging();
    let mut rng = StdRng::seed_from_u64(11);
    let reads = vec![
        Sequence::new(0, "X", random_dna(&mut rng, 1000)),
        Sequence::new(1, "Y", random_dna(&mut rng, 1000)),
    ];
    let builder = GraphBuilder::new(LayoutConfig::default()).unwrap();
    let graph = builder.assemble(&reads, &GenomeEstimate::new(1, 0)).unwrap();

    assert_eq!(graph.num_edges(), 0);
    assert_eq!(graph.embedded_count(), 0);
    assert!(graph.paths().is_empty());
    assert_eq!(graph.sequence_status(0), SequenceStatus::Isolated);
    assert_eq!(graph.sequence_status(1), SequenceStatus::Isolated);
}

fn edge_between(graph: &AssemblyGraph, v1: AssemblyVertex, v2: AssemblyVertex) -> &AssemblyEdge {
    let id: EdgeId = graph.find_edge(v1, v2).unwrap();
    graph.edge(id).unwrap()
}

#[test]
fn scenario_c_indels_raise_cost() {
    init_logging();
    let mut graph = AssemblyGraph::new(&[3000, 3000, 3000, 3000]);
    let evidence = |indels_per_kbp| Evidence {
        overlap: 1500,
        shared_kmers: 200,
        weighted_coverage: 1400.0,
        evidence_proportion: 0.97,
        indels_per_kbp,
    };
    let calculator = ScoresCalculator::new(0.5).unwrap();
    for (v1, v2, ikbp) in [
        (AssemblyVertex::end(0), AssemblyVertex::start(1), 0.0),
        (AssemblyVertex::end(2), AssemblyVertex::start(3), 20.0),
    ] {
        let mut edge: ovlx_core::Relationship = AssemblyEdge::new(v1, v2, evidence(ikbp)).into();
        edge.set_score(calculator.score(&edge));
        assert!(graph.add_relationship(edge));
    }
    graph.update_scores(&calculator);

    let clean = edge_between(&graph, AssemblyVertex::end(0), AssemblyVertex::start(1));
    let noisy = edge_between(&graph, AssemblyVertex::end(2), AssemblyVertex::start(3));
    assert!(clean.cost < noisy.cost, "{} vs {}", clean.cost, noisy.cost);
    assert!(clean.score > noisy.score);
}
