use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ovlx_core::seed::{KmerCodec, KmerHitsTable, MinimizerCodec, MinimizerTable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn generate_test_sequence(rng: &mut StdRng, length: usize) -> Vec<u8> {
    (0..length).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect()
}

fn bench_hit_insertion(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let hits: Vec<(u32, u32, u32)> = (0..100_000)
        .map(|_| (rng.gen_range(0..1000), rng.gen(), rng.gen()))
        .collect();

    c.bench_function("hit_insertion_100k", |b| {
        b.iter(|| {
            let mut table = KmerHitsTable::new();
            for &(subject, query, subject_start) in &hits {
                table.add_hit(subject, query, subject_start).unwrap();
            }
            black_box(table.total_hits())
        })
    });
}

fn bench_minimizer_extraction(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let sequence = generate_test_sequence(&mut rng, 100_000);
    let mut group = c.benchmark_group("minimizers_100kb");
    for window in [5usize, 10, 20] {
        let codec = MinimizerCodec::new(15, window);
        group.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, _| {
            b.iter(|| black_box(codec.codes(black_box(&sequence)).count()))
        });
    }
    group.finish();
}

fn bench_query_matching(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let genome = generate_test_sequence(&mut rng, 200_000);
    let table = MinimizerTable::new(15, 10, 10);
    for (id, start) in (0..190_000).step_by(5_000).enumerate() {
        table.add_sequence(id as u32, &genome[start..start + 10_000]).unwrap();
    }
    let query = genome[52_000..62_000].to_vec();

    c.bench_function("match_query_10kb", |b| {
        b.iter(|| black_box(table.match_query(u32::MAX, black_box(&query)).unwrap().total_hits()))
    });
}

criterion_group!(benches, bench_hit_insertion, bench_minimizer_extraction, bench_query_matching);
criterion_main!(benches);
