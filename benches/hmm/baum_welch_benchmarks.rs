use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hmm_em::hmm::{BaumWelchLearner, Hmm, MarkovGenerator};
use hmm_em::opdf::{OpdfGaussian, OpdfGaussianFactory};
use ndarray::array;

fn bench_iteration(c: &mut Criterion) {
    let truth = Hmm::new(
        array![0.5, 0.5],
        array![[0.9, 0.1], [0.2, 0.8]],
        vec![
            OpdfGaussian::new(-1.0, 1.0).unwrap(),
            OpdfGaussian::new(2.0, 0.5).unwrap(),
        ],
    )
    .unwrap();
    let guess = Hmm::uniform(2, &OpdfGaussianFactory::new(0.5, 2.0).unwrap()).unwrap();
    let learner = BaumWelchLearner::default();
    let mut generator = MarkovGenerator::with_seed(3);
    let mut group = c.benchmark_group("baum_welch_iteration");

    for &count in &[1usize, 8, 32] {
        let sequences = generator.observation_sequences(&truth, count, 500).unwrap();
        group.bench_with_input(
            BenchmarkId::new("sequences", count),
            &sequences,
            |b, sequences| {
                b.iter(|| {
                    learner
                        .iterate(black_box(&guess), black_box(sequences))
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_iteration);
criterion_main!(benches);
