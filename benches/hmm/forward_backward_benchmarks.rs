use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hmm_em::hmm::{viterbi, ForwardBackward, Hmm, MarkovGenerator};
use hmm_em::opdf::OpdfDiscrete;
use ndarray::array;

fn model() -> Hmm<OpdfDiscrete> {
    Hmm::new(
        array![0.5, 0.3, 0.2],
        array![[0.8, 0.1, 0.1], [0.2, 0.7, 0.1], [0.1, 0.2, 0.7]],
        vec![
            OpdfDiscrete::new(vec![0.6, 0.3, 0.1]).unwrap(),
            OpdfDiscrete::new(vec![0.2, 0.6, 0.2]).unwrap(),
            OpdfDiscrete::new(vec![0.1, 0.2, 0.7]).unwrap(),
        ],
    )
    .unwrap()
}

fn bench_forward_backward(c: &mut Criterion) {
    let hmm = model();
    let mut generator = MarkovGenerator::with_seed(1);
    let mut group = c.benchmark_group("forward_backward");

    for &len in &[100usize, 1_000, 10_000] {
        let obs = generator.observation_sequence(&hmm, len).unwrap();
        group.bench_with_input(BenchmarkId::new("compute", len), &obs, |b, obs| {
            b.iter(|| ForwardBackward::compute(black_box(&hmm), black_box(obs)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("viterbi", len), &obs, |b, obs| {
            b.iter(|| viterbi(black_box(&hmm), black_box(obs)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forward_backward);
criterion_main!(benches);
