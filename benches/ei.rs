use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::DVector;
use romkit::algo::ei::{ei_greedy, EiGreedyOptions, EuclideanNorm};
use romkit::DenseArray;

fn snapshots(count: usize, dim: usize) -> DenseArray<f64> {
    let vectors = (0..count)
        .map(|k| {
            let center = k as f64 / count as f64;
            DVector::from_fn(dim, |i, _| {
                let x = i as f64 / (dim - 1) as f64;
                (-(x - center) * (x - center) / 0.01).exp()
            })
        })
        .collect::<Vec<_>>();
    DenseArray::from_vectors(vectors)
}

fn ei_greedy_bench(c: &mut Criterion) {
    let u = snapshots(64, 256);
    let mut options = EiGreedyOptions::default();
    options.set_max_interpolation_dofs(Some(20));

    c.bench_function("ei_greedy 64x256", |b| {
        b.iter(|| ei_greedy(black_box(u.clone()), EuclideanNorm, &options))
    });
}

criterion_group!(benches, ei_greedy_bench);
criterion_main!(benches);
