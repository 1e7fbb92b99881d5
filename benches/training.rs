use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use insurance_modelling::training::{RandomForest, TrainTestSplit, Dataset, RANDOM_STATE};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    let features = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // Target as sum of features + noise
    let target: Array1<f64> = features
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();

    let names = (0..n_features).map(|i| format!("feature_{}", i)).collect();
    Dataset::from_arrays(names, features, target).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [1000, 5000].iter() {
        let data = create_regression_data(*n_rows, 6);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &data, |b, data| {
            b.iter(|| {
                let mut model = RandomForest::new_regressor(50)
                    .with_max_depth(5)
                    .with_random_state(RANDOM_STATE);
                model.fit(black_box(data.features()), black_box(data.target())).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let train = create_regression_data(5000, 6);
    let mut model = RandomForest::new_regressor(100)
        .with_max_depth(5)
        .with_random_state(RANDOM_STATE);
    model.fit(train.features(), train.target()).unwrap();

    for n_rows in [100, 1000, 10000].iter() {
        let test = create_regression_data(*n_rows, 6);

        group.bench_with_input(BenchmarkId::new("predict", n_rows), &test, |b, test| {
            b.iter(|| model.predict(black_box(test.features())).unwrap())
        });
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let splitter = TrainTestSplit::new(0.2).with_random_state(RANDOM_STATE);
    c.bench_function("split_indices_100k", |b| {
        b.iter(|| splitter.split_indices(black_box(100_000)).unwrap())
    });
}

criterion_group!(benches, bench_training, bench_prediction, bench_split);
criterion_main!(benches);
