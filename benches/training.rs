use booking_pipeline::synthetic::{Sampler, SMOTE};
use booking_pipeline::training::{BoostingType, GradientBoostingClassifier, GradientBoostingConfig, RandomForest};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize, minority_share: f64) -> (Array2<f64>, Array1<i64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y = x
        .rows()
        .into_iter()
        .map(|row| if row[0] < 10.0 * minority_share { 1 } else { 0 })
        .collect();
    (x, y)
}

fn bench_boosting(c: &mut Criterion) {
    let mut group = c.benchmark_group("gradient_boosting");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let (x, y) = create_classification_data(*n_rows, 10, 0.5);

        for boosting_type in [BoostingType::Gbdt, BoostingType::Goss] {
            group.bench_with_input(
                BenchmarkId::new(format!("fit_{}", boosting_type), n_rows),
                &(&x, &y),
                |b, (x, y)| {
                    b.iter(|| {
                        let config = GradientBoostingConfig {
                            n_estimators: 50,
                            num_leaves: 31,
                            boosting_type,
                            ..GradientBoostingConfig::default()
                        };
                        let mut model = GradientBoostingClassifier::new(config);
                        model.fit(black_box(x), black_box(y)).unwrap();
                        model
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_forest_importance(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);

    let (x, y) = create_classification_data(5000, 15, 0.3);
    group.bench_function("fit_100_trees", |b| {
        b.iter(|| {
            let mut forest = RandomForest::new(100).with_random_state(42);
            forest.fit(black_box(&x), black_box(&y)).unwrap();
            forest.feature_importances().cloned()
        })
    });

    group.finish();
}

fn bench_smote(c: &mut Criterion) {
    let mut group = c.benchmark_group("smote");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let (x, y) = create_classification_data(*n_rows, 10, 0.25);
        group.bench_with_input(BenchmarkId::new("fit_resample", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| {
                let mut smote = SMOTE::new().with_seed(42);
                smote.fit_resample(black_box(x), black_box(y)).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_boosting, bench_forest_importance, bench_smote);
criterion_main!(benches);
