//! Benchmarks for realization samplers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stochmap_core::{Field, GridTransform};
use stochmap_geostat::{CorrelogramFamily, CorrelogramModel};
use stochmap_mc::{MarginalDistribution, NumericSpatialModel, SampleMethod, SampleParams};

fn create_model(size: usize, correlogram: Option<CorrelogramModel>) -> NumericSpatialModel {
    let mut mean = Field::filled(size, size, 100.0);
    mean.set_transform(GridTransform::new(0.0, size as f64 * 30.0, 30.0, -30.0));
    let mut sd = Field::filled(size, size, 5.0);
    sd.set_transform(*mean.transform());
    NumericSpatialModel::new(true, MarginalDistribution::Normal { mean, sd }, correlogram)
        .unwrap()
}

fn bench_random(c: &mut Criterion) {
    let mut group = c.benchmark_group("random");

    for size in [64, 256, 512].iter() {
        let model = create_model(*size, None);
        let params = SampleParams {
            n: 50,
            method: SampleMethod::Random,
            seed: 42,
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| model.sample(black_box(&params)).unwrap())
        });
    }

    group.finish();
}

fn bench_stratified(c: &mut Criterion) {
    let mut group = c.benchmark_group("stratified");

    for size in [64, 256].iter() {
        let model = create_model(*size, None);
        let params = SampleParams {
            n: 50,
            method: SampleMethod::Stratified,
            seed: 42,
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| model.sample(black_box(&params)).unwrap())
        });
    }

    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_simulation");
    group.sample_size(10);

    let correlogram =
        CorrelogramModel::new(CorrelogramFamily::Exponential, 0.8, 300.0).unwrap();

    for size in [32, 64].iter() {
        let model = create_model(*size, Some(correlogram));
        let params = SampleParams {
            n: 10,
            method: SampleMethod::GaussianSimulation {
                max_neighbors: Some(16),
            },
            seed: 42,
        };

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| model.sample(black_box(&params)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_random, bench_stratified, bench_simulation);
criterion_main!(benches);
