//! # Cycle DS Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ds_lib::{
    cd_filter::{CdFilter, FilterParams},
    cycle_ds::{CycleDs, CyclePlane, Params},
    predictor::{predict_path, MAX_PATH_POINTS},
};
use nalgebra::Vector3;

fn cycle_ds_benchmark(c: &mut Criterion) {
    let params = Params {
        target_offset_m: Vector3::zeros(),
        radius_m: 0.1,
        radius_scale: 1.0,
        angular_speed_rads: 1.5,
        speed_offset_rads: 0.0,
        convergence_rate: 2.0,
        convergence_rate_scale: 1.0,
        velocity_limit_ms: 0.3,
        filter_wn: 5.0,
    };

    let ds = CycleDs::new(CyclePlane::new(Vector3::new(0.0, 0.3, 1.0)).unwrap());
    let position = Vector3::new(0.4, -0.2, 0.1);
    let target = Vector3::new(0.5, 0.0, 0.3);

    c.bench_function("CycleDs::velocity", |b| {
        b.iter(|| ds.velocity(black_box(&position), black_box(&target), &params))
    });

    let mut filter = CdFilter::from_params(0.01, 5.0, &FilterParams::default()).unwrap();
    let raw = ds.velocity(&position, &target, &params);

    c.bench_function("CdFilter::update", |b| {
        b.iter(|| filter.update(black_box(&raw)))
    });

    c.bench_function("predict_path", |b| {
        b.iter(|| predict_path(&ds, &position, &target, &params, MAX_PATH_POINTS, 0.05))
    });
}

criterion_group!(benches, cycle_ds_benchmark);
criterion_main!(benches);
