//! End-to-end workflow over an uncertain elevation surface: define a
//! model, draw realizations, propagate a slope computation, reduce.

use stochmap_core::{Ensemble, Error, Field, GridTransform};
use stochmap_geostat::{global_morans_i, CorrelogramFamily, CorrelogramModel};
use stochmap_mc::{
    ensemble_mean, ensemble_quantile, ensemble_sd, propagate, BoxError, MarginalDistribution,
    MissingPolicy, NumericSpatialModel, PropagateParams, SampleMethod, SampleParams,
};

fn dem_model(
    rows: usize,
    cols: usize,
    sd: f64,
    correlogram: Option<CorrelogramModel>,
) -> NumericSpatialModel {
    let mut mean = Field::from_fn(rows, cols, |row, col| 100.0 + row as f64 + 0.5 * col as f64);
    mean.set_transform(GridTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0));
    let mut sd_field = Field::filled(rows, cols, sd);
    sd_field.set_transform(*mean.transform());
    NumericSpatialModel::new(
        true,
        MarginalDistribution::Normal {
            mean,
            sd: sd_field,
        },
        correlogram,
    )
    .unwrap()
}

/// Horn's slope estimator in degrees, the forward model under test.
fn horn_slope(inputs: &[&Field<f64>]) -> std::result::Result<Field<f64>, BoxError> {
    let dem = inputs[0];
    let (rows, cols) = dem.shape();
    let cell = dem.cell_size();
    let mut out = dem.with_same_shape::<f64>();
    out.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            if row == 0 || col == 0 || row == rows - 1 || col == cols - 1 {
                unsafe { out.set_unchecked(row, col, f64::NAN) };
                continue;
            }
            let z = |dr: isize, dc: isize| unsafe {
                dem.get_unchecked((row as isize + dr) as usize, (col as isize + dc) as usize)
            };
            let dz_dx = ((z(-1, 1) + 2.0 * z(0, 1) + z(1, 1))
                - (z(-1, -1) + 2.0 * z(0, -1) + z(1, -1)))
                / (8.0 * cell);
            let dz_dy = ((z(1, -1) + 2.0 * z(1, 0) + z(1, 1))
                - (z(-1, -1) + 2.0 * z(-1, 0) + z(-1, 1)))
                / (8.0 * cell);
            let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
            unsafe { out.set_unchecked(row, col, slope) };
        }
    }
    Ok(out)
}

#[test]
fn random_ensemble_recovers_cell_moments() {
    let model = dem_model(2, 2, 5.0, None);
    let e = model
        .sample(&SampleParams {
            n: 1000,
            method: SampleMethod::Random,
            seed: 42,
        })
        .unwrap();

    let mean = ensemble_mean(&e, MissingPolicy::Propagate).unwrap();
    let sd = ensemble_sd(&e, MissingPolicy::Propagate).unwrap();
    for row in 0..2 {
        for col in 0..2 {
            let target = 100.0 + row as f64 + 0.5 * col as f64;
            let m = mean.get(row, col).unwrap();
            let s = sd.get(row, col).unwrap();
            assert!((m - target).abs() < 1.0, "cell mean {} far from {}", m, target);
            assert!((4.5..5.5).contains(&s), "cell sd {} far from 5", s);
        }
    }
}

#[test]
fn moments_converge_with_ensemble_size() {
    let model = dem_model(3, 3, 10.0, None);
    let mut errors = Vec::new();
    for n in [50, 2000] {
        let e = model
            .sample(&SampleParams {
                n,
                method: SampleMethod::Random,
                seed: 7,
            })
            .unwrap();
        let sd = ensemble_sd(&e, MissingPolicy::Propagate).unwrap();
        errors.push((sd.get(1, 1).unwrap() - 10.0).abs() / 10.0);
    }
    assert!(errors[1] < 0.05, "sd relative error {} at n=2000", errors[1]);
}

#[test]
fn stronger_correlation_yields_smoother_realizations() {
    let correlated = |sill: f64| {
        let corr = CorrelogramModel::new(CorrelogramFamily::Exponential, sill, 300.0).unwrap();
        let model = dem_model(40, 40, 5.0, Some(corr));
        model
            .sample(&SampleParams {
                n: 1,
                method: SampleMethod::GaussianSimulation {
                    max_neighbors: Some(12),
                },
                seed: 12345,
            })
            .unwrap()
    };

    // Moran's I of the residual, with the trend surface removed.
    let residual_morans = |e: &Ensemble<f64>| {
        let member = e.member(0).unwrap();
        let trend = dem_model(40, 40, 5.0, None).central();
        let residual = Field::from_fn(40, 40, |row, col| {
            member.get(row, col).unwrap() - trend.get(row, col).unwrap()
        });
        global_morans_i(&residual).unwrap().i
    };

    let smooth = residual_morans(&correlated(0.8));
    let rough = residual_morans(&correlated(0.2));
    assert!(
        smooth > rough,
        "sill 0.8 gave Moran's I {} not above sill 0.2's {}",
        smooth,
        rough
    );
}

#[test]
fn same_seed_reproduces_bitwise() {
    let corr = CorrelogramModel::new(CorrelogramFamily::Spherical, 0.7, 200.0).unwrap();
    let model = dem_model(20, 20, 5.0, Some(corr));
    let params = SampleParams {
        n: 3,
        method: SampleMethod::GaussianSimulation {
            max_neighbors: Some(8),
        },
        seed: 99,
    };
    let a = model.sample(&params).unwrap();
    let b = model.sample(&params).unwrap();
    for (fa, fb) in a.iter().zip(b.iter()) {
        assert_eq!(fa.data(), fb.data());
    }
}

#[test]
fn quantile_brackets_the_mean() {
    let model = dem_model(2, 2, 5.0, None);
    let e = model
        .sample(&SampleParams {
            n: 500,
            method: SampleMethod::Random,
            seed: 3,
        })
        .unwrap();

    let q05 = ensemble_quantile(&e, 0.05, MissingPolicy::Propagate).unwrap();
    let q50 = ensemble_quantile(&e, 0.5, MissingPolicy::Propagate).unwrap();
    let q95 = ensemble_quantile(&e, 0.95, MissingPolicy::Propagate).unwrap();
    let lo = q05.get(0, 0).unwrap();
    let mid = q50.get(0, 0).unwrap();
    let hi = q95.get(0, 0).unwrap();
    assert!(lo < mid && mid < hi);
    assert!((mid - 100.0).abs() < 1.0, "median {} far from 100", mid);
}

#[test]
fn propagation_keeps_realizations_paired() {
    let model = dem_model(10, 10, 2.0, None);
    let inputs = model
        .sample(&SampleParams {
            n: 20,
            method: SampleMethod::Random,
            seed: 11,
        })
        .unwrap();

    let outputs = propagate(&inputs, &horn_slope, &PropagateParams::default()).unwrap();
    assert_eq!(outputs.len(), inputs.len());

    // Recomputing one realization's slope by hand must match its paired
    // output member exactly. Border cells are NaN, so compare bitwise.
    let direct = horn_slope(&[inputs.member(13).unwrap()]).unwrap();
    let paired = outputs.member(13).unwrap();
    for (a, b) in direct.data().iter().zip(paired.data().iter()) {
        assert_eq!(a.to_bits(), b.to_bits(), "mismatch: {} vs {}", a, b);
    }

    let sd = ensemble_sd(&outputs, MissingPolicy::Propagate).unwrap();
    assert!(sd.get(5, 5).unwrap() > 0.0);
    assert!(sd.get(0, 0).unwrap().is_nan());
}

#[test]
fn propagation_failure_aborts_without_partial_output() {
    let mut inputs = Ensemble::new();
    for i in 0..100 {
        inputs.push(Field::filled(2, 2, i as f64)).unwrap();
    }

    let failing = |fields: &[&Field<f64>]| -> std::result::Result<Field<f64>, BoxError> {
        if fields[0].get(0, 0).unwrap() == 7.0 {
            return Err("numerical breakdown".into());
        }
        Ok(fields[0].clone())
    };

    let err = propagate(&inputs, &failing, &PropagateParams::default()).unwrap_err();
    match err {
        Error::Transform { realization, .. } => assert_eq!(realization, 7),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn stratified_beats_random_on_mean_error() {
    let model = dem_model(4, 4, 10.0, None);
    let mean_abs_error = |method: SampleMethod| {
        let e = model
            .sample(&SampleParams {
                n: 40,
                method,
                seed: 17,
            })
            .unwrap();
        let mean = ensemble_mean(&e, MissingPolicy::Propagate).unwrap();
        let mut total = 0.0;
        for row in 0..4 {
            for col in 0..4 {
                let target = 100.0 + row as f64 + 0.5 * col as f64;
                total += (mean.get(row, col).unwrap() - target).abs();
            }
        }
        total / 16.0
    };

    let stratified = mean_abs_error(SampleMethod::Stratified);
    let random = mean_abs_error(SampleMethod::Random);
    assert!(
        stratified < random,
        "stratified error {} not below random error {}",
        stratified,
        random
    );
}
