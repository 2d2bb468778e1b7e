//! Monte Carlo propagation
//!
//! Runs a deterministic forward model once per realization and collects the
//! outputs into an ensemble, preserving realization order. Output member
//! `i` is always the image of input member `i`, so cross-ensemble
//! statistics stay paired.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use stochmap_core::{Ensemble, Error, Field, Result};

use crate::maybe_rayon::*;

/// Error type forward models report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A deterministic spatial operation lifted over realizations.
///
/// `inputs` holds one field per input ensemble, in the order the ensembles
/// were passed to [`propagate_multi`]; single-input propagation passes a
/// one-element slice.
pub trait ForwardModel: Sync {
    fn run(&self, inputs: &[&Field<f64>]) -> std::result::Result<Field<f64>, BoxError>;
}

impl<F> ForwardModel for F
where
    F: Fn(&[&Field<f64>]) -> std::result::Result<Field<f64>, BoxError> + Sync,
{
    fn run(&self, inputs: &[&Field<f64>]) -> std::result::Result<Field<f64>, BoxError> {
        self(inputs)
    }
}

/// Parameters for one propagation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropagateParams {
    /// Number of leading realizations to run the model on; `None` runs all
    pub runs: Option<usize>,
}

fn effective_runs(available: usize, params: &PropagateParams) -> Result<usize> {
    let m = params.runs.unwrap_or(available);
    if m < 1 || m > available {
        return Err(Error::InvalidCount {
            n: m,
            reason: format!("runs must be between 1 and the ensemble size {}", available),
        });
    }
    Ok(m)
}

fn run_rows<M: ForwardModel>(
    rows: Vec<Vec<&Field<f64>>>,
    model: &M,
) -> Result<Ensemble<f64>> {
    // After the first failure the remaining realizations are skipped, and
    // the lowest failing index is the one reported.
    let failed = AtomicBool::new(false);
    let outputs: Vec<Option<std::result::Result<Field<f64>, BoxError>>> = rows
        .into_par_iter()
        .map(|inputs| {
            if failed.load(Ordering::Relaxed) {
                return None;
            }
            let result = model.run(&inputs);
            if result.is_err() {
                failed.store(true, Ordering::Relaxed);
            }
            Some(result)
        })
        .collect();

    for (i, output) in outputs.iter().enumerate() {
        if let Some(Err(e)) = output {
            return Err(Error::Transform {
                realization: i,
                message: e.to_string(),
            });
        }
    }

    let mut ensemble = Ensemble::with_capacity(outputs.len());
    for output in outputs {
        match output {
            Some(Ok(field)) => ensemble.push(field)?,
            // Only reachable when a later-indexed worker observed the
            // failure flag first; the scan above already returned.
            _ => unreachable!("skipped realization without a reported failure"),
        }
    }
    Ok(ensemble)
}

/// Run `model` over the leading realizations of one input ensemble.
///
/// # Errors
/// `InvalidCount` for an empty ensemble or `runs` outside `1..=n`;
/// `Transform` carrying the lowest failing realization index when the
/// model fails, in which case no partial ensemble is returned.
pub fn propagate<M: ForwardModel>(
    inputs: &Ensemble<f64>,
    model: &M,
    params: &PropagateParams,
) -> Result<Ensemble<f64>> {
    propagate_multi(&[inputs], model, params)
}

/// Run `model` over index-aligned realizations of several input ensembles.
///
/// Realization `i` of the output is `model.run` applied to member `i` of
/// every input ensemble.
pub fn propagate_multi<M: ForwardModel>(
    inputs: &[&Ensemble<f64>],
    model: &M,
    params: &PropagateParams,
) -> Result<Ensemble<f64>> {
    let Some(first) = inputs.first() else {
        return Err(Error::InvalidCount {
            n: 0,
            reason: "propagation needs at least one input ensemble".into(),
        });
    };
    for e in &inputs[1..] {
        if e.len() != first.len() {
            return Err(Error::InvalidCount {
                n: e.len(),
                reason: format!("input ensembles differ in size ({} vs {})", first.len(), e.len()),
            });
        }
    }
    let m = effective_runs(first.len(), params)?;

    let mut rows: Vec<Vec<&Field<f64>>> = Vec::with_capacity(m);
    for i in 0..m {
        let mut row = Vec::with_capacity(inputs.len());
        for e in inputs {
            row.push(e.member(i).ok_or(Error::InvalidCount {
                n: i,
                reason: "realization index out of range".into(),
            })?);
        }
        rows.push(row);
    }

    run_rows(rows, model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_ensemble(n: usize, value: f64) -> Ensemble<f64> {
        let mut e = Ensemble::new();
        for _ in 0..n {
            e.push(Field::filled(2, 2, value)).unwrap();
        }
        e
    }

    fn indexed_ensemble(n: usize) -> Ensemble<f64> {
        let mut e = Ensemble::new();
        for i in 0..n {
            e.push(Field::filled(2, 2, i as f64)).unwrap();
        }
        e
    }

    fn double(inputs: &[&Field<f64>]) -> std::result::Result<Field<f64>, BoxError> {
        let src = inputs[0];
        let mut out = src.clone();
        let (rows, cols) = src.shape();
        for row in 0..rows {
            for col in 0..cols {
                let v = unsafe { src.get_unchecked(row, col) };
                unsafe { out.set_unchecked(row, col, v * 2.0) };
            }
        }
        Ok(out)
    }

    #[test]
    fn test_output_pairs_with_input() {
        let inputs = indexed_ensemble(10);
        let outputs = propagate(&inputs, &double, &PropagateParams::default()).unwrap();
        assert_eq!(outputs.len(), 10);
        for i in 0..10 {
            assert_eq!(outputs.member(i).unwrap().get(0, 0).unwrap(), 2.0 * i as f64);
        }
    }

    #[test]
    fn test_runs_subset() {
        let inputs = indexed_ensemble(10);
        let outputs =
            propagate(&inputs, &double, &PropagateParams { runs: Some(4) }).unwrap();
        assert_eq!(outputs.len(), 4);
        assert_eq!(outputs.member(3).unwrap().get(0, 0).unwrap(), 6.0);
    }

    #[test]
    fn test_runs_out_of_range() {
        let inputs = constant_ensemble(5, 1.0);
        assert!(propagate(&inputs, &double, &PropagateParams { runs: Some(0) }).is_err());
        assert!(propagate(&inputs, &double, &PropagateParams { runs: Some(6) }).is_err());
    }

    #[test]
    fn test_failure_reports_lowest_index_and_no_partial_output() {
        let inputs = indexed_ensemble(100);
        let failing = |fields: &[&Field<f64>]| -> std::result::Result<Field<f64>, BoxError> {
            let v = fields[0].get(0, 0).unwrap();
            if v == 7.0 {
                return Err("synthetic failure".into());
            }
            Ok(fields[0].clone())
        };
        let err = propagate(&inputs, &failing, &PropagateParams::default()).unwrap_err();
        match err {
            Error::Transform { realization, message } => {
                assert_eq!(realization, 7);
                assert!(message.contains("synthetic failure"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_multi_input_alignment() {
        let a = indexed_ensemble(5);
        let b = constant_ensemble(5, 10.0);
        let sum = |fields: &[&Field<f64>]| -> std::result::Result<Field<f64>, BoxError> {
            let mut out = fields[0].clone();
            let v = fields[0].get(0, 0).unwrap() + fields[1].get(0, 0).unwrap();
            for row in 0..2 {
                for col in 0..2 {
                    out.set(row, col, v).unwrap();
                }
            }
            Ok(out)
        };
        let outputs = propagate_multi(&[&a, &b], &sum, &PropagateParams::default()).unwrap();
        for i in 0..5 {
            assert_eq!(outputs.member(i).unwrap().get(0, 0).unwrap(), i as f64 + 10.0);
        }
    }

    #[test]
    fn test_multi_input_size_mismatch() {
        let a = constant_ensemble(5, 1.0);
        let b = constant_ensemble(4, 1.0);
        assert!(propagate_multi(&[&a, &b], &double, &PropagateParams::default()).is_err());
    }
}
