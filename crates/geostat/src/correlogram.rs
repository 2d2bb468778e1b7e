//! Parametric spatial-autocorrelation models
//!
//! A correlogram maps separation distance h to the expected correlation
//! between two observations. The models here are the unit-variance duals
//! of the classical semivariogram families: corr(h) = 1 − γ(h) for a
//! variable standardized to variance 1.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use serde::{Deserialize, Serialize};
use std::fmt;
use stochmap_core::{Error, Result};

const NUGGET_TOLERANCE: f64 = 1e-9;

/// Correlogram model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CorrelogramFamily {
    /// corr(h) = sill · exp(−h/a)
    Exponential,
    /// corr(h) = sill · (1 − 1.5(h/a) + 0.5(h/a)³) for h < a, else 0
    Spherical,
    /// corr(h) = sill · max(0, 1 − h/a)
    Linear,
    /// corr(h) = sill · exp(−(h/a)²)
    Gaussian,
}

impl fmt::Display for CorrelogramFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CorrelogramFamily::Exponential => "exponential",
            CorrelogramFamily::Spherical => "spherical",
            CorrelogramFamily::Linear => "linear",
            CorrelogramFamily::Gaussian => "gaussian",
        };
        write!(f, "{}", name)
    }
}

/// Immutable descriptor of the spatial decay of correlation.
///
/// `sill` is the short-range correlation limit (corr(h) as h → 0),
/// `range` the distance at which correlation becomes negligible, and
/// `nugget` the uncorrelated remainder. The correlogram is unit-variance,
/// so `sill + nugget = 1` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelogramModel {
    family: CorrelogramFamily,
    sill: f64,
    range: f64,
    nugget: f64,
}

impl CorrelogramModel {
    /// Build a correlogram with the default nugget `1 − sill`.
    ///
    /// # Errors
    /// `InvalidParameter` when `sill` is outside [0, 1] or `range` is not
    /// strictly positive.
    pub fn new(family: CorrelogramFamily, sill: f64, range: f64) -> Result<Self> {
        Self::with_nugget(family, sill, range, 1.0 - sill)
    }

    /// Build a correlogram with an explicit nugget.
    ///
    /// The nugget must satisfy `sill + nugget = 1` (unit variance).
    pub fn with_nugget(
        family: CorrelogramFamily,
        sill: f64,
        range: f64,
        nugget: f64,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&sill) || !sill.is_finite() {
            return Err(Error::InvalidParameter {
                name: "sill",
                value: format!("{}", sill),
                reason: "sill must lie in [0, 1]".into(),
            });
        }
        if !(range > 0.0) || !range.is_finite() {
            return Err(Error::InvalidParameter {
                name: "range",
                value: format!("{}", range),
                reason: "range must be > 0".into(),
            });
        }
        if !nugget.is_finite() || (sill + nugget - 1.0).abs() > NUGGET_TOLERANCE {
            return Err(Error::InvalidParameter {
                name: "nugget",
                value: format!("{}", nugget),
                reason: "sill + nugget must equal 1".into(),
            });
        }

        Ok(Self {
            family,
            sill,
            range,
            nugget,
        })
    }

    pub fn family(&self) -> CorrelogramFamily {
        self.family
    }

    /// Short-range correlation limit
    pub fn sill(&self) -> f64 {
        self.sill
    }

    /// Distance beyond which correlation is negligible
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Uncorrelated micro-scale remainder
    pub fn nugget(&self) -> f64 {
        self.nugget
    }

    /// Expected correlation between two observations separated by `h`.
    ///
    /// Pure function of the descriptor; result lies in [0, 1].
    pub fn correlation(&self, h: f64) -> f64 {
        debug_assert!(h >= 0.0, "separation distance must be non-negative");
        let hr = h / self.range;

        match self.family {
            CorrelogramFamily::Exponential => self.sill * (-hr).exp(),
            CorrelogramFamily::Spherical => {
                if hr < 1.0 {
                    self.sill * (1.0 - 1.5 * hr + 0.5 * hr * hr * hr)
                } else {
                    0.0
                }
            }
            CorrelogramFamily::Linear => self.sill * (1.0 - hr).max(0.0),
            CorrelogramFamily::Gaussian => self.sill * (-(hr * hr)).exp(),
        }
    }
}

impl fmt::Display for CorrelogramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} correlogram (sill={:.3}, range={:.1}, nugget={:.3})",
            self.family, self.sill, self.range, self.nugget
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FAMILIES: [CorrelogramFamily; 4] = [
        CorrelogramFamily::Exponential,
        CorrelogramFamily::Spherical,
        CorrelogramFamily::Linear,
        CorrelogramFamily::Gaussian,
    ];

    #[test]
    fn test_zero_distance_equals_sill() {
        for family in FAMILIES {
            let m = CorrelogramModel::new(family, 0.8, 300.0).unwrap();
            assert_relative_eq!(m.correlation(0.0), 0.8, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_decay_to_zero() {
        let exp = CorrelogramModel::new(CorrelogramFamily::Exponential, 0.9, 100.0).unwrap();
        let gau = CorrelogramModel::new(CorrelogramFamily::Gaussian, 0.9, 100.0).unwrap();
        assert!(exp.correlation(1e5) < 1e-12);
        assert!(gau.correlation(1e5) < 1e-12);
    }

    #[test]
    fn test_compact_support() {
        let sph = CorrelogramModel::new(CorrelogramFamily::Spherical, 0.7, 250.0).unwrap();
        let lin = CorrelogramModel::new(CorrelogramFamily::Linear, 0.7, 250.0).unwrap();
        assert_eq!(sph.correlation(250.0), 0.0);
        assert_eq!(sph.correlation(400.0), 0.0);
        assert_eq!(lin.correlation(250.0), 0.0);
        assert_eq!(lin.correlation(400.0), 0.0);
    }

    #[test]
    fn test_monotone_non_increasing() {
        for family in FAMILIES {
            let m = CorrelogramModel::new(family, 0.95, 120.0).unwrap();
            let mut prev = m.correlation(0.0);
            for step in 1..=100 {
                let c = m.correlation(step as f64 * 5.0);
                assert!(
                    c <= prev + 1e-12,
                    "{} not non-increasing at h={}",
                    family,
                    step * 5
                );
                prev = c;
            }
        }
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(CorrelogramModel::new(CorrelogramFamily::Exponential, -0.1, 100.0).is_err());
        assert!(CorrelogramModel::new(CorrelogramFamily::Exponential, 1.2, 100.0).is_err());
        assert!(CorrelogramModel::new(CorrelogramFamily::Exponential, 0.5, 0.0).is_err());
        assert!(CorrelogramModel::new(CorrelogramFamily::Exponential, 0.5, -5.0).is_err());
        assert!(
            CorrelogramModel::with_nugget(CorrelogramFamily::Spherical, 0.5, 10.0, 0.4).is_err()
        );
    }

    #[test]
    fn test_default_nugget() {
        let m = CorrelogramModel::new(CorrelogramFamily::Spherical, 0.75, 80.0).unwrap();
        assert_relative_eq!(m.nugget(), 0.25, epsilon = 1e-12);
    }
}
