//! Horn slope, the demonstration forward model for propagation runs.

use stochmap_core::Field;
use stochmap_mc::BoxError;

/// Slope in degrees by Horn's third-order finite difference.
///
/// Border cells have no full 3x3 window and come out nodata.
pub fn horn_slope(dem: &Field<f64>) -> Result<Field<f64>, BoxError> {
    let (rows, cols) = dem.shape();
    if rows < 3 || cols < 3 {
        return Err(format!("slope needs at least a 3x3 grid, got {}x{}", rows, cols).into());
    }
    let cell = dem.cell_size();
    if cell <= 0.0 {
        return Err("slope needs a positive cell size".into());
    }

    let mut out = dem.with_same_shape::<f64>();
    out.set_nodata(Some(f64::NAN));

    for row in 0..rows {
        for col in 0..cols {
            if row == 0 || col == 0 || row == rows - 1 || col == cols - 1 {
                unsafe { out.set_unchecked(row, col, f64::NAN) };
                continue;
            }

            let mut window = [[0.0_f64; 3]; 3];
            let mut valid = true;
            for (i, dr) in (-1i32..=1).enumerate() {
                for (j, dc) in (-1i32..=1).enumerate() {
                    let v = unsafe {
                        dem.get_unchecked((row as i32 + dr) as usize, (col as i32 + dc) as usize)
                    };
                    if dem.is_nodata(v) {
                        valid = false;
                    }
                    window[i][j] = v;
                }
            }
            if !valid {
                unsafe { out.set_unchecked(row, col, f64::NAN) };
                continue;
            }

            let dz_dx = ((window[0][2] + 2.0 * window[1][2] + window[2][2])
                - (window[0][0] + 2.0 * window[1][0] + window[2][0]))
                / (8.0 * cell);
            let dz_dy = ((window[2][0] + 2.0 * window[2][1] + window[2][2])
                - (window[0][0] + 2.0 * window[0][1] + window[0][2]))
                / (8.0 * cell);
            let slope = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan().to_degrees();
            unsafe { out.set_unchecked(row, col, slope) };
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stochmap_core::GridTransform;

    #[test]
    fn test_flat_surface_has_zero_slope() {
        let mut dem = Field::filled(5, 5, 100.0);
        dem.set_transform(GridTransform::new(0.0, 5.0, 1.0, -1.0));
        let slope = horn_slope(&dem).unwrap();
        assert_eq!(slope.get(2, 2).unwrap(), 0.0);
        assert!(slope.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_unit_gradient_is_45_degrees() {
        let mut dem = Field::from_fn(5, 5, |_, col| col as f64);
        dem.set_transform(GridTransform::new(0.0, 5.0, 1.0, -1.0));
        let slope = horn_slope(&dem).unwrap();
        assert!((slope.get(2, 2).unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_small_grid_rejected() {
        let dem = Field::filled(2, 2, 0.0);
        assert!(horn_slope(&dem).is_err());
    }
}
