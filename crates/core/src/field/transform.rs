//! Affine cell geometry for fields

use serde::{Deserialize, Serialize};

/// Affine transformation between pixel coordinates (col, row) and
/// geographic coordinates (x, y) for north-up grids:
/// ```text
/// x = origin_x + col * cell_width
/// y = origin_y + row * cell_height
/// ```
/// `cell_height` is negative for north-up grids (rows increase southward).
/// Rotated grids are not represented; the samplers only consume inter-cell
/// distances, which rotation does not change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Cell size in the X direction
    pub cell_width: f64,
    /// Cell size in the Y direction, usually negative
    pub cell_height: f64,
}

impl GridTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_width,
            cell_height,
        }
    }

    /// Convert pixel coordinates to geographic coordinates of the cell center
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + (col as f64 + 0.5) * self.cell_width;
        let y = self.origin_y + (row as f64 + 0.5) * self.cell_height;
        (x, y)
    }

    /// Convert pixel coordinates to geographic coordinates of the top-left corner
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.origin_x + col as f64 * self.cell_width;
        let y = self.origin_y + row as f64 * self.cell_height;
        (x, y)
    }

    /// Convert geographic coordinates to fractional pixel coordinates;
    /// use `.floor()` to get integer indices
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        if self.cell_width.abs() < 1e-12 || self.cell_height.abs() < 1e-12 {
            return (f64::NAN, f64::NAN);
        }
        let col = (x - self.origin_x) / self.cell_width;
        let row = (y - self.origin_y) / self.cell_height;
        (col, row)
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.cell_width.abs()
    }

    /// Whether the grid is north-up
    pub fn is_north_up(&self) -> bool {
        self.cell_height < 0.0
    }

    /// Bounding box (min_x, min_y, max_x, max_y) for a grid of the given size
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.pixel_to_geo_corner(0, 0);
        let (x1, y1) = self.pixel_to_geo_corner(cols, rows);

        (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }
}

impl Default for GridTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pixel_to_geo_roundtrip() {
        let gt = GridTransform::new(100.0, 200.0, 10.0, -10.0);

        let (x, y) = gt.pixel_to_geo(5, 10);
        let (col, row) = gt.geo_to_pixel(x, y);

        assert_relative_eq!(col, 5.5, epsilon = 1e-10);
        assert_relative_eq!(row, 10.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bounds() {
        let gt = GridTransform::new(0.0, 100.0, 1.0, -1.0);
        let (min_x, min_y, max_x, max_y) = gt.bounds(100, 100);

        assert_relative_eq!(min_x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(min_y, 0.0, epsilon = 1e-10);
        assert_relative_eq!(max_x, 100.0, epsilon = 1e-10);
        assert_relative_eq!(max_y, 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_cell_center_distance() {
        let gt = GridTransform::new(0.0, 300.0, 30.0, -30.0);
        let (x0, y0) = gt.pixel_to_geo(0, 0);
        let (x1, y1) = gt.pixel_to_geo(1, 0);
        let d = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        assert_relative_eq!(d, 30.0, epsilon = 1e-10);
    }
}
