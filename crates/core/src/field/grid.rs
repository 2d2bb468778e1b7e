//! Main Field type

use crate::error::{Error, Result};
use crate::field::{FieldElement, GridTransform};
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// A georeferenced 2D grid of values.
///
/// `Field<T>` stores values of type `T` in a 2D grid with an associated
/// affine cell geometry and an optional no-data value. It is the common
/// currency of the uncertainty workflow: distribution parameters,
/// realizations and summary maps are all fields.
///
/// # Type Parameters
///
/// - `T`: The cell value type, must implement [`FieldElement`]
///
/// # Example
///
/// ```ignore
/// use stochmap_core::Field;
///
/// // 100x100 field of zeros
/// let mut field: Field<f64> = Field::new(100, 100);
/// field.set(10, 20, 42.0)?;
/// let value = field.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Field<T: FieldElement> {
    /// Cell values in row-major order (row, col)
    data: Array2<T>,
    /// Affine cell geometry
    transform: GridTransform,
    /// No-data value
    nodata: Option<T>,
}

impl<T: FieldElement> Field<T> {
    /// Create a new field filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            transform: GridTransform::default(),
            nodata: None,
        }
    }

    /// Create a new field filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GridTransform::default(),
            nodata: None,
        }
    }

    /// Create a field from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self {
            data: array,
            transform: GridTransform::default(),
            nodata: None,
        })
    }

    /// Create a field from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GridTransform::default(),
            nodata: None,
        }
    }

    /// Create a field by evaluating a function of (row, col)
    pub fn from_fn<F>(rows: usize, cols: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> T,
    {
        Self {
            data: Array2::from_shape_fn((rows, cols), |(r, c)| f(r, c)),
            transform: GridTransform::default(),
            nodata: None,
        }
    }

    /// Create a field with the same geometry but a different value type
    pub fn with_same_shape<U: FieldElement>(&self) -> Field<U> {
        Field {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            nodata: None,
        }
    }

    /// Create a field with the same geometry and no-data, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the field is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether another field shares this field's shape and geometry.
    ///
    /// Every two-field operation in the workflow (mean/sd pairing,
    /// ensemble membership, joint sampling) requires this to hold.
    pub fn aligned_with<U: FieldElement>(&self, other: &Field<U>) -> bool {
        self.shape() == other.shape() && self.transform == other.transform
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Set value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn set_unchecked(&mut self, row: usize, col: usize, value: T) {
        unsafe {
            *self.data.uget_mut((row, col)) = value;
        }
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a mutable view of the underlying data
    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, T> {
        self.data.view_mut()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the field and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the grid transform
    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Set the grid transform
    pub fn set_transform(&mut self, transform: GridTransform) {
        self.transform = transform;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Coordinate conversion

    /// Geographic coordinates of the center of cell (row, col).
    ///
    /// Correlogram distances between cells are computed between centers.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Convert geographic coordinates to fractional pixel coordinates
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    // Statistics

    /// Basic per-field statistics (min, max, mean, count of valid cells)
    pub fn summary(&self) -> FieldSummary<T> {
        let mut min = None;
        let mut max = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.is_none_or(|m| value < m) {
                min = Some(value);
            }
            if max.is_none_or(|m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        FieldSummary {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a single field
#[derive(Debug, Clone)]
pub struct FieldSummary<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
