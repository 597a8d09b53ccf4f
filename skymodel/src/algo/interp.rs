//! Table interpolation in spectral parameter space.
//!
//! Bandpass-integrated SEDs are tabulated over the observed range of each
//! spatially varying parameter and looked up per pixel. Values outside the
//! tabulated range are clamped to the nearest edge, since tables are always
//! built to span the data they are queried with.

use ndarray::Array2;
use std::fmt;

/// Error types for table interpolation.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationError {
    /// Inconsistent data dimensions
    DimensionMismatch {
        x_len: usize,
        y_len: usize,
        data_shape: (usize, usize),
    },
    /// A table needs at least one node
    EmptyTable,
}

impl fmt::Display for InterpolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpolationError::DimensionMismatch {
                x_len,
                y_len,
                data_shape,
            } => {
                write!(
                    f,
                    "Data dimensions ({data_shape:?}) don't match coordinate lengths (x: {x_len}, y: {y_len})"
                )
            }
            InterpolationError::EmptyTable => write!(f, "Interpolation table has no nodes"),
        }
    }
}

impl std::error::Error for InterpolationError {}

/// Find the bracketing nodes and fractional weight for `value`.
///
/// Returns (lower_index, upper_index, weight) where weight is the fraction
/// of the way from lower to upper. Values beyond the ends clamp to the edge.
fn find_indices_and_weight(coords: &[f64], value: f64) -> (usize, usize, f64) {
    let n = coords.len();
    if n == 1 || value <= coords[0] {
        return (0, 0, 0.0);
    }
    if value >= coords[n - 1] {
        return (n - 1, n - 1, 0.0);
    }

    // Binary search for the interval
    let mut left = 0;
    let mut right = n - 1;
    while left < right - 1 {
        let mid = (left + right) / 2;
        if value < coords[mid] {
            right = mid;
        } else {
            left = mid;
        }
    }

    let weight = (value - coords[left]) / (coords[right] - coords[left]);
    (left, right, weight)
}

fn check_sorted(coords: &[f64], axis: &str) {
    for i in 1..coords.len() {
        if coords[i] <= coords[i - 1] {
            panic!("{axis} coordinates must be sorted in ascending order");
        }
    }
}

/// Piecewise-linear interpolator on a 1D grid. Exact at the nodes.
#[derive(Debug, Clone)]
pub struct LinearInterpolator {
    coords: Vec<f64>,
    values: Vec<f64>,
}

impl LinearInterpolator {
    /// # Panics
    /// Panics if coordinates are not strictly ascending.
    pub fn new(coords: Vec<f64>, values: Vec<f64>) -> Result<Self, InterpolationError> {
        if coords.is_empty() {
            return Err(InterpolationError::EmptyTable);
        }
        if coords.len() != values.len() {
            return Err(InterpolationError::DimensionMismatch {
                x_len: coords.len(),
                y_len: 1,
                data_shape: (1, values.len()),
            });
        }
        check_sorted(&coords, "X");
        Ok(Self { coords, values })
    }

    pub fn interpolate(&self, x: f64) -> f64 {
        let (lo, hi, w) = find_indices_and_weight(&self.coords, x);
        self.values[lo] * (1.0 - w) + self.values[hi] * w
    }
}

/// Bilinear interpolator on a rectilinear 2D grid.
#[derive(Debug, Clone)]
pub struct BilinearInterpolator {
    /// X-axis coordinates (sorted ascending)
    x_coords: Vec<f64>,
    /// Y-axis coordinates (sorted ascending)
    y_coords: Vec<f64>,
    /// 2D data array indexed as [y_index, x_index]
    data: Array2<f64>,
}

impl BilinearInterpolator {
    /// Create a new bilinear interpolator.
    ///
    /// # Arguments
    /// * `x_coords` - X-axis coordinates (must be sorted ascending)
    /// * `y_coords` - Y-axis coordinates (must be sorted ascending)
    /// * `data` - 2D data array with shape (y_coords.len(), x_coords.len())
    ///
    /// # Panics
    /// Panics if coordinates are not sorted
    pub fn new(
        x_coords: Vec<f64>,
        y_coords: Vec<f64>,
        data: Array2<f64>,
    ) -> Result<Self, InterpolationError> {
        if x_coords.is_empty() || y_coords.is_empty() {
            return Err(InterpolationError::EmptyTable);
        }
        let (ny, nx) = data.dim();
        if nx != x_coords.len() || ny != y_coords.len() {
            return Err(InterpolationError::DimensionMismatch {
                x_len: x_coords.len(),
                y_len: y_coords.len(),
                data_shape: (ny, nx),
            });
        }
        check_sorted(&x_coords, "X");
        check_sorted(&y_coords, "Y");

        Ok(Self {
            x_coords,
            y_coords,
            data,
        })
    }

    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        let (x_low, x_high, x_weight) = find_indices_and_weight(&self.x_coords, x);
        let (y_low, y_high, y_weight) = find_indices_and_weight(&self.y_coords, y);

        let q11 = self.data[[y_low, x_low]];
        let q12 = self.data[[y_high, x_low]];
        let q21 = self.data[[y_low, x_high]];
        let q22 = self.data[[y_high, x_high]];

        q11 * (1.0 - x_weight) * (1.0 - y_weight)
            + q21 * x_weight * (1.0 - y_weight)
            + q12 * (1.0 - x_weight) * y_weight
            + q22 * x_weight * y_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_simple_grid() -> BilinearInterpolator {
        let x_coords = vec![0.0, 1.0, 2.0];
        let y_coords = vec![0.0, 1.0, 2.0];
        // data[y,x] = x + 2y
        let data = Array2::from_shape_fn((3, 3), |(y, x)| x as f64 + 2.0 * y as f64);
        BilinearInterpolator::new(x_coords, y_coords, data).unwrap()
    }

    #[test]
    fn test_exact_grid_points() {
        let interp = create_simple_grid();
        assert_eq!(interp.interpolate(0.0, 0.0), 0.0);
        assert_eq!(interp.interpolate(1.0, 0.0), 1.0);
        assert_eq!(interp.interpolate(0.0, 1.0), 2.0);
        assert_eq!(interp.interpolate(2.0, 2.0), 6.0);
    }

    #[test]
    fn test_bilinear_midpoints() {
        let interp = create_simple_grid();
        assert_relative_eq!(interp.interpolate(0.5, 0.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(interp.interpolate(0.5, 0.5), 1.5, epsilon = 1e-12);
        assert_relative_eq!(interp.interpolate(1.5, 1.25), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clamps_outside_grid() {
        let interp = create_simple_grid();
        assert_eq!(interp.interpolate(-1.0, 0.0), 0.0);
        assert_eq!(interp.interpolate(5.0, 5.0), 6.0);
    }

    #[test]
    fn test_single_node_axis() {
        let interp =
            BilinearInterpolator::new(vec![3.0], vec![0.0, 1.0], Array2::from_shape_vec((2, 1), vec![1.0, 3.0]).unwrap())
                .unwrap();
        assert_relative_eq!(interp.interpolate(100.0, 0.5), 2.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = BilinearInterpolator::new(vec![0.0, 1.0], vec![0.0], Array2::zeros((2, 2)));
        assert!(matches!(
            result,
            Err(InterpolationError::DimensionMismatch { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "sorted")]
    fn test_unsorted_coordinates_panic() {
        let _ = LinearInterpolator::new(vec![1.0, 0.0], vec![0.0, 1.0]);
    }

    #[test]
    fn test_linear_table() {
        let table = LinearInterpolator::new(vec![0.0, 1.0, 3.0], vec![0.0, 10.0, 30.0]).unwrap();
        assert_eq!(table.interpolate(1.0), 10.0);
        assert_relative_eq!(table.interpolate(2.0), 20.0);
        assert_eq!(table.interpolate(-4.0), 0.0);
        assert_eq!(table.interpolate(9.0), 30.0);
        assert!(LinearInterpolator::new(vec![], vec![]).is_err());
    }
}
