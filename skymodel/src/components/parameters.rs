//! Spectral parameters: scalars or maps, optionally per polarization channel.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{arr2, Array2};

use crate::units::Unit;

/// One spectral parameter with shape `(1 | channels, 1 | pixels)`.
///
/// A single column is spatially constant; a single row is shared by all
/// polarization channels. Lookups broadcast along unit axes.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralParameter {
    values: Array2<f64>,
    unit: Unit,
}

impl SpectralParameter {
    pub fn new(values: Array2<f64>, unit: Unit) -> Self {
        Self { values, unit }
    }

    pub fn scalar(value: f64, unit: Unit) -> Self {
        Self::new(arr2(&[[value]]), unit)
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn is_spatially_varying(&self) -> bool {
        self.values.ncols() > 1
    }

    /// Value for channel `c` at pixel `p`, broadcasting unit axes.
    pub fn get(&self, c: usize, p: usize) -> f64 {
        let (rows, cols) = self.values.dim();
        let row = if rows == 1 { 0 } else { c };
        let col = if cols == 1 { 0 } else { p };
        self.values[[row, col]]
    }

    /// Smallest and largest value among the entries used by channel `c`.
    pub fn range(&self, c: usize) -> (f64, f64) {
        let row = if self.values.nrows() == 1 { 0 } else { c };
        self.values
            .row(row)
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Whether the parameter broadcasts onto `(channels, pixels)`.
    pub fn fits(&self, channels: usize, pixels: usize) -> bool {
        let (rows, cols) = self.values.dim();
        (rows == 1 || rows == channels) && (cols == 1 || cols == pixels)
    }

    /// Re-pixelizes a spatially varying parameter; scalars are returned unchanged.
    pub(crate) fn map_pixels<F, E>(&self, f: F) -> Result<Self, E>
    where
        F: FnOnce(&Array2<f64>) -> Result<Array2<f64>, E>,
    {
        if self.is_spatially_varying() {
            Ok(Self::new(f(&self.values)?, self.unit))
        } else {
            Ok(self.clone())
        }
    }
}

impl fmt::Display for SpectralParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.values.dim();
        if cols == 1 && rows == 1 {
            write!(f, "{} {}", self.values[[0, 0]], self.unit)
        } else {
            write!(f, "map {rows}x{cols} [{}]", self.unit)
        }
    }
}

/// Named spectral parameters, ordered by name.
pub type SpectralParameters = BTreeMap<String, SpectralParameter>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_lookup() {
        let scalar = SpectralParameter::scalar(1.5, Unit::Dimensionless);
        assert_eq!(scalar.get(2, 100), 1.5);
        assert!(!scalar.is_spatially_varying());

        let per_channel = SpectralParameter::new(arr2(&[[1.0], [2.0], [2.0]]), Unit::Dimensionless);
        assert_eq!(per_channel.get(1, 55), 2.0);

        let map = SpectralParameter::new(
            Array2::from_shape_fn((1, 12), |(_, p)| p as f64),
            Unit::Kelvin,
        );
        assert!(map.is_spatially_varying());
        assert_eq!(map.get(2, 7), 7.0);
        assert_eq!(map.range(2), (0.0, 11.0));
    }

    #[test]
    fn test_fits() {
        let map = SpectralParameter::new(Array2::zeros((3, 12)), Unit::Dimensionless);
        assert!(map.fits(3, 12));
        assert!(!map.fits(1, 12));
        assert!(!map.fits(3, 48));
        assert!(SpectralParameter::scalar(0.0, Unit::Kelvin).fits(3, 48));
    }

    #[test]
    fn test_display() {
        assert_eq!(SpectralParameter::scalar(20.0, Unit::Kelvin).to_string(), "20 K");
        let map = SpectralParameter::new(Array2::zeros((1, 12)), Unit::Dimensionless);
        assert!(map.to_string().starts_with("map 1x12"));
    }
}
