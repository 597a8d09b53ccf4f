//! Unit-tagged multi-channel maps.

use ndarray::{Array2, ArrayView1};
use skypix::{npix_to_nside, PixelizationError};

use crate::units::{conversion_factor, Equivalency, Unit, UnitError};

/// A `(channels, pixels)` array with a physical unit.
///
/// Channel count 1 is intensity only, 3 is `(I, Q, U)`. For point-source
/// amplitudes the second axis runs over catalog entries instead of pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMap {
    data: Array2<f64>,
    unit: Unit,
}

impl PixelMap {
    pub fn new(data: Array2<f64>, unit: Unit) -> Self {
        Self { data, unit }
    }

    /// A single-channel map filled with `value`.
    pub fn constant(value: f64, n_pixels: usize, unit: Unit) -> Self {
        Self::new(Array2::from_elem((1, n_pixels), value), unit)
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_pixels(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_polarized(&self) -> bool {
        self.n_channels() == 3
    }

    pub fn channel(&self, c: usize) -> ArrayView1<f64> {
        self.data.row(c)
    }

    /// HEALPix resolution implied by the pixel axis.
    pub fn nside(&self) -> Result<u32, PixelizationError> {
        npix_to_nside(self.n_pixels())
    }

    /// Whether every channel holds a single repeated value.
    pub fn is_spatially_constant(&self) -> bool {
        self.data.rows().into_iter().all(|row| {
            let first = row[0];
            row.iter().all(|&v| v == first)
        })
    }

    /// Converts to `unit` under `equivalency`.
    pub fn to_unit(&self, unit: Unit, equivalency: Equivalency) -> Result<PixelMap, UnitError> {
        let factor = conversion_factor(self.unit, unit, equivalency)?;
        Ok(PixelMap::new(&self.data * factor, unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shape_queries() {
        let map = PixelMap::new(Array2::zeros((3, 192)), Unit::MicroKelvinRj);
        assert!(map.is_polarized());
        assert_eq!(map.n_pixels(), 192);
        assert_eq!(map.nside().unwrap(), 4);

        let sources = PixelMap::new(Array2::zeros((1, 17)), Unit::MilliJansky);
        assert!(!sources.is_polarized());
        assert!(sources.nside().is_err());
    }

    #[test]
    fn test_spatially_constant() {
        let map = PixelMap::constant(2.0, 48, Unit::Kelvin);
        assert!(map.is_spatially_constant());

        let mut data = Array2::from_elem((3, 12), 1.0);
        data[[2, 5]] = 1.5;
        assert!(!PixelMap::new(data, Unit::Kelvin).is_spatially_constant());
    }

    #[test]
    fn test_to_unit() {
        let map = PixelMap::constant(3.0, 12, Unit::KelvinRj);
        let converted = map.to_unit(Unit::MilliKelvinRj, Equivalency::None).unwrap();
        assert_eq!(converted.unit(), Unit::MilliKelvinRj);
        assert_relative_eq!(converted.data()[[0, 0]], 3000.0);
        assert!(map.to_unit(Unit::Kelvin, Equivalency::None).is_err());
    }
}
