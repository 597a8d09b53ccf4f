//! Point-source catalogs and their rasterization onto the pixel grid.
//!
//! Each source is deposited with a peak-normalized, truncated Gaussian
//! kernel `exp(−r²/2σ²)` whose integral over the sphere is the beam solid
//! angle `2πσ²`. Without a beam, a source lands entirely in the pixel that
//! contains it and the beam solid angle is the pixel area.

use std::f64::consts::{LN_2, PI};
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::{Array1, ArrayView1};
use rayon::prelude::*;
use skypix::{angular_distance, lonlat_to_vec, nside_to_npix, pix2vec, pixel_area, query_disc, resolution};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PointSourceError {
    #[error(
        "beam FWHM of {fwhm_arcmin:.3} arcmin is below the pixel resolution of {resolution_arcmin:.3} arcmin"
    )]
    BeamTooNarrow {
        fwhm_arcmin: f64,
        resolution_arcmin: f64,
    },

    #[error("catalog lists {catalog} sources but the component has {amplitudes} amplitudes")]
    CatalogMismatch { catalog: usize, amplitudes: usize },

    #[error("failed to read point-source catalog {path}: {source}")]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog line {line}: '{content}'")]
    CatalogParse { line: usize, content: String },
}

/// Source positions as galactic longitude/latitude in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSourceCatalog {
    coords: Vec<(f64, f64)>,
}

impl PointSourceCatalog {
    pub fn new(coords: Vec<(f64, f64)>) -> Self {
        Self { coords }
    }

    /// Parses whitespace-delimited text whose first two columns are
    /// longitude and latitude. Blank lines and `#` comments are skipped;
    /// extra columns are ignored.
    pub fn parse(text: &str) -> Result<Self, PointSourceError> {
        let mut coords = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut columns = trimmed.split_whitespace().map(str::parse::<f64>);
            match (columns.next(), columns.next()) {
                (Some(Ok(lon)), Some(Ok(lat))) => coords.push((lon, lat)),
                _ => {
                    return Err(PointSourceError::CatalogParse {
                        line: i + 1,
                        content: trimmed.to_string(),
                    })
                }
            }
        }
        Ok(Self { coords })
    }

    pub fn from_file(path: &Path) -> Result<Self, PointSourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| PointSourceError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::parse(&text)?;
        debug!("read {} point sources from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn coords(&self) -> &[(f64, f64)] {
        &self.coords
    }

    /// Fails with `CatalogMismatch` unless the catalog has `n_amplitudes` entries.
    pub fn check_len(&self, n_amplitudes: usize) -> Result<(), PointSourceError> {
        if self.len() != n_amplitudes {
            return Err(PointSourceError::CatalogMismatch {
                catalog: self.len(),
                amplitudes: n_amplitudes,
            });
        }
        Ok(())
    }
}

/// Sources deposited on a map, in amplitude units per beam.
#[derive(Debug, Clone)]
pub struct RasterizedSources {
    pub map: Array1<f64>,
    /// Solid angle of the deposition kernel in steradians
    pub beam_area_sr: f64,
    pub nside: u32,
}

impl RasterizedSources {
    /// Sum of the map weighted by pixel area over beam area. Recovers the
    /// total deposited amplitude when every kernel is fully contained.
    pub fn total_flux(&self) -> f64 {
        self.map.sum() * pixel_area(self.nside) / self.beam_area_sr
    }
}

/// Gaussian sigma for a full width at half maximum.
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * LN_2).sqrt())
}

/// Deposits `amplitudes[i]` at `catalog[i]` on an `nside` map.
///
/// `fwhm` of zero deposits into the containing pixel. Otherwise every pixel
/// within `n_fwhm · fwhm` of a source receives `amp · exp(−r²/2σ²)`. Per-source
/// contributions are computed in parallel and summed exactly once per pixel.
pub fn rasterize(
    amplitudes: ArrayView1<f64>,
    catalog: &PointSourceCatalog,
    nside: u32,
    fwhm: f64,
    n_fwhm: f64,
) -> Result<RasterizedSources, PointSourceError> {
    catalog.check_len(amplitudes.len())?;
    let npix = nside_to_npix(nside);
    let mut map = Array1::<f64>::zeros(npix);
    let sigma = fwhm_to_sigma(fwhm);

    if sigma == 0.0 {
        for (&(lon, lat), &amp) in catalog.coords().iter().zip(amplitudes.iter()) {
            let pix = skypix::ring::vec2pix(nside, lonlat_to_vec(lon, lat));
            map[pix] += amp;
        }
        return Ok(RasterizedSources {
            map,
            beam_area_sr: pixel_area(nside),
            nside,
        });
    }

    let pix_res = resolution(nside);
    if fwhm < pix_res {
        return Err(PointSourceError::BeamTooNarrow {
            fwhm_arcmin: fwhm.to_degrees() * 60.0,
            resolution_arcmin: pix_res.to_degrees() * 60.0,
        });
    }

    let r_max = n_fwhm * fwhm;
    let two_sigma_sq = 2.0 * sigma * sigma;
    debug!(
        "rasterizing {} sources at nside {nside}, sigma {:.3} arcmin, r_max {:.3} arcmin",
        catalog.len(),
        sigma.to_degrees() * 60.0,
        r_max.to_degrees() * 60.0
    );

    let amps = amplitudes.to_vec();
    let contributions: Vec<Vec<(usize, f64)>> = catalog
        .coords()
        .par_iter()
        .zip(amps.par_iter())
        .map(|(&(lon, lat), &amp)| {
            let center = lonlat_to_vec(lon, lat);
            query_disc(nside, center, r_max)
                .into_iter()
                .map(|pix| {
                    let r = angular_distance(pix2vec(nside, pix), center);
                    (pix, amp * (-r * r / two_sigma_sq).exp())
                })
                .collect()
        })
        .collect();

    for (pix, value) in contributions.into_iter().flatten() {
        map[pix] += value;
    }

    Ok(RasterizedSources {
        map,
        beam_area_sr: 2.0 * PI * sigma * sigma,
        nside,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn catalog_text() -> &'static str {
        "# lon lat flux\n\
         10.0  20.0  1.0\n\
         \n\
         200.5 -45.0 2.0\n\
         300.0 80.0\n"
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = PointSourceCatalog::parse(catalog_text()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.coords()[1], (200.5, -45.0));
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        let err = PointSourceCatalog::parse("1.0 2.0\n3.0\n").unwrap_err();
        assert!(matches!(err, PointSourceError::CatalogParse { line: 2, .. }));
    }

    #[test]
    fn test_catalog_mismatch() {
        let catalog = PointSourceCatalog::parse(catalog_text()).unwrap();
        let amps = array![1.0, 2.0];
        let err = rasterize(amps.view(), &catalog, 8, 0.0, 2.0).unwrap_err();
        assert!(matches!(
            err,
            PointSourceError::CatalogMismatch {
                catalog: 3,
                amplitudes: 2
            }
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = PointSourceCatalog::from_file(Path::new("/nonexistent/catalog.txt")).unwrap_err();
        assert!(matches!(err, PointSourceError::CatalogIo { .. }));
    }

    #[test]
    fn test_nearest_pixel_collisions_accumulate() {
        let catalog = PointSourceCatalog::new(vec![(45.0, 30.0), (45.0, 30.0), (120.0, -10.0)]);
        let amps = array![1.0, 2.5, 4.0];
        let raster = rasterize(amps.view(), &catalog, 16, 0.0, 2.0).unwrap();
        let pix = skypix::ring::vec2pix(16, lonlat_to_vec(45.0, 30.0));
        assert_eq!(raster.map[pix], 3.5);
        assert_relative_eq!(raster.map.sum(), 7.5);
        assert_relative_eq!(raster.beam_area_sr, pixel_area(16));
        assert_relative_eq!(raster.total_flux(), 7.5, epsilon = 1e-12);
    }

    #[test]
    fn test_beam_too_narrow() {
        let catalog = PointSourceCatalog::new(vec![(0.0, 0.0)]);
        let amps = array![1.0];
        let fwhm = 0.5 * resolution(32);
        assert!(matches!(
            rasterize(amps.view(), &catalog, 32, fwhm, 2.0),
            Err(PointSourceError::BeamTooNarrow { .. })
        ));
    }

    #[test]
    fn test_gaussian_deposition_conserves_flux() {
        let nside = 64;
        let catalog = PointSourceCatalog::new(vec![(10.0, 5.0), (200.0, -60.0), (90.0, 89.0)]);
        let amps = array![1.0, 3.0, 0.5];
        let fwhm = 3.0 * resolution(nside);
        let raster = rasterize(amps.view(), &catalog, nside, fwhm, 5.0).unwrap();
        assert_relative_eq!(raster.total_flux(), 4.5, max_relative = 0.02);

        let peak = skypix::ring::vec2pix(nside, lonlat_to_vec(200.0, -60.0));
        assert!(raster.map[peak] > 2.0);
        assert!(raster.map[peak] <= 3.0 + 1e-12);
    }

    #[test]
    fn test_truncation_loses_flux() {
        let nside = 64;
        let catalog = PointSourceCatalog::new(vec![(10.0, 5.0)]);
        let amps = array![1.0];
        let fwhm = 3.0 * resolution(nside);
        let wide = rasterize(amps.view(), &catalog, nside, fwhm, 5.0).unwrap();
        let tight = rasterize(amps.view(), &catalog, nside, fwhm, 0.5).unwrap();
        assert!(tight.total_flux() < wide.total_flux());
    }
}
