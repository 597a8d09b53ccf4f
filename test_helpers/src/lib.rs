//! Test helpers for the sky model workspace
//!
//! Deterministic map and catalog fixtures shared by the unit tests,
//! integration tests and benchmarks of the workspace crates.

use std::f64::consts::PI;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Error type for test helper operations
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    #[error("Failed to write fixture {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Installs `env_logger` in test mode. Safe to call from every test.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A reproducible random number generator.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Number of pixels of a HEALPix map at `nside`.
pub fn npix(nside: u32) -> usize {
    12 * (nside as usize) * (nside as usize)
}

/// A `(channels, npix)` map filled with `value`.
pub fn constant_map(channels: usize, nside: u32, value: f64) -> Array2<f64> {
    Array2::from_elem((channels, npix(nside)), value)
}

/// A `(channels, n)` array of values drawn uniformly from `[lo, hi)`.
pub fn random_values(rng: &mut ChaCha8Rng, channels: usize, n: usize, lo: f64, hi: f64) -> Array2<f64> {
    Array2::from_shape_simple_fn((channels, n), || rng.gen_range(lo..hi))
}

/// A `(channels, npix)` map of values drawn uniformly from `[lo, hi)`.
pub fn random_map(rng: &mut ChaCha8Rng, channels: usize, nside: u32, lo: f64, hi: f64) -> Array2<f64> {
    random_values(rng, channels, npix(nside), lo, hi)
}

/// `n` source positions (longitude, latitude in degrees) distributed
/// uniformly over the sphere.
pub fn random_sources(rng: &mut ChaCha8Rng, n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|_| {
            let lon = rng.gen_range(0.0..360.0);
            let z: f64 = rng.gen_range(-1.0..1.0);
            (lon, z.asin() * 180.0 / PI)
        })
        .collect()
}

/// Writes a point-source catalog as whitespace-delimited text with a
/// header comment and a flux column.
pub fn write_catalog(dir: &Path, name: &str, sources: &[(f64, f64)]) -> Result<PathBuf, TestHelperError> {
    let path = dir.join(name);
    let write = || -> std::io::Result<()> {
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "# lon[deg] lat[deg] flux[mJy]")?;
        for (i, (lon, lat)) in sources.iter().enumerate() {
            writeln!(file, "{lon:.6} {lat:.6} {:.3}", 1.0 + i as f64)?;
        }
        Ok(())
    };
    write().map_err(|source| TestHelperError::Write {
        path: path.clone(),
        source,
    })?;
    debug!("wrote {} sources to {}", sources.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let a = random_map(&mut seeded_rng(7), 3, 2, 0.0, 1.0);
        let b = random_map(&mut seeded_rng(7), 3, 2, 0.0, 1.0);
        assert_eq!(a, b);
        assert_eq!(a.dim(), (3, 48));
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn test_random_sources_cover_both_hemispheres() {
        let sources = random_sources(&mut seeded_rng(1), 200);
        assert!(sources.iter().any(|(_, lat)| *lat > 30.0));
        assert!(sources.iter().any(|(_, lat)| *lat < -30.0));
        assert!(sources.iter().all(|(lon, _)| (0.0..360.0).contains(lon)));
    }

    #[test]
    fn test_write_catalog() {
        let dir = std::env::temp_dir().join(format!("test_helpers_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = write_catalog(&dir, "sources.txt", &[(10.0, -5.0), (200.0, 45.5)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(2).unwrap().starts_with("200.000000 45.500000"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
