//! Sample selection and averaging.

use ndarray::Array2;

use super::{ChainArchive, ChainError};

/// Which samples of a chain to read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SampleSelection {
    /// The most recent sample
    #[default]
    Last,
    /// One sample by number
    Index(usize),
    /// The mean over several samples
    List(Vec<usize>),
    /// The mean over every sample from the burn-in onward
    All,
}

pub const DEFAULT_SAMPLE: SampleSelection = SampleSelection::Last;

/// Archive identifier of sample number `n`.
pub fn sample_id(n: usize) -> String {
    format!("{n:06}")
}

impl SampleSelection {
    /// Resolves the selection to archive identifiers, failing with
    /// [`ChainError::Key`] for samples that do not exist.
    pub fn resolve<C: ChainArchive + ?Sized>(
        &self,
        chain: &C,
        burn_in: Option<usize>,
    ) -> Result<Vec<String>, ChainError> {
        let available = chain.list_samples()?;
        let require = |n: usize| -> Result<String, ChainError> {
            let id = sample_id(n);
            if available.contains(&id) {
                Ok(id)
            } else {
                Err(ChainError::Key(id))
            }
        };
        let ids: Vec<String> = match self {
            SampleSelection::Last => available.last().cloned().into_iter().collect(),
            SampleSelection::Index(n) => vec![require(*n)?],
            SampleSelection::List(ns) => ns.iter().map(|&n| require(n)).collect::<Result<_, _>>()?,
            SampleSelection::All => {
                let start = burn_in.unwrap_or(0);
                available
                    .iter()
                    .filter(|id| id.parse::<usize>().map_or(true, |n| n >= start))
                    .cloned()
                    .collect()
            }
        };
        if ids.is_empty() {
            return Err(ChainError::Key("samples".into()));
        }
        Ok(ids)
    }
}

/// Arithmetic mean of one item over `samples`.
///
/// Uses a running mean, so a value repeated in every sample is returned
/// exactly.
pub fn mean_item<C: ChainArchive + ?Sized>(
    chain: &C,
    samples: &[String],
    component: &str,
    item: &str,
) -> Result<Array2<f64>, ChainError> {
    let (first, rest) = samples
        .split_first()
        .ok_or_else(|| ChainError::Key("samples".into()))?;
    let mut mean = chain.get_sample_item(first, component, item)?;
    for (i, sample) in rest.iter().enumerate() {
        let value = chain.get_sample_item(sample, component, item)?;
        if value.dim() != mean.dim() {
            return Err(super::invalid(
                &format!("{sample}/{component}/{item}"),
                format!("shape {:?} differs from {:?}", value.dim(), mean.dim()),
            ));
        }
        let count = (i + 2) as f64;
        mean.zip_mut_with(&value, |m, &v| *m += (v - *m) / count);
    }
    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MemoryChain;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    fn chain() -> MemoryChain {
        (0..8).fold(MemoryChain::new(), |chain, n| {
            chain
                .with_sample_item(n, "dust", "beta", arr2(&[[n as f64, 2.0 * n as f64]]))
                .with_sample_item(n, "dust", "T", arr2(&[[0.1 + 0.2]]))
        })
    }

    #[test]
    fn test_sample_ids_are_zero_padded() {
        assert_eq!(sample_id(42), "000042");
        assert_eq!(sample_id(0), "000000");
    }

    #[test]
    fn test_resolve() {
        let chain = chain();
        assert_eq!(DEFAULT_SAMPLE.resolve(&chain, None).unwrap(), vec!["000007"]);
        assert_eq!(
            SampleSelection::Index(3).resolve(&chain, None).unwrap(),
            vec!["000003"]
        );
        assert_eq!(
            SampleSelection::All.resolve(&chain, Some(5)).unwrap(),
            vec!["000005", "000006", "000007"]
        );
        assert_eq!(SampleSelection::All.resolve(&chain, None).unwrap().len(), 8);
        assert!(matches!(
            SampleSelection::List(vec![2, 9]).resolve(&chain, None),
            Err(ChainError::Key(id)) if id == "000009"
        ));
        assert!(SampleSelection::All.resolve(&chain, Some(100)).is_err());
    }

    #[test]
    fn test_mean() {
        let chain = chain();
        let ids = SampleSelection::List(vec![3, 4, 5]).resolve(&chain, None).unwrap();
        let mean = mean_item(&chain, &ids, "dust", "beta").unwrap();
        assert_relative_eq!(mean[[0, 0]], 4.0, epsilon = 1e-12);
        assert_relative_eq!(mean[[0, 1]], 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_of_constant_is_exact() {
        let chain = chain();
        let ids = SampleSelection::List(vec![3, 4, 5]).resolve(&chain, None).unwrap();
        let mean = mean_item(&chain, &ids, "dust", "T").unwrap();
        assert_eq!(mean[[0, 0]], 0.1 + 0.2);
    }

    #[test]
    fn test_mean_shape_mismatch() {
        let chain = chain().with_sample_item(8, "dust", "beta", arr2(&[[1.0]]));
        let ids = SampleSelection::All.resolve(&chain, Some(7)).unwrap();
        assert!(matches!(
            mean_item(&chain, &ids, "dust", "beta"),
            Err(ChainError::InvalidValue { .. })
        ));
    }
}
