//! Sampling-chain archives and sky model reconstruction from them.
//!
//! An archive holds static per-component metadata under
//! `parameters/<component>/<field>` and per-sample data under
//! `<sample_id>/<component>/<item>`. Archives without the parameter group
//! predate the current layout and cannot be used to rebuild a model.

pub mod alm;
pub mod loader;
pub mod memory;
pub mod registry;
pub mod samples;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use skypix::PixelizationError;
use thiserror::Error;

use crate::components::{ComponentError, PointSourceError};
use crate::model::ModelError;
use crate::units::UnitError;

pub use loader::{build_model_from_chain, LoadOptions};
pub use memory::MemoryChain;
pub use samples::{SampleSelection, DEFAULT_SAMPLE};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain archive has no parameter group and cannot be used to build a sky model")]
    Format,

    #[error("chain archive has no entry '{0}'")]
    Key(String),

    #[error("component '{0}' not found")]
    ComponentNotFound(String),

    #[error("no sky model registered under '{0}'")]
    UnknownSkyModel(String),

    #[error("no point-source catalog supplied for component '{0}'")]
    MissingCatalog(String),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("chain I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chain serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Pixelization(#[from] PixelizationError),

    #[error(transparent)]
    PointSource(#[from] PointSourceError),
}

/// Layout generation of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainVersion {
    /// No parameter group
    Old,
    Current,
}

/// A static metadata value from the parameter group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Array(Vec<f64>),
}

impl ParameterValue {
    pub fn as_f64(&self, key: &str) -> Result<f64, ChainError> {
        match self {
            ParameterValue::Integer(v) => Ok(*v as f64),
            ParameterValue::Float(v) => Ok(*v),
            ParameterValue::Array(v) if v.len() == 1 => Ok(v[0]),
            other => Err(invalid(key, format!("expected a number, found {other:?}"))),
        }
    }

    pub fn as_values(&self, key: &str) -> Result<Vec<f64>, ChainError> {
        match self {
            ParameterValue::Array(v) => Ok(v.clone()),
            ParameterValue::Integer(_) | ParameterValue::Float(_) => Ok(vec![self.as_f64(key)?]),
            other => Err(invalid(key, format!("expected numbers, found {other:?}"))),
        }
    }

    pub fn as_str(&self, key: &str) -> Result<&str, ChainError> {
        match self {
            ParameterValue::Text(s) => Ok(s),
            other => Err(invalid(key, format!("expected text, found {other:?}"))),
        }
    }

    pub fn as_bool(&self, key: &str) -> Result<bool, ChainError> {
        match self {
            ParameterValue::Bool(b) => Ok(*b),
            ParameterValue::Integer(v) => Ok(*v != 0),
            other => Err(invalid(key, format!("expected a flag, found {other:?}"))),
        }
    }
}

pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> ChainError {
    ChainError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Read access to a chain archive.
///
/// Every lookup of a path that does not exist fails with [`ChainError::Key`].
pub trait ChainArchive {
    fn has_parameter_group(&self) -> bool;

    fn version(&self) -> ChainVersion {
        if self.has_parameter_group() {
            ChainVersion::Current
        } else {
            ChainVersion::Old
        }
    }

    /// Component names in archive order.
    fn list_components(&self) -> Result<Vec<String>, ChainError>;

    fn get_parameter(&self, component: &str, field: &str) -> Result<ParameterValue, ChainError>;

    /// Sample identifiers in ascending order.
    fn list_samples(&self) -> Result<Vec<String>, ChainError>;

    /// Sample data with shape `(channels, values)`.
    fn get_sample_item(
        &self,
        sample: &str,
        component: &str,
        item: &str,
    ) -> Result<Array2<f64>, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_value_json() {
        let values: Vec<ParameterValue> =
            serde_json::from_str(r#"[true, 64, 30.0e9, "uK_RJ", [1.0, 2.0]]"#).unwrap();
        assert_eq!(values[0], ParameterValue::Bool(true));
        assert_eq!(values[1], ParameterValue::Integer(64));
        assert_eq!(values[2].as_f64("nu_ref").unwrap(), 30.0e9);
        assert_eq!(values[3].as_str("unit").unwrap(), "uK_RJ");
        assert_eq!(values[4].as_values("nu_ref").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_parameter_value_type_errors() {
        let text = ParameterValue::Text("none".into());
        assert!(matches!(
            text.as_f64("fwhm"),
            Err(ChainError::InvalidValue { key, .. }) if key == "fwhm"
        ));
        assert!(ParameterValue::Float(1.0).as_str("unit").is_err());
        assert!(ParameterValue::Integer(1).as_bool("polarization").unwrap());
    }
}
