//! In-memory chain archive with a JSON file representation.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::samples::sample_id;
use super::{ChainArchive, ChainError, ParameterValue};

type ParameterGroup = BTreeMap<String, BTreeMap<String, ParameterValue>>;
type SampleGroup = BTreeMap<String, BTreeMap<String, Array2<f64>>>;

/// A fully loaded archive.
///
/// Components are listed in insertion order. Samples are keyed by their
/// zero-padded identifiers, so lexical order is numeric order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryChain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<ParameterGroup>,
    #[serde(default)]
    component_order: Vec<String>,
    #[serde(default)]
    samples: BTreeMap<String, SampleGroup>,
}

impl Default for MemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChain {
    /// An empty archive in the current layout.
    pub fn new() -> Self {
        Self {
            parameters: Some(ParameterGroup::new()),
            component_order: Vec::new(),
            samples: BTreeMap::new(),
        }
    }

    /// An empty archive in the old layout, without a parameter group.
    pub fn without_parameter_group() -> Self {
        Self {
            parameters: None,
            ..Self::new()
        }
    }

    fn register(&mut self, component: &str) {
        if !self.component_order.iter().any(|c| c == component) {
            self.component_order.push(component.to_string());
        }
    }

    /// Sets a static field. Creates the parameter group if missing.
    pub fn set_parameter(&mut self, component: &str, field: &str, value: ParameterValue) {
        self.register(component);
        self.parameters
            .get_or_insert_with(ParameterGroup::new)
            .entry(component.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    pub fn set_sample_item(&mut self, sample: usize, component: &str, item: &str, data: Array2<f64>) {
        self.register(component);
        self.samples
            .entry(sample_id(sample))
            .or_default()
            .entry(component.to_string())
            .or_default()
            .insert(item.to_string(), data);
    }

    pub fn with_parameter(mut self, component: &str, field: &str, value: ParameterValue) -> Self {
        self.set_parameter(component, field, value);
        self
    }

    pub fn with_sample_item(
        mut self,
        sample: usize,
        component: &str,
        item: &str,
        data: Array2<f64>,
    ) -> Self {
        self.set_sample_item(sample, component, item, data);
        self
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ChainError> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ChainError> {
        let json = std::fs::read_to_string(path)?;
        let chain: MemoryChain = serde_json::from_str(&json)?;
        debug!(
            "loaded chain {} with {} samples",
            path.display(),
            chain.samples.len()
        );
        Ok(chain)
    }
}

impl ChainArchive for MemoryChain {
    fn has_parameter_group(&self) -> bool {
        self.parameters.is_some()
    }

    fn list_components(&self) -> Result<Vec<String>, ChainError> {
        let parameters = self
            .parameters
            .as_ref()
            .ok_or_else(|| ChainError::Key("parameters".into()))?;
        Ok(self
            .component_order
            .iter()
            .filter(|c| parameters.contains_key(*c))
            .cloned()
            .collect())
    }

    fn get_parameter(&self, component: &str, field: &str) -> Result<ParameterValue, ChainError> {
        self.parameters
            .as_ref()
            .and_then(|group| group.get(component))
            .and_then(|fields| fields.get(field))
            .cloned()
            .ok_or_else(|| ChainError::Key(format!("parameters/{component}/{field}")))
    }

    fn list_samples(&self) -> Result<Vec<String>, ChainError> {
        Ok(self.samples.keys().cloned().collect())
    }

    fn get_sample_item(
        &self,
        sample: &str,
        component: &str,
        item: &str,
    ) -> Result<Array2<f64>, ChainError> {
        self.samples
            .get(sample)
            .and_then(|components| components.get(component))
            .and_then(|items| items.get(item))
            .cloned()
            .ok_or_else(|| ChainError::Key(format!("{sample}/{component}/{item}")))
    }
}
