//! JSON run configuration for refinement.

use crate::{ChunkConfig, Mask, RefineIoError, RefineParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fs, path::Path};

fn default_method() -> String {
    "minimize".to_string()
}

fn default_rtol() -> f64 {
    1e-4
}

fn default_energy() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}

/// Refinement parameters as stored on disk. Masks are not part of the file;
/// they are attached when building [`RefineParams`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineConfig {
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub method_kwargs: Value,
    /// Beam energy in keV.
    #[serde(default = "default_energy")]
    pub energy: f64,
    #[serde(default)]
    pub trust_region: Option<Vec<f64>>,
    #[serde(default)]
    pub initial_step: Option<Vec<f64>>,
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    #[serde(default)]
    pub maxeval: Option<usize>,
    #[serde(default = "default_true")]
    pub compute: bool,
    #[serde(default)]
    pub rechunk: bool,
    #[serde(default)]
    pub chunk: ChunkConfig,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            method_kwargs: Value::Null,
            energy: default_energy(),
            trust_region: None,
            initial_step: None,
            rtol: default_rtol(),
            maxeval: None,
            compute: true,
            rechunk: false,
            chunk: ChunkConfig::default(),
        }
    }
}

impl RefineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, RefineIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), RefineIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Refinement parameters with optional masks.
    pub fn build_params(&self, signal_mask: Option<Mask>, navigation_mask: Option<Mask>) -> RefineParams {
        RefineParams {
            method: self.method.clone(),
            method_kwargs: self.method_kwargs.clone(),
            trust_region: self.trust_region.clone(),
            initial_step: self.initial_step.clone(),
            rtol: self.rtol,
            maxeval: self.maxeval,
            signal_mask,
            navigation_mask,
            compute: self.compute,
            rechunk: self.rechunk,
            chunk: self.chunk,
        }
    }
}
