use serde::{Deserialize, Serialize};

use crate::types::EngineError;

/// Part-module preferences, resolved once per workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartSettings {
    /// Always bake transforms into new geometry when resolving sub-shapes.
    pub copy_sub_shape: bool,
    /// Distance below which two points are the same.
    pub confusion_tolerance: f64,
    /// Fuzzy tolerance handed to boolean kernels.
    pub boolean_tolerance: f64,
}

impl Default for PartSettings {
    fn default() -> Self {
        Self {
            copy_sub_shape: false,
            confusion_tolerance: 1e-7,
            boolean_tolerance: 0.05,
        }
    }
}

impl PartSettings {
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(|e| EngineError::InvalidSettings {
            reason: e.to_string(),
        })
    }
}
