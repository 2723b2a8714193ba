// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scene configuration
//!
//! Every field has a default, so partial JSON documents are accepted:
//!
//! ```
//! use ember::SceneConfig;
//!
//! let config = SceneConfig::from_json_str(r#"{ "max_delta_seconds": 0.1 }"#).unwrap();
//! assert_eq!(config.max_delta_seconds, Some(0.1));
//! assert_eq!(config.name, "scene");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Largest accepted `diagnostics_window`
pub const MAX_DIAGNOSTICS_WINDOW: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Label attached to log events and profiling spans
    pub name: String,

    /// Upper bound applied to the delta passed to `run_update_cycle`
    pub max_delta_seconds: Option<f64>,

    /// Number of frame times kept by the scene diagnostics
    pub diagnostics_window: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: "scene".to_string(),
            max_delta_seconds: None,
            diagnostics_window: 60,
        }
    }
}

impl SceneConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(EmberError::serialization)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(max) = self.max_delta_seconds {
            if !max.is_finite() || max <= 0.0 {
                return Err(EmberError::InvalidConfig(format!(
                    "max_delta_seconds must be positive and finite, got {max}"
                )));
            }
        }
        if self.diagnostics_window == 0 || self.diagnostics_window > MAX_DIAGNOSTICS_WINDOW {
            return Err(EmberError::InvalidConfig(format!(
                "diagnostics_window must be between 1 and {MAX_DIAGNOSTICS_WINDOW}, got {}",
                self.diagnostics_window
            )));
        }
        Ok(())
    }

    /// Apply the configured clamp. Negative or NaN deltas become zero.
    pub fn clamp_delta(&self, delta_seconds: f64) -> f64 {
        let delta = if delta_seconds.is_nan() {
            0.0
        } else {
            delta_seconds.max(0.0)
        };
        match self.max_delta_seconds {
            Some(max) => delta.min(max),
            None => delta,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_max_delta_seconds(mut self, max: f64) -> Self {
        self.max_delta_seconds = Some(max);
        self
    }
}
