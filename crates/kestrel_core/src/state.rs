//! Persisted Parameter State
//!
//! The host stores an opaque blob for us; inside it is a small JSON document
//! mapping parameter ids to raw values. Only the parameter storage is
//! persisted: everything else is rebuilt from settings + sample rate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::params::{EqParameters, ParameterId};

/// Current blob layout version
pub const STATE_VERSION: u32 = 1;

fn default_version() -> u32 {
    STATE_VERSION
}

/// Serializable image of [`EqParameters`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Keyed by [`ParameterId::id`]; missing keys keep their current value
    #[serde(default)]
    pub parameters: BTreeMap<String, f32>,
}

impl ParameterState {
    pub fn capture(params: &EqParameters) -> Self {
        Self {
            version: STATE_VERSION,
            parameters: ParameterId::ALL
                .iter()
                .map(|&id| (id.id().to_string(), params.get(id)))
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> EngineResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> EngineResult<Self> {
        if data.is_empty() {
            return Err(EngineError::InvalidState("empty blob".into()));
        }
        let state: Self = serde_json::from_slice(data)?;
        if state.version == 0 || state.version > STATE_VERSION {
            return Err(EngineError::InvalidState(format!(
                "unsupported version {}",
                state.version
            )));
        }
        Ok(state)
    }

    /// Write every known key into `params`; returns how many were applied
    pub fn apply_to(&self, params: &EqParameters) -> usize {
        let mut applied = 0;
        for (key, &value) in &self.parameters {
            match ParameterId::from_id(key) {
                Some(id) => {
                    params.set(id, value);
                    applied += 1;
                }
                None => debug!("Ignoring unknown parameter '{}' in saved state", key),
            }
        }
        applied
    }
}

impl EqParameters {
    /// Serialize the current values into an opaque blob
    pub fn save_state(&self) -> EngineResult<Vec<u8>> {
        ParameterState::capture(self).to_bytes()
    }

    /// Replace values from a blob
    ///
    /// On any error the current values are left untouched.
    pub fn restore_state(&self, data: &[u8]) -> EngineResult<()> {
        let state = ParameterState::from_bytes(data)?;
        let applied = state.apply_to(self);
        info!("Restored {} parameters from saved state", applied);
        Ok(())
    }

    /// Build storage from a blob handed over at startup
    ///
    /// An empty or unreadable blob falls back to the default settings.
    pub fn from_state(data: &[u8]) -> Self {
        let params = Self::new();
        if let Err(e) = params.restore_state(data) {
            warn!("Using default parameters: {}", e);
            params.reset_to_defaults();
        }
        params
    }
}
