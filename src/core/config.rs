//! Asset manager configuration

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::{DataError, FailurePolicy};

/// Asset manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Whether failed resources count toward completion
    pub failure_policy: FailurePolicy,
    /// Percent step between info-level progress logs (0 disables)
    pub progress_log_step: f32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::CountAsSettled,
            progress_log_step: 25.0,
        }
    }
}

impl ManagerConfig {
    /// Set the failure policy
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the progress log step
    #[must_use]
    pub fn with_progress_log_step(mut self, step: f32) -> Self {
        self.progress_log_step = step.max(0.0);
        self
    }

    /// Parse a config from a RON string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid config
    pub fn from_ron_str(content: &str) -> Result<Self, DataError> {
        ron::from_str(content).map_err(|e| DataError::DeserializeError(e.to_string()))
    }

    /// Load a config from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_ron(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let content = fs::read_to_string(path).map_err(|e| DataError::IoError(e.to_string()))?;
        Self::from_ron_str(&content)
    }

    /// Load a config from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or deserialization fails
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let content = fs::read_to_string(path).map_err(|e| DataError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| DataError::DeserializeError(e.to_string()))
    }
}
