//! Per-function rate limit rules.
//!
//! Each edge function may override the default policy:
//!
//! ```yaml
//! default:
//!   window_ms: 60000
//!   max_requests: 20
//! functions:
//!   submit-lead:
//!     window_ms: 3600000
//!     max_requests: 5
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::policy::Policy;
use crate::error::{BouncerError, Result};

/// Policies indexed by edge function name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Policy for functions without an override
    #[serde(default)]
    pub default: Policy,
    /// Map of function name to its policy
    #[serde(default)]
    pub functions: HashMap<String, Policy>,
}

impl RuleSet {
    /// Create a rule set that applies the default policy everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| BouncerError::Config(format!("Failed to parse rate limit rules: {}", e)))
    }

    /// Set the policy for one function.
    pub fn with_function(mut self, function: impl Into<String>, policy: Policy) -> Self {
        self.functions.insert(function.into(), policy);
        self
    }

    /// Policy that applies to `function`.
    pub fn policy_for(&self, function: &str) -> Policy {
        self.functions.get(function).copied().unwrap_or(self.default)
    }
}
