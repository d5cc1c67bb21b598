// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validator configuration
//!
//! Loaded from TOML or from the `LOCKSTEP_DIAGNOSTICS` environment flag.

use crate::error::CoordinationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the diagnostic-mode flag
pub const DIAGNOSTICS_ENV: &str = "LOCKSTEP_DIAGNOSTICS";

/// Validator configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Diagnostic mode: run the validator at all
    pub enabled: bool,
    /// Surface violations to the offending call as an error
    pub fail_fast: bool,
    /// Emit a warning log per violation
    pub log_violations: bool,
    /// Reports retained before the oldest are dropped
    pub max_reports: usize,
    /// Events retained per task-group timeline
    pub timeline_capacity: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            fail_fast: true,
            log_violations: true,
            max_reports: 256,
            timeline_capacity: 64,
        }
    }
}

impl ValidatorConfig {
    /// Default configuration with diagnostic mode switched on
    pub fn diagnostic() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_log_violations(mut self, log: bool) -> Self {
        self.log_violations = log;
        self
    }

    pub fn with_max_reports(mut self, max: usize) -> Self {
        self.max_reports = max;
        self
    }

    pub fn with_timeline_capacity(mut self, capacity: usize) -> Self {
        self.timeline_capacity = capacity;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, CoordinationError> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoordinationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoordinationError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoordinationError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Defaults, with `enabled` taken from `LOCKSTEP_DIAGNOSTICS`
    pub fn from_env() -> Self {
        let enabled = std::env::var(DIAGNOSTICS_ENV)
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), CoordinationError> {
        if self.max_reports == 0 {
            return Err(CoordinationError::Config("max_reports must be at least 1".into()));
        }
        if self.timeline_capacity < 2 {
            return Err(CoordinationError::Config(
                "timeline_capacity must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
