//! Analyzer configuration.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::pattern::PatternType;

/// Settings for the emergence detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergenceConfig {
    /// Time between background ticks.
    pub sampling_interval_ms: u64,
    /// Snapshots kept in the sliding window.
    pub window_size: usize,
    /// Patterns below this confidence are dropped.
    pub min_confidence: f64,
    /// Size of the rolling pattern buffer.
    pub max_patterns: usize,
    pub enabled: BTreeSet<PatternType>,
}

impl Default for EmergenceConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 1000,
            window_size: 50,
            min_confidence: 0.6,
            max_patterns: 100,
            enabled: PatternType::ALL.into_iter().collect(),
        }
    }
}

impl EmergenceConfig {
    /// Checks that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.sampling_interval_ms == 0 {
            return Err(AnalysisError::InvalidConfig(
                "sampling_interval_ms must be positive".into(),
            ));
        }
        if self.window_size < 2 {
            return Err(AnalysisError::InvalidConfig(
                "window_size must be at least 2".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_confidence {} is outside [0, 1]",
                self.min_confidence
            )));
        }
        if self.max_patterns == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_patterns must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Only the given pattern types.
    pub fn only<I: IntoIterator<Item = PatternType>>(mut self, types: I) -> Self {
        self.enabled = types.into_iter().collect();
        self
    }

    pub fn is_enabled(&self, pattern_type: PatternType) -> bool {
        self.enabled.contains(&pattern_type)
    }
}

/// Settings for entropy anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Relative deviation from the baseline that counts as an anomaly.
    pub relative_threshold: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            relative_threshold: 0.5,
        }
    }
}

impl AnomalyConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.relative_threshold.is_finite() || self.relative_threshold <= 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "relative_threshold {} must be a positive number",
                self.relative_threshold
            )));
        }
        Ok(())
    }
}
