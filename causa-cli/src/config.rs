//! CLI configuration (`causa.toml`).
//!
//! ```toml
//! [emergence]
//! window_size = 30
//! min_confidence = 0.7
//! enabled = ["synchronization", "cascade"]
//!
//! [anomaly]
//! relative_threshold = 0.25
//!
//! [replay]
//! bucket_ms = 500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use causa_analysis::{AnomalyConfig, EmergenceConfig};

/// Replay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Width of one replay tick in milliseconds of recorded time.
    pub bucket_ms: u64,
    /// Most ticks a single replay may take.
    pub max_ticks: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            bucket_ms: 1000,
            max_ticks: 100_000,
        }
    }
}

/// Everything `causa.toml` can set. Missing sections use defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub emergence: EmergenceConfig,
    pub anomaly: AnomalyConfig,
    pub replay: ReplayConfig,
}

impl CliConfig {
    /// Reads and validates `path`, or returns defaults when no path is given.
    pub async fn load(path: Option<&Path>) -> Result<Self, String> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let config: CliConfig = toml::from_str(text).map_err(|e| e.to_string())?;
        config.emergence.validate().map_err(|e| e.to_string())?;
        config.anomaly.validate().map_err(|e| e.to_string())?;
        if config.replay.bucket_ms == 0 {
            return Err("replay.bucket_ms must be positive".to_string());
        }
        Ok(config)
    }
}
