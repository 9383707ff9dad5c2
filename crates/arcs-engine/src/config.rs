use std::fs;
use std::path::Path;

use arcs_cluster::ClusterOpts;
use arcs_core::{ArcsError, ErrorInfo, RetryPolicy};
use arcs_group::OptimizerConfig;
use serde::{Deserialize, Serialize};

/// Immutable configuration handed to the engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Clusterer options.
    #[serde(default)]
    pub cluster: ClusterOpts,
    /// Optimizer parameters.
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Store retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Minimum analyzed percentage for recommendation and grouping.
    #[serde(default = "default_threshold_percent")]
    pub coverage_threshold_percent: u32,
}

fn default_threshold_percent() -> u32 {
    80
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster: ClusterOpts::default(),
            optimizer: OptimizerConfig::default(),
            retry: RetryPolicy::default(),
            coverage_threshold_percent: default_threshold_percent(),
        }
    }
}

impl EngineConfig {
    /// Parses a YAML document; missing fields take their defaults.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ArcsError> {
        let config: Self = serde_yaml::from_str(contents).map_err(|err| {
            ArcsError::Config(ErrorInfo::new("engine-config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    pub fn load(path: &Path) -> Result<Self, ArcsError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            ArcsError::Config(
                ErrorInfo::new("engine-config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ArcsError> {
        if self.coverage_threshold_percent > 100 {
            return Err(ArcsError::Config(
                ErrorInfo::new("coverage-threshold", "threshold must lie in 0..=100").with_context(
                    "coverage_threshold_percent",
                    self.coverage_threshold_percent.to_string(),
                ),
            ));
        }
        if self.cluster.k != 3 {
            return Err(ArcsError::Config(
                ErrorInfo::new("cluster-k", "motivation labelling needs exactly 3 clusters")
                    .with_context("k", self.cluster.k.to_string()),
            ));
        }
        self.optimizer.validate()
    }
}
