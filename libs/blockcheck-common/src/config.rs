// Verifier configuration: execution limits, tunable per algorithm family
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::AlgorithmFamily;

pub const CONFIG_ENV_VAR: &str = "BLOCKCHECK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/verifier.json";

/// Bounds applied to a single sandboxed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionLimits {
    pub timeout_ms: u64,
    /// Movement-style capability calls allowed before the run is aborted
    pub max_call_count: u64,
    pub loop_iteration_limit: u64,
    pub recursion_limit: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_call_count: 5_000,
            loop_iteration_limit: 10_000_000,
            recursion_limit: 2_048,
        }
    }
}

/// Partial limits layered over the defaults for one family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LimitOverrides {
    pub timeout_ms: Option<u64>,
    pub max_call_count: Option<u64>,
    pub loop_iteration_limit: Option<u64>,
    pub recursion_limit: Option<usize>,
}

impl LimitOverrides {
    fn apply(&self, base: ExecutionLimits) -> ExecutionLimits {
        ExecutionLimits {
            timeout_ms: self.timeout_ms.unwrap_or(base.timeout_ms),
            max_call_count: self.max_call_count.unwrap_or(base.max_call_count),
            loop_iteration_limit: self.loop_iteration_limit.unwrap_or(base.loop_iteration_limit),
            recursion_limit: self.recursion_limit.unwrap_or(base.recursion_limit),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifierConfig {
    pub default_limits: ExecutionLimits,
    /// Timeout used when the primary case has to be re-executed
    pub primary_timeout_ms: u64,
    pub families: HashMap<AlgorithmFamily, LimitOverrides>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        // Backtracking families legitimately make far more primitive calls
        let backtracking = LimitOverrides {
            max_call_count: Some(200_000),
            ..Default::default()
        };
        let mut families = HashMap::new();
        families.insert(AlgorithmFamily::NQueens, backtracking);
        families.insert(AlgorithmFamily::RopePartition, backtracking);

        Self {
            default_limits: ExecutionLimits::default(),
            primary_timeout_ms: 60_000,
            families,
        }
    }
}

impl VerifierConfig {
    /// Load configuration from a JSON file
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Verifier config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: VerifierConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;
        debug!(path = %config_path.display(), "Loaded verifier config");
        Ok(config)
    }

    /// Load from `$BLOCKCHECK_CONFIG` or `config/verifier.json`, falling back to built-in defaults
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            info!(path = %path.display(), "No verifier config file, using built-in defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    fn validate(&self) -> Result<()> {
        if self.default_limits.timeout_ms == 0 {
            bail!("defaultLimits.timeoutMs must be greater than zero");
        }
        if self.default_limits.max_call_count == 0 {
            bail!("defaultLimits.maxCallCount must be greater than zero");
        }
        for (family, overrides) in &self.families {
            if overrides.timeout_ms == Some(0) || overrides.max_call_count == Some(0) {
                bail!("Limits for family '{}' must be greater than zero", family);
            }
        }
        Ok(())
    }

    /// Effective limits for a family; primary re-executions get the longer timeout
    pub fn limits_for(&self, family: AlgorithmFamily, primary: bool) -> ExecutionLimits {
        let mut limits = match self.families.get(&family) {
            Some(overrides) => overrides.apply(self.default_limits),
            None => self.default_limits,
        };
        if primary {
            limits.timeout_ms = limits.timeout_ms.max(self.primary_timeout_ms);
        }
        limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_limits_per_family() {
        let config = VerifierConfig::default();
        let graph = config.limits_for(AlgorithmFamily::Graph, false);
        let queens = config.limits_for(AlgorithmFamily::NQueens, false);

        assert_eq!(graph.max_call_count, 5_000);
        assert_eq!(graph.timeout_ms, 10_000);
        assert_eq!(queens.max_call_count, 200_000);
        assert_eq!(queens.timeout_ms, 10_000);
    }

    #[test]
    fn test_primary_gets_longer_timeout() {
        let config = VerifierConfig::default();
        assert_eq!(config.limits_for(AlgorithmFamily::Knapsack, true).timeout_ms, 60_000);
    }

    #[test]
    fn test_load_partial_file() {
        let path = std::env::temp_dir().join(format!("blockcheck-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"defaultLimits": {{"timeoutMs": 2000}}, "families": {{"coinChange": {{"maxCallCount": 42}}}}}}"#
        )
        .unwrap();

        let config = VerifierConfig::load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.default_limits.timeout_ms, 2000);
        assert_eq!(config.default_limits.max_call_count, 5_000);
        assert_eq!(config.limits_for(AlgorithmFamily::CoinChange, false).max_call_count, 42);
        // A file that names families replaces the built-in family table
        assert_eq!(config.limits_for(AlgorithmFamily::NQueens, false).max_call_count, 5_000);
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let path = std::env::temp_dir().join(format!("blockcheck-zero-{}.json", std::process::id()));
        fs::write(&path, r#"{"defaultLimits": {"timeoutMs": 0}}"#).unwrap();
        let result = VerifierConfig::load(&path);
        fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(VerifierConfig::load(Path::new("/definitely/not/here.json")).is_err());
    }
}
