//! Configuration management for the Sierpinski ledger

use crate::error::{LedgerError, Result};
use crate::fractal::{FractalAddressing, DEFAULT_BRANCHING_FACTOR, DEFAULT_MAX_DEPTH};
use crate::onboarding::OnboardingPolicy;
use crate::transaction::amount_from_f64;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sierpinski.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fractal: FractalConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_keystore_file")]
    pub keystore_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            keystore_file: default_keystore_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FractalConfig {
    #[serde(default = "default_branching_factor")]
    pub branching_factor: u8,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

impl Default for FractalConfig {
    fn default() -> Self {
        Self {
            branching_factor: default_branching_factor(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingConfig {
    #[serde(default = "default_founder_supply")]
    pub founder_supply: f64,
    #[serde(default = "default_initial_allocation")]
    pub initial_allocation: f64,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            founder_supply: default_founder_supply(),
            initial_allocation: default_initial_allocation(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from("ledger_state.json")
}

fn default_keystore_file() -> PathBuf {
    PathBuf::from("wallet_keys.json")
}

fn default_branching_factor() -> u8 {
    DEFAULT_BRANCHING_FACTOR
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_founder_supply() -> f64 {
    1_000_000.0
}

fn default_initial_allocation() -> f64 {
    100.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: Config = toml::from_str(source)
            .map_err(|e| LedgerError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.addressing()?;
        self.onboarding_policy()?;
        self.log_level()?;
        if self.storage.state_file.as_os_str().is_empty() {
            return Err(LedgerError::Config("storage.state_file must be set".to_string()));
        }
        if self.storage.keystore_file.as_os_str().is_empty() {
            return Err(LedgerError::Config("storage.keystore_file must be set".to_string()));
        }
        Ok(())
    }

    pub fn addressing(&self) -> Result<FractalAddressing> {
        FractalAddressing::new(self.fractal.branching_factor, self.fractal.max_depth)
            .map_err(|e| LedgerError::Config(format!("[fractal] {}", e)))
    }

    pub fn onboarding_policy(&self) -> Result<OnboardingPolicy> {
        let founder_supply = amount_from_f64(self.onboarding.founder_supply)
            .map_err(|e| LedgerError::Config(format!("onboarding.founder_supply: {}", e)))?;
        let initial_allocation = amount_from_f64(self.onboarding.initial_allocation)
            .map_err(|e| LedgerError::Config(format!("onboarding.initial_allocation: {}", e)))?;
        if initial_allocation > founder_supply {
            return Err(LedgerError::Config(
                "onboarding.initial_allocation cannot exceed onboarding.founder_supply".to_string(),
            ));
        }
        Ok(OnboardingPolicy {
            founder_supply,
            initial_allocation,
        })
    }

    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .parse()
            .map_err(|_| LedgerError::Config(format!("unknown log level '{}'", self.logging.level)))
    }
}

/// Loads `path`, or `sierpinski.toml` in the working directory when no path
/// is given. A missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if !path.exists() {
        return Ok(Config::default());
    }
    let source = fs::read_to_string(path)
        .map_err(|e| LedgerError::Config(format!("failed to read {}: {}", path.display(), e)))?;
    Config::from_toml(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Amount;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.addressing().unwrap(), FractalAddressing::default());
        assert_eq!(config.onboarding_policy().unwrap(), OnboardingPolicy::default());
        assert_eq!(config.log_level().unwrap(), tracing::Level::INFO);
        assert_eq!(config.storage.state_file, PathBuf::from("ledger_state.json"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [fractal]
            branching_factor = 4

            [onboarding]
            initial_allocation = 25.5
            "#,
        )
        .unwrap();
        assert_eq!(config.fractal.branching_factor, 4);
        assert_eq!(config.fractal.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(
            config.onboarding_policy().unwrap().initial_allocation,
            Amount::from_num(25.5)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        for source in [
            "[fractal]\nbranching_factor = 1",
            "[fractal]\nmax_depth = 0",
            "[onboarding]\nfounder_supply = -5.0",
            "[onboarding]\nfounder_supply = 10.0\ninitial_allocation = 20.0",
            "[logging]\nlevel = \"loud\"",
            "[network]\nport = 1",
        ] {
            assert!(
                matches!(Config::from_toml(source), Err(LedgerError::Config(_))),
                "accepted: {}",
                source
            );
        }
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(load_config(Some(&missing)).unwrap().fractal.branching_factor, 3);

        let path = dir.path().join("sierpinski.toml");
        fs::write(&path, "[storage]\nstate_file = \"custom.json\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.storage.state_file, PathBuf::from("custom.json"));
    }
}
