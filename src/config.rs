//! Configuration loading from TOML files.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::domain::OddsParams;
use crate::error::{ConfigError, Result};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub odds: OddsConfig,
    pub sweep: SweepConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

/// Odds tuning knobs.
///
/// Stored as floats in TOML; converted to exact decimals once at startup.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    pub max_odds: f64,
    pub epsilon: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub interval_secs: u64,
}

/// Endpoints of the external point ledger and user directory.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Config {
    /// Load and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url",
            }
            .into());
        }
        if self.odds.max_odds < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "odds.max_odds",
                reason: format!("must be at least 1.0, got {}", self.odds.max_odds),
            }
            .into());
        }
        if self.odds.epsilon < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "odds.epsilon",
                reason: format!("must not be negative, got {}", self.odds.epsilon),
            }
            .into());
        }
        if self.sweep.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sweep.interval_secs",
                reason: "must be positive".into(),
            }
            .into());
        }
        if self.ledger.base_url.is_empty() {
            return Err(ConfigError::MissingField {
                field: "ledger.base_url",
            }
            .into());
        }
        Ok(())
    }

    /// Odds parameters as exact decimals.
    pub fn odds_params(&self) -> Result<OddsParams> {
        let max_odds = Decimal::try_from(self.odds.max_odds).map_err(|e| {
            ConfigError::InvalidValue {
                field: "odds.max_odds",
                reason: e.to_string(),
            }
        })?;
        let epsilon =
            Decimal::try_from(self.odds.epsilon).map_err(|e| ConfigError::InvalidValue {
                field: "odds.epsilon",
                reason: e.to_string(),
            })?;
        Ok(OddsParams { max_odds, epsilon })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "parimut.db".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            max_odds: 10.0,
            epsilon: 1.0,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".into(),
            timeout_secs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_match_production_constants() {
        let config = Config::default();
        let params = config.odds_params().unwrap();
        assert_eq!(params.max_odds, dec!(10.0));
        assert_eq!(params.epsilon, dec!(1.0));
        assert_eq!(config.sweep.interval_secs, 60);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [odds]
            max_odds = 5.0
            "#,
        )
        .unwrap();
        assert_eq!(config.odds.max_odds, 5.0);
        assert_eq!(config.odds.epsilon, 1.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn validate_rejects_sub_unit_max_odds() {
        let config: Config = toml::from_str(
            r#"
            [odds]
            max_odds = 0.5
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_sweep_interval() {
        let config: Config = toml::from_str(
            r#"
            [sweep]
            interval_secs = 0
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
