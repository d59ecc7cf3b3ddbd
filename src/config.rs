use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::registry::{MAX_WINDOW, MIN_WINDOW};
use crate::types::MarketSpec;
use crate::DEFAULT_APP_ID;

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Smallest stake the venue accepts per contract, in account currency.
pub const MIN_STAKE: f64 = 0.35;

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub account: AccountConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Markets to subscribe to. Defaults to the ten volatility indices.
    #[serde(default = "default_markets")]
    pub markets: Vec<MarketSpec>,
}

/// Account credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Venue API token (from the account dashboard).
    pub api_token: String,
    /// Registered application id.
    #[serde(default = "default_app_id")]
    pub app_id: u32,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Rolling-window capacity for digit statistics (10-5000).
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Minimum consecutive 0/1 digits before a break counts as a pattern.
    #[serde(default = "default_min_streak")]
    pub min_streak_length: usize,
    /// Starting points balance for the scoring (paper) strategy.
    #[serde(default = "default_points")]
    pub starting_points: i64,
    /// Stake per live contract, in account currency.
    #[serde(default = "default_stake")]
    pub stake: f64,
    /// Whether restarting the strategy on a symbol clears the pattern count.
    #[serde(default = "default_reset_count")]
    pub reset_pattern_count_on_switch: bool,
}

fn default_app_id() -> u32 {
    DEFAULT_APP_ID
}

fn default_window_size() -> usize {
    crate::stats::DEFAULT_WINDOW
}

fn default_min_streak() -> usize {
    crate::engine::DEFAULT_MIN_LENGTH
}

fn default_points() -> i64 {
    100
}

fn default_stake() -> f64 {
    0.5
}

fn default_reset_count() -> bool {
    true
}

fn market(name: &str, symbol: &str) -> MarketSpec {
    MarketSpec {
        name: name.to_string(),
        symbol: symbol.to_string(),
        decimals: None,
    }
}

fn default_markets() -> Vec<MarketSpec> {
    vec![
        market("Volatility 10 Index", "R_10"),
        market("Volatility 25 Index", "R_25"),
        market("Volatility 50 Index", "R_50"),
        market("Volatility 75 Index", "R_75"),
        market("Volatility 100 Index", "R_100"),
        market("Volatility 10 (1s) Index", "R_10_1HZ"),
        market("Volatility 25 (1s) Index", "R_25_1HZ"),
        market("Volatility 50 (1s) Index", "R_50_1HZ"),
        market("Volatility 75 (1s) Index", "R_75_1HZ"),
        market("Volatility 100 (1s) Index", "R_100_1HZ"),
    ]
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_streak_length: default_min_streak(),
            starting_points: default_points(),
            stake: default_stake(),
            reset_pattern_count_on_switch: default_reset_count(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.settings;
        if !(MIN_WINDOW..=MAX_WINDOW).contains(&s.window_size) {
            anyhow::bail!(
                "window_size must be between {MIN_WINDOW} and {MAX_WINDOW}, got {}",
                s.window_size
            );
        }
        if s.min_streak_length < 1 {
            anyhow::bail!("min_streak_length must be at least 1");
        }
        if s.stake < MIN_STAKE {
            anyhow::bail!("stake must be at least {MIN_STAKE}, got {}", s.stake);
        }
        for m in &self.markets {
            if let Some(d) = m.decimals {
                if d < 0 {
                    anyhow::bail!("market {} has negative decimals {d}", m.symbol);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [account]
            api_token = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(config.account.app_id, DEFAULT_APP_ID);
        assert_eq!(config.settings.window_size, 1000);
        assert_eq!(config.settings.min_streak_length, 2);
        assert_eq!(config.markets.len(), 10);
        config.validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let mut config: AppConfig = toml::from_str(
            r#"
            [account]
            api_token = "abc123"
            "#,
        )
        .unwrap();
        config.settings.window_size = 5;
        assert!(config.validate().is_err());

        config.settings.window_size = 1000;
        config.settings.stake = 0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_market_decimals_survive() {
        let config: AppConfig = toml::from_str(
            r#"
            [account]
            api_token = "abc123"

            [[markets]]
            name = "Volatility 100 Index"
            symbol = "R_100"
            decimals = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.markets.len(), 1);
        assert_eq!(config.markets[0].decimals, Some(2));
    }
}
