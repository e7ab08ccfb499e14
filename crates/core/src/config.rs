//! Bot tunables.
//!
//! Secrets (keys, RPC endpoint, contract address) come from the environment
//! and are handled by the binary. Everything else lives here, loaded from
//! the TOML file named by `BOT_CONFIG`, with per-field defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use liquidator_api::{SubgraphConfig, DEFAULT_SUBGRAPH_URL};
use liquidator_chain::{
    GasSettings, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE_GWEI, DEFAULT_RELAY_URL, POLYGON_CHAIN_ID,
};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "BOT_CONFIG";
const SUBGRAPH_URL_ENV: &str = "SUBGRAPH_URL";
const RELAY_URL_ENV: &str = "RELAY_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Position feed (subgraph) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_subgraph_url")]
    pub url: String,

    /// Health factor below which a position is eligible
    #[serde(default = "default_hf_threshold")]
    pub health_factor_threshold: String,

    /// Optional `first:` page size; indexer default when absent
    #[serde(default)]
    pub page_size: Option<u32>,

    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
}

fn default_subgraph_url() -> String {
    DEFAULT_SUBGRAPH_URL.to_string()
}
fn default_hf_threshold() -> String {
    "1".to_string()
}
fn default_feed_timeout() -> u64 {
    10
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_subgraph_url(),
            health_factor_threshold: default_hf_threshold(),
            page_size: None,
            timeout_secs: default_feed_timeout(),
        }
    }
}

/// Transaction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,

    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,

    #[serde(default = "default_gas_price_gwei")]
    pub gas_price_gwei: f64,

    /// Bound on head block and nonce reads
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

fn default_chain_id() -> u64 {
    POLYGON_CHAIN_ID
}
fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}
fn default_gas_price_gwei() -> f64 {
    DEFAULT_GAS_PRICE_GWEI
}
fn default_rpc_timeout() -> u64 {
    10
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            gas_limit: default_gas_limit(),
            gas_price_gwei: default_gas_price_gwei(),
            rpc_timeout_secs: default_rpc_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub url: String,

    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
}

fn default_relay_url() -> String {
    DEFAULT_RELAY_URL.to_string()
}
fn default_relay_timeout() -> u64 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: default_relay_url(),
            timeout_secs: default_relay_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_interval() -> u64 {
    15
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("logs/liquidations.json")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: default_audit_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 {
    10
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notify_timeout(),
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// File named by `BOT_CONFIG` (or defaults), then `SUBGRAPH_URL` and
    /// `RELAY_URL` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(
            std::env::var(SUBGRAPH_URL_ENV).ok(),
            std::env::var(RELAY_URL_ENV).ok(),
        );
        Ok(config)
    }

    fn apply_overrides(&mut self, subgraph_url: Option<String>, relay_url: Option<String>) {
        if let Some(url) = subgraph_url.filter(|u| !u.trim().is_empty()) {
            self.feed.url = url.trim().to_string();
        }
        if let Some(url) = relay_url.filter(|u| !u.trim().is_empty()) {
            self.relay.url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.interval_secs must be positive".to_string(),
            ));
        }
        if !(self.chain.gas_price_gwei.is_finite() && self.chain.gas_price_gwei > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "chain.gas_price_gwei must be positive, got {}",
                self.chain.gas_price_gwei
            )));
        }
        if self.gas_settings().gas_price == 0 {
            return Err(ConfigError::Invalid(format!(
                "chain.gas_price_gwei {} is below 1 wei",
                self.chain.gas_price_gwei
            )));
        }
        if self.chain.gas_limit == 0 {
            return Err(ConfigError::Invalid(
                "chain.gas_limit must be positive".to_string(),
            ));
        }
        if self
            .feed
            .health_factor_threshold
            .trim()
            .parse::<f64>()
            .is_err()
        {
            return Err(ConfigError::Invalid(format!(
                "feed.health_factor_threshold is not a number: {}",
                self.feed.health_factor_threshold
            )));
        }
        Ok(())
    }

    pub fn subgraph_config(&self) -> SubgraphConfig {
        SubgraphConfig {
            url: self.feed.url.clone(),
            health_factor_threshold: self.feed.health_factor_threshold.trim().to_string(),
            page_size: self.feed.page_size,
            timeout: Duration::from_secs(self.feed.timeout_secs),
        }
    }

    pub fn gas_settings(&self) -> GasSettings {
        GasSettings::from_gwei(self.chain.gas_limit, self.chain.gas_price_gwei)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.chain.rpc_timeout_secs)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.timeout_secs)
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            url = %self.feed.url,
            hf_threshold = %self.feed.health_factor_threshold,
            page_size = ?self.feed.page_size,
            timeout_secs = self.feed.timeout_secs,
            "Position feed"
        );
        tracing::info!(
            chain_id = self.chain.chain_id,
            gas_limit = self.chain.gas_limit,
            gas_price_gwei = self.chain.gas_price_gwei,
            rpc_timeout_secs = self.chain.rpc_timeout_secs,
            "Transaction parameters"
        );
        tracing::info!(
            url = %self.relay.url,
            timeout_secs = self.relay.timeout_secs,
            "Relay"
        );
        tracing::info!(
            interval_secs = self.scheduler.interval_secs,
            audit_path = %self.audit.path.display(),
            "Scheduling and audit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.chain.chain_id, 137);
        assert_eq!(config.chain.gas_limit, 1_000_000);
        assert_eq!(config.chain.gas_price_gwei, 50.0);
        assert_eq!(config.scheduler.interval(), Duration::from_secs(15));
        assert_eq!(config.feed.health_factor_threshold, "1");
        assert_eq!(config.audit.path, PathBuf::from("logs/liquidations.json"));
        assert_eq!(config.relay.url, "https://relay.flashbots.net");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BotConfig = toml::from_str(
            r#"
            [chain]
            gas_price_gwei = 80.0

            [scheduler]
            interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.gas_price_gwei, 80.0);
        assert_eq!(config.chain.chain_id, 137);
        assert_eq!(config.chain.gas_limit, 1_000_000);
        assert_eq!(config.scheduler.interval_secs, 5);
        assert_eq!(config.feed.timeout_secs, 10);

        let gas = config.gas_settings();
        assert_eq!(gas.gas_limit, 1_000_000);
        assert_eq!(gas.gas_price, 80_000_000_000);
    }

    #[test]
    fn test_serialization() {
        let mut config = BotConfig::default();
        config.feed.page_size = Some(500);
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("interval_secs = 15"));

        let parsed: BotConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.feed.page_size, Some(500));
        assert_eq!(parsed.chain.chain_id, config.chain.chain_id);
    }

    #[test]
    fn test_validation() {
        let mut config = BotConfig::default();
        config.scheduler.interval_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BotConfig::default();
        config.chain.gas_price_gwei = -1.0;
        assert!(config.validate().is_err());

        let mut config = BotConfig::default();
        config.chain.gas_price_gwei = 1e-10;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = BotConfig::default();
        config.chain.gas_price_gwei = 1e-9;
        assert!(config.validate().is_ok());

        let mut config = BotConfig::default();
        config.feed.health_factor_threshold = "one".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = BotConfig::default();
        config.apply_overrides(Some(" https://indexer.example ".to_string()), Some(String::new()));
        assert_eq!(config.feed.url, "https://indexer.example");
        assert_eq!(config.relay.url, DEFAULT_RELAY_URL);

        let subgraph = config.subgraph_config();
        assert_eq!(subgraph.url, "https://indexer.example");
        assert_eq!(subgraph.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            BotConfig::from_file("/nonexistent/bot.toml"),
            Err(ConfigError::Read { .. })
        ));
    }
}
