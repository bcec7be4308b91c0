use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ingestion: IngestionConfig,
    pub feed: Option<FeedConfig>,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_true() -> bool {
    true
}

// ============================================================
// Ingestion Config
// ============================================================

/// Synthetic generator settings.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestionConfig {
    #[serde(default = "default_true")]
    pub synthetic: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_address_pool")]
    pub address_pool: Vec<String>,
    #[serde(default = "default_max_value_units")]
    pub max_value_units: u64,
    #[serde(default = "default_start_block")]
    pub start_block: u64,
    pub seed: Option<u64>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            synthetic: true,
            interval_ms: default_interval_ms(),
            address_pool: default_address_pool(),
            max_value_units: default_max_value_units(),
            start_block: default_start_block(),
            seed: None,
        }
    }
}

fn default_interval_ms() -> u64 {
    8000
}

fn default_address_pool() -> Vec<String> {
    vec![
        "0x742d35cc6634c0532925a3b8d761400000000001".to_string(),
        "0x742d35cc6634c0532925a3b8d761400000000002".to_string(),
        "0x742d35cc6634c0532925a3b8d761400000000003".to_string(),
        "0x742d35cc6634c0532925a3b8d761400000000004".to_string(),
    ]
}

fn default_max_value_units() -> u64 {
    2000
}

fn default_start_block() -> u64 {
    5_000_000
}

// ============================================================
// Live Feed Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_name")]
    pub name: String,
    pub rpc_http: String,
    pub rpc_ws: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_feed_name() -> String {
    "mainnet".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_channel_capacity() -> usize {
    256
}

// ============================================================
// Analyzer Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    #[serde(default = "default_native_decimals")]
    pub native_decimals: u32,
    #[serde(default = "default_volume_threshold")]
    pub volume_anomaly_threshold: f64,
    #[serde(default = "default_baseline_confidence")]
    pub baseline_confidence: f64,
    #[serde(default)]
    pub whale: WhaleConfig,
    #[serde(default)]
    pub bot_activity: BotActivityConfig,
    #[serde(default)]
    pub round_amount: RoundAmountConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            native_decimals: default_native_decimals(),
            volume_anomaly_threshold: default_volume_threshold(),
            baseline_confidence: default_baseline_confidence(),
            whale: WhaleConfig::default(),
            bot_activity: BotActivityConfig::default(),
            round_amount: RoundAmountConfig::default(),
        }
    }
}

fn default_native_decimals() -> u32 {
    18
}

fn default_volume_threshold() -> f64 {
    1000.0
}

fn default_baseline_confidence() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhaleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_whale_threshold")]
    pub threshold: f64,
}

impl Default for WhaleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 500.0,
        }
    }
}

fn default_whale_threshold() -> f64 {
    500.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotActivityConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bot_window")]
    pub window_secs: u64,
    #[serde(default = "default_bot_max")]
    pub max_transactions: usize,
}

impl Default for BotActivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_transactions: 5,
        }
    }
}

/// Longest sliding window the bot detector accepts (one year).
pub const MAX_BOT_WINDOW_SECS: u64 = 86_400 * 365;

fn default_bot_window() -> u64 {
    60
}

fn default_bot_max() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoundAmountConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_round_unit")]
    pub unit: u64,
}

impl Default for RoundAmountConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            unit: 100,
        }
    }
}

fn default_round_unit() -> u64 {
    100
}

// ============================================================
// Alert & Broadcast Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct AlertConfig {
    #[serde(default = "default_alert_threshold")]
    pub threshold: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { threshold: 70 }
    }
}

fn default_alert_threshold() -> u8 {
    70
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

fn default_buffer_size() -> usize {
    64
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 4000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_api_port() -> u16 {
    4000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if !self.ingestion.synthetic && self.feed.is_none() {
            return Err(eyre::eyre!(
                "No ingestion source: enable the synthetic generator or configure [feed]"
            ));
        }

        if self.ingestion.synthetic {
            if self.ingestion.interval_ms == 0 {
                return Err(eyre::eyre!("ingestion.interval_ms must be positive"));
            }
            if self.ingestion.address_pool.is_empty() {
                return Err(eyre::eyre!("ingestion.address_pool must not be empty"));
            }
            for address in &self.ingestion.address_pool {
                if !address.starts_with("0x") || address.len() != 42 {
                    return Err(eyre::eyre!("Invalid address '{}' in address pool", address));
                }
            }
        }

        if let Some(feed) = &self.feed {
            if feed.channel_capacity == 0 {
                return Err(eyre::eyre!("feed.channel_capacity must be positive"));
            }
        }

        if self.analyzer.native_decimals > 19 {
            return Err(eyre::eyre!(
                "analyzer.native_decimals must be at most 19, got {}",
                self.analyzer.native_decimals
            ));
        }
        if !(0.0..=1.0).contains(&self.analyzer.baseline_confidence) {
            return Err(eyre::eyre!("analyzer.baseline_confidence must be within [0, 1]"));
        }
        let window_secs = self.analyzer.bot_activity.window_secs;
        if window_secs == 0 || window_secs > MAX_BOT_WINDOW_SECS {
            return Err(eyre::eyre!(
                "analyzer.bot_activity.window_secs must be within [1, {}], got {}",
                MAX_BOT_WINDOW_SECS,
                window_secs
            ));
        }
        if self.analyzer.round_amount.unit == 0 {
            return Err(eyre::eyre!("analyzer.round_amount.unit must be positive"));
        }

        if self.alerts.threshold > 100 {
            return Err(eyre::eyre!(
                "alerts.threshold must be within [0, 100], got {}",
                self.alerts.threshold
            ));
        }

        if self.broadcast.buffer_size == 0 {
            return Err(eyre::eyre!("broadcast.buffer_size must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[ingestion]
interval_ms = 1000
seed = 7

[feed]
rpc_http = "http://localhost:8545"
rpc_ws = "ws://localhost:8546"

[analyzer.whale]
threshold = 250.0

[alerts]
threshold = 80
"#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.ingestion.synthetic); // default
        assert_eq!(config.ingestion.interval_ms, 1000);
        assert_eq!(config.ingestion.seed, Some(7));
        assert_eq!(config.ingestion.address_pool.len(), 4);

        let feed = config.feed.as_ref().unwrap();
        assert_eq!(feed.name, "mainnet");
        assert_eq!(feed.fetch_timeout_ms, 10_000);
        assert_eq!(feed.rpc_ws.as_deref(), Some("ws://localhost:8546"));

        assert_eq!(config.analyzer.whale.threshold, 250.0);
        assert!(config.analyzer.bot_activity.enabled);
        assert_eq!(config.analyzer.volume_anomaly_threshold, 1000.0);
        assert_eq!(config.alerts.threshold, 80);
        assert_eq!(config.broadcast.buffer_size, 64);
        assert_eq!(config.api.port, 4000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.feed.is_none());
        assert_eq!(config.ingestion.interval_ms, 8000);
        assert_eq!(config.analyzer.native_decimals, 18);
        assert_eq!(config.alerts.threshold, 70);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_no_source() {
        let config = Config {
            ingestion: IngestionConfig {
                synthetic: false,
                ..IngestionConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_address() {
        let config = Config {
            ingestion: IngestionConfig {
                address_pool: vec!["not-an-address".to_string()],
                ..IngestionConfig::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = Config::default();
        config.alerts.threshold = 101;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broadcast.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.analyzer.native_decimals = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bot_window() {
        let mut config = Config::default();
        config.analyzer.bot_activity.window_secs = 0;
        assert!(config.validate().is_err());

        config.analyzer.bot_activity.window_secs = u64::MAX;
        assert!(config.validate().is_err());

        config.analyzer.bot_activity.window_secs = MAX_BOT_WINDOW_SECS + 1;
        assert!(config.validate().is_err());

        config.analyzer.bot_activity.window_secs = MAX_BOT_WINDOW_SECS;
        assert!(config.validate().is_ok());
    }
}
