//! Node Configuration
//!
//! Configuration for the simulated tradelink network.
//! Supports environment variables, config files, and CLI arguments.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tradelink_core::TradeSettings;

/// Node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Trade protocol settings shared by both backend processes
    #[serde(default)]
    pub trade: TradeSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Simulated network
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Simulated backend processes and the relay between them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Name of the first backend process
    #[serde(default = "default_alpha")]
    pub alpha: String,

    /// Name of the second backend process
    #[serde(default = "default_beta")]
    pub beta: String,

    /// Game tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Delay the relay adds to every frame, in milliseconds
    #[serde(default = "default_relay_delay_ms")]
    pub relay_delay_ms: u64,

    /// Coins each scripted player starts with
    #[serde(default = "default_starting_coins")]
    pub starting_coins: u64,

    /// Diamonds each scripted player starts with
    #[serde(default = "default_starting_diamonds")]
    pub starting_diamonds: u16,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            tick_ms: default_tick_ms(),
            relay_delay_ms: default_relay_delay_ms(),
            starting_coins: default_starting_coins(),
            starting_diamonds: default_starting_diamonds(),
        }
    }
}

impl SimulationConfig {
    /// Get the tick period
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Get the relay delay
    pub fn relay_delay(&self) -> Duration {
        Duration::from_millis(self.relay_delay_ms)
    }

    /// Time for a frame to cross the relay and be handled on the next tick
    pub fn settle(&self) -> Duration {
        self.relay_delay() * 4 + self.tick() * 2
    }
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_alpha() -> String {
    "alpha".to_string()
}

fn default_beta() -> String {
    "beta".to_string()
}

fn default_tick_ms() -> u64 {
    50 // one game tick
}

fn default_relay_delay_ms() -> u64 {
    20
}

fn default_starting_coins() -> u64 {
    100
}

fn default_starting_diamonds() -> u16 {
    5
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl NodeConfig {
    /// Load configuration from environment and optional config file
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder();

        // Add config file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add default config locations
        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // Add environment variables with TRADELINK_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("TRADELINK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> NodeConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.trade.countdown_secs, 3);
        assert_eq!(config.logging.format, "pretty");
        assert_eq!(config.simulation.tick(), Duration::from_millis(50));
        assert_eq!(config.simulation.settle(), Duration::from_millis(180));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = from_toml(
            r#"
            [trade]
            countdown_secs = 5

            [simulation]
            beta = "lobby"
            "#,
        );
        assert_eq!(config.trade.countdown_secs, 5);
        assert_eq!(config.trade.request_timeout_secs, 60);
        assert_eq!(config.simulation.alpha, "alpha");
        assert_eq!(config.simulation.beta, "lobby");
        assert_eq!(config.logging.level, "info");
    }
}
