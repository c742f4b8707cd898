//! tradelink Node
//!
//! Runs two simulated backend processes behind an in-process proxy relay and
//! plays scripted trades between them. Each scenario prints a JSON report of
//! the final balances, the notices every player saw and the audit trail.
//!
//! # Usage
//!
//! ```bash
//! # Play every scenario with default settings
//! tradelink-node
//!
//! # Play a single scenario with a custom config
//! tradelink-node --scenario proxy-quit --config /path/to/node.toml
//!
//! # Environment overrides
//! TRADELINK__TRADE__COUNTDOWN_SECS=1 tradelink-node --scenario proxy
//! ```

mod backend;
mod config;
mod relay;
mod scenario;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::NodeConfig;
use crate::scenario::Scenario;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tradelink Node - simulated cross-server trades
#[derive(Parser, Debug)]
#[command(name = "tradelink-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "TRADELINK_CONFIG")]
    config: Option<String>,

    /// Scenario to play
    #[arg(short, long, value_enum, default_value = "all")]
    scenario: Scenario,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TRADELINK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "TRADELINK_LOG_FORMAT")]
    log_format: Option<String>,

    /// Seconds between both sides being ready and the commit
    #[arg(long)]
    countdown_secs: Option<u64>,

    /// Seconds before an unanswered request expires
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Delay the relay adds to every frame, in milliseconds
    #[arg(long)]
    relay_delay_ms: Option<u64>,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut node_config = NodeConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(level) = args.log_level {
        node_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        node_config.logging.format = format;
    }
    if let Some(secs) = args.countdown_secs {
        node_config.trade.countdown_secs = secs;
    }
    if let Some(secs) = args.request_timeout_secs {
        node_config.trade.request_timeout_secs = secs;
    }
    if let Some(ms) = args.relay_delay_ms {
        node_config.simulation.relay_delay_ms = ms;
    }

    // Initialize logging
    init_logging(&node_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting tradelink node"
    );

    validate_config(&node_config)?;

    let scenarios = match args.scenario {
        Scenario::All => Scenario::each().to_vec(),
        one => vec![one],
    };
    for scenario in scenarios {
        let report = scenario::run(scenario, &node_config).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    tracing::info!("All scenarios played");
    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true))
                .init();
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true))
                .init();
        }
    }

    Ok(())
}

/// Validate configuration
fn validate_config(config: &NodeConfig) -> anyhow::Result<()> {
    let sim = &config.simulation;
    if sim.tick_ms == 0 {
        anyhow::bail!("simulation.tick_ms must be greater than zero");
    }
    if sim.alpha == sim.beta {
        anyhow::bail!("the two backends need different names, both are {}", sim.alpha);
    }
    if config.trade.countdown_secs == 0 {
        tracing::warn!("Countdown disabled, trades commit on the next tick");
    }
    if config.trade.request_timeout_secs > 300 {
        tracing::warn!(
            "Expiry scenario will wait {}s for the request to time out",
            config.trade.request_timeout_secs
        );
    }
    Ok(())
}
