//! Flash-loan Liquidation Bot
//!
//! Polls a lending-protocol subgraph for under-collateralized borrowers,
//! ranks them by outstanding debt, and submits one flash-loan liquidation
//! per candidate to a private relay for the next block.

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::{SubgraphClient, TelegramClient};
use liquidator_chain::{signer_from_hex, ChainReader, FlashbotsRelay, LiquidationSignerBuilder};
use liquidator_core::{
    BotConfig, JsonFileAuditLog, LiquidationPipeline, LogNotifier, Notifier, OutcomeRecorder,
    Scheduler,
};

/// Environment variable names.
mod env {
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const RPC_URL: &str = "RPC_URL";
    pub const CONTRACT_ADDRESS: &str = "CONTRACT_ADDRESS";
    pub const FLASHBOTS_AUTH_KEY: &str = "FLASHBOTS_AUTH_KEY";
    pub const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
    pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")
            }),
        )
        .init();

    let bot_config = BotConfig::load()?;
    bot_config.log_config();

    let secrets = load_secrets()?;

    let scheduler = initialize_components(&bot_config, secrets)?;

    info!("Starting liquidation loop (Ctrl-C to stop)");
    scheduler.run().await;

    Ok(())
}

/// Secrets and endpoints loaded from environment.
struct Secrets {
    private_key: String,
    rpc_url: String,
    contract: Address,
    relay_auth_key: Option<String>,
    telegram: Option<(String, String)>,
}

fn load_secrets() -> Result<Secrets> {
    let get_env = |name: &str| -> Result<String> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Missing env var: {}", name))
    };
    let get_optional = |name: &str| get_env(name).ok();

    let contract = get_env(env::CONTRACT_ADDRESS)?
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address for {}: {}", env::CONTRACT_ADDRESS, e))?;

    let telegram = match (
        get_optional(env::TELEGRAM_TOKEN),
        get_optional(env::TELEGRAM_CHAT_ID),
    ) {
        (Some(token), Some(chat_id)) => Some((token, chat_id)),
        _ => None,
    };

    Ok(Secrets {
        private_key: get_env(env::PRIVATE_KEY)?,
        rpc_url: get_env(env::RPC_URL)?,
        contract,
        relay_auth_key: get_optional(env::FLASHBOTS_AUTH_KEY),
        telegram,
    })
}

fn initialize_components(
    config: &BotConfig,
    secrets: Secrets,
) -> Result<Scheduler<LiquidationPipeline>> {
    info!("Initializing components...");

    let reader = ChainReader::new(&secrets.rpc_url, config.rpc_timeout())?;

    // Transaction signer
    let wallet = signer_from_hex(&secrets.private_key)
        .map_err(|e| anyhow::anyhow!("Invalid {}: {}", env::PRIVATE_KEY, e))?;
    let signer = LiquidationSignerBuilder::new(reader.clone(), secrets.contract)
        .chain_id(config.chain.chain_id)
        .gas(config.gas_settings())
        .build(wallet.clone());

    // Relay identity defaults to the transaction signer
    let relay_auth = match &secrets.relay_auth_key {
        Some(key) => signer_from_hex(key)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", env::FLASHBOTS_AUTH_KEY, e))?,
        None => wallet,
    };
    let relay = FlashbotsRelay::new(&config.relay.url, relay_auth, reader, config.relay_timeout())
        .context("Failed to create relay client")?;

    // Position feed
    let feed = SubgraphClient::new(config.subgraph_config())
        .context("Failed to create subgraph client")?;
    info!(url = %feed.url(), "Position feed configured");

    // Outcome sinks
    let notifier: Arc<dyn Notifier> = match secrets.telegram {
        Some((token, chat_id)) => {
            let client = TelegramClient::new(token, chat_id, config.notify.timeout())
                .context("Failed to create Telegram client")?;
            info!(chat_id = %client.chat_id(), "Telegram notifications enabled");
            Arc::new(client)
        }
        None => {
            warn!(
                "{} or {} not set, notifications go to the log only",
                env::TELEGRAM_TOKEN,
                env::TELEGRAM_CHAT_ID
            );
            Arc::new(LogNotifier)
        }
    };
    let audit = Arc::new(JsonFileAuditLog::new(&config.audit.path));
    info!(path = %audit.path().display(), "Audit log configured");

    let recorder = OutcomeRecorder::new(audit, notifier);
    let pipeline = LiquidationPipeline::new(
        Arc::new(feed),
        Arc::new(signer),
        Arc::new(relay),
        recorder,
    );

    info!("All components initialized");

    Ok(Scheduler::new(pipeline, config.scheduler.interval()))
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    Flash-loan Liquidation Bot v{}
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
