//! zkSync paymaster runner
//!
//! Deploys an ERC20 token, a VIP NFT, a token-charging paymaster and a greeter
//! on zkSync Era, then exercises the paymaster with sponsored transactions
//! from wallets that hold no native currency.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod chain;
mod config;
mod contracts;
mod error;
mod tx;
mod wallet;
mod workflow;

use chain::ChainProvider;
use config::Settings;
use error::{PaymasterError, PaymasterResult};
use wallet::{load_wallet, WalletRole};

#[derive(Parser)]
#[command(version, about = "Deploy and exercise an NFT-gated ERC20 paymaster on zkSync Era")]
struct Cli {
    /// Configuration file (defaults to $PAYMASTER_CONFIG or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Deploy token, NFT, paymaster and greeter, then seed two demo wallets")]
    Deploy {
        /// Write deployed addresses (no keys) to this JSON file
        #[arg(long)]
        record: Option<PathBuf>,
    },

    #[command(about = "Send a sponsored greeting from each demo wallet and report the fees paid")]
    UsePaymaster,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be in place before ${VAR} substitution and key lookup
    dotenvy::dotenv().ok();

    init_logging();

    let cli = Cli::parse();

    info!("Starting zksync-paymaster v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    info!(
        "Loaded configuration for {} (chain ID {})",
        settings.network.name, settings.network.chain_id
    );

    let network = Arc::new(ChainProvider::new(settings.network.clone()).await?);

    let result = run_command(cli.command, &settings, network).await;
    if let Err(e) = &result {
        error!("{}: {}", failure_summary(e), e);
    }

    result?;
    info!("Done");
    Ok(())
}

/// Load the wallets a command needs and run its workflow
async fn run_command(
    command: Commands,
    settings: &Settings,
    network: Arc<ChainProvider>,
) -> PaymasterResult<()> {
    let chain_id = settings.network.chain_id;

    match command {
        Commands::Deploy { record } => {
            let funder = load_wallet(&settings.wallet.funder_key_env, WalletRole::Funder, chain_id)?;
            workflow::deploy::run(network, settings, &funder, record.as_deref())
                .await
                .map(|_| ())
        }
        Commands::UsePaymaster => {
            let nft_holder = load_wallet(
                &settings.wallet.nft_holder_key_env,
                WalletRole::NftHolder,
                chain_id,
            )?;
            let non_holder = load_wallet(
                &settings.wallet.non_holder_key_env,
                WalletRole::NonHolder,
                chain_id,
            )?;
            workflow::sponsored::run(network, settings, &nft_holder, &non_holder)
                .await
                .map(|_| ())
        }
    }
}

fn failure_summary(e: &PaymasterError) -> &'static str {
    if e.is_precondition() {
        "Aborted before sending any transaction"
    } else if e.is_on_chain() {
        "Transaction failed on chain"
    } else {
        "Run failed"
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zksync_paymaster=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_classified_as_precondition() {
        let err = load_wallet("ZKSYNC_PAYMASTER_UNSET_FUNDER_KEY", WalletRole::Funder, 280).unwrap_err();
        assert_eq!(failure_summary(&err), "Aborted before sending any transaction");
    }

    #[test]
    fn test_failure_summary() {
        let reverted = PaymasterError::Reverted {
            operation: "setGreeting".to_string(),
            tx_hash: "0xabc".to_string(),
        };
        assert_eq!(failure_summary(&reverted), "Transaction failed on chain");
        assert_eq!(
            failure_summary(&PaymasterError::Internal("boom".to_string())),
            "Run failed"
        );
    }
}
