//! Deployment of the token, VIP NFT, paymaster and greeter contracts
//!
//! Every step is a separate transaction awaited to a successful receipt
//! before the next one is built. A failure part-way leaves whatever was
//! already deployed on chain; rerunning starts over with new contracts.

use crate::chain::PaymasterNetwork;
use crate::config::{DeployConfig, Settings};
use crate::contracts::{
    demo_token, vip_nft, Artifact, ArtifactStore, SetDapiProxyCall, GREETER_ARTIFACT,
    NFT_ARTIFACT, PAYMASTER_ARTIFACT, TOKEN_ARTIFACT,
};
use crate::error::{PaymasterError, PaymasterResult};
use crate::tx::{ExecuteRequest, TransactionSender};
use crate::wallet::{private_key_hex, random_wallet};

use chrono::{DateTime, Utc};
use ethers::abi::{AbiEncode, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Compiled artifacts of the four demo contracts
#[derive(Debug, Clone)]
pub struct DeployArtifacts {
    pub token: Artifact,
    pub nft: Artifact,
    pub paymaster: Artifact,
    pub greeter: Artifact,
}

impl DeployArtifacts {
    pub fn load(store: &ArtifactStore) -> PaymasterResult<Self> {
        Ok(Self {
            token: store.load(TOKEN_ARTIFACT)?,
            nft: store.load(NFT_ARTIFACT)?,
            paymaster: store.load(PAYMASTER_ARTIFACT)?,
            greeter: store.load(GREETER_ARTIFACT)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeployedContracts {
    pub token: Address,
    pub nft: Address,
    pub paymaster: Address,
    pub greeter: Address,
}

/// Addresses of the generated demo wallets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoWallets {
    pub nft_holder: Address,
    pub non_holder: Address,
}

/// Result of a deploy run. Holds addresses only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub network: String,
    pub chain_id: u64,
    pub deployed_at: DateTime<Utc>,
    pub contracts: DeployedContracts,
    pub demo_wallets: DemoWallets,
}

impl DeploymentRecord {
    /// `.env` entries the sponsored-call flow reads
    pub fn env_lines(&self) -> Vec<String> {
        vec![
            format!("PAYMASTER_ADDRESS={:?}", self.contracts.paymaster),
            format!("GREETER_CONTRACT={:?}", self.contracts.greeter),
            format!("TOKEN_ADDRESS={:?}", self.contracts.token),
            format!("VIPNFT_ADDRESS={:?}", self.contracts.nft),
        ]
    }

    pub fn write(&self, path: &Path) -> PaymasterResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PaymasterError::Internal(format!("Failed to encode record: {}", e)))?;

        std::fs::write(path, json).map_err(|e| {
            PaymasterError::Internal(format!("Failed to write record {:?}: {}", path, e))
        })?;

        info!("Deployment record written to {:?}", path);
        Ok(())
    }
}

/// Runs the deployment sequence with the funder wallet
pub struct DeployFlow<'a, N: PaymasterNetwork + ?Sized> {
    sender: &'a TransactionSender<N>,
    config: &'a DeployConfig,
    native_usd_proxy: Address,
    token_usd_proxy: Address,
}

impl<'a, N: PaymasterNetwork + ?Sized> DeployFlow<'a, N> {
    pub fn new(
        sender: &'a TransactionSender<N>,
        config: &'a DeployConfig,
        native_usd_proxy: Address,
        token_usd_proxy: Address,
    ) -> Self {
        Self {
            sender,
            config,
            native_usd_proxy,
            token_usd_proxy,
        }
    }

    pub async fn execute(
        &self,
        funder: &LocalWallet,
        artifacts: &DeployArtifacts,
        wallets: DemoWallets,
    ) -> PaymasterResult<DeployedContracts> {
        let config = self.config;

        let token = self
            .sender
            .deploy(
                funder,
                &artifacts.token,
                &[
                    Token::String(config.token_name.clone()),
                    Token::String(config.token_symbol.clone()),
                    Token::Uint(U256::from(config.token_decimals)),
                ],
                "deploy token",
            )
            .await?;
        info!("Token deployed at {:?}", token);

        let nft = self
            .sender
            .deploy(funder, &artifacts.nft, &[], "deploy VIP NFT")
            .await?;
        info!("VIP NFT deployed at {:?}", nft);

        let paymaster = self
            .sender
            .deploy(
                funder,
                &artifacts.paymaster,
                &[Token::Address(token), Token::Address(nft)],
                "deploy paymaster",
            )
            .await?;
        info!("Paymaster deployed at {:?}", paymaster);

        let funding = config.paymaster_funding()?;
        self.sender
            .execute(
                funder,
                ExecuteRequest::transfer(paymaster, funding),
                "fund paymaster",
            )
            .await?;
        info!("Paymaster funded with {} wei", funding);

        let set_proxies = SetDapiProxyCall {
            usdc_proxy: self.token_usd_proxy,
            eth_proxy: self.native_usd_proxy,
        };
        self.sender
            .execute(
                funder,
                ExecuteRequest::new(paymaster, set_proxies.encode()),
                "set oracle proxies",
            )
            .await?;
        info!("dAPI proxies set");

        let greeter = self
            .sender
            .deploy(
                funder,
                &artifacts.greeter,
                &[Token::String(config.initial_greeting.clone())],
                "deploy greeter",
            )
            .await?;
        info!("Greeter deployed at {:?}", greeter);

        let amount = config.token_mint_amount()?;
        for (holder, operation) in [
            (wallets.nft_holder, "mint tokens to NFT holder"),
            (wallets.non_holder, "mint tokens to non-holder"),
        ] {
            let mint = demo_token::MintCall { to: holder, amount };
            self.sender
                .execute(funder, ExecuteRequest::new(token, mint.encode()), operation)
                .await?;
            info!("Minted {} tokens to {:?}", amount, holder);
        }

        let mint_nft = vip_nft::MintCall {
            to: wallets.nft_holder,
        };
        self.sender
            .execute(
                funder,
                ExecuteRequest::new(nft, mint_nft.encode()),
                "mint VIP NFT",
            )
            .await?;
        info!("Minted a VIP NFT to {:?}", wallets.nft_holder);

        Ok(DeployedContracts {
            token,
            nft,
            paymaster,
            greeter,
        })
    }
}

/// Full deploy run: demo wallets, contracts, report and optional record
pub async fn run<N: PaymasterNetwork + ?Sized>(
    network: Arc<N>,
    settings: &Settings,
    funder: &LocalWallet,
    record: Option<&Path>,
) -> PaymasterResult<DeploymentRecord> {
    let artifacts = DeployArtifacts::load(&ArtifactStore::new(&settings.contracts.artifacts_dir))?;
    let chain_id = network.chain_id();

    info!("Deploying from {:?} on {}", funder.address(), settings.network.name);

    let nft_holder = random_wallet(chain_id);
    let non_holder = random_wallet(chain_id);

    // Demo keys go to the terminal only
    println!("Empty wallet with NFT address: {:?}", nft_holder.address());
    println!("EMPTY_WALLET_W_NFT_PRIVATE_KEY={}", private_key_hex(&nft_holder));
    println!("Empty wallet without NFT address: {:?}", non_holder.address());
    println!("EMPTY_WALLET_NO_NFT_PRIVATE_KEY={}", private_key_hex(&non_holder));

    let wallets = DemoWallets {
        nft_holder: nft_holder.address(),
        non_holder: non_holder.address(),
    };

    let sender = TransactionSender::new(network, settings.sponsorship.gas_per_pubdata);
    let flow = DeployFlow::new(
        &sender,
        &settings.deploy,
        settings.oracles.native_usd_proxy()?,
        settings.oracles.token_usd_proxy()?,
    );
    let contracts = flow.execute(funder, &artifacts, wallets).await?;

    let deployment = DeploymentRecord {
        network: settings.network.name.clone(),
        chain_id,
        deployed_at: Utc::now(),
        contracts,
        demo_wallets: wallets,
    };

    println!("Add to .env:");
    for line in deployment.env_lines() {
        println!("{}", line);
    }

    if let Some(path) = record {
        deployment.write(path)?;
    }

    Ok(deployment)
}
