//! Configuration management for the paymaster runner
//!
//! Loads configuration from a TOML file with environment variable substitution.
//! Wallet secrets are never stored here: the file names the environment
//! variables that hold them and the keys are read when a wallet is built.

use crate::error::{PaymasterError, PaymasterResult};
use crate::tx::DEFAULT_GAS_PER_PUBDATA_LIMIT;

use anyhow::{Context, Result};
use ethers::types::{Address, U256};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub network: NetworkConfig,
    pub wallet: WalletConfig,
    pub contracts: ContractsConfig,
    pub oracles: OracleConfig,
    pub deploy: DeployConfig,
    pub sponsorship: SponsorshipConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub receipt_poll_interval_ms: u64,
}

/// Names of the environment variables holding each wallet's private key
#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub funder_key_env: String,
    pub nft_holder_key_env: String,
    pub non_holder_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub artifacts_dir: String,
    #[serde(default)]
    pub paymaster: String,
    #[serde(default)]
    pub greeter: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub nft: String,
}

/// dAPI proxy addresses registered on the paymaster
#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub native_usd_proxy: String,
    pub token_usd_proxy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: u8,
    pub paymaster_funding_eth: String,
    pub token_mint_amount: String,
    pub initial_greeting: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SponsorshipConfig {
    #[serde(default = "default_gas_per_pubdata")]
    pub gas_per_pubdata: u64,
    pub estimation_allowance: String,
    pub nft_holder_greeting: String,
    pub non_holder_greeting: String,
}

/// Contract addresses the sponsored-call flow attaches to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub paymaster: Address,
    pub greeter: Address,
    pub token: Address,
    pub nft: Address,
}

impl Settings {
    /// Load settings from the default location or `PAYMASTER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("PAYMASTER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    fn parse(raw: &str) -> Result<Self> {
        Self::parse_with(raw, |name| env::var(name).ok())
    }

    /// Parse with `${VAR}` values resolved through `lookup`
    fn parse_with(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_str = substitute_vars(raw, lookup);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.network.rpc_url.is_empty() {
            anyhow::bail!("Network {} has no RPC URL configured", self.network.name);
        }

        if self.sponsorship.gas_per_pubdata == 0 {
            anyhow::bail!("gas_per_pubdata must be non-zero");
        }

        // Amounts are kept as strings in the file; fail early if they don't parse
        self.deploy.paymaster_funding()?;
        self.deploy.token_mint_amount()?;
        self.sponsorship.estimation_allowance()?;
        self.oracles.native_usd_proxy()?;
        self.oracles.token_usd_proxy()?;

        Ok(())
    }
}

impl ContractsConfig {
    /// Parse the attached contract addresses, rejecting empty entries
    pub fn addresses(&self) -> PaymasterResult<ContractAddresses> {
        Ok(ContractAddresses {
            paymaster: parse_address("paymaster", &self.paymaster)?,
            greeter: parse_address("greeter", &self.greeter)?,
            token: parse_address("token", &self.token)?,
            nft: parse_address("nft", &self.nft)?,
        })
    }
}

impl OracleConfig {
    pub fn native_usd_proxy(&self) -> PaymasterResult<Address> {
        parse_address("native_usd_proxy", &self.native_usd_proxy)
    }

    pub fn token_usd_proxy(&self) -> PaymasterResult<Address> {
        parse_address("token_usd_proxy", &self.token_usd_proxy)
    }
}

impl DeployConfig {
    /// Native currency sent to the paymaster after deployment, in wei
    pub fn paymaster_funding(&self) -> PaymasterResult<U256> {
        ethers::utils::parse_ether(&self.paymaster_funding_eth).map_err(|e| {
            PaymasterError::Config(format!(
                "Invalid paymaster_funding_eth {:?}: {}",
                self.paymaster_funding_eth, e
            ))
        })
    }

    pub fn token_mint_amount(&self) -> PaymasterResult<U256> {
        parse_amount("token_mint_amount", &self.token_mint_amount)
    }
}

impl SponsorshipConfig {
    /// Oversized allowance used only while estimating gas
    pub fn estimation_allowance(&self) -> PaymasterResult<U256> {
        parse_amount("estimation_allowance", &self.estimation_allowance)
    }
}

fn default_gas_per_pubdata() -> u64 {
    DEFAULT_GAS_PER_PUBDATA_LIMIT
}

fn parse_address(field: &str, value: &str) -> PaymasterResult<Address> {
    if value.is_empty() {
        return Err(PaymasterError::Config(format!("{} address is not set", field)));
    }
    value
        .parse()
        .map_err(|e| PaymasterError::Config(format!("Invalid {} address {:?}: {}", field, value, e)))
}

fn parse_amount(field: &str, value: &str) -> PaymasterResult<U256> {
    U256::from_dec_str(value)
        .map_err(|e| PaymasterError::Config(format!("Invalid {} {:?}: {}", field, value, e)))
}

/// Substitute variables in the format ${VAR_NAME}; unknown names become empty
fn substitute_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = lookup(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
