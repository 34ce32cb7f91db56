//! Wallet loading
//!
//! Keys are only ever read from the environment. Demo wallets are generated
//! fresh and shown once on stdout; nothing here writes a key anywhere else.

use crate::error::{PaymasterError, PaymasterResult};

use ethers::core::rand::thread_rng;
use ethers::signers::{LocalWallet, Signer};
use std::fmt;

/// The three accounts the flows act with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletRole {
    /// Pays for deployments and funds the paymaster
    Funder,
    /// Empty wallet that owns a VIP NFT
    NftHolder,
    /// Empty wallet without an NFT
    NonHolder,
}

impl fmt::Display for WalletRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletRole::Funder => write!(f, "funder"),
            WalletRole::NftHolder => write!(f, "NFT holder"),
            WalletRole::NonHolder => write!(f, "non-holder"),
        }
    }
}

/// Load a wallet from the private key stored in `env_var`
pub fn load_wallet(env_var: &str, role: WalletRole, chain_id: u64) -> PaymasterResult<LocalWallet> {
    let key = std::env::var(env_var).map_err(|_| {
        PaymasterError::Wallet(format!("No {} wallet configured. Set {}", role, env_var))
    })?;

    wallet_from_key(&key, env_var, chain_id)
}

fn wallet_from_key(key: &str, source: &str, chain_id: u64) -> PaymasterResult<LocalWallet> {
    // The parse error never echoes the key
    key.trim()
        .parse::<LocalWallet>()
        .map(|wallet| wallet.with_chain_id(chain_id))
        .map_err(|_| PaymasterError::Wallet(format!("{} does not hold a valid private key", source)))
}

/// Fresh random wallet for the demo accounts
pub fn random_wallet(chain_id: u64) -> LocalWallet {
    LocalWallet::new(&mut thread_rng()).with_chain_id(chain_id)
}

/// Hex private key of a generated demo wallet, for one-time display
pub fn private_key_hex(wallet: &LocalWallet) -> String {
    format!("0x{}", hex::encode(wallet.signer().to_bytes()))
}
