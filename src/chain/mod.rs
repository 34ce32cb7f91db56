//! Chain access for the paymaster flows
//!
//! This module provides:
//! - The [`PaymasterNetwork`] seam every flow talks to
//! - An HTTP JSON-RPC implementation against a zkSync Era node
//! - Receipt checks and deployed-address extraction

pub mod finality;
pub mod provider;

pub use finality::{await_mined, deployed_contracts};
pub use provider::ChainProvider;

use crate::error::PaymasterResult;
use crate::tx::CallRequest;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Everything the deploy and sponsored-call flows need from the node.
///
/// Each call is a single round-trip; nothing here retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymasterNetwork: Send + Sync {
    /// Chain ID used in the EIP-712 domain
    fn chain_id(&self) -> u64;

    /// Native currency balance in wei
    async fn native_balance(&self, owner: Address) -> PaymasterResult<U256>;

    /// ERC20 balance of `owner`
    async fn token_balance(&self, token: Address, owner: Address) -> PaymasterResult<U256>;

    async fn token_decimals(&self, token: Address) -> PaymasterResult<u8>;

    async fn gas_price(&self) -> PaymasterResult<U256>;

    async fn nonce(&self, owner: Address) -> PaymasterResult<U256>;

    /// `eth_estimateGas` including zkSync EIP-712 metadata
    async fn estimate_gas(&self, request: CallRequest) -> PaymasterResult<U256>;

    /// Price from a dAPI proxy, read through the paymaster
    async fn read_dapi(&self, paymaster: Address, proxy: Address) -> PaymasterResult<U256>;

    /// Current greeting stored in the greeter contract
    async fn greeting(&self, greeter: Address) -> PaymasterResult<String>;

    async fn send_raw_transaction(&self, raw: Bytes) -> PaymasterResult<H256>;

    /// Block until the transaction is mined and return its receipt
    async fn wait_for_receipt(&self, tx_hash: H256) -> PaymasterResult<TransactionReceipt>;
}
