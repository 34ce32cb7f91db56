//! HTTP JSON-RPC provider for a zkSync Era node

use super::PaymasterNetwork;
use crate::config::NetworkConfig;
use crate::contracts::{DemoToken, Greeter, MyPaymaster};
use crate::error::{PaymasterError, PaymasterResult};
use crate::tx::CallRequest;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Single-endpoint provider; every call maps straight to one RPC request
pub struct ChainProvider {
    /// Network configuration
    config: NetworkConfig,
    /// HTTP client shared with the contract bindings
    client: Arc<Provider<Http>>,
}

impl ChainProvider {
    /// Connect and verify the node serves the configured chain
    pub async fn new(config: NetworkConfig) -> PaymasterResult<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| PaymasterError::Config(format!("Invalid RPC URL {}: {}", config.rpc_url, e)))?
            .interval(Duration::from_millis(config.receipt_poll_interval_ms));

        let remote_chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| PaymasterError::ChainConnection(e.to_string()))?;

        if remote_chain_id != U256::from(config.chain_id) {
            return Err(PaymasterError::Config(format!(
                "RPC {} serves chain {}, expected {}",
                config.rpc_url, remote_chain_id, config.chain_id
            )));
        }

        info!("Connected to {} (chain ID {})", config.name, config.chain_id);

        Ok(Self {
            config,
            client: Arc::new(provider),
        })
    }

    /// Get the underlying HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        &self.client
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.receipt_poll_interval_ms)
    }
}

fn rpc_error(e: impl std::fmt::Display) -> PaymasterError {
    PaymasterError::ChainConnection(e.to_string())
}

fn contract_error(e: impl std::fmt::Display) -> PaymasterError {
    PaymasterError::Contract(e.to_string())
}

#[async_trait]
impl PaymasterNetwork for ChainProvider {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    async fn native_balance(&self, owner: Address) -> PaymasterResult<U256> {
        self.http().get_balance(owner, None).await.map_err(rpc_error)
    }

    async fn token_balance(&self, token: Address, owner: Address) -> PaymasterResult<U256> {
        DemoToken::new(token, self.client.clone())
            .balance_of(owner)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn token_decimals(&self, token: Address) -> PaymasterResult<u8> {
        DemoToken::new(token, self.client.clone())
            .decimals()
            .call()
            .await
            .map_err(contract_error)
    }

    async fn gas_price(&self) -> PaymasterResult<U256> {
        self.http()
            .get_gas_price()
            .await
            .map_err(|e| PaymasterError::GasEstimation(e.to_string()))
    }

    async fn nonce(&self, owner: Address) -> PaymasterResult<U256> {
        self.http()
            .get_transaction_count(owner, None)
            .await
            .map_err(rpc_error)
    }

    async fn estimate_gas(&self, request: CallRequest) -> PaymasterResult<U256> {
        // ethers' TypedTransaction has no slot for eip712Meta, so go through the raw request
        let gas: U256 = self
            .http()
            .request("eth_estimateGas", [request])
            .await
            .map_err(|e| PaymasterError::GasEstimation(e.to_string()))?;

        debug!("Estimated gas: {}", gas);
        Ok(gas)
    }

    async fn read_dapi(&self, paymaster: Address, proxy: Address) -> PaymasterResult<U256> {
        MyPaymaster::new(paymaster, self.client.clone())
            .read_dapi(proxy)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn greeting(&self, greeter: Address) -> PaymasterResult<String> {
        Greeter::new(greeter, self.client.clone())
            .greet()
            .call()
            .await
            .map_err(contract_error)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> PaymasterResult<H256> {
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| PaymasterError::Transaction(e.to_string()))?;

        Ok(pending.tx_hash())
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> PaymasterResult<TransactionReceipt> {
        loop {
            if let Some(receipt) = self
                .http()
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(rpc_error)?
            {
                if receipt.block_number.is_some() {
                    return Ok(receipt);
                }
            }

            // Still unknown to the node means it was dropped from the mempool
            if self
                .http()
                .get_transaction(tx_hash)
                .await
                .map_err(rpc_error)?
                .is_none()
            {
                return Err(PaymasterError::Dropped {
                    operation: "wait for receipt".to_string(),
                    tx_hash: format!("{:?}", tx_hash),
                });
            }

            debug!("Transaction {:?} not mined yet", tx_hash);
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}
