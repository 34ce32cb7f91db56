//! Transaction sender: nonce, fees, EIP-712 signing and receipt checks

use super::eip712::{CallRequest, Eip712Meta, ZkSyncTransaction, EIP712_TX_TYPE};
use super::paymaster::PaymasterParams;
use crate::chain::{await_mined, deployed_contracts, PaymasterNetwork};
use crate::contracts::{hash_bytecode, Artifact, CreateCall, CONTRACT_DEPLOYER_ADDRESS};
use crate::error::{PaymasterError, PaymasterResult};

use ethers::abi::{AbiEncode, Token};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256, U64};
use std::sync::Arc;
use tracing::{debug, info};

/// Explicit fee fields; when absent the sender estimates them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSettings {
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// A call (or deployment) to submit through the sender
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    to: Address,
    data: Bytes,
    value: U256,
    factory_deps: Vec<Vec<u8>>,
    paymaster_params: Option<PaymasterParams>,
    gas: Option<GasSettings>,
}

impl ExecuteRequest {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
            value: U256::zero(),
            factory_deps: Vec::new(),
            paymaster_params: None,
            gas: None,
        }
    }

    /// Plain native-currency transfer
    pub fn transfer(to: Address, value: U256) -> Self {
        Self::new(to, Bytes::new()).value(value)
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn factory_deps(mut self, factory_deps: Vec<Vec<u8>>) -> Self {
        self.factory_deps = factory_deps;
        self
    }

    pub fn paymaster(mut self, params: PaymasterParams) -> Self {
        self.paymaster_params = Some(params);
        self
    }

    pub fn gas(mut self, gas: GasSettings) -> Self {
        self.gas = Some(gas);
        self
    }

    fn meta(&self, gas_per_pubdata: u64) -> Eip712Meta {
        let meta = Eip712Meta::new(gas_per_pubdata).with_factory_deps(self.factory_deps.clone());
        match &self.paymaster_params {
            Some(params) => meta.with_paymaster(params.clone()),
            None => meta,
        }
    }
}

/// Signs and submits zkSync EIP-712 transactions one at a time.
///
/// Every submission is awaited before the caller moves on, so nonces are
/// read fresh from the node for each transaction.
pub struct TransactionSender<N: PaymasterNetwork + ?Sized> {
    network: Arc<N>,
    gas_per_pubdata: u64,
}

impl<N: PaymasterNetwork + ?Sized> TransactionSender<N> {
    pub fn new(network: Arc<N>, gas_per_pubdata: u64) -> Self {
        Self {
            network,
            gas_per_pubdata,
        }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Estimate gas for `request` as sent by `from`, paymaster params included
    pub async fn estimate_gas(&self, from: Address, request: &ExecuteRequest) -> PaymasterResult<U256> {
        let call = CallRequest {
            from,
            to: request.to,
            data: request.data.clone(),
            value: request.value,
            transaction_type: U64::from(EIP712_TX_TYPE),
            eip712_meta: request.meta(self.gas_per_pubdata),
        };

        self.network.estimate_gas(call).await
    }

    /// Fill nonce and fees for `request`
    pub async fn build(
        &self,
        wallet: &LocalWallet,
        request: ExecuteRequest,
    ) -> PaymasterResult<ZkSyncTransaction> {
        let from = wallet.address();
        let nonce = self.network.nonce(from).await?;

        let gas = match request.gas {
            Some(gas) => gas,
            None => GasSettings {
                gas_limit: self.estimate_gas(from, &request).await?,
                max_fee_per_gas: self.network.gas_price().await?,
                max_priority_fee_per_gas: U256::zero(),
            },
        };

        let meta = request.meta(self.gas_per_pubdata);
        Ok(ZkSyncTransaction {
            chain_id: self.network.chain_id(),
            from,
            to: request.to,
            nonce,
            value: request.value,
            data: request.data,
            gas_limit: gas.gas_limit,
            max_fee_per_gas: gas.max_fee_per_gas,
            max_priority_fee_per_gas: gas.max_priority_fee_per_gas,
            meta,
        })
    }

    /// Sign and broadcast; returns the transaction hash
    pub async fn send(&self, wallet: &LocalWallet, tx: &ZkSyncTransaction) -> PaymasterResult<H256> {
        let signature = wallet
            .sign_typed_data(tx)
            .await
            .map_err(|e| PaymasterError::Wallet(format!("Failed to sign transaction: {}", e)))?;

        let raw = tx.rlp_signed(&signature);
        let tx_hash = self.network.send_raw_transaction(raw).await?;

        debug!(
            "Sent tx {:?} from {:?} (nonce {}, gas limit {})",
            tx_hash, tx.from, tx.nonce, tx.gas_limit
        );
        Ok(tx_hash)
    }

    /// Build, send and wait for a successful receipt
    pub async fn execute(
        &self,
        wallet: &LocalWallet,
        request: ExecuteRequest,
        operation: &str,
    ) -> PaymasterResult<TransactionReceipt> {
        let tx = self.build(wallet, request).await?;
        let tx_hash = self.send(wallet, &tx).await?;
        info!("Submitted {}: {:?}", operation, tx_hash);

        await_mined(self.network.as_ref(), tx_hash, operation).await
    }

    /// Deploy `artifact` through the ContractDeployer and return its address
    pub async fn deploy(
        &self,
        wallet: &LocalWallet,
        artifact: &Artifact,
        constructor_args: &[Token],
        operation: &str,
    ) -> PaymasterResult<Address> {
        let bytecode = artifact.bytecode.to_vec();
        let bytecode_hash = hash_bytecode(&bytecode)?;
        let input = artifact.encode_constructor(constructor_args)?;

        let calldata = CreateCall {
            salt: [0u8; 32],
            bytecode_hash: bytecode_hash.to_fixed_bytes(),
            input,
        }
        .encode();

        let request =
            ExecuteRequest::new(CONTRACT_DEPLOYER_ADDRESS, calldata).factory_deps(vec![bytecode]);
        let receipt = self.execute(wallet, request, operation).await?;

        // A constructor's own deployments are logged before the outer contract
        deployed_contracts(&receipt)
            .last()
            .copied()
            .ok_or_else(|| PaymasterError::DeploymentAddressMissing {
                tx_hash: format!("{:?}", receipt.transaction_hash),
            })
    }
}
