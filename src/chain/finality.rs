//! Receipt handling for submitted transactions
//!
//! zkSync Era blocks are final for our purposes once the receipt is
//! available, so a transaction counts as done when it is mined with
//! `status == 1`. Anything else aborts the flow.

use super::PaymasterNetwork;
use crate::contracts::{ContractDeployedFilter, CONTRACT_DEPLOYER_ADDRESS};
use crate::error::{PaymasterError, PaymasterResult};

use ethers::contract::EthEvent;
use ethers::types::{Address, TransactionReceipt, H256, U64};
use tracing::{debug, info};

/// Wait for `tx_hash` to be mined and require success
pub async fn await_mined<N: PaymasterNetwork + ?Sized>(
    network: &N,
    tx_hash: H256,
    operation: &str,
) -> PaymasterResult<TransactionReceipt> {
    debug!("Waiting for {} ({:?})", operation, tx_hash);

    let receipt = network.wait_for_receipt(tx_hash).await.map_err(|e| match e {
        PaymasterError::Dropped { tx_hash, .. } => PaymasterError::Dropped {
            operation: operation.to_string(),
            tx_hash,
        },
        other => other,
    })?;

    if receipt.status != Some(U64::from(1)) {
        return Err(PaymasterError::Reverted {
            operation: operation.to_string(),
            tx_hash: format!("{:?}", tx_hash),
        });
    }

    info!(
        "{} mined in block {:?} ({:?})",
        operation,
        receipt.block_number.unwrap_or_default(),
        tx_hash
    );
    Ok(receipt)
}

/// Addresses of contracts created in this receipt, in emission order.
///
/// Only `ContractDeployed` events emitted by the ContractDeployer system
/// contract count; the new address is the third indexed topic.
pub fn deployed_contracts(receipt: &TransactionReceipt) -> Vec<Address> {
    let signature = ContractDeployedFilter::signature();

    receipt
        .logs
        .iter()
        .filter(|log| log.address == CONTRACT_DEPLOYER_ADDRESS)
        .filter(|log| log.topics.len() == 4 && log.topics[0] == signature)
        .map(|log| Address::from(log.topics[3]))
        .collect()
}
