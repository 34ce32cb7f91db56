//! zkSync EIP-712 (type 0x71) transactions
//!
//! These carry the fields plain Ethereum transactions lack: gas per pubdata
//! byte, factory dependencies (bytecode published alongside a deployment)
//! and paymaster parameters. They are signed as EIP-712 typed data over the
//! `zkSync` domain and serialized as `0x71 || rlp(...)`.

use super::paymaster::PaymasterParams;
use crate::contracts::hash_bytecode;
use crate::error::PaymasterError;

use ethers::abi::{encode, Token};
use ethers::types::transaction::eip712::{EIP712Domain, Eip712};
use ethers::types::{Address, Bytes, Signature, U256, U64};
use ethers::utils::keccak256;
use ethers::utils::rlp::RlpStream;
use serde::Serialize;

pub const EIP712_TX_TYPE: u8 = 0x71;

/// Gas per pubdata byte the wallet is willing to pay (SDK default)
pub const DEFAULT_GAS_PER_PUBDATA_LIMIT: u64 = 50_000;

const TRANSACTION_TYPE: &str = "Transaction(uint256 txType,uint256 from,uint256 to,uint256 gasLimit,uint256 gasPerPubdataByteLimit,uint256 maxFeePerGas,uint256 maxPriorityFeePerGas,uint256 paymaster,uint256 nonce,uint256 value,bytes data,bytes32[] factoryDeps,bytes paymasterInput)";

/// zkSync-specific transaction metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712Meta {
    pub gas_per_pubdata: U256,
    pub factory_deps: Vec<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paymaster_params: Option<PaymasterParams>,
}

impl Eip712Meta {
    pub fn new(gas_per_pubdata: u64) -> Self {
        Self {
            gas_per_pubdata: U256::from(gas_per_pubdata),
            factory_deps: Vec::new(),
            paymaster_params: None,
        }
    }

    pub fn with_factory_deps(mut self, factory_deps: Vec<Vec<u8>>) -> Self {
        self.factory_deps = factory_deps;
        self
    }

    pub fn with_paymaster(mut self, params: PaymasterParams) -> Self {
        self.paymaster_params = Some(params);
        self
    }
}

/// Request body for `eth_estimateGas` with zkSync metadata
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    #[serde(rename = "type")]
    pub transaction_type: U64,
    pub eip712_meta: Eip712Meta,
}

/// Unsigned zkSync EIP-712 transaction
#[derive(Debug, Clone, PartialEq)]
pub struct ZkSyncTransaction {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub nonce: U256,
    pub value: U256,
    pub data: Bytes,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub meta: Eip712Meta,
}

impl ZkSyncTransaction {
    /// Serialize with signature into raw `eth_sendRawTransaction` bytes
    pub fn rlp_signed(&self, signature: &Signature) -> Bytes {
        // zkSync expects the y-parity, not the 27/28 recovery byte
        let y_parity = if signature.v >= 27 {
            signature.v - 27
        } else {
            signature.v
        };

        let mut rlp = RlpStream::new();
        rlp.begin_unbounded_list();
        rlp.append(&self.nonce);
        rlp.append(&self.max_priority_fee_per_gas);
        rlp.append(&self.max_fee_per_gas);
        rlp.append(&self.gas_limit);
        rlp.append(&self.to);
        rlp.append(&self.value);
        rlp.append(&self.data.to_vec());
        rlp.append(&y_parity);
        rlp.append(&signature.r);
        rlp.append(&signature.s);
        rlp.append(&self.chain_id);
        rlp.append(&self.from);
        rlp.append(&self.meta.gas_per_pubdata);
        rlp.begin_list(self.meta.factory_deps.len());
        for dep in &self.meta.factory_deps {
            rlp.append(&dep.as_slice());
        }
        // custom signature: none, the ECDSA fields above are used
        rlp.append_empty_data();
        match &self.meta.paymaster_params {
            Some(params) => {
                rlp.begin_list(2);
                rlp.append(&params.paymaster());
                rlp.append(&params.input().as_slice());
            }
            None => {
                rlp.begin_list(0);
            }
        }
        rlp.finalize_unbounded_list();

        let mut raw = vec![EIP712_TX_TYPE];
        raw.extend_from_slice(&rlp.out());
        Bytes::from(raw)
    }

    fn paymaster(&self) -> Address {
        self.meta
            .paymaster_params
            .as_ref()
            .map(|p| p.paymaster())
            .unwrap_or_default()
    }

    fn paymaster_input(&self) -> Vec<u8> {
        self.meta
            .paymaster_params
            .as_ref()
            .map(|p| p.input())
            .unwrap_or_default()
    }
}

impl Eip712 for ZkSyncTransaction {
    type Error = PaymasterError;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        Ok(EIP712Domain {
            name: Some("zkSync".to_string()),
            version: Some("2".to_string()),
            chain_id: Some(U256::from(self.chain_id)),
            verifying_contract: None,
            salt: None,
        })
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Ok(keccak256(TRANSACTION_TYPE))
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        let mut dep_hashes = Vec::with_capacity(self.meta.factory_deps.len() * 32);
        for dep in &self.meta.factory_deps {
            dep_hashes.extend_from_slice(hash_bytecode(dep)?.as_bytes());
        }

        let encoded = encode(&[
            Token::FixedBytes(Self::type_hash()?.to_vec()),
            Token::Uint(U256::from(EIP712_TX_TYPE)),
            Token::Uint(address_to_u256(self.from)),
            Token::Uint(address_to_u256(self.to)),
            Token::Uint(self.gas_limit),
            Token::Uint(self.meta.gas_per_pubdata),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::Uint(address_to_u256(self.paymaster())),
            Token::Uint(self.nonce),
            Token::Uint(self.value),
            Token::FixedBytes(keccak256(&self.data).to_vec()),
            Token::FixedBytes(keccak256(&dep_hashes).to_vec()),
            Token::FixedBytes(keccak256(self.paymaster_input()).to_vec()),
        ]);

        Ok(keccak256(encoded))
    }
}

fn address_to_u256(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}
