//! Paymaster parameters attached to a zkSync transaction
//!
//! The paymaster input is the ABI-encoded `approvalBased` call from
//! `IPaymasterFlow`; the paymaster contract decodes it during validation.

use crate::contracts::ApprovalBasedCall;

use ethers::abi::AbiEncode;
use ethers::types::{Address, Bytes, U256};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Approval-based sponsorship: the caller approves `minimal_allowance` of
/// `token` and the paymaster pulls its fee from it. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterParams {
    paymaster: Address,
    token: Address,
    minimal_allowance: U256,
    inner_input: Bytes,
}

impl PaymasterParams {
    /// Approval-based params with empty inner input
    pub fn approval_based(paymaster: Address, token: Address, minimal_allowance: U256) -> Self {
        Self {
            paymaster,
            token,
            minimal_allowance,
            inner_input: Bytes::new(),
        }
    }

    pub fn paymaster(&self) -> Address {
        self.paymaster
    }

    #[cfg(test)]
    pub fn minimal_allowance(&self) -> U256 {
        self.minimal_allowance
    }

    /// `approvalBased(address,uint256,bytes)` calldata
    pub fn input(&self) -> Vec<u8> {
        ApprovalBasedCall {
            token: self.token,
            min_allowance: self.minimal_allowance,
            inner_input: self.inner_input.clone(),
        }
        .encode()
    }
}

// The node expects `paymasterInput` as a plain byte array, not a hex string.
impl Serialize for PaymasterParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PaymasterParams", 2)?;
        state.serialize_field("paymaster", &self.paymaster)?;
        state.serialize_field("paymasterInput", &self.input())?;
        state.end()
    }
}
