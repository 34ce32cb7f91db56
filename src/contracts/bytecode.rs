//! EraVM bytecode validation and hashing
//!
//! zkSync deploys by bytecode hash, not by raw init code. The hash layout is
//! `[version = 1, 0, length in words (u16 BE), sha256(code)[4..32]]`.

use crate::error::{PaymasterError, PaymasterResult};

use ethers::types::H256;
use sha2::{Digest, Sha256};

const MAX_BYTECODE_LENGTH_IN_WORDS: usize = (1 << 16) - 1;
const MAX_BYTECODE_LENGTH_BYTES: usize = MAX_BYTECODE_LENGTH_IN_WORDS * 32;
const ERA_VM_BYTECODE_VERSION: u8 = 1;

/// Check that the bytecode can be published as a factory dependency
pub fn validate_bytecode(code: &[u8]) -> PaymasterResult<()> {
    let len = code.len();

    if len > MAX_BYTECODE_LENGTH_BYTES {
        return Err(PaymasterError::InvalidBytecode(format!(
            "{} bytes, while max {} allowed",
            len, MAX_BYTECODE_LENGTH_BYTES
        )));
    }

    if len % 32 != 0 {
        return Err(PaymasterError::InvalidBytecode(
            "length is not divisible by 32".to_string(),
        ));
    }

    if (len / 32) % 2 == 0 {
        return Err(PaymasterError::InvalidBytecode(
            "even number of 32-byte words".to_string(),
        ));
    }

    Ok(())
}

/// Hash bytecode the way the ContractDeployer and KnownCodesStorage expect
pub fn hash_bytecode(code: &[u8]) -> PaymasterResult<H256> {
    validate_bytecode(code)?;

    let digest = Sha256::digest(code);
    let len_in_words = (code.len() / 32) as u16;

    let mut hash = [0u8; 32];
    hash[0] = ERA_VM_BYTECODE_VERSION;
    hash[2..4].copy_from_slice(&len_in_words.to_be_bytes());
    hash[4..].copy_from_slice(&digest[4..]);

    Ok(H256(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_layout() {
        let code = vec![0xabu8; 96];
        let hash = hash_bytecode(&code).unwrap();
        let digest = Sha256::digest(&code);

        assert_eq!(hash.0[0], 1);
        assert_eq!(hash.0[1], 0);
        assert_eq!(u16::from_be_bytes([hash.0[2], hash.0[3]]), 3);
        assert_eq!(&hash.0[4..], &digest[4..]);
    }

    #[test]
    fn test_rejects_unaligned_length() {
        let err = hash_bytecode(&[0u8; 33]).unwrap_err();
        assert!(matches!(err, PaymasterError::InvalidBytecode(_)));
    }

    #[test]
    fn test_rejects_even_word_count() {
        assert!(validate_bytecode(&[0u8; 64]).is_err());
        assert!(validate_bytecode(&[0u8; 32]).is_ok());
    }
}
