//! zksolc Hardhat artifact loading
//!
//! Artifacts are looked up by contract name under the configured directory,
//! either as `<dir>/<Name>.sol/<Name>.json` (Hardhat layout) or `<dir>/<Name>.json`.

use crate::error::{PaymasterError, PaymasterResult};

use ethers::abi::{Abi, Token};
use ethers::types::Bytes;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

/// Compiled contract: ABI plus EraVM bytecode
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub contract_name: String,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl Artifact {
    /// ABI-encode constructor arguments (without the bytecode prefix)
    pub fn encode_constructor(&self, args: &[Token]) -> PaymasterResult<Bytes> {
        match self.abi.constructor() {
            Some(constructor) => constructor
                .encode_input(Vec::new(), args)
                .map(Bytes::from)
                .map_err(|e| PaymasterError::Artifact {
                    name: self.contract_name.clone(),
                    message: format!("Invalid constructor arguments: {}", e),
                }),
            None if args.is_empty() => Ok(Bytes::new()),
            None => Err(PaymasterError::Artifact {
                name: self.contract_name.clone(),
                message: format!("No constructor, but {} arguments given", args.len()),
            }),
        }
    }
}

/// Resolves artifacts by name from a directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load an artifact by contract name
    pub fn load(&self, name: &str) -> PaymasterResult<Artifact> {
        let path = self.resolve(name)?;
        debug!("Loading artifact {} from {:?}", name, path);

        let raw = std::fs::read_to_string(&path).map_err(|e| PaymasterError::Artifact {
            name: name.to_string(),
            message: format!("Failed to read {:?}: {}", path, e),
        })?;

        let artifact: Artifact =
            serde_json::from_str(&raw).map_err(|e| PaymasterError::Artifact {
                name: name.to_string(),
                message: format!("Malformed artifact {:?}: {}", path, e),
            })?;

        if artifact.bytecode.is_empty() {
            return Err(PaymasterError::Artifact {
                name: name.to_string(),
                message: "Artifact has no bytecode (abstract contract or interface?)".to_string(),
            });
        }

        Ok(artifact)
    }

    fn resolve(&self, name: &str) -> PaymasterResult<PathBuf> {
        let candidates = [
            self.dir.join(format!("{}.sol", name)).join(format!("{}.json", name)),
            self.dir.join(format!("{}.json", name)),
        ];

        candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .ok_or_else(|| PaymasterError::Artifact {
                name: name.to_string(),
                message: format!("Not found under {:?}", self.dir),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;
    use std::path::Path;

    fn write_artifact(dir: &Path, name: &str, nested: bool) {
        let json = serde_json::json!({
            "_format": "hh-zksolc-artifact-1",
            "contractName": name,
            "sourceName": format!("contracts/{}.sol", name),
            "abi": [{
                "type": "constructor",
                "inputs": [
                    { "name": "name", "type": "string", "internalType": "string" },
                    { "name": "symbol", "type": "string", "internalType": "string" },
                    { "name": "decimals", "type": "uint8", "internalType": "uint8" }
                ],
                "stateMutability": "nonpayable"
            }],
            "bytecode": format!("0x{}", "00".repeat(32)),
            "deployedBytecode": format!("0x{}", "00".repeat(32)),
            "factoryDeps": {}
        });

        let path = if nested {
            let sub = dir.join(format!("{}.sol", name));
            std::fs::create_dir_all(&sub).unwrap();
            sub.join(format!("{}.json", name))
        } else {
            dir.join(format!("{}.json", name))
        };
        std::fs::write(path, json.to_string()).unwrap();
    }

    #[test]
    fn test_load_hardhat_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "MyERC20", true);

        let store = ArtifactStore::new(dir.path());
        let artifact = store.load("MyERC20").unwrap();
        assert_eq!(artifact.contract_name, "MyERC20");
        assert_eq!(artifact.bytecode.len(), 32);
    }

    #[test]
    fn test_load_flat_layout() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "Greeter", false);

        let store = ArtifactStore::new(dir.path());
        assert!(store.load("Greeter").is_ok());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.load("VIPNFT").unwrap_err();
        assert!(matches!(err, PaymasterError::Artifact { .. }));
    }

    #[test]
    fn test_encode_constructor() {
        let dir = tempfile::tempdir().unwrap();
        write_artifact(dir.path(), "MyERC20", true);
        let artifact = ArtifactStore::new(dir.path()).load("MyERC20").unwrap();

        let args = vec![
            Token::String("USDC".to_string()),
            Token::String("USDC".to_string()),
            Token::Uint(U256::from(18)),
        ];
        let encoded = artifact.encode_constructor(&args).unwrap();
        assert_eq!(encoded.to_vec(), ethers::abi::encode(&args));

        // Wrong arity is rejected by the ABI
        assert!(artifact.encode_constructor(&args[..1]).is_err());
    }
}
