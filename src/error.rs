//! Error types for the paymaster workflow runner

use thiserror::Error;

/// Main error type for the deploy and sponsored-call flows
#[derive(Error, Debug)]
pub enum PaymasterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {0}")]
    ChainConnection(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Artifact error for {name}: {message}")]
    Artifact { name: String, message: String },

    #[error("Invalid bytecode: {0}")]
    InvalidBytecode(String),

    #[error("Transaction {tx_hash} reverted during {operation}")]
    Reverted { operation: String, tx_hash: String },

    #[error("Transaction {tx_hash} dropped before mining during {operation}")]
    Dropped { operation: String, tx_hash: String },

    #[error("No ContractDeployed event in receipt of {tx_hash}")]
    DeploymentAddressMissing { tx_hash: String },

    #[error("Pre-flight check failed: {role} wallet {address} holds {balance} wei, expected 0")]
    WalletNotEmpty {
        role: String,
        address: String,
        balance: String,
    },

    #[error("Oracle {feed} returned a zero price")]
    ZeroOraclePrice { feed: String },

    #[error("Division by zero converting fee: {0} price is zero")]
    DivisionByZero(String),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymasterError {
    /// The run's own assumptions did not hold (nothing was sent on-chain)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PaymasterError::WalletNotEmpty { .. }
                | PaymasterError::Wallet(_)
                | PaymasterError::Config(_)
                | PaymasterError::Artifact { .. }
                | PaymasterError::InvalidBytecode(_)
        )
    }

    /// A transaction reached the chain and did not land as intended
    pub fn is_on_chain(&self) -> bool {
        matches!(
            self,
            PaymasterError::Reverted { .. }
                | PaymasterError::Dropped { .. }
                | PaymasterError::DeploymentAddressMissing { .. }
        )
    }
}

/// Result type for paymaster operations
pub type PaymasterResult<T> = Result<T, PaymasterError>;
