//! zkSync transaction construction, fee quoting and submission

mod eip712;
mod gas;
mod paymaster;
mod sender;

pub use eip712::{CallRequest, DEFAULT_GAS_PER_PUBDATA_LIMIT};
pub use gas::{FeeQuote, GasEstimator, OraclePrices};
pub use sender::{ExecuteRequest, GasSettings, TransactionSender};
