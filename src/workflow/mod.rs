//! The two runnable flows: contract deployment and sponsored calls

pub mod deploy;
pub mod sponsored;
