//! Public API for the bank dispatch crate.

pub mod account;
pub mod amount;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod job;
pub mod navigator;
pub mod session;
pub mod site;
pub mod transfer;

#[cfg(test)]
mod mock;

pub use amount::Amount;
pub use config::Config;
pub use dispatch::{DispatchRun, Dispatcher, JobOutcome, Status, TanSource, write_report};
pub use errors::{BankError, ContractViolation};
pub use job::JobList;
pub use session::Session;
pub use site::DkbSite;
pub use transfer::{StagedTransfer, TransferRequest};
