//! Error taxonomy shared by the session, the navigator and the dispatcher.
//!
//! Runtime conditions a caller is expected to branch on (`BalanceNotSufficient`,
//! `TransactionFailed`) are kept apart from [`ContractViolation`]s, which are
//! defects in the calling code and should fail fast.

use thiserror::Error;

use crate::account::AccountType;
use crate::amount::Amount;

pub type Result<T> = std::result::Result<T, BankError>;

#[derive(Debug, Error)]
pub enum BankError {
    /// A page, form or element the workflow depends on is missing.
    #[error("website not loadable: {0}")]
    WebsiteNotLoadable(String),

    #[error("balance of account '{account}' not sufficient to initiate transaction of {amount} EUR")]
    BalanceNotSufficient { account: String, amount: Amount },

    /// The transfer was submitted but the site did not render a success box.
    #[error("transaction failed for '{source_account}' => '{target}' ({amount})")]
    TransactionFailed {
        source_account: String,
        target: String,
        amount: Amount,
    },

    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

impl BankError {
    pub(crate) fn not_loadable(msg: impl Into<String>) -> Self {
        Self::WebsiteNotLoadable(msg.into())
    }

    /// `true` for errors caused by the caller rather than by the site or the account state.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}

/// Misuse of the session API. Never retried, never expected in a correct program.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("session is not logged in")]
    NotAuthenticated,
    #[error("account '{0}' is not known to this session")]
    UnknownAccount(String),
    #[error("'{0}' is neither an IBAN nor a masked card number")]
    InvalidTargetAccount(String),
    #[error("account type '{0}' can not be mapped")]
    UnmappedAccountType(String),
    #[error("transfer from {source_type:?} to {target_type:?} is not supported")]
    UnsupportedTransfer {
        source_type: AccountType,
        target_type: Option<AccountType>,
    },
    #[error("transfer to another bank needs a creditor name")]
    MissingCreditorName,
    #[error("transfer between checking accounts needs a purpose")]
    MissingPurpose,
    #[error("no staged transaction to confirm")]
    NothingStaged,
    #[error("requested transaction commit is invalid '{source_account}' => '{target}' ({amount})")]
    ConfirmationMismatch {
        source_account: String,
        target: String,
        amount: Amount,
    },
    #[error("transaction needs a TAN")]
    MissingTan,
    #[error("job '{0}' has no absolute amount yet")]
    AmountNotCalculated(String),
}
