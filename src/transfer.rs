//! Transfer classification and the two-phase stage / confirm state.

use crate::account::AccountType;
use crate::amount::Amount;
use crate::errors::ContractViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Checking account to another checking account of the same login.
    CheckingCheckingLocal,
    /// Checking account to an IBAN at another bank.
    CheckingCheckingRemote,
    CheckingCreditCard,
    CreditCardChecking,
}

impl TransferKind {
    /// `target` is `None` when the target account is not part of this login.
    pub fn classify(
        source: AccountType,
        target: Option<AccountType>,
    ) -> Result<Self, ContractViolation> {
        match (source, target) {
            (AccountType::Checking, None) => Ok(Self::CheckingCheckingRemote),
            (AccountType::Checking, Some(AccountType::Checking)) => Ok(Self::CheckingCheckingLocal),
            (AccountType::Checking, Some(AccountType::CreditCard)) => Ok(Self::CheckingCreditCard),
            (AccountType::CreditCard, Some(AccountType::Checking)) => Ok(Self::CreditCardChecking),
            (source_type, target_type) => Err(ContractViolation::UnsupportedTransfer {
                source_type,
                target_type,
            }),
        }
    }

    pub fn requires_tan(self) -> bool {
        matches!(
            self,
            Self::CheckingCheckingLocal | Self::CheckingCheckingRemote
        )
    }

    /// Credit-card sourced transfers have no account-selection step.
    pub fn selects_creditor(self) -> bool {
        self != Self::CreditCardChecking
    }
}

/// What the caller wants to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub source: String,
    pub target: String,
    pub amount: Amount,
    pub creditor_name: Option<String>,
    pub purpose: Option<String>,
}

impl TransferRequest {
    pub fn new(source: impl Into<String>, target: impl Into<String>, amount: Amount) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            amount,
            creditor_name: None,
            purpose: None,
        }
    }

    pub fn creditor_name(mut self, name: impl Into<String>) -> Self {
        self.creditor_name = Some(name.into());
        self
    }

    pub fn purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }
}

/// The transfer as re-displayed by the site on its review page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedTransfer {
    pub kind: TransferKind,
    pub source: String,
    pub target: String,
    pub amount: Amount,
}

impl StagedTransfer {
    pub fn matches(&self, source: &str, target: &str, amount: Amount) -> bool {
        self.source == source && self.target == target && self.amount == amount
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransferState {
    #[default]
    Idle,
    Staged(StagedTransfer),
    Confirmed(StagedTransfer),
}

impl TransferState {
    pub fn staged(&self) -> Option<&StagedTransfer> {
        match self {
            TransferState::Staged(staged) => Some(staged),
            _ => None,
        }
    }

    /// Moves `Staged` to `Confirmed`. Returns `false` and changes nothing otherwise.
    pub(crate) fn confirm(&mut self) -> bool {
        match std::mem::take(self) {
            TransferState::Staged(staged) => {
                *self = TransferState::Confirmed(staged);
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }
}
