//! Accounts as listed in the financial-status table.

use std::sync::LazyLock;

use regex::Regex;

use crate::amount::Amount;
use crate::errors::ContractViolation;

static ACCOUNT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]{2}[0-9]{20}|[0-9]{4}\*{8}[0-9]{4})$").expect("static regex")
});

const CHECKING_LABELS: [&str; 2] = ["Girokonto", "DKB-Cash"];
const CREDITCARD_LABELS: [&str; 2] = ["Kreditkarte", "DKB-VISA-Tagesgeld"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Checking,
    CreditCard,
}

impl AccountType {
    /// Maps the product label shown in the account table.
    pub fn from_label(label: &str) -> Result<Self, ContractViolation> {
        let label = label.trim();
        if CHECKING_LABELS.contains(&label) {
            Ok(AccountType::Checking)
        } else if CREDITCARD_LABELS.contains(&label) {
            Ok(AccountType::CreditCard)
        } else {
            Err(ContractViolation::UnmappedAccountType(label.to_owned()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub kind: AccountType,
    pub balance: Amount,
    /// Position in the account table, only used to find the row again.
    pub group: usize,
    pub row: usize,
}

/// IBAN (`DE` + 20 digits) or masked card number (`1234********5678`).
pub fn is_account_id(candidate: &str) -> bool {
    ACCOUNT_ID.is_match(candidate)
}

/// Strips whitespace and anything after a `/` from an account text as rendered by the site.
pub fn normalize_account_id(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.rfind('/') {
        Some(idx) => compact[..idx].to_owned(),
        None => compact,
    }
}
