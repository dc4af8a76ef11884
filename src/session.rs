//! Banking session: login, account table, two-phase transfers, logout.
//!
//! ```text
//! anonymous --login--> accounts-loaded --logout--> anonymous
//!                        |
//!                        +-- transfer: idle --stage--> staged --confirm--> confirmed
//! ```

use std::collections::BTreeMap;

use tracing::{error, info, warn};

use crate::account::{Account, AccountType, is_account_id, normalize_account_id};
use crate::amount::{Amount, Separator};
use crate::config::Config;
use crate::errors::{BankError, ContractViolation, Result};
use crate::navigator::{Form, FormStep, Page, PageNavigator, ReviewLayout};
use crate::transfer::{StagedTransfer, TransferKind, TransferRequest, TransferState};

/// Synthetic browser fingerprint sent with the credentials.
const FINGERPRINT: [(&str, &str); 6] = [
    ("jsEnabled", "false"),
    ("browserName", "Firefox"),
    ("browserVersion", "40"),
    ("screenWidth", "1024"),
    ("screenHeight", "768"),
    ("osName", "Windows"),
];

const OWN_ACCOUNTS: &str = "slOwnCreditorAccounts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated,
    AccountsLoaded,
}

pub struct Session<N> {
    navigator: N,
    dry_run: bool,
    auth: AuthState,
    accounts: BTreeMap<String, Account>,
    transfer: TransferState,
}

impl<N: PageNavigator> Session<N> {
    pub fn new(navigator: N, config: &Config) -> Self {
        Self {
            navigator,
            dry_run: config.dry_run,
            auth: AuthState::Anonymous,
            accounts: BTreeMap::new(),
            transfer: TransferState::Idle,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth
    }

    pub fn transfer_state(&self) -> &TransferState {
        &self.transfer
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn balance(&self, id: &str) -> Result<Amount> {
        self.accounts
            .get(id)
            .map(|a| a.balance)
            .ok_or_else(|| ContractViolation::UnknownAccount(id.to_owned()).into())
    }

    /// Logs in and loads the account table. A rejected login is `Ok(false)`.
    pub fn login(&mut self, user: &str, pin: &str) -> Result<bool> {
        info!(user, "starting login");
        let response = self.navigator.open(Page::Login)?;
        if !response.is_ok() {
            error!(status = response.status, "can not open website");
            return Err(BankError::not_loadable(format!(
                "login page answered with status {}",
                response.status
            )));
        }

        let mut form = self
            .navigator
            .find_form(FormStep::Login)?
            .ok_or_else(|| BankError::not_loadable("login form not found, probably the website changed"))?;
        form.set("j_username", user)?;
        form.set("j_password", pin)?;
        for (name, value) in FINGERPRINT {
            form.set(name, value)?;
        }

        let response = self.navigator.submit(form)?;
        if !response.is_ok() || !response.url.contains(Page::FinancialStatus.path()) {
            error!(status = response.status, url = %response.url, "login failed");
            return Ok(false);
        }
        info!("login successful");
        self.auth = AuthState::Authenticated;

        self.load_accounts()?;
        Ok(true)
    }

    /// Walks `tr#gruppe-G_R` style rows until a group starts empty.
    fn load_accounts(&mut self) -> Result<()> {
        self.open_financial_status()?;

        let mut accounts = BTreeMap::new();
        let (mut group, mut row) = (0, 0);
        loop {
            let Some(raw) = self.navigator.find_account_row(group, row)? else {
                if row == 0 {
                    break;
                }
                group += 1;
                row = 0;
                continue;
            };

            let kind = AccountType::from_label(&raw.label)
                .inspect_err(|e| error!(%e, group, row, "unknown account type"))?;
            let id = normalize_account_id(&raw.identifier);
            if id.is_empty() {
                return Err(BankError::not_loadable(format!(
                    "account row {group}_{row} has no identifier"
                )));
            }
            let balance: Amount = raw.balance.parse().map_err(|e| {
                BankError::not_loadable(format!("balance of account '{id}': {e}"))
            })?;

            info!(account = %id, ?kind, %balance, "account");
            accounts.insert(
                id.clone(),
                Account {
                    id,
                    kind,
                    balance,
                    group,
                    row,
                },
            );
            row += 1;
        }

        self.accounts = accounts;
        self.auth = AuthState::AccountsLoaded;
        Ok(())
    }

    fn open_financial_status(&mut self) -> Result<()> {
        let response = self.navigator.open(Page::FinancialStatus)?;
        if !response.is_ok() {
            return Err(BankError::not_loadable(format!(
                "financial status answered with status {}",
                response.status
            )));
        }
        Ok(())
    }

    /// Walks the transfer forms up to the review page and records what the site shows there.
    ///
    /// Nothing is submitted when the request is malformed or the balance does not
    /// cover the amount.
    pub fn stage(&mut self, request: &TransferRequest) -> Result<StagedTransfer> {
        if self.auth != AuthState::AccountsLoaded {
            return Err(ContractViolation::NotAuthenticated.into());
        }
        let source = self
            .accounts
            .get(&request.source)
            .cloned()
            .ok_or_else(|| ContractViolation::UnknownAccount(request.source.clone()))?;
        if !is_account_id(&request.target) {
            return Err(ContractViolation::InvalidTargetAccount(request.target.clone()).into());
        }
        let target_type = self.accounts.get(&request.target).map(|a| a.kind);
        let kind = TransferKind::classify(source.kind, target_type)?;

        let creditor_name = non_empty(&request.creditor_name);
        let purpose = non_empty(&request.purpose);
        match kind {
            TransferKind::CheckingCheckingRemote if creditor_name.is_none() => {
                return Err(ContractViolation::MissingCreditorName.into());
            }
            TransferKind::CheckingCheckingRemote | TransferKind::CheckingCheckingLocal
                if purpose.is_none() =>
            {
                return Err(ContractViolation::MissingPurpose.into());
            }
            _ => {}
        }

        self.transfer = TransferState::Idle;
        self.open_financial_status()?;
        if self
            .navigator
            .find_account_row(source.group, source.row)?
            .is_none()
        {
            return Err(BankError::not_loadable("account element not found"));
        }

        if !source.balance.covers(&request.amount) {
            warn!(
                account = %source.id,
                balance = %source.balance,
                amount = %request.amount,
                "balance not sufficient"
            );
            return Err(BankError::BalanceNotSufficient {
                account: source.id,
                amount: request.amount,
            });
        }

        if !self.navigator.follow_transfer_link(source.group, source.row)? {
            return Err(BankError::not_loadable(format!(
                "transfer link not found for '{}'",
                source.id
            )));
        }

        let layout = match kind {
            TransferKind::CreditCardChecking => {
                self.submit_amount(request.amount, None)?;
                ReviewLayout::CreditCardToChecking
            }
            TransferKind::CheckingCreditCard => {
                self.select_creditor(kind, &request.target, creditor_name)?;
                self.submit_amount(request.amount, None)?;
                ReviewLayout::CheckingToCreditCard
            }
            TransferKind::CheckingCheckingLocal | TransferKind::CheckingCheckingRemote => {
                self.select_creditor(kind, &request.target, creditor_name)?;
                self.submit_amount(request.amount, purpose)?;
                ReviewLayout::Checking
            }
        };

        let review = self
            .navigator
            .find_review(layout)?
            .ok_or_else(|| BankError::not_loadable("transaction review not found"))?;
        let staged = StagedTransfer {
            kind,
            source: normalize_account_id(&review.source),
            target: normalize_account_id(&review.target),
            amount: parse_review_amount(&review.amount)?,
        };
        info!(?staged, "review transaction");

        self.transfer = TransferState::Staged(staged.clone());
        Ok(staged)
    }

    fn transfer_form(&self) -> Result<Form> {
        self.navigator
            .find_form(FormStep::Transfer)?
            .ok_or_else(|| BankError::not_loadable("transfer form not found"))
    }

    /// Account-selection step: an own account is picked from the list, anything
    /// else is entered as a foreign creditor.
    fn select_creditor(
        &mut self,
        kind: TransferKind,
        target: &str,
        creditor_name: Option<&str>,
    ) -> Result<()> {
        let mut form = self.transfer_form()?;
        let wanted = target.replace('*', "");
        let own = form
            .labels(OWN_ACCOUNTS)
            .into_iter()
            .find(|label| {
                let compact: String = label
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != '*')
                    .collect();
                compact.starts_with(&wanted)
            })
            .map(str::to_owned);

        match (own, creditor_name) {
            (Some(label), _) => {
                form.set("creditorAccountType", "2")?;
                form.select_label(OWN_ACCOUNTS, &label)?;
            }
            (None, Some(name)) if kind == TransferKind::CheckingCheckingRemote => {
                form.set("creditorAccountType", "1")?;
                form.set("creditorName", name)?;
                form.set("creditorAccountNo", target)?;
            }
            (None, _) => {
                return Err(BankError::not_loadable(format!(
                    "own account '{target}' not offered as creditor"
                )));
            }
        }
        self.submit_transfer_form(form)
    }

    fn submit_amount(&mut self, amount: Amount, purpose: Option<&str>) -> Result<()> {
        let mut form = self.transfer_form()?;
        form.set("amountToTransfer", amount.format(Separator::Comma))?;
        if let Some(purpose) = purpose {
            form.set("paymentPurposeLine", purpose)?;
        }
        self.submit_transfer_form(form)
    }

    fn submit_transfer_form(&mut self, form: Form) -> Result<()> {
        let response = self.navigator.submit(form)?;
        if !response.is_ok() {
            return Err(BankError::not_loadable(format!(
                "transfer step answered with status {}",
                response.status
            )));
        }
        Ok(())
    }

    /// Submits the staged transfer. `request` must match the staged snapshot exactly.
    pub fn confirm(&mut self, request: &TransferRequest, tan: Option<&str>) -> Result<StagedTransfer> {
        let staged = self
            .transfer
            .staged()
            .cloned()
            .ok_or(ContractViolation::NothingStaged)?;
        if !staged.matches(&request.source, &request.target, request.amount) {
            error!(
                source = %request.source,
                target = %request.target,
                amount = %request.amount,
                "requested transaction commit is invalid"
            );
            return Err(ContractViolation::ConfirmationMismatch {
                source_account: request.source.clone(),
                target: request.target.clone(),
                amount: request.amount,
            }
            .into());
        }

        if self.dry_run {
            info!(
                source = %staged.source,
                target = %staged.target,
                amount = %staged.amount,
                "DRYRUN transaction successful"
            );
        } else {
            let mut form = self.transfer_form()?;
            if staged.kind.requires_tan() {
                let tan = tan
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(ContractViolation::MissingTan)?;
                form.set("tan", tan.trim())?;
            }

            // once the form is out the snapshot must not be submitted again
            let outcome = self
                .navigator
                .submit(form)
                .and_then(|_| self.navigator.find_success_message());
            let message = match outcome {
                Ok(Some(message)) => message,
                Ok(None) => {
                    self.transfer = TransferState::Idle;
                    error!(
                        source = %staged.source,
                        target = %staged.target,
                        amount = %staged.amount,
                        "transaction failed"
                    );
                    return Err(BankError::TransactionFailed {
                        source_account: staged.source,
                        target: staged.target,
                        amount: staged.amount,
                    });
                }
                Err(e) => {
                    self.transfer = TransferState::Idle;
                    return Err(e);
                }
            };
            info!(%message, "transaction successful");
        }

        self.book(&staged);
        self.transfer.confirm();
        Ok(staged)
    }

    /// Moves a confirmed amount between the cached balances so later stages see it.
    /// Dry runs book too, so they predict what a real run would skip.
    fn book(&mut self, staged: &StagedTransfer) {
        if let Some(source) = self.accounts.get_mut(&staged.source) {
            match source.balance.checked_sub(staged.amount) {
                Some(balance) => source.balance = balance,
                None => warn!(account = %source.id, "balance out of range, not updated"),
            }
        }
        if let Some(target) = self.accounts.get_mut(&staged.target) {
            match target.balance.checked_add(staged.amount) {
                Some(balance) => target.balance = balance,
                None => warn!(account = %target.id, "balance out of range, not updated"),
            }
        }
    }

    pub fn logout(&mut self) -> Result<()> {
        if self.auth == AuthState::Anonymous {
            return Ok(());
        }
        let response = self
            .navigator
            .follow_logout()?
            .ok_or_else(|| BankError::not_loadable("logout link not found"))?;
        if !response.is_ok() {
            error!(status = response.status, "logout failed, something went wrong");
            return Err(BankError::not_loadable(format!(
                "logout answered with status {}",
                response.status
            )));
        }
        info!("logout successful, session finished");
        self.auth = AuthState::Anonymous;
        self.accounts.clear();
        self.transfer = TransferState::Idle;
        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Review pages render amounts like `100,00&nbsp;EUR`.
fn parse_review_amount(text: &str) -> Result<Amount> {
    let cleaned = text.replace("&nbsp;", " ").replace('\u{a0}', " ");
    let number = cleaned
        .split_whitespace()
        .next()
        .ok_or_else(|| BankError::not_loadable("empty amount on review page"))?;
    number
        .parse()
        .map_err(|e| BankError::not_loadable(format!("amount on review page: {e}")))
}
