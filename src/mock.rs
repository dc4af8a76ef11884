//! Scripted in-memory website used by the session and dispatcher tests.

use crate::account::AccountType;
use crate::errors::Result;
use crate::navigator::{
    AccountRow, Choice, Form, FormStep, Page, PageNavigator, PageResponse, ReviewFields,
    ReviewLayout,
};

pub const CHECKING: &str = "DE12345678901234567890";
pub const SAVINGS: &str = "DE09876543210987654321";
pub const CARD: &str = "4930********1234";
pub const REMOTE: &str = "DE55500105175407324931";

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Blank,
    Login,
    FinancialStatus,
    Creditor { source: String },
    Amount { source: String, target: String, layout: ReviewLayout },
    Review { review: ReviewFields, layout: ReviewLayout },
    Done,
}

#[derive(Debug)]
pub struct MockSite {
    pub user: String,
    pub pin: String,
    pub groups: Vec<Vec<AccountRow>>,
    /// Checking account credit-card payouts go to.
    pub card_payout: String,
    pub transfer_succeeds: bool,
    pub review_override: Option<ReviewFields>,
    pub login_status: u16,
    pub login_form: bool,
    pub transfer_links: bool,
    pub logout_status: u16,
    /// Every form handed to `submit`, in order.
    pub submitted: Vec<Form>,
    step: Step,
}

pub fn row(label: &str, identifier: &str, balance: &str) -> AccountRow {
    AccountRow {
        label: label.into(),
        identifier: identifier.into(),
        balance: balance.into(),
    }
}

impl MockSite {
    /// One checking account with 500,00 and one credit card with 0,00.
    pub fn new() -> Self {
        Self::with_groups(vec![
            vec![row("Girokonto", "DE12 3456 7890 1234 5678 90", "500,00")],
            vec![row("Kreditkarte", "4930 **** **** 1234", "0,00")],
        ])
    }

    pub fn with_groups(groups: Vec<Vec<AccountRow>>) -> Self {
        Self {
            user: "alice".into(),
            pin: "12345".into(),
            groups,
            card_payout: CHECKING.into(),
            transfer_succeeds: true,
            review_override: None,
            login_status: 200,
            login_form: true,
            transfer_links: true,
            logout_status: 200,
            submitted: Vec::new(),
            step: Step::Blank,
        }
    }

    fn own_accounts(&self) -> Vec<Choice> {
        self.groups
            .iter()
            .flatten()
            .enumerate()
            .map(|(i, r)| Choice {
                value: i.to_string(),
                label: r.identifier.clone(),
            })
            .collect()
    }

    fn label_for(&self, value: &str) -> Option<String> {
        self.own_accounts()
            .into_iter()
            .find(|c| c.value == value)
            .map(|c| c.label)
    }

    fn ok(url: &str) -> PageResponse {
        PageResponse {
            status: 200,
            url: format!("https://bank.test{url}"),
        }
    }
}

impl PageNavigator for MockSite {
    fn open(&mut self, page: Page) -> Result<PageResponse> {
        self.step = match page {
            Page::Login => Step::Login,
            Page::FinancialStatus => Step::FinancialStatus,
        };
        let mut response = Self::ok(page.path());
        if page == Page::Login {
            response.status = self.login_status;
        }
        Ok(response)
    }

    fn find_form(&self, step: FormStep) -> Result<Option<Form>> {
        let form = match (step, &self.step) {
            (FormStep::Login, Step::Login) if self.login_form => [
                "j_username",
                "j_password",
                "jsEnabled",
                "browserName",
                "browserVersion",
                "screenWidth",
                "screenHeight",
                "osName",
            ]
            .into_iter()
            .fold(Form::new("/login"), |f, name| f.with_field(name, "")),
            (FormStep::Transfer, Step::Creditor { .. }) => Form::new("/transfer/creditor")
                .with_field("creditorAccountType", "1")
                .with_choices("slOwnCreditorAccounts", self.own_accounts())
                .with_field("creditorName", "")
                .with_field("creditorAccountNo", ""),
            (FormStep::Transfer, Step::Amount { .. }) => Form::new("/transfer/amount")
                .with_field("amountToTransfer", "")
                .with_field("paymentPurposeLine", ""),
            (FormStep::Transfer, Step::Review { .. }) => {
                Form::new("/transfer/confirm").with_field("tan", "")
            }
            _ => return Ok(None),
        };
        Ok(Some(form))
    }

    fn submit(&mut self, form: Form) -> Result<PageResponse> {
        let next = match self.step.clone() {
            Step::Login => {
                let accepted = form.get("j_username") == Some(self.user.as_str())
                    && form.get("j_password") == Some(self.pin.as_str())
                    && form.get("browserName") == Some("Firefox");
                self.submitted.push(form);
                if !accepted {
                    return Ok(Self::ok(Page::Login.path()));
                }
                self.step = Step::FinancialStatus;
                return Ok(Self::ok(Page::FinancialStatus.path()));
            }
            Step::Creditor { source } => {
                let (target, layout) = if form.get("creditorAccountType") == Some("2") {
                    let value = form.get("slOwnCreditorAccounts").unwrap_or_default();
                    let label = self.label_for(value).unwrap_or_default();
                    let layout = if label.contains('*') {
                        ReviewLayout::CheckingToCreditCard
                    } else {
                        ReviewLayout::Checking
                    };
                    (label, layout)
                } else {
                    let target = form.get("creditorAccountNo").unwrap_or_default();
                    (target.to_owned(), ReviewLayout::Checking)
                };
                Step::Amount {
                    source,
                    target,
                    layout,
                }
            }
            Step::Amount {
                source,
                target,
                layout,
            } => Step::Review {
                review: ReviewFields {
                    source: format!("{source} / Girokonto"),
                    target,
                    amount: format!("{}\u{a0}EUR", form.get("amountToTransfer").unwrap_or_default()),
                },
                layout,
            },
            Step::Review { .. } => Step::Done,
            _ => Step::Blank,
        };
        self.submitted.push(form);
        self.step = next;
        Ok(Self::ok("/transfer"))
    }

    fn find_account_row(&self, group: usize, row: usize) -> Result<Option<AccountRow>> {
        if self.step != Step::FinancialStatus {
            return Ok(None);
        }
        Ok(self.groups.get(group).and_then(|g| g.get(row)).cloned())
    }

    fn follow_transfer_link(&mut self, group: usize, row: usize) -> Result<bool> {
        let Some(found) = self.find_account_row(group, row)? else {
            return Ok(false);
        };
        if !self.transfer_links {
            return Ok(false);
        }
        let source = found.identifier.clone();
        self.step = match AccountType::from_label(&found.label) {
            Ok(AccountType::CreditCard) => Step::Amount {
                source,
                target: self.card_payout.clone(),
                layout: ReviewLayout::CreditCardToChecking,
            },
            _ => Step::Creditor { source },
        };
        Ok(true)
    }

    fn find_review(&self, layout: ReviewLayout) -> Result<Option<ReviewFields>> {
        match &self.step {
            Step::Review { review, layout: expected } if *expected == layout => Ok(Some(
                self.review_override.clone().unwrap_or_else(|| review.clone()),
            )),
            _ => Ok(None),
        }
    }

    fn find_success_message(&self) -> Result<Option<String>> {
        Ok((self.step == Step::Done && self.transfer_succeeds)
            .then(|| "Der Auftrag wurde ausgeführt.".to_owned()))
    }

    fn follow_logout(&mut self) -> Result<Option<PageResponse>> {
        self.step = Step::Blank;
        Ok(Some(PageResponse {
            status: self.logout_status,
            url: "https://bank.test/logout".into(),
        }))
    }
}

