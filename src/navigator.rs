//! The capability interface between the transfer workflow and the website.
//!
//! [`Session`](crate::session::Session) only talks to a [`PageNavigator`]. The
//! navigator knows where things are on a page; the session knows what to do
//! with them.

use crate::errors::{BankError, Result};

/// Pages reachable by URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    FinancialStatus,
}

impl Page {
    pub fn path(self) -> &'static str {
        match self {
            Page::Login => "/-",
            Page::FinancialStatus => {
                "/DkbTransactionBanking/content/banking/financialstatus/FinancialComposite/FinancialStatus.xhtml"
            }
        }
    }
}

/// Which form on the current page to work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStep {
    Login,
    /// The form of the current transfer step (account selection, amount, TAN).
    Transfer,
}

/// Review page variants, one per transfer flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewLayout {
    Checking,
    CheckingToCreditCard,
    CreditCardToChecking,
}

/// Status and final URL after a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    pub status: u16,
    pub url: String,
}

impl PageResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// One row of the account table, as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub label: String,
    pub identifier: String,
    pub balance: String,
}

/// Source, target and amount as rendered on a review page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFields {
    pub source: String,
    pub target: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// A filled-in HTML form, ready to submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    action: String,
    fields: Vec<(String, String)>,
    choices: Vec<(String, Vec<Choice>)>,
}

impl Form {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Adds a `<select>` with its options; the first option is preselected.
    pub fn with_choices(mut self, name: impl Into<String>, choices: Vec<Choice>) -> Self {
        let name = name.into();
        let selected = choices.first().map(|c| c.value.clone()).unwrap_or_default();
        self.fields.push((name.clone(), selected));
        self.choices.push((name, choices));
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an existing field. A missing field means the page changed under us.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        let slot = self
            .fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| BankError::not_loadable(format!("form field '{name}' not found")))?;
        slot.1 = value.into();
        Ok(())
    }

    pub fn labels(&self, name: &str) -> Vec<&str> {
        self.choices
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, cs)| cs.iter().map(|c| c.label.as_str()).collect())
            .unwrap_or_default()
    }

    /// Selects the option of `name` whose label is `label`.
    pub fn select_label(&mut self, name: &str, label: &str) -> Result<()> {
        let value = self
            .choices
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, cs)| cs.iter().find(|c| c.label == label))
            .map(|c| c.value.clone())
            .ok_or_else(|| {
                BankError::not_loadable(format!("option '{label}' of '{name}' not found"))
            })?;
        self.set(name, value)
    }
}

/// Everything the session needs from the website.
///
/// `find_*` methods inspect the current page and return `Ok(None)` when the
/// element is absent. Navigation methods replace the current page.
pub trait PageNavigator {
    fn open(&mut self, page: Page) -> Result<PageResponse>;

    fn find_form(&self, step: FormStep) -> Result<Option<Form>>;

    fn submit(&mut self, form: Form) -> Result<PageResponse>;

    /// Row `row` of account group `group` on the financial-status page.
    fn find_account_row(&self, group: usize, row: usize) -> Result<Option<AccountRow>>;

    /// Follows the transfer link of an account row. `Ok(false)` if the row has none.
    fn follow_transfer_link(&mut self, group: usize, row: usize) -> Result<bool>;

    fn find_review(&self, layout: ReviewLayout) -> Result<Option<ReviewFields>>;

    /// Text of the success box rendered after a submitted transfer.
    fn find_success_message(&self) -> Result<Option<String>>;

    /// `Ok(None)` if there is no logout link on the current page.
    fn follow_logout(&mut self) -> Result<Option<PageResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creditor_form() -> Form {
        Form::new("/transfer")
            .with_field("creditorAccountType", "1")
            .with_choices(
                "slOwnCreditorAccounts",
                vec![
                    Choice {
                        value: "0".into(),
                        label: "DE12 3456 7890 1234 5678 90".into(),
                    },
                    Choice {
                        value: "1".into(),
                        label: "4930 **** **** 1234".into(),
                    },
                ],
            )
    }

    #[test]
    fn set_requires_existing_field() {
        let mut form = creditor_form();
        form.set("creditorAccountType", "2").unwrap();
        assert_eq!(form.get("creditorAccountType"), Some("2"));
        assert!(matches!(
            form.set("tan", "123456"),
            Err(BankError::WebsiteNotLoadable(_))
        ));
    }

    #[test]
    fn select_by_label() {
        let mut form = creditor_form();
        assert_eq!(form.get("slOwnCreditorAccounts"), Some("0"));
        assert_eq!(form.labels("slOwnCreditorAccounts").len(), 2);
        form.select_label("slOwnCreditorAccounts", "4930 **** **** 1234")
            .unwrap();
        assert_eq!(form.get("slOwnCreditorAccounts"), Some("1"));
        assert!(form.select_label("slOwnCreditorAccounts", "nope").is_err());
        assert!(form.labels("missing").is_empty());
    }
}
