//! The live DKB website behind a [`PageNavigator`].
//!
//! Blocking `reqwest` client with a cookie jar for the session, `scraper` for
//! the markup. Every selector the workflow depends on lives in this file.

use reqwest::Url;
use reqwest::blocking::{Client, Response};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::Config;
use crate::errors::{BankError, Result};
use crate::navigator::{
    AccountRow, Choice, Form, FormStep, Page, PageNavigator, PageResponse, ReviewFields,
    ReviewLayout,
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; rv:40.0) Gecko/20100101 Firefox/40.0";

/// Transfer pages carry two navigation forms before the one we fill in.
const TRANSFER_FORM_INDEX: usize = 2;

const CARD_REVIEW: &str = "#form1434775544_1 > fieldset:nth-child(2)";

struct Loaded {
    url: Url,
    html: Html,
}

pub struct DkbSite {
    client: Client,
    base_url: Url,
    current: Option<Loaded>,
}

impl DkbSite {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            BankError::not_loadable(format!("invalid base url '{}': {e}", config.base_url))
        })?;
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url,
            current: None,
        })
    }

    fn load(&mut self, response: Response) -> Result<PageResponse> {
        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.text()?;
        debug!(status, %url, bytes = body.len(), "page loaded");
        self.current = Some(Loaded {
            url: url.clone(),
            html: Html::parse_document(&body),
        });
        Ok(PageResponse {
            status,
            url: url.into(),
        })
    }

    fn get(&mut self, url: Url) -> Result<PageResponse> {
        let response = self.client.get(url).send()?;
        self.load(response)
    }

    /// Resolves `href` against the current page.
    fn resolve(&self, href: &str) -> Result<Url> {
        let base = self.current.as_ref().map_or(&self.base_url, |l| &l.url);
        base.join(href)
            .map_err(|e| BankError::not_loadable(format!("bad link '{href}': {e}")))
    }

    fn html(&self) -> Option<&Html> {
        self.current.as_ref().map(|l| &l.html)
    }
}

impl PageNavigator for DkbSite {
    fn open(&mut self, page: Page) -> Result<PageResponse> {
        let url = self
            .base_url
            .join(page.path())
            .map_err(|e| BankError::not_loadable(format!("bad path '{}': {e}", page.path())))?;
        self.get(url)
    }

    fn find_form(&self, step: FormStep) -> Result<Option<Form>> {
        match &self.current {
            Some(loaded) => find_form(&loaded.html, &loaded.url, step),
            None => Ok(None),
        }
    }

    fn submit(&mut self, form: Form) -> Result<PageResponse> {
        let action = self.resolve(form.action())?;
        debug!(%action, fields = form.fields().len(), "submitting form");
        let response = self.client.post(action).form(form.fields()).send()?;
        self.load(response)
    }

    fn find_account_row(&self, group: usize, row: usize) -> Result<Option<AccountRow>> {
        match self.html() {
            Some(html) => account_row(html, group, row),
            None => Ok(None),
        }
    }

    fn follow_transfer_link(&mut self, group: usize, row: usize) -> Result<bool> {
        let Some(html) = self.html() else {
            return Ok(false);
        };
        let Some(href) = transfer_link(html, group, row)? else {
            return Ok(false);
        };
        let url = self.resolve(&href)?;
        self.get(url)?;
        Ok(true)
    }

    fn find_review(&self, layout: ReviewLayout) -> Result<Option<ReviewFields>> {
        match self.html() {
            Some(html) => review(html, layout),
            None => Ok(None),
        }
    }

    fn find_success_message(&self) -> Result<Option<String>> {
        match self.html() {
            Some(html) => success_message(html),
            None => Ok(None),
        }
    }

    fn follow_logout(&mut self) -> Result<Option<PageResponse>> {
        let Some(html) = self.html() else {
            return Ok(None);
        };
        let Some(href) = first(html.root_element(), "a#logout")?
            .and_then(|a| a.value().attr("href").map(str::to_owned))
        else {
            return Ok(None);
        };
        let url = self.resolve(&href)?;
        self.get(url).map(Some)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| BankError::not_loadable(format!("selector '{css}': {e:?}")))
}

fn first<'a>(scope: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).next())
}

fn text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_owned()
}

/// `td` cell inside an account row; a present row with a missing cell means the markup changed.
fn cell(row: ElementRef<'_>, css: &str) -> Result<String> {
    first(row, css)?
        .map(text)
        .ok_or_else(|| BankError::not_loadable(format!("website element '{css}' not found")))
}

fn row_element(html: &Html, group: usize, row: usize) -> Result<Option<ElementRef<'_>>> {
    first(html.root_element(), &format!("tr#gruppe-{group}_{row}"))
}

fn account_row(html: &Html, group: usize, row: usize) -> Result<Option<AccountRow>> {
    let Some(tr) = row_element(html, group, row)? else {
        return Ok(None);
    };
    Ok(Some(AccountRow {
        label: cell(tr, "td div.forceWrap")?,
        identifier: cell(tr, "td div.iban")?,
        balance: cell(tr, "td.amount span")?,
    }))
}

fn transfer_link(html: &Html, group: usize, row: usize) -> Result<Option<String>> {
    let Some(tr) = row_element(html, group, row)? else {
        return Ok(None);
    };
    Ok(first(tr, r#"a[tid="remittance"]"#)?
        .and_then(|a| a.value().attr("href").map(str::to_owned)))
}

fn find_form(html: &Html, page_url: &Url, step: FormStep) -> Result<Option<Form>> {
    let element = match step {
        FormStep::Login => first(html.root_element(), "form#login")?,
        FormStep::Transfer => html.select(&selector("form")?).nth(TRANSFER_FORM_INDEX),
    };
    element.map(|el| parse_form(el, page_url)).transpose()
}

fn parse_form(element: ElementRef<'_>, page_url: &Url) -> Result<Form> {
    let action = element
        .value()
        .attr("action")
        .and_then(|a| page_url.join(a).ok())
        .unwrap_or_else(|| page_url.clone());
    let mut form = Form::new(action.as_str());
    let mut submit_seen = false;

    for control in element.select(&selector("input, select, textarea")?) {
        let attrs = control.value();
        let Some(name) = attrs.attr("name") else {
            continue;
        };
        if attrs.attr("disabled").is_some() {
            continue;
        }
        let value = attrs.attr("value").unwrap_or_default();

        match attrs.name() {
            "select" => {
                let options = control.select(&selector("option")?).collect::<Vec<_>>();
                let choices = options
                    .iter()
                    .map(|o| Choice {
                        value: o
                            .value()
                            .attr("value")
                            .map(str::to_owned)
                            .unwrap_or_else(|| text(*o)),
                        label: text(*o),
                    })
                    .collect::<Vec<_>>();
                let selected = options
                    .iter()
                    .zip(&choices)
                    .find(|(o, _)| o.value().attr("selected").is_some())
                    .map(|(_, c)| c.value.clone());
                form = form.with_choices(name, choices);
                if let Some(selected) = selected {
                    form.set(name, selected)?;
                }
            }
            "textarea" => form = form.with_field(name, text(control)),
            _ => {
                let kind = attrs.attr("type").unwrap_or("text").to_ascii_lowercase();
                let checked = attrs.attr("checked").is_some();
                match kind.as_str() {
                    "radio" => {
                        if form.get(name).is_none() {
                            form = form.with_field(name, "");
                        }
                        if checked {
                            form.set(name, value)?;
                        }
                    }
                    "checkbox" if checked => form = form.with_field(name, value),
                    "checkbox" | "button" | "reset" | "image" => {}
                    "submit" => {
                        if !submit_seen {
                            form = form.with_field(name, value);
                            submit_seen = true;
                        }
                    }
                    _ => form = form.with_field(name, value),
                }
            }
        }
    }
    Ok(form)
}

fn review(html: &Html, layout: ReviewLayout) -> Result<Option<ReviewFields>> {
    let card_field = |n: usize| {
        format!("{CARD_REVIEW} > p:nth-child({n}) > span.col65.floatRight > strong")
    };
    let selectors: [String; 3] = match layout {
        ReviewLayout::Checking => [
            r#"[id="outOrderingCustomerAccount.accountNo"]"#.into(),
            "#outCreditorAccountNo".into(),
            "#outAmountToTransfer".into(),
        ],
        ReviewLayout::CheckingToCreditCard => [
            "#outOrderingCustomerAccount".into(),
            "#outOwnPayeeAccount".into(),
            "#outAmountToTransfer".into(),
        ],
        ReviewLayout::CreditCardToChecking => [card_field(1), card_field(2), card_field(3)],
    };

    let root = html.root_element();
    let mut values = Vec::with_capacity(3);
    for css in &selectors {
        match first(root, css)? {
            Some(el) => values.push(text(el)),
            None => return Ok(None),
        }
    }
    let [source, target, amount]: [String; 3] = values
        .try_into()
        .map_err(|_| BankError::not_loadable("review fields incomplete"))?;
    Ok(Some(ReviewFields {
        source,
        target,
        amount,
    }))
}

fn success_message(html: &Html) -> Result<Option<String>> {
    let Some(boxed) = html.select(&selector("[class]")?).find(|el| {
        el.value()
            .attr("class")
            .is_some_and(|c| c.to_ascii_lowercase().contains("successbox"))
    }) else {
        return Ok(None);
    };
    let message = first(boxed, "ul li")?.map(text).unwrap_or_else(|| text(boxed));
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{body}</body></html>"))
    }

    fn url() -> Url {
        Url::parse("https://www.dkb.de/banking/transfer.xhtml").unwrap()
    }

    const ACCOUNTS: &str = r#"
        <table>
          <tr id="gruppe-0_0">
            <td><div class="forceWrap"> Girokonto </div><div class="iban">DE12 3456 7890 1234 5678 90</div></td>
            <td class="amount"><span>1.500,00</span></td>
            <td><a tid="remittance" href="/banking/remittance?row=0">Überweisung</a></td>
          </tr>
          <tr id="gruppe-1_0">
            <td><div class="forceWrap">Kreditkarte</div><div class="iban">4930 **** **** 1234</div></td>
            <td class="amount"><span>-20,00</span></td>
          </tr>
          <tr id="gruppe-1_1">
            <td><div class="forceWrap">Kreditkarte</div></td>
          </tr>
        </table>"#;

    #[test]
    fn reads_account_rows() {
        let html = page(ACCOUNTS);
        assert_eq!(
            account_row(&html, 0, 0).unwrap(),
            Some(AccountRow {
                label: "Girokonto".into(),
                identifier: "DE12 3456 7890 1234 5678 90".into(),
                balance: "1.500,00".into(),
            })
        );
        assert_eq!(account_row(&html, 0, 1).unwrap(), None);
        assert_eq!(
            account_row(&html, 1, 0).unwrap().map(|r| r.balance),
            Some("-20,00".into())
        );
        assert!(matches!(
            account_row(&html, 1, 1),
            Err(BankError::WebsiteNotLoadable(_))
        ));
    }

    #[test]
    fn finds_transfer_links() {
        let html = page(ACCOUNTS);
        assert_eq!(
            transfer_link(&html, 0, 0).unwrap().as_deref(),
            Some("/banking/remittance?row=0")
        );
        assert_eq!(transfer_link(&html, 1, 0).unwrap(), None);
    }

    #[test]
    fn parses_login_form() {
        let html = page(
            r#"<form id="login" action="/login" method="post">
                 <input type="text" name="j_username">
                 <input type="password" name="j_password">
                 <input type="hidden" name="jsEnabled" value="true">
                 <input type="hidden" name="browserName">
                 <input type="checkbox" name="remember" value="1">
                 <input type="submit" name="login" value="Anmelden">
                 <input type="submit" name="help" value="Hilfe">
               </form>"#,
        );
        let form = find_form(&html, &url(), FormStep::Login).unwrap().unwrap();
        assert_eq!(form.action(), "https://www.dkb.de/login");
        assert_eq!(form.get("jsEnabled"), Some("true"));
        assert_eq!(form.get("browserName"), Some(""));
        assert_eq!(form.get("remember"), None);
        assert_eq!(form.get("login"), Some("Anmelden"));
        assert_eq!(form.get("help"), None);
    }

    #[test]
    fn transfer_form_is_the_third_form() {
        let html = page(
            r#"<form action="/nav1"></form>
               <form action="/nav2"></form>
               <form action="transfer.xhtml?step=2">
                 <input type="radio" name="creditorAccountType" value="1" checked>
                 <input type="radio" name="creditorAccountType" value="2">
                 <select name="slOwnCreditorAccounts">
                   <option value="a">DE12 3456 7890 1234 5678 90</option>
                   <option value="b" selected>4930 **** **** 1234</option>
                 </select>
                 <input name="creditorName">
                 <textarea name="note"> hi </textarea>
               </form>"#,
        );
        let mut form = find_form(&html, &url(), FormStep::Transfer)
            .unwrap()
            .unwrap();
        assert_eq!(form.action(), "https://www.dkb.de/banking/transfer.xhtml?step=2");
        assert_eq!(form.get("creditorAccountType"), Some("1"));
        assert_eq!(form.get("slOwnCreditorAccounts"), Some("b"));
        assert_eq!(form.get("note"), Some("hi"));
        assert_eq!(form.labels("slOwnCreditorAccounts")[0], "DE12 3456 7890 1234 5678 90");

        form.set("creditorAccountType", "2").unwrap();
        assert_eq!(
            form.fields()
                .iter()
                .filter(|(n, _)| n == "creditorAccountType")
                .count(),
            1
        );

        let html = page(r#"<form action="/nav1"></form>"#);
        assert!(find_form(&html, &url(), FormStep::Transfer).unwrap().is_none());
    }

    #[test]
    fn reads_review_layouts() {
        let html = page(
            r#"<span id="outOrderingCustomerAccount.accountNo">DE12 3456 7890 1234 5678 90 / Girokonto</span>
               <span id="outCreditorAccountNo">DE55 5001 0517 5407 3249 31</span>
               <span id="outAmountToTransfer">20,00 EUR</span>"#,
        );
        let fields = review(&html, ReviewLayout::Checking).unwrap().unwrap();
        assert_eq!(fields.target, "DE55 5001 0517 5407 3249 31");
        assert_eq!(fields.amount, "20,00 EUR");
        assert_eq!(review(&html, ReviewLayout::CheckingToCreditCard).unwrap(), None);

        let html = page(
            r#"<form id="form1434775544_1">
                 <fieldset><legend>x</legend></fieldset>
                 <fieldset>
                   <p><span class="col65 floatRight"><strong>4930 **** **** 1234</strong></span></p>
                   <p><span class="col65 floatRight"><strong>DE12 3456 7890 1234 5678 90</strong></span></p>
                   <p><span class="col65 floatRight"><strong>50,00&nbsp;EUR</strong></span></p>
                 </fieldset>
               </form>"#,
        );
        let fields = review(&html, ReviewLayout::CreditCardToChecking)
            .unwrap()
            .unwrap();
        assert_eq!(fields.source, "4930 **** **** 1234");
        assert_eq!(fields.amount, "50,00\u{a0}EUR");
    }

    #[test]
    fn finds_success_box() {
        let html = page(
            r#"<div class="box SuccessBox"><ul><li>Auftrag ausgeführt</li></ul></div>"#,
        );
        assert_eq!(
            success_message(&html).unwrap().as_deref(),
            Some("Auftrag ausgeführt")
        );
        let html = page(r#"<div class="errorBox">Fehler</div>"#);
        assert_eq!(success_message(&html).unwrap(), None);
    }
}
