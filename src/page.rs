//! The two structural contracts the portal's HTML is relied upon for: a
//! `form.authenticate` marker on the login challenge and a `div.chart`
//! carrying the JSON payload in its `data-values` attribute. Everything else
//! on the page is ignored.

use scraper::{Html, Selector};
use serde_json::Value;

use crate::error::PortalError;

const LOGIN_FORM_SELECTOR: &str = "form.authenticate";
const CHART_SELECTOR: &str = "div.chart";
const CHART_DATA_ATTR: &str = "data-values";

/// The hidden inputs the login form carries, in submission order.
const LOGIN_FORM_FIELDS: [&str; 2] = ["_token", "returnUrl"];

fn selector(css: &str) -> Result<Selector, PortalError> {
    Selector::parse(css).map_err(|_| PortalError::extraction(format!("selector `{}`", css)))
}

/// Whether the body is the login challenge rather than the data page.
pub(crate) fn has_login_form(html: &str) -> Result<bool, PortalError> {
    let document = Html::parse_document(html);
    Ok(document.select(&selector(LOGIN_FORM_SELECTOR)?).next().is_some())
}

/// Scrapes the anti-forgery fields from the login page and combines them with
/// the account credentials into the form body for the login POST.
pub(crate) fn login_form(
    html: &str,
    login: &str,
    password: &str,
) -> Result<Vec<(String, String)>, PortalError> {
    let document = Html::parse_document(html);
    let mut form = Vec::with_capacity(LOGIN_FORM_FIELDS.len() + 2);

    for field in LOGIN_FORM_FIELDS {
        let value = document
            .select(&selector(&format!("input[name={}]", field))?)
            .next()
            .and_then(|input| input.value().attr("value"))
            .ok_or_else(|| {
                PortalError::extraction(format!("hidden `{}` input on the login page", field))
            })?;
        form.push((field.to_string(), value.to_string()));
    }

    form.push(("login".to_string(), login.to_string()));
    form.push(("password".to_string(), password.to_string()));

    Ok(form)
}

/// Reads the chart element's embedded JSON document.
pub(crate) fn chart_payload(html: &str) -> Result<Value, PortalError> {
    let document = Html::parse_document(html);
    let raw = document
        .select(&selector(CHART_SELECTOR)?)
        .next()
        .and_then(|chart| chart.value().attr(CHART_DATA_ATTR))
        .ok_or_else(|| PortalError::extraction("chart `data-values` attribute"))?;

    Ok(serde_json::from_str(raw)?)
}
