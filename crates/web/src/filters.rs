//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year, for the footer.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// `tel:` link target for a Brazilian phone number.
///
/// Usage in templates: `<a href="{{ broker.phone|tel_href }}">`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn tel_href(phone: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    let digits: String = phone
        .to_string()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let digits = digits.strip_prefix("55").filter(|d| d.len() >= 10).unwrap_or(&digits);
    Ok(format!("tel:+55{digits}"))
}
