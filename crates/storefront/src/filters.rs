//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// CSS class for an order status badge.
///
/// Usage in templates: `{{ order.status|status_class }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn status_class(status: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format!(
        "status status-{}",
        status.to_string().to_lowercase().replace([' ', '_'], "-")
    ))
}
