//! Second-factor input detection.

use crate::plan::SitePlan;
use crate::probe;
use cdp_driver::PageDriver;
use std::time::Duration;
use tracing::debug;

/// Minimum number of visible single-digit inputs for the multi-field
/// tactic to apply.
pub const MIN_DIGIT_FIELDS: usize = 6;

/// Closed set of one-time-code input layouts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OtpLayout {
    /// One combined input taking the whole code.
    Combined(String),
    /// Single-digit inputs in index order, left to right.
    Digits(Vec<String>),
}

/// Locate the OTP inputs on the active page.
///
/// The combined-field tactic wins when any combined candidate is visible;
/// otherwise the digit tactic applies when at least [`MIN_DIGIT_FIELDS`]
/// digit inputs are visible. `None` means no usable inputs were found.
pub async fn detect_layout(
    driver: &dyn PageDriver,
    plan: &SitePlan,
    timeout: Duration,
) -> Option<OtpLayout> {
    if let Some(selector) = probe::first_visible(driver, &plan.otp_combined_fields, timeout).await {
        debug!(selector = %selector, "combined OTP field located");
        return Some(OtpLayout::Combined(selector));
    }

    let digits = probe::all_visible(driver, &plan.otp_digit_fields, timeout).await;
    if digits.len() >= MIN_DIGIT_FIELDS {
        debug!(fields = digits.len(), "single-digit OTP fields located");
        return Some(OtpLayout::Digits(digits));
    }

    None
}
