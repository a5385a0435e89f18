//! Declarative per-site tactic tables and attempt configuration.
//!
//! A [`SitePlan`] is data, not code: each step carries an ordered list of
//! candidate selectors tried by priority, so new site skins are added by
//! editing a plan file rather than by new control flow.

use crate::errors::FlowError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Default per-interaction timeout.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Floor for the terminal success-verification wait; post-login redirects
/// can be slow and must not be cut short by the per-step default.
pub const VERIFY_TIMEOUT_FLOOR_MS: u64 = 60_000;

/// Short timeout used for optional probes (interstitials, organization
/// prompts) so skippable steps do not stall the attempt.
pub const OPTIONAL_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Ordered selector tactics for every step of a site's login sequence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SitePlan {
    /// Display name for logs and messages.
    pub name: String,

    /// Where the attempt starts.
    pub entry_url: String,

    /// Regex matched against the URL of the authenticated area.
    pub success_url_pattern: String,

    /// Marker visible only after login; used for the soft-success
    /// fallback when entry navigation errors out.
    #[serde(default)]
    pub post_login_marker: Option<String>,

    /// Accept controls for cookie banners and similar interstitials.
    #[serde(default)]
    pub interstitial_dismiss: Vec<String>,

    /// Controls that open the login surface (modal trigger, "Sign in"
    /// link that spawns a tab). Empty for single-surface flows.
    #[serde(default)]
    pub login_trigger: Vec<String>,

    /// URL regexes identifying a known auth provider page among the open
    /// pages, used when the new-page event is missed.
    #[serde(default)]
    pub auth_provider_patterns: Vec<String>,

    /// Known deep link straight to the login form.
    #[serde(default)]
    pub login_deep_link: Option<String>,

    /// Optional organization/tenant field candidates.
    #[serde(default)]
    pub organization_fields: Vec<String>,

    /// Username field candidates, highest priority first.
    pub username_fields: Vec<String>,

    /// Password field candidates, highest priority first.
    pub password_fields: Vec<String>,

    /// Combined one-time-code field candidates.
    #[serde(default)]
    pub otp_combined_fields: Vec<String>,

    /// Per-digit code inputs in index order (left to right).
    #[serde(default)]
    pub otp_digit_fields: Vec<String>,

    /// Generic submit/verify/continue controls used as the one fallback
    /// click when post-submit verification stalls.
    #[serde(default)]
    pub fallback_submit: Vec<String>,

    /// Markers whose visibility after the primary submit positively
    /// identifies rejected credentials. Empty leaves the rejected state
    /// unreachable for this plan.
    #[serde(default)]
    pub rejection_markers: Vec<String>,
}

impl SitePlan {
    pub fn is_multi_surface(&self) -> bool {
        !self.login_trigger.is_empty()
    }

    /// Compile the success pattern; part of pre-flight validation.
    pub fn success_pattern(&self) -> Result<Regex, FlowError> {
        Regex::new(&self.success_url_pattern).map_err(|err| {
            FlowError::Configuration(format!(
                "invalid success URL pattern '{}': {err}",
                self.success_url_pattern
            ))
        })
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.entry_url.is_empty() {
            return Err(FlowError::Configuration("entry URL is required".into()));
        }
        Url::parse(&self.entry_url).map_err(|err| {
            FlowError::Configuration(format!("invalid entry URL '{}': {err}", self.entry_url))
        })?;
        if self.success_url_pattern.is_empty() {
            return Err(FlowError::Configuration(
                "success URL pattern is required".into(),
            ));
        }
        self.success_pattern()?;
        if self.username_fields.is_empty() || self.password_fields.is_empty() {
            return Err(FlowError::Configuration(
                "username and password selector lists must not be empty".into(),
            ));
        }
        for pattern in &self.auth_provider_patterns {
            Regex::new(pattern).map_err(|err| {
                FlowError::Configuration(format!("invalid auth provider pattern '{pattern}': {err}"))
            })?;
        }
        Ok(())
    }
}

/// Attempt-level configuration resolved from the execution environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Per-interaction timeout in milliseconds.
    #[serde(default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Terminal verification timeout in milliseconds; clamped up to
    /// [`VERIFY_TIMEOUT_FLOOR_MS`].
    #[serde(default = "default_verify_timeout_ms")]
    pub verify_timeout_ms: u64,

    /// DevTools websocket URL of an existing session to reuse instead of
    /// launching a fresh browser.
    #[serde(default)]
    pub existing_session: Option<String>,

    /// Proxy for freshly launched sessions.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_step_timeout_ms() -> u64 {
    DEFAULT_STEP_TIMEOUT_MS
}

fn default_verify_timeout_ms() -> u64 {
    VERIFY_TIMEOUT_FLOOR_MS
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            verify_timeout_ms: VERIFY_TIMEOUT_FLOOR_MS,
            existing_session: None,
            proxy: None,
        }
    }
}

impl FlowConfig {
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.step_timeout_ms == 0 {
            return Err(FlowError::Configuration(
                "step timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Effective verification timeout, never below the floor.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms.max(VERIFY_TIMEOUT_FLOOR_MS))
    }

    /// Timeout for optional probes; bounded by the step timeout.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms.min(OPTIONAL_PROBE_TIMEOUT_MS))
    }
}
