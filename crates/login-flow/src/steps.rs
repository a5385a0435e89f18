//! The ordered step sequence of one login attempt.
//!
//! Each step tries its tactics in declared priority order; required steps
//! are fatal on exhaustion, optional steps skip silently. Retries apply to
//! detection and probing only — a submit that was accepted by the page is
//! never re-issued.

use crate::errors::FlowError;
use crate::observer::FlowObserver;
use crate::otp::{self, OtpLayout};
use crate::plan::{FlowConfig, SitePlan};
use crate::probe;
use crate::types::{StepOutcome, TerminalState};
use cdp_driver::{Key, PageDriver};
use passage_core_types::ResolvedCredentials;
use regex::Regex;
use tracing::{debug, warn};

/// Drives the canonical step sequence against one live page.
pub struct StepRunner<'a> {
    driver: &'a dyn PageDriver,
    plan: &'a SitePlan,
    config: &'a FlowConfig,
    observer: &'a dyn FlowObserver,
    creds: &'a ResolvedCredentials,
    success: Regex,
    state: TerminalState,
}

impl<'a> StepRunner<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        plan: &'a SitePlan,
        config: &'a FlowConfig,
        observer: &'a dyn FlowObserver,
        creds: &'a ResolvedCredentials,
        success: Regex,
    ) -> Self {
        Self {
            driver,
            plan,
            config,
            observer,
            creds,
            success,
            state: TerminalState::default(),
        }
    }

    /// Run the sequence to its terminal state. Never propagates an error;
    /// failures land in [`TerminalState::failure`].
    pub async fn run(mut self) -> TerminalState {
        if let Err(err) = self.drive().await {
            self.state.failure = Some(err);
        }
        if self.state.last_url.is_none() {
            if let Ok(url) = self.driver.current_url().await {
                self.state.last_url = Some(url);
            }
        }
        self.state
    }

    async fn drive(&mut self) -> Result<(), FlowError> {
        self.navigate_entry().await?;
        if self.precheck_authenticated().await {
            return Ok(());
        }
        self.dismiss_interstitial().await;
        self.open_login_surface().await?;
        self.enter_organization().await;
        self.enter_username().await?;
        self.enter_password_and_submit().await?;
        if let Some(code) = self.creds.otp.clone() {
            self.complete_second_factor(&code).await?;
        }
        self.verify_success().await
    }

    /// Navigate to the entry URL. A navigation error is forgiven when a
    /// known post-login marker is already visible (soft success).
    async fn navigate_entry(&mut self) -> Result<(), FlowError> {
        const STEP: &str = "navigate-entry";
        self.observer.on_step_start(STEP);

        let result = self
            .driver
            .navigate(&self.plan.entry_url, self.config.step_timeout())
            .await;

        let outcome = match result {
            Ok(()) => StepOutcome::succeeded(format!("reached {}", self.plan.entry_url)),
            Err(err) => {
                let marker_visible = match &self.plan.post_login_marker {
                    Some(marker) => self
                        .driver
                        .wait_for_visible(marker, self.config.probe_timeout())
                        .await
                        .is_ok(),
                    None => false,
                };
                if marker_visible {
                    StepOutcome::succeeded("navigation errored but post-login marker is visible")
                } else {
                    self.observer
                        .on_step_end(STEP, &StepOutcome::failed(err.to_string()));
                    return Err(FlowError::interaction(STEP, err.to_string()));
                }
            }
        };
        self.observer.on_step_end(STEP, &outcome);
        Ok(())
    }

    /// Check whether the session already sits in the authenticated area.
    async fn precheck_authenticated(&mut self) -> bool {
        const STEP: &str = "detect-authenticated";
        self.observer.on_step_start(STEP);

        let url = match self.driver.current_url().await {
            Ok(url) => url,
            Err(err) => {
                self.observer
                    .on_step_end(STEP, &StepOutcome::skipped(err.to_string()));
                return false;
            }
        };
        let authenticated = self.success.is_match(&url);
        if authenticated {
            self.state.pre_authenticated = true;
            self.state.last_url = Some(url.clone());
            self.observer
                .on_step_end(STEP, &StepOutcome::succeeded(format!("already at {url}")));
        } else {
            self.observer
                .on_step_end(STEP, &StepOutcome::skipped(format!("current URL {url}")));
        }
        authenticated
    }

    /// Optional: dismiss a cookie banner or modal if one shows up quickly.
    async fn dismiss_interstitial(&mut self) {
        const STEP: &str = "dismiss-interstitial";
        if self.plan.interstitial_dismiss.is_empty() {
            return;
        }
        self.observer.on_step_start(STEP);

        let probe_timeout = self.config.probe_timeout();
        let outcome = match probe::first_visible(
            self.driver,
            &self.plan.interstitial_dismiss,
            probe_timeout,
        )
        .await
        {
            Some(selector) => match self.driver.click(&selector, probe_timeout).await {
                Ok(()) => StepOutcome::succeeded(format!("dismissed via {selector}")),
                Err(err) => {
                    warn!(error = %err, "interstitial dismiss click failed");
                    StepOutcome::failed(err.to_string())
                }
            },
            None => StepOutcome::skipped("no interstitial detected"),
        };
        self.observer.on_step_end(STEP, &outcome);
    }

    /// Open the login surface for multi-surface flows: click the trigger,
    /// wait for the new page, fall back to scanning open pages for a known
    /// auth provider, then to the deep link.
    async fn open_login_surface(&mut self) -> Result<(), FlowError> {
        const STEP: &str = "open-login-surface";
        if !self.plan.is_multi_surface() {
            return Ok(());
        }
        self.observer.on_step_start(STEP);
        let step_timeout = self.config.step_timeout();

        let trigger =
            probe::first_visible(self.driver, &self.plan.login_trigger, step_timeout).await;
        let clicked = match &trigger {
            Some(selector) => self.driver.click(selector, step_timeout).await.is_ok(),
            None => false,
        };

        if clicked {
            match self.driver.wait_for_new_page(step_timeout).await {
                Ok(page) => {
                    self.driver
                        .activate(&page.handle)
                        .await
                        .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
                    self.observer.on_step_end(
                        STEP,
                        &StepOutcome::succeeded(format!("new page at {}", page.url)),
                    );
                    return Ok(());
                }
                Err(err) => debug!(error = %err, "no new page event; scanning open pages"),
            }
        }

        // Fallback: an auth-provider page may already be open.
        if let Some(page) = self.find_auth_provider_page().await? {
            self.driver
                .activate(&page)
                .await
                .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
            self.observer
                .on_step_end(STEP, &StepOutcome::succeeded("matched open auth page"));
            return Ok(());
        }

        // Fallback: navigate straight to the known deep link.
        if let Some(deep_link) = &self.plan.login_deep_link {
            self.driver
                .navigate(deep_link, step_timeout)
                .await
                .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
            self.observer
                .on_step_end(STEP, &StepOutcome::succeeded(format!("deep link {deep_link}")));
            return Ok(());
        }

        if clicked {
            // Trigger accepted but no page change observed; the login form
            // may render inline. Continue on the current page.
            self.observer.on_step_end(
                STEP,
                &StepOutcome::succeeded("trigger clicked; continuing on current page"),
            );
            return Ok(());
        }

        let outcome = StepOutcome::failed("no login trigger or fallback surface usable");
        self.observer.on_step_end(STEP, &outcome);
        Err(FlowError::interaction(STEP, outcome.detail))
    }

    async fn find_auth_provider_page(&self) -> Result<Option<cdp_driver::PageRef>, FlowError> {
        if self.plan.auth_provider_patterns.is_empty() {
            return Ok(None);
        }
        let pages = self
            .driver
            .list_open_pages()
            .await
            .map_err(|err| FlowError::interaction("open-login-surface", err.to_string()))?;
        for pattern in &self.plan.auth_provider_patterns {
            // Patterns were validated pre-flight.
            let Ok(regex) = Regex::new(pattern) else {
                continue;
            };
            if let Some(page) = pages.iter().find(|page| regex.is_match(&page.url)) {
                return Ok(Some(page.handle.clone()));
            }
        }
        Ok(None)
    }

    /// Optional: enter the organization/tenant when the plan has a field
    /// for it and the bundle resolved one. Skips silently otherwise.
    async fn enter_organization(&mut self) {
        const STEP: &str = "enter-organization";
        let Some(organization) = &self.creds.organization else {
            return;
        };
        if self.plan.organization_fields.is_empty() {
            return;
        }
        self.observer.on_step_start(STEP);

        let probe_timeout = self.config.probe_timeout();
        let outcome = match probe::first_visible(
            self.driver,
            &self.plan.organization_fields,
            probe_timeout,
        )
        .await
        {
            Some(selector) => {
                let filled = self
                    .driver
                    .fill(&selector, organization, self.config.step_timeout())
                    .await;
                match filled {
                    Ok(()) => {
                        if let Err(err) = self
                            .driver
                            .press_key(&selector, Key::Enter, self.config.step_timeout())
                            .await
                        {
                            warn!(error = %err, "organization submit key failed");
                        }
                        StepOutcome::succeeded(format!("organization entered via {selector}"))
                    }
                    Err(err) => StepOutcome::failed(err.to_string()),
                }
            }
            None => StepOutcome::skipped("organization prompt not shown"),
        };
        self.observer.on_step_end(STEP, &outcome);
    }

    /// Probe for a required field. On a miss, scroll the page to pull
    /// lazily rendered forms into view and re-probe once with the short
    /// timeout. Re-probing is detection only.
    async fn probe_required_field(&self, candidates: &[String]) -> Option<String> {
        if let Some(selector) =
            probe::first_visible(self.driver, candidates, self.config.step_timeout()).await
        {
            return Some(selector);
        }
        if self.driver.evaluate_scroll(400).await.is_err() {
            return None;
        }
        probe::first_visible(self.driver, candidates, self.config.probe_timeout()).await
    }

    async fn enter_username(&mut self) -> Result<(), FlowError> {
        const STEP: &str = "enter-username";
        self.observer.on_step_start(STEP);
        let step_timeout = self.config.step_timeout();

        let Some(selector) = self.probe_required_field(&self.plan.username_fields).await else {
            let outcome = StepOutcome::failed("username field not found");
            self.observer.on_step_end(STEP, &outcome);
            return Err(FlowError::interaction(STEP, outcome.detail));
        };

        self.driver
            .fill(&selector, &self.creds.username, step_timeout)
            .await
            .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
        // Tab advances focus without risking a premature form submit.
        if let Err(err) = self.driver.press_key(&selector, Key::Tab, step_timeout).await {
            debug!(error = %err, "username advance key failed; continuing");
        }
        self.observer
            .on_step_end(STEP, &StepOutcome::succeeded(format!("filled {selector}")));
        Ok(())
    }

    /// Fill the password and press Enter. This is the one permitted
    /// primary submit of the whole attempt.
    async fn enter_password_and_submit(&mut self) -> Result<(), FlowError> {
        const STEP: &str = "enter-password";
        self.observer.on_step_start(STEP);
        let step_timeout = self.config.step_timeout();

        let Some(selector) = self.probe_required_field(&self.plan.password_fields).await else {
            let outcome = StepOutcome::failed("password field not found");
            self.observer.on_step_end(STEP, &outcome);
            return Err(FlowError::interaction(STEP, outcome.detail));
        };

        self.driver
            .fill(&selector, &self.creds.password, step_timeout)
            .await
            .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;

        debug_assert_eq!(self.state.primary_submits, 0);
        self.driver
            .press_key(&selector, Key::Enter, step_timeout)
            .await
            .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
        self.state.primary_submits += 1;

        self.observer.on_step_end(
            STEP,
            &StepOutcome::succeeded(format!("password submitted via {selector}")),
        );
        Ok(())
    }

    /// Locate the one-time-code inputs, fill the code, and submit once.
    /// The submit key-press is raced against a navigation wait; neither
    /// winning order matters and a navigation timeout is not fatal.
    async fn complete_second_factor(&mut self, code: &str) -> Result<(), FlowError> {
        const STEP: &str = "second-factor";
        self.observer.on_step_start(STEP);
        let step_timeout = self.config.step_timeout();

        let Some(layout) = otp::detect_layout(self.driver, self.plan, step_timeout).await else {
            let outcome = StepOutcome::failed("OTP inputs not found");
            self.observer.on_step_end(STEP, &outcome);
            return Err(FlowError::OtpInputsNotFound);
        };

        let submit_field = match &layout {
            OtpLayout::Combined(selector) => {
                self.driver
                    .fill(selector, code, step_timeout)
                    .await
                    .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
                selector.clone()
            }
            OtpLayout::Digits(selectors) => {
                let digits = code.chars().count();
                if digits != selectors.len() {
                    let outcome = StepOutcome::failed(format!(
                        "one-time code has {digits} digits but {} inputs are visible",
                        selectors.len()
                    ));
                    self.observer.on_step_end(STEP, &outcome);
                    return Err(FlowError::interaction(STEP, outcome.detail));
                }
                for (selector, digit) in selectors.iter().zip(code.chars()) {
                    self.driver
                        .fill(selector, &digit.to_string(), step_timeout)
                        .await
                        .map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
                }
                match selectors.last().cloned() {
                    Some(last) => last,
                    None => {
                        return Err(FlowError::Unexpected(
                            "digit OTP layout resolved without fields".into(),
                        ))
                    }
                }
            }
        };

        debug_assert_eq!(self.state.otp_submits, 0);
        let (pressed, navigated) = tokio::join!(
            self.driver.press_key(&submit_field, Key::Enter, step_timeout),
            self.driver.wait_for_url_pattern(&self.success, step_timeout),
        );
        pressed.map_err(|err| FlowError::interaction(STEP, err.to_string()))?;
        self.state.otp_submits += 1;

        if navigated.is_err() {
            // The key-press may not have submitted; try the one fallback
            // click on a distinct generic control. Never re-press the key.
            if let Some(control) = probe::first_visible(
                self.driver,
                &self.plan.fallback_submit,
                self.config.probe_timeout(),
            )
            .await
            {
                if let Err(err) = self.driver.click(&control, step_timeout).await {
                    warn!(error = %err, "fallback verify click failed");
                }
            }
        }

        self.observer
            .on_step_end(STEP, &StepOutcome::succeeded("one-time code submitted"));
        Ok(())
    }

    /// Terminal step: wait for the authenticated-area pattern with the
    /// long verification timeout, recheck the URL once on timeout, and
    /// look for rejection evidence before giving up.
    async fn verify_success(&mut self) -> Result<(), FlowError> {
        const STEP: &str = "verify-success";
        self.observer.on_step_start(STEP);

        match self
            .driver
            .wait_for_url_pattern(&self.success, self.config.verify_timeout())
            .await
        {
            Ok(url) => {
                self.state.verified_url = Some(url.clone());
                self.state.last_url = Some(url.clone());
                self.observer
                    .on_step_end(STEP, &StepOutcome::succeeded(format!("reached {url}")));
                return Ok(());
            }
            Err(err) => debug!(error = %err, "verification wait elapsed; rechecking URL"),
        }

        // One-shot recheck: the page may have redirected right at the
        // deadline.
        let last_url = self
            .driver
            .current_url()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        if self.success.is_match(&last_url) {
            self.state.verified_url = Some(last_url.clone());
            self.state.last_url = Some(last_url.clone());
            self.observer.on_step_end(
                STEP,
                &StepOutcome::succeeded(format!("recheck matched {last_url}")),
            );
            return Ok(());
        }
        self.state.last_url = Some(last_url.clone());

        if self.state.primary_submits == 1 && !self.plan.rejection_markers.is_empty() {
            if let Some(marker) = probe::first_visible(
                self.driver,
                &self.plan.rejection_markers,
                self.config.probe_timeout(),
            )
            .await
            {
                self.state.rejection_evidence = Some(marker.clone());
                self.observer.on_step_end(
                    STEP,
                    &StepOutcome::failed(format!("rejection marker '{marker}' visible")),
                );
                return Ok(());
            }
        }

        let outcome = StepOutcome::failed(format!("no match; last URL {last_url}"));
        self.observer.on_step_end(STEP, &outcome);
        Err(FlowError::VerificationTimeout { last_url })
    }
}
