//! End-to-end controller tests against a scripted fake page driver.

use async_trait::async_trait;
use cdp_driver::{
    DriverError, Key, OpenPage, PageDriver, PageRef, ProvisionError, SessionProvisioner,
    SessionSpec,
};
use credential_store::{CredentialError, CredentialProvider};
use login_flow::{FlowConfig, LoginFlowController, NullObserver, SitePlan};
use passage_core_types::{
    CredentialBundle, CredentialRecord, CustomField, IdentityRef, LoginOutcome,
};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeState {
    visible: HashSet<String>,
    current_url: String,
    /// Pressing Enter on these selectors moves the page to the mapped URL.
    submit_transitions: HashMap<String, String>,
    /// Clicking these selectors moves the page to the mapped URL.
    click_transitions: HashMap<String, String>,
    open_pages: Vec<OpenPage>,
    new_page: Option<OpenPage>,
    fail_navigation: bool,
    nav_calls: Vec<String>,
    fill_calls: Vec<(String, String)>,
    press_calls: Vec<(String, String)>,
    click_calls: Vec<String>,
    activated: Vec<String>,
    close_calls: u32,
}

#[derive(Clone)]
struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    fn new(state: Arc<Mutex<FakeState>>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.nav_calls.push(url.to_string());
        if state.fail_navigation {
            return Err(DriverError::nav_timeout("scripted navigation failure"));
        }
        state.current_url = url.to_string();
        Ok(())
    }

    async fn wait_for_visible(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        let state = self.state.lock().unwrap();
        if state.visible.contains(selector) {
            Ok(())
        } else {
            Err(DriverError::timeout(format!("'{selector}' not visible")))
        }
    }

    async fn fill(
        &self,
        selector: &str,
        value: &str,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state
            .fill_calls
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn press_key(
        &self,
        selector: &str,
        key: Key,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state
            .press_calls
            .push((selector.to_string(), key.as_str().to_string()));
        if key == Key::Enter {
            if let Some(next) = state.submit_transitions.get(selector).cloned() {
                state.current_url = next;
            }
        }
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.click_calls.push(selector.to_string());
        if let Some(next) = state.click_transitions.get(selector).cloned() {
            state.current_url = next;
        }
        Ok(())
    }

    async fn evaluate_scroll(&self, _delta_y: i64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().current_url.clone())
    }

    async fn wait_for_url_pattern(
        &self,
        pattern: &Regex,
        _timeout: Duration,
    ) -> Result<String, DriverError> {
        let url = self.state.lock().unwrap().current_url.clone();
        if pattern.is_match(&url) {
            Ok(url)
        } else {
            Err(DriverError::timeout(format!("'{url}' never matched")))
        }
    }

    async fn list_open_pages(&self) -> Result<Vec<OpenPage>, DriverError> {
        Ok(self.state.lock().unwrap().open_pages.clone())
    }

    async fn wait_for_new_page(&self, _timeout: Duration) -> Result<OpenPage, DriverError> {
        let state = self.state.lock().unwrap();
        state
            .new_page
            .clone()
            .ok_or_else(|| DriverError::timeout("no new page"))
    }

    async fn activate(&self, page: &PageRef) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.activated.push(page.0.clone());
        let url = state
            .open_pages
            .iter()
            .chain(state.new_page.iter())
            .find(|open| &open.handle == page)
            .map(|open| open.url.clone());
        if let Some(url) = url {
            state.current_url = url;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.state.lock().unwrap().close_calls += 1;
        Ok(())
    }
}

struct FakeProvisioner {
    state: Arc<Mutex<FakeState>>,
    provision_count: Arc<Mutex<u32>>,
    specs: Arc<Mutex<Vec<SessionSpec>>>,
}

#[async_trait]
impl SessionProvisioner for FakeProvisioner {
    async fn provision(&self, spec: &SessionSpec) -> Result<Box<dyn PageDriver>, ProvisionError> {
        *self.provision_count.lock().unwrap() += 1;
        self.specs.lock().unwrap().push(spec.clone());
        Ok(Box::new(FakeDriver::new(self.state.clone())))
    }
}

struct FakeCredentials {
    bundle: Option<CredentialBundle>,
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn fetch(&self, identity: &IdentityRef) -> Result<CredentialBundle, CredentialError> {
        self.bundle
            .clone()
            .ok_or_else(|| CredentialError::NotFound(identity.to_string()))
    }
}

struct Harness {
    state: Arc<Mutex<FakeState>>,
    provision_count: Arc<Mutex<u32>>,
    specs: Arc<Mutex<Vec<SessionSpec>>>,
    controller: LoginFlowController,
}

fn harness(bundle: Option<CredentialBundle>, state: FakeState) -> Harness {
    harness_with_config(bundle, state, FlowConfig::default())
}

fn harness_with_config(
    bundle: Option<CredentialBundle>,
    state: FakeState,
    config: FlowConfig,
) -> Harness {
    let state = Arc::new(Mutex::new(state));
    let provision_count = Arc::new(Mutex::new(0));
    let specs = Arc::new(Mutex::new(Vec::new()));
    let controller = LoginFlowController::new(
        Arc::new(FakeCredentials { bundle }),
        Arc::new(FakeProvisioner {
            state: state.clone(),
            provision_count: provision_count.clone(),
            specs: specs.clone(),
        }),
        config,
    )
    .with_observer(Arc::new(NullObserver));
    Harness {
        state,
        provision_count,
        specs,
        controller,
    }
}

fn base_plan() -> SitePlan {
    SitePlan {
        name: "example".into(),
        entry_url: "https://example.com/login".into(),
        success_url_pattern: r"example\.com/feed".into(),
        username_fields: vec!["#user".into()],
        password_fields: vec!["#pass".into()],
        ..SitePlan::default()
    }
}

fn password_bundle(username: &str, password: &str) -> CredentialBundle {
    CredentialBundle::new(
        "demo",
        vec![CredentialRecord::UsernamePassword {
            username: username.into(),
            password: password.into(),
        }],
    )
}

fn login_form_state() -> FakeState {
    let mut state = FakeState::default();
    state.visible.insert("#user".into());
    state.visible.insert("#pass".into());
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/feed".into());
    state
}

fn enter_counts(state: &FakeState) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for (selector, key) in &state.press_calls {
        if key == "Enter" {
            *counts.entry(selector.clone()).or_insert(0) += 1;
        }
    }
    counts
}

// Scenario A: plain username/password login succeeds end to end.
#[tokio::test]
async fn full_login_succeeds_and_names_user() {
    let h = harness(Some(password_bundle("u", "p")), login_form_state());
    let outcome = h
        .controller
        .run_login(&IdentityRef::new("id"), &base_plan())
        .await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    assert!(outcome.message().contains("u"));

    let state = h.state.lock().unwrap();
    assert_eq!(state.close_calls, 1);
    assert!(state
        .fill_calls
        .contains(&("#pass".to_string(), "p".to_string())));
}

// Scenario B: a bundle without a password never reaches the browser.
#[tokio::test]
async fn missing_password_fails_before_any_browser_work() {
    let bundle = CredentialBundle::new(
        "demo",
        vec![CredentialRecord::Custom {
            fields: vec![CustomField {
                name: "username".into(),
                value: "u".into(),
            }],
        }],
    );
    let h = harness(Some(bundle), login_form_state());
    let outcome = h
        .controller
        .run_login(&IdentityRef::new("id"), &base_plan())
        .await;

    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));
    assert!(outcome.message().contains("password"));
    assert_eq!(*h.provision_count.lock().unwrap(), 0);
    assert!(h.state.lock().unwrap().nav_calls.is_empty());
}

// Scenario C: OTP on file but no OTP inputs on the page.
#[tokio::test]
async fn otp_inputs_missing_is_attempt_failed() {
    let mut bundle = password_bundle("u", "p");
    bundle.records.push(CredentialRecord::Authenticator {
        secret: "123456".into(),
    });
    let mut state = login_form_state();
    // Password submit lands on an OTP interstitial, not the feed.
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/otp".into());

    let mut plan = base_plan();
    plan.otp_combined_fields = vec!["#code".into()];
    plan.otp_digit_fields = (0..6).map(|i| format!("#d{i}")).collect();

    let h = harness(Some(bundle), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));
    assert!(outcome.message().contains("OTP inputs not found"));
    assert_eq!(h.state.lock().unwrap().close_calls, 1);
}

// Scenario D: verification never matches; message carries the last URL.
#[tokio::test]
async fn verification_timeout_reports_last_url() {
    let mut state = login_form_state();
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/login?error=1".into());

    let h = harness(Some(password_bundle("u", "p")), state);
    let outcome = h
        .controller
        .run_login(&IdentityRef::new("id"), &base_plan())
        .await;

    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));
    assert!(outcome.message().contains("error=1"));
    assert_eq!(h.state.lock().unwrap().close_calls, 1);
}

// Pre-login check short-circuits without touching credential fields.
#[tokio::test]
async fn already_authenticated_short_circuits() {
    let mut state = login_form_state();
    state.current_url = "https://example.com/feed".into();
    // Navigation keeps the authenticated URL (session cookie redirect).
    state.fail_navigation = false;

    let mut plan = base_plan();
    plan.entry_url = "https://example.com/feed".into();

    let h = harness(Some(password_bundle("u", "p")), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(outcome.is_success());
    let state = h.state.lock().unwrap();
    assert!(state.fill_calls.is_empty());
    assert!(state.press_calls.is_empty());
    assert_eq!(state.close_calls, 1);
}

// At most one primary submit and one OTP submit, even when verification
// stalls and the fallback click fires.
#[tokio::test]
async fn submits_fire_at_most_once() {
    let mut bundle = password_bundle("u", "p");
    bundle.records.push(CredentialRecord::Authenticator {
        secret: "654321".into(),
    });

    let mut state = login_form_state();
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/otp".into());
    state.visible.insert("#code".into());
    state.visible.insert("#verify".into());
    // The OTP Enter does not navigate; the fallback click does not either,
    // so the attempt ends in verification timeout.
    let mut plan = base_plan();
    plan.otp_combined_fields = vec!["#code".into()];
    plan.fallback_submit = vec!["#verify".into()];

    let h = harness(Some(bundle), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;
    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));

    let state = h.state.lock().unwrap();
    let counts = enter_counts(&state);
    assert_eq!(counts.get("#pass"), Some(&1));
    assert_eq!(counts.get("#code"), Some(&1));
    assert!(state.click_calls.contains(&"#verify".to_string()));
    assert_eq!(state.close_calls, 1);
}

// Combined OTP field wins when visible.
#[tokio::test]
async fn otp_uses_combined_field_when_present() {
    let mut bundle = password_bundle("u", "p");
    bundle.records.push(CredentialRecord::Authenticator {
        secret: "987654".into(),
    });

    let mut state = login_form_state();
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/otp".into());
    state.visible.insert("#code".into());
    state
        .submit_transitions
        .insert("#code".into(), "https://example.com/feed".into());

    let mut plan = base_plan();
    plan.otp_combined_fields = vec!["#code".into()];
    plan.otp_digit_fields = (0..6).map(|i| format!("#d{i}")).collect();

    let h = harness(Some(bundle), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let state = h.state.lock().unwrap();
    assert!(state
        .fill_calls
        .contains(&("#code".to_string(), "987654".to_string())));
    assert!(!state.fill_calls.iter().any(|(sel, _)| sel.starts_with("#d")));
}

// Digit fields are filled left to right and submitted on the last one.
#[tokio::test]
async fn otp_fills_digit_fields_in_index_order() {
    let mut bundle = password_bundle("u", "p");
    bundle.records.push(CredentialRecord::Authenticator {
        secret: "135790".into(),
    });

    let mut state = login_form_state();
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/otp".into());
    for i in 0..6 {
        state.visible.insert(format!("#d{i}"));
    }
    state
        .submit_transitions
        .insert("#d5".into(), "https://example.com/feed".into());

    let mut plan = base_plan();
    plan.otp_combined_fields = vec!["#code".into()];
    plan.otp_digit_fields = (0..6).map(|i| format!("#d{i}")).collect();

    let h = harness(Some(bundle), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let state = h.state.lock().unwrap();
    let digit_fills: Vec<_> = state
        .fill_calls
        .iter()
        .filter(|(sel, _)| sel.starts_with("#d"))
        .cloned()
        .collect();
    let expected: Vec<(String, String)> = "135790"
        .chars()
        .enumerate()
        .map(|(i, c)| (format!("#d{i}"), c.to_string()))
        .collect();
    assert_eq!(digit_fills, expected);
    let counts = enter_counts(&state);
    assert_eq!(counts.get("#d5"), Some(&1));
}

// When two candidates are visible the earlier one in the declared list
// wins, run after run.
#[tokio::test]
async fn selector_priority_is_deterministic() {
    for _ in 0..5 {
        let mut state = login_form_state();
        state.visible.insert("input[name=login]".into());
        // "#user" is already visible and listed first.

        let mut plan = base_plan();
        plan.username_fields = vec!["#user".into(), "input[name=login]".into()];

        let h = harness(Some(password_bundle("u", "p")), state);
        let outcome = h
            .controller
            .run_login(&IdentityRef::new("id"), &plan)
            .await;
        assert!(outcome.is_success());

        let state = h.state.lock().unwrap();
        let username_fill = state
            .fill_calls
            .iter()
            .find(|(_, value)| value == "u")
            .cloned()
            .unwrap();
        assert_eq!(username_fill.0, "#user");
    }
}

// Multi-surface flow: no new-page event, but a known auth provider page
// is already open and gets activated.
#[tokio::test]
async fn login_surface_falls_back_to_open_page_scan() {
    let mut state = FakeState::default();
    state.visible.insert("#signin".into());
    state.visible.insert("#user".into());
    state.visible.insert("#pass".into());
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/feed".into());
    state.open_pages = vec![OpenPage {
        handle: PageRef("auth-page".into()),
        url: "https://auth.example.com/oauth/authorize".into(),
    }];

    let mut plan = base_plan();
    plan.login_trigger = vec!["#signin".into()];
    plan.auth_provider_patterns = vec![r"auth\.example\.com".into()];

    let h = harness(Some(password_bundle("u", "p")), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let state = h.state.lock().unwrap();
    assert!(state.click_calls.contains(&"#signin".to_string()));
    assert_eq!(state.activated, vec!["auth-page".to_string()]);
}

// Rejection markers turn a failed verification into CredentialsRejected.
#[tokio::test]
async fn rejection_marker_yields_credentials_rejected() {
    let mut state = login_form_state();
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/login?failed=1".into());
    state.visible.insert(".login-error".into());

    let mut plan = base_plan();
    plan.rejection_markers = vec![".login-error".into()];

    let h = harness(Some(password_bundle("u", "p")), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(matches!(outcome, LoginOutcome::CredentialsRejected(_)));
    assert_eq!(h.state.lock().unwrap().close_calls, 1);
}

// A new-page event after the trigger click is the first tactic of the
// multi-surface step; the popup gets activated directly.
#[tokio::test]
async fn login_surface_uses_new_page_event() {
    let mut state = FakeState::default();
    state.visible.insert("#signin".into());
    state.visible.insert("#user".into());
    state.visible.insert("#pass".into());
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/feed".into());
    state.new_page = Some(OpenPage {
        handle: PageRef("popup".into()),
        url: "https://auth.example.com/oauth/authorize".into(),
    });

    let mut plan = base_plan();
    plan.login_trigger = vec!["#signin".into()];

    let h = harness(Some(password_bundle("u", "p")), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    let state = h.state.lock().unwrap();
    assert!(state.click_calls.contains(&"#signin".to_string()));
    assert_eq!(state.activated, vec!["popup".to_string()]);
}

// All three session options, proxy included, are requested only when the
// bundle carries no second factor.
#[tokio::test]
async fn session_options_follow_second_factor_friction() {
    let config = FlowConfig {
        proxy: Some("socks5://127.0.0.1:1080".into()),
        ..FlowConfig::default()
    };

    let mut bundle = password_bundle("u", "p");
    bundle.records.push(CredentialRecord::Authenticator {
        secret: "123456".into(),
    });
    let mut state = login_form_state();
    state.visible.insert("#code".into());
    let mut plan = base_plan();
    plan.otp_combined_fields = vec!["#code".into()];

    let h = harness_with_config(Some(bundle), state, config.clone());
    h.controller.run_login(&IdentityRef::new("id"), &plan).await;
    match h.specs.lock().unwrap().first().unwrap() {
        SessionSpec::Create(options) => {
            assert_eq!(options.proxy, None);
            assert!(!options.captcha_solver);
            assert!(!options.extra_stealth);
        }
        other => panic!("unexpected session spec: {other:?}"),
    }

    let h = harness_with_config(Some(password_bundle("u", "p")), login_form_state(), config);
    h.controller
        .run_login(&IdentityRef::new("id"), &base_plan())
        .await;
    match h.specs.lock().unwrap().first().unwrap() {
        SessionSpec::Create(options) => {
            assert_eq!(options.proxy.as_deref(), Some("socks5://127.0.0.1:1080"));
            assert!(options.captcha_solver);
            assert!(options.extra_stealth);
        }
        other => panic!("unexpected session spec: {other:?}"),
    };
}

// A code whose length disagrees with the visible digit-field count fails
// the attempt instead of submitting a half-filled form.
#[tokio::test]
async fn otp_digit_count_mismatch_fails_without_submit() {
    let mut bundle = password_bundle("u", "p");
    bundle.records.push(CredentialRecord::Authenticator {
        secret: "1234".into(),
    });

    let mut state = login_form_state();
    state
        .submit_transitions
        .insert("#pass".into(), "https://example.com/otp".into());
    for i in 0..6 {
        state.visible.insert(format!("#d{i}"));
    }

    let mut plan = base_plan();
    plan.otp_digit_fields = (0..6).map(|i| format!("#d{i}")).collect();

    let h = harness(Some(bundle), state);
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));
    assert!(outcome.message().contains("4 digits"));
    let state = h.state.lock().unwrap();
    assert!(!state.fill_calls.iter().any(|(sel, _)| sel.starts_with("#d")));
    let counts = enter_counts(&state);
    assert_eq!(counts.get("#d5"), None);
    assert_eq!(state.close_calls, 1);
}

// Unknown identity references fail before provisioning.
#[tokio::test]
async fn unknown_identity_is_attempt_failed() {
    let h = harness(None, login_form_state());
    let outcome = h
        .controller
        .run_login(&IdentityRef::new("ghost"), &base_plan())
        .await;

    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));
    assert!(outcome.message().contains("ghost"));
    assert_eq!(*h.provision_count.lock().unwrap(), 0);
}

// Invalid configuration is a pre-flight failure with no side effects.
#[tokio::test]
async fn invalid_plan_fails_pre_flight() {
    let mut plan = base_plan();
    plan.success_url_pattern = "(".into();

    let h = harness(Some(password_bundle("u", "p")), login_form_state());
    let outcome = h.controller.run_login(&IdentityRef::new("id"), &plan).await;

    assert!(matches!(outcome, LoginOutcome::AttemptFailed(_)));
    assert_eq!(*h.provision_count.lock().unwrap(), 0);
    assert!(h.state.lock().unwrap().nav_calls.is_empty());
}
