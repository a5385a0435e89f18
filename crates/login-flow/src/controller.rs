//! The login flow controller: one invocation, one attempt, one outcome.

use crate::classifier;
use crate::errors::FlowError;
use crate::observer::{FlowObserver, TracingObserver};
use crate::plan::{FlowConfig, SitePlan};
use crate::steps::StepRunner;
use crate::types::TerminalState;
use cdp_driver::{PageDriver, SessionOptions, SessionProvisioner, SessionSpec};
use credential_store::CredentialProvider;
use passage_core_types::{AttemptId, IdentityRef, LoginOutcome, ResolvedCredentials};
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates one login attempt end to end. Collaborators are injected
/// so attempts are deterministic under test fakes; the controller holds no
/// mutable state across attempts.
pub struct LoginFlowController {
    provider: Arc<dyn CredentialProvider>,
    provisioner: Arc<dyn SessionProvisioner>,
    observer: Arc<dyn FlowObserver>,
    config: FlowConfig,
}

impl LoginFlowController {
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        provisioner: Arc<dyn SessionProvisioner>,
        config: FlowConfig,
    ) -> Self {
        Self {
            provider,
            provisioner,
            observer: Arc::new(TracingObserver),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run one attempt. Never returns an error: every failure path is
    /// folded into a classified [`LoginOutcome`].
    pub async fn run_login(&self, identity: &IdentityRef, plan: &SitePlan) -> LoginOutcome {
        let attempt = AttemptId::new();
        info!(attempt = %attempt, identity = %identity, site = %plan.name, "login attempt started");

        // Pre-flight: configuration must be sound before anything is
        // touched.
        if let Err(err) = self.config.validate().and_then(|_| plan.validate()) {
            return LoginOutcome::AttemptFailed(err.to_string());
        }
        // Validated above.
        let success = match plan.success_pattern() {
            Ok(pattern) => pattern,
            Err(err) => return LoginOutcome::AttemptFailed(err.to_string()),
        };

        // Credentials, before any browser work.
        let bundle = match self.provider.fetch(identity).await {
            Ok(bundle) => bundle,
            Err(err) => {
                return LoginOutcome::AttemptFailed(FlowError::from(err).to_string());
            }
        };
        let creds = match ResolvedCredentials::from_bundle(&bundle) {
            Ok(creds) => creds,
            Err(err) => {
                let failure = FlowError::MissingCredentials { fields: err.fields };
                return LoginOutcome::AttemptFailed(failure.to_string());
            }
        };

        // Session acquisition. No OTP on file means more bot-detection
        // friction, so the full anti-detection option set is requested
        // only then.
        let spec = match &self.config.existing_session {
            Some(session) => SessionSpec::Connect(session.clone()),
            None => {
                let friction = !creds.has_otp();
                SessionSpec::Create(SessionOptions {
                    proxy: if friction {
                        self.config.proxy.clone()
                    } else {
                        None
                    },
                    captcha_solver: friction,
                    extra_stealth: friction,
                })
            }
        };
        let driver: Box<dyn PageDriver> = match self.provisioner.provision(&spec).await {
            Ok(driver) => driver,
            // Nothing was acquired; nothing to close.
            Err(err) => return LoginOutcome::AttemptFailed(FlowError::from(err).to_string()),
        };

        // From here the session is released on every path.
        let state = self
            .drive_steps(driver.as_ref(), plan, &creds, success)
            .await;
        if let Err(err) = driver.close().await {
            warn!(attempt = %attempt, error = %err, "session close failed");
        }

        let outcome = classifier::classify(&state, &creds.username);
        info!(
            attempt = %attempt,
            success = outcome.is_success(),
            message = outcome.message(),
            "login attempt finished"
        );
        outcome
    }

    async fn drive_steps(
        &self,
        driver: &dyn PageDriver,
        plan: &SitePlan,
        creds: &ResolvedCredentials,
        success: regex::Regex,
    ) -> TerminalState {
        let runner = StepRunner::new(
            driver,
            plan,
            &self.config,
            self.observer.as_ref(),
            creds,
            success,
        );
        runner.run().await
    }
}
