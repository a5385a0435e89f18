use anyhow::Result;
use cdp_driver::provision::ChromeProvisioner;
use credential_store::JsonFileCredentialStore;
use login_flow::LoginFlowController;
use passage_core_types::IdentityRef;
use std::sync::Arc;
use tracing::info;

use crate::cli::commands::LoginArgs;
use crate::cli::output::{self, OutputFormat};
use crate::config::{LoginOverrides, LoginSettings};

/// Run one login attempt and return the process exit code.
pub async fn cmd_login(args: &LoginArgs, format: &OutputFormat) -> Result<i32> {
    let overrides = LoginOverrides {
        identity: args.identity.clone(),
        credentials: args.credentials.clone(),
        session_id: args.session_id.clone(),
        step_timeout_ms: args.step_timeout_ms,
        verify_timeout_ms: args.verify_timeout_ms,
        entry_url: args.entry_url.clone(),
        success_url_pattern: args.success_url_pattern.clone(),
        proxy: args.proxy.clone(),
    };
    let settings = LoginSettings::resolve(&args.plan, &overrides, !args.headed, args.chrome.clone())?;

    info!(
        identity = %settings.identity,
        site = %settings.plan.name,
        "starting login attempt"
    );

    let provider = Arc::new(JsonFileCredentialStore::new(&settings.credentials_path));
    let mut provisioner = ChromeProvisioner::new(settings.headless);
    if let Some(executable) = settings.chrome_executable.clone() {
        provisioner = provisioner.with_executable(executable);
    }

    let controller =
        LoginFlowController::new(provider, Arc::new(provisioner), settings.flow.clone());
    let outcome = controller
        .run_login(&IdentityRef::new(settings.identity.clone()), &settings.plan)
        .await;

    output::print_outcome(format, &outcome);
    Ok(output::exit_code(&outcome))
}
