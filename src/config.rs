//! Environment-backed configuration for the CLI.
//!
//! Every setting can come from the environment; CLI flags override it.

use anyhow::{anyhow, Context, Result};
use login_flow::{FlowConfig, SitePlan};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_IDENTITY: &str = "PASSAGE_IDENTITY";
pub const ENV_SESSION_ID: &str = "PASSAGE_SESSION_ID";
pub const ENV_STEP_TIMEOUT_MS: &str = "PASSAGE_STEP_TIMEOUT_MS";
pub const ENV_VERIFY_TIMEOUT_MS: &str = "PASSAGE_VERIFY_TIMEOUT_MS";
pub const ENV_ENTRY_URL: &str = "PASSAGE_ENTRY_URL";
pub const ENV_SUCCESS_URL_PATTERN: &str = "PASSAGE_SUCCESS_URL_PATTERN";
pub const ENV_CREDENTIALS_FILE: &str = "PASSAGE_CREDENTIALS_FILE";
pub const ENV_PROXY: &str = "PASSAGE_PROXY";

/// Read an environment variable, treating empty values as unset.
pub fn env_value(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match env_value(name) {
        Some(raw) => {
            let parsed = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{name} must be an integer, got '{raw}'"))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Fully resolved settings for one `passage login` invocation.
#[derive(Clone, Debug)]
pub struct LoginSettings {
    pub identity: String,
    pub credentials_path: PathBuf,
    pub plan: SitePlan,
    pub flow: FlowConfig,
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
}

/// Flag-level inputs the settings are resolved from. Mirrors the CLI
/// argument surface; `None` means "fall back to the environment".
#[derive(Clone, Debug, Default)]
pub struct LoginOverrides {
    pub identity: Option<String>,
    pub credentials: Option<PathBuf>,
    pub session_id: Option<String>,
    pub step_timeout_ms: Option<u64>,
    pub verify_timeout_ms: Option<u64>,
    pub entry_url: Option<String>,
    pub success_url_pattern: Option<String>,
    pub proxy: Option<String>,
}

impl LoginSettings {
    pub fn resolve(
        plan_path: &Path,
        overrides: &LoginOverrides,
        headless: bool,
        chrome_executable: Option<PathBuf>,
    ) -> Result<Self> {
        let identity = overrides
            .identity
            .clone()
            .or_else(|| env_value(ENV_IDENTITY))
            .ok_or_else(|| {
                anyhow!("identity is required; pass --identity or set {ENV_IDENTITY}")
            })?;

        let credentials_path = overrides
            .credentials
            .clone()
            .or_else(|| env_value(ENV_CREDENTIALS_FILE).map(PathBuf::from))
            .ok_or_else(|| {
                anyhow!(
                    "credentials file is required; pass --credentials or set {ENV_CREDENTIALS_FILE}"
                )
            })?;

        let mut plan = load_plan(plan_path)?;
        if let Some(entry_url) = overrides
            .entry_url
            .clone()
            .or_else(|| env_value(ENV_ENTRY_URL))
        {
            plan.entry_url = entry_url;
        }
        if let Some(pattern) = overrides
            .success_url_pattern
            .clone()
            .or_else(|| env_value(ENV_SUCCESS_URL_PATTERN))
        {
            plan.success_url_pattern = pattern;
        }

        let mut flow = FlowConfig::default();
        if let Some(ms) = overrides.step_timeout_ms.or(env_u64(ENV_STEP_TIMEOUT_MS)?) {
            flow.step_timeout_ms = ms;
        }
        if let Some(ms) = overrides
            .verify_timeout_ms
            .or(env_u64(ENV_VERIFY_TIMEOUT_MS)?)
        {
            flow.verify_timeout_ms = ms;
        }
        flow.existing_session = overrides
            .session_id
            .clone()
            .or_else(|| env_value(ENV_SESSION_ID));
        flow.proxy = overrides.proxy.clone().or_else(|| env_value(ENV_PROXY));

        Ok(Self {
            identity,
            credentials_path,
            plan,
            flow,
            headless,
            chrome_executable,
        })
    }
}

/// Load and parse a site plan JSON file.
pub fn load_plan(path: &Path) -> Result<SitePlan> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read site plan '{}'", path.display()))?;
    let plan: SitePlan = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse site plan '{}'", path.display()))?;
    Ok(plan)
}
