use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one login attempt against a site plan
    Login(LoginArgs),
    /// Validate a site plan file without touching a browser
    CheckPlan(CheckPlanArgs),
    /// Show build information
    Info,
}

#[derive(Args, Clone, Debug)]
pub struct LoginArgs {
    /// Site plan JSON file
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Identity reference to log in as (env: PASSAGE_IDENTITY)
    #[arg(long)]
    pub identity: Option<String>,

    /// Credential store JSON file (env: PASSAGE_CREDENTIALS_FILE)
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Reuse an existing session by its DevTools websocket URL
    /// (env: PASSAGE_SESSION_ID)
    #[arg(long)]
    pub session_id: Option<String>,

    /// Per-interaction timeout in milliseconds (env: PASSAGE_STEP_TIMEOUT_MS)
    #[arg(long)]
    pub step_timeout_ms: Option<u64>,

    /// Success-verification timeout in milliseconds
    /// (env: PASSAGE_VERIFY_TIMEOUT_MS)
    #[arg(long)]
    pub verify_timeout_ms: Option<u64>,

    /// Override the plan's entry URL (env: PASSAGE_ENTRY_URL)
    #[arg(long)]
    pub entry_url: Option<String>,

    /// Override the plan's success URL pattern
    /// (env: PASSAGE_SUCCESS_URL_PATTERN)
    #[arg(long)]
    pub success_url_pattern: Option<String>,

    /// Proxy for freshly launched sessions (env: PASSAGE_PROXY)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub headed: bool,

    /// Browser executable to launch instead of auto-discovery
    #[arg(long, value_name = "FILE")]
    pub chrome: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct CheckPlanArgs {
    /// Site plan JSON file
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,
}
