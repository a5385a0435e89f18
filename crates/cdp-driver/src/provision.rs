//! Session acquisition: connect to an existing browser or launch a new one.

use crate::chrome::ChromeDriver;
use crate::error::ProvisionError;
use crate::stealth::{Tempo, STEALTH_ARGS};
use crate::PageDriver;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for a freshly launched session. All three knobs are requested
/// together by the flow layer when the credential bundle carries no second
/// factor, since such logins see the most bot-detection friction.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    pub proxy: Option<String>,
    pub captcha_solver: bool,
    pub extra_stealth: bool,
}

/// Closed set of session acquisition modes.
#[derive(Clone, Debug)]
pub enum SessionSpec {
    /// Attach to an already running browser via its DevTools websocket URL.
    Connect(String),
    /// Launch a new browser with the given options.
    Create(SessionOptions),
}

/// Provides live browser sessions to the login flow.
#[async_trait]
pub trait SessionProvisioner: Send + Sync {
    async fn provision(&self, spec: &SessionSpec) -> Result<Box<dyn PageDriver>, ProvisionError>;
}

/// Launches or attaches to Chromium and hands back a [`ChromeDriver`].
pub struct ChromeProvisioner {
    headless: bool,
    executable: Option<PathBuf>,
    launch_timeout: Duration,
}

impl ChromeProvisioner {
    pub fn new(headless: bool) -> Self {
        Self {
            headless,
            executable: None,
            launch_timeout: Duration::from_secs(20),
        }
    }

    pub fn with_executable(mut self, path: PathBuf) -> Self {
        self.executable = Some(path);
        self
    }

    fn resolve_executable(&self) -> Result<PathBuf, ProvisionError> {
        if let Some(path) = &self.executable {
            if path.exists() {
                return Ok(path.clone());
            }
            return Err(ProvisionError::NoExecutable(format!(
                "configured executable not found at {}",
                path.display()
            )));
        }
        for candidate in [
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(found) = which::which(candidate) {
                debug!(executable = %found.display(), "resolved browser executable");
                return Ok(found);
            }
        }
        Err(ProvisionError::NoExecutable(
            "no chrome/chromium found on PATH".to_string(),
        ))
    }

    fn browser_config(&self, options: &SessionOptions) -> Result<BrowserConfig, ProvisionError> {
        let executable = self.resolve_executable()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(executable)
            .launch_timeout(self.launch_timeout);

        if !self.headless {
            builder = builder.with_head();
        }

        let mut args: Vec<String> = vec![
            "--disable-dev-shm-usage".to_string(),
            "--disable-hang-monitor".to_string(),
            "--disable-popup-blocking".to_string(),
            "--disable-prompt-on-repost".to_string(),
            "--remote-allow-origins=*".to_string(),
        ];
        if options.extra_stealth {
            args.extend(STEALTH_ARGS.iter().map(|arg| arg.to_string()));
        }
        if let Some(proxy) = &options.proxy {
            args.push(format!("--proxy-server={proxy}"));
        }
        builder = builder.args(args);

        builder
            .build()
            .map_err(|err| ProvisionError::Launch(format!("browser config error: {err}")))
    }
}

#[async_trait]
impl SessionProvisioner for ChromeProvisioner {
    async fn provision(&self, spec: &SessionSpec) -> Result<Box<dyn PageDriver>, ProvisionError> {
        match spec {
            SessionSpec::Connect(ws_url) => {
                info!(url = %ws_url, "attaching to existing browser session");
                let (browser, mut handler) = Browser::connect(ws_url.clone())
                    .await
                    .map_err(|err| ProvisionError::Connect(err.to_string()))?;
                let events = tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });
                let driver =
                    ChromeDriver::attach(browser, events, Tempo::immediate(), false).await?;
                Ok(Box::new(driver))
            }
            SessionSpec::Create(options) => {
                if options.captcha_solver {
                    // No solver backend is bundled; surfaces the request so
                    // an operator can wire an external channel.
                    warn!("captcha solver requested but no solver channel is configured");
                }
                info!(
                    stealth = options.extra_stealth,
                    proxy = options.proxy.is_some(),
                    "launching new browser session"
                );
                let config = self.browser_config(options)?;
                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|err| ProvisionError::Launch(err.to_string()))?;
                let events = tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if event.is_err() {
                            break;
                        }
                    }
                });
                let tempo = if options.extra_stealth {
                    Tempo::humanized()
                } else {
                    Tempo::immediate()
                };
                let driver =
                    ChromeDriver::attach(browser, events, tempo, options.extra_stealth).await?;
                Ok(Box::new(driver))
            }
        }
    }
}
