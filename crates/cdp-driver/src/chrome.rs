//! chromiumoxide-backed [`PageDriver`] implementation.

use crate::error::{DriverError, ProvisionError};
use crate::stealth::{Tempo, STEALTH_INIT_SCRIPT};
use crate::{Key, OpenPage, PageDriver, PageRef};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use passage_core_types::SessionId;
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const URL_POLL_INTERVAL: Duration = Duration::from_millis(250);

struct TrackedPage {
    target: TargetId,
    handle: PageRef,
    page: Page,
}

/// Exclusive handle to one browser plus its active page.
pub struct ChromeDriver {
    session: SessionId,
    browser: Mutex<Browser>,
    active: Mutex<Page>,
    tracked: Mutex<Vec<TrackedPage>>,
    events: Mutex<Option<JoinHandle<()>>>,
    tempo: Tempo,
    stealth: bool,
    closed: AtomicBool,
}

impl ChromeDriver {
    /// Wrap an already launched or connected browser. Reuses the first open
    /// page if one exists, otherwise opens a blank one.
    pub(crate) async fn attach(
        browser: Browser,
        events: JoinHandle<()>,
        tempo: Tempo,
        stealth: bool,
    ) -> Result<Self, ProvisionError> {
        let pages = browser
            .pages()
            .await
            .map_err(|err| ProvisionError::Launch(err.to_string()))?;
        let active = match pages.into_iter().next() {
            Some(page) => page,
            None => browser
                .new_page("about:blank")
                .await
                .map_err(|err| ProvisionError::Launch(err.to_string()))?,
        };

        let session = SessionId::new();
        debug!(session = %session, "browser session attached");
        let driver = Self {
            session,
            browser: Mutex::new(browser),
            active: Mutex::new(active),
            tracked: Mutex::new(Vec::new()),
            events: Mutex::new(Some(events)),
            tempo,
            stealth,
            closed: AtomicBool::new(false),
        };

        if stealth {
            let page = driver.active.lock().await.clone();
            driver.install_stealth(&page).await;
        }
        driver.refresh_tracked().await.ok();
        Ok(driver)
    }

    async fn install_stealth(&self, page: &Page) {
        let params = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(STEALTH_INIT_SCRIPT)
            .build();
        match params {
            Ok(params) => {
                if let Err(err) = page.execute(params).await {
                    warn!(error = %err, "failed to install stealth init script");
                }
            }
            Err(err) => warn!(error = %err, "invalid stealth init script params"),
        }
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::session_closed(format!(
                "session {} is already closed",
                self.session
            )));
        }
        Ok(())
    }

    async fn pace(&self) {
        let delay = self.tempo.next_delay();
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    async fn active_page(&self) -> Page {
        self.active.lock().await.clone()
    }

    /// Refresh the tracked page list, minting handles for targets seen for
    /// the first time. Returns the handles of newly discovered pages.
    async fn refresh_tracked(&self) -> Result<Vec<OpenPage>, DriverError> {
        let pages = {
            let browser = self.browser.lock().await;
            browser
                .pages()
                .await
                .map_err(|err| DriverError::io(err.to_string()))?
        };

        let mut tracked = self.tracked.lock().await;
        let mut fresh = Vec::new();
        for page in pages {
            let target = page.target_id().clone();
            if tracked.iter().any(|entry| entry.target == target) {
                continue;
            }
            let handle = PageRef(uuid::Uuid::new_v4().to_string());
            let url = page_url(&page).await;
            debug!(page = %handle.0, url = %url, "tracking new page");
            fresh.push(OpenPage {
                handle: handle.clone(),
                url,
            });
            tracked.push(TrackedPage {
                target,
                handle,
                page,
            });
        }
        Ok(fresh)
    }

    /// Resolve a selector to an element, polling until the deadline.
    async fn find_element(
        &self,
        selector: &str,
        deadline: Instant,
    ) -> Result<Element, DriverError> {
        let page = self.active_page().await;
        loop {
            match page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(_) if Instant::now() < deadline => sleep(POLL_INTERVAL).await,
                Err(err) => {
                    return Err(DriverError::target_not_found(format!(
                        "selector '{selector}' not found before deadline: {err}"
                    )))
                }
            }
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, DriverError> {
        let page = self.active_page().await;
        let expression = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.visibility === 'hidden' || style.display === 'none') return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 || rect.height > 0 || el.getClientRects().length > 0;
            }})()"#,
            selector = serde_json::to_string(selector)
                .map_err(|err| DriverError::internal(err.to_string()))?,
        );
        let result = page
            .evaluate(expression)
            .await
            .map_err(|err| DriverError::io(err.to_string()))?;
        result
            .into_value::<bool>()
            .map_err(|err| DriverError::internal(format!("visibility check: {err}")))
    }

    async fn clear_field(&self, selector: &str) -> Result<(), DriverError> {
        let page = self.active_page().await;
        let expression = format!(
            r#"(() => {{
                const el = document.querySelector({selector});
                if (!el) return false;
                el.value = '';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                return true;
            }})()"#,
            selector = serde_json::to_string(selector)
                .map_err(|err| DriverError::internal(err.to_string()))?,
        );
        page.evaluate(expression)
            .await
            .map_err(|err| DriverError::io(err.to_string()))?;
        Ok(())
    }
}

async fn page_url(page: &Page) -> String {
    match page.url().await {
        Ok(Some(url)) => url,
        _ => String::from("about:blank"),
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), DriverError> {
        self.ensure_open()?;
        let page = self.active_page().await;
        let nav = async {
            page.goto(url)
                .await
                .map_err(|err| DriverError::io(err.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|err| DriverError::io(err.to_string()))?;
            Ok::<_, DriverError>(())
        };
        match timeout(deadline, nav).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::nav_timeout(format!(
                "navigation to {url} exceeded {}ms",
                deadline.as_millis()
            ))),
        }
    }

    async fn wait_for_visible(
        &self,
        selector: &str,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        self.ensure_open()?;
        let until = Instant::now() + deadline;
        loop {
            if self.is_visible(selector).await.unwrap_or(false) {
                return Ok(());
            }
            if Instant::now() >= until {
                return Err(DriverError::timeout(format!(
                    "selector '{selector}' not visible within {}ms",
                    deadline.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn fill(
        &self,
        selector: &str,
        value: &str,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.pace().await;
        let element = self.find_element(selector, Instant::now() + deadline).await?;
        element
            .click()
            .await
            .map_err(|err| DriverError::io(format!("focus '{selector}': {err}")))?;
        self.clear_field(selector).await?;
        element
            .type_str(value)
            .await
            .map_err(|err| DriverError::io(format!("type into '{selector}': {err}")))?;
        Ok(())
    }

    async fn press_key(
        &self,
        selector: &str,
        key: Key,
        deadline: Duration,
    ) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.pace().await;
        let element = self.find_element(selector, Instant::now() + deadline).await?;
        element
            .press_key(key.as_str())
            .await
            .map_err(|err| DriverError::io(format!("press {key:?} on '{selector}': {err}")))?;
        Ok(())
    }

    async fn click(&self, selector: &str, deadline: Duration) -> Result<(), DriverError> {
        self.ensure_open()?;
        self.pace().await;
        let element = self.find_element(selector, Instant::now() + deadline).await?;
        element
            .click()
            .await
            .map_err(|err| DriverError::io(format!("click '{selector}': {err}")))?;
        Ok(())
    }

    async fn evaluate_scroll(&self, delta_y: i64) -> Result<(), DriverError> {
        self.ensure_open()?;
        let page = self.active_page().await;
        page.evaluate(format!("window.scrollBy(0, {delta_y})"))
            .await
            .map_err(|err| DriverError::io(err.to_string()))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.ensure_open()?;
        let page = self.active_page().await;
        Ok(page_url(&page).await)
    }

    async fn wait_for_url_pattern(
        &self,
        pattern: &Regex,
        deadline: Duration,
    ) -> Result<String, DriverError> {
        let until = Instant::now() + deadline;
        loop {
            let url = self.current_url().await?;
            if pattern.is_match(&url) {
                return Ok(url);
            }
            if Instant::now() >= until {
                return Err(DriverError::timeout(format!(
                    "URL '{url}' did not match '{pattern}' within {}ms",
                    deadline.as_millis()
                )));
            }
            sleep(URL_POLL_INTERVAL).await;
        }
    }

    async fn list_open_pages(&self) -> Result<Vec<OpenPage>, DriverError> {
        self.ensure_open()?;
        self.refresh_tracked().await?;
        let tracked = self.tracked.lock().await;
        let mut pages = Vec::with_capacity(tracked.len());
        for entry in tracked.iter() {
            pages.push(OpenPage {
                handle: entry.handle.clone(),
                url: page_url(&entry.page).await,
            });
        }
        Ok(pages)
    }

    async fn wait_for_new_page(&self, deadline: Duration) -> Result<OpenPage, DriverError> {
        self.ensure_open()?;
        // The tracked set dates from attach (and any list_open_pages call
        // since), so a popup that opened between the caller's trigger
        // action and this wait still registers as new on the first poll.
        let until = Instant::now() + deadline;
        loop {
            let fresh = self.refresh_tracked().await?;
            if let Some(page) = fresh.into_iter().next() {
                return Ok(page);
            }
            if Instant::now() >= until {
                return Err(DriverError::timeout(format!(
                    "no new page appeared within {}ms",
                    deadline.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn activate(&self, handle: &PageRef) -> Result<(), DriverError> {
        self.ensure_open()?;
        let page = {
            let tracked = self.tracked.lock().await;
            tracked
                .iter()
                .find(|entry| &entry.handle == handle)
                .map(|entry| entry.page.clone())
        };
        let Some(page) = page else {
            return Err(DriverError::target_not_found(format!(
                "unknown page handle {}",
                handle.0
            )));
        };
        page.bring_to_front()
            .await
            .map_err(|err| DriverError::io(err.to_string()))?;
        if self.stealth {
            self.install_stealth(&page).await;
        }
        *self.active.lock().await = page;
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(session = %self.session, "closing browser session");
        let mut browser = self.browser.lock().await;
        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|err| DriverError::io(format!("browser close: {err}")));
        if result.is_ok() {
            // Reap the child process; harmless for connected sessions.
            if let Err(err) = browser.wait().await {
                warn!(session = %self.session, error = %err, "browser wait after close failed");
            }
        }
        if let Some(task) = self.events.lock().await.take() {
            task.abort();
        }
        result
    }
}
