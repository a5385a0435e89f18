//! Page driver contract and its Chromium DevTools implementation.
//!
//! The login flow depends only on the [`PageDriver`] and
//! [`SessionProvisioner`] traits; [`chrome::ChromeDriver`] is the concrete
//! chromiumoxide-backed implementation.

pub mod chrome;
pub mod error;
pub mod provision;
pub mod stealth;

use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;

pub use error::{DriverError, DriverErrorKind, ProvisionError};
pub use provision::{SessionOptions, SessionProvisioner, SessionSpec};

/// Key presses the flow layer issues against form fields.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Key {
    Enter,
    Tab,
}

impl Key {
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Enter => "Enter",
            Key::Tab => "Tab",
        }
    }
}

/// Opaque handle to one open page within a session.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageRef(pub String);

/// A page currently open in the session, with its last known URL.
#[derive(Clone, Debug)]
pub struct OpenPage {
    pub handle: PageRef,
    pub url: String,
}

/// Timeout-bounded primitives against a live browser page.
///
/// All methods act on the session's active page unless stated otherwise.
/// Every wait is bounded; none of these calls suspends indefinitely.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the active page and wait for the load to settle.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Wait until the selector resolves to a visible element.
    async fn wait_for_visible(&self, selector: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Clear and fill a form field.
    async fn fill(&self, selector: &str, value: &str, timeout: Duration)
        -> Result<(), DriverError>;

    /// Send a key press to the element.
    async fn press_key(&self, selector: &str, key: Key, timeout: Duration)
        -> Result<(), DriverError>;

    /// Click the element.
    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Scroll the active page by the given vertical delta. Used to nudge
    /// lazily rendered forms into view before re-probing.
    async fn evaluate_scroll(&self, delta_y: i64) -> Result<(), DriverError>;

    /// Last known URL of the active page.
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Wait until the active page's URL matches the pattern; returns the
    /// matching URL.
    async fn wait_for_url_pattern(
        &self,
        pattern: &Regex,
        timeout: Duration,
    ) -> Result<String, DriverError>;

    /// All pages currently open in the session.
    async fn list_open_pages(&self) -> Result<Vec<OpenPage>, DriverError>;

    /// Wait for a page that was not open when the call started.
    async fn wait_for_new_page(&self, timeout: Duration) -> Result<OpenPage, DriverError>;

    /// Make the given page the active one.
    async fn activate(&self, page: &PageRef) -> Result<(), DriverError>;

    /// Tear the session down. Invoked exactly once per attempt; later
    /// calls must be harmless.
    async fn close(&self) -> Result<(), DriverError>;
}
