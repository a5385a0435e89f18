//! Error types for the page driver and session provisioner.

use thiserror::Error;

/// Classification of a driver failure. Mirrors the protocol-level causes
/// the flow layer cares about when deciding whether a step may re-probe.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverErrorKind {
    /// A bounded wait elapsed without the condition holding.
    Timeout,
    /// The selector never resolved to an element.
    TargetNotFound,
    /// Navigation did not complete within its deadline.
    NavTimeout,
    /// CDP transport or protocol failure.
    Io,
    /// The session or page is already gone.
    SessionClosed,
    /// Invariant violation inside the driver itself.
    Internal,
}

/// Driver failure with a kind and operator-readable detail.
#[derive(Clone, Debug, Error)]
#[error("{kind:?}: {detail}")]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub detail: String,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Timeout, detail)
    }

    pub fn target_not_found(detail: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::TargetNotFound, detail)
    }

    pub fn nav_timeout(detail: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::NavTimeout, detail)
    }

    pub fn io(detail: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Io, detail)
    }

    pub fn session_closed(detail: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::SessionClosed, detail)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(DriverErrorKind::Internal, detail)
    }

    /// Whether re-probing the same condition can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::Timeout | DriverErrorKind::TargetNotFound | DriverErrorKind::Io
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::Timeout | DriverErrorKind::NavTimeout
        )
    }
}

/// Session provisioning failure (launch, connect, capacity).
#[derive(Clone, Debug, Error)]
pub enum ProvisionError {
    #[error("no usable browser executable: {0}")]
    NoExecutable(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("failed to connect to session: {0}")]
    Connect(String),
    #[error("invalid session options: {0}")]
    InvalidOptions(String),
}
