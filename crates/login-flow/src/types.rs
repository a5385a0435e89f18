//! Internal step and terminal state types.

use crate::errors::FlowError;

/// Result of one step. Internal only; folded into the final outcome
/// message, never exposed directly.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub attempted: bool,
    pub succeeded: bool,
    pub detail: String,
}

impl StepOutcome {
    pub fn succeeded(detail: impl Into<String>) -> Self {
        Self {
            attempted: true,
            succeeded: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            attempted: true,
            succeeded: false,
            detail: detail.into(),
        }
    }

    pub fn skipped(detail: impl Into<String>) -> Self {
        Self {
            attempted: false,
            succeeded: false,
            detail: detail.into(),
        }
    }
}

/// Terminal browser state of one attempt, handed to the classifier.
#[derive(Debug, Default)]
pub struct TerminalState {
    /// The authenticated-area pre-check matched before any credential
    /// entry; short-circuit success with no submit.
    pub pre_authenticated: bool,

    /// Primary (password) key-submit count. Bounded to 1 by construction.
    pub primary_submits: u32,

    /// OTP key-submit count. Bounded to 1 by construction.
    pub otp_submits: u32,

    /// URL that matched the success pattern, if verification passed.
    pub verified_url: Option<String>,

    /// Last URL observed on the page, for diagnostics.
    pub last_url: Option<String>,

    /// Selector of a rejection marker seen after the primary submit.
    pub rejection_evidence: Option<String>,

    /// The error that terminated the sequence early, if any.
    pub failure: Option<FlowError>,
}

impl TerminalState {
    pub fn failed(failure: FlowError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }
}
