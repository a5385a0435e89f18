//! The externally visible result of one login attempt.

use serde::{Deserialize, Serialize};

/// Tri-state login outcome. Constructed once per attempt and returned to
/// the caller; a rejected credential set is deliberately distinct from an
/// attempt that could not complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum LoginOutcome {
    Success(String),
    CredentialsRejected(String),
    AttemptFailed(String),
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoginOutcome::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            LoginOutcome::Success(msg)
            | LoginOutcome::CredentialsRejected(msg)
            | LoginOutcome::AttemptFailed(msg) => msg,
        }
    }
}
