//! Error taxonomy for one login attempt.

use cdp_driver::ProvisionError;
use credential_store::CredentialError;
use thiserror::Error;

/// Everything that can terminate an attempt short of a classified outcome.
/// The controller is the single boundary where these are folded into a
/// [`passage_core_types::LoginOutcome`]; none escape `run_login`.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Missing or invalid required configuration; reported pre-flight.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Bundle fetched but required fields were absent.
    #[error("missing credential field(s): {}", fields.join(", "))]
    MissingCredentials { fields: Vec<String> },

    /// The credential provider itself failed.
    #[error("credential provider error: {0}")]
    Credential(#[from] CredentialError),

    /// Session could not be provisioned.
    #[error("session provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// A required control never became usable within its timeout.
    #[error("{step} failed: {detail}")]
    Interaction { step: &'static str, detail: String },

    /// The authenticated-area pattern never matched, even after the
    /// one-shot recheck.
    #[error("success pattern never matched; last URL was {last_url}")]
    VerificationTimeout { last_url: String },

    /// The credential bundle carried an OTP but no input could be located.
    #[error("OTP inputs not found")]
    OtpInputsNotFound,

    /// Any other fault raised during the attempt.
    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

impl FlowError {
    pub fn interaction(step: &'static str, detail: impl Into<String>) -> Self {
        Self::Interaction {
            step,
            detail: detail.into(),
        }
    }
}
