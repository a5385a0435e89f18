//! Multi-step login automation state machine.
//!
//! One [`LoginFlowController`] invocation runs exactly one attempt:
//! credential acquisition, session provisioning, the ordered step sequence
//! with per-step fallback tactics, optional second-factor completion, and
//! tri-state outcome classification. Collaborators (credential provider,
//! session provisioner, page driver, observer) are trait objects injected
//! by the caller.

pub mod classifier;
pub mod controller;
pub mod errors;
pub mod observer;
pub mod otp;
pub mod plan;
pub mod probe;
pub mod steps;
pub mod types;

pub use controller::LoginFlowController;
pub use errors::FlowError;
pub use observer::{FlowObserver, NullObserver, TracingObserver};
pub use otp::{OtpLayout, MIN_DIGIT_FIELDS};
pub use plan::{FlowConfig, SitePlan, DEFAULT_STEP_TIMEOUT_MS, VERIFY_TIMEOUT_FLOOR_MS};
pub use types::{StepOutcome, TerminalState};
