//! Step progress events for external observers.
//!
//! Progress narration is not part of the control contract; the controller
//! emits structured step events and this collaborator decides what to do
//! with them.

use crate::types::StepOutcome;
use tracing::{debug, info};

/// Receives step lifecycle events during an attempt.
pub trait FlowObserver: Send + Sync {
    fn on_step_start(&self, step: &'static str);
    fn on_step_end(&self, step: &'static str, outcome: &StepOutcome);
}

/// Default observer: structured tracing events.
pub struct TracingObserver;

impl FlowObserver for TracingObserver {
    fn on_step_start(&self, step: &'static str) {
        debug!(step, "step started");
    }

    fn on_step_end(&self, step: &'static str, outcome: &StepOutcome) {
        info!(
            step,
            attempted = outcome.attempted,
            succeeded = outcome.succeeded,
            detail = %outcome.detail,
            "step finished"
        );
    }
}

/// Observer that swallows everything. Handy in tests.
pub struct NullObserver;

impl FlowObserver for NullObserver {
    fn on_step_start(&self, _step: &'static str) {}
    fn on_step_end(&self, _step: &'static str, _outcome: &StepOutcome) {}
}
