//! Maps terminal browser state to the tri-state login outcome.

use crate::types::TerminalState;
use passage_core_types::LoginOutcome;

/// Classify one attempt's terminal state.
///
/// Rules, in order:
/// - the pre-login short-circuit is the only no-submit success path;
/// - `CredentialsRejected` needs positive evidence after exactly one
///   primary submit;
/// - a matched success pattern without any submit is suspicious and stays
///   `AttemptFailed`;
/// - everything else falls through to `AttemptFailed` with whatever detail
///   the sequence left behind.
pub fn classify(state: &TerminalState, username: &str) -> LoginOutcome {
    if state.pre_authenticated {
        let url = state.last_url.as_deref().unwrap_or("the authenticated area");
        return LoginOutcome::Success(format!("already authenticated at {url}"));
    }

    if let Some(marker) = &state.rejection_evidence {
        if state.primary_submits == 1 {
            return LoginOutcome::CredentialsRejected(format!(
                "credentials rejected for {username}: rejection marker '{marker}' visible after submit"
            ));
        }
    }

    if let Some(url) = &state.verified_url {
        if state.primary_submits >= 1 {
            return LoginOutcome::Success(format!("logged in as {username}; reached {url}"));
        }
        return LoginOutcome::AttemptFailed(format!(
            "success pattern matched at {url} but no submit was performed"
        ));
    }

    if let Some(failure) = &state.failure {
        return LoginOutcome::AttemptFailed(failure.to_string());
    }

    let last = state.last_url.as_deref().unwrap_or("unknown");
    LoginOutcome::AttemptFailed(format!(
        "login could not be verified; last URL was {last}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FlowError;

    #[test]
    fn pre_authenticated_short_circuits_to_success() {
        let state = TerminalState {
            pre_authenticated: true,
            last_url: Some("https://example.com/feed".into()),
            ..TerminalState::default()
        };
        let outcome = classify(&state, "alice");
        assert!(outcome.is_success());
        assert!(outcome.message().contains("example.com/feed"));
    }

    #[test]
    fn verified_after_submit_is_success_with_username() {
        let state = TerminalState {
            primary_submits: 1,
            verified_url: Some("https://example.com/dashboard".into()),
            ..TerminalState::default()
        };
        let outcome = classify(&state, "alice");
        assert!(outcome.is_success());
        assert!(outcome.message().contains("alice"));
    }

    #[test]
    fn verified_without_submit_is_attempt_failed() {
        let state = TerminalState {
            verified_url: Some("https://example.com/dashboard".into()),
            ..TerminalState::default()
        };
        assert!(matches!(
            classify(&state, "alice"),
            LoginOutcome::AttemptFailed(_)
        ));
    }

    #[test]
    fn rejection_evidence_after_one_submit_is_rejected() {
        let state = TerminalState {
            primary_submits: 1,
            rejection_evidence: Some(".login-error".into()),
            ..TerminalState::default()
        };
        assert!(matches!(
            classify(&state, "alice"),
            LoginOutcome::CredentialsRejected(_)
        ));
    }

    #[test]
    fn rejection_evidence_without_submit_is_not_rejected() {
        let state = TerminalState {
            rejection_evidence: Some(".login-error".into()),
            failure: Some(FlowError::interaction("enter-password", "field not found")),
            ..TerminalState::default()
        };
        assert!(matches!(
            classify(&state, "alice"),
            LoginOutcome::AttemptFailed(_)
        ));
    }

    #[test]
    fn failure_detail_is_surfaced() {
        let state = TerminalState::failed(FlowError::VerificationTimeout {
            last_url: "https://example.com/login?failed=1".into(),
        });
        let outcome = classify(&state, "alice");
        assert!(outcome.message().contains("failed=1"));
    }
}
