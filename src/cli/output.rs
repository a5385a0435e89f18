use clap::ValueEnum;
use passage_core_types::LoginOutcome;
use serde_json::json;

#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Render the attempt result to stdout in the selected format.
pub fn print_outcome(format: &OutputFormat, outcome: &LoginOutcome) {
    match format {
        OutputFormat::Human => {
            let label = match outcome {
                LoginOutcome::Success(_) => "SUCCESS",
                LoginOutcome::CredentialsRejected(_) => "CREDENTIALS REJECTED",
                LoginOutcome::AttemptFailed(_) => "ATTEMPT FAILED",
            };
            println!("{label}: {}", outcome.message());
        }
        OutputFormat::Json => {
            let payload = json!({
                "outcome": outcome_tag(outcome),
                "success": outcome.is_success(),
                "message": outcome.message(),
            });
            println!("{payload}");
        }
    }
}

fn outcome_tag(outcome: &LoginOutcome) -> &'static str {
    match outcome {
        LoginOutcome::Success(_) => "success",
        LoginOutcome::CredentialsRejected(_) => "credentials_rejected",
        LoginOutcome::AttemptFailed(_) => "attempt_failed",
    }
}

/// Process exit code for an outcome: 0 success, 2 rejected credentials,
/// 1 anything else.
pub fn exit_code(outcome: &LoginOutcome) -> i32 {
    match outcome {
        LoginOutcome::Success(_) => 0,
        LoginOutcome::CredentialsRejected(_) => 2,
        LoginOutcome::AttemptFailed(_) => 1,
    }
}
