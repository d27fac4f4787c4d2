use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{ActionRequest, BatchOutcome, BatchSummary};
use crate::services::action_executor::ActionExecutor;
use crate::services::action_protocol::{action_icon, describe_action, missing_params, parse_actions, validate_action};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationState {
    Idle,
    AwaitingConfirmation { actions: Vec<ActionRequest> },
    Executing,
    ShowingResults { outcome: BatchOutcome },
}

/// Holds proposed actions until the user confirms or cancels them.
pub struct ConfirmationOrchestrator {
    state: ConfirmationState,
    dwell: Duration,
}

impl ConfirmationOrchestrator {
    /// `dwell` is how long results stay up before returning to idle.
    pub fn new(dwell: Duration) -> Self {
        Self {
            state: ConfirmationState::Idle,
            dwell,
        }
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }

    /// Parses the latest assistant message; returns true when there is something to confirm.
    pub fn propose(&mut self, response_text: &str) -> bool {
        self.propose_actions(parse_actions(response_text))
    }

    pub fn propose_actions(&mut self, actions: Vec<ActionRequest>) -> bool {
        if actions.is_empty() {
            return false;
        }
        log::debug!("awaiting confirmation for {} action(s)", actions.len());
        self.state = ConfirmationState::AwaitingConfirmation { actions };
        true
    }

    pub fn pending(&self) -> &[ActionRequest] {
        match &self.state {
            ConfirmationState::AwaitingConfirmation { actions } => actions.as_slice(),
            _ => &[],
        }
    }

    /// Number shown on the confirm button: valid actions only.
    pub fn confirmable_count(&self) -> usize {
        self.pending().iter().filter(|a| validate_action(a)).count()
    }

    /// One display line per pending action.
    pub fn pending_lines(&self) -> Vec<String> {
        self.pending()
            .iter()
            .map(|action| {
                let line = format!("{} {}", action_icon(&action.action_type), describe_action(action));
                if validate_action(action) {
                    line
                } else {
                    let missing = missing_params(action);
                    if missing.is_empty() {
                        format!("{} (not supported)", line)
                    } else {
                        format!("{} (missing {})", line, missing.join(", "))
                    }
                }
            })
            .collect()
    }

    /// Drops the pending actions without touching the store.
    pub fn cancel(&mut self) {
        if matches!(self.state, ConfirmationState::AwaitingConfirmation { .. }) {
            log::debug!("confirmation cancelled");
            self.state = ConfirmationState::Idle;
        }
    }

    /// Runs every pending action (invalid ones come back as skipped), keeps the
    /// results visible for the dwell time, then returns to idle.
    pub async fn confirm(&mut self, executor: &ActionExecutor<'_>) -> Result<BatchOutcome> {
        let actions = match std::mem::replace(&mut self.state, ConfirmationState::Executing) {
            ConfirmationState::AwaitingConfirmation { actions } => actions,
            other => {
                self.state = other;
                return Err(AppError::InvalidState("no actions are awaiting confirmation".to_string()));
            }
        };

        let outcome = executor.execute_batch(&actions);
        self.state = ConfirmationState::ShowingResults {
            outcome: outcome.clone(),
        };

        tokio::time::sleep(self.dwell).await;
        self.state = ConfirmationState::Idle;
        Ok(outcome)
    }
}

pub fn summary_message(summary: &BatchSummary) -> String {
    let attempted = summary.total - summary.skipped;
    let mut message = if attempted == 0 {
        "No actions were run".to_string()
    } else if summary.failed == 0 {
        format!("All {} action(s) completed", attempted)
    } else if summary.success == 0 {
        format!("All {} action(s) failed", attempted)
    } else {
        format!(
            "{} of {} action(s) completed, {} failed",
            summary.success, attempted, summary.failed
        )
    };
    if summary.skipped > 0 {
        message.push_str(&format!(" ({} skipped as invalid)", summary.skipped));
    }
    message
}
