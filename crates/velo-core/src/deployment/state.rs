//! Deployment lifecycle states and classification of remote task states.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PollingConfig;
use crate::types::ProgressionEntry;

/// Where a deployment is in its lifecycle.
///
/// `Success`, `Failed` and `TimedOut` are terminal; once reached the state
/// never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    /// Not yet submitted to the server.
    NotCreated,
    /// Submitted; completion not (yet) observed.
    Created,
    Success,
    #[serde(rename = "FAIL")]
    Failed,
    #[serde(rename = "TIMEOUT")]
    TimedOut,
}

impl DeploymentState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentState::Success | DeploymentState::Failed | DeploymentState::TimedOut
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            DeploymentState::NotCreated => "NOT_CREATED",
            DeploymentState::Created => "CREATED",
            DeploymentState::Success => "SUCCESS",
            DeploymentState::Failed => "FAIL",
            DeploymentState::TimedOut => "TIMEOUT",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one progression poll says about a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    Succeeded,
    /// Still running, or not listed in the progression yet
    Pending,
    Failed {
        state: String,
        message: Option<String>,
    },
}

/// Maps the server's task state vocabulary onto [`PollVerdict`]s.
#[derive(Debug, Clone)]
pub struct StatusPolicy {
    success_states: Vec<String>,
    in_progress_states: Vec<String>,
}

impl StatusPolicy {
    pub fn new(success_states: Vec<String>, in_progress_states: Vec<String>) -> Self {
        Self {
            success_states,
            in_progress_states,
        }
    }

    pub fn classify(&self, entry: Option<&ProgressionEntry>) -> PollVerdict {
        let Some(entry) = entry else {
            return PollVerdict::Pending;
        };

        if self.success_states.iter().any(|s| *s == entry.state) {
            PollVerdict::Succeeded
        } else if self.in_progress_states.iter().any(|s| *s == entry.state) {
            PollVerdict::Pending
        } else {
            PollVerdict::Failed {
                state: entry.state.clone(),
                message: entry.error_message.clone(),
            }
        }
    }
}

impl From<&PollingConfig> for StatusPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self::new(
            config.success_states.clone(),
            config.in_progress_states.clone(),
        )
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: &str) -> ProgressionEntry {
        ProgressionEntry {
            deployment_id: "deployment-1".to_string(),
            tenant_id: None,
            state: state.to_string(),
            has_warnings_or_errors: false,
            error_message: None,
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = StatusPolicy::default();
        assert_eq!(policy.classify(Some(&entry("Success"))), PollVerdict::Succeeded);
        for state in ["Queued", "Executing", "Cancelling"] {
            assert_eq!(policy.classify(Some(&entry(state))), PollVerdict::Pending);
        }
        assert_eq!(policy.classify(None), PollVerdict::Pending);
    }

    #[test]
    fn test_unknown_state_fails_with_message() {
        let mut failed = entry("Failed");
        failed.error_message = Some("Step 'run velo' failed".to_string());
        assert_eq!(
            StatusPolicy::default().classify(Some(&failed)),
            PollVerdict::Failed {
                state: "Failed".to_string(),
                message: Some("Step 'run velo' failed".to_string()),
            }
        );
        assert!(matches!(
            StatusPolicy::default().classify(Some(&entry("TimedOut"))),
            PollVerdict::Failed { .. }
        ));
    }

    #[test]
    fn test_custom_vocabulary() {
        let policy = StatusPolicy::new(
            vec!["Success".to_string(), "SuccessWithWarnings".to_string()],
            vec!["Queued".to_string()],
        );
        assert_eq!(
            policy.classify(Some(&entry("SuccessWithWarnings"))),
            PollVerdict::Succeeded
        );
        assert!(matches!(
            policy.classify(Some(&entry("Executing"))),
            PollVerdict::Failed { .. }
        ));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!DeploymentState::NotCreated.is_terminal());
        assert!(!DeploymentState::Created.is_terminal());
        assert!(DeploymentState::Success.is_terminal());
        assert!(DeploymentState::Failed.is_terminal());
        assert!(DeploymentState::TimedOut.is_terminal());
        assert_eq!(DeploymentState::TimedOut.to_string(), "TIMEOUT");
    }
}
