//! Run state machine
//!
//! A run moves forward through the stages one step at a time. `Failed` can be
//! entered from any non-terminal state and is terminal itself, as is
//! `Completed`.

use crate::domain::{MatrikelError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Instance is up, nothing started
    Provisioned,
    /// Secrets fetched, host name being resolved
    Resolving,
    /// Authenticated SFTP session established
    Connected,
    /// Source archive is on local disk
    Downloaded,
    /// Payload document extracted from the archive
    Extracted,
    /// All records read, transformed and written to batch files
    Transformed,
    /// Batch files merged into one artifact
    Merged,
    /// Artifact (and archive backup) uploaded
    Uploaded,
    /// Destination re-checked and found fresh
    Validated,
    /// Run finished successfully
    Completed,
    /// Run aborted
    Failed,
}

impl RunState {
    /// The forward order of non-failure states
    pub const SEQUENCE: [RunState; 10] = [
        RunState::Provisioned,
        RunState::Resolving,
        RunState::Connected,
        RunState::Downloaded,
        RunState::Extracted,
        RunState::Transformed,
        RunState::Merged,
        RunState::Uploaded,
        RunState::Validated,
        RunState::Completed,
    ];

    /// The state that follows this one on success
    pub fn next(self) -> Option<RunState> {
        let position = Self::SEQUENCE.iter().position(|s| *s == self)?;
        Self::SEQUENCE.get(position + 1).copied()
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }

    /// Lower-case name used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Provisioned => "provisioned",
            RunState::Resolving => "resolving",
            RunState::Connected => "connected",
            RunState::Downloaded => "downloaded",
            RunState::Extracted => "extracted",
            RunState::Transformed => "transformed",
            RunState::Merged => "merged",
            RunState::Uploaded => "uploaded",
            RunState::Validated => "validated",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    /// State left
    pub from: RunState,
    /// State entered
    pub to: RunState,
    /// When the transition happened
    pub at: DateTime<Utc>,
}

/// Run state machine
///
/// # Examples
///
/// ```
/// use matrikel::core::state::{RunState, RunStateMachine};
///
/// let mut machine = RunStateMachine::new();
/// machine.advance_to(RunState::Resolving).unwrap();
/// assert!(machine.advance_to(RunState::Downloaded).is_err());
///
/// machine.fail("name resolution");
/// assert_eq!(machine.state(), RunState::Failed);
/// ```
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    state: RunState,
    started_at: DateTime<Utc>,
    history: Vec<Transition>,
    failed_from: Option<RunState>,
}

impl RunStateMachine {
    /// Create a machine in `Provisioned`
    pub fn new() -> Self {
        Self {
            state: RunState::Provisioned,
            started_at: Utc::now(),
            history: Vec::new(),
            failed_from: None,
        }
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// When the machine was created
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// All transitions so far
    pub fn history(&self) -> &[Transition] {
        &self.history
    }

    /// The state the run was in when it failed
    pub fn failed_from(&self) -> Option<RunState> {
        self.failed_from
    }

    /// Advance by exactly one step
    ///
    /// # Errors
    ///
    /// Returns `MatrikelError::State` if `target` is not the immediate successor
    /// of the current state.
    pub fn advance_to(&mut self, target: RunState) -> Result<()> {
        if self.state.next() != Some(target) {
            return Err(MatrikelError::State(format!(
                "Invalid transition {} -> {}",
                self.state, target
            )));
        }
        self.record(target);
        tracing::info!(state = %target, "Run state advanced");
        Ok(())
    }

    /// Enter `Failed`
    ///
    /// No-op if the machine is already terminal.
    pub fn fail(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.failed_from = Some(self.state);
        tracing::error!(state = %self.state, reason = %reason, "Run failed");
        self.record(RunState::Failed);
    }

    fn record(&mut self, to: RunState) {
        self.history.push(Transition {
            from: self.state,
            to,
            at: Utc::now(),
        });
        self.state = to;
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_forward_path() {
        let mut machine = RunStateMachine::new();
        for state in &RunState::SEQUENCE[1..] {
            machine.advance_to(*state).unwrap();
        }
        assert_eq!(machine.state(), RunState::Completed);
        assert_eq!(machine.history().len(), 9);
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn test_skipping_a_step_is_rejected() {
        let mut machine = RunStateMachine::new();
        let err = machine.advance_to(RunState::Connected).unwrap_err();
        assert!(matches!(err, MatrikelError::State(_)));
        assert_eq!(machine.state(), RunState::Provisioned);
    }

    #[test]
    fn test_backwards_is_rejected() {
        let mut machine = RunStateMachine::new();
        machine.advance_to(RunState::Resolving).unwrap();
        assert!(machine.advance_to(RunState::Provisioned).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut machine = RunStateMachine::new();
        machine.advance_to(RunState::Resolving).unwrap();
        machine.fail("dns");
        assert_eq!(machine.state(), RunState::Failed);
        assert_eq!(machine.failed_from(), Some(RunState::Resolving));

        assert!(machine.advance_to(RunState::Connected).is_err());
        machine.fail("again");
        assert_eq!(machine.history().len(), 2);
    }

    #[test]
    fn test_completed_cannot_fail() {
        let mut machine = RunStateMachine::new();
        for state in &RunState::SEQUENCE[1..] {
            machine.advance_to(*state).unwrap();
        }
        machine.fail("late");
        assert_eq!(machine.state(), RunState::Completed);
    }

    #[test]
    fn test_next() {
        assert_eq!(RunState::Provisioned.next(), Some(RunState::Resolving));
        assert_eq!(RunState::Validated.next(), Some(RunState::Completed));
        assert_eq!(RunState::Completed.next(), None);
        assert_eq!(RunState::Failed.next(), None);
    }
}
