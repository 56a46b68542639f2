//! Terminal policy applied after a run
//!
//! A completed run waits out the grace period and then deletes the instance it
//! ran on. A failed run never decommissions, so the machine stays up for
//! inspection.

use super::summary::RunSummary;
use crate::adapters::decommission::Decommissioner;
use crate::config::LifecycleConfig;
use crate::core::acquisition::{sleep_or_cancel, Sleeper};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What the policy did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalAction {
    /// Instance deletion was requested and accepted
    Decommissioned,
    /// Nothing to do
    Skipped(String),
    /// Shutdown arrived during the grace period
    Cancelled,
    /// Deletion was attempted and failed
    DecommissionFailed(String),
}

/// Post-run hook
pub struct TerminalPolicy {
    decommission_on_success: bool,
    grace_period: Duration,
    decommissioner: Arc<dyn Decommissioner>,
    sleeper: Arc<dyn Sleeper>,
    shutdown: watch::Receiver<bool>,
}

impl TerminalPolicy {
    pub fn new(
        config: &LifecycleConfig,
        keep_instance: bool,
        decommissioner: Arc<dyn Decommissioner>,
        sleeper: Arc<dyn Sleeper>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            decommission_on_success: config.decommission_on_success && !keep_instance,
            grace_period: Duration::from_secs(config.grace_period_secs),
            decommissioner,
            sleeper,
            shutdown,
        }
    }

    /// Apply the policy to a finished run
    pub async fn apply(&self, summary: &RunSummary) -> TerminalAction {
        if !summary.is_successful() {
            tracing::warn!(
                state = %summary.final_state,
                "Run did not complete, instance is kept for inspection"
            );
            return TerminalAction::Skipped("run did not complete".to_string());
        }
        if !self.decommission_on_success {
            tracing::info!("Decommission disabled, instance is kept");
            return TerminalAction::Skipped("decommission disabled".to_string());
        }

        tracing::info!(
            grace_secs = self.grace_period.as_secs(),
            "Run completed, decommissioning after grace period"
        );
        if !sleep_or_cancel(self.sleeper.as_ref(), self.grace_period, &self.shutdown).await {
            tracing::warn!("Shutdown during grace period, decommission skipped");
            return TerminalAction::Cancelled;
        }

        match self.decommissioner.delete_self().await {
            Ok(()) => TerminalAction::Decommissioned,
            Err(e) => {
                crate::log_error_with_context!(e, "decommission");
                TerminalAction::DecommissionFailed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::acquisition::RecordingSleeper;
    use crate::core::state::{RunState, RunStateMachine};
    use crate::domain::{MatrikelError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingDecommissioner {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Decommissioner for CountingDecommissioner {
        async fn delete_self(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MatrikelError::Decommission("403".to_string()));
            }
            Ok(())
        }
    }

    fn summary(completed: bool) -> RunSummary {
        let mut machine = RunStateMachine::new();
        if completed {
            for state in RunState::SEQUENCE.iter().skip(1) {
                machine.advance_to(*state).unwrap();
            }
        } else {
            machine.fail("boom");
        }
        let mut summary = RunSummary::new("run", machine.started_at());
        summary.finish(&machine, Duration::ZERO);
        summary
    }

    fn policy(
        decommissioner: Arc<CountingDecommissioner>,
        sleeper: Arc<RecordingSleeper>,
        keep_instance: bool,
        shutdown: watch::Receiver<bool>,
    ) -> TerminalPolicy {
        let config = LifecycleConfig {
            grace_period_secs: 300,
            ..LifecycleConfig::default()
        };
        TerminalPolicy::new(&config, keep_instance, decommissioner, sleeper, shutdown)
    }

    #[tokio::test]
    async fn test_completed_run_decommissions_after_grace() {
        let (_tx, rx) = watch::channel(false);
        let decommissioner = Arc::new(CountingDecommissioner::default());
        let sleeper = Arc::new(RecordingSleeper::new());
        let action = policy(decommissioner.clone(), sleeper.clone(), false, rx)
            .apply(&summary(true))
            .await;

        assert_eq!(action, TerminalAction::Decommissioned);
        assert_eq!(decommissioner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(300)]);
    }

    #[tokio::test]
    async fn test_failed_run_never_decommissions() {
        let (_tx, rx) = watch::channel(false);
        let decommissioner = Arc::new(CountingDecommissioner::default());
        let sleeper = Arc::new(RecordingSleeper::new());
        let action = policy(decommissioner.clone(), sleeper.clone(), false, rx)
            .apply(&summary(false))
            .await;

        assert!(matches!(action, TerminalAction::Skipped(_)));
        assert_eq!(decommissioner.calls.load(Ordering::SeqCst), 0);
        assert!(sleeper.slept().is_empty());
    }

    #[tokio::test]
    async fn test_keep_instance_flag() {
        let (_tx, rx) = watch::channel(false);
        let decommissioner = Arc::new(CountingDecommissioner::default());
        let action = policy(decommissioner.clone(), Arc::new(RecordingSleeper::new()), true, rx)
            .apply(&summary(true))
            .await;
        assert!(matches!(action, TerminalAction::Skipped(_)));
        assert_eq!(decommissioner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_during_grace_skips_delete() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let decommissioner = Arc::new(CountingDecommissioner::default());
        let action = policy(decommissioner.clone(), Arc::new(RecordingSleeper::new()), false, rx)
            .apply(&summary(true))
            .await;
        assert_eq!(action, TerminalAction::Cancelled);
        assert_eq!(decommissioner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decommission_failure_is_reported() {
        let (_tx, rx) = watch::channel(false);
        let decommissioner = Arc::new(CountingDecommissioner {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let action = policy(decommissioner, Arc::new(RecordingSleeper::new()), false, rx)
            .apply(&summary(true))
            .await;
        assert!(matches!(action, TerminalAction::DecommissionFailed(_)));
    }
}
