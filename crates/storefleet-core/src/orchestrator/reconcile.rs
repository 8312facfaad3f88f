//! Periodic reconciliation of `provisioning` records against release status.
//!
//! One task per orchestrator. Each pass is awaited before the next tick is
//! taken, so passes never overlap; a slow pass delays the schedule instead
//! of stacking up.

use super::engine::Engine;
use crate::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Stores examined in this pass
    pub checked: usize,
    /// Store ids moved to `ready`
    pub ready: Vec<String>,
    /// Store ids moved to `failed`
    pub failed: Vec<String>,
    /// Stores left in `provisioning`
    pub pending: usize,
    /// Per-store failures; never abort the pass
    pub errors: Vec<Error>,
}

impl ReconcileReport {
    /// Whether this pass wrote any status.
    pub fn changed(&self) -> bool {
        !self.ready.is_empty() || !self.failed.is_empty()
    }
}

/// Spawn the reconciliation loop. The first pass runs immediately.
pub(crate) fn spawn_reconcile_loop(engine: Arc<Engine>, every: Duration) -> AbortHandle {
    info!(interval_ms = every.as_millis() as u64, "Starting store reconciliation");

    let handle = tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match engine.reconcile_once().await {
                Ok(report) if report.changed() || !report.errors.is_empty() => {
                    info!(
                        checked = report.checked,
                        ready = report.ready.len(),
                        failed = report.failed.len(),
                        pending = report.pending,
                        errors = report.errors.len(),
                        "Reconciliation pass finished"
                    );
                }
                Ok(report) => {
                    debug!(checked = report.checked, "Reconciliation pass finished");
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation pass failed");
                }
            }
        }
    });

    handle.abort_handle()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_changed() {
        let mut report = ReconcileReport::default();
        assert!(!report.changed());

        report.pending = 2;
        assert!(!report.changed());

        report.failed.push("abc".to_string());
        assert!(report.changed());
    }
}
