//! Outcome accounting.
//!
//! The [`RunSummary`] is owned by a single aggregator task. Submission
//! workers never touch it directly; they send [`SubmissionOutcome`]s over a
//! channel and the task applies them one at a time, so no update can be lost
//! regardless of how many workers complete concurrently.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ImportError, Result};
use crate::models::SubmissionOutcome;
use crate::report::{ImportEvent, ImportReporter};

/// Handle used by producers to deliver outcomes to the aggregator.
pub type OutcomeSender = mpsc::UnboundedSender<SubmissionOutcome>;

/// Counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_processed: u64,
    pub success_count: u64,
    pub error_count: u64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &SubmissionOutcome) {
        self.total_processed += 1;
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} features, {} successes, {} errors",
            self.total_processed, self.success_count, self.error_count
        )
    }
}

pub struct ResultAggregator {
    tx: OutcomeSender,
    task: JoinHandle<RunSummary>,
    reporter: Arc<dyn ImportReporter>,
}

impl ResultAggregator {
    /// Start the aggregator task. Every outcome is reported as it is recorded.
    pub fn spawn(reporter: Arc<dyn ImportReporter>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<SubmissionOutcome>();
        let task_reporter = reporter.clone();

        let task = tokio::spawn(async move {
            let mut summary = RunSummary::default();
            while let Some(outcome) = rx.recv().await {
                let event = match &outcome.result {
                    Ok(created) => ImportEvent::Created {
                        feature_id: outcome.feature_id.clone(),
                        trigger_id: created.trigger_id.clone(),
                        tags: created.tags.clone(),
                    },
                    Err(e) => {
                        tracing::warn!(
                            feature_id = %outcome.feature_id,
                            error = %e,
                            "could not create trigger"
                        );
                        ImportEvent::Failed {
                            feature_id: outcome.feature_id.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                task_reporter.report(&event);
                summary.record(&outcome);
            }
            summary
        });

        Self { tx, task, reporter }
    }

    pub fn sender(&self) -> OutcomeSender {
        self.tx.clone()
    }

    /// Wait for every outstanding outcome and emit the final summary.
    ///
    /// Returns once all [`OutcomeSender`]s (including those held by
    /// submission workers) have been dropped. Consuming `self` makes this the
    /// one and only drain point of a run.
    pub async fn finish(self) -> Result<RunSummary> {
        let Self { tx, task, reporter } = self;
        drop(tx);

        let summary = task
            .await
            .map_err(|e| ImportError::Pipeline(format!("aggregator task failed: {}", e)))?;
        reporter.report(&ImportEvent::Finished { summary });
        Ok(summary)
    }
}
