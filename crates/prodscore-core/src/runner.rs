use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use prodscore_logging::{LogEvent, Logger, RunJournal};

use crate::error::RowError;
use crate::outcome::{BatchOutcome, RunStatus};
use crate::summary::{RunSummary, SummaryDetail};

/// How far a row got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Full,
    Partial,
    Failed,
}

/// What the runner needs to know about a produced row
pub trait RowOutcome {
    fn row_index(&self) -> usize;
    fn row_id(&self) -> &str;
    fn status(&self) -> RowStatus;
    fn failure(&self) -> Option<&RowError>;

    /// Short human-readable outcome for progress output
    fn outcome_label(&self) -> String;

    /// Pipeline-specific summary figures
    fn detail(_results: &[Self]) -> Option<SummaryDetail>
    where
        Self: Sized,
    {
        None
    }
}

/// Per-row work shared by the evaluation and audit runs.
///
/// `process` never fails; every error ends up inside the output row.
#[async_trait]
pub trait RowPipeline: Send + Sync {
    type Input: Send + 'static;
    type Output: RowOutcome + Serialize + Send + 'static;

    /// Identifier reported for a row before it is processed
    fn input_id(&self, row_index: usize, input: &Self::Input) -> String;

    async fn process(&self, row_index: usize, input: Self::Input) -> Self::Output;
}

/// Drives a [`RowPipeline`] over a sequence of rows
pub struct BatchRunner<P: RowPipeline> {
    pipeline: P,
    logger: Arc<Logger>,
    journal: Option<Arc<RunJournal>>,
    concurrency: usize,
    interrupted: Arc<AtomicBool>,
}

impl<P: RowPipeline> BatchRunner<P> {
    pub fn new(pipeline: P, logger: Arc<Logger>) -> Self {
        Self {
            pipeline,
            logger,
            journal: None,
            concurrency: 1,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_journal(mut self, journal: Arc<RunJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Process every row in input order.
    ///
    /// Up to `concurrency` rows are in flight at once; results are emitted in
    /// input order. Interruption and fatal errors are checked before a row
    /// starts, so rows already in flight always finish. The run is only
    /// reported as interrupted when the flag kept a row from starting.
    pub async fn run<I>(&self, rows: I) -> BatchOutcome<P::Output>
    where
        I: IntoIterator<Item = P::Input>,
    {
        let started = Instant::now();
        let abort = AtomicBool::new(false);
        // Set only when a row was left unstarted
        let held_back = AtomicBool::new(false);
        let mut aborted: Option<(usize, String)> = None;

        let mut results = Vec::new();
        let mut outputs = stream::iter(rows.into_iter().enumerate())
            .take_while(|_| {
                let go = !self.interrupted.load(Ordering::SeqCst) && !abort.load(Ordering::SeqCst);
                if !go {
                    held_back.store(true, Ordering::SeqCst);
                }
                futures::future::ready(go)
            })
            .map(|(row_index, input)| self.process_row(row_index, input))
            .buffered(self.concurrency);

        while let Some(output) = outputs.next().await {
            if let Some(failure) = output.failure().filter(|f| f.is_fatal()) {
                warn!(row_index = output.row_index(), error = %failure, "Fatal error, stopping batch");
                abort.store(true, Ordering::SeqCst);
                aborted.get_or_insert((output.row_index(), failure.to_string()));
            }
            if let Some(journal) = &self.journal {
                journal.write_row(output.row_index(), &output);
            }
            results.push(output);
        }
        drop(outputs);

        let duration = started.elapsed();
        let status = match aborted {
            Some((row_index, error)) => {
                self.logger.log(&LogEvent::RunAborted {
                    row_index,
                    error: error.clone(),
                });
                RunStatus::Aborted { row_index, error }
            }
            None if held_back.load(Ordering::SeqCst) => {
                info!("Run interrupted by user");
                self.logger.log(&LogEvent::RunInterrupted {
                    rows_seen: results.len(),
                });
                RunStatus::Interrupted
            }
            None => RunStatus::Completed,
        };

        let mut summary = RunSummary::from_results(&results, duration);
        summary.partial = status != RunStatus::Completed;
        summary.detail = P::Output::detail(&results);

        self.logger.log(&LogEvent::RunCompleted {
            rows_seen: summary.rows_seen,
            fully_evaluated: summary.fully_evaluated,
            partially_evaluated: summary.partially_evaluated,
            failed: summary.failed,
            duration_secs: summary.duration_secs,
        });

        if let Some(journal) = &self.journal {
            journal.write_end(status.as_str(), &summary, summary.duration_secs);
        }

        BatchOutcome {
            results,
            summary,
            status,
        }
    }

    async fn process_row(&self, row_index: usize, input: P::Input) -> P::Output {
        let started = Instant::now();
        debug!(row_index, "Processing row");
        self.logger.log(&LogEvent::RowStarted {
            row_index,
            row_id: self.pipeline.input_id(row_index, &input),
        });

        let output = self.pipeline.process(row_index, input).await;

        match (output.status(), output.failure()) {
            (RowStatus::Failed, Some(failure)) => self.logger.log(&LogEvent::RowFailed {
                row_index,
                row_id: output.row_id().to_string(),
                kind: failure.kind.to_string(),
                error: failure.message.clone(),
            }),
            (status, _) => self.logger.log(&LogEvent::RowCompleted {
                row_index,
                row_id: output.row_id().to_string(),
                outcome: output.outcome_label(),
                partial: status == RowStatus::Partial,
                duration_secs: started.elapsed().as_secs_f64(),
            }),
        }
        output
    }
}
