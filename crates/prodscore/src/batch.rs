use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use prodscore_core::{
    audit_record_from_fields, AuditRowEvaluator, BatchOutcome, BatchRunner, InputRow, RowEvaluator,
    RowOutcome, SummaryDetail,
};
use prodscore_criteria::{AuditProfile, CriterionEvaluator, HeuristicDetector};
use prodscore_logging::{LogEvent, Logger, RunJournal};
use prodscore_scorer::{create_scorer, ScorerGateway};

use crate::config::Settings;
use crate::table::{self, Table};
use crate::ui;

/// Shared state for one batch command
pub struct RunContext {
    pub settings: Settings,
    pub logger: Arc<Logger>,
    pub journal: bool,
    pub json_output: bool,
}

impl RunContext {
    fn gateway(&self) -> Result<Arc<ScorerGateway>> {
        let scorer = create_scorer(self.settings.scorer.clone()).context("Failed to create scorer")?;
        let gateway = ScorerGateway::new(Arc::from(scorer), self.settings.gateway.clone());
        debug!(scorer = gateway.scorer_name(), model = self.settings.model.model_id(), "Scorer ready");
        Ok(Arc::new(gateway))
    }

    fn open_journal(&self, input: &Path, mode: &str) -> Option<Arc<RunJournal>> {
        if !self.journal {
            return None;
        }
        match RunJournal::new(input) {
            Ok(journal) => {
                info!(path = %journal.path().display(), "Writing run journal");
                journal.write_start(input, mode, self.settings.model.model_id());
                Some(Arc::new(journal))
            }
            Err(e) => {
                warn!(error = %e, "Could not open run journal, continuing without it");
                None
            }
        }
    }

    fn announce(&self, input: &Path, mode: &str) {
        self.logger.log(&LogEvent::RunStarted {
            input: input.to_path_buf(),
            mode: mode.to_string(),
            model: self.settings.model.model_id().to_string(),
            concurrency: self.settings.concurrency,
        });
    }

    fn report<T: RowOutcome>(&self, outcome: &BatchOutcome<T>) -> Result<()> {
        if self.json_output {
            println!("{}", serde_json::to_string_pretty(&outcome.summary)?);
        } else {
            ui::print_summary(&outcome.summary, &outcome.status);
        }
        Ok(())
    }
}

fn load_input(input: &Path) -> Result<Table> {
    let table = Table::read(input).with_context(|| format!("Failed to load {}", input.display()))?;
    if table.is_empty() {
        warn!(path = %input.display(), "Input has no data rows");
    }
    Ok(table)
}

fn install_interrupt_handler(handle: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing rows in progress...");
        handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")
}

/// Evaluate optimized titles and descriptions. Returns the exit code.
pub async fn run_evaluation(ctx: &RunContext, input: &Path, output: Option<PathBuf>) -> Result<i32> {
    let table = load_input(input)?;
    let output = output.unwrap_or_else(|| table::default_evaluation_output(input));

    let evaluator = CriterionEvaluator::new(ctx.gateway()?, ctx.settings.model)
        .with_temperature(ctx.settings.temperature);
    let pipeline = RowEvaluator::new(evaluator, Arc::new(HeuristicDetector)).with_logger(ctx.logger.clone());

    let mut runner = BatchRunner::new(pipeline, ctx.logger.clone()).with_concurrency(ctx.settings.concurrency);
    if let Some(journal) = ctx.open_journal(input, "evaluate") {
        runner = runner.with_journal(journal);
    }
    install_interrupt_handler(runner.interrupt_handle())?;

    ctx.announce(input, "evaluate");
    let rows = table
        .rows()
        .enumerate()
        .map(|(i, fields)| InputRow::from_fields(i, &fields));
    let outcome = runner.run(rows).await;

    table::write_evaluation(&output, &table, &outcome.results)?;
    info!(path = %output.display(), rows = outcome.results.len(), "Wrote evaluation results");

    ctx.report(&outcome)?;
    if !ctx.json_output {
        eprintln!("Results: {}", output.display());
    }
    Ok(outcome.exit_code())
}

/// Audit product records. Returns the exit code.
pub async fn run_audit(
    ctx: &RunContext,
    input: &Path,
    output: Option<PathBuf>,
    profile: AuditProfile,
) -> Result<i32> {
    let table = load_input(input)?;
    let output = output.unwrap_or_else(|| table::default_audit_output(input));

    let pipeline = AuditRowEvaluator::new(ctx.gateway()?, ctx.settings.model, profile)
        .with_temperature(ctx.settings.temperature);
    let mode = format!("audit:{}", profile.as_str());

    let mut runner = BatchRunner::new(pipeline, ctx.logger.clone()).with_concurrency(ctx.settings.concurrency);
    if let Some(journal) = ctx.open_journal(input, &mode) {
        runner = runner.with_journal(journal);
    }
    install_interrupt_handler(runner.interrupt_handle())?;

    ctx.announce(input, &mode);
    let records = table
        .rows()
        .enumerate()
        .map(|(i, fields)| audit_record_from_fields(i, &fields));
    let outcome = runner.run(records).await;

    table::write_audit(&output, profile, &outcome.results)?;
    info!(path = %output.display(), rows = outcome.results.len(), "Wrote audit results");

    if profile == AuditProfile::Online {
        match &outcome.summary.detail {
            Some(SummaryDetail::Audit(tally)) if !tally.url_summary.is_empty() => {
                let path = table::url_summary_path(input, &output);
                table::write_url_summary(&path, profile, &tally.url_summary)?;
                info!(path = %path.display(), urls = tally.url_summary.len(), "Wrote URL summary");
            }
            _ => debug!("No product URLs, skipping URL summary"),
        }
    }

    ctx.report(&outcome)?;
    if !ctx.json_output {
        eprintln!("Results: {}", output.display());
    }
    Ok(outcome.exit_code())
}
