//! Terminal summary for finished runs.

use colored::{Color, Colorize};

use prodscore_core::{AuditTally, RunStatus, RunSummary, ScoreAverages, SummaryDetail};
use prodscore_criteria::{AuditStatus, Score};

pub fn status_color(status: AuditStatus) -> Color {
    match status {
        AuditStatus::Pass => Color::Green,
        AuditStatus::NeedsReview => Color::Yellow,
        AuditStatus::NeedsManualCheck => Color::Red,
    }
}

pub fn score_color(score: Score) -> Color {
    match score.value() {
        2 => Color::Green,
        1 => Color::Yellow,
        _ => Color::Red,
    }
}

pub fn print_summary(summary: &RunSummary, status: &RunStatus) {
    eprintln!();
    match status {
        RunStatus::Completed => eprintln!("{}", "=== COMPLETED ===".bright_green().bold()),
        RunStatus::Interrupted => eprintln!("{}", "=== INTERRUPTED (partial) ===".bright_yellow().bold()),
        RunStatus::Aborted { row_index, error } => {
            eprintln!("{}", "=== ABORTED (partial) ===".bright_red().bold());
            eprintln!("{}  row {}: {}", "Reason:".dimmed(), row_index + 1, error);
        }
    }
    eprintln!("{}  {}", "Rows:".dimmed(), summary.rows_seen);
    eprintln!(
        "{}  {}",
        "Fully evaluated:".dimmed(),
        summary.fully_evaluated.to_string().bright_green()
    );
    eprintln!(
        "{}  {}",
        "Partially evaluated:".dimmed(),
        summary.partially_evaluated.to_string().bright_yellow()
    );
    eprintln!("{}  {}", "Failed:".dimmed(), summary.failed.to_string().bright_red());
    eprintln!("{}  {}", "Duration:".dimmed(), format_duration(summary.duration_secs));

    match &summary.detail {
        Some(SummaryDetail::Scores(averages)) => print_scores(averages),
        Some(SummaryDetail::Audit(tally)) => print_tally(tally),
        None => {}
    }
}

fn print_scores(averages: &ScoreAverages) {
    let avg = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());
    eprintln!();
    eprintln!("{}", "Average scores:".dimmed());
    eprintln!("  {:<12} {}", "title", avg(averages.title));
    eprintln!("  {:<12} {}", "description", avg(averages.description));
    eprintln!("  {:<12} {}", "overall", avg(averages.overall));

    eprintln!("{}", "Overall score distribution:".dimmed());
    for (value, count) in averages.overall_distribution.iter().enumerate().rev() {
        let label = Score::new(value as u8)
            .map(|s| s.to_string().color(score_color(s)).to_string())
            .unwrap_or_default();
        eprintln!("  {}  {}", label, count);
    }
}

fn print_tally(tally: &AuditTally) {
    eprintln!();
    eprintln!(
        "{:<26} {:>6} {:>13} {:>19}",
        "ASPECT".dimmed(),
        "PASS".dimmed(),
        "NEEDS_REVIEW".dimmed(),
        "NEEDS_MANUAL_CHECK".dimmed()
    );
    for entry in &tally.aspects {
        eprintln!(
            "{:<26} {:>6} {:>13} {:>19}",
            entry.aspect.label(),
            entry.counts.pass,
            entry.counts.needs_review,
            entry.counts.needs_manual_check
        );
    }
    eprintln!(
        "{:<26} {:>6} {:>13} {:>19}",
        "overall".bold(),
        tally.overall.pass.to_string().color(status_color(AuditStatus::Pass)),
        tally.overall.needs_review.to_string().color(status_color(AuditStatus::NeedsReview)),
        tally
            .overall
            .needs_manual_check
            .to_string()
            .color(status_color(AuditStatus::NeedsManualCheck))
    );
}

fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.0}s", secs)
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining_secs = (secs % 60.0) as u64;
        format!("{}m {}s", mins, remaining_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_mapping() {
        assert_eq!(status_color(AuditStatus::Pass), Color::Green);
        assert_eq!(status_color(AuditStatus::NeedsReview), Color::Yellow);
        assert_eq!(status_color(AuditStatus::NeedsManualCheck), Color::Red);
        assert_eq!(score_color(Score::MAX), Color::Green);
        assert_eq!(score_color(Score::ONE), Color::Yellow);
        assert_eq!(score_color(Score::ZERO), Color::Red);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(42.4), "42s");
        assert_eq!(format_duration(125.0), "2m 5s");
    }
}
