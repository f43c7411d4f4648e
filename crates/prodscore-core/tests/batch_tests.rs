use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use prodscore_core::{
    BatchRunner, ErrorKind, InputRow, LanguageSource, RowEvaluator, RowOutcome, RowStatus, RunStatus,
    SummaryDetail,
};
use prodscore_criteria::{
    CriterionEvaluator, CriterionGroup, FieldKind, HeuristicDetector, LanguageDetector,
};
use prodscore_logging::{LogFormat, Logger, RunJournal};
use prodscore_scorer::{
    GatewayConfig, MockScorer, ModelTier, ScoreRequest, ScorerGateway, ScoringError, StructuredVerdict,
};
use serde_json::{json, Map};
use tempfile::TempDir;

/// Every criterion of `kind` at `score`
fn verdict(kind: FieldKind, score: u8) -> StructuredVerdict {
    let mut must_have = Map::new();
    let mut must_avoid = Map::new();
    for c in kind.criteria() {
        let entry = json!({"score": score, "reason": "checked"});
        match c.group {
            CriterionGroup::MustHave => must_have.insert(c.id.to_string(), entry),
            CriterionGroup::MustAvoid => must_avoid.insert(c.id.to_string(), entry),
        };
    }
    StructuredVerdict::from_value(json!({
        "must_have": must_have,
        "must_avoid": must_avoid,
        "overall_reason": "fine"
    }))
    .unwrap()
}

fn is_description(request: &ScoreRequest) -> bool {
    request.prompt.contains("criteria_8_no_care_tips")
}

fn optimized_title(request: &ScoreRequest) -> &str {
    request
        .prompt
        .lines()
        .find_map(|l| l.strip_prefix("Optimized Title: "))
        .unwrap_or_default()
}

fn row(fields: &[(&str, &str)]) -> HashMap<String, String> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn complete_row(index: usize, title: &str) -> InputRow {
    InputRow::from_fields(
        index,
        &row(&[
            ("Title_Original", title),
            ("Description_original", "Soft cotton shirt in blue."),
            ("Title_AI_optimized", "Blue Cotton T-Shirt"),
            ("Description_optimized_AI", "A soft blue cotton t-shirt."),
            ("lang", "en"),
        ]),
    )
}

fn gateway(mock: Arc<MockScorer>) -> Arc<ScorerGateway> {
    let config = GatewayConfig::default()
        .with_max_retries(2)
        .with_backoff(Duration::from_millis(1), Duration::from_millis(2));
    Arc::new(ScorerGateway::new(mock, config))
}

fn evaluator(mock: Arc<MockScorer>, detector: Arc<dyn LanguageDetector>) -> RowEvaluator {
    RowEvaluator::new(CriterionEvaluator::new(gateway(mock), ModelTier::Balanced), detector)
}

fn runner(mock: Arc<MockScorer>) -> BatchRunner<RowEvaluator> {
    BatchRunner::new(
        evaluator(mock, Arc::new(HeuristicDetector)),
        Arc::new(Logger::new(LogFormat::Compact)),
    )
}

fn perfect_scorer() -> Arc<MockScorer> {
    Arc::new(MockScorer::new(|req| {
        let kind = if is_description(req) {
            FieldKind::Description
        } else {
            FieldKind::Title
        };
        Ok(verdict(kind, 2))
    }))
}

struct CountingDetector {
    calls: AtomicUsize,
}

impl LanguageDetector for CountingDetector {
    fn detect(&self, text: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HeuristicDetector.detect(text)
    }
}

#[tokio::test]
async fn test_output_rows_match_input_rows() {
    let rows: Vec<InputRow> = (0..5).map(|i| complete_row(i, &format!("Shirt {i}"))).collect();
    let outcome = runner(perfect_scorer()).with_concurrency(3).run(rows).await;

    assert_eq!(outcome.results.len(), 5);
    for (i, result) in outcome.results.iter().enumerate() {
        assert_eq!(result.row_index, i);
        assert_eq!(result.row_id, (i + 1).to_string());
        assert_eq!(result.overall_score.map(|s| s.value()), Some(2));
    }
    assert_eq!(outcome.summary.fully_evaluated, 5);
    assert!(!outcome.summary.partial);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_best_of_two_candidates_is_used_for_description() {
    let mock = Arc::new(MockScorer::new(|req| {
        if is_description(req) {
            return Ok(verdict(FieldKind::Description, 2));
        }
        match optimized_title(req) {
            "Blue Cotton T-Shirt 100% Organic" => Ok(verdict(FieldKind::Title, 2)),
            _ => Ok(verdict(FieldKind::Title, 1)),
        }
    }));
    let input = InputRow::from_fields(
        0,
        &row(&[
            ("original_title", "Blue T-shirt"),
            ("original_description", "Cotton tee, blue."),
            ("optimized_title", r#"["Blue Cotton T-Shirt 100% Organic", "T-Shirt"]"#),
            ("optimized_description", "Organic cotton t-shirt in blue."),
        ]),
    );

    let result = evaluator(mock.clone(), Arc::new(HeuristicDetector))
        .evaluate_row(0, &input)
        .await;

    assert_eq!(result.candidates_count, 2);
    assert_eq!(result.chosen_title.as_deref(), Some("Blue Cotton T-Shirt 100% Organic"));
    assert_eq!(result.title_score().map(|s| s.value()), Some(2));
    assert_eq!(result.overall_score.map(|s| s.value()), Some(2));

    let description_request = mock.requests().into_iter().find(|r| is_description(r)).unwrap();
    assert_eq!(optimized_title(&description_request), "Blue Cotton T-Shirt 100% Organic");
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn test_language_detected_once_per_row() {
    let detector = Arc::new(CountingDetector {
        calls: AtomicUsize::new(0),
    });
    let mock = perfect_scorer();
    let input = InputRow::from_fields(
        0,
        &row(&[
            ("original_title", "Ceinture en cuir marron"),
            ("original_description", "Ceinture pour homme"),
            ("optimized_title", "Ceinture en cuir marron pour homme"),
            ("optimized_description", "Une ceinture en cuir."),
        ]),
    );

    let result = evaluator(mock.clone(), detector.clone())
        .evaluate_row(0, &input)
        .await;

    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.language, "en");
    assert_eq!(result.language_source, LanguageSource::Detected);
    for request in mock.requests() {
        assert!(request.prompt.contains("Content Language: en"));
    }
}

#[tokio::test]
async fn test_title_language_wins_over_description() {
    let detector = Arc::new(CountingDetector {
        calls: AtomicUsize::new(0),
    });
    let input = InputRow::from_fields(
        0,
        &row(&[
            ("original_title", "Ledergürtel für Herren"),
            ("original_description", "真皮腰带"),
            ("optimized_title", "Brauner Ledergürtel für Herren"),
            ("optimized_description", "Ein Gürtel aus Leder."),
        ]),
    );

    let result = evaluator(perfect_scorer(), detector.clone())
        .evaluate_row(0, &input)
        .await;

    assert_eq!(detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.language, "de");
}

#[tokio::test]
async fn test_explicit_language_skips_detection() {
    let detector = Arc::new(CountingDetector {
        calls: AtomicUsize::new(0),
    });
    let mut input = complete_row(0, "Hemd");
    input.lang = Some("de".into());

    let result = evaluator(perfect_scorer(), detector.clone())
        .evaluate_row(0, &input)
        .await;

    assert_eq!(detector.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.language, "de");
    assert_eq!(result.language_source, LanguageSource::Column);
}

#[tokio::test]
async fn test_malformed_title_keeps_description_verdict() {
    let mock = Arc::new(MockScorer::new(|req| {
        if is_description(req) {
            Ok(verdict(FieldKind::Description, 1))
        } else {
            Ok(StructuredVerdict::from_value(json!({"must_have": {}})).unwrap())
        }
    }));

    let outcome = runner(mock).run(vec![complete_row(0, "Shirt")]).await;
    let result = &outcome.results[0];

    assert!(result.title_verdict.is_none());
    assert_eq!(result.description_score().map(|s| s.value()), Some(1));
    assert_eq!(result.overall_score, None);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, ErrorKind::MissingCriterion);
    assert_eq!(failure.field, Some(FieldKind::Title));
    assert_eq!(result.status(), RowStatus::Partial);
    assert_eq!(outcome.summary.partially_evaluated, 1);
}

#[tokio::test]
async fn test_transport_failure_is_isolated_to_its_row() {
    let mock = Arc::new(MockScorer::new(|req| {
        if req.prompt.contains("Original Title: broken") {
            return Err(ScoringError::transport("HTTP 503"));
        }
        let kind = if is_description(req) {
            FieldKind::Description
        } else {
            FieldKind::Title
        };
        Ok(verdict(kind, 2))
    }));

    let outcome = runner(mock.clone())
        .run(vec![complete_row(0, "broken"), complete_row(1, "Shirt")])
        .await;

    let failed = &outcome.results[0];
    assert_eq!(failed.status(), RowStatus::Failed);
    assert_eq!(failed.failure.as_ref().unwrap().kind, ErrorKind::Transport);
    assert_eq!(outcome.results[1].status(), RowStatus::Full);

    // Two fields, each tried once plus two retries, then two calls for the good row
    assert_eq!(mock.call_count(), 8);
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_all_rows_failing_exits_one() {
    let mock = Arc::new(MockScorer::new(|_| Err(ScoringError::malformed("not json", "<html>"))));
    let outcome = runner(mock).run(vec![complete_row(0, "a"), complete_row(1, "b")]).await;

    assert_eq!(outcome.summary.failed, 2);
    assert_eq!(outcome.exit_code(), 1);
}

#[tokio::test]
async fn test_incomplete_rows_are_kept_without_calls() {
    let mock = perfect_scorer();
    let incomplete = InputRow::from_fields(1, &row(&[("Title_Original", "Mug")]));

    let outcome = runner(mock.clone())
        .run(vec![complete_row(0, "Shirt"), incomplete, complete_row(2, "Cap")])
        .await;

    assert_eq!(outcome.results.len(), 3);
    let skipped = &outcome.results[1];
    assert_eq!(skipped.failure.as_ref().unwrap().kind, ErrorKind::IncompleteRow);
    assert_eq!(skipped.language_source, LanguageSource::Unresolved);
    assert_eq!(mock.call_count(), 4);
}

#[tokio::test]
async fn test_repeated_runs_agree() {
    let rows = || vec![complete_row(0, "Shirt"), complete_row(1, "Cap")];
    let runner = runner(perfect_scorer());

    let first = runner.run(rows()).await;
    let second = runner.run(rows()).await;
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn test_interrupt_before_run_processes_nothing() {
    let mock = perfect_scorer();
    let runner = runner(mock.clone());
    runner.interrupt_handle().store(true, Ordering::SeqCst);

    let outcome = runner.run(vec![complete_row(0, "Shirt")]).await;

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.status, RunStatus::Interrupted);
    assert!(outcome.summary.partial);
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(mock.call_count(), 0);
}

/// Scorer that raises the interrupt flag while scoring the description of `title`
fn interrupting_scorer(title: &'static str, flag: Arc<OnceLock<Arc<AtomicBool>>>) -> Arc<MockScorer> {
    Arc::new(MockScorer::new(move |req| {
        if is_description(req) {
            if req.prompt.contains(&format!("Original Title: {title}")) {
                if let Some(handle) = flag.get() {
                    handle.store(true, Ordering::SeqCst);
                }
            }
            return Ok(verdict(FieldKind::Description, 2));
        }
        Ok(verdict(FieldKind::Title, 2))
    }))
}

#[tokio::test]
async fn test_interrupt_during_last_row_still_completes() {
    let flag = Arc::new(OnceLock::new());
    let mock = interrupting_scorer("Shirt", flag.clone());
    let runner = runner(mock.clone());
    let _ = flag.set(runner.interrupt_handle());

    let outcome = runner.run(vec![complete_row(0, "Shirt")]).await;

    assert!(runner.interrupt_handle().load(Ordering::SeqCst));
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(!outcome.summary.partial);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_interrupt_mid_run_leaves_later_rows_unstarted() {
    let flag = Arc::new(OnceLock::new());
    let mock = interrupting_scorer("Shirt", flag.clone());
    let runner = runner(mock.clone());
    let _ = flag.set(runner.interrupt_handle());

    let outcome = runner
        .run(vec![complete_row(0, "Shirt"), complete_row(1, "Socks")])
        .await;

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.status, RunStatus::Interrupted);
    assert!(outcome.summary.partial);
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_auth_failure_aborts_batch() {
    let mock = Arc::new(MockScorer::new(|req| {
        if req.prompt.contains("Original Title: Cap") {
            return Err(ScoringError::Auth("InvalidApiKey".into()));
        }
        let kind = if is_description(req) {
            FieldKind::Description
        } else {
            FieldKind::Title
        };
        Ok(verdict(kind, 2))
    }));

    let outcome = runner(mock.clone())
        .run(vec![
            complete_row(0, "Shirt"),
            complete_row(1, "Cap"),
            complete_row(2, "Scarf"),
        ])
        .await;

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[1].failure.as_ref().unwrap().kind, ErrorKind::Auth);
    assert!(matches!(outcome.status, RunStatus::Aborted { row_index: 1, .. }));
    assert!(outcome.summary.partial);
    assert_eq!(outcome.exit_code(), 2);
    // Auth is never retried and the description is skipped
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn test_summary_carries_score_averages() {
    let outcome = runner(perfect_scorer()).run(vec![complete_row(0, "Shirt")]).await;
    match outcome.summary.detail {
        Some(SummaryDetail::Scores(averages)) => {
            assert_eq!(averages.overall, Some(2.0));
            assert_eq!(averages.overall_distribution, [0, 0, 1]);
        }
        other => panic!("unexpected detail {other:?}"),
    }
}

#[tokio::test]
async fn test_journal_records_rows_and_end() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(RunJournal::create_in(dir.path(), Path::new("input.csv")).unwrap());

    let runner = runner(perfect_scorer()).with_journal(journal.clone());
    runner.run(vec![complete_row(0, "Shirt"), complete_row(1, "Cap")]).await;

    let content = std::fs::read_to_string(journal.path()).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["type"], "row");
    assert_eq!(lines[1]["row_index"], 1);
    assert_eq!(lines[2]["type"], "run_end");
    assert_eq!(lines[2]["status"], "completed");
    assert_eq!(lines[2]["summary"]["rows_seen"], 2);
}
