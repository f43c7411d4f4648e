use prodscore_criteria::{AuditAspect, AuditStatus, Score};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::audit::AuditRowResult;
use crate::row::RowResult;
use crate::runner::{RowOutcome, RowStatus};

/// Aggregate figures for a run, computed from the rows actually produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub rows_seen: usize,
    pub fully_evaluated: usize,
    pub partially_evaluated: usize,
    pub failed: usize,
    /// Set when the run was interrupted or aborted
    pub partial: bool,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<SummaryDetail>,
}

impl RunSummary {
    pub fn from_results<T: RowOutcome>(results: &[T], duration: Duration) -> Self {
        let count = |status: RowStatus| results.iter().filter(|r| r.status() == status).count();
        Self {
            rows_seen: results.len(),
            fully_evaluated: count(RowStatus::Full),
            partially_evaluated: count(RowStatus::Partial),
            failed: count(RowStatus::Failed),
            partial: false,
            duration_secs: duration.as_secs_f64(),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryDetail {
    Scores(ScoreAverages),
    Audit(AuditTally),
}

/// Mean scores over the rows where each score exists
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreAverages {
    pub title: Option<f64>,
    pub description: Option<f64>,
    pub overall: Option<f64>,
    /// Rows per overall score, indexed 0..=2
    pub overall_distribution: [usize; 3],
}

impl ScoreAverages {
    pub fn from_results(results: &[RowResult]) -> Self {
        let mut distribution = [0usize; 3];
        for score in results.iter().filter_map(|r| r.overall_score) {
            distribution[usize::from(score.value())] += 1;
        }
        Self {
            title: mean(results.iter().filter_map(RowResult::title_score)),
            description: mean(results.iter().filter_map(RowResult::description_score)),
            overall: mean(results.iter().filter_map(|r| r.overall_score)),
            overall_distribution: distribution,
        }
    }
}

fn mean(scores: impl Iterator<Item = Score>) -> Option<f64> {
    let (sum, n) = scores.fold((0u32, 0u32), |(sum, n), s| (sum + u32::from(s.value()), n + 1));
    (n > 0).then(|| f64::from(sum) / f64::from(n))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pass: usize,
    pub needs_review: usize,
    pub needs_manual_check: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: AuditStatus) {
        match status {
            AuditStatus::Pass => self.pass += 1,
            AuditStatus::NeedsReview => self.needs_review += 1,
            AuditStatus::NeedsManualCheck => self.needs_manual_check += 1,
        }
    }

    pub fn get(&self, status: AuditStatus) -> usize {
        match status {
            AuditStatus::Pass => self.pass,
            AuditStatus::NeedsReview => self.needs_review,
            AuditStatus::NeedsManualCheck => self.needs_manual_check,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.needs_review + self.needs_manual_check
    }
}

/// `part` as a percentage of `whole`; 0 when `whole` is 0
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AspectTally {
    pub aspect: AuditAspect,
    pub counts: StatusCounts,
}

/// Status counts per aspect, kept in first-seen aspect order
#[derive(Debug, Clone, Default)]
pub struct AspectCounter {
    tallies: Vec<AspectTally>,
    index: HashMap<AuditAspect, usize>,
}

impl AspectCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts for `aspect`, registering it with zero counts if unseen
    pub fn entry(&mut self, aspect: AuditAspect) -> &mut StatusCounts {
        let i = match self.index.get(&aspect) {
            Some(&i) => i,
            None => {
                self.tallies.push(AspectTally {
                    aspect,
                    counts: StatusCounts::default(),
                });
                self.index.insert(aspect, self.tallies.len() - 1);
                self.tallies.len() - 1
            }
        };
        &mut self.tallies[i].counts
    }

    pub fn add(&mut self, aspect: AuditAspect, status: AuditStatus) {
        self.entry(aspect).add(status);
    }

    pub fn counts_for(&self, aspect: AuditAspect) -> StatusCounts {
        self.index
            .get(&aspect)
            .map(|&i| self.tallies[i].counts)
            .unwrap_or_default()
    }

    pub fn aspects(&self) -> impl Iterator<Item = AuditAspect> + '_ {
        self.tallies.iter().map(|t| t.aspect)
    }

    pub fn into_tallies(self) -> Vec<AspectTally> {
        self.tallies
    }
}

fn counts_in(tallies: &[AspectTally], aspect: AuditAspect) -> StatusCounts {
    tallies
        .iter()
        .find(|t| t.aspect == aspect)
        .map(|t| t.counts)
        .unwrap_or_default()
}

/// Aspect statuses of the products found under one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlSummary {
    pub url: String,
    pub products: usize,
    pub aspects: Vec<AspectTally>,
}

impl UrlSummary {
    pub fn counts_for(&self, aspect: AuditAspect) -> StatusCounts {
        counts_in(&self.aspects, aspect)
    }

    pub fn pass_percent(&self, aspect: AuditAspect) -> f64 {
        percent(self.counts_for(aspect).pass, self.products)
    }
}

/// Status tallies for an audit run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditTally {
    pub aspects: Vec<AspectTally>,
    pub overall: StatusCounts,
    /// One entry per non-blank URL, most products first
    pub url_summary: Vec<UrlSummary>,
}

impl AuditTally {
    pub fn from_results(results: &[AuditRowResult]) -> Self {
        let mut aspects = AspectCounter::new();
        let mut overall = StatusCounts::default();
        let mut urls: Vec<(String, usize, AspectCounter)> = Vec::new();
        let mut url_index: HashMap<String, usize> = HashMap::new();

        for row in results {
            overall.add(row.overall_status);
            for result in &row.aspects {
                aspects.add(result.aspect, result.status);
            }

            let url = row.url.trim();
            if url.is_empty() {
                continue;
            }
            let i = match url_index.get(url) {
                Some(&i) => i,
                None => {
                    urls.push((url.to_string(), 0, AspectCounter::new()));
                    url_index.insert(url.to_string(), urls.len() - 1);
                    urls.len() - 1
                }
            };
            let (_, products, counter) = &mut urls[i];
            *products += 1;
            for result in &row.aspects {
                counter.add(result.aspect, result.status);
            }
        }

        let mut url_summary: Vec<UrlSummary> = urls
            .into_iter()
            .map(|(url, products, counter)| UrlSummary {
                url,
                products,
                aspects: counter.into_tallies(),
            })
            .collect();
        // Stable: equal counts keep first-seen order
        url_summary.sort_by(|a, b| b.products.cmp(&a.products));

        Self {
            aspects: aspects.into_tallies(),
            overall,
            url_summary,
        }
    }

    pub fn counts_for(&self, aspect: AuditAspect) -> StatusCounts {
        counts_in(&self.aspects, aspect)
    }
}
