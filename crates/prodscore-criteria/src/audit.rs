//! Product audit aspects, status rules and response merging.
//!
//! The model proposes a status per aspect; local checks then override it
//! when a hard violation is detectable without the model (empty category,
//! unusable URL). Every aspect is judged on its own, so the order in which
//! aspects are listed never changes the outcome.

use prodscore_scorer::StructuredVerdict;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Maximum number of keywords taken from a JSON array
const MAX_KEYWORDS: usize = 10;

/// Category values that count as "no category"
const EMPTY_CATEGORY_MARKERS: &[&str] = &["N/A", "NA", "NULL", "NONE"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAspect {
    Url,
    Title,
    Description,
    Category,
    Keyword,
    ProductValidity,
    InformationCompleteness,
    Consistency,
    NonSpamContent,
}

impl AuditAspect {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAspect::Url => "url",
            AuditAspect::Title => "title",
            AuditAspect::Description => "description",
            AuditAspect::Category => "category",
            AuditAspect::Keyword => "keyword",
            AuditAspect::ProductValidity => "product_validity",
            AuditAspect::InformationCompleteness => "information_completeness",
            AuditAspect::Consistency => "consistency",
            AuditAspect::NonSpamContent => "non_spam_content",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuditAspect::Url => "URL",
            AuditAspect::Title => "Title",
            AuditAspect::Description => "Description",
            AuditAspect::Category => "Category",
            AuditAspect::Keyword => "Keywords",
            AuditAspect::ProductValidity => "Product Validity",
            AuditAspect::InformationCompleteness => "Information Completeness",
            AuditAspect::Consistency => "Consistency",
            AuditAspect::NonSpamContent => "Non-Spam Content",
        }
    }

    /// Key the model is asked to answer under
    pub fn response_key(&self) -> String {
        match self {
            AuditAspect::ProductValidity => self.as_str().to_string(),
            _ => format!("{}_review", self.as_str()),
        }
    }
}

impl std::str::FromStr for AuditAspect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "url" => Ok(AuditAspect::Url),
            "title" => Ok(AuditAspect::Title),
            "description" => Ok(AuditAspect::Description),
            "category" => Ok(AuditAspect::Category),
            "keyword" => Ok(AuditAspect::Keyword),
            "product_validity" => Ok(AuditAspect::ProductValidity),
            "information_completeness" => Ok(AuditAspect::InformationCompleteness),
            "consistency" => Ok(AuditAspect::Consistency),
            "non_spam_content" => Ok(AuditAspect::NonSpamContent),
            _ => Err(format!("Unknown audit aspect: {}", s)),
        }
    }
}

impl std::fmt::Display for AuditAspect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit outcome, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Pass,
    NeedsReview,
    NeedsManualCheck,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pass => "PASS",
            AuditStatus::NeedsReview => "NEEDS_REVIEW",
            AuditStatus::NeedsManualCheck => "NEEDS_MANUAL_CHECK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "PASS" => Some(AuditStatus::Pass),
            "NEEDS_REVIEW" => Some(AuditStatus::NeedsReview),
            "NEEDS_MANUAL_CHECK" => Some(AuditStatus::NeedsManualCheck),
            _ => None,
        }
    }

    /// Worst status among `statuses`; PASS when empty
    pub fn worst<I: IntoIterator<Item = AuditStatus>>(statuses: I) -> AuditStatus {
        statuses.into_iter().max().unwrap_or(AuditStatus::Pass)
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditAspectResult {
    pub aspect: AuditAspect,
    pub status: AuditStatus,
    pub reason: String,
}

impl AuditAspectResult {
    pub fn new(aspect: AuditAspect, status: AuditStatus, reason: impl Into<String>) -> Self {
        Self {
            aspect,
            status,
            reason: reason.into(),
        }
    }

    pub fn manual_check(aspect: AuditAspect, reason: impl Into<String>) -> Self {
        Self::new(aspect, AuditStatus::NeedsManualCheck, reason)
    }
}

/// Which aspects are audited for a given input source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditProfile {
    /// Records scraped from a source website
    #[default]
    Scraped,
    /// Records from an online platform, without a source URL
    Online,
}

impl AuditProfile {
    pub fn aspects(&self) -> &'static [AuditAspect] {
        match self {
            AuditProfile::Scraped => &[
                AuditAspect::Url,
                AuditAspect::Title,
                AuditAspect::Description,
                AuditAspect::Category,
                AuditAspect::Keyword,
            ],
            AuditProfile::Online => &[
                AuditAspect::ProductValidity,
                AuditAspect::NonSpamContent,
                AuditAspect::InformationCompleteness,
                AuditAspect::Consistency,
                AuditAspect::Category,
                AuditAspect::Keyword,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditProfile::Scraped => "scraped",
            AuditProfile::Online => "online",
        }
    }
}

impl std::str::FromStr for AuditProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scraped" | "scraper" => Ok(AuditProfile::Scraped),
            "online" => Ok(AuditProfile::Online),
            _ => Err(format!("Unknown audit profile: {}", s)),
        }
    }
}

/// One product as presented to the auditor, with category and keywords
/// already flattened to plain text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub keywords: String,
}

impl AuditRecord {
    pub fn from_raw(
        id: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        raw_category: &str,
        raw_keywords: &str,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into().trim().to_string(),
            title: title.into(),
            description: description.into(),
            category: parse_category(raw_category),
            keywords: parse_keywords(raw_keywords),
        }
    }
}

/// Flatten a category cell: `[{"catPath": ..}]`, `{"catPath": ..}` or plain text
pub fn parse_category(raw: &str) -> String {
    let raw = raw.trim();
    if !(raw.starts_with('[') || raw.starts_with('{')) {
        return raw.to_string();
    }
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    match &value {
        Value::Array(items) => items.first().map(category_path).unwrap_or_default(),
        Value::Object(_) => category_path(&value),
        _ => raw.to_string(),
    }
}

fn category_path(value: &Value) -> String {
    match value.get("catPath") {
        Some(Value::String(path)) => path.clone(),
        Some(other) => other.to_string(),
        None => plain_text(value),
    }
}

/// Flatten a keyword cell: `{"keywords_english": {..}}`, `{"keywords": {..}}`,
/// a JSON array (first ten entries) or plain text
pub fn parse_keywords(raw: &str) -> String {
    let raw = raw.trim();
    if !(raw.starts_with('[') || raw.starts_with('{')) {
        return raw.to_string();
    }
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return raw.to_string();
    };
    match &value {
        Value::Object(map) => match map.get("keywords_english").or_else(|| map.get("keywords")) {
            Some(inner) => join_values(inner, usize::MAX),
            None => value.to_string(),
        },
        Value::Array(_) => join_values(&value, MAX_KEYWORDS),
        _ => raw.to_string(),
    }
}

fn join_values(value: &Value, limit: usize) -> String {
    let items: Vec<String> = match value {
        Value::Object(map) => map.values().take(limit).map(plain_text).collect(),
        Value::Array(items) => items.iter().take(limit).map(plain_text).collect(),
        other => vec![plain_text(other)],
    };
    items.join(", ")
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_missing_category(category: &str) -> bool {
    let trimmed = category.trim();
    trimmed.is_empty()
        || EMPTY_CATEGORY_MARKERS
            .iter()
            .any(|m| trimmed.eq_ignore_ascii_case(m))
}

/// An absolute http(s) URL with a host
pub fn is_valid_product_url(url: &str) -> bool {
    match Url::parse(url.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// Local rule that overrides the model for `aspect`, if violated
pub fn hard_violation(profile: AuditProfile, aspect: AuditAspect, record: &AuditRecord) -> Option<String> {
    match aspect {
        AuditAspect::Category if is_missing_category(&record.category) => {
            Some("Category is empty or N/A".to_string())
        }
        AuditAspect::Url if profile == AuditProfile::Scraped && !is_valid_product_url(&record.url) => {
            Some("URL is missing or not an absolute http(s) URL".to_string())
        }
        _ => None,
    }
}

/// Merge the model's answer with the local rules, one result per profile aspect
pub fn merge_review(
    profile: AuditProfile,
    record: &AuditRecord,
    verdict: &StructuredVerdict,
) -> Vec<AuditAspectResult> {
    profile
        .aspects()
        .iter()
        .map(|&aspect| {
            if let Some(reason) = hard_violation(profile, aspect, record) {
                return AuditAspectResult::manual_check(aspect, reason);
            }
            let result = model_result(aspect, verdict);
            debug!(aspect = %aspect, status = %result.status, "Audit aspect reviewed");
            result
        })
        .collect()
}

/// Every aspect NEEDS_MANUAL_CHECK, used when the review call itself failed
pub fn failed_review(profile: AuditProfile, reason: &str) -> Vec<AuditAspectResult> {
    profile
        .aspects()
        .iter()
        .map(|&aspect| AuditAspectResult::manual_check(aspect, reason))
        .collect()
}

fn model_result(aspect: AuditAspect, verdict: &StructuredVerdict) -> AuditAspectResult {
    let key = aspect.response_key();
    let entry = verdict
        .get(&key)
        .or_else(|| verdict.get(aspect.as_str()))
        .or_else(|| verdict.get(&format!("{}_review", aspect.as_str())));

    let Some(entry) = entry else {
        return AuditAspectResult::manual_check(aspect, "review result missing");
    };

    let raw_status = entry.get("status").and_then(Value::as_str).unwrap_or_default();
    let reason = entry
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    let Some(status) = AuditStatus::parse(raw_status) else {
        return AuditAspectResult::manual_check(
            aspect,
            format!("unrecognized status '{}': {}", raw_status, reason),
        );
    };

    if aspect == AuditAspect::ProductValidity && status == AuditStatus::NeedsReview {
        return AuditAspectResult::manual_check(
            aspect,
            format!("status {} not allowed for product validity: {}", status, reason),
        );
    }

    AuditAspectResult::new(aspect, status, reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> AuditRecord {
        AuditRecord::from_raw(
            "42",
            "https://shop.example.com/products/steel-bottle",
            "Steel Bottle 500ml",
            "Insulated steel bottle",
            r#"[{"catPath": "Home > Kitchen > Bottles", "catId": 7}]"#,
            r#"{"keywords_english": {"1": "steel bottle", "2": "water bottle"}}"#,
        )
    }

    fn verdict(value: Value) -> StructuredVerdict {
        StructuredVerdict::from_value(value).unwrap()
    }

    fn all_pass(profile: AuditProfile) -> StructuredVerdict {
        let mut map = serde_json::Map::new();
        for aspect in profile.aspects() {
            map.insert(aspect.response_key(), json!({"status": "PASS", "reason": "fine"}));
        }
        StructuredVerdict::new(map)
    }

    #[test]
    fn test_aspect_names_round_trip_through_from_str() {
        for profile in [AuditProfile::Scraped, AuditProfile::Online] {
            for aspect in profile.aspects() {
                assert_eq!(aspect.as_str().parse::<AuditAspect>(), Ok(*aspect));
            }
        }
        assert!("overall".parse::<AuditAspect>().is_err());
    }

    #[test]
    fn test_parse_category_forms() {
        assert_eq!(parse_category(r#"[{"catPath": "A > B"}]"#), "A > B");
        assert_eq!(parse_category(r#"{"catPath": "A > C"}"#), "A > C");
        assert_eq!(parse_category("Plain > Path"), "Plain > Path");
        assert_eq!(parse_category("[broken json"), "[broken json");
        assert_eq!(parse_category("[]"), "");
    }

    #[test]
    fn test_parse_keyword_forms() {
        assert_eq!(
            parse_keywords(r#"{"keywords_english": {"a": "mug", "b": "cup"}}"#),
            "mug, cup"
        );
        assert_eq!(parse_keywords(r#"{"keywords": {"a": "lamp"}}"#), "lamp");
        let many: Vec<String> = (1..=12).map(|i| format!("k{i}")).collect();
        let parsed = parse_keywords(&serde_json::to_string(&many).unwrap());
        assert_eq!(parsed.split(", ").count(), 10);
        assert_eq!(parse_keywords("mug, cup"), "mug, cup");
    }

    #[test]
    fn test_status_ordering() {
        assert!(AuditStatus::Pass < AuditStatus::NeedsReview);
        assert!(AuditStatus::NeedsReview < AuditStatus::NeedsManualCheck);
        assert_eq!(
            AuditStatus::worst([AuditStatus::Pass, AuditStatus::NeedsManualCheck, AuditStatus::NeedsReview]),
            AuditStatus::NeedsManualCheck
        );
        assert_eq!(AuditStatus::worst([]), AuditStatus::Pass);
        assert_eq!(AuditStatus::parse("needs review"), Some(AuditStatus::NeedsReview));
    }

    #[test]
    fn test_empty_category_overrides_model_pass() {
        for empty in ["", "  ", "N/A", "null", "None"] {
            let mut rec = record();
            rec.category = empty.to_string();
            let results = merge_review(AuditProfile::Scraped, &rec, &all_pass(AuditProfile::Scraped));
            let category = results.iter().find(|r| r.aspect == AuditAspect::Category).unwrap();
            assert_eq!(category.status, AuditStatus::NeedsManualCheck, "{empty:?}");
        }
    }

    #[test]
    fn test_invalid_url_overrides_model_pass() {
        for url in ["", "shop.example.com/p/1", "ftp://example.com/p", "/relative/path"] {
            let mut rec = record();
            rec.url = url.to_string();
            let results = merge_review(AuditProfile::Scraped, &rec, &all_pass(AuditProfile::Scraped));
            assert_eq!(results[0].aspect, AuditAspect::Url);
            assert_eq!(results[0].status, AuditStatus::NeedsManualCheck, "{url:?}");
        }
    }

    #[test]
    fn test_online_profile_ignores_url() {
        let mut rec = record();
        rec.url.clear();
        let results = merge_review(AuditProfile::Online, &rec, &all_pass(AuditProfile::Online));
        assert!(results.iter().all(|r| r.status == AuditStatus::Pass));
        assert_eq!(results.len(), 6);
    }

    #[test]
    fn test_missing_aspect_and_bad_status() {
        let v = verdict(json!({
            "url_review": {"status": "PASS", "reason": "product page"},
            "title_review": {"status": "MAYBE", "reason": "?"},
            "description_review": {"status": "needs_review", "reason": "vague"},
            "category_review": {"status": "PASS", "reason": "ok"}
        }));
        let results = merge_review(AuditProfile::Scraped, &record(), &v);
        assert_eq!(results[0].status, AuditStatus::Pass);
        assert_eq!(results[1].status, AuditStatus::NeedsManualCheck);
        assert_eq!(results[2].status, AuditStatus::NeedsReview);
        assert_eq!(results[4].aspect, AuditAspect::Keyword);
        assert_eq!(results[4].reason, "review result missing");
    }

    #[test]
    fn test_product_validity_is_binary() {
        let mut map = all_pass(AuditProfile::Online).fields().clone();
        map.insert(
            "product_validity".into(),
            json!({"status": "NEEDS_REVIEW", "reason": "unclear"}),
        );
        let results = merge_review(AuditProfile::Online, &record(), &StructuredVerdict::new(map));
        assert_eq!(results[0].aspect, AuditAspect::ProductValidity);
        assert_eq!(results[0].status, AuditStatus::NeedsManualCheck);
    }

    #[test]
    fn test_aspect_order_does_not_matter() {
        let rec = record();
        let v = all_pass(AuditProfile::Scraped);
        let forward = merge_review(AuditProfile::Scraped, &rec, &v);
        for result in &forward {
            let alone = hard_violation(AuditProfile::Scraped, result.aspect, &rec)
                .map(|r| AuditAspectResult::manual_check(result.aspect, r))
                .unwrap_or_else(|| model_result(result.aspect, &v));
            assert_eq!(&alone, result);
        }
    }

    #[test]
    fn test_failed_review() {
        let results = failed_review(AuditProfile::Online, "HTTP 500");
        assert_eq!(results.len(), 6);
        assert!(results
            .iter()
            .all(|r| r.status == AuditStatus::NeedsManualCheck && r.reason == "HTTP 500"));
    }
}
