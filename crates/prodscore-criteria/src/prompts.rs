use std::fmt::Write;

use crate::audit::{AuditAspect, AuditProfile, AuditRecord};
use crate::{CriterionGroup, FieldContent, FieldKind};

/// Language the prompt itself is written in. Reasons are always requested in English.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLanguage {
    English,
    German,
}

impl PromptLanguage {
    pub fn for_tag(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if tag == "de" || tag.starts_with("de-") || tag.starts_with("de_") {
            PromptLanguage::German
        } else {
            PromptLanguage::English
        }
    }
}

/// Input length bucket used by the description length criterion:
/// 1 = too little, 2 = sufficient, 3 = too much
pub fn length_category(original_title: &str, original_description: &str) -> u8 {
    let len = original_title.chars().count() + original_description.chars().count();
    if len < 100 {
        1
    } else if len < 500 {
        2
    } else {
        3
    }
}

/// Prompt templates for field evaluation
pub struct EvaluationPrompts;

impl EvaluationPrompts {
    pub fn system_message(language: PromptLanguage) -> String {
        match language {
            PromptLanguage::English => "You are a professional product content evaluation expert who scores strictly against the given standards. Always write evaluation reasons in English.".to_string(),
            PromptLanguage::German => "Sie sind ein Experte für die Bewertung von Produktinhalten und bewerten streng nach den vorgegebenen Standards. Schreiben Sie Bewertungsgründe immer auf Englisch.".to_string(),
        }
    }

    /// Build the evaluation prompt for one field
    pub fn build_field_prompt(content: &FieldContent<'_>, language_tag: &str) -> String {
        let language = PromptLanguage::for_tag(language_tag);
        let labels = Labels::for_language(language);
        let kind = content.kind;

        let mut prompt = String::new();
        let _ = writeln!(prompt, "{}\n", labels.intro(kind));
        let _ = writeln!(prompt, "{}: {}", labels.original_title, content.original_title);
        let _ = writeln!(prompt, "{}: {}", labels.original_description, content.original_description);
        let _ = writeln!(prompt, "{}: {}", labels.optimized_title, content.optimized_title);
        let _ = writeln!(prompt, "{}: {}", labels.language, language_tag);

        if kind == FieldKind::Description {
            let _ = writeln!(
                prompt,
                "{}: {}",
                labels.optimized_description, content.optimized_description
            );
            let _ = writeln!(
                prompt,
                "\n{}: {} {}",
                labels.length_category,
                length_category(content.original_title, content.original_description),
                labels.length_category_legend
            );
            let _ = writeln!(
                prompt,
                "{}: {} {}",
                labels.optimized_length,
                content.optimized_description.chars().count(),
                labels.characters
            );
        }

        let _ = writeln!(prompt, "\n{}:", labels.criteria);
        for group in [CriterionGroup::MustHave, CriterionGroup::MustAvoid] {
            let _ = writeln!(prompt, "\n{}:", labels.group_heading(group));
            for (n, criterion) in kind.criteria_in(group).enumerate() {
                let text = match language {
                    PromptLanguage::English => criterion.english,
                    PromptLanguage::German => criterion.german,
                };
                let _ = writeln!(prompt, "{}. {}", n + 1, text);
            }
        }

        let _ = writeln!(prompt, "\n{}", labels.scoring);
        let _ = writeln!(prompt, "\n{}", labels.reasons_in_english);
        let _ = writeln!(prompt, "\n{}:", labels.output_format);
        prompt.push_str(&Self::response_schema(kind));
        prompt
    }

    /// JSON skeleton the model must fill, generated from the catalogue
    pub fn response_schema(kind: FieldKind) -> String {
        let mut schema = String::from("{\n");
        for group in [CriterionGroup::MustHave, CriterionGroup::MustAvoid] {
            let _ = writeln!(schema, "    \"{}\": {{", group.key());
            let ids: Vec<_> = kind.criteria_in(group).map(|c| c.id).collect();
            for (i, id) in ids.iter().enumerate() {
                let comma = if i + 1 < ids.len() { "," } else { "" };
                let _ = writeln!(
                    schema,
                    "        \"{}\": {{\"score\": 0/1/2, \"reason\": \"Evaluation reason in English\"}}{}",
                    id, comma
                );
            }
            schema.push_str("    },\n");
        }
        schema.push_str("    \"overall_reason\": \"Overall evaluation reason in English\"\n}\n");
        schema
    }
}

struct Labels {
    original_title: &'static str,
    original_description: &'static str,
    optimized_title: &'static str,
    optimized_description: &'static str,
    language: &'static str,
    length_category: &'static str,
    length_category_legend: &'static str,
    optimized_length: &'static str,
    characters: &'static str,
    criteria: &'static str,
    must_have: &'static str,
    must_avoid: &'static str,
    scoring: &'static str,
    reasons_in_english: &'static str,
    output_format: &'static str,
    title_intro: &'static str,
    description_intro: &'static str,
}

impl Labels {
    fn for_language(language: PromptLanguage) -> Self {
        match language {
            PromptLanguage::English => Labels {
                original_title: "Original Title",
                original_description: "Original Description",
                optimized_title: "Optimized Title",
                optimized_description: "Optimized Description",
                language: "Content Language",
                length_category: "Input Text Length Category",
                length_category_legend: "(1=too little, 2=sufficient, 3=too much)",
                optimized_length: "Optimized Description Length",
                characters: "characters",
                criteria: "Evaluation Criteria",
                must_have: "Must Have Requirements",
                must_avoid: "Must Avoid Issues",
                scoring: "Scoring:\n- Must Have: 0=does not meet, 1=partially meets, 2=fully meets\n- Must Avoid: 0=problem exists (criterion violated), 1=partial problem, 2=no problem",
                reasons_in_english: "IMPORTANT: every \"reason\" and \"overall_reason\" must be written in English. Give a reason for every score below 2.",
                output_format: "Respond with JSON only, in this format",
                title_intro: "You are a professional product title evaluation expert. Evaluate the optimized title against the criteria below.",
                description_intro: "You are a professional product description evaluation expert. Evaluate the optimized description against the criteria below.",
            },
            PromptLanguage::German => Labels {
                original_title: "Originaltitel",
                original_description: "Originalbeschreibung",
                optimized_title: "Optimierter Titel",
                optimized_description: "Optimierte Beschreibung",
                language: "Sprache des Inhalts",
                length_category: "Eingabetextlänge-Kategorie",
                length_category_legend: "(1=zu wenig, 2=ausreichend, 3=zu viel)",
                optimized_length: "Optimierte Beschreibungslänge",
                characters: "Zeichen",
                criteria: "Bewertungskriterien",
                must_have: "Erforderliche Anforderungen (Must Have)",
                must_avoid: "Zu vermeidende Probleme (Must Avoid)",
                scoring: "Bewertung:\n- Must Have: 0=erfüllt nicht, 1=teilweise erfüllt, 2=vollständig erfüllt\n- Must Avoid: 0=Problem vorhanden (Kriterium verletzt), 1=teilweise Problem, 2=kein Problem",
                reasons_in_english: "WICHTIG: Alle \"reason\" und \"overall_reason\" Felder müssen auf Englisch geschrieben werden. Begründen Sie jede Bewertung unter 2.",
                output_format: "Antworten Sie ausschließlich mit JSON in diesem Format",
                title_intro: "Sie sind ein Experte für die Bewertung von Produkttiteln. Bewerten Sie den optimierten Titel nach den folgenden Kriterien.",
                description_intro: "Sie sind ein Experte für die Bewertung von Produktbeschreibungen. Bewerten Sie die optimierte Beschreibung nach den folgenden Kriterien.",
            },
        }
    }

    fn intro(&self, kind: FieldKind) -> &'static str {
        match kind {
            FieldKind::Title => self.title_intro,
            FieldKind::Description => self.description_intro,
        }
    }

    fn group_heading(&self, group: CriterionGroup) -> &'static str {
        match group {
            CriterionGroup::MustHave => self.must_have,
            CriterionGroup::MustAvoid => self.must_avoid,
        }
    }
}

/// Prompt templates for product audits
pub struct AuditPrompts;

impl AuditPrompts {
    pub fn system_message(profile: AuditProfile) -> String {
        match profile {
            AuditProfile::Scraped => "You are a professional product quality auditor. You review product information scraped from a source website. Title and description are taken verbatim from the source, so focus on consistency between URL, title and description. Always respond with valid JSON.".to_string(),
            AuditProfile::Online => "You are a professional product quality auditor. You review product information from an online platform without a source URL, so judge it from title and description alone. Product validity has only two statuses: PASS or NEEDS_MANUAL_CHECK. Always respond with valid JSON.".to_string(),
        }
    }

    pub fn build_audit_prompt(profile: AuditProfile, record: &AuditRecord) -> String {
        let na = |s: &str| if s.trim().is_empty() { "N/A".to_string() } else { s.to_string() };

        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are an AI product auditor. Review the following product information.\n"
        );
        if profile == AuditProfile::Scraped {
            let _ = writeln!(prompt, "**Product URL:**\n{}\n", na(&record.url));
        }
        let _ = writeln!(prompt, "**Title:**\n{}\n", na(&record.title));
        let _ = writeln!(prompt, "**Description:**\n{}\n", na(&record.description));
        let _ = writeln!(prompt, "**Category:**\n{}\n", na(&record.category));
        let _ = writeln!(prompt, "**Keywords:**\n{}\n", na(&record.keywords));

        let _ = writeln!(prompt, "**Review Criteria:**\n");
        for aspect in profile.aspects() {
            let _ = writeln!(prompt, "- {}: {}", aspect.label(), aspect_guidance(*aspect));
        }

        let _ = writeln!(
            prompt,
            "\n**Status Definitions:**\n- PASS: acceptable as is\n- NEEDS_REVIEW: minor issue or uncertain, needs spot-checking\n- NEEDS_MANUAL_CHECK: significant issue, requires manual review\n"
        );
        let _ = writeln!(prompt, "Respond ONLY with valid JSON in this format:");
        prompt.push_str("{\n");
        let aspects = profile.aspects();
        for (i, aspect) in aspects.iter().enumerate() {
            let comma = if i + 1 < aspects.len() { "," } else { "" };
            let _ = writeln!(
                prompt,
                "    \"{}\": {{\"status\": \"{}\", \"reason\": \"Brief explanation\"}}{}",
                aspect.response_key(),
                allowed_statuses(*aspect),
                comma
            );
        }
        prompt.push_str("}\n");
        prompt
    }
}

fn allowed_statuses(aspect: AuditAspect) -> &'static str {
    if aspect == AuditAspect::ProductValidity {
        "PASS | NEEDS_MANUAL_CHECK"
    } else {
        "PASS | NEEDS_REVIEW | NEEDS_MANUAL_CHECK"
    }
}

fn aspect_guidance(aspect: AuditAspect) -> &'static str {
    match aspect {
        AuditAspect::Url => "Is this a single product page? Success-case or portfolio pages are NEEDS_MANUAL_CHECK; category or multi-product listing pages are NEEDS_REVIEW with reason \"Category page\" or \"Multi-product page\"; uncertain is NEEDS_REVIEW.",
        AuditAspect::Title => "Does the scraped title match the product name or identifier in the URL?",
        AuditAspect::Description => "Does the description match the product in the URL and stay consistent with the title?",
        AuditAspect::Category => "Is the category accurate for the product type and is the path logical? Empty or N/A is NEEDS_MANUAL_CHECK.",
        AuditAspect::Keyword => "Do the keywords describe the product? Completely irrelevant keywords are NEEDS_MANUAL_CHECK.",
        AuditAspect::ProductValidity => "Does the content describe a real, specific product? Spam, gibberish, success stories, case studies or company information are NEEDS_MANUAL_CHECK.",
        AuditAspect::NonSpamContent => "Is the content meaningful, free of spam, gibberish or placeholder text?",
        AuditAspect::InformationCompleteness => "Do title and description give enough detail (type, key specifications) to identify the product?",
        AuditAspect::Consistency => "Do title, description, category and keywords describe the same product without contradictions?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_content() -> FieldContent<'static> {
        FieldContent::title("Blue Cotton T-Shirt", "Soft tee, 100% organic cotton", "Blue Cotton T-Shirt 100% Organic")
    }

    #[test]
    fn test_prompt_language_for_tag() {
        assert_eq!(PromptLanguage::for_tag("de"), PromptLanguage::German);
        assert_eq!(PromptLanguage::for_tag(" DE "), PromptLanguage::German);
        assert_eq!(PromptLanguage::for_tag("de-AT"), PromptLanguage::German);
        assert_eq!(PromptLanguage::for_tag("fr"), PromptLanguage::English);
        assert_eq!(PromptLanguage::for_tag("dk"), PromptLanguage::English);
    }

    #[test]
    fn test_length_category() {
        assert_eq!(length_category("short", ""), 1);
        assert_eq!(length_category(&"a".repeat(60), &"b".repeat(40)), 2);
        assert_eq!(length_category(&"a".repeat(100), &"b".repeat(399)), 2);
        assert_eq!(length_category(&"a".repeat(100), &"b".repeat(400)), 3);
        // Counted in characters, not bytes
        assert_eq!(length_category(&"ü".repeat(60), ""), 1);
    }

    #[test]
    fn test_title_prompt_lists_every_criterion() {
        let prompt = EvaluationPrompts::build_field_prompt(&title_content(), "en");
        for criterion in FieldKind::Title.criteria() {
            assert!(prompt.contains(criterion.id), "missing {}", criterion.id);
            assert!(prompt.contains(criterion.english));
        }
        assert!(prompt.contains("Optimized Title: Blue Cotton T-Shirt 100% Organic"));
        assert!(!prompt.contains("Input Text Length Category"));
    }

    #[test]
    fn test_german_prompt() {
        let prompt = EvaluationPrompts::build_field_prompt(&title_content(), "de");
        assert!(prompt.contains("Originaltitel: Blue Cotton T-Shirt"));
        assert!(prompt.contains("auf Englisch"));
        assert!(prompt.contains(FieldKind::Title.criteria()[0].german));
    }

    #[test]
    fn test_description_prompt_has_length_info() {
        let content = FieldContent::description(
            "Mug",
            "Ceramic mug",
            "Ceramic Mug",
            "A ceramic mug.",
        );
        let prompt = EvaluationPrompts::build_field_prompt(&content, "en");
        assert!(prompt.contains("Input Text Length Category: 1"));
        assert!(prompt.contains("Optimized Description Length: 14 characters"));
        assert!(prompt.contains("criteria_8_no_care_tips"));
    }

    #[test]
    fn test_schema_is_valid_json_shape() {
        let schema = EvaluationPrompts::response_schema(FieldKind::Description);
        assert!(schema.starts_with("{\n    \"must_have\": {"));
        assert_eq!(schema.matches("\"score\"").count(), 8);
    }

    #[test]
    fn test_audit_prompt_covers_profile_aspects() {
        let record = AuditRecord {
            id: "1".into(),
            url: "https://shop.example.com/p/42".into(),
            title: "Steel Bottle".into(),
            description: String::new(),
            category: "Home > Kitchen".into(),
            keywords: "bottle, steel".into(),
        };
        let scraped = AuditPrompts::build_audit_prompt(AuditProfile::Scraped, &record);
        assert!(scraped.contains("\"url_review\""));
        assert!(scraped.contains("https://shop.example.com/p/42"));
        assert!(scraped.contains("**Description:**\nN/A"));

        let online = AuditPrompts::build_audit_prompt(AuditProfile::Online, &record);
        assert!(online.contains("\"product_validity\": {\"status\": \"PASS | NEEDS_MANUAL_CHECK\""));
        assert!(!online.contains("Product URL"));
    }
}
