use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Detects the language of a text, returning a short tag such as `en`
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> String;
}

static CJK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]").expect("valid regex"));
static GERMAN_LETTERS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[äöüÄÖÜß]").expect("valid regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}+").expect("valid regex"));

/// Common German function words and product vocabulary
const GERMAN_WORDS: &[&str] = &[
    "der", "die", "das", "und", "ist", "sind", "für", "mit", "auf", "zu", "von", "über",
    "unter", "nach", "vor", "bei", "durch", "gegen", "ohne", "um", "als", "wie", "wenn",
    "dass", "wird", "werden", "kann", "können", "muss", "müssen", "hat", "haben", "wurde",
    "wurden", "sein", "seine", "ihr", "ihre", "produkt", "artikel", "ware", "marke",
    "hersteller", "modell", "typ", "qualität", "größe", "farbe", "preis", "versand",
    "lieferung", "bestellung", "verfügbar", "erhältlich", "lager", "kunde", "garantie",
    "zubehör", "haushalt", "büro", "geschäft", "gesundheit", "funktion", "eigenschaft",
    "merkmal", "vorteil",
];

/// Distinct German words needed before plain-ASCII text counts as German
const GERMAN_WORD_THRESHOLD: usize = 3;

/// Character- and vocabulary-based detector: `zh`, `de` or `en`
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicDetector;

impl HeuristicDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for HeuristicDetector {
    fn detect(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return "en".into();
        }
        if CJK.is_match(text) {
            return "zh".into();
        }
        if GERMAN_LETTERS.is_match(text) {
            return "de".into();
        }

        let lower = text.to_lowercase();
        let hits: HashSet<&str> = WORD
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|w| GERMAN_WORDS.contains(w))
            .collect();
        if hits.len() >= GERMAN_WORD_THRESHOLD {
            return "de".into();
        }
        "en".into()
    }
}
