use serde::{Deserialize, Serialize};

/// The content field being evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Title,
    Description,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::Description => "description",
        }
    }

    /// Ordered criteria checked for this field
    pub fn criteria(&self) -> &'static [Criterion] {
        match self {
            FieldKind::Title => TITLE_CRITERIA,
            FieldKind::Description => DESCRIPTION_CRITERIA,
        }
    }

    pub fn criteria_in(&self, group: CriterionGroup) -> impl Iterator<Item = &'static Criterion> {
        self.criteria().iter().filter(move |c| c.group == group)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Must-have criteria lose points when something is absent,
/// must-avoid criteria lose points when something is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionGroup {
    MustHave,
    MustAvoid,
}

impl CriterionGroup {
    /// Key of the group object in the model's JSON verdict
    pub fn key(&self) -> &'static str {
        match self {
            CriterionGroup::MustHave => "must_have",
            CriterionGroup::MustAvoid => "must_avoid",
        }
    }
}

/// One named rule a field is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion {
    pub id: &'static str,
    pub group: CriterionGroup,
    pub english: &'static str,
    pub german: &'static str,
}

const fn must_have(id: &'static str, english: &'static str, german: &'static str) -> Criterion {
    Criterion {
        id,
        group: CriterionGroup::MustHave,
        english,
        german,
    }
}

const fn must_avoid(id: &'static str, english: &'static str, german: &'static str) -> Criterion {
    Criterion {
        id,
        group: CriterionGroup::MustAvoid,
        english,
        german,
    }
}

pub const TITLE_CRITERIA: &[Criterion] = &[
    must_have(
        "criteria_1_clear_product_type",
        "Clear Product Type: the title must name the product type (e.g. \"Laptop Lenovo\", \"Water Bottle\") and it must match the product type in the original title and description.",
        "Klarer Produkttyp: Der Titel muss den Produkttyp nennen (z.B. \"Laptop Lenovo\", \"Wasserflasche\") und mit dem Produkttyp aus Originaltitel und Beschreibung übereinstimmen.",
    ),
    must_have(
        "criteria_2_key_details",
        "Key Details: specifications present in the original title or description (size, material, brand, certificate, application) should appear in the optimized title.",
        "Wichtige Details: Spezifikationen aus Originaltitel oder Beschreibung (Größe, Material, Marke, Zertifikat, Anwendung) sollten im optimierten Titel enthalten sein.",
    ),
    must_avoid(
        "criteria_3_no_extra_details",
        "No Extra Details: no information that is not present in the original content.",
        "Keine zusätzlichen Details: Keine Informationen, die nicht im Originalinhalt vorhanden sind.",
    ),
    must_avoid(
        "criteria_4_no_repetition",
        "No Repetition or Stuffing: no repeated words or synonym keyword stuffing (e.g. \"Steel Metal Bottle Steel\").",
        "Keine Wiederholung oder Überladung: Keine wiederholten Wörter oder Synonym-Keyword-Stuffing (z.B. \"Stahl Metall Flasche Stahl\").",
    ),
    must_avoid(
        "criteria_5_short_and_clear",
        "Short and Clear: between 3 and 128 characters (ideally 50-80), starting with the product type followed by specifications.",
        "Kurz und klar: Zwischen 3 und 128 Zeichen (ideal 50-80), beginnend mit dem Produkttyp, gefolgt von Spezifikationen.",
    ),
    must_avoid(
        "criteria_6_no_forbidden_content",
        "No Forbidden Content: no prices, VAT, shipping, company names or incomplete phrases (e.g. ending in \"for\", \"and\").",
        "Keine verbotenen Inhalte: Keine Preise, Mehrwertsteuer, Versand, Firmennamen oder unvollständige Phrasen (z.B. endend mit \"für\", \"und\").",
    ),
    must_avoid(
        "criteria_7_no_brand_only",
        "No Brand/Model Only: the title cannot be just a brand or model number and must include the product type.",
        "Nicht nur Marke/Modell: Der Titel darf nicht nur aus Marke oder Modellnummer bestehen und muss den Produkttyp enthalten.",
    ),
];

pub const DESCRIPTION_CRITERIA: &[Criterion] = &[
    must_have(
        "criteria_1_match_title_original",
        "Match Title and Original: the description uses the same details as the title and the original text, with no contradictions.",
        "Übereinstimmung mit Titel und Original: Die Beschreibung verwendet dieselben Details wie Titel und Originaltext, ohne Widersprüche.",
    ),
    must_have(
        "criteria_2_key_details_upfront",
        "Key Details Upfront: the first sentence names the product type and key specifications (if available).",
        "Wichtige Details zuerst: Der erste Satz nennt Produkttyp und wichtige Spezifikationen (falls verfügbar).",
    ),
    must_have(
        "criteria_3_clear_structure",
        "Clear Structure: with enough information, an intro sentence (type + specs), bullet points (features, materials) and a conclusion (value/use, if in the original).",
        "Klare Struktur: Bei genügend Informationen ein Einleitungssatz (Typ + Spezifikationen), Aufzählungspunkte (Funktionen, Materialien) und ein Schluss (Wert/Verwendung, falls im Original).",
    ),
    must_have(
        "criteria_4_proper_length",
        "Proper Length: category 1 (input too little) may stay under 601 characters, focus on clarity; category 2 (input sufficient) must exceed 610 characters (target 610-700); category 3 (input too much) must be 600-700 characters, condensed without redundancy.",
        "Angemessene Länge: Kategorie 1 (Eingabe zu wenig) darf unter 601 Zeichen bleiben, Fokus auf Klarheit; Kategorie 2 (Eingabe ausreichend) muss über 610 Zeichen liegen (Ziel 610-700); Kategorie 3 (Eingabe zu viel) muss 600-700 Zeichen haben, komprimiert ohne Redundanz.",
    ),
    must_avoid(
        "criteria_5_no_extra_details",
        "No Extra Details: no benefits, use cases, marketing information or specifications that are not in the original content.",
        "Keine zusätzlichen Details: Keine Vorteile, Anwendungsfälle, Marketinginformationen oder Spezifikationen, die nicht im Original stehen.",
    ),
    must_avoid(
        "criteria_6_no_repetition",
        "No Repetition or Stuffing: no repeated words or keyword overloading.",
        "Keine Wiederholung oder Überladung: Keine wiederholten Wörter oder Keyword-Stuffing.",
    ),
    must_avoid(
        "criteria_7_no_forbidden_content",
        "No Forbidden Content: no prices, VAT, shipping, company/project information or incomplete phrases.",
        "Keine verbotenen Inhalte: Keine Preise, Mehrwertsteuer, Versand, Firmen-/Projektinformationen oder unvollständige Phrasen.",
    ),
    must_avoid(
        "criteria_8_no_care_tips",
        "No Care Tips or Extras: no recipes, maintenance advice or unsupported claims.",
        "Keine Pflegetipps oder Extras: Keine Rezepte, Wartungsratschläge oder unbelegte Behauptungen.",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_sizes() {
        let count = |kind: FieldKind, group| kind.criteria_in(group).count();
        assert_eq!(count(FieldKind::Title, CriterionGroup::MustHave), 2);
        assert_eq!(count(FieldKind::Title, CriterionGroup::MustAvoid), 5);
        assert_eq!(count(FieldKind::Description, CriterionGroup::MustHave), 4);
        assert_eq!(count(FieldKind::Description, CriterionGroup::MustAvoid), 4);
    }

    #[test]
    fn test_ids_are_unique_per_field() {
        for kind in [FieldKind::Title, FieldKind::Description] {
            let mut ids: Vec<_> = kind.criteria().iter().map(|c| c.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), kind.criteria().len());
        }
    }
}
