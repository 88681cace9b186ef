//! Maps free-text specialty mentions to the canonical specialty set.
//!
//! Two tiers: department keywords in the specialty text first, then
//! symptom phrases in the patient's complaint. The second tier exists
//! because the model sometimes omits or mislabels the specialty section.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::Specialty;

const SPECIALTY_KEYWORDS: &[(Specialty, &[&str])] = &[
    (
        Specialty::Cardiology,
        &["cardiology", "cardiologist", "cardiac", "cardiovascular", "heart"],
    ),
    (
        Specialty::Neurology,
        &["neurology", "neurologist", "neurological", "neuro", "brain", "nerve", "nerves"],
    ),
    (
        Specialty::Orthopedics,
        &[
            "orthopedics", "orthopedic", "orthopaedics", "orthopaedic", "musculoskeletal",
            "bone", "bones", "joint", "joints", "fracture", "spine",
        ],
    ),
    (
        Specialty::Gastroenterology,
        &[
            "gastroenterology", "gastroenterologist", "gastro", "digestive", "stomach",
            "bowel", "liver", "gi",
        ],
    ),
    (
        Specialty::Dermatology,
        &["dermatology", "dermatologist", "skin", "rash"],
    ),
    (
        Specialty::Ophthalmology,
        &["ophthalmology", "ophthalmologist", "eye", "eyes", "vision"],
    ),
    (
        Specialty::Ent,
        &[
            "ent", "otolaryngology", "otolaryngologist", "ear nose and throat",
            "ear, nose and throat", "ear", "nose", "throat", "sinus",
        ],
    ),
    (
        Specialty::Pulmonology,
        &[
            "pulmonology", "pulmonologist", "pulmonary", "respiratory", "lung", "lungs",
            "chest medicine",
        ],
    ),
    (
        Specialty::Endocrinology,
        &[
            "endocrinology", "endocrinologist", "endocrine", "diabetes", "thyroid", "hormone",
            "hormonal",
        ],
    ),
    (
        Specialty::Urology,
        &["urology", "urologist", "kidney", "bladder", "urinary", "prostate"],
    ),
    (
        Specialty::Gynecology,
        &[
            "gynecology", "gynaecology", "gynecologist", "gynaecologist", "obstetrics",
            "ob-gyn", "obgyn", "women's health",
        ],
    ),
    (
        Specialty::Pediatrics,
        &["pediatrics", "paediatrics", "pediatrician", "paediatrician", "child", "children"],
    ),
    (
        Specialty::Emergency,
        &["emergency", "urgent care", "a&e", "casualty", "trauma"],
    ),
    (
        Specialty::Internal,
        &[
            "internal medicine", "internist", "general medicine", "general practitioner",
            "general practice", "family medicine", "primary care", "gp",
        ],
    ),
];

const SYMPTOM_KEYWORDS: &[(Specialty, &[&str])] = &[
    (
        Specialty::Cardiology,
        &["chest pain", "chest tightness", "palpitation", "palpitations", "racing heart"],
    ),
    (
        Specialty::Neurology,
        &["headache", "headaches", "migraine", "dizziness", "dizzy", "seizure", "numbness", "tingling"],
    ),
    (
        Specialty::Orthopedics,
        &["back pain", "joint pain", "knee pain", "sprain", "sprained", "broken"],
    ),
    (
        Specialty::Gastroenterology,
        &[
            "abdominal pain", "stomach ache", "stomachache", "nausea", "vomiting", "diarrhea",
            "diarrhoea", "constipation", "heartburn", "bloating",
        ],
    ),
    (
        Specialty::Dermatology,
        &["itching", "itchy", "acne", "hives", "eczema", "mole"],
    ),
    (
        Specialty::Ophthalmology,
        &["blurred vision", "blurry vision", "eye pain", "red eye", "itchy eyes"],
    ),
    (
        Specialty::Ent,
        &["sore throat", "ear pain", "earache", "hearing loss", "blocked nose", "nosebleed"],
    ),
    (
        Specialty::Pulmonology,
        &["cough", "coughing", "shortness of breath", "short of breath", "wheezing", "breathless"],
    ),
    (
        Specialty::Endocrinology,
        &["excessive thirst", "weight gain", "weight loss", "always thirsty"],
    ),
    (
        Specialty::Urology,
        &["painful urination", "burning urination", "blood in urine", "frequent urination"],
    ),
    (
        Specialty::Gynecology,
        &["menstrual", "period pain", "pregnancy", "pregnant", "vaginal", "pelvic pain"],
    ),
    (
        Specialty::Emergency,
        &["unconscious", "fainted", "severe bleeding", "can't breathe", "cannot breathe"],
    ),
];

/// Case-insensitive word-bounded alternation over all keywords, longest first.
struct KeywordMatcher {
    pattern: Regex,
    lookup: HashMap<String, Specialty>,
}

impl KeywordMatcher {
    fn new(table: &[(Specialty, &[&str])]) -> Self {
        let mut lookup = HashMap::new();
        for (specialty, keywords) in table {
            for keyword in *keywords {
                lookup.entry(keyword.to_string()).or_insert(*specialty);
            }
        }

        let mut keywords: Vec<&String> = lookup.keys().collect();
        keywords.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap();

        Self { pattern, lookup }
    }

    /// Specialties in order of first mention, de-duplicated.
    fn find_all(&self, text: &str) -> Vec<Specialty> {
        let mut found = Vec::new();
        for m in self.pattern.find_iter(text) {
            if let Some(specialty) = self.lookup.get(&m.as_str().to_lowercase()) {
                if !found.contains(specialty) {
                    found.push(*specialty);
                }
            }
        }
        found
    }
}

static SPECIALTY_MATCHER: LazyLock<KeywordMatcher> =
    LazyLock::new(|| KeywordMatcher::new(SPECIALTY_KEYWORDS));

static SYMPTOM_MATCHER: LazyLock<KeywordMatcher> =
    LazyLock::new(|| KeywordMatcher::new(SYMPTOM_KEYWORDS));

/// Extract specialties from the model's specialty text.
///
/// Falls back to symptom phrases in `complaint` (or in the specialty text
/// itself when no complaint is given), then to `[Internal]`. Never empty.
pub fn extract(specialty_text: &str, complaint: Option<&str>) -> Vec<Specialty> {
    let direct = SPECIALTY_MATCHER.find_all(specialty_text);
    if !direct.is_empty() {
        return direct;
    }

    let symptom_source = complaint.unwrap_or(specialty_text);
    let from_symptoms = SYMPTOM_MATCHER.find_all(symptom_source);
    if !from_symptoms.is_empty() {
        tracing::debug!(matched = from_symptoms.len(), "Specialty inferred from symptoms");
        return from_symptoms;
    }

    vec![Specialty::Internal]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chest_pain_maps_to_cardiology_first() {
        let specialties = extract("chest pain and palpitations", None);
        assert_eq!(specialties[0], Specialty::Cardiology);
    }

    #[test]
    fn empty_text_defaults_to_internal() {
        assert_eq!(extract("", None), vec![Specialty::Internal]);
        assert_eq!(extract("", Some("")), vec![Specialty::Internal]);
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(extract("CARDIOLOGY", None), vec![Specialty::Cardiology]);
        assert_eq!(extract("Cardiologist", None), vec![Specialty::Cardiology]);
    }

    #[test]
    fn order_of_first_mention_is_preserved() {
        let specialties = extract(
            "Neurology first; if normal, Cardiology. A neurologist may refer on.",
            None,
        );
        assert_eq!(specialties, vec![Specialty::Neurology, Specialty::Cardiology]);
    }

    #[test]
    fn word_boundaries_prevent_false_hits() {
        // "patient" contains "ent", "gift" contains "gi".
        assert_eq!(
            extract("Refer the patient for a gift of care", None),
            vec![Specialty::Internal]
        );
        assert_eq!(extract("See an ENT specialist", None), vec![Specialty::Ent]);
    }

    #[test]
    fn multi_word_keywords_match() {
        assert_eq!(extract("Internal Medicine", None), vec![Specialty::Internal]);
        assert_eq!(
            extract("Ear, Nose and Throat clinic", None),
            vec![Specialty::Ent]
        );
    }

    #[test]
    fn complaint_is_used_when_specialty_text_is_unhelpful() {
        let specialties = extract("See a specialist", Some("I keep coughing at night"));
        assert_eq!(specialties, vec![Specialty::Pulmonology]);
    }

    #[test]
    fn specialty_text_wins_over_complaint() {
        let specialties = extract("Dermatology", Some("chest pain"));
        assert_eq!(specialties, vec![Specialty::Dermatology]);
    }

    #[test]
    fn every_specialty_has_keywords() {
        for specialty in Specialty::ALL {
            assert!(
                SPECIALTY_KEYWORDS.iter().any(|(s, _)| *s == specialty),
                "{specialty} missing"
            );
        }
    }
}
