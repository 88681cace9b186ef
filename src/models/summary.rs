use serde::{Deserialize, Serialize};

use super::enums::Specialty;

/// One labelled block of the case summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySection {
    /// Heading text as written by the model, trimmed.
    #[serde(rename = "type")]
    pub section_type: String,
    pub content: String,
}

impl SummarySection {
    pub fn new(section_type: &str, content: &str) -> Self {
        Self {
            section_type: section_type.to_string(),
            content: content.to_string(),
        }
    }

    /// Heading mentions "specialty" (case-insensitive).
    pub fn is_specialty(&self) -> bool {
        self.section_type.to_lowercase().contains("specialty")
    }
}

/// Final product of an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    /// Display sections in source order, specialty section removed.
    pub sections: Vec<SummarySection>,
    /// Never empty; `[Internal]` when nothing matched.
    pub specialties: Vec<Specialty>,
    /// Unmodified completion text.
    pub raw_text: String,
}

impl AssessmentOutcome {
    pub fn primary_specialty(&self) -> Specialty {
        self.specialties.first().copied().unwrap_or(Specialty::Internal)
    }

    /// First section whose heading contains `needle` (case-insensitive).
    pub fn section(&self, needle: &str) -> Option<&SummarySection> {
        let needle = needle.to_lowercase();
        self.sections
            .iter()
            .find(|s| s.section_type.to_lowercase().contains(&needle))
    }
}
