//! Turns a free-text summary completion into labelled sections.
//!
//! The model is asked for `**HEADING:**` blocks but does not always comply,
//! so several heading styles are tried in order before falling back to a
//! line scanner. Sections with the same heading are merged.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::SummarySection;

/// Section type used when the text has no recognizable heading.
pub const FALLBACK_SECTION: &str = "Medical Assessment";

/// A strategy result is accepted only if some body is longer than this.
const MIN_BODY_CHARS: usize = 10;

/// `**Heading:**`
static BOLD_COLON_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[ \t]*([\w \t\-]+?)[ \t]*:[ \t]*\*\*").unwrap());

/// `**Heading**` at line start, optional trailing colon.
static BOLD_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*\*\*[ \t]*([\w \t\-]+?)[ \t]*\*\*[ \t]*:?").unwrap()
});

/// `## Heading`
static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{2,6}[ \t]*([^\n#]+?)[ \t]*#*[ \t]*$").unwrap());

/// `Heading:` at line start, capitalized.
static PLAIN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*([A-Z][A-Za-z \t\-]{1,60}):").unwrap());

/// Line-scanner patterns: group 1 is the heading, group 2 (if any) inline content.
static LINE_HEADINGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^\*\*\s*([^*]+?)\s*:?\s*\*\*\s*:?\s*(.*)$").unwrap(),
        Regex::new(r"^#{1,6}\s*([^#]+?)\s*#*\s*$").unwrap(),
        Regex::new(r"^([A-Z][A-Za-z \t\-]{1,60}):\s*(.*)$").unwrap(),
    ]
});

/// Parse raw completion text into grouped sections in first-seen order.
///
/// Returns an empty list only for empty or whitespace-only input.
pub fn parse(raw_text: &str) -> Vec<SummarySection> {
    if raw_text.trim().is_empty() {
        return Vec::new();
    }

    let strategies: [(&str, &Regex); 4] = [
        ("bold_colon", &BOLD_COLON_HEADING),
        ("bold", &BOLD_HEADING),
        ("markdown", &MARKDOWN_HEADING),
        ("plain", &PLAIN_HEADING),
    ];

    for (name, pattern) in strategies {
        let sections = split_on_headings(raw_text, pattern);
        if has_substantial_body(&sections) {
            tracing::debug!(strategy = name, sections = sections.len(), "Summary headings matched");
            return group_sections(sections);
        }
    }

    let sections = scan_lines(raw_text);
    tracing::debug!(sections = sections.len(), "Summary parsed by line scan");
    group_sections(sections)
}

fn has_substantial_body(sections: &[(String, String)]) -> bool {
    sections
        .iter()
        .any(|(_, body)| body.chars().count() > MIN_BODY_CHARS)
}

/// Split on every heading match; each body runs to the next heading or the end.
fn split_on_headings(text: &str, pattern: &Regex) -> Vec<(String, String)> {
    let matches: Vec<(usize, usize, String)> = pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let heading = clean_heading(caps.get(1)?.as_str());
            Some((whole.start(), whole.end(), heading))
        })
        .collect();

    let mut sections = Vec::with_capacity(matches.len());
    for (i, (_, end, heading)) in matches.iter().enumerate() {
        let body_end = matches.get(i + 1).map(|m| m.0).unwrap_or(text.len());
        let body = text[*end..body_end].trim();
        if heading.is_empty() || body.is_empty() {
            continue;
        }
        sections.push((heading.clone(), body.to_string()));
    }
    sections
}

/// Line-by-line fallback. Text before the first heading is dropped; text
/// with no heading at all becomes a single `Medical Assessment` section.
fn scan_lines(text: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;
    let mut saw_heading = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if let Some((heading, inline)) = match_heading_line(trimmed) {
            saw_heading = true;
            if let Some(done) = current.take() {
                sections.push(done);
            }
            current = Some((heading, inline));
            continue;
        }

        if let Some((_, content)) = current.as_mut() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str(trimmed);
        }
    }
    if let Some(done) = current.take() {
        sections.push(done);
    }

    let sections: Vec<(String, String)> = sections
        .into_iter()
        .map(|(heading, content)| (heading, content.trim().to_string()))
        .filter(|(heading, content)| !heading.is_empty() && !content.is_empty())
        .collect();

    if sections.is_empty() {
        if saw_heading {
            tracing::debug!("Headings found but all sections were empty");
        }
        return vec![(FALLBACK_SECTION.to_string(), text.trim().to_string())];
    }
    sections
}

fn match_heading_line(line: &str) -> Option<(String, String)> {
    LINE_HEADINGS.iter().find_map(|pattern| {
        let caps = pattern.captures(line)?;
        let heading = clean_heading(caps.get(1)?.as_str());
        if heading.is_empty() {
            return None;
        }
        let inline = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        Some((heading, inline))
    })
}

fn clean_heading(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == ':')
        .trim()
        .to_string()
}

/// Merge sections sharing a trimmed heading, keeping first-seen heading order.
fn group_sections(sections: Vec<(String, String)>) -> Vec<SummarySection> {
    let mut grouped: Vec<SummarySection> = Vec::new();
    for (heading, body) in sections {
        match grouped.iter_mut().find(|s| s.section_type == heading) {
            Some(existing) => {
                existing.content.push_str("\n\n");
                existing.content.push_str(&body);
            }
            None => grouped.push(SummarySection {
                section_type: heading,
                content: body,
            }),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headings(sections: &[SummarySection]) -> Vec<&str> {
        sections.iter().map(|s| s.section_type.as_str()).collect()
    }

    #[test]
    fn well_formed_four_headings_in_order() {
        let raw = "**SUMMARY OF CASE:** Adult with two days of chest pain on exertion.\n\
                   **URGENCY LEVEL:** High - seek care within hours.\n\
                   **RECOMMENDED SPECIALTY:** Cardiology for further evaluation.\n\
                   **FIRST AID RECOMMENDATIONS:** Rest and avoid physical exertion.";
        let sections = parse(raw);
        assert_eq!(
            headings(&sections),
            vec![
                "SUMMARY OF CASE",
                "URGENCY LEVEL",
                "RECOMMENDED SPECIALTY",
                "FIRST AID RECOMMENDATIONS"
            ]
        );
        assert_eq!(sections[1].content, "High - seek care within hours.");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("   \n\t ").is_empty());
    }

    #[test]
    fn unheaded_prose_becomes_single_section() {
        let raw = "The patient describes a dull ache in the lower back that worsens \
                   after sitting for long periods. Rest helps a little.";
        let sections = parse(raw);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_type, FALLBACK_SECTION);
        assert_eq!(sections[0].content, raw);
    }

    #[test]
    fn short_bodies_fall_through_to_line_scan() {
        let raw = "**SUMMARY OF CASE:** X\n**URGENCY LEVEL:** Y\n\
                   **RECOMMENDED SPECIALTY:** cardiology\n**FIRST AID RECOMMENDATIONS:** Z";
        let sections = parse(raw);
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0].content, "X");
        assert_eq!(sections[2].content, "cardiology");
        assert_eq!(sections[3].section_type, "FIRST AID RECOMMENDATIONS");
    }

    #[test]
    fn bold_headings_without_colon() {
        let raw = "**Summary of Case**\nPersistent cough for three weeks, worse at night.\n\n\
                   **Urgency Level**\nModerate, book an appointment this week.";
        let sections = parse(raw);
        assert_eq!(headings(&sections), vec!["Summary of Case", "Urgency Level"]);
        assert!(sections[0].content.starts_with("Persistent cough"));
    }

    #[test]
    fn markdown_headings() {
        let raw = "Here is the assessment.\n\n## Summary of Case\nItchy rash on both forearms since Monday.\n\
                   ## Urgency Level ##\nLow, routine appointment is fine.";
        let sections = parse(raw);
        assert_eq!(headings(&sections), vec!["Summary of Case", "Urgency Level"]);
        assert_eq!(sections[1].content, "Low, routine appointment is fine.");
    }

    #[test]
    fn plain_text_headings() {
        let raw = "Summary: Recurring headaches behind the eyes for a month.\n\
                   Urgency: Moderate, see a doctor within a week.\n\
                   Specialty: Neurology";
        let sections = parse(raw);
        assert_eq!(headings(&sections), vec!["Summary", "Urgency", "Specialty"]);
        assert_eq!(sections[2].content, "Neurology");
    }

    #[test]
    fn repeated_headings_are_concatenated() {
        let raw = "**FIRST AID:** Apply a cold compress for 15 minutes.\n\
                   **URGENCY LEVEL:** Low priority, routine care.\n\
                   **FIRST AID:** Keep the ankle elevated above heart level.";
        let sections = parse(raw);
        assert_eq!(headings(&sections), vec!["FIRST AID", "URGENCY LEVEL"]);
        assert_eq!(
            sections[0].content,
            "Apply a cold compress for 15 minutes.\n\nKeep the ankle elevated above heart level."
        );
    }

    #[test]
    fn empty_heading_bodies_are_skipped() {
        let raw = "**ASSESSMENT:**\n**URGENCY LEVEL:** Emergency, call an ambulance now.";
        let sections = parse(raw);
        assert_eq!(headings(&sections), vec!["URGENCY LEVEL"]);
    }

    #[test]
    fn multi_line_body_is_kept_whole() {
        let raw = "**RECOMMENDED INVESTIGATIONS:**\n- ECG\n- Troponin blood test\n- Chest X-ray\n\
                   **URGENCY LEVEL:** High, same-day review.";
        let sections = parse(raw);
        assert_eq!(sections[0].content, "- ECG\n- Troponin blood test\n- Chest X-ray");
    }

    #[test]
    fn line_scan_heading_only_text_falls_back_to_raw() {
        let sections = parse("**NOTE:**");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].section_type, FALLBACK_SECTION);
        assert_eq!(sections[0].content, "**NOTE:**");
    }
}
