//! Parsing of generated follow-up questions and the canned fallbacks used
//! when the completion call itself fails.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::AssessmentConfig;
use crate::models::Question;

/// Reply meaning "no further questions needed". Matched case-insensitively.
pub const ENOUGH_INFO_SENTINEL: &str = "ENOUGH_INFO";

/// Options offered when the model returns fewer than the minimum.
pub const GENERIC_OPTIONS: &[&str] = &["Yes", "No", "Sometimes", "Not sure"];

static QUESTION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\*\*)?\s*question\s*(?:\d+)?\s*:\s*(?:\*\*)?\s*(.+)$").unwrap());

static NUMBERED_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?\d{1,2}[.)]\s*(.+)$").unwrap());

static LETTERED_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(?[A-Za-z][).]\s+(.+)$").unwrap());

static BULLET_OPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-*•]\s+(.+)$").unwrap());

static OPTIONS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:\*\*)?\s*(?:answer\s+)?options?\s*:?\s*(?:\*\*)?$").unwrap());

/// True when the reply carries the no-more-questions sentinel.
pub fn is_enough_info(response: &str) -> bool {
    response.to_uppercase().contains(ENOUGH_INFO_SENTINEL)
}

/// Extract one question and its options from a generated reply.
///
/// Returns `None` when no question line can be found. Replies with fewer
/// than `min_options` options get the generic option set.
pub fn parse_follow_up(response: &str, config: &AssessmentConfig) -> Option<Question> {
    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let (question, mut options) = parse_labelled(&lines).or_else(|| parse_loose(&lines))?;

    options.truncate(config.max_options);
    let question = truncate_question(&question, config.max_question_len);
    if question.is_empty() {
        return None;
    }

    let built = Question::from_labels(&question, &options);
    if built.options.len() < config.min_options {
        tracing::debug!(parsed = built.options.len(), "Too few options parsed, using generic set");
        return Some(Question::from_labels(&question, GENERIC_OPTIONS));
    }
    Some(built)
}

/// Primary layout: `Question:` line followed by its options.
fn parse_labelled(lines: &[&str]) -> Option<(String, Vec<String>)> {
    let (index, question) = lines.iter().enumerate().find_map(|(i, line)| {
        QUESTION_PREFIX
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| (i, clean_text(m.as_str())))
    })?;

    let options = lines[index + 1..]
        .iter()
        .filter_map(|line| option_text(line))
        .collect();
    Some((question, options))
}

/// Fallback layout: first non-option line is the question; numbered,
/// lettered and bulleted lines are options.
fn parse_loose(lines: &[&str]) -> Option<(String, Vec<String>)> {
    let mut question: Option<String> = None;
    let mut options = Vec::new();

    for line in lines {
        if let Some(option) = option_text(line) {
            if question.is_some() {
                options.push(option);
            }
            continue;
        }
        if OPTIONS_LABEL.is_match(line) {
            continue;
        }
        if question.is_none() {
            let text = clean_text(line);
            if !text.is_empty() {
                question = Some(text);
            }
        }
    }

    question.map(|q| (q, options))
}

fn option_text(line: &str) -> Option<String> {
    capture_text(&NUMBERED_OPTION, line)
        .or_else(|| capture_text(&LETTERED_OPTION, line))
        .or_else(|| capture_text(&BULLET_OPTION, line))
}

fn capture_text(pattern: &Regex, line: &str) -> Option<String> {
    let text = clean_text(pattern.captures(line)?.get(1)?.as_str());
    (!text.is_empty()).then_some(text)
}

/// Strip markdown emphasis and surrounding quotes.
fn clean_text(raw: &str) -> String {
    raw.replace("**", "")
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_string()
}

/// Cut text longer than `max_chars` at the last space before the limit
/// (hard cut if there is none) and append `...`.
pub fn truncate_question(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }

    let cut = trimmed
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let head = &trimmed[..cut];
    let head = match head.rfind(' ') {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    format!("{}...", head.trim_end())
}

// ═══════════════════════════════════════════════════════════
// Canned fallbacks
// ═══════════════════════════════════════════════════════════

/// Questions to try, in order, when follow-up generation fails.
///
/// Keyword-specific questions come first, then "other symptoms" once
/// `answers_collected >= 4`, and a generic clarification last.
pub fn fallback_candidates(complaint: &str, answers_collected: usize) -> Vec<Question> {
    let lower = complaint.to_lowercase();
    let mut candidates = Vec::new();

    if lower.contains("pain") {
        candidates.push(Question::from_labels(
            "Where exactly is the pain located?",
            &["Head or neck", "Chest", "Abdomen", "Back", "Arms or legs"],
        ));
    }
    if lower.contains("fever") {
        candidates.push(Question::from_labels(
            "What is the highest temperature you have measured?",
            &[
                "Below 38°C (100.4°F)",
                "38-39°C (100.4-102.2°F)",
                "Above 39°C (102.2°F)",
                "I have not measured it",
            ],
        ));
    }
    if lower.contains("cough") {
        candidates.push(Question::from_labels(
            "Is your cough dry or does it bring up mucus?",
            &[
                "Dry cough",
                "Clear or white mucus",
                "Yellow or green mucus",
                "Mucus with blood",
            ],
        ));
    }
    if answers_collected >= 4 {
        candidates.push(Question::from_labels(
            "Are you experiencing any other symptoms?",
            &[
                "No other symptoms",
                "Fever or chills",
                "Nausea or vomiting",
                "Fatigue or weakness",
            ],
        ));
    }
    candidates.push(Question::from_labels(
        "Could you tell us a bit more about how your symptoms feel?",
        &[
            "Constant",
            "Comes and goes",
            "Getting worse",
            "Getting better",
        ],
    ));
    candidates
}
