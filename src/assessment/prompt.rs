//! Prompt construction for follow-up generation and the final summary.
//!
//! Both prompts are pure functions of the complaint and the recorded
//! answers, so re-sending after a failure produces the same request.

use super::follow_up::ENOUGH_INFO_SENTINEL;
use super::state::RecordedAnswer;

/// Headings requested from the summary completion, in display order.
pub const SUMMARY_HEADINGS: &[&str] = &[
    "SUMMARY OF CASE",
    "URGENCY LEVEL",
    "RECOMMENDED SPECIALTY",
    "FIRST AID RECOMMENDATIONS",
    "RECOMMENDED INVESTIGATIONS",
];

fn push_answers(prompt: &mut String, answers: &[RecordedAnswer]) {
    if answers.is_empty() {
        prompt.push_str("(no answers yet)\n");
        return;
    }
    for answer in answers {
        prompt.push_str(&format!("{}: {}\n", answer.question, answer.answer));
    }
}

/// Ask for one new follow-up question, or the sentinel when done.
pub fn build_follow_up_prompt(
    complaint: &str,
    answers: &[RecordedAnswer],
    asked_questions: &[String],
) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!("Patient's main complaint: {complaint}\n\n"));

    prompt.push_str("Information collected so far:\n");
    push_answers(&mut prompt, answers);
    prompt.push('\n');

    if !asked_questions.is_empty() {
        prompt.push_str("Questions already asked (DO NOT repeat or rephrase any of these):\n");
        for question in asked_questions {
            prompt.push_str(&format!("- {question}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Ask ONE new, short follow-up question that would most help assess this complaint.\n\
         Format your reply exactly as:\n\
         Question: <the question>\n\
         1. <option>\n\
         2. <option>\n\
         3. <option>\n\
         4. <option>\n\
         Give between 2 and 4 mutually exclusive options.\n",
    );
    prompt.push_str(&format!(
        "If you already have enough information for an assessment, reply with only {ENOUGH_INFO_SENTINEL}."
    ));

    prompt
}

/// Ask for the structured case summary.
pub fn build_summary_prompt(complaint: &str, answers: &[RecordedAnswer]) -> String {
    let mut prompt = String::new();

    prompt.push_str("Patient details\n");
    prompt.push_str(&format!("Main complaint: {complaint}\n"));
    push_answers(&mut prompt, answers);
    prompt.push('\n');

    prompt.push_str(
        "Write a preliminary assessment for a clinician. Use exactly these headings, \
         each in bold followed by a colon, in this order:\n",
    );
    for heading in SUMMARY_HEADINGS {
        prompt.push_str(&format!("**{heading}:**\n"));
    }
    prompt.push_str(
        "\nUnder RECOMMENDED SPECIALTY name one or two medical specialties only.\n\
         Under URGENCY LEVEL state Low, Moderate, High or Emergency with one sentence of reasoning.\n\
         Do not give a definitive diagnosis.",
    );

    prompt
}

/// True if the reply contains a provider error phrase (case-insensitive).
pub fn contains_error_marker(text: &str, markers: &[String]) -> bool {
    let lower = text.to_lowercase();
    markers
        .iter()
        .any(|marker| !marker.is_empty() && lower.contains(&marker.to_lowercase()))
}
