//! Best-effort extraction of question batches from free-form model replies.
//!
//! Replies may be bare JSON, JSON inside markdown fences, or JSON surrounded
//! by prose. Anything that cannot be turned into at least one valid question
//! comes back as plain text; this module never returns an error.

use crate::models::question::{Difficulty, OptionLetter, Question, QuestionFormat};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    Questions(Vec<Question>),
    PlainText {
        text: String,
        malformed: Option<MalformedOutput>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedOutput {
    #[error("embedded JSON could not be parsed: {0}")]
    InvalidJson(String),

    #[error("JSON does not carry a questions list")]
    MissingQuestions,

    #[error("question batch is empty after validation")]
    EmptyQuestionBatch,
}

pub fn parse_reply(raw: &str) -> ParsedReply {
    let mut parsed = Vec::new();
    let mut first_problem: Option<MalformedOutput> = None;
    if !collect_json(raw, 0..raw.len(), &mut parsed, &mut first_problem) {
        return ParsedReply::PlainText {
            text: raw.to_string(),
            malformed: None,
        };
    }

    let mut questions = Vec::new();
    let mut schema_spans = Vec::new();

    for (span, value) in &parsed {
        match question_lists(value) {
            Some(lists) => {
                schema_spans.push(span.clone());
                for (technology, items) in lists {
                    questions.extend(coerce_questions(items, technology));
                }
            }
            None => {
                first_problem.get_or_insert(MalformedOutput::MissingQuestions);
            }
        }
    }

    if !questions.is_empty() {
        return ParsedReply::Questions(questions);
    }

    if !schema_spans.is_empty() {
        // Schema matched but nothing survived; show whatever prose surrounded it.
        return ParsedReply::PlainText {
            text: surrounding_prose(raw, &schema_spans),
            malformed: Some(MalformedOutput::EmptyQuestionBatch),
        };
    }

    ParsedReply::PlainText {
        text: raw.to_string(),
        malformed: first_problem,
    }
}

/// Parses every top-level span inside `range`. A span serde rejects is
/// searched again from just inside its brackets, so a batch wrapped in
/// bracketed prose is still found. Returns whether any span was seen.
fn collect_json(
    raw: &str,
    range: Range<usize>,
    parsed: &mut Vec<(Range<usize>, JsonValue)>,
    first_problem: &mut Option<MalformedOutput>,
) -> bool {
    let offset = range.start;
    let spans = json_spans(&raw[range]);
    for span in &spans {
        let span = (offset + span.start)..(offset + span.end);
        match serde_json::from_str::<JsonValue>(&raw[span.clone()]) {
            Ok(value) => parsed.push((span, value)),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unparseable JSON span in model reply");
                first_problem.get_or_insert(MalformedOutput::InvalidJson(e.to_string()));
                collect_json(raw, (span.start + 1)..(span.end - 1), parsed, first_problem);
            }
        }
    }
    !spans.is_empty()
}

/// Returns `(technology, questions)` pairs in document order, or `None` when
/// the value does not follow any accepted shape.
fn question_lists(value: &JsonValue) -> Option<Vec<(Option<String>, &Vec<JsonValue>)>> {
    match value {
        JsonValue::Object(map) => {
            let technology = map
                .get("technology")
                .and_then(|t| t.as_str())
                .map(|t| t.trim().to_string());
            if let Some(items) = map.get("questions").and_then(|q| q.as_array()) {
                return Some(vec![(technology, items)]);
            }
            map.get("Technology")
                .and_then(|q| q.as_array())
                .map(|items| vec![(technology, items)])
        }
        JsonValue::Array(elements) => {
            let mut lists = Vec::with_capacity(elements.len());
            for element in elements {
                let items = element.get("questions").and_then(|q| q.as_array())?;
                let technology = element
                    .get("technology")
                    .and_then(|t| t.as_str())
                    .map(|t| t.trim().to_string());
                lists.push((technology, items));
            }
            if lists.is_empty() {
                None
            } else {
                Some(lists)
            }
        }
        _ => None,
    }
}

/// Loose view of one question item; the accepted formats are decided in
/// [`RawQuestion::into_question`].
#[derive(Deserialize)]
struct RawQuestion {
    question: String,
    difficulty: Difficulty,
    #[serde(default)]
    technology: Option<String>,
    #[serde(default)]
    options: Option<Vec<String>>,
    #[serde(default)]
    correct_option: Option<OptionLetter>,
    #[serde(default)]
    answer_outline: Option<String>,
}

impl RawQuestion {
    fn into_question(self) -> Option<Question> {
        if self.question.trim().is_empty() {
            return None;
        }
        let format = match (self.options, self.correct_option) {
            (Some(options), Some(correct_option)) => {
                if options.iter().any(|o| o.trim().is_empty()) {
                    return None;
                }
                let options: [String; 4] = options.try_into().ok()?;
                QuestionFormat::MultipleChoice {
                    options,
                    correct_option,
                }
            }
            (None, None) => {
                let answer_outline = self.answer_outline.filter(|o| !o.trim().is_empty())?;
                QuestionFormat::Open { answer_outline }
            }
            _ => return None,
        };
        Some(Question {
            question: self.question,
            difficulty: self.difficulty,
            technology: self.technology,
            format,
        })
    }
}

fn coerce_questions(items: &[JsonValue], technology: Option<String>) -> Vec<Question> {
    let mut questions = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let raw = match RawQuestion::deserialize(item) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "Dropping question that does not match schema");
                continue;
            }
        };
        let Some(mut q) = raw.into_question() else {
            tracing::warn!(index = idx, "Dropping question with blank text, options or outline");
            continue;
        };
        if q.technology.is_none() {
            q.technology = technology.clone();
        }
        questions.push(q);
    }
    questions
}

/// Top-level balanced `{...}` / `[...]` spans, string and escape aware.
fn json_spans(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if matches!(bytes[i], b'{' | b'[') {
            if let Some(end) = balanced_end(bytes, i) {
                spans.push(i..end);
                i = end;
                continue;
            }
        }
        i += 1;
    }
    spans
}

fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut expected: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => expected.push(b'}'),
            b'[' => expected.push(b']'),
            b'}' | b']' => {
                if expected.pop() != Some(b) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn surrounding_prose(raw: &str, spans: &[Range<usize>]) -> String {
    let mut prose = String::with_capacity(raw.len());
    let mut cursor = 0;
    for span in spans {
        prose.push_str(&raw[cursor..span.start]);
        cursor = span.end;
    }
    prose.push_str(&raw[cursor..]);

    prose
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}
