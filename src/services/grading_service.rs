use crate::models::question::{OptionLetter, Question, QuestionFormat};
use serde::Serialize;

/// `is_correct` and the letters are `None` for open questions, which are
/// recorded rather than scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub is_correct: Option<bool>,
    pub selected_option: Option<OptionLetter>,
    pub correct_option: Option<OptionLetter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer_outline: Option<String>,
    pub message: String,
}

pub struct GradingService;

impl GradingService {
    /// Resolves what the candidate picked. Accepts a bare uppercase letter,
    /// the bare label `"B)"`, or the exact text of one of the options.
    pub fn resolve_selection(question: &Question, selection: &str) -> Option<OptionLetter> {
        if question.is_open() {
            return None;
        }
        let selection = selection.trim();
        if let Some(letter) = OptionLetter::from_label(selection) {
            return Some(letter);
        }
        if let Some(letter) = selection
            .strip_suffix(')')
            .and_then(|label| OptionLetter::from_label(label.trim()))
        {
            return Some(letter);
        }

        question
            .options()
            .iter()
            .position(|o| o.trim() == selection)
            .and_then(OptionLetter::from_index)
    }

    /// Grades a response against the question. `None` means the response is
    /// not a usable answer: no option matched, or the open answer is blank.
    pub fn evaluate(question: &Question, response: &str) -> Option<AnswerFeedback> {
        match &question.format {
            QuestionFormat::MultipleChoice { .. } => {
                let selected = Self::resolve_selection(question, response)?;
                Some(Self::grade(question, selected))
            }
            QuestionFormat::Open { answer_outline } => {
                if response.trim().is_empty() {
                    return None;
                }
                Some(AnswerFeedback {
                    is_correct: None,
                    selected_option: None,
                    correct_option: None,
                    answer_outline: Some(answer_outline.clone()),
                    message: format!(
                        "📝 Thanks, your answer has been recorded. Key points we were looking for: {}",
                        answer_outline
                    ),
                })
            }
        }
    }

    pub fn grade(question: &Question, selected: OptionLetter) -> AnswerFeedback {
        let correct = question.correct_option();
        let is_correct = correct == Some(selected);
        let message = match (is_correct, correct.and_then(|c| question.option(c))) {
            (true, _) => "✅ Correct!".to_string(),
            (false, Some(answer)) => format!("❌ Incorrect. The correct answer was {}", answer),
            (false, None) => "❌ Incorrect.".to_string(),
        };

        AnswerFeedback {
            is_correct: Some(is_correct),
            selected_option: Some(selected),
            correct_option: correct,
            answer_outline: None,
            message,
        }
    }
}
