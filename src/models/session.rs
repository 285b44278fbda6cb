use serde::{Deserialize, Serialize};

/// Which kind of input the session accepts next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    AwaitingInput,
    AwaitingAnswer,
}

/// `answered`/`correct` count multiple-choice questions only; open answers
/// are not auto-scored and are counted separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scorecard {
    pub answered: u32,
    pub correct: u32,
    #[serde(default)]
    pub open_answered: u32,
}

impl Scorecard {
    pub fn record(&mut self, is_correct: bool) {
        self.answered += 1;
        if is_correct {
            self.correct += 1;
        }
    }

    pub fn record_open(&mut self) {
        self.open_answered += 1;
    }
}

/// A free-text answer kept for the recruiter next to the expected outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenResponse {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    pub answer: String,
    pub answer_outline: String,
}
