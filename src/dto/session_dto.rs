use crate::models::question::{Difficulty, Question};
use crate::models::session::{OpenResponse, Scorecard, SessionPhase};
use crate::models::turn::Turn;
use crate::services::grading_service::AnswerFeedback;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CandidateProfile {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 3, max = 40))]
    pub phone: Option<String>,
    #[validate(range(min = 0, max = 60))]
    pub years_of_experience: Option<u32>,
    #[serde(default)]
    pub desired_positions: Vec<String>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    #[serde(default)]
    #[validate(length(max = 30))]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(nested)]
    pub candidate: Option<CandidateProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitAnswerRequest {
    /// An option for multiple-choice questions, free text for open ones.
    #[serde(alias = "answer")]
    #[validate(length(min = 1, max = 4000))]
    pub selection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    Open,
}

/// A question as shown to the candidate. Carries neither the correct option
/// nor the answer outline; `options` is empty for open questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub question: String,
    pub kind: QuestionKind,
    pub options: Vec<String>,
    pub difficulty: Difficulty,
    pub technology: Option<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            question: q.question.clone(),
            kind: if q.is_open() {
                QuestionKind::Open
            } else {
                QuestionKind::MultipleChoice
            },
            options: q.options().to_vec(),
            difficulty: q.difficulty,
            technology: q.technology.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub id: uuid::Uuid,
    pub phase: SessionPhase,
    pub closed: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub transcript: Vec<Turn>,
    pub current_question: Option<QuestionView>,
    pub pending_questions: usize,
    pub score: Scorecard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcomeKind {
    Reply,
    QuizStarted,
    Fallback,
    UpstreamError,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub outcome: MessageOutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub feedback: AnswerFeedback,
    pub round_complete: bool,
    pub session: SessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndSessionResponse {
    pub id: uuid::Uuid,
    pub score: Scorecard,
    pub open_responses: Vec<OpenResponse>,
    pub transcript: Vec<Turn>,
}
