//! Per-candidate conversation: transcript, quiz queue, scorecard and the
//! phase that gates which input is accepted next.

use crate::error::{Error, Result, UpstreamError};
use crate::models::question::Question;
use crate::models::session::{OpenResponse, Scorecard, SessionPhase};
use crate::models::turn::Turn;
use crate::services::ai_service::ModelGateway;
use crate::services::grading_service::{AnswerFeedback, GradingService};
use crate::services::prompts;
use crate::services::quiz_queue::QuizQueue;
use crate::services::response_parser::{self, MalformedOutput, ParsedReply};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScreeningSettings {
    pub exit_keywords: Vec<String>,
    pub record_feedback: bool,
    pub model_timeout: Duration,
}

impl ScreeningSettings {
    pub fn is_exit_keyword(&self, text: &str) -> bool {
        let normalized = text.trim().to_lowercase();
        self.exit_keywords
            .iter()
            .any(|k| k.trim().to_lowercase() == normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    Replied,
    QuizStarted { question_count: usize },
    Fallback(MalformedOutput),
    UpstreamFailure(String),
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub feedback: AnswerFeedback,
    pub round_complete: bool,
}

#[derive(Debug)]
pub struct Conversation {
    system_prompt: String,
    transcript: Vec<Turn>,
    queue: QuizQueue,
    score: Scorecard,
    open_responses: Vec<OpenResponse>,
    closed: bool,
}

impl Conversation {
    pub fn new(system_prompt: String) -> Self {
        Self {
            system_prompt,
            transcript: vec![Turn::model(prompts::GREETING)],
            queue: QuizQueue::new(),
            score: Scorecard::default(),
            open_responses: Vec::new(),
            closed: false,
        }
    }

    /// Derived from the current-question slot, so `AwaitingAnswer` always
    /// has a question and `AwaitingInput` never does.
    pub fn phase(&self) -> SessionPhase {
        if self.queue.current().is_some() {
            SessionPhase::AwaitingAnswer
        } else {
            SessionPhase::AwaitingInput
        }
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.queue.current()
    }

    pub fn pending_questions(&self) -> usize {
        self.queue.pending_len()
    }

    pub fn score(&self) -> Scorecard {
        self.score
    }

    pub fn open_responses(&self) -> &[OpenResponse] {
        &self.open_responses
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn handle_message(
        &mut self,
        text: &str,
        gateway: &dyn ModelGateway,
        settings: &ScreeningSettings,
    ) -> Result<MessageOutcome> {
        self.ensure_open()?;
        if self.phase() == SessionPhase::AwaitingAnswer {
            return Err(Error::Conflict(
                "A question is waiting for an answer".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(Error::BadRequest("Message must not be empty".to_string()));
        }

        if settings.is_exit_keyword(text) {
            self.transcript.push(Turn::user(text));
            self.transcript
                .push(Turn::model(prompts::closing_message(&self.score)));
            self.queue.clear();
            self.closed = true;
            tracing::info!(answered = self.score.answered, "Candidate ended the session");
            return Ok(MessageOutcome::Closed);
        }

        // Nothing is committed until the reply is in, so a dropped request
        // leaves the transcript as it was.
        let mut outgoing = self.transcript.clone();
        outgoing.push(Turn::user(text));

        let reply = match tokio::time::timeout(
            settings.model_timeout,
            gateway.generate(&self.system_prompt, &outgoing),
        )
        .await
        {
            Ok(reply) => reply,
            Err(_) => Err(UpstreamError::Timeout(settings.model_timeout)),
        };
        self.transcript = outgoing;

        let raw = match reply {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, "Model call failed");
                self.transcript.push(Turn::model(prompts::UPSTREAM_APOLOGY));
                return Ok(MessageOutcome::UpstreamFailure(e.to_string()));
            }
        };

        match response_parser::parse_reply(&raw) {
            ParsedReply::Questions(questions) => {
                let question_count = questions.len();
                self.queue.enqueue(questions);
                self.queue.advance();
                tracing::info!(question_count, "Quiz round started");
                Ok(MessageOutcome::QuizStarted { question_count })
            }
            ParsedReply::PlainText { text, malformed } => {
                let text = if text.trim().is_empty() {
                    prompts::FALLBACK_RESPONSE.to_string()
                } else {
                    text
                };
                self.transcript.push(Turn::model(text));
                match malformed {
                    Some(reason) => {
                        tracing::warn!(reason = %reason, "Model output downgraded to plain text");
                        Ok(MessageOutcome::Fallback(reason))
                    }
                    None => Ok(MessageOutcome::Replied),
                }
            }
        }
    }

    pub fn handle_answer(
        &mut self,
        selection: &str,
        settings: &ScreeningSettings,
    ) -> Result<AnswerOutcome> {
        self.ensure_open()?;
        let Some(question) = self.queue.current() else {
            return Err(Error::Conflict(
                "No question is waiting for an answer".to_string(),
            ));
        };

        let feedback = GradingService::evaluate(question, selection).ok_or_else(|| {
            let hint = if question.is_open() {
                prompts::EMPTY_OPEN_ANSWER
            } else {
                prompts::INVALID_SELECTION
            };
            Error::InvalidAnswerSelection(hint.to_string())
        })?;

        let answer = match feedback.selected_option {
            Some(letter) => letter.to_string(),
            None => selection.trim().to_string(),
        };
        match (feedback.is_correct, &feedback.answer_outline) {
            (Some(is_correct), _) => self.score.record(is_correct),
            (None, outline) => {
                self.score.record_open();
                self.open_responses.push(OpenResponse {
                    question: question.question.clone(),
                    technology: question.technology.clone(),
                    answer: answer.clone(),
                    answer_outline: outline.clone().unwrap_or_default(),
                });
            }
        }
        if settings.record_feedback {
            let note = format!(
                "{}\nYour answer: {}. {}",
                question.question, answer, feedback.message
            );
            self.transcript.push(Turn::model(note));
        }

        let round_complete = if self.queue.has_pending() {
            self.queue.advance();
            false
        } else {
            self.queue.take_current();
            self.transcript.push(Turn::model(prompts::ROUND_COMPLETE));
            true
        };

        tracing::info!(
            correct = ?feedback.is_correct,
            round_complete,
            remaining = self.queue.pending_len(),
            "Answer graded"
        );
        Ok(AnswerOutcome {
            feedback,
            round_complete,
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Conflict("This session has ended".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::OptionLetter;
    use crate::models::turn::Role;
    use crate::services::ai_service::MockModelGateway;
    use async_trait::async_trait;

    const TWO_QUESTIONS: &str = r#"```json
[{"technology": "Python", "questions": [
  {"question": "Which keyword defines a function?", "options": ["A) function", "B) def", "C) func", "D) lambda"], "correct_option": "B", "difficulty": "beginner"},
  {"question": "Which type is immutable?", "options": ["A) list", "B) dict", "C) tuple", "D) set"], "correct_option": "C", "difficulty": "beginner"}
]}]
```"#;

    const OPEN_THEN_CHOICE: &str = r#"{"technology": "Rust", "questions": [
  {"question": "Explain ownership in Rust", "answer_outline": "single owner, moves, borrows", "difficulty": "intermediate"},
  {"question": "Which macro builds a Vec?", "options": ["A) vec!", "B) arr!", "C) list!", "D) new!"], "correct_option": "A", "difficulty": "beginner"}
]}"#;

    fn settings() -> ScreeningSettings {
        ScreeningSettings {
            exit_keywords: crate::config::DEFAULT_EXIT_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            record_feedback: false,
            model_timeout: Duration::from_secs(5),
        }
    }

    fn conversation() -> Conversation {
        Conversation::new("system".to_string())
    }

    fn replying(reply: &'static str) -> MockModelGateway {
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_generate()
            .returning(move |_, _| Ok(reply.to_string()));
        gateway
    }

    fn assert_phase_invariant(conv: &Conversation) {
        match conv.phase() {
            SessionPhase::AwaitingAnswer => assert!(conv.current_question().is_some()),
            SessionPhase::AwaitingInput => assert!(conv.current_question().is_none()),
        }
    }

    struct SlowGateway;

    #[async_trait]
    impl ModelGateway for SlowGateway {
        async fn generate(
            &self,
            _system_prompt: &str,
            _transcript: &[Turn],
        ) -> std::result::Result<String, UpstreamError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn plain_reply_is_appended_and_phase_stays() {
        let mut conv = conversation();
        let mut gateway = MockModelGateway::new();
        gateway
            .expect_generate()
            .withf(|prompt: &str, transcript: &[Turn]| {
                prompt == "system"
                    && transcript.len() == 2
                    && transcript[1] == Turn::user("Alice Smith")
            })
            .times(1)
            .returning(|_, _| Ok("Nice to meet you, Alice! What's your email?".to_string()));

        let outcome = conv
            .handle_message("Alice Smith", &gateway, &settings())
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Replied);
        assert_eq!(conv.phase(), SessionPhase::AwaitingInput);
        assert_eq!(conv.transcript().len(), 3);
        assert_eq!(conv.transcript()[2].role, Role::Model);
        assert_phase_invariant(&conv);
    }

    #[tokio::test]
    async fn question_batch_starts_quiz() {
        let mut conv = conversation();
        let outcome = conv
            .handle_message("Python", &replying(TWO_QUESTIONS), &settings())
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::QuizStarted { question_count: 2 });
        assert_eq!(conv.phase(), SessionPhase::AwaitingAnswer);
        assert_eq!(
            conv.current_question().unwrap().question,
            "Which keyword defines a function?"
        );
        assert_eq!(conv.pending_questions(), 1);
        // the JSON reply itself is not part of the transcript
        assert_eq!(conv.transcript().last().unwrap(), &Turn::user("Python"));
        assert_phase_invariant(&conv);
    }

    #[tokio::test]
    async fn round_completes_after_last_answer() {
        let mut conv = conversation();
        conv.handle_message("Python", &replying(TWO_QUESTIONS), &settings())
            .await
            .unwrap();
        let before = conv.transcript().len();

        let first = conv.handle_answer("B", &settings()).unwrap();
        assert_eq!(first.feedback.is_correct, Some(true));
        assert!(!first.round_complete);
        assert_eq!(conv.phase(), SessionPhase::AwaitingAnswer);
        assert_eq!(conv.transcript().len(), before);

        let second = conv.handle_answer("A) list", &settings()).unwrap();
        assert_eq!(second.feedback.is_correct, Some(false));
        assert_eq!(second.feedback.correct_option, Some(OptionLetter::C));
        assert!(second.round_complete);
        assert_eq!(conv.phase(), SessionPhase::AwaitingInput);
        assert_phase_invariant(&conv);

        let completions = conv
            .transcript()
            .iter()
            .filter(|t| t.content == prompts::ROUND_COMPLETE)
            .count();
        assert_eq!(completions, 1);
        assert_eq!(conv.transcript().len(), before + 1);
        assert_eq!(
            conv.score(),
            Scorecard {
                answered: 2,
                correct: 1,
                open_answered: 0
            }
        );
    }

    #[tokio::test]
    async fn open_answers_are_recorded_but_not_scored() {
        let mut conv = conversation();
        let mut settings = settings();
        settings.record_feedback = true;
        conv.handle_message("Rust", &replying(OPEN_THEN_CHOICE), &settings)
            .await
            .unwrap();
        assert!(conv.current_question().unwrap().is_open());

        let err = conv.handle_answer("  ", &settings).unwrap_err();
        assert!(matches!(err, Error::InvalidAnswerSelection(_)));

        let open = conv
            .handle_answer("Values have one owner; moving transfers it", &settings)
            .unwrap();
        assert_eq!(open.feedback.is_correct, None);
        assert!(!open.round_complete);
        assert!(conv
            .transcript()
            .last()
            .unwrap()
            .content
            .contains("Your answer: Values have one owner"));
        assert_eq!(
            conv.open_responses(),
            &[OpenResponse {
                question: "Explain ownership in Rust".to_string(),
                technology: Some("Rust".to_string()),
                answer: "Values have one owner; moving transfers it".to_string(),
                answer_outline: "single owner, moves, borrows".to_string(),
            }]
        );

        let choice = conv.handle_answer("A", &settings).unwrap();
        assert_eq!(choice.feedback.is_correct, Some(true));
        assert!(choice.round_complete);
        assert_eq!(
            conv.score(),
            Scorecard {
                answered: 1,
                correct: 1,
                open_answered: 1
            }
        );
    }

    #[tokio::test]
    async fn feedback_is_recorded_when_enabled() {
        let mut conv = conversation();
        let mut settings = settings();
        settings.record_feedback = true;
        conv.handle_message("Python", &replying(TWO_QUESTIONS), &settings)
            .await
            .unwrap();
        let before = conv.transcript().len();

        conv.handle_answer("B", &settings).unwrap();
        assert_eq!(conv.transcript().len(), before + 1);
        assert!(conv.transcript()[before].content.contains("Your answer: B"));
    }

    #[tokio::test]
    async fn exit_keyword_closes_without_model_call() {
        let mut conv = conversation();
        let mut gateway = MockModelGateway::new();
        gateway.expect_generate().never();

        let outcome = conv
            .handle_message("  Thank You ", &gateway, &settings())
            .await
            .unwrap();

        assert_eq!(outcome, MessageOutcome::Closed);
        assert!(conv.is_closed());
        assert_eq!(conv.transcript().last().unwrap().role, Role::Model);

        let err = conv
            .handle_message("hello again", &gateway, &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn upstream_failure_becomes_apology() {
        let mut conv = conversation();
        let mut gateway = MockModelGateway::new();
        gateway.expect_generate().returning(|_, _| {
            Err(UpstreamError::EmptyReply("SAFETY".to_string()))
        });

        let outcome = conv
            .handle_message("Hi", &gateway, &settings())
            .await
            .unwrap();

        assert!(matches!(outcome, MessageOutcome::UpstreamFailure(_)));
        assert_eq!(
            conv.transcript().last().unwrap(),
            &Turn::model(prompts::UPSTREAM_APOLOGY)
        );
        assert_eq!(conv.phase(), SessionPhase::AwaitingInput);
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let mut conv = conversation();
        let mut settings = settings();
        settings.model_timeout = Duration::from_millis(20);

        let outcome = conv
            .handle_message("Hi", &SlowGateway, &settings)
            .await
            .unwrap();

        assert!(matches!(outcome, MessageOutcome::UpstreamFailure(_)));
        assert_eq!(conv.transcript().len(), 3);
    }

    #[tokio::test]
    async fn dropped_request_leaves_transcript_untouched() {
        let mut conv = conversation();
        let settings = settings();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            conv.handle_message("Hi", &SlowGateway, &settings),
        )
        .await;

        assert!(cancelled.is_err());
        assert_eq!(conv.transcript().len(), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_shown_as_text() {
        let mut conv = conversation();
        let outcome = conv
            .handle_message("Rust", &replying("```json\n{oops}\n```"), &settings())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            MessageOutcome::Fallback(MalformedOutput::InvalidJson(_))
        ));
        assert_eq!(conv.transcript().last().unwrap().content, "```json\n{oops}\n```");
    }

    #[tokio::test]
    async fn empty_batch_without_prose_uses_fallback_text() {
        let mut conv = conversation();
        let outcome = conv
            .handle_message("Rust", &replying(r#"{"questions": []}"#), &settings())
            .await
            .unwrap();

        assert_eq!(
            outcome,
            MessageOutcome::Fallback(MalformedOutput::EmptyQuestionBatch)
        );
        assert_eq!(
            conv.transcript().last().unwrap(),
            &Turn::model(prompts::FALLBACK_RESPONSE)
        );
    }

    #[tokio::test]
    async fn invalid_selection_leaves_state_alone() {
        let mut conv = conversation();
        conv.handle_message("Python", &replying(TWO_QUESTIONS), &settings())
            .await
            .unwrap();

        let err = conv.handle_answer("Z", &settings()).unwrap_err();
        assert!(matches!(err, Error::InvalidAnswerSelection(_)));
        assert_eq!(conv.pending_questions(), 1);
        assert_eq!(conv.score().answered, 0);
        assert_eq!(conv.phase(), SessionPhase::AwaitingAnswer);
    }

    #[tokio::test]
    async fn inputs_for_the_wrong_phase_conflict() {
        let mut conv = conversation();
        assert!(matches!(
            conv.handle_answer("A", &settings()),
            Err(Error::Conflict(_))
        ));

        conv.handle_message("Python", &replying(TWO_QUESTIONS), &settings())
            .await
            .unwrap();
        let mut gateway = MockModelGateway::new();
        gateway.expect_generate().never();
        let err = conv
            .handle_message("quit", &gateway, &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
