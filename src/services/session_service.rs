use crate::dto::session_dto::{
    AnswerResponse, CandidateProfile, EndSessionResponse, MessageOutcomeKind, MessageResponse,
    QuestionView, SessionView,
};
use crate::error::{Error, Result};
use crate::services::ai_service::ModelGateway;
use crate::services::conversation::{Conversation, MessageOutcome, ScreeningSettings};
use crate::services::prompts;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

struct SessionEntry {
    created_at: DateTime<Utc>,
    conversation: Conversation,
}

type SessionHandle = Arc<Mutex<SessionEntry>>;

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    /// Creates beyond this many live sessions are refused.
    pub max_sessions: usize,
    pub expose_diagnostics: bool,
}

/// Owns every live screening session. Each session sits behind its own async
/// mutex, so at most one request per session is in flight while different
/// sessions proceed independently.
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    gateway: Arc<dyn ModelGateway>,
    settings: Arc<ScreeningSettings>,
    policy: SessionPolicy,
}

impl SessionService {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        settings: ScreeningSettings,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            gateway,
            settings: Arc::new(settings),
            policy,
        }
    }

    pub async fn create_session(&self, profile: Option<&CandidateProfile>) -> Result<SessionView> {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            created_at: Utc::now(),
            conversation: Conversation::new(prompts::system_prompt(profile)),
        };
        let view = render(id, &entry);

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.policy.max_sessions {
            tracing::warn!(
                live = sessions.len(),
                max = self.policy.max_sessions,
                "Refusing new session, limit reached"
            );
            return Err(Error::Capacity(
                "Too many active screening sessions, please try again later".to_string(),
            ));
        }
        sessions.insert(id, Arc::new(Mutex::new(entry)));
        drop(sessions);

        tracing::info!(session_id = %id, with_profile = profile.is_some(), "Screening session created");
        Ok(view)
    }

    pub async fn get_session(&self, id: Uuid) -> Result<SessionView> {
        let handle = self.handle(id).await?;
        let entry = handle.lock().await;
        Ok(render(id, &entry))
    }

    pub async fn send_message(&self, id: Uuid, message: &str) -> Result<MessageResponse> {
        let handle = self.handle(id).await?;
        let mut entry = handle.lock().await;

        let outcome = entry
            .conversation
            .handle_message(message, self.gateway.as_ref(), &self.settings)
            .await?;
        tracing::info!(session_id = %id, outcome = ?outcome, "Message handled");

        let (kind, diagnostic) = match outcome {
            MessageOutcome::Replied => (MessageOutcomeKind::Reply, None),
            MessageOutcome::QuizStarted { .. } => (MessageOutcomeKind::QuizStarted, None),
            MessageOutcome::Fallback(reason) => {
                (MessageOutcomeKind::Fallback, Some(reason.to_string()))
            }
            MessageOutcome::UpstreamFailure(reason) => {
                (MessageOutcomeKind::UpstreamError, Some(reason))
            }
            MessageOutcome::Closed => (MessageOutcomeKind::Closed, None),
        };

        let view = render(id, &entry);
        if entry.conversation.is_closed() {
            drop(entry);
            self.sessions.write().await.remove(&id);
            tracing::info!(session_id = %id, "Screening session closed and removed");
        }

        Ok(MessageResponse {
            outcome: kind,
            diagnostic: diagnostic.filter(|_| self.policy.expose_diagnostics),
            session: view,
        })
    }

    pub async fn submit_answer(&self, id: Uuid, selection: &str) -> Result<AnswerResponse> {
        let handle = self.handle(id).await?;
        let mut entry = handle.lock().await;

        let outcome = entry.conversation.handle_answer(selection, &self.settings)?;
        Ok(AnswerResponse {
            feedback: outcome.feedback,
            round_complete: outcome.round_complete,
            session: render(id, &entry),
        })
    }

    pub async fn end_session(&self, id: Uuid) -> Result<EndSessionResponse> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))?;

        // Wait for any in-flight request on this session to finish.
        let entry = handle.lock().await;
        tracing::info!(session_id = %id, "Screening session ended by client");
        Ok(EndSessionResponse {
            id,
            score: entry.conversation.score(),
            open_responses: entry.conversation.open_responses().to_vec(),
            transcript: entry.conversation.transcript().to_vec(),
        })
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn handle(&self, id: Uuid) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))
    }
}

fn render(id: Uuid, entry: &SessionEntry) -> SessionView {
    let conversation = &entry.conversation;
    SessionView {
        id,
        phase: conversation.phase(),
        closed: conversation.is_closed(),
        created_at: entry.created_at,
        transcript: conversation.transcript().to_vec(),
        current_question: conversation.current_question().map(QuestionView::from),
        pending_questions: conversation.pending_questions(),
        score: conversation.score(),
    }
}
