use crate::models::question::Question;
use std::collections::VecDeque;

/// FIFO of undelivered questions plus the one currently shown to the
/// candidate. A question leaves the queue exactly once and is never requeued.
#[derive(Debug, Default, Clone)]
pub struct QuizQueue {
    pending: VecDeque<Question>,
    current: Option<Question>,
}

impl QuizQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, questions: impl IntoIterator<Item = Question>) {
        self.pending.extend(questions);
    }

    pub fn pop_next(&mut self) -> Option<Question> {
        self.pending.pop_front()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Moves the head of the queue into the current slot, discarding whatever
    /// was current before. Returns the new current question.
    pub fn advance(&mut self) -> Option<&Question> {
        self.current = self.pop_next();
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&Question> {
        self.current.as_ref()
    }

    pub fn take_current(&mut self) -> Option<Question> {
        self.current.take()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.current = None;
    }
}
