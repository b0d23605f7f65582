//! Per-session conversation history
//!
//! Bounded to the most recent `limit` messages. The system instruction lives
//! outside the ledger and is never counted against the bound.

use crate::llm::{ChatMessage, MessageRole};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Ledger {
    messages: VecDeque<ChatMessage>,
    limit: usize,
}

impl Ledger {
    pub fn new(limit: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(limit.saturating_add(1)),
            limit: limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push_back(ChatMessage::user(text));
    }

    /// Empty replies are not recorded.
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        self.messages.push_back(ChatMessage::assistant(text));
    }

    /// Drop the oldest messages until the bound holds. Returns what was dropped, oldest first.
    pub fn trim(&mut self) -> Vec<ChatMessage> {
        let mut dropped = Vec::new();
        while self.messages.len() > self.limit {
            if let Some(oldest) = self.messages.pop_front() {
                dropped.push(oldest);
            }
        }
        dropped
    }

    /// Remove the newest message if it is a user message. Returns whether anything was removed.
    pub fn rollback_last_user(&mut self) -> bool {
        match self.messages.back() {
            Some(last) if last.role == MessageRole::User => {
                self.messages.pop_back();
                true
            }
            _ => false,
        }
    }

    /// Put messages removed by [`Ledger::trim`] back at the front.
    pub fn restore_front(&mut self, dropped: Vec<ChatMessage>) {
        for message in dropped.into_iter().rev() {
            self.messages.push_front(message);
        }
    }

    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_snapshot_order() {
        let mut ledger = Ledger::new(10);
        ledger.append_user("q1");
        ledger.append_assistant("a1");
        ledger.append_user("q2");

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0], ChatMessage::user("q1"));
        assert_eq!(snapshot[1], ChatMessage::assistant("a1"));
        assert_eq!(snapshot[2], ChatMessage::user("q2"));
    }

    #[test]
    fn test_empty_assistant_is_ignored() {
        let mut ledger = Ledger::new(4);
        ledger.append_assistant("");
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_trim_drops_oldest_first() {
        let mut ledger = Ledger::new(2);
        ledger.append_user("q1");
        ledger.append_assistant("a1");
        ledger.append_user("q2");

        let dropped = ledger.trim();
        assert_eq!(dropped, vec![ChatMessage::user("q1")]);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.snapshot()[0], ChatMessage::assistant("a1"));
    }

    #[test]
    fn test_bound_holds_over_many_turns() {
        let mut ledger = Ledger::new(5);
        for turn in 0..50 {
            ledger.append_user(format!("q{}", turn));
            ledger.trim();
            ledger.append_assistant(format!("a{}", turn));
            ledger.trim();
            assert!(ledger.len() <= 5);
        }
        assert_eq!(ledger.snapshot().last(), Some(&ChatMessage::assistant("a49")));
    }

    #[test]
    fn test_rollback_is_idempotent() {
        let mut ledger = Ledger::new(10);
        ledger.append_user("q1");
        ledger.append_assistant("a1");
        ledger.append_user("q2");

        assert!(ledger.rollback_last_user());
        let once = ledger.snapshot();
        assert!(!ledger.rollback_last_user());
        assert_eq!(ledger.snapshot(), once);
        assert_eq!(once.last(), Some(&ChatMessage::assistant("a1")));
    }

    #[test]
    fn test_rollback_on_empty_ledger() {
        let mut ledger = Ledger::new(3);
        assert!(!ledger.rollback_last_user());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_restore_front_undoes_trim() {
        let mut ledger = Ledger::new(2);
        ledger.append_user("q1");
        ledger.append_assistant("a1");
        let before = ledger.snapshot();

        ledger.append_user("q2");
        let dropped = ledger.trim();
        ledger.rollback_last_user();
        ledger.restore_front(dropped);

        assert_eq!(ledger.snapshot(), before);
    }
}
