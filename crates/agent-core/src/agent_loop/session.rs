//! Per-run session state owned by the driver.

use std::time::Instant;

use paperpilot_core_types::SessionId;
use serde::{Deserialize, Serialize};

use crate::oracle::ConversationHandle;

use super::types::TurnRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

/// One continuous automation run against a surface.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    status: SessionStatus,
    conversation: Option<ConversationHandle>,
    turns: u32,
    actions_dispatched: u32,
    last_url: Option<String>,
    history: Vec<TurnRecord>,
    started: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            status: SessionStatus::Active,
            conversation: None,
            turns: 0,
            actions_dispatched: 0,
            last_url: None,
            history: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn conversation(&self) -> Option<&ConversationHandle> {
        self.conversation.as_ref()
    }

    pub fn turns(&self) -> u32 {
        self.turns
    }

    pub fn actions_dispatched(&self) -> u32 {
        self.actions_dispatched
    }

    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Start the next turn; returns its 1-based number.
    pub(crate) fn begin_turn(&mut self) -> u32 {
        self.turns += 1;
        self.turns
    }

    pub(crate) fn advance(&mut self, conversation: ConversationHandle) {
        self.conversation = Some(conversation);
    }

    pub(crate) fn observe_url(&mut self, url: Option<String>) {
        if url.is_some() {
            self.last_url = url;
        }
    }

    pub(crate) fn record(&mut self, record: TurnRecord) {
        self.history.push(record);
    }

    pub(crate) fn count_dispatch(&mut self) {
        self.actions_dispatched += 1;
    }

    pub(crate) fn finish(&mut self, completed: bool) {
        debug_assert_eq!(self.status, SessionStatus::Active);
        self.status = if completed {
            SessionStatus::Completed
        } else {
            SessionStatus::Failed
        };
    }

    pub(crate) fn take_history(&mut self) -> Vec<TurnRecord> {
        std::mem::take(&mut self.history)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_counts_turns_and_keeps_last_url() {
        let mut session = Session::new();
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.begin_turn(), 1);
        assert_eq!(session.begin_turn(), 2);

        session.observe_url(Some("https://library.example/".into()));
        session.observe_url(None);
        assert_eq!(session.last_url(), Some("https://library.example/"));

        session.advance(ConversationHandle::new("resp_1"));
        assert_eq!(session.conversation().map(|c| c.as_str()), Some("resp_1"));

        session.finish(false);
        assert_eq!(session.status(), SessionStatus::Failed);
    }
}
