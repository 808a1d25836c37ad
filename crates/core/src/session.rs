use crate::ChatTurn;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct Session {
    turns: VecDeque<ChatTurn>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Sessions {
    by_id: HashMap<String, Session>,
    clock: u64,
}

/// Conversation history keyed by session id. Each session keeps its most
/// recent turns; the least recently used session is dropped once the store
/// is full.
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<Sessions>,
    max_turns: usize,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(Sessions::default()),
            max_turns: max_turns.max(1),
            max_sessions: max_sessions.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The last `limit` turns of a session, oldest first.
    pub fn history(&self, session_id: &str, limit: usize) -> Vec<ChatTurn> {
        let sessions = self.lock();
        sessions
            .by_id
            .get(session_id)
            .map(|session| {
                let skip = session.turns.len().saturating_sub(limit);
                session.turns.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    pub fn record(&self, session_id: &str, question: &str, answer: &str) {
        let mut sessions = self.lock();
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.by_id.contains_key(session_id) && sessions.by_id.len() >= self.max_sessions {
            let oldest = sessions
                .by_id
                .iter()
                .min_by_key(|(_, session)| session.last_used)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(session = %oldest, "evicting idle session");
                sessions.by_id.remove(&oldest);
            }
        }

        let session = sessions.by_id.entry(session_id.to_string()).or_default();
        session.last_used = now;
        session.turns.push_back(ChatTurn {
            question: question.to_string(),
            answer: answer.to_string(),
            at: Utc::now(),
        });
        while session.turns.len() > self.max_turns {
            session.turns.pop_front();
        }
    }

    pub fn session_count(&self) -> usize {
        self.lock().by_id.len()
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStore;

    #[test]
    fn sessions_do_not_share_history() {
        let store = SessionStore::new(10, 10);
        store.record("alice", "Quanto costa la porta Aria?", "500 euro.");
        store.record("bob", "Where is the showroom?", "In Crotone.");

        let alice = store.history("alice", 10);
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].question, "Quanto costa la porta Aria?");
        assert_eq!(store.history("bob", 10)[0].answer, "In Crotone.");
        assert!(store.history("carol", 10).is_empty());
    }

    #[test]
    fn turns_are_bounded_per_session() {
        let store = SessionStore::new(2, 10);
        for index in 0..5 {
            store.record("s", &format!("q{index}"), &format!("a{index}"));
        }

        let history = store.history("s", 10);
        let questions: Vec<&str> = history.iter().map(|turn| turn.question.as_str()).collect();
        assert_eq!(questions, vec!["q3", "q4"]);
        assert_eq!(store.history("s", 1)[0].question, "q4");
    }

    #[test]
    fn least_recently_used_session_is_evicted() {
        let store = SessionStore::new(5, 2);
        store.record("first", "q", "a");
        store.record("second", "q", "a");
        store.record("first", "q again", "a");
        store.record("third", "q", "a");

        assert_eq!(store.session_count(), 2);
        assert!(store.history("second", 5).is_empty());
        assert_eq!(store.history("first", 5).len(), 2);
        assert_eq!(store.history("third", 5).len(), 1);
    }
}
