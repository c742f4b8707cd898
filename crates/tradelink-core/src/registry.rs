//! Sessions hosted by one process, keyed by id and by participant

use std::collections::HashMap;

use tracing::debug;
use tradelink_types::{PlayerId, Result, SessionId, TradeError};

use crate::session::Session;

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    by_player: HashMap<PlayerId, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Player has a session that has not ended
    pub fn is_trading(&self, player: &PlayerId) -> bool {
        self.session_of(player).is_some()
    }

    /// Active session of a player
    pub fn session_of(&self, player: &PlayerId) -> Option<SessionId> {
        self.by_player
            .get(player)
            .filter(|id| {
                self.sessions
                    .get(id)
                    .is_some_and(|s| !s.state().is_terminal())
            })
            .copied()
    }

    /// Active session with a participant called `name`
    pub fn session_of_name(&self, name: &str) -> Option<SessionId> {
        self.sessions
            .values()
            .find(|s| !s.state().is_terminal() && s.perspective_of_name(name).is_some())
            .map(|s| *s.id())
    }

    /// Track a new session; at most one active session per player
    pub fn insert(&mut self, session: Session) -> Result<SessionId> {
        for (_, participant) in session.participants().iter() {
            if self.is_trading(participant.id()) {
                return Err(TradeError::AlreadyTrading {
                    player: participant.name().to_string(),
                });
            }
        }
        let id = *session.id();
        for (_, participant) in session.participants().iter() {
            self.by_player.insert(*participant.id(), id);
        }
        self.sessions.insert(id, session);
        Ok(id)
    }

    pub fn get(&self, id: &SessionId) -> Result<&Session> {
        self.sessions.get(id).ok_or_else(|| TradeError::SessionNotFound {
            session_id: id.to_string(),
        })
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| TradeError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.by_player.retain(|_, session_id| session_id != id);
        Some(session)
    }

    /// Remove every session that reached a terminal state
    pub fn reap_finished(&mut self) -> Vec<Session> {
        let finished: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.state().is_terminal())
            .map(|s| *s.id())
            .collect();
        finished
            .iter()
            .filter_map(|id| {
                debug!(session = %id, "reaping finished session");
                self.remove(id)
            })
            .collect()
    }
}
