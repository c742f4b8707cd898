//! Trade requests and their expiry

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tradelink_types::{
    Participant, PlayerHandle, PlayerId, PlayerIdentity, RequestId, Result, SessionId, TradeError,
};

/// A pending invitation from `sender` to `receiver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequest {
    pub id: RequestId,
    pub sender: Participant,
    pub receiver: Participant,
    pub created_at: DateTime<Utc>,
}

impl TradeRequest {
    /// One side is hosted by another process
    pub fn is_proxy_trade(&self) -> bool {
        !self.sender.is_local() || !self.receiver.is_local()
    }

    pub fn involves(&self, player: &PlayerId) -> bool {
        self.sender.id() == player || self.receiver.id() == player
    }

    fn links(&self, a: &PlayerId, b: &PlayerId) -> bool {
        (self.sender.id() == a && self.receiver.id() == b)
            || (self.sender.id() == b && self.receiver.id() == a)
    }

    fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.created_at >= timeout
    }
}

/// Expiry notification, delivered to every side this process can reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestExpired {
    pub request_id: RequestId,
    pub sender: PlayerIdentity,
    #[serde(skip)]
    pub sending_player: Option<PlayerHandle>,
    pub receiver: PlayerIdentity,
    #[serde(skip)]
    pub receiving_player: Option<PlayerHandle>,
}

impl RequestExpired {
    /// One of the two handles is not available on this process
    pub fn is_proxy_trade(&self) -> bool {
        self.sending_player.is_none() || self.receiving_player.is_none()
    }
}

impl From<TradeRequest> for RequestExpired {
    fn from(request: TradeRequest) -> Self {
        Self {
            request_id: request.id,
            sender: request.sender.identity,
            sending_player: request.sender.handle,
            receiver: request.receiver.identity,
            receiving_player: request.receiver.handle,
        }
    }
}

/// Outstanding requests of one process
#[derive(Debug)]
pub struct RequestManager {
    requests: HashMap<RequestId, TradeRequest>,
    timeout: Duration,
    declining: HashSet<PlayerId>,
}

impl RequestManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            requests: HashMap::new(),
            timeout,
            declining: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, id: &RequestId) -> Option<&TradeRequest> {
        self.requests.get(id)
    }

    /// Pending request from `sender` to `receiver`, in that direction
    pub fn find(&self, sender: &PlayerId, receiver: &PlayerId) -> Option<&TradeRequest> {
        self.requests
            .values()
            .find(|r| r.sender.id() == sender && r.receiver.id() == receiver)
    }

    /// Turn incoming requests for `player` on or off
    pub fn set_accepting(&mut self, player: PlayerId, accepting: bool) {
        if accepting {
            self.declining.remove(&player);
        } else {
            self.declining.insert(player);
        }
    }

    pub fn is_accepting(&self, player: &PlayerId) -> bool {
        !self.declining.contains(player)
    }

    /// Register a new request.
    ///
    /// `is_trading` reports whether a player already has an active session.
    pub fn request(
        &mut self,
        sender: Participant,
        receiver: Participant,
        now: DateTime<Utc>,
        is_trading: impl Fn(&PlayerId) -> bool,
    ) -> Result<RequestId> {
        if sender.id() == receiver.id() {
            return Err(TradeError::SelfTrade);
        }
        if !sender.is_local() && !receiver.is_local() {
            return Err(TradeError::NoLocalParticipant);
        }
        if !self.is_accepting(receiver.id()) {
            return Err(TradeError::RequestsDisabled {
                player: receiver.name().to_string(),
            });
        }
        for party in [&sender, &receiver] {
            if is_trading(party.id()) {
                return Err(TradeError::AlreadyTrading {
                    player: party.name().to_string(),
                });
            }
        }
        let timeout = self.timeout;
        if self
            .requests
            .values()
            .any(|r| r.links(sender.id(), receiver.id()) && !r.is_expired(now, timeout))
        {
            return Err(TradeError::AlreadyPending {
                sender: sender.name().to_string(),
                receiver: receiver.name().to_string(),
            });
        }

        let request = TradeRequest {
            id: RequestId::new(),
            sender,
            receiver,
            created_at: now,
        };
        let id = request.id;
        info!(
            "Trade request {} from {} to {}",
            id,
            request.sender.name(),
            request.receiver.name()
        );
        self.requests.insert(id, request);
        Ok(id)
    }

    /// Turn the request into a session.
    ///
    /// `open` creates the session; the request is destroyed only if it succeeds.
    /// Requests past their timeout cannot be accepted.
    pub fn accept(
        &mut self,
        id: &RequestId,
        now: DateTime<Utc>,
        open: impl FnOnce(&TradeRequest) -> Result<SessionId>,
    ) -> Result<SessionId> {
        let request = self
            .requests
            .get(id)
            .filter(|r| !r.is_expired(now, self.timeout))
            .ok_or_else(|| TradeError::RequestNotFound {
                request_id: id.to_string(),
            })?;
        let session_id = open(request)?;
        self.requests.remove(id);
        info!("Trade request {} accepted, session {}", id, session_id);
        Ok(session_id)
    }

    /// Remove a live request without opening a session here.
    ///
    /// Used when the session is opened by the sender's process instead.
    pub fn claim(&mut self, id: &RequestId, now: DateTime<Utc>) -> Result<TradeRequest> {
        let live = self
            .requests
            .get(id)
            .is_some_and(|r| !r.is_expired(now, self.timeout));
        match live {
            true => self.requests.remove(id),
            false => None,
        }
        .ok_or_else(|| TradeError::RequestNotFound {
            request_id: id.to_string(),
        })
    }

    pub fn decline(&mut self, id: &RequestId) -> Result<TradeRequest> {
        let request = self
            .requests
            .remove(id)
            .ok_or_else(|| TradeError::RequestNotFound {
                request_id: id.to_string(),
            })?;
        info!("Trade request {} declined", id);
        Ok(request)
    }

    /// Remove every request past its timeout
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<RequestExpired> {
        let timeout = self.timeout;
        let expired: Vec<RequestId> = self
            .requests
            .values()
            .filter(|r| r.is_expired(now, timeout))
            .map(|r| r.id)
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.requests.remove(&id))
            .map(|request| {
                debug!(request = %request.id, "trade request expired");
                RequestExpired::from(request)
            })
            .collect()
    }

    /// Drop every request involving `player`, e.g. on disconnect
    pub fn remove_for(&mut self, player: &PlayerId) -> Vec<TradeRequest> {
        let ids: Vec<RequestId> = self
            .requests
            .values()
            .filter(|r| r.involves(player))
            .map(|r| r.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.requests.remove(&id))
            .collect()
    }
}
