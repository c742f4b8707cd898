//! Cross-process session replication
//!
//! Each proxy session has one link to the remote process. Outbound deltas and
//! outcomes are numbered from 1 per link and direction. An inbound event is
//! applied only when its number is greater than the last one applied; equal
//! or lower numbers are duplicates or stale, logged and dropped. A session
//! init is admitted once per session id; repeats are dropped the same way.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use tradelink_core::{Replication, Session};
use tradelink_types::{PerSide, Perspective, Result, ServerId, SessionId, TradeError};

use crate::codec::ProxyPacket;
use crate::packets::{
    Delta, IconState, PlayerQuitPacket, SessionDeltaPacket, SessionInitPacket,
    SessionOutcomePacket,
};

#[derive(Debug, Clone)]
struct Link {
    remote: ServerId,
    next_outbound: u64,
    last_inbound: u64,
}

impl Link {
    fn stamp(&mut self) -> u64 {
        let seq = self.next_outbound;
        self.next_outbound += 1;
        seq
    }
}

#[derive(Debug, Default)]
pub struct ProxySynchronizer {
    links: HashMap<SessionId, Link>,
    /// Sessions whose link was closed
    retired: HashSet<SessionId>,
}

impl ProxySynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_link(&mut self, session_id: SessionId, remote: ServerId) {
        debug!(session = %session_id, remote = %remote, "replication link opened");
        self.links.insert(
            session_id,
            Link {
                remote,
                next_outbound: 1,
                last_inbound: 0,
            },
        );
    }

    pub fn close(&mut self, session_id: &SessionId) {
        if self.links.remove(session_id).is_some() {
            self.retired.insert(*session_id);
            debug!(session = %session_id, "replication link closed");
        }
    }

    /// Admit a session init; errors mean the session was already opened here
    pub fn admit_init(&self, session_id: &SessionId, from: &ServerId) -> Result<()> {
        if self.links.contains_key(session_id) || self.retired.contains(session_id) {
            warn!(session = %session_id, from = %from, "dropping repeated session init");
            return Err(TradeError::desync(session_id, "session init already applied"));
        }
        Ok(())
    }

    pub fn remote_of(&self, session_id: &SessionId) -> Option<&ServerId> {
        self.links.get(session_id).map(|link| &link.remote)
    }

    pub fn is_linked(&self, session_id: &SessionId) -> bool {
        self.links.contains_key(session_id)
    }

    /// Last inbound sequence number applied for a session
    pub fn last_inbound(&self, session_id: &SessionId) -> Option<u64> {
        self.links.get(session_id).map(|link| link.last_inbound)
    }

    /// Session-init packet describing `session` as it stands
    pub fn init_packet(&self, session: &Session) -> Result<SessionInitPacket> {
        let snapshot = session.snapshot()?;
        let mut icons = PerSide::<Vec<IconState>>::default();
        for (perspective, entries) in snapshot.iter() {
            let layout = session.layout(perspective);
            for (slot, bytes) in entries {
                icons[perspective].push(IconState {
                    slot: *slot,
                    kind: layout.icon_at(*slot)?.kind(),
                    bytes: bytes.clone(),
                });
            }
        }
        Ok(SessionInitPacket {
            session_id: *session.id(),
            layout: session.layout(Perspective::Primary).name().to_string(),
            participants: PerSide::new(
                session.participant(Perspective::Primary).identity.clone(),
                session.participant(Perspective::Secondary).identity.clone(),
            ),
            icons,
        })
    }

    /// Wrap a replication for the wire, stamping the next sequence number.
    ///
    /// Returns the target process alongside the packet. Quit notifications
    /// are not numbered; they are honoured whenever they arrive.
    pub fn outbound(
        &mut self,
        session_id: &SessionId,
        replication: Replication,
    ) -> Result<(ServerId, ProxyPacket)> {
        let link = self
            .links
            .get_mut(session_id)
            .ok_or_else(|| TradeError::desync(session_id, "no replication link"))?;

        let session_id = *session_id;
        let delta = |seq: u64, delta: Delta| {
            ProxyPacket::Delta(SessionDeltaPacket {
                session_id,
                seq,
                delta,
            })
        };
        let packet = match replication {
            Replication::Quit { player } => ProxyPacket::Quit(PlayerQuitPacket { player }),
            Replication::Outcome(outcome) => ProxyPacket::Outcome(SessionOutcomePacket {
                session_id,
                seq: link.stamp(),
                outcome,
            }),
            Replication::IconChanged {
                perspective,
                slot,
                bytes,
            } => delta(
                link.stamp(),
                Delta::Icon {
                    perspective,
                    slot,
                    bytes,
                },
            ),
            Replication::ReadyChanged { perspective, ready } => {
                delta(link.stamp(), Delta::Ready { perspective, ready })
            }
            Replication::ReadyState { flags } => delta(link.stamp(), Delta::ReadyState { flags }),
        };
        Ok((link.remote.clone(), packet))
    }

    /// Admit an inbound event; errors mean drop it
    pub fn accept_inbound(&mut self, session_id: &SessionId, from: &ServerId, seq: u64) -> Result<()> {
        let link = self
            .links
            .get_mut(session_id)
            .ok_or_else(|| TradeError::desync(session_id, "no replication link"))?;
        if &link.remote != from {
            return Err(TradeError::desync(
                session_id,
                format!("event from {} but the session is linked to {}", from, link.remote),
            ));
        }
        if seq <= link.last_inbound {
            warn!(
                session = %session_id,
                seq,
                last = link.last_inbound,
                "dropping duplicate or out-of-order event"
            );
            return Err(TradeError::desync(
                session_id,
                format!("sequence {} already applied (last {})", seq, link.last_inbound),
            ));
        }
        if seq > link.last_inbound + 1 {
            warn!(
                session = %session_id,
                seq,
                last = link.last_inbound,
                "sequence gap, applying anyway"
            );
        }
        link.last_inbound = seq;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradelink_core::Outcome;

    fn linked() -> (ProxySynchronizer, SessionId, ServerId) {
        let mut sync = ProxySynchronizer::new();
        let id = SessionId::new();
        let beta = ServerId::new("beta");
        sync.open_link(id, beta.clone());
        (sync, id, beta)
    }

    #[test]
    fn test_outbound_numbers_deltas_and_outcomes() {
        let (mut sync, id, beta) = linked();
        let (target, first) = sync
            .outbound(&id, Replication::ReadyChanged { perspective: Perspective::Primary, ready: true })
            .unwrap();
        assert_eq!(target, beta);
        let (_, second) = sync
            .outbound(&id, Replication::ReadyState { flags: PerSide::new(true, true) })
            .unwrap();
        let (_, quit) = sync
            .outbound(&id, Replication::Quit { player: "Alex".to_string() })
            .unwrap();
        let (_, third) = sync
            .outbound(&id, Replication::Outcome(Outcome::Abort(tradelink_types::AbortReason::MissingItem)))
            .unwrap();

        assert!(matches!(first, ProxyPacket::Delta(SessionDeltaPacket { seq: 1, .. })));
        assert!(matches!(second, ProxyPacket::Delta(SessionDeltaPacket { seq: 2, .. })));
        assert!(matches!(quit, ProxyPacket::Quit(_)));
        assert!(matches!(third, ProxyPacket::Outcome(SessionOutcomePacket { seq: 3, .. })));
    }

    #[test]
    fn test_duplicates_and_stale_events_are_dropped() {
        let (mut sync, id, beta) = linked();
        sync.accept_inbound(&id, &beta, 1).unwrap();
        assert!(sync.accept_inbound(&id, &beta, 1).unwrap_err().is_desync());
        sync.accept_inbound(&id, &beta, 2).unwrap();
        assert!(sync.accept_inbound(&id, &beta, 1).is_err());
        assert_eq!(sync.last_inbound(&id), Some(2));
    }

    #[test]
    fn test_gap_is_applied() {
        let (mut sync, id, beta) = linked();
        sync.accept_inbound(&id, &beta, 4).unwrap();
        assert_eq!(sync.last_inbound(&id), Some(4));
    }

    #[test]
    fn test_init_is_admitted_once() {
        let mut sync = ProxySynchronizer::new();
        let id = SessionId::new();
        let alpha = ServerId::new("alpha");
        sync.admit_init(&id, &alpha).unwrap();
        sync.open_link(id, alpha.clone());
        assert!(sync.admit_init(&id, &alpha).unwrap_err().is_desync());

        sync.close(&id);
        assert!(!sync.is_linked(&id));
        assert!(sync.admit_init(&id, &alpha).is_err());
    }

    #[test]
    fn test_wrong_sender_or_unknown_session() {
        let (mut sync, id, _) = linked();
        assert!(sync.accept_inbound(&id, &ServerId::new("gamma"), 1).is_err());
        assert!(sync.accept_inbound(&SessionId::new(), &ServerId::new("beta"), 1).is_err());
        assert_eq!(sync.last_inbound(&id), Some(0));
    }
}
