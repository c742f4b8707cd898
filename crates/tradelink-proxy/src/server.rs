//! Trade service of one backend process
//!
//! `TradeServer` owns the requests and sessions hosted by a single process and
//! bridges them to the proxy link. Player actions come in through the public
//! methods, frames from other processes through `receive`, and time through
//! `tick`. After every step the affected session is pumped: its events go to
//! the interface and its replications out to the transport.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tradelink_core::{
    deliver_events, AuditSink, CancelReason, Effects, Goods, Icon, LayoutCatalog, Notice,
    Replication, RequestManager, Session, SessionRegistry, TradeInterface, TradeRequest,
    TradeSettings,
};
use tradelink_types::{
    Participant, PerSide, PlayerHandle, PlayerId, PlayerIdentity, RequestId, Result, ServerId,
    SessionId, TradeError,
};

use crate::codec::{self, ProxyPacket};
use crate::packets::{PlayerQuitPacket, SessionInitPacket, TradeAnswerPacket, TradeRequestPacket};
use crate::synchronizer::ProxySynchronizer;
use crate::transport::PacketTransport;

pub struct TradeServer<G, A, I, T> {
    name: ServerId,
    settings: TradeSettings,
    catalog: LayoutCatalog,
    goods: G,
    audit: A,
    interface: I,
    transport: T,
    players: HashMap<PlayerId, PlayerHandle>,
    /// Players hosted elsewhere and the process that hosts them
    directory: HashMap<PlayerId, (PlayerIdentity, ServerId)>,
    requests: RequestManager,
    sessions: SessionRegistry,
    sync: ProxySynchronizer,
}

impl<G, A, I, T> TradeServer<G, A, I, T>
where
    G: Goods,
    A: AuditSink,
    I: TradeInterface,
    T: PacketTransport,
{
    pub fn new(
        name: ServerId,
        settings: TradeSettings,
        goods: G,
        audit: A,
        interface: I,
        transport: T,
    ) -> Self {
        Self {
            name,
            requests: RequestManager::new(settings.request_timeout()),
            settings,
            catalog: LayoutCatalog::with_standard(),
            goods,
            audit,
            interface,
            transport,
            players: HashMap::new(),
            directory: HashMap::new(),
            sessions: SessionRegistry::new(),
            sync: ProxySynchronizer::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: LayoutCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn name(&self) -> &ServerId {
        &self.name
    }

    pub fn goods(&self) -> &G {
        &self.goods
    }

    pub fn goods_mut(&mut self) -> &mut G {
        &mut self.goods
    }

    pub fn audit(&self) -> &A {
        &self.audit
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn requests(&self) -> &RequestManager {
        &self.requests
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn synchronizer(&self) -> &ProxySynchronizer {
        &self.sync
    }

    pub fn session(&self, id: &SessionId) -> Result<&Session> {
        self.sessions.get(id)
    }

    /// Active session of a player
    pub fn session_of(&self, player: &PlayerId) -> Option<SessionId> {
        self.sessions.session_of(player)
    }

    /// Pending request from `sender` to `receiver`
    pub fn pending_request(&self, sender: &PlayerId, receiver: &PlayerId) -> Option<RequestId> {
        self.requests.find(sender, receiver).map(|r| r.id)
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// A player joined this process
    pub fn connect(&mut self, identity: PlayerIdentity) -> PlayerHandle {
        let handle = PlayerHandle::new(identity.clone());
        self.directory.remove(&identity.id);
        self.players.insert(identity.id, handle.clone());
        info!("Player {} connected to {}", identity.name, self.name);
        handle
    }

    /// Record which process hosts a player that is not connected here
    pub fn register_remote(&mut self, identity: PlayerIdentity, server: ServerId) {
        if self.players.contains_key(&identity.id) {
            return;
        }
        self.directory.insert(identity.id, (identity, server));
    }

    /// A player left this process.
    ///
    /// Their requests are dropped and their session, if any, is cancelled.
    pub fn disconnect(&mut self, player: &PlayerId) {
        let Some(handle) = self.players.remove(player) else {
            return;
        };
        info!("Player {} disconnected from {}", handle.name(), self.name);

        for request in self.requests.remove_for(player) {
            let other = if request.sender.id() == player {
                &request.receiver
            } else {
                &request.sender
            };
            if other.is_local() {
                self.notify(
                    other.id(),
                    Notice::RequestDeclined {
                        by: handle.name().to_string(),
                    },
                );
            } else if let Some(server) = self.server_of(other.id()) {
                let quit = PlayerQuitPacket {
                    player: handle.name().to_string(),
                };
                self.send(&server, ProxyPacket::Quit(quit));
            }
        }

        if let Some(session_id) = self.sessions.session_of(player) {
            if let Ok(session) = self.sessions.get_mut(&session_id) {
                session.cancel(CancelReason::Disconnected {
                    player: handle.name().to_string(),
                });
            }
            self.pump(&session_id);
        }
    }

    fn server_of(&self, player: &PlayerId) -> Option<ServerId> {
        self.directory.get(player).map(|(_, server)| server.clone())
    }

    fn local_handle(&self, player: &PlayerId) -> Result<&PlayerHandle> {
        self.players.get(player).ok_or_else(|| TradeError::NotLocal {
            player: player.to_string(),
        })
    }

    fn participant(&self, player: &PlayerId) -> Result<Participant> {
        if let Some(handle) = self.players.get(player) {
            return Ok(Participant::local(handle.identity().clone()));
        }
        self.directory
            .get(player)
            .map(|(identity, _)| Participant::remote(identity.clone()))
            .ok_or_else(|| TradeError::NotAParticipant {
                player: player.to_string(),
            })
    }

    fn notify(&mut self, player: &PlayerId, notice: Notice) {
        if let Some(handle) = self.players.get(player) {
            self.interface.notify(handle, notice);
        }
    }

    fn notify_error(&mut self, player: &PlayerId, error: &TradeError) {
        self.notify(
            player,
            Notice::Error {
                code: error.error_code().to_string(),
                message: error.to_string(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Invite `receiver` to trade; the sender must be hosted here
    pub fn request(
        &mut self,
        sender: &PlayerId,
        receiver: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<RequestId> {
        let sender = Participant::local(self.local_handle(sender)?.identity().clone());
        let receiver = self.participant(receiver)?;

        let sessions = &self.sessions;
        let id = match self.requests.request(sender.clone(), receiver.clone(), now, |p| {
            sessions.is_trading(p)
        }) {
            Ok(id) => id,
            Err(e) => {
                self.notify_error(sender.id(), &e);
                return Err(e);
            }
        };

        self.notify(
            sender.id(),
            Notice::RequestSent {
                to: receiver.name().to_string(),
            },
        );
        if receiver.is_local() {
            self.notify(
                receiver.id(),
                Notice::RequestReceived {
                    from: sender.name().to_string(),
                },
            );
        } else if let Some(server) = self.server_of(receiver.id()) {
            let packet = TradeRequestPacket {
                sender: sender.identity.clone(),
                receiver: receiver.identity.clone(),
            };
            self.send(&server, ProxyPacket::Request(packet));
        }
        Ok(id)
    }

    /// Accept a request on behalf of its receiver.
    ///
    /// The sender's process opens the session. Returns the session id when
    /// that is this process, `None` when the acceptance was forwarded.
    pub fn accept(
        &mut self,
        request_id: &RequestId,
        by: &PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionId>> {
        let request = self.live_request(request_id, by)?;
        if request.sender.is_local() {
            return self.open_session(request_id, now).map(Some);
        }

        if let Some(player) = [&request.sender, &request.receiver]
            .into_iter()
            .find(|p| self.sessions.is_trading(p.id()))
        {
            return Err(TradeError::AlreadyTrading {
                player: player.name().to_string(),
            });
        }
        let request = self.requests.claim(request_id, now)?;
        let server = self.server_of(request.sender.id()).ok_or_else(|| TradeError::NotAParticipant {
            player: request.sender.name().to_string(),
        })?;
        debug!(request = %request.id, server = %server, "forwarding acceptance");
        self.send(
            &server,
            ProxyPacket::Answer(TradeAnswerPacket {
                sender: request.sender.identity,
                receiver: request.receiver.identity,
                accepted: true,
            }),
        );
        Ok(None)
    }

    /// Decline a request; either side may call it
    pub fn decline(&mut self, request_id: &RequestId, by: &PlayerId) -> Result<()> {
        let request = self
            .requests
            .get(request_id)
            .filter(|r| r.involves(by))
            .cloned()
            .ok_or_else(|| TradeError::RequestNotFound {
                request_id: request_id.to_string(),
            })?;
        self.requests.decline(request_id)?;

        let (other, by_name) = if request.sender.id() == by {
            (&request.receiver, request.sender.name())
        } else {
            (&request.sender, request.receiver.name())
        };
        if other.is_local() {
            self.notify(
                other.id(),
                Notice::RequestDeclined {
                    by: by_name.to_string(),
                },
            );
        } else if let Some(server) = self.server_of(other.id()) {
            let answer = TradeAnswerPacket {
                sender: request.sender.identity.clone(),
                receiver: request.receiver.identity.clone(),
                accepted: false,
            };
            self.send(&server, ProxyPacket::Answer(answer));
        }
        Ok(())
    }

    /// Turn incoming requests for a local player on or off
    pub fn set_accepting(&mut self, player: &PlayerId, accepting: bool) -> Result<()> {
        self.local_handle(player)?;
        self.requests.set_accepting(*player, accepting);
        Ok(())
    }

    fn live_request(&self, request_id: &RequestId, receiver: &PlayerId) -> Result<TradeRequest> {
        self.requests
            .get(request_id)
            .filter(|r| r.receiver.id() == receiver)
            .cloned()
            .ok_or_else(|| TradeError::RequestNotFound {
                request_id: request_id.to_string(),
            })
    }

    /// Open the session for a request whose sender is hosted here
    fn open_session(&mut self, request_id: &RequestId, now: DateTime<Utc>) -> Result<SessionId> {
        let template = self.catalog.get(&self.settings.layout)?.clone();
        let settings = self.settings.clone();
        let sessions = &self.sessions;
        let mut opened = None;

        self.requests.accept(request_id, now, |request| {
            if let Some(player) = [&request.sender, &request.receiver]
                .into_iter()
                .find(|p| sessions.is_trading(p.id()))
            {
                return Err(TradeError::AlreadyTrading {
                    player: player.name().to_string(),
                });
            }
            let participants = PerSide::new(request.sender.clone(), request.receiver.clone());
            let session = Session::new(SessionId::new(), &template, participants, true, settings);
            let id = *session.id();
            opened = Some(session);
            Ok(id)
        })?;

        let session = opened.ok_or_else(|| TradeError::RequestNotFound {
            request_id: request_id.to_string(),
        })?;
        let remote = session
            .participants()
            .iter()
            .find(|(_, p)| !p.is_local())
            .and_then(|(_, p)| self.server_of(p.id()));
        let init = match remote {
            Some(_) => Some(self.sync.init_packet(&session)?),
            None => None,
        };
        let session_id = self.install(session)?;
        if let (Some(remote), Some(init)) = (remote, init) {
            self.sync.open_link(session_id, remote.clone());
            self.send(&remote, ProxyPacket::Init(init));
        }
        Ok(session_id)
    }

    /// Register a session and open the window for its local viewers
    fn install(&mut self, session: Session) -> Result<SessionId> {
        let session_id = self.sessions.insert(session)?;
        let session = self.sessions.get(&session_id)?;
        for (perspective, participant) in session.participants().iter() {
            if let Some(handle) = &participant.handle {
                self.interface.open(handle, session, perspective);
            }
        }
        Ok(session_id)
    }

    // ------------------------------------------------------------------
    // Session actions
    // ------------------------------------------------------------------

    fn active_session(&self, player: &PlayerId) -> Result<SessionId> {
        self.sessions
            .session_of(player)
            .ok_or_else(|| TradeError::NotAParticipant {
                player: player.to_string(),
            })
    }

    /// Flip the player's own ready flag
    pub fn toggle_ready(&mut self, player: &PlayerId) -> Result<bool> {
        let session_id = self.active_session(player)?;
        let session = self.sessions.get_mut(&session_id)?;
        let result = session
            .perspective_of(player)
            .and_then(|perspective| session.toggle_ready(perspective, &self.goods));
        self.pump(&session_id);
        if let Err(e) = &result {
            self.notify_error(player, e);
        }
        result
    }

    /// Replace an icon on the player's own side of the trade
    pub fn update_icon(&mut self, player: &PlayerId, slot: usize, icon: Box<dyn Icon>) -> Result<()> {
        let session_id = self.active_session(player)?;
        let session = self.sessions.get_mut(&session_id)?;
        let result = session
            .perspective_of(player)
            .and_then(|perspective| session.update_icon(perspective, slot, icon));
        self.pump(&session_id);
        if let Err(e) = &result {
            self.notify_error(player, e);
        }
        result
    }

    /// The player closed the trade window
    pub fn leave(&mut self, player: &PlayerId) -> Result<()> {
        let session_id = self.active_session(player)?;
        let session = self.sessions.get_mut(&session_id)?;
        let perspective = session.perspective_of(player)?;
        session.cancel(CancelReason::Requested {
            by: Some(perspective),
        });
        self.pump(&session_id);
        Ok(())
    }

    /// Cancel every active session, e.g. when the process stops
    pub fn shutdown(&mut self) {
        let ids = self.sessions.ids();
        for id in &ids {
            if let Ok(session) = self.sessions.get_mut(id) {
                session.cancel(CancelReason::Shutdown);
            }
            self.pump(id);
        }
        info!("Trade server {} shut down, {} sessions cancelled", self.name, ids.len());
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Advance countdowns, expire requests and drop finished sessions
    pub fn tick(&mut self, elapsed: Duration, now: DateTime<Utc>) {
        for session_id in self.sessions.ids() {
            if let Ok(session) = self.sessions.get_mut(&session_id) {
                session.tick(elapsed, &mut Effects::new(&mut self.goods, &mut self.audit));
            }
            self.pump(&session_id);
        }

        for expired in self.requests.expire(now) {
            if let Some(handle) = &expired.sending_player {
                let notice = Notice::RequestExpired {
                    partner: expired.receiver.name.clone(),
                };
                self.interface.notify(handle, notice);
            }
            if let Some(handle) = &expired.receiving_player {
                let notice = Notice::RequestExpired {
                    partner: expired.sender.name.clone(),
                };
                self.interface.notify(handle, notice);
            }
        }

        for session in self.sessions.reap_finished() {
            self.sync.close(session.id());
        }
    }

    // ------------------------------------------------------------------
    // Proxy link
    // ------------------------------------------------------------------

    /// Handle a frame sent by another process.
    ///
    /// Errors mean the frame was dropped; nothing else is affected.
    pub fn receive(&mut self, from: &ServerId, frame: &[u8], now: DateTime<Utc>) -> Result<()> {
        let packet = codec::decode(frame).map_err(|e| {
            warn!(server = %self.name, from = %from, error = %e, "undecodable frame dropped");
            e
        })?;
        debug!(server = %self.name, from = %from, packet = packet.name(), "packet received");

        match packet {
            ProxyPacket::Quit(packet) => self.on_quit(from, packet),
            ProxyPacket::Init(packet) => self.on_init(from, packet),
            ProxyPacket::Delta(packet) => {
                self.on_replication(from, packet.session_id, packet.seq, packet.delta.into())
            }
            ProxyPacket::Outcome(packet) => self.on_replication(
                from,
                packet.session_id,
                packet.seq,
                Replication::Outcome(packet.outcome),
            ),
            ProxyPacket::Request(packet) => self.on_request(from, packet, now),
            ProxyPacket::Answer(packet) => self.on_answer(packet, now),
        }
    }

    fn on_quit(&mut self, from: &ServerId, packet: PlayerQuitPacket) -> Result<()> {
        let gone: Vec<PlayerId> = self
            .directory
            .iter()
            .filter(|(_, (identity, server))| identity.name == packet.player && server == from)
            .map(|(id, _)| *id)
            .collect();
        for player in &gone {
            for request in self.requests.remove_for(player) {
                for side in [&request.sender, &request.receiver] {
                    if side.is_local() {
                        let notice = Notice::RequestDeclined {
                            by: packet.player.clone(),
                        };
                        self.notify(side.id(), notice);
                    }
                }
            }
        }

        let Some(session_id) = self.sessions.session_of_name(&packet.player) else {
            return Ok(());
        };
        if self.sync.remote_of(&session_id) != Some(from) {
            return Ok(());
        }
        let result = self.apply(&session_id, Replication::Quit { player: packet.player });
        self.pump(&session_id);
        result
    }

    fn on_init(&mut self, from: &ServerId, packet: SessionInitPacket) -> Result<()> {
        let session_id = packet.session_id;
        self.sync.admit_init(&session_id, from)?;
        let players = &self.players;
        let participants = packet.participants.clone().map(|identity| {
            if players.contains_key(&identity.id) {
                Participant::local(identity)
            } else {
                Participant::remote(identity)
            }
        });
        let local = participants.iter().filter(|(_, p)| p.is_local()).count();
        if local != 1 {
            warn!(session = %session_id, from = %from, "session init without exactly one local player");
            return Err(TradeError::desync(session_id, "init must name one player hosted here"));
        }

        let template = self.catalog.get(&packet.layout)?.clone();
        for (_, states) in packet.icons.iter() {
            for state in states {
                if template.slots.get(&state.slot).map(|spec| spec.kind()) != Some(state.kind) {
                    return Err(TradeError::desync(
                        session_id,
                        format!("slot {} does not match layout {}", state.slot, packet.layout),
                    ));
                }
            }
        }

        for (_, participant) in participants.iter() {
            if !participant.is_local() {
                self.directory
                    .insert(*participant.id(), (participant.identity.clone(), from.clone()));
            }
        }
        let local_name = participants
            .iter()
            .find(|(_, p)| p.is_local())
            .map(|(_, p)| p.name().to_string())
            .unwrap_or_default();

        let installed = Session::replica(
            session_id,
            &template,
            participants,
            self.settings.clone(),
            &packet.snapshot(),
        )
        .and_then(|session| self.install(session));
        match installed {
            Ok(session_id) => {
                self.sync.open_link(session_id, from.clone());
                info!("Replica of trade session {} opened on {}", session_id, self.name);
                Ok(())
            }
            Err(e) => {
                warn!(session = %session_id, error = %e, "refusing replicated session");
                self.send(from, ProxyPacket::Quit(PlayerQuitPacket { player: local_name }));
                Err(e)
            }
        }
    }

    fn on_replication(
        &mut self,
        from: &ServerId,
        session_id: SessionId,
        seq: u64,
        replication: Replication,
    ) -> Result<()> {
        self.sync.accept_inbound(&session_id, from, seq)?;
        let result = self.apply(&session_id, replication);
        self.pump(&session_id);
        if let Err(e) = &result {
            warn!(server = %self.name, session = %session_id, seq, error = %e, "remote event dropped");
        }
        result
    }

    fn apply(&mut self, session_id: &SessionId, replication: Replication) -> Result<()> {
        let session = self.sessions.get_mut(session_id)?;
        session.apply_remote(replication, &mut Effects::new(&mut self.goods, &mut self.audit))
    }

    fn on_request(
        &mut self,
        from: &ServerId,
        packet: TradeRequestPacket,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.register_remote(packet.sender.clone(), from.clone());
        let refuse = |error: TradeError| {
            (
                ProxyPacket::Answer(TradeAnswerPacket {
                    sender: packet.sender.clone(),
                    receiver: packet.receiver.clone(),
                    accepted: false,
                }),
                error,
            )
        };

        let result = match self.players.get(&packet.receiver.id) {
            None => Err(refuse(TradeError::NotLocal {
                player: packet.receiver.name.clone(),
            })),
            Some(handle) => {
                let sender = Participant::remote(packet.sender.clone());
                let receiver = Participant::local(handle.identity().clone());
                let sessions = &self.sessions;
                self.requests
                    .request(sender, receiver, now, |p| sessions.is_trading(p))
                    .map_err(refuse)
            }
        };
        match result {
            Ok(_) => {
                let notice = Notice::RequestReceived {
                    from: packet.sender.name.clone(),
                };
                self.notify(&packet.receiver.id, notice);
                Ok(())
            }
            Err((answer, error)) => {
                debug!(from = %from, error = %error, "remote trade request refused");
                self.send(from, answer);
                Err(error)
            }
        }
    }

    fn on_answer(&mut self, packet: TradeAnswerPacket, now: DateTime<Utc>) -> Result<()> {
        let request_id = self
            .requests
            .find(&packet.sender.id, &packet.receiver.id)
            .map(|r| r.id)
            .ok_or_else(|| TradeError::RequestNotFound {
                request_id: format!("{} -> {}", packet.sender.name, packet.receiver.name),
            })?;

        if packet.accepted {
            return self.open_session(&request_id, now).map(|_| ()).map_err(|e| {
                self.notify_error(&packet.sender.id, &e);
                e
            });
        }
        self.requests.decline(&request_id)?;
        let notice = Notice::RequestDeclined {
            by: packet.receiver.name.clone(),
        };
        self.notify(&packet.sender.id, notice);
        Ok(())
    }

    fn send(&mut self, target: &ServerId, packet: ProxyPacket) {
        match codec::encode(&packet) {
            Ok(frame) => {
                debug!(server = %self.name, target = %target, packet = packet.name(), "packet sent");
                self.transport.send(target, frame);
            }
            Err(e) => warn!(server = %self.name, packet = packet.name(), error = %e, "packet not sent"),
        }
    }

    /// Deliver pending events to the interface and replications to the link
    fn pump(&mut self, session_id: &SessionId) {
        let Ok(session) = self.sessions.get_mut(session_id) else {
            return;
        };
        let events = session.drain_events();
        let outbox = session.drain_outbox();

        if let Ok(session) = self.sessions.get(session_id) {
            deliver_events(&mut self.interface, session, &events);
        }
        for replication in outbox {
            match self.sync.outbound(session_id, replication) {
                Ok((target, packet)) => self.send(&target, packet),
                Err(e) => warn!(server = %self.name, session = %session_id, error = %e, "replication not sent"),
            }
        }
    }
}
