//! Trade session state machine
//!
//! A `Session` owns both layouts, both ready flags and the commit countdown.
//! For proxy trades each process holds its own replica. Only the replica on
//! the initiation server runs the countdown and the commit; the other replica
//! mirrors whatever the initiation server decided.
//!
//! ```text
//! AwaitingReady --both ready--> BothReady --countdown--> Validating
//!       ^                          |                         |
//!       +------- mutation ---------+        blocked ---------+
//!       |                                                     |
//!       +<------------------------------------------ passed --+--> Committing --> Complete
//!
//! any non-terminal state --cancel/quit--> Cancelled
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tradelink_types::{
    AbortReason, FinishResult, Participant, PerSide, Perspective, PlayerId, Result, SessionId,
    TradeError,
};

use crate::events::{CancelReason, Outcome, Replication, SessionEvent};
use crate::goods::Goods;
use crate::icon::{decode_icon, icon_bytes, Effects, Icon, TradeView, Visual};
use crate::layout::{Layout, LayoutTemplate};
use crate::settings::TradeSettings;

/// Icon bytes of both layouts, in slot order
pub type Snapshot = PerSide<Vec<(usize, Vec<u8>)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Either side may still change its offer
    AwaitingReady,
    /// Both flags set, countdown running on the initiation server
    BothReady,
    /// Dry-run validation; mutations are refused
    Validating,
    /// Goods are being exchanged
    Committing,
    Complete,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }

    /// Past the commit freeze point
    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Validating | Self::Committing)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingReady => "awaiting-ready",
            Self::BothReady => "both-ready",
            Self::Validating => "validating",
            Self::Committing => "committing",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One replica of a two-party trade
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    participants: PerSide<Participant>,
    layouts: PerSide<Layout>,
    ready: PerSide<bool>,
    state: SessionState,
    initiation_server: bool,
    countdown: Option<Duration>,
    announced_secs: u64,
    settings: TradeSettings,
    events: Vec<SessionEvent>,
    outbox: Vec<Replication>,
}

impl Session {
    /// Create a session with fresh layouts from `template`
    pub fn new(
        id: SessionId,
        template: &LayoutTemplate,
        participants: PerSide<Participant>,
        initiation_server: bool,
        settings: TradeSettings,
    ) -> Self {
        info!(
            "Trade session {} opened between {} and {}",
            id,
            participants[Perspective::Primary].name(),
            participants[Perspective::Secondary].name()
        );
        Self {
            id,
            layouts: PerSide::from_fn(|_| template.instantiate()),
            participants,
            ready: PerSide::default(),
            state: SessionState::AwaitingReady,
            initiation_server,
            countdown: None,
            announced_secs: 0,
            settings,
            events: Vec::new(),
            outbox: Vec::new(),
        }
    }

    /// Create the remote replica of a session opened on another process
    pub fn replica(
        id: SessionId,
        template: &LayoutTemplate,
        participants: PerSide<Participant>,
        settings: TradeSettings,
        initial: &Snapshot,
    ) -> Result<Self> {
        let mut session = Self::new(id, template, participants, false, settings);
        session.install(initial)?;
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn participants(&self) -> &PerSide<Participant> {
        &self.participants
    }

    pub fn participant(&self, perspective: Perspective) -> &Participant {
        &self.participants[perspective]
    }

    pub fn layout(&self, perspective: Perspective) -> &Layout {
        &self.layouts[perspective]
    }

    pub fn ready(&self) -> PerSide<bool> {
        self.ready
    }

    pub fn is_ready(&self, perspective: Perspective) -> bool {
        self.ready[perspective]
    }

    pub fn is_initiation_server(&self) -> bool {
        self.initiation_server
    }

    /// Time left before the commit, while both sides are ready
    pub fn remaining_countdown(&self) -> Option<Duration> {
        self.countdown
    }

    /// Either participant is hosted by another process
    pub fn is_proxy(&self) -> bool {
        self.participants.iter().any(|(_, p)| !p.is_local())
    }

    pub fn perspective_of(&self, player: &PlayerId) -> Result<Perspective> {
        self.participants
            .iter()
            .find(|(_, p)| p.id() == player)
            .map(|(perspective, _)| perspective)
            .ok_or_else(|| TradeError::NotAParticipant {
                player: player.to_string(),
            })
    }

    pub fn perspective_of_name(&self, name: &str) -> Option<Perspective> {
        self.participants
            .iter()
            .find(|(_, p)| p.name() == name)
            .map(|(perspective, _)| perspective)
    }

    pub fn view(&self) -> TradeView<'_> {
        TradeView {
            session_id: &self.id,
            participants: &self.participants,
            ready: self.ready,
            state: self.state,
            initiation_server: self.initiation_server,
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    /// Visual for the icon `perspective` owns at `slot`, as `viewer` sees it
    pub fn render(&self, perspective: Perspective, slot: usize, viewer: Perspective) -> Result<Visual> {
        let icon = self.layouts[perspective].icon_at(slot)?;
        Ok(icon.render(&self.view(), perspective, &self.participants[viewer]))
    }

    pub fn render_layout(&self, perspective: Perspective, viewer: Perspective) -> Vec<(usize, Visual)> {
        let view = self.view();
        let viewer = &self.participants[viewer];
        self.layouts[perspective]
            .slots()
            .map(|(slot, icon)| (slot, icon.render(&view, perspective, viewer)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Local actions
    // ------------------------------------------------------------------

    fn ensure_mutable(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(TradeError::SessionTerminated {
                session_id: self.id.to_string(),
            });
        }
        if self.state.is_frozen() {
            return Err(TradeError::SessionFrozen {
                session_id: self.id.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_local(&self, perspective: Perspective) -> Result<()> {
        let participant = &self.participants[perspective];
        if !participant.is_local() {
            return Err(TradeError::NotLocal {
                player: participant.name().to_string(),
            });
        }
        Ok(())
    }

    /// Flip the ready flag of a locally hosted side; returns the new flag.
    ///
    /// Becoming ready runs that side's validation pass against local goods
    /// first, so a side can never be ready with an offer it cannot honour.
    pub fn toggle_ready(&mut self, perspective: Perspective, goods: &dyn Goods) -> Result<bool> {
        self.ensure_mutable()?;
        self.ensure_local(perspective)?;

        let ready = !self.ready[perspective];
        if ready {
            if self.settings.require_offer && self.layouts.iter().all(|(_, l)| l.is_empty()) {
                return Err(TradeError::NothingOffered);
            }
            if let Some(reason) = self.blocking_reason(perspective, goods) {
                return Err(TradeError::ValidationFailed { reason });
            }
        }

        self.set_ready(perspective, ready);
        if self.is_proxy() {
            self.outbox.push(Replication::ReadyChanged { perspective, ready });
        }
        Ok(ready)
    }

    /// Replace the icon state at `slot` on a locally hosted side.
    ///
    /// Every mutation clears both ready flags.
    pub fn update_icon(&mut self, perspective: Perspective, slot: usize, icon: Box<dyn Icon>) -> Result<()> {
        self.ensure_mutable()?;
        self.ensure_local(perspective)?;

        let bytes = match self.is_proxy() {
            true => Some(icon_bytes(icon.as_ref())?),
            false => None,
        };
        self.layouts[perspective].replace(slot, icon)?;
        debug!(session = %self.id, %perspective, slot, "icon updated");
        self.after_mutation(perspective, slot);

        if let Some(bytes) = bytes {
            self.outbox.push(Replication::IconChanged {
                perspective,
                slot,
                bytes,
            });
        }
        Ok(())
    }

    /// Force the session to `Cancelled`; returns false if it already ended
    pub fn cancel(&mut self, reason: CancelReason) -> bool {
        let player = match &reason {
            CancelReason::Disconnected { player } => Some(player.clone()),
            _ => self
                .participants
                .iter()
                .find(|(_, p)| p.is_local())
                .map(|(_, p)| p.name().to_string()),
        };
        if !self.terminate(reason) {
            return false;
        }
        if self.is_proxy() {
            if let Some(player) = player {
                self.outbox.push(Replication::Quit { player });
            }
        }
        true
    }

    /// Advance the countdown; commits when it runs out.
    ///
    /// Both replicas first re-validate the ready sides they host, so an offer
    /// spent during the countdown withdraws readiness before it can be
    /// committed. Replicas on the remote process never count down.
    pub fn tick(&mut self, elapsed: Duration, effects: &mut Effects<'_>) {
        if self.state.is_terminal() || self.state.is_frozen() {
            return;
        }
        self.recheck_ready(&*effects.goods);
        if !self.initiation_server || self.state != SessionState::BothReady {
            return;
        }
        let Some(remaining) = self.countdown else {
            return;
        };
        let remaining = remaining.saturating_sub(elapsed);
        self.countdown = Some(remaining);

        let whole_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        if whole_secs < self.announced_secs {
            self.announced_secs = whole_secs;
            if whole_secs > 0 {
                debug!(session = %self.id, remaining_secs = whole_secs, "countdown");
                self.events.push(SessionEvent::CountdownTick {
                    remaining_secs: whole_secs,
                });
            }
        }

        if remaining.is_zero() {
            self.commit(effects);
        }
    }

    /// First blocking result among the icons `perspective` offers
    fn blocking_reason(&self, perspective: Perspective, goods: &dyn Goods) -> Option<AbortReason> {
        let view = self.view();
        let owner = &self.participants[perspective];
        self.layouts[perspective]
            .slots()
            .find_map(|(_, icon)| match icon.try_finish(&view, perspective, owner, goods) {
                FinishResult::Block(reason) => Some(reason),
                _ => None,
            })
    }

    /// Withdraw readiness from a hosted side whose offer is no longer covered
    fn recheck_ready(&mut self, goods: &dyn Goods) {
        let withdrawn = Perspective::ALL.into_iter().find_map(|perspective| {
            if !self.ready[perspective] || !self.participants[perspective].is_local() {
                return None;
            }
            self.blocking_reason(perspective, goods)
                .map(|reason| (perspective, reason))
        });
        let Some((perspective, reason)) = withdrawn else {
            return;
        };
        warn!(session = %self.id, %perspective, %reason, "offer no longer covered, ready withdrawn");

        if self.initiation_server {
            self.abort(reason.clone());
            if self.is_proxy() {
                self.outbox.push(Replication::Outcome(Outcome::Abort(reason)));
            }
        } else {
            self.set_ready(perspective, false);
            self.events.push(SessionEvent::ValidationFailed { reason });
            self.outbox.push(Replication::ReadyChanged {
                perspective,
                ready: false,
            });
        }
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Validate every icon, then either exchange everything or nothing
    fn commit(&mut self, effects: &mut Effects<'_>) {
        self.state = SessionState::Validating;
        self.countdown = None;
        info!("Trade session {} validating", self.id);

        let snapshot = match self.is_proxy() {
            true => match self.snapshot() {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!("Trade session {} could not snapshot layouts: {}", self.id, e);
                    self.cancel(CancelReason::Desync {
                        detail: e.to_string(),
                    });
                    return;
                }
            },
            false => None,
        };

        let mut warnings = Vec::new();
        let verdict = {
            let view = self.view();
            let goods: &dyn Goods = &*effects.goods;
            let mut verdict = Ok(());
            'validate: for perspective in Perspective::ALL {
                let owner = &self.participants[perspective];
                for (slot, icon) in self.layouts[perspective].slots() {
                    match icon.try_finish(&view, perspective, owner, goods) {
                        FinishResult::Pass => {}
                        FinishResult::Warn(notice) => warnings.push((perspective, notice)),
                        FinishResult::Block(reason) => {
                            debug!(session = %self.id, %perspective, slot, %reason, "validation blocked");
                            verdict = Err(reason);
                            break 'validate;
                        }
                    }
                }
            }
            verdict
        };

        if let Err(reason) = verdict {
            self.abort(reason.clone());
            if snapshot.is_some() {
                self.outbox.push(Replication::Outcome(Outcome::Abort(reason)));
            }
            return;
        }

        self.state = SessionState::Committing;
        self.finish_all(effects);
        for (perspective, notice) in warnings {
            self.events.push(SessionEvent::Warning { perspective, notice });
        }
        self.complete();
        if let Some(snapshot) = snapshot {
            self.outbox.push(Replication::Outcome(Outcome::Commit { snapshot }));
        }
    }

    fn finish_all(&mut self, effects: &mut Effects<'_>) {
        let Session {
            id,
            participants,
            layouts,
            ready,
            state,
            initiation_server,
            ..
        } = self;
        let participants: &PerSide<Participant> = participants;
        let view = TradeView {
            session_id: id,
            participants,
            ready: *ready,
            state: *state,
            initiation_server: *initiation_server,
        };
        for perspective in Perspective::ALL {
            for (_, icon) in layouts[perspective].slots_mut() {
                icon.on_finish(&view, perspective, &participants[perspective], effects);
            }
        }
    }

    fn abort(&mut self, reason: AbortReason) {
        warn!("Trade session {} aborted: {}", self.id, reason);
        self.state = SessionState::AwaitingReady;
        self.countdown = None;
        self.clear_ready();
        self.events.push(SessionEvent::ValidationFailed { reason });
    }

    fn complete(&mut self) {
        self.state = SessionState::Complete;
        self.events.push(SessionEvent::Completed);
        info!("Trade session {} complete", self.id);
    }

    fn terminate(&mut self, reason: CancelReason) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        info!("Trade session {} cancelled: {:?}", self.id, reason);
        self.state = SessionState::Cancelled;
        self.countdown = None;
        self.events.push(SessionEvent::Cancelled { reason });
        true
    }

    // ------------------------------------------------------------------
    // Replication
    // ------------------------------------------------------------------

    /// Serialize both layouts
    pub fn snapshot(&self) -> Result<Snapshot> {
        let encode = |layout: &Layout| -> Result<Vec<(usize, Vec<u8>)>> {
            layout
                .slots()
                .map(|(slot, icon)| Ok((slot, icon_bytes(icon)?)))
                .collect()
        };
        Ok(PerSide::new(
            encode(&self.layouts[Perspective::Primary])?,
            encode(&self.layouts[Perspective::Secondary])?,
        ))
    }

    /// Overwrite icon state from a snapshot; all or nothing
    pub fn install(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut staged = self.layouts.clone();
        for (perspective, entries) in snapshot.iter() {
            for (slot, bytes) in entries {
                let icon = decode_icon(staged[perspective].icon_at(*slot)?, bytes)?;
                staged[perspective].replace(*slot, icon)?;
            }
        }
        self.layouts = staged;
        Ok(())
    }

    fn ensure_remote(&self, perspective: Perspective) -> Result<()> {
        if self.participants[perspective].is_local() {
            return Err(TradeError::desync(
                &self.id,
                format!("remote update for locally hosted {} side", perspective),
            ));
        }
        Ok(())
    }

    fn ensure_follower(&self) -> Result<()> {
        if self.initiation_server {
            return Err(TradeError::desync(
                &self.id,
                "initiation server received an authoritative update",
            ));
        }
        Ok(())
    }

    /// Apply a change made on the other replica, without replicating it back.
    ///
    /// On the initiation server a change to the ready flags is answered with
    /// the authoritative `ReadyState`. A `Quit` is always honoured. Errors
    /// leave the session untouched unless they say otherwise.
    pub fn apply_remote(&mut self, replication: Replication, effects: &mut Effects<'_>) -> Result<()> {
        if self.state.is_terminal() {
            if matches!(replication, Replication::Quit { .. }) {
                return Ok(());
            }
            return Err(TradeError::desync(&self.id, format!("update after session {}", self.state)));
        }
        if self.state.is_frozen() {
            return Err(TradeError::desync(&self.id, "update during commit"));
        }

        let flags_before = self.ready;
        match replication {
            Replication::IconChanged {
                perspective,
                slot,
                bytes,
            } => {
                self.ensure_remote(perspective)?;
                let icon = decode_icon(self.layouts[perspective].icon_at(slot)?, &bytes)?;
                self.layouts[perspective].replace(slot, icon)?;
                self.after_mutation(perspective, slot);
            }
            Replication::ReadyChanged { perspective, ready } => {
                self.ensure_remote(perspective)?;
                self.set_ready(perspective, ready);
            }
            Replication::ReadyState { flags } => {
                self.ensure_follower()?;
                for perspective in Perspective::ALL {
                    if self.ready[perspective] != flags[perspective] {
                        self.set_ready(perspective, flags[perspective]);
                    }
                }
            }
            Replication::Outcome(Outcome::Abort(reason)) => {
                self.ensure_follower()?;
                self.abort(reason);
            }
            Replication::Outcome(Outcome::Commit { snapshot }) => {
                self.ensure_follower()?;
                if let Err(e) = self.install(&snapshot) {
                    self.terminate(CancelReason::Desync {
                        detail: e.to_string(),
                    });
                    return Err(TradeError::desync(&self.id, format!("bad commit snapshot: {}", e)));
                }
                self.state = SessionState::Committing;
                self.countdown = None;
                self.finish_all(effects);
                self.complete();
            }
            Replication::Quit { player } => {
                self.terminate(CancelReason::Disconnected { player });
            }
        }

        if self.initiation_server && !self.state.is_terminal() && self.ready != flags_before {
            self.outbox.push(Replication::ReadyState { flags: self.ready });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // State bookkeeping
    // ------------------------------------------------------------------

    fn after_mutation(&mut self, perspective: Perspective, slot: usize) {
        self.events.push(SessionEvent::SlotChanged { perspective, slot });
        self.clear_ready();
    }

    fn clear_ready(&mut self) {
        for perspective in Perspective::ALL {
            if self.ready[perspective] {
                self.ready[perspective] = false;
                self.events.push(SessionEvent::ReadyChanged {
                    perspective,
                    ready: false,
                });
            }
        }
        self.refresh_state();
    }

    fn set_ready(&mut self, perspective: Perspective, ready: bool) {
        if self.ready[perspective] == ready {
            return;
        }
        self.ready[perspective] = ready;
        self.events.push(SessionEvent::ReadyChanged { perspective, ready });
        self.refresh_state();
    }

    fn refresh_state(&mut self) {
        match self.state {
            SessionState::AwaitingReady if self.ready.both() => {
                self.state = SessionState::BothReady;
                let seconds = self.settings.countdown_secs;
                self.countdown = Some(self.settings.countdown());
                self.announced_secs = seconds;
                info!("Trade session {} both ready, committing in {}s", self.id, seconds);
                self.events.push(SessionEvent::CountdownStarted { seconds });
            }
            SessionState::BothReady if !self.ready.both() => {
                self.state = SessionState::AwaitingReady;
                self.countdown = None;
                debug!(session = %self.id, "countdown aborted");
                self.events.push(SessionEvent::CountdownAborted);
            }
            _ => {}
        }
    }

    /// Take the events produced since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take the replications produced since the last call
    pub fn drain_outbox(&mut self) -> Vec<Replication> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAudit;
    use crate::goods::InMemoryGoods;
    use crate::icon::{CurrencyIcon, ItemSlotIcon};
    use tradelink_types::{Asset, ItemStack, PlayerIdentity};

    fn coins() -> Asset {
        Asset::Currency("coins".into())
    }

    fn local_session() -> Session {
        Session::new(
            SessionId::new(),
            &LayoutTemplate::standard(),
            PerSide::new(
                Participant::local(PlayerIdentity::named("Alex")),
                Participant::local(PlayerIdentity::named("Blake")),
            ),
            true,
            TradeSettings::default(),
        )
    }

    fn offer_coins(session: &mut Session, goods: &mut InMemoryGoods, perspective: Perspective, amount: u64) {
        let id = *session.participant(perspective).id();
        goods.set_balance(&id, coins(), amount);
        session
            .update_icon(perspective, 4, Box::new(CurrencyIcon::new("coins").with_amount(amount)))
            .unwrap();
    }

    #[test]
    fn test_perspective_of_unknown_player() {
        let session = local_session();
        let alex = *session.participant(Perspective::Primary).id();
        assert_eq!(session.perspective_of(&alex).unwrap(), Perspective::Primary);
        let err = session.perspective_of(&PlayerId::new()).unwrap_err();
        assert_eq!(err.error_code(), "NOT_A_PARTICIPANT");
    }

    #[test]
    fn test_ready_requires_an_offer() {
        let mut session = local_session();
        let goods = InMemoryGoods::new();
        assert_eq!(
            session.toggle_ready(Perspective::Primary, &goods),
            Err(TradeError::NothingOffered)
        );
    }

    #[test]
    fn test_ready_precheck_blocks_unbacked_offer() {
        let mut session = local_session();
        let goods = InMemoryGoods::new();
        session
            .update_icon(Perspective::Primary, 0, Box::new(ItemSlotIcon::holding(ItemStack::new("diamond", 1))))
            .unwrap();
        assert_eq!(
            session.toggle_ready(Perspective::Primary, &goods),
            Err(TradeError::ValidationFailed {
                reason: AbortReason::MissingItem
            })
        );
        assert!(!session.is_ready(Perspective::Primary));
    }

    #[test]
    fn test_both_ready_starts_countdown_and_unready_aborts_it() {
        let mut session = local_session();
        let mut goods = InMemoryGoods::new();
        offer_coins(&mut session, &mut goods, Perspective::Primary, 10);

        assert!(session.toggle_ready(Perspective::Primary, &goods).unwrap());
        assert!(session.toggle_ready(Perspective::Secondary, &goods).unwrap());
        assert_eq!(session.state(), SessionState::BothReady);
        assert_eq!(session.remaining_countdown(), Some(Duration::from_secs(3)));

        assert!(!session.toggle_ready(Perspective::Secondary, &goods).unwrap());
        assert_eq!(session.state(), SessionState::AwaitingReady);
        assert!(session.drain_events().contains(&SessionEvent::CountdownAborted));
    }

    #[test]
    fn test_countdown_ticks_once_per_second() {
        let mut session = local_session();
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        offer_coins(&mut session, &mut goods, Perspective::Primary, 10);
        session.toggle_ready(Perspective::Primary, &goods).unwrap();
        session.toggle_ready(Perspective::Secondary, &goods).unwrap();
        session.drain_events();

        for _ in 0..4 {
            session.tick(Duration::from_millis(500), &mut Effects::new(&mut goods, &mut audit));
        }
        let ticks: Vec<u64> = session
            .drain_events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::CountdownTick { remaining_secs } => Some(remaining_secs),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![2, 1]);
        assert_eq!(session.state(), SessionState::BothReady);
    }

    #[test]
    fn test_commit_exchanges_both_offers() {
        let mut session = local_session();
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        let alex = *session.participant(Perspective::Primary).id();
        let blake = *session.participant(Perspective::Secondary).id();
        offer_coins(&mut session, &mut goods, Perspective::Primary, 40);
        goods.add_items(&blake, ItemStack::new("emerald", 2));
        session
            .update_icon(Perspective::Secondary, 0, Box::new(ItemSlotIcon::holding(ItemStack::new("emerald", 2))))
            .unwrap();

        session.toggle_ready(Perspective::Primary, &goods).unwrap();
        session.toggle_ready(Perspective::Secondary, &goods).unwrap();
        session.tick(Duration::from_secs(3), &mut Effects::new(&mut goods, &mut audit));

        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(goods.balance(&alex, &coins()), 0);
        assert_eq!(goods.balance(&blake, &coins()), 40);
        assert_eq!(goods.item_count(&alex, &ItemStack::new("emerald", 1)), 2);
        assert_eq!(audit.entries.len(), 2);
        assert!(session.drain_outbox().is_empty());
    }

    #[test]
    fn test_failed_validation_clears_both_flags() {
        let mut session = local_session();
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        let alex = *session.participant(Perspective::Primary).id();
        offer_coins(&mut session, &mut goods, Perspective::Primary, 40);
        session.toggle_ready(Perspective::Primary, &goods).unwrap();
        session.toggle_ready(Perspective::Secondary, &goods).unwrap();

        // spent elsewhere during the countdown
        goods.set_balance(&alex, coins(), 5);
        session.tick(Duration::from_secs(3), &mut Effects::new(&mut goods, &mut audit));

        assert_eq!(session.state(), SessionState::AwaitingReady);
        assert_eq!(session.ready(), PerSide::new(false, false));
        assert_eq!(goods.balance(&alex, &coins()), 5);
        assert!(audit.entries.is_empty());
        assert!(session.drain_events().contains(&SessionEvent::ValidationFailed {
            reason: AbortReason::InsufficientFunds
        }));
    }

    #[test]
    fn test_replica_withdraws_ready_when_offer_is_spent() {
        let mut session = Session::new(
            SessionId::new(),
            &LayoutTemplate::standard(),
            PerSide::new(
                Participant::remote(PlayerIdentity::named("Alex")),
                Participant::local(PlayerIdentity::named("Blake")),
            ),
            false,
            TradeSettings::default(),
        );
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        let blake = *session.participant(Perspective::Secondary).id();
        offer_coins(&mut session, &mut goods, Perspective::Secondary, 30);
        session.toggle_ready(Perspective::Secondary, &goods).unwrap();
        session
            .apply_remote(
                Replication::ReadyChanged {
                    perspective: Perspective::Primary,
                    ready: true,
                },
                &mut Effects::new(&mut goods, &mut audit),
            )
            .unwrap();
        assert_eq!(session.state(), SessionState::BothReady);
        session.drain_outbox();
        session.drain_events();

        goods.set_balance(&blake, coins(), 0);
        session.tick(Duration::from_millis(50), &mut Effects::new(&mut goods, &mut audit));

        assert_eq!(session.state(), SessionState::AwaitingReady);
        assert_eq!(session.ready(), PerSide::new(true, false));
        assert_eq!(
            session.drain_outbox(),
            vec![Replication::ReadyChanged {
                perspective: Perspective::Secondary,
                ready: false
            }]
        );
        assert!(session.drain_events().contains(&SessionEvent::ValidationFailed {
            reason: AbortReason::InsufficientFunds
        }));
    }

    #[test]
    fn test_covered_offer_keeps_ready_across_ticks() {
        let mut session = local_session();
        let mut goods = InMemoryGoods::new();
        let mut audit = MemoryAudit::new();
        offer_coins(&mut session, &mut goods, Perspective::Primary, 10);
        session.toggle_ready(Perspective::Primary, &goods).unwrap();

        session.tick(Duration::from_secs(1), &mut Effects::new(&mut goods, &mut audit));
        assert!(session.is_ready(Perspective::Primary));
        assert_eq!(session.state(), SessionState::AwaitingReady);
    }

    #[test]
    fn test_cancel_is_idempotent_and_final() {
        let mut session = local_session();
        assert!(session.cancel(CancelReason::Requested {
            by: Some(Perspective::Secondary)
        }));
        assert!(!session.cancel(CancelReason::Shutdown));
        assert_eq!(session.state(), SessionState::Cancelled);

        let err = session
            .update_icon(Perspective::Primary, 0, Box::new(ItemSlotIcon::new()))
            .unwrap_err();
        assert_eq!(err.error_code(), "SESSION_TERMINATED");
        let cancellations = session
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Cancelled { .. }))
            .count();
        assert_eq!(cancellations, 1);
    }

    #[test]
    fn test_remote_side_cannot_be_driven_locally() {
        let mut session = Session::new(
            SessionId::new(),
            &LayoutTemplate::standard(),
            PerSide::new(
                Participant::local(PlayerIdentity::named("Alex")),
                Participant::remote(PlayerIdentity::named("Blake")),
            ),
            true,
            TradeSettings::default(),
        );
        let err = session
            .update_icon(Perspective::Secondary, 0, Box::new(ItemSlotIcon::new()))
            .unwrap_err();
        assert_eq!(err.error_code(), "NOT_LOCAL");
    }

    #[test]
    fn test_proxy_mutation_is_replicated() {
        let mut session = Session::new(
            SessionId::new(),
            &LayoutTemplate::standard(),
            PerSide::new(
                Participant::local(PlayerIdentity::named("Alex")),
                Participant::remote(PlayerIdentity::named("Blake")),
            ),
            true,
            TradeSettings::default(),
        );
        session
            .update_icon(Perspective::Primary, 5, Box::new(crate::icon::ExperienceIcon::with_levels(3)))
            .unwrap();
        let outbox = session.drain_outbox();
        assert_eq!(outbox.len(), 1);
        assert!(matches!(
            &outbox[0],
            Replication::IconChanged { perspective: Perspective::Primary, slot: 5, bytes } if bytes == &vec![0, 0, 0, 3]
        ));
    }

    #[test]
    fn test_snapshot_install_round_trip() {
        let mut session = local_session();
        session
            .update_icon(Perspective::Secondary, 1, Box::new(ItemSlotIcon::holding(ItemStack::new("apple", 9))))
            .unwrap();
        let snapshot = session.snapshot().unwrap();

        let mut other = local_session();
        other.install(&snapshot).unwrap();
        assert_eq!(
            other.render(Perspective::Secondary, 1, Perspective::Primary).unwrap(),
            Visual::Item(ItemStack::new("apple", 9))
        );
    }

    #[test]
    fn test_bad_snapshot_installs_nothing() {
        let mut session = local_session();
        let mut snapshot = session.snapshot().unwrap();
        snapshot[Perspective::Primary][4].1 = vec![0, 0, 0, 0, 0, 0, 0, 9];
        snapshot[Perspective::Secondary][0].1 = vec![7];

        assert!(session.install(&snapshot).unwrap_err().is_desync());
        assert!(session.layout(Perspective::Primary).is_empty());
    }
}
