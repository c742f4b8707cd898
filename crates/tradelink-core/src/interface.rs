//! Rendering seam
//!
//! The inventory GUI lives in the game server. The core only tells it what
//! to draw and what to say, and only for players hosted by this process.

use serde::{Deserialize, Serialize};
use tracing::info;
use tradelink_types::{AbortReason, PlayerHandle, Perspective, SessionId};

use crate::events::{CancelReason, SessionEvent};
use crate::icon::{IconKind, Visual};
use crate::session::Session;

/// Message shown to a single player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    RequestSent { to: String },
    RequestReceived { from: String },
    RequestDeclined { by: String },
    RequestExpired { partner: String },
    ReadyChanged { player: String, ready: bool },
    CountdownStarted { seconds: u64 },
    Countdown { remaining_secs: u64 },
    CountdownAborted,
    ValidationFailed { reason: AbortReason },
    Warning { message: String },
    Completed,
    Cancelled { reason: CancelReason },
    Error { code: String, message: String },
}

/// External rendering layer
pub trait TradeInterface {
    /// Show the trade window to `viewer`
    fn open(&mut self, viewer: &PlayerHandle, session: &Session, perspective: Perspective);

    fn notify_slot_changed(
        &mut self,
        viewer: &PlayerHandle,
        session_id: &SessionId,
        perspective: Perspective,
        slot: usize,
        visual: &Visual,
    );

    fn notify(&mut self, viewer: &PlayerHandle, notice: Notice);

    fn close(&mut self, viewer: &PlayerHandle, session_id: &SessionId);
}

/// Forward drained session events to every locally hosted viewer
pub fn deliver_events(interface: &mut dyn TradeInterface, session: &Session, events: &[SessionEvent]) {
    let viewers: Vec<(Perspective, &PlayerHandle)> = session
        .participants()
        .iter()
        .filter_map(|(perspective, p)| p.handle.as_ref().map(|h| (perspective, h)))
        .collect();

    for event in events {
        match event {
            SessionEvent::SlotChanged { perspective, slot } => {
                for (viewer, handle) in &viewers {
                    if let Ok(visual) = session.render(*perspective, *slot, *viewer) {
                        interface.notify_slot_changed(handle, session.id(), *perspective, *slot, &visual);
                    }
                }
            }
            SessionEvent::ReadyChanged { perspective, ready } => {
                // ready flags drive the status icons on both layouts
                for (viewer, handle) in &viewers {
                    for side in Perspective::ALL {
                        for (slot, icon) in session.layout(side).slots() {
                            if matches!(icon.kind(), IconKind::Ready | IconKind::PartnerStatus) {
                                let visual = icon.render(&session.view(), side, session.participant(*viewer));
                                interface.notify_slot_changed(handle, session.id(), side, slot, &visual);
                            }
                        }
                    }
                    interface.notify(
                        handle,
                        Notice::ReadyChanged {
                            player: session.participant(*perspective).name().to_string(),
                            ready: *ready,
                        },
                    );
                }
            }
            SessionEvent::Warning { perspective, notice } => {
                for (viewer, handle) in &viewers {
                    if viewer == perspective {
                        interface.notify(handle, Notice::Warning { message: notice.clone() });
                    }
                }
            }
            SessionEvent::Completed | SessionEvent::Cancelled { .. } => {
                let notice = match event {
                    SessionEvent::Cancelled { reason } => Notice::Cancelled {
                        reason: reason.clone(),
                    },
                    _ => Notice::Completed,
                };
                for (_, handle) in &viewers {
                    interface.notify(handle, notice.clone());
                    interface.close(handle, session.id());
                }
            }
            other => {
                let notice = match other {
                    SessionEvent::CountdownStarted { seconds } => Notice::CountdownStarted { seconds: *seconds },
                    SessionEvent::CountdownTick { remaining_secs } => Notice::Countdown {
                        remaining_secs: *remaining_secs,
                    },
                    SessionEvent::CountdownAborted => Notice::CountdownAborted,
                    SessionEvent::ValidationFailed { reason } => Notice::ValidationFailed {
                        reason: reason.clone(),
                    },
                    _ => continue,
                };
                for (_, handle) in &viewers {
                    interface.notify(handle, notice.clone());
                }
            }
        }
    }
}

/// A call made on a `RecordingInterface`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceCall {
    Opened {
        player: String,
        session_id: SessionId,
        perspective: Perspective,
    },
    SlotChanged {
        player: String,
        perspective: Perspective,
        slot: usize,
        visual: Visual,
    },
    Notice {
        player: String,
        notice: Notice,
    },
    Closed {
        player: String,
        session_id: SessionId,
    },
}

/// Records every call, for tests and scripted runs
#[derive(Debug, Default, Clone)]
pub struct RecordingInterface {
    pub calls: Vec<InterfaceCall>,
}

impl RecordingInterface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices_for(&self, player: &str) -> Vec<&Notice> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                InterfaceCall::Notice { player: p, notice } if p == player => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl TradeInterface for RecordingInterface {
    fn open(&mut self, viewer: &PlayerHandle, session: &Session, perspective: Perspective) {
        self.calls.push(InterfaceCall::Opened {
            player: viewer.name().to_string(),
            session_id: *session.id(),
            perspective,
        });
    }

    fn notify_slot_changed(
        &mut self,
        viewer: &PlayerHandle,
        _session_id: &SessionId,
        perspective: Perspective,
        slot: usize,
        visual: &Visual,
    ) {
        self.calls.push(InterfaceCall::SlotChanged {
            player: viewer.name().to_string(),
            perspective,
            slot,
            visual: visual.clone(),
        });
    }

    fn notify(&mut self, viewer: &PlayerHandle, notice: Notice) {
        self.calls.push(InterfaceCall::Notice {
            player: viewer.name().to_string(),
            notice,
        });
    }

    fn close(&mut self, viewer: &PlayerHandle, session_id: &SessionId) {
        self.calls.push(InterfaceCall::Closed {
            player: viewer.name().to_string(),
            session_id: *session_id,
        });
    }
}

/// Logs notices instead of drawing anything
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInterface;

impl TradeInterface for TracingInterface {
    fn open(&mut self, viewer: &PlayerHandle, session: &Session, perspective: Perspective) {
        info!(player = viewer.name(), session = %session.id(), %perspective, "trade window opened");
    }

    fn notify_slot_changed(
        &mut self,
        _viewer: &PlayerHandle,
        _session_id: &SessionId,
        _perspective: Perspective,
        _slot: usize,
        _visual: &Visual,
    ) {
    }

    fn notify(&mut self, viewer: &PlayerHandle, notice: Notice) {
        info!(player = viewer.name(), "{:?}", notice);
    }

    fn close(&mut self, viewer: &PlayerHandle, session_id: &SessionId) {
        info!(player = viewer.name(), session = %session_id, "trade window closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goods::InMemoryGoods;
    use crate::icon::ItemSlotIcon;
    use crate::layout::LayoutTemplate;
    use crate::settings::TradeSettings;
    use tradelink_types::{ItemStack, Participant, PerSide, PlayerIdentity};

    fn session(secondary_local: bool) -> Session {
        let blake = PlayerIdentity::named("Blake");
        Session::new(
            SessionId::new(),
            &LayoutTemplate::standard(),
            PerSide::new(
                Participant::local(PlayerIdentity::named("Alex")),
                match secondary_local {
                    true => Participant::local(blake),
                    false => Participant::remote(blake),
                },
            ),
            true,
            TradeSettings::default(),
        )
    }

    #[test]
    fn test_slot_change_reaches_both_local_viewers() {
        let mut session = session(true);
        session
            .update_icon(Perspective::Primary, 0, Box::new(ItemSlotIcon::holding(ItemStack::new("apple", 1))))
            .unwrap();
        let events = session.drain_events();
        let mut ui = RecordingInterface::new();
        deliver_events(&mut ui, &session, &events);

        let viewers: Vec<&str> = ui
            .calls
            .iter()
            .filter_map(|c| match c {
                InterfaceCall::SlotChanged { player, slot: 0, .. } => Some(player.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(viewers, vec!["Alex", "Blake"]);
    }

    #[test]
    fn test_remote_viewer_is_skipped() {
        let mut session = session(false);
        let mut goods = InMemoryGoods::new();
        goods.add_items(session.participant(Perspective::Primary).id(), ItemStack::new("apple", 1));
        session
            .update_icon(Perspective::Primary, 0, Box::new(ItemSlotIcon::holding(ItemStack::new("apple", 1))))
            .unwrap();
        session.toggle_ready(Perspective::Primary, &goods).unwrap();

        let events = session.drain_events();
        let mut ui = RecordingInterface::new();
        deliver_events(&mut ui, &session, &events);
        assert!(ui.notices_for("Blake").is_empty());
        assert_eq!(
            ui.notices_for("Alex"),
            vec![&Notice::ReadyChanged {
                player: "Alex".to_string(),
                ready: true
            }]
        );
    }
}
