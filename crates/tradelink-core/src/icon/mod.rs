//! Trade icons
//!
//! An icon is one negotiable unit of trade state occupying a layout slot.
//! Every session gets its own icon instances, one per side for each slot.
//!
//! Icons never hold a reference to their session. Every operation receives a
//! read-only `TradeView` of the session plus the perspective the icon belongs
//! to and the participant viewing it.
//!
//! # Commit contract
//!
//! `try_finish` is a dry run over every icon of both layouts. It must not
//! mutate anything. Only when every icon passed does the session call
//! `on_finish`, which performs the exchange and must not fail.

mod balance;
mod item;
mod placeholder;
mod ready;

pub use balance::{CurrencyIcon, ExperienceIcon};
pub use item::ItemSlotIcon;
pub use placeholder::{DecorationIcon, PlaceholderIcon};
pub use ready::{PartnerStatusIcon, ReadyIcon};

use serde::{Deserialize, Serialize};
use std::fmt;
use tradelink_types::{
    FinishResult, ItemStack, Participant, PerSide, Perspective, Result, SessionId, TradeError,
    WireReader, WireWriter,
};

use crate::audit::AuditSink;
use crate::goods::Goods;
use crate::session::SessionState;

/// Wire tag of each icon variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconKind {
    ItemSlot,
    Currency,
    Experience,
    Ready,
    PartnerStatus,
    Decoration,
    Placeholder,
}

impl IconKind {
    pub fn tag(self) -> u8 {
        match self {
            Self::ItemSlot => 1,
            Self::Currency => 2,
            Self::Experience => 3,
            Self::Ready => 4,
            Self::PartnerStatus => 5,
            Self::Decoration => 6,
            Self::Placeholder => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => Self::ItemSlot,
            2 => Self::Currency,
            3 => Self::Experience,
            4 => Self::Ready,
            5 => Self::PartnerStatus,
            6 => Self::Decoration,
            7 => Self::Placeholder,
            other => {
                return Err(TradeError::serialization(format!(
                    "unknown icon kind tag {}",
                    other
                )))
            }
        })
    }
}

impl fmt::Display for IconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ItemSlot => "item-slot",
            Self::Currency => "currency",
            Self::Experience => "experience",
            Self::Ready => "ready",
            Self::PartnerStatus => "partner-status",
            Self::Decoration => "decoration",
            Self::Placeholder => "placeholder",
        };
        f.write_str(name)
    }
}

/// What the rendering layer should draw in a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visual {
    /// Nothing drawn, the slot is free for input
    Empty,
    /// An item as offered
    Item(ItemStack),
    /// A labelled button or indicator
    Button {
        label: String,
        lore: Vec<String>,
        highlighted: bool,
    },
    /// Slot is structure only; the rendering layer decides what to show
    Placeholder,
}

impl Visual {
    pub fn button(label: impl Into<String>, highlighted: bool) -> Self {
        Self::Button {
            label: label.into(),
            lore: Vec::new(),
            highlighted,
        }
    }
}

/// Read-only view of the session handed to icon operations
#[derive(Debug, Clone, Copy)]
pub struct TradeView<'a> {
    pub session_id: &'a SessionId,
    pub participants: &'a PerSide<Participant>,
    pub ready: PerSide<bool>,
    pub state: SessionState,
    /// True on the process that created the session and commits it
    pub initiation_server: bool,
}

impl<'a> TradeView<'a> {
    pub fn participant(&self, perspective: Perspective) -> &'a Participant {
        let participants: &'a PerSide<Participant> = self.participants;
        &participants[perspective]
    }

    /// The other side of `perspective`
    pub fn partner(&self, perspective: Perspective) -> &'a Participant {
        self.participant(perspective.other())
    }

    /// Write an audit line in primary/secondary order
    pub fn log(&self, audit: &mut dyn AuditSink, message: &str) {
        audit.log_exchange(
            self.participants[Perspective::Primary].name(),
            self.participants[Perspective::Secondary].name(),
            message,
        );
    }
}

/// Side-effect collaborators available during `on_finish`
pub struct Effects<'a> {
    pub goods: &'a mut dyn Goods,
    pub audit: &'a mut dyn AuditSink,
}

impl<'a> Effects<'a> {
    pub fn new(goods: &'a mut dyn Goods, audit: &'a mut dyn AuditSink) -> Self {
        Self { goods, audit }
    }
}

/// One slot's worth of negotiable trade state
pub trait Icon: fmt::Debug + Send {
    fn kind(&self) -> IconKind;

    /// Pure function of the current state
    fn render(&self, view: &TradeView<'_>, perspective: Perspective, viewer: &Participant) -> Visual;

    /// Dry-run validation; must not mutate anything
    fn try_finish(
        &self,
        view: &TradeView<'_>,
        perspective: Perspective,
        viewer: &Participant,
        goods: &dyn Goods,
    ) -> FinishResult;

    /// Exchange the goods; runs once per side after every icon passed
    fn on_finish(
        &mut self,
        view: &TradeView<'_>,
        perspective: Perspective,
        viewer: &Participant,
        effects: &mut Effects<'_>,
    );

    /// True if the icon carries nothing beyond its defaults
    fn is_empty(&self) -> bool;

    fn serialize(&self, out: &mut WireWriter) -> Result<()>;

    fn deserialize(&mut self, input: &mut WireReader<'_>) -> Result<()>;

    fn clone_icon(&self) -> Box<dyn Icon>;
}

impl Clone for Box<dyn Icon> {
    fn clone(&self) -> Self {
        self.clone_icon()
    }
}

/// Serialize an icon into a standalone byte vector
pub fn icon_bytes(icon: &dyn Icon) -> Result<Vec<u8>> {
    let mut out = WireWriter::new();
    icon.serialize(&mut out)?;
    Ok(out.into_bytes())
}

/// Decode `bytes` into a copy of `template`.
///
/// The template itself is left untouched, so a malformed payload never
/// leaves a half-written icon behind. Trailing bytes are an error.
pub fn decode_icon(template: &dyn Icon, bytes: &[u8]) -> Result<Box<dyn Icon>> {
    let mut icon = template.clone_icon();
    let mut input = WireReader::new(bytes);
    icon.deserialize(&mut input)?;
    input.expect_end()?;
    Ok(icon)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tradelink_types::PlayerIdentity;

    pub struct Fixture {
        pub id: SessionId,
        pub participants: PerSide<Participant>,
    }

    impl Fixture {
        pub fn local() -> Self {
            Self {
                id: SessionId::new(),
                participants: PerSide::new(
                    Participant::local(PlayerIdentity::named("Alex")),
                    Participant::local(PlayerIdentity::named("Blake")),
                ),
            }
        }

        pub fn with_remote_secondary() -> Self {
            Self {
                id: SessionId::new(),
                participants: PerSide::new(
                    Participant::local(PlayerIdentity::named("Alex")),
                    Participant::remote(PlayerIdentity::named("Blake")),
                ),
            }
        }

        pub fn view(&self) -> TradeView<'_> {
            TradeView {
                session_id: &self.id,
                participants: &self.participants,
                ready: PerSide::new(false, false),
                state: SessionState::AwaitingReady,
                initiation_server: true,
            }
        }
    }

    /// Round-trip an icon and check it behaves the same afterwards
    pub fn assert_round_trip(icon: &dyn Icon, blank: &dyn Icon) {
        let fixture = Fixture::local();
        let view = fixture.view();
        let viewer = view.participant(Perspective::Primary);
        let bytes = icon_bytes(icon).unwrap();
        let copy = decode_icon(blank, &bytes).unwrap();
        assert_eq!(copy.kind(), icon.kind());
        assert_eq!(copy.is_empty(), icon.is_empty());
        assert_eq!(
            copy.render(&view, Perspective::Primary, viewer),
            icon.render(&view, Perspective::Primary, viewer)
        );
        let goods = crate::goods::InMemoryGoods::new();
        assert_eq!(
            copy.try_finish(&view, Perspective::Primary, viewer, &goods),
            icon.try_finish(&view, Perspective::Primary, viewer, &goods)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [
            IconKind::ItemSlot,
            IconKind::Currency,
            IconKind::Experience,
            IconKind::Ready,
            IconKind::PartnerStatus,
            IconKind::Decoration,
            IconKind::Placeholder,
        ] {
            assert_eq!(IconKind::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(IconKind::from_tag(0).is_err());
    }

    #[test]
    fn test_decode_leaves_template_untouched_on_error() {
        let template = CurrencyIcon::new("coins").with_amount(7);
        assert!(decode_icon(&template, &[1, 2]).is_err());
        assert_eq!(template.amount(), 7);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let template = PlaceholderIcon;
        assert!(decode_icon(&template, &[0]).is_err());
    }
}
