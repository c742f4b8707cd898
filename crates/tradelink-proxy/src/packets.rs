//! Cross-process packet set
//!
//! Every field is written big-endian; strings are `u16` length-prefixed UTF-8.
//! Identities travel as the 16 uuid bytes followed by the player name.

use tradelink_core::{IconKind, Outcome, Replication, Snapshot};
use tradelink_types::{
    AbortReason, PerSide, Perspective, PlayerId, PlayerIdentity, Result, SessionId, TradeError,
    WireReader, WireWriter,
};

/// A packet body with a fixed wire id
pub trait Packet: Sized {
    const ID: u8;
    const NAME: &'static str;

    fn write(&self, out: &mut WireWriter) -> Result<()>;

    fn read(input: &mut WireReader<'_>) -> Result<Self>;
}

fn write_identity(out: &mut WireWriter, identity: &PlayerIdentity) -> Result<()> {
    out.write_uuid(identity.id.as_uuid());
    out.write_utf(&identity.name)
}

fn read_identity(input: &mut WireReader<'_>) -> Result<PlayerIdentity> {
    let id = PlayerId::from_uuid(input.read_uuid()?);
    Ok(PlayerIdentity::new(id, input.read_utf()?))
}

fn write_slot(out: &mut WireWriter, slot: usize) -> Result<()> {
    let slot = u16::try_from(slot)
        .map_err(|_| TradeError::serialization(format!("slot {} does not fit the wire", slot)))?;
    out.write_u16(slot);
    Ok(())
}

fn write_perspective(out: &mut WireWriter, perspective: Perspective) {
    out.write_u8(perspective.id() as u8);
}

fn read_perspective(input: &mut WireReader<'_>) -> Result<Perspective> {
    let id = input.read_u8()?;
    Perspective::from_id(id)
        .ok_or_else(|| TradeError::serialization(format!("unknown perspective {}", id)))
}

fn write_snapshot(out: &mut WireWriter, snapshot: &Snapshot) -> Result<()> {
    for (_, entries) in snapshot.iter() {
        let count = u16::try_from(entries.len())
            .map_err(|_| TradeError::serialization("too many slots"))?;
        out.write_u16(count);
        for (slot, bytes) in entries {
            write_slot(out, *slot)?;
            out.write_bytes(bytes)?;
        }
    }
    Ok(())
}

fn read_snapshot(input: &mut WireReader<'_>) -> Result<Snapshot> {
    let mut read_side = || -> Result<Vec<(usize, Vec<u8>)>> {
        let count = input.read_u16()?;
        (0..count)
            .map(|_| -> Result<(usize, Vec<u8>)> { Ok((input.read_u16()? as usize, input.read_bytes()?)) })
            .collect()
    };
    let primary = read_side()?;
    let secondary = read_side()?;
    Ok(PerSide::new(primary, secondary))
}

// ============================================================================
// Player quit
// ============================================================================

/// A participant disconnected or left; the receiver cancels their session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQuitPacket {
    pub player: String,
}

impl Packet for PlayerQuitPacket {
    const ID: u8 = 1;
    const NAME: &'static str = "player-quit";

    fn write(&self, out: &mut WireWriter) -> Result<()> {
        out.write_utf(&self.player)
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            player: input.read_utf()?,
        })
    }
}

// ============================================================================
// Session init
// ============================================================================

/// State of one slot in a session-init packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconState {
    pub slot: usize,
    pub kind: IconKind,
    pub bytes: Vec<u8>,
}

/// Opens the mirrored session on the remote process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInitPacket {
    pub session_id: SessionId,
    pub layout: String,
    pub participants: PerSide<PlayerIdentity>,
    pub icons: PerSide<Vec<IconState>>,
}

impl SessionInitPacket {
    /// Slot bytes without the kind tags
    pub fn snapshot(&self) -> Snapshot {
        self.icons.clone().map(|icons| {
            icons
                .into_iter()
                .map(|state| (state.slot, state.bytes))
                .collect()
        })
    }
}

impl Packet for SessionInitPacket {
    const ID: u8 = 2;
    const NAME: &'static str = "session-init";

    fn write(&self, out: &mut WireWriter) -> Result<()> {
        out.write_uuid(self.session_id.as_uuid());
        out.write_utf(&self.layout)?;
        for (_, identity) in self.participants.iter() {
            write_identity(out, identity)?;
        }
        for (_, icons) in self.icons.iter() {
            let count = u16::try_from(icons.len())
                .map_err(|_| TradeError::serialization("too many slots"))?;
            out.write_u16(count);
            for state in icons {
                write_slot(out, state.slot)?;
                out.write_u8(state.kind.tag());
                out.write_bytes(&state.bytes)?;
            }
        }
        Ok(())
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self> {
        let session_id = SessionId::from_uuid(input.read_uuid()?);
        let layout = input.read_utf()?;
        let primary = read_identity(input)?;
        let secondary = read_identity(input)?;
        let mut read_side = || -> Result<Vec<IconState>> {
            let count = input.read_u16()?;
            (0..count)
                .map(|_| -> Result<IconState> {
                    Ok(IconState {
                        slot: input.read_u16()? as usize,
                        kind: IconKind::from_tag(input.read_u8()?)?,
                        bytes: input.read_bytes()?,
                    })
                })
                .collect()
        };
        let icons = PerSide::new(read_side()?, read_side()?);
        Ok(Self {
            session_id,
            layout,
            participants: PerSide::new(primary, secondary),
            icons,
        })
    }
}

// ============================================================================
// Session delta
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Icon {
        perspective: Perspective,
        slot: usize,
        bytes: Vec<u8>,
    },
    Ready {
        perspective: Perspective,
        ready: bool,
    },
    ReadyState {
        flags: PerSide<bool>,
    },
}

impl From<Delta> for Replication {
    fn from(delta: Delta) -> Self {
        match delta {
            Delta::Icon {
                perspective,
                slot,
                bytes,
            } => Replication::IconChanged {
                perspective,
                slot,
                bytes,
            },
            Delta::Ready { perspective, ready } => Replication::ReadyChanged { perspective, ready },
            Delta::ReadyState { flags } => Replication::ReadyState { flags },
        }
    }
}

/// One replicated change, numbered per session and direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDeltaPacket {
    pub session_id: SessionId,
    pub seq: u64,
    pub delta: Delta,
}

impl Packet for SessionDeltaPacket {
    const ID: u8 = 3;
    const NAME: &'static str = "session-delta";

    fn write(&self, out: &mut WireWriter) -> Result<()> {
        out.write_uuid(self.session_id.as_uuid());
        out.write_u64(self.seq);
        match &self.delta {
            Delta::Icon {
                perspective,
                slot,
                bytes,
            } => {
                out.write_u8(0);
                write_perspective(out, *perspective);
                write_slot(out, *slot)?;
                out.write_bytes(bytes)?;
            }
            Delta::Ready { perspective, ready } => {
                out.write_u8(1);
                write_perspective(out, *perspective);
                out.write_bool(*ready);
            }
            Delta::ReadyState { flags } => {
                out.write_u8(2);
                out.write_bool(flags[Perspective::Primary]);
                out.write_bool(flags[Perspective::Secondary]);
            }
        }
        Ok(())
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self> {
        let session_id = SessionId::from_uuid(input.read_uuid()?);
        let seq = input.read_u64()?;
        let delta = match input.read_u8()? {
            0 => Delta::Icon {
                perspective: read_perspective(input)?,
                slot: input.read_u16()? as usize,
                bytes: input.read_bytes()?,
            },
            1 => Delta::Ready {
                perspective: read_perspective(input)?,
                ready: input.read_bool()?,
            },
            2 => Delta::ReadyState {
                flags: PerSide::new(input.read_bool()?, input.read_bool()?),
            },
            other => {
                return Err(TradeError::serialization(format!(
                    "unknown delta kind {}",
                    other
                )))
            }
        };
        Ok(Self {
            session_id,
            seq,
            delta,
        })
    }
}

// ============================================================================
// Session outcome
// ============================================================================

/// Result of the commit on the initiation server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcomePacket {
    pub session_id: SessionId,
    pub seq: u64,
    pub outcome: Outcome,
}

impl Packet for SessionOutcomePacket {
    const ID: u8 = 4;
    const NAME: &'static str = "session-outcome";

    fn write(&self, out: &mut WireWriter) -> Result<()> {
        out.write_uuid(self.session_id.as_uuid());
        out.write_u64(self.seq);
        match &self.outcome {
            Outcome::Commit { snapshot } => {
                out.write_u8(0);
                write_snapshot(out, snapshot)
            }
            Outcome::Abort(reason) => {
                out.write_u8(1);
                reason.write_to(out)
            }
        }
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self> {
        let session_id = SessionId::from_uuid(input.read_uuid()?);
        let seq = input.read_u64()?;
        let outcome = match input.read_u8()? {
            0 => Outcome::Commit {
                snapshot: read_snapshot(input)?,
            },
            1 => Outcome::Abort(AbortReason::read_from(input)?),
            other => {
                return Err(TradeError::serialization(format!(
                    "unknown outcome {}",
                    other
                )))
            }
        };
        Ok(Self {
            session_id,
            seq,
            outcome,
        })
    }
}

// ============================================================================
// Cross-server invitations
// ============================================================================

/// Mirrors a request on the receiver's server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRequestPacket {
    pub sender: PlayerIdentity,
    pub receiver: PlayerIdentity,
}

impl Packet for TradeRequestPacket {
    const ID: u8 = 5;
    const NAME: &'static str = "trade-request";

    fn write(&self, out: &mut WireWriter) -> Result<()> {
        write_identity(out, &self.sender)?;
        write_identity(out, &self.receiver)
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            sender: read_identity(input)?,
            receiver: read_identity(input)?,
        })
    }
}

/// The receiver's answer, sent back to the sender's server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeAnswerPacket {
    pub sender: PlayerIdentity,
    pub receiver: PlayerIdentity,
    pub accepted: bool,
}

impl Packet for TradeAnswerPacket {
    const ID: u8 = 6;
    const NAME: &'static str = "trade-answer";

    fn write(&self, out: &mut WireWriter) -> Result<()> {
        write_identity(out, &self.sender)?;
        write_identity(out, &self.receiver)?;
        out.write_bool(self.accepted);
        Ok(())
    }

    fn read(input: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            sender: read_identity(input)?,
            receiver: read_identity(input)?,
            accepted: input.read_bool()?,
        })
    }
}
