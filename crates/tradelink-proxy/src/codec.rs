//! Packet framing
//!
//! A frame is `[protocol version: u16][packet id: u8][packet body]`. Frames
//! are handed to the transport whole; the transport does its own delimiting.

use tradelink_types::{Result, TradeError, WireReader, WireWriter, PROTOCOL_VERSION};

use crate::packets::{
    Packet, PlayerQuitPacket, SessionDeltaPacket, SessionInitPacket, SessionOutcomePacket,
    TradeAnswerPacket, TradeRequestPacket,
};

/// Any packet the proxy link carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyPacket {
    Quit(PlayerQuitPacket),
    Init(SessionInitPacket),
    Delta(SessionDeltaPacket),
    Outcome(SessionOutcomePacket),
    Request(TradeRequestPacket),
    Answer(TradeAnswerPacket),
}

impl ProxyPacket {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Quit(_) => PlayerQuitPacket::NAME,
            Self::Init(_) => SessionInitPacket::NAME,
            Self::Delta(_) => SessionDeltaPacket::NAME,
            Self::Outcome(_) => SessionOutcomePacket::NAME,
            Self::Request(_) => TradeRequestPacket::NAME,
            Self::Answer(_) => TradeAnswerPacket::NAME,
        }
    }
}

fn frame<P: Packet>(packet: &P) -> Result<Vec<u8>> {
    let mut out = WireWriter::new();
    out.write_u16(PROTOCOL_VERSION);
    out.write_u8(P::ID);
    packet.write(&mut out)?;
    Ok(out.into_bytes())
}

pub fn encode(packet: &ProxyPacket) -> Result<Vec<u8>> {
    match packet {
        ProxyPacket::Quit(p) => frame(p),
        ProxyPacket::Init(p) => frame(p),
        ProxyPacket::Delta(p) => frame(p),
        ProxyPacket::Outcome(p) => frame(p),
        ProxyPacket::Request(p) => frame(p),
        ProxyPacket::Answer(p) => frame(p),
    }
}

pub fn decode(bytes: &[u8]) -> Result<ProxyPacket> {
    let mut input = WireReader::new(bytes);
    let version = input.read_u16()?;
    if version != PROTOCOL_VERSION {
        return Err(TradeError::serialization(format!(
            "protocol version {} not supported (expected {})",
            version, PROTOCOL_VERSION
        )));
    }
    let packet = match input.read_u8()? {
        PlayerQuitPacket::ID => ProxyPacket::Quit(PlayerQuitPacket::read(&mut input)?),
        SessionInitPacket::ID => ProxyPacket::Init(SessionInitPacket::read(&mut input)?),
        SessionDeltaPacket::ID => ProxyPacket::Delta(SessionDeltaPacket::read(&mut input)?),
        SessionOutcomePacket::ID => ProxyPacket::Outcome(SessionOutcomePacket::read(&mut input)?),
        TradeRequestPacket::ID => ProxyPacket::Request(TradeRequestPacket::read(&mut input)?),
        TradeAnswerPacket::ID => ProxyPacket::Answer(TradeAnswerPacket::read(&mut input)?),
        other => {
            return Err(TradeError::serialization(format!(
                "unknown packet id {}",
                other
            )))
        }
    };
    input.expect_end()?;
    Ok(packet)
}
