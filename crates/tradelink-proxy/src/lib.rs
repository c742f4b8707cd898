//! tradelink Proxy - trades between players on different backend processes
//!
//! Two processes behind the same proxy replicate a session over the proxy's
//! messaging channel. The process that hosts the inviting player owns the
//! session: it counts down, validates and decides the outcome. The other
//! process keeps a replica in step.
//!
//! - `packets`: the packet set and its binary encoding
//! - `codec`: framing with protocol version and packet id
//! - `synchronizer`: per-session sequence numbers and duplicate suppression
//! - `transport`: the link seam plus in-memory links for tests and simulations
//! - `server`: the trade service of one process, wiring all of the above
//!
//! # Delivery
//!
//! The link delivers in order and at least once. Every delta and outcome
//! carries a sequence number; anything not newer than the last applied one
//! is dropped with a warning. Quit notifications are not numbered.

pub mod codec;
pub mod packets;
pub mod server;
pub mod synchronizer;
pub mod transport;

pub use codec::{decode, encode, ProxyPacket};
pub use packets::{
    Delta, IconState, Packet, PlayerQuitPacket, SessionDeltaPacket, SessionInitPacket,
    SessionOutcomePacket, TradeAnswerPacket, TradeRequestPacket,
};
pub use server::TradeServer;
pub use synchronizer::ProxySynchronizer;
pub use transport::{Outbox, PacketTransport, SimulatedLink};
