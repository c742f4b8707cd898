//! tradelink Types - Canonical types for two-party player trades
//!
//! This crate contains the foundational types shared by every tradelink crate
//! with zero dependencies on other tradelink crates:
//!
//! - Identity types (PlayerId, SessionId, RequestId, ServerId)
//! - Perspectives and per-side storage
//! - Tradable goods (items, currencies, experience)
//! - Finish results and abort reasons
//! - The error taxonomy
//! - The binary wire reader/writer used by proxy packets
//!
//! # Invariants
//!
//! 1. A trade has exactly two sides; every per-side value lives in a `PerSide`
//! 2. Goods are never exchanged unless every icon passed validation
//! 3. Wire encodings are self-delimited and round-trip exactly

pub mod identity;
pub mod perspective;
pub mod goods;
pub mod finish;
pub mod wire;
pub mod error;

pub use identity::*;
pub use perspective::*;
pub use goods::*;
pub use finish::*;
pub use wire::*;
pub use error::*;

/// Version of the cross-process trade protocol
pub const PROTOCOL_VERSION: u16 = 1;
