//! tradelink Core - the two-party trade protocol within one process
//!
//! - `icon`: negotiable units of trade state and their wire encoding
//! - `layout`: slot templates and per-side layouts
//! - `session`: the trade state machine and commit protocol
//! - `request`: invitations and their expiry
//! - `registry`: sessions hosted by the process, one active per player
//! - `goods`, `audit`, `interface`: collaborator seams with in-memory versions
//!
//! # Commit guarantees
//!
//! 1. `try_finish` runs on every icon of both layouts before any `on_finish`
//! 2. A blocking result clears both ready flags and exchanges nothing
//! 3. Only the initiation server counts down and commits; replicas follow

pub mod audit;
pub mod events;
pub mod goods;
pub mod icon;
pub mod interface;
pub mod layout;
pub mod registry;
pub mod request;
pub mod session;
pub mod settings;

pub use audit::{AuditEntry, AuditSink, MemoryAudit, TracingAudit};
pub use events::{CancelReason, Outcome, Replication, SessionEvent};
pub use goods::{Goods, Holdings, InMemoryGoods, MAX_STACK};
pub use icon::{
    decode_icon, icon_bytes, CurrencyIcon, DecorationIcon, Effects, ExperienceIcon, Icon, IconKind,
    ItemSlotIcon, PartnerStatusIcon, PlaceholderIcon, ReadyIcon, TradeView, Visual,
};
pub use interface::{
    deliver_events, InterfaceCall, Notice, RecordingInterface, TradeInterface, TracingInterface,
};
pub use layout::{IconSpec, Layout, LayoutCatalog, LayoutTemplate, STANDARD_LAYOUT};
pub use registry::SessionRegistry;
pub use request::{RequestExpired, RequestManager, TradeRequest};
pub use session::{Session, SessionState, Snapshot};
pub use settings::TradeSettings;
