//! Error types for tradelink
//!
//! Errors stay contained to the owning session or request; none of them is
//! a reason to stop the process.

use thiserror::Error;

use crate::finish::AbortReason;

/// Result type for tradelink operations
pub type Result<T> = std::result::Result<T, TradeError>;

/// tradelink error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    // ========================================================================
    // Participation Errors
    // ========================================================================

    /// Player is not part of the session
    #[error("Player {player} is not a participant of this trade")]
    NotAParticipant { player: String },

    /// Identical or reverse request is already pending
    #[error("A trade request between {sender} and {receiver} is already pending")]
    AlreadyPending { sender: String, receiver: String },

    /// Player already has an active session
    #[error("Player {player} is already trading")]
    AlreadyTrading { player: String },

    /// Sender and receiver are the same player
    #[error("Players cannot trade with themselves")]
    SelfTrade,

    /// Receiver turned off incoming requests
    #[error("Player {player} does not accept trade requests")]
    RequestsDisabled { player: String },

    /// Neither side of a request is hosted by this process
    #[error("Neither participant is connected to this server")]
    NoLocalParticipant,

    /// Action needs a player hosted by this process
    #[error("Player {player} is not connected to this server")]
    NotLocal { player: String },

    // ========================================================================
    // Lookup Errors
    // ========================================================================

    /// Request not found (accepted, declined or expired)
    #[error("Trade request {request_id} not found")]
    RequestNotFound { request_id: String },

    /// Session not found
    #[error("Trade session {session_id} not found")]
    SessionNotFound { session_id: String },

    /// Layout template not registered
    #[error("Layout {name} is not registered")]
    UnknownLayout { name: String },

    /// Slot index outside the layout
    #[error("Slot {slot} is not part of the layout")]
    SlotOutOfRange { slot: usize },

    /// Replacement icon has a different kind than the slot
    #[error("Slot {slot} holds a {expected} icon, got {actual}")]
    IconKindMismatch {
        slot: usize,
        expected: String,
        actual: String,
    },

    // ========================================================================
    // Session Lifecycle Errors
    // ========================================================================

    /// Session already completed or cancelled
    #[error("Trade session {session_id} has already ended")]
    SessionTerminated { session_id: String },

    /// Commit in progress, mutations are no longer accepted
    #[error("Trade session {session_id} is committing")]
    SessionFrozen { session_id: String },

    /// Readiness refused because nothing is on offer
    #[error("Nothing has been offered yet")]
    NothingOffered,

    /// Pre-commit validation failed
    #[error("Trade validation failed: {reason}")]
    ValidationFailed { reason: AbortReason },

    /// Remote participant left
    #[error("Player {player} disconnected")]
    RemoteDisconnected { player: String },

    // ========================================================================
    // Protocol Errors
    // ========================================================================

    /// Out-of-order, duplicate or unreconcilable replicated event
    #[error("Protocol desync in session {session_id}: {detail}")]
    ProtocolDesync { session_id: String, detail: String },

    /// Malformed bytes on decode
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl TradeError {
    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a protocol desync error
    pub fn desync(session_id: impl ToString, detail: impl Into<String>) -> Self {
        Self::ProtocolDesync {
            session_id: session_id.to_string(),
            detail: detail.into(),
        }
    }

    /// Errors that are handled as protocol desync: log, drop the event
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            Self::ProtocolDesync { .. } | Self::Serialization { .. }
        )
    }

    /// Get an error code for notifications and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotAParticipant { .. } => "NOT_A_PARTICIPANT",
            Self::AlreadyPending { .. } => "ALREADY_PENDING",
            Self::AlreadyTrading { .. } => "ALREADY_TRADING",
            Self::SelfTrade => "SELF_TRADE",
            Self::RequestsDisabled { .. } => "REQUESTS_DISABLED",
            Self::NoLocalParticipant => "NO_LOCAL_PARTICIPANT",
            Self::NotLocal { .. } => "NOT_LOCAL",
            Self::RequestNotFound { .. } => "REQUEST_NOT_FOUND",
            Self::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            Self::UnknownLayout { .. } => "UNKNOWN_LAYOUT",
            Self::SlotOutOfRange { .. } => "SLOT_OUT_OF_RANGE",
            Self::IconKindMismatch { .. } => "ICON_KIND_MISMATCH",
            Self::SessionTerminated { .. } => "SESSION_TERMINATED",
            Self::SessionFrozen { .. } => "SESSION_FROZEN",
            Self::NothingOffered => "NOTHING_OFFERED",
            Self::ValidationFailed { .. } => "VALIDATION_FAILED",
            Self::RemoteDisconnected { .. } => "REMOTE_DISCONNECTED",
            Self::ProtocolDesync { .. } => "PROTOCOL_DESYNC",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }
}
