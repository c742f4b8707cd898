//! Identity types for tradelink
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(PlayerId, "player", "Stable unique identifier of a player across all servers");
define_id_type!(SessionId, "session", "Unique identifier for a trade session");
define_id_type!(RequestId, "request", "Unique identifier for a pending trade request");

/// Name of a backend process behind the proxy
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerId(pub String);

impl ServerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name plus stable id of a trading player
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerIdentity {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerIdentity {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Identity with a fresh random id, mostly useful in tests and demos
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(PlayerId::new(), name)
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Handle to a player connected to the current process.
///
/// Only the process hosting the player can create one. Holders must not keep
/// it beyond the trade they were handed it for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerHandle {
    identity: PlayerIdentity,
}

impl PlayerHandle {
    pub fn new(identity: PlayerIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &PlayerIdentity {
        &self.identity
    }

    pub fn id(&self) -> &PlayerId {
        &self.identity.id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }
}

/// One side of a trade as seen by the current process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub identity: PlayerIdentity,
    /// `None` when the player is hosted by another process
    pub handle: Option<PlayerHandle>,
}

impl Participant {
    /// A participant connected to this process
    pub fn local(identity: PlayerIdentity) -> Self {
        Self {
            handle: Some(PlayerHandle::new(identity.clone())),
            identity,
        }
    }

    /// A participant hosted by another process
    pub fn remote(identity: PlayerIdentity) -> Self {
        Self {
            identity,
            handle: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.handle.is_some()
    }

    pub fn id(&self) -> &PlayerId {
        &self.identity.id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }
}
