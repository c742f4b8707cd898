//! Tradable goods
//!
//! Items are carried with just enough detail to move them between players;
//! full item-stack formats belong to the game server.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TradeError};
use crate::wire::{WireReader, WireWriter};

/// A stack of identical items
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Material key, e.g. `diamond`
    pub material: String,
    /// Stack size, at least 1
    pub amount: u16,
    /// Optional custom name
    pub display_name: Option<String>,
}

impl ItemStack {
    pub fn new(material: impl Into<String>, amount: u16) -> Self {
        Self {
            material: material.into(),
            amount,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Two stacks describe the same kind of item
    pub fn is_similar(&self, other: &ItemStack) -> bool {
        self.material == other.material && self.display_name == other.display_name
    }

    pub fn write_to(&self, out: &mut WireWriter) -> Result<()> {
        out.write_utf(&self.material)?;
        out.write_u16(self.amount);
        out.write_optional_utf(self.display_name.as_deref())
    }

    pub fn read_from(input: &mut WireReader<'_>) -> Result<Self> {
        let material = input.read_utf()?;
        let amount = input.read_u16()?;
        if amount == 0 {
            return Err(TradeError::serialization("item stack with zero amount"));
        }
        let display_name = input.read_optional_utf()?;
        Ok(Self {
            material,
            amount,
            display_name,
        })
    }
}

impl fmt::Display for ItemStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.display_name {
            Some(name) => write!(f, "{}x {} ({})", self.amount, name, self.material),
            None => write!(f, "{}x {}", self.amount, self.material),
        }
    }
}

/// Countable balances a player can put into a trade
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Economy currency by name, amounts in minor units
    Currency(String),
    /// Experience levels
    ExperienceLevels,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency(name) => f.write_str(name),
            Self::ExperienceLevels => f.write_str("levels"),
        }
    }
}
