//! Results of the pre-commit validation pass

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TradeError};
use crate::wire::{WireReader, WireWriter};

/// Why a commit attempt was aborted
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbortReason {
    /// A player offered more currency or levels than they hold
    InsufficientFunds,
    /// A player no longer holds an item they offered
    MissingItem,
    /// Neither player offered anything
    NothingOffered,
    /// Icon-specific rejection
    Rejected(String),
}

impl AbortReason {
    /// Stable wire code
    pub fn code(&self) -> u8 {
        match self {
            Self::InsufficientFunds => 1,
            Self::MissingItem => 2,
            Self::NothingOffered => 3,
            Self::Rejected(_) => 4,
        }
    }

    pub fn write_to(&self, out: &mut WireWriter) -> Result<()> {
        out.write_u8(self.code());
        if let Self::Rejected(detail) = self {
            out.write_utf(detail)?;
        }
        Ok(())
    }

    pub fn read_from(input: &mut WireReader<'_>) -> Result<Self> {
        match input.read_u8()? {
            1 => Ok(Self::InsufficientFunds),
            2 => Ok(Self::MissingItem),
            3 => Ok(Self::NothingOffered),
            4 => Ok(Self::Rejected(input.read_utf()?)),
            other => Err(TradeError::serialization(format!(
                "unknown abort reason code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds => f.write_str("insufficient funds"),
            Self::MissingItem => f.write_str("an offered item is missing"),
            Self::NothingOffered => f.write_str("nothing was offered"),
            Self::Rejected(detail) => f.write_str(detail),
        }
    }
}

/// Outcome of `Icon::try_finish`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishResult {
    /// Nothing to report
    Pass,
    /// Non-blocking; the notice is shown to the viewer after the exchange
    Warn(String),
    /// Blocking; the whole commit aborts
    Block(AbortReason),
}

impl FinishResult {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Block(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_are_distinct() {
        let reasons = [
            AbortReason::InsufficientFunds,
            AbortReason::MissingItem,
            AbortReason::NothingOffered,
            AbortReason::Rejected("x".into()),
        ];
        let mut codes: Vec<u8> = reasons.iter().map(|r| r.code()).collect();
        codes.dedup();
        assert_eq!(codes.len(), reasons.len());
    }

    #[test]
    fn test_rejected_reason_carries_detail() {
        let reason = AbortReason::Rejected("region is protected".into());
        let mut out = WireWriter::new();
        reason.write_to(&mut out).unwrap();
        let bytes = out.into_bytes();
        assert_eq!(AbortReason::read_from(&mut WireReader::new(&bytes)).unwrap(), reason);
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!(AbortReason::read_from(&mut WireReader::new(&[99])).is_err());
    }

    #[test]
    fn test_only_block_is_blocking() {
        assert!(!FinishResult::Pass.is_blocking());
        assert!(!FinishResult::Warn("dropped".into()).is_blocking());
        assert!(FinishResult::Block(AbortReason::MissingItem).is_blocking());
    }
}
