//! Exchange audit trail
//!
//! Every good that leaves a locally hosted player is written to the audit
//! sink as `(initiator, counterpart, message)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// External audit log
pub trait AuditSink {
    fn log_exchange(&mut self, initiator: &str, counterpart: &str, message: &str);
}

/// Writes audit lines to the `tradelink::audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn log_exchange(&mut self, initiator: &str, counterpart: &str, message: &str) {
        info!(target: "tradelink::audit", initiator, counterpart, "{}", message);
    }
}

/// A single audit line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub initiator: String,
    pub counterpart: String,
    pub message: String,
}

/// Keeps audit lines in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryAudit {
    pub entries: Vec<AuditEntry>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }
}

impl AuditSink for MemoryAudit {
    fn log_exchange(&mut self, initiator: &str, counterpart: &str, message: &str) {
        self.entries.push(AuditEntry {
            timestamp: Utc::now(),
            initiator: initiator.to_string(),
            counterpart: counterpart.to_string(),
            message: message.to_string(),
        });
    }
}
