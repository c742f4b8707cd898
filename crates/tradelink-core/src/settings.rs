//! Trade tuning knobs shared by every session of a process

use serde::{Deserialize, Serialize};

use crate::layout::STANDARD_LAYOUT;

fn default_request_timeout() -> u64 {
    60
}

fn default_countdown() -> u64 {
    3
}

fn default_require_offer() -> bool {
    true
}

fn default_layout() -> String {
    STANDARD_LAYOUT.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSettings {
    /// Seconds before an unanswered request expires
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Seconds between both sides being ready and the commit; 0 commits on the next tick
    #[serde(default = "default_countdown")]
    pub countdown_secs: u64,
    /// Refuse readiness while neither side offers anything
    #[serde(default = "default_require_offer")]
    pub require_offer: bool,
    /// Layout template new sessions are built from
    #[serde(default = "default_layout")]
    pub layout: String,
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            countdown_secs: default_countdown(),
            require_offer: default_require_offer(),
            layout: default_layout(),
        }
    }
}

impl TradeSettings {
    pub fn request_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.request_timeout_secs.min(i64::MAX as u64) as i64)
    }

    pub fn countdown(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.countdown_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: TradeSettings = serde_json::from_str(r#"{"countdown_secs": 5}"#).unwrap();
        assert_eq!(settings.countdown_secs, 5);
        assert_eq!(settings.request_timeout_secs, 60);
        assert!(settings.require_offer);
        assert_eq!(settings.layout, STANDARD_LAYOUT);
    }

    #[test]
    fn test_durations() {
        let settings = TradeSettings::default();
        assert_eq!(settings.request_timeout(), chrono::Duration::seconds(60));
        assert_eq!(settings.countdown(), std::time::Duration::from_secs(3));
    }
}
