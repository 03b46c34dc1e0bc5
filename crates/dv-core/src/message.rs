//! Messages exchanged with the control surface.

use serde::{Deserialize, Serialize};

use crate::classify::PageStats;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Turn analysis on or off for the selected deck.
    #[serde(rename_all = "camelCase")]
    ToggleAnalysis {
        is_enabled: bool,
        #[serde(default)]
        selected_deck: String,
    },
    /// Ask for the current page's stats.
    GetStats,
    /// The page address changed without a reload.
    Navigate { url: String },
    /// Stats broadcast for the current page.
    StatsUpdate { stats: PageStats },
}

impl ControlMessage {
    pub fn stats_update(stats: PageStats) -> Self {
        ControlMessage::StatsUpdate { stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_toggle_wire_format() {
        let msg: ControlMessage = serde_json::from_value(json!({
            "type": "toggleAnalysis",
            "isEnabled": true,
            "selectedDeck": "Japanese",
        }))
        .unwrap();
        assert_eq!(
            msg,
            ControlMessage::ToggleAnalysis {
                is_enabled: true,
                selected_deck: "Japanese".to_string(),
            }
        );
    }

    #[test]
    fn test_stats_update_wire_format() {
        let stats = PageStats {
            known: 1,
            unknown: 0,
            new: 1,
            deck_percentage: Some(50),
        };
        let json = serde_json::to_value(ControlMessage::stats_update(stats)).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "statsUpdate",
                "stats": { "known": 1, "unknown": 0, "new": 1, "deckPercentage": 50 },
            })
        );
    }

    #[test]
    fn test_get_stats_wire_format() {
        let msg: ControlMessage = serde_json::from_value(json!({"type": "getStats"})).unwrap();
        assert_eq!(msg, ControlMessage::GetStats);
    }
}
