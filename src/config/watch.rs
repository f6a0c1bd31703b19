//! What the command-line watcher subscribes to

use serde::Deserialize;

/// Subscriptions the binary sets up after connecting
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    /// Test ids to subscribe to (comma-separated)
    pub test_ids: Option<String>,

    /// Room to join
    pub room: Option<String>,
}

impl WatchConfig {
    /// Get test ids as a vector, skipping blanks
    pub fn test_ids_list(&self) -> Vec<String> {
        self.test_ids
            .as_ref()
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.test_ids_list().is_empty() && self.room.as_deref().map_or(true, |r| r.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_split_and_trimmed() {
        let config = WatchConfig {
            test_ids: Some(" t1, t2 ,,t3".to_string()),
            room: None,
        };
        assert_eq!(config.test_ids_list(), vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_empty_watch() {
        assert!(WatchConfig::default().is_empty());
        let config = WatchConfig {
            test_ids: None,
            room: Some("ops".to_string()),
        };
        assert!(!config.is_empty());
    }
}
