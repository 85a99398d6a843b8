//! Persisted run state.
//!
//! A single flat JSON file carries everything one invocation hands to the
//! next: when the calendar was last synced, which effective date was last
//! rendered, and the id of the digest message to edit in place. A missing or
//! unreadable file simply means "never synced, no prior message".

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Instant of the last completed calendar sync (UTC, ISO-8601)
    #[serde(default)]
    pub last_gcal_sync_at: Option<DateTime<Utc>>,
    /// Effective date of the last published digest (YYYY-MM-DD)
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Message id of that digest, for edit-in-place
    #[serde(default)]
    pub message_id: Option<String>,
}

impl SyncState {
    pub fn load(path: &Path) -> SyncState {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => SyncState::default(),
        }
    }

    /// Write atomically (temp file + rename) so a crash mid-save never
    /// leaves a truncated state file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize state")?;

        let temp = path.with_extension("tmp");
        fs::write(&temp, contents)
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        fs::rename(&temp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Whether enough time has passed since the last sync. Never-synced
    /// state always syncs.
    pub fn should_sync(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match self.last_gcal_sync_at {
            Some(last) => now - last >= interval,
            None => true,
        }
    }

    pub fn mark_synced(&mut self, now: DateTime<Utc>) {
        self.last_gcal_sync_at = Some(now);
    }

    /// The message to edit for `effective`, when one was already published
    /// for that date. Any other situation means a fresh message.
    pub fn message_to_edit(&self, effective: NaiveDate) -> Option<&str> {
        match (self.date, self.message_id.as_deref()) {
            (Some(date), Some(message_id)) if date == effective => Some(message_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let state = SyncState::load(&dir.path().join("nope.json"));
        assert_eq!(state, SyncState::default());
    }

    #[test]
    fn test_load_corrupt_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ this is not json").unwrap();
        assert_eq!(SyncState::load(&path), SyncState::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = SyncState {
            last_gcal_sync_at: Some(Utc.with_ymd_and_hms(2025, 6, 5, 2, 0, 0).unwrap()),
            date: Some(NaiveDate::from_ymd_opt(2025, 6, 5).unwrap()),
            message_id: Some("123456".to_string()),
        };
        state.save(&path).unwrap();

        assert_eq!(SyncState::load(&path), state);
        // No temp file left behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_message_to_edit_requires_same_date_and_id() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();

        let mut state = SyncState::default();
        assert_eq!(state.message_to_edit(today), None);

        state.date = Some(today);
        state.message_id = Some("m1".to_string());
        assert_eq!(state.message_to_edit(today), Some("m1"));
        // A new effective date always starts a new message
        assert_eq!(state.message_to_edit(yesterday), None);

        state.message_id = None;
        assert_eq!(state.message_to_edit(today), None);
    }

    #[test]
    fn test_should_sync_interval() {
        let now = Utc.with_ymd_and_hms(2025, 6, 5, 12, 0, 0).unwrap();
        let interval = Duration::minutes(30);

        let mut state = SyncState::default();
        assert!(state.should_sync(now, interval));

        state.mark_synced(now - Duration::minutes(10));
        assert!(!state.should_sync(now, interval));

        state.mark_synced(now - Duration::minutes(30));
        assert!(state.should_sync(now, interval));
    }
}
