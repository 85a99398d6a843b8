//! Environment-sourced configuration.
//!
//! All settings come from environment variables (the tool is driven by a
//! scheduler, not an interactive shell). Required values are validated once
//! at startup, before any network call.

use anyhow::{bail, Result};
use chrono::Duration;
use std::env;
use std::path::PathBuf;

/// Minutes between calendar-to-store sync passes unless overridden.
pub const DEFAULT_SYNC_INTERVAL_MINUTES: i64 = 30;

const DEFAULT_STATE_FILE: &str = "daysync_state.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub notion_api_key: String,
    /// Canonical 32-hex database id
    pub database_id: String,
    /// Raw service-account credential JSON
    pub service_account_json: String,
    pub calendar_id: String,
    /// Owner address used to match declined invitations
    pub owner_email: Option<String>,
    pub webhook_url: String,
    pub sync_interval: Duration,
    pub state_file: PathBuf,
    pub schema: Schema,
}

/// Property names of the task database.
///
/// Sourced once from the environment with canonical defaults, then passed
/// into the store client; nothing else in the tree hard-codes a property
/// name.
#[derive(Debug, Clone)]
pub struct Schema {
    pub title: String,
    pub status: String,
    pub category: String,
    pub priority: String,
    pub date: String,
    pub event_id: String,
}

impl Default for Schema {
    fn default() -> Schema {
        Schema {
            title: "name".to_string(),
            status: "states".to_string(),
            category: "label".to_string(),
            priority: "priority".to_string(),
            date: "date".to_string(),
            event_id: "gcal_event_id".to_string(),
        }
    }
}

impl Schema {
    fn from_env() -> Schema {
        let defaults = Schema::default();
        Schema {
            title: env_or("NOTION_PROP_TITLE", &defaults.title),
            status: env_or("NOTION_PROP_STATUS", &defaults.status),
            category: env_or("NOTION_PROP_CATEGORY", &defaults.category),
            priority: env_or("NOTION_PROP_PRIORITY", &defaults.priority),
            date: env_or("NOTION_PROP_DATE", &defaults.date),
            event_id: env_or("NOTION_PROP_EVENT_ID", &defaults.event_id),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config> {
        let raw_database_id = require("NOTION_DATABASE_ID")?;
        let database_id = match normalize_database_id(&raw_database_id) {
            Some(id) => id,
            None => bail!("NOTION_DATABASE_ID '{raw_database_id}' does not contain a database id"),
        };

        let sync_interval_minutes = match env::var("GCAL_SYNC_EVERY_MINUTES") {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => bail!("GCAL_SYNC_EVERY_MINUTES '{raw}' is not a positive number of minutes"),
            },
            Err(_) => DEFAULT_SYNC_INTERVAL_MINUTES,
        };

        Ok(Config {
            notion_api_key: require("NOTION_API_KEY")?,
            database_id,
            service_account_json: require("GOOGLE_SERVICE_ACCOUNT_JSON")?,
            calendar_id: require("GCAL_ID")?,
            owner_email: optional("GCAL_OWNER_EMAIL"),
            webhook_url: require("DISCORD_WEBHOOK_URL")?,
            sync_interval: Duration::minutes(sync_interval_minutes),
            state_file: PathBuf::from(env_or("DAYSYNC_STATE_FILE", DEFAULT_STATE_FILE)),
            schema: Schema::from_env(),
        })
    }
}

fn require(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{key} is not set"),
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

/// Extract the canonical 32-hex database id from a raw value: a bare id,
/// a hyphenated UUID, or a full URL containing one.
pub fn normalize_database_id(raw: &str) -> Option<String> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != '-').collect();
    let bytes = cleaned.as_bytes();

    let mut run_start = 0;
    for (i, b) in bytes.iter().enumerate() {
        if !b.is_ascii_hexdigit() {
            run_start = i + 1;
            continue;
        }
        if i + 1 - run_start == 32 {
            return Some(cleaned[run_start..=i].to_ascii_lowercase());
        }
    }
    None
}
