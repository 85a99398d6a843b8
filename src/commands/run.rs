//! The periodic entry point: sync the calendar when due, then publish the
//! digest for the current effective date, editing the day's message in
//! place when one already exists.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use daysync_core::timeutil::{self, Window};
use owo_colors::OwoColorize;

use crate::config::Config;
use crate::digest;
use crate::notify::{self, Webhook};
use crate::state::SyncState;
use crate::store::NotionStore;

pub async fn run(cfg: &Config) -> Result<()> {
    let now = Utc::now();
    let effective = timeutil::effective_date(now);
    let window = Window::around(effective);

    let mut state = SyncState::load(&cfg.state_file);

    if state.should_sync(now, cfg.sync_interval) {
        let stats = super::sync::reconcile_window(cfg, window, now).await?;
        state.mark_synced(now);
        state.save(&cfg.state_file)?;
        println!(
            "{} synced calendar: {} created, {} updated, {} archived",
            "✓".green(),
            stats.created,
            stats.updated,
            stats.archived
        );
    } else {
        log::debug!("sync interval not elapsed, skipping calendar sync");
    }

    publish(cfg, &mut state, effective, window).await
}

async fn publish(
    cfg: &Config,
    state: &mut SyncState,
    effective: NaiveDate,
    window: Window,
) -> Result<()> {
    let store = NotionStore::new(&cfg.notion_api_key, &cfg.database_id, cfg.schema.clone());
    let records = store.records_overlapping(window).await?;
    let payload = notify::digest_payload(&digest::render(&records, effective));

    let webhook = Webhook::new(&cfg.webhook_url)?;

    // Same effective date with a known message: edit in place. Anything
    // else starts a fresh message and drops the old linkage.
    match state.message_to_edit(effective).map(str::to_string) {
        Some(message_id) => {
            webhook.edit(&message_id, &payload).await?;
            println!("{} edited digest message {message_id}", "✓".green());
        }
        None => {
            let message_id = webhook.post(&payload).await?;
            state.date = Some(effective);
            state.message_id = Some(message_id.clone());
            state.save(&cfg.state_file)?;
            println!("{} posted digest message {message_id}", "✓".green());
        }
    }

    Ok(())
}
