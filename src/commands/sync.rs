//! Force a calendar-to-store reconciliation, ignoring the sync interval.

use anyhow::Result;
use chrono::{DateTime, Utc};
use daysync_core::timeutil::{self, Window};

use crate::config::Config;
use crate::feed::EventFeed;
use crate::reconcile::{self, SyncStats};
use crate::state::SyncState;
use crate::store::NotionStore;

pub async fn run(cfg: &Config) -> Result<()> {
    let now = Utc::now();
    let window = Window::around(timeutil::effective_date(now));

    let stats = reconcile_window(cfg, window, now).await?;

    let mut state = SyncState::load(&cfg.state_file);
    state.mark_synced(now);
    state.save(&cfg.state_file)?;

    println!(
        "Synced {} to {}: {} created, {} updated, {} archived",
        window.start, window.end, stats.created, stats.updated, stats.archived
    );
    Ok(())
}

/// One full reconciliation pass over the window: fetch the feed, load the
/// store's mirrored candidates, plan, apply.
pub async fn reconcile_window(cfg: &Config, window: Window, now: DateTime<Utc>) -> Result<SyncStats> {
    let feed = EventFeed::connect(&cfg.service_account_json, &cfg.calendar_id).await?;
    let (time_min, time_max) = window.fetch_bounds_utc();
    let events = feed.events_between(time_min, time_max).await?;
    log::debug!("feed returned {} events for the window", events.len());

    let store = NotionStore::new(&cfg.notion_api_key, &cfg.database_id, cfg.schema.clone());
    let candidates = store.mirrored_candidates(window).await?;
    log::debug!("store holds {} mirrored candidates", candidates.len());

    let plan = reconcile::plan(&events, &candidates, window, now, cfg.owner_email.as_deref());
    if plan.is_empty() {
        return Ok(SyncStats::default());
    }
    plan.apply(&store).await
}
