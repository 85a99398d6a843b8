//! Render the current digest to stdout without publishing.

use anyhow::Result;
use chrono::Utc;
use daysync_core::timeutil::{self, Window};

use crate::config::Config;
use crate::digest;
use crate::store::NotionStore;

pub async fn run(cfg: &Config) -> Result<()> {
    let effective = timeutil::effective_date(Utc::now());
    let window = Window::around(effective);

    let store = NotionStore::new(&cfg.notion_api_key, &cfg.database_id, cfg.schema.clone());
    let records = store.records_overlapping(window).await?;

    println!("{}", digest::render(&records, effective));
    Ok(())
}
