//! Notion task-database client.
//!
//! Thin wrapper over the database query/page endpoints: cursor-paginated
//! queries with composable JSON filters, plus create/update/archive for
//! single pages. Property names come from the configured [`Schema`] so the
//! wire shapes live in one place.

mod page;

pub use page::Page;

use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use daysync_core::record::{Category, TaskRecord};
use daysync_core::timeutil::Window;

use crate::config::Schema;
use crate::reconcile::RecordDraft;

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const QUERY_PAGE_SIZE: u32 = 100;

/// How the database's status property is encoded. Externally it may be a
/// real status field or a plain select; writes probe the former and fall
/// back to the latter exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFieldKind {
    Status,
    Select,
}

pub struct NotionStore {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
    schema: Schema,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Page>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl NotionStore {
    pub fn new(api_key: &str, database_id: &str, schema: Schema) -> NotionStore {
        NotionStore {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            database_id: database_id.to_string(),
            schema,
        }
    }

    /// All records whose date range touches the window, regardless of
    /// category. The server-side filter over-fetches by one day; the exact
    /// inclusive overlap is applied locally.
    pub async fn records_overlapping(&self, window: Window) -> Result<Vec<TaskRecord>> {
        let filter = json!({
            "and": [
                { "property": self.schema.date, "date": { "is_not_empty": true } },
                { "property": self.schema.date, "date": { "on_or_after": window.start.to_string() } },
                { "property": self.schema.date, "date": { "on_or_before": (window.end + chrono::Duration::days(1)).to_string() } },
            ]
        });

        let records = self.query_records(&filter).await?;
        Ok(records
            .into_iter()
            .filter(|r| window.overlaps(r.start, r.end))
            .collect())
    }

    /// Calendar-mirrored candidates for reconciliation: category Calendar,
    /// non-empty event id, dated within the (buffered) window.
    pub async fn mirrored_candidates(&self, window: Window) -> Result<Vec<TaskRecord>> {
        let filter = json!({
            "and": [
                { "property": self.schema.category, "select": { "equals": Category::Calendar.label() } },
                { "property": self.schema.event_id, "rich_text": { "is_not_empty": true } },
                { "property": self.schema.date, "date": { "is_not_empty": true } },
                { "property": self.schema.date, "date": { "on_or_after": window.start.to_string() } },
                { "property": self.schema.date, "date": { "on_or_before": (window.end + chrono::Duration::days(1)).to_string() } },
            ]
        });

        self.query_records(&filter).await
    }

    /// Full-store lookup of mirrors for one event id (no date bound).
    pub async fn find_by_event_id(&self, event_id: &str) -> Result<Vec<TaskRecord>> {
        let filter = json!({
            "property": self.schema.event_id,
            "rich_text": { "equals": event_id },
        });

        self.query_records(&filter).await
    }

    async fn query_records(&self, filter: &Value) -> Result<Vec<TaskRecord>> {
        let pages = self.query(filter).await?;
        // Pages missing a readable title or date are skipped, not fatal
        Ok(pages
            .iter()
            .filter_map(|p| p.to_record(&self.schema))
            .collect())
    }

    async fn query(&self, filter: &Value) -> Result<Vec<Page>> {
        let url = format!("{NOTION_API}/databases/{}/query", self.database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "page_size": QUERY_PAGE_SIZE,
                "filter": filter,
            });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .request(self.client.post(&url).json(&body))
                .await
                .context("Task database query failed")?;
            let batch: QueryResponse = response
                .json()
                .await
                .context("Task database returned an unreadable query response")?;

            pages.extend(batch.results);
            match (batch.has_more, batch.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }

    /// Create a page for the draft. Tries the status encoding first and
    /// retries once as select when the database rejects the shape.
    pub async fn create(&self, draft: &RecordDraft) -> Result<()> {
        let url = format!("{NOTION_API}/pages");
        let body = |kind| {
            json!({
                "parent": { "database_id": self.database_id },
                "properties": page::draft_properties(draft, &self.schema, kind),
            })
        };

        self.send_with_status_fallback(|kind| self.client.post(&url).json(&body(kind)))
            .await
            .with_context(|| format!("Failed to create record for event {}", draft.event_id))
    }

    /// Update a page in place with the draft's fields. Same status-encoding
    /// fallback as [`create`](Self::create).
    pub async fn update(&self, page_id: &str, draft: &RecordDraft) -> Result<()> {
        let url = format!("{NOTION_API}/pages/{page_id}");
        let body = |kind| {
            json!({ "properties": page::draft_properties(draft, &self.schema, kind) })
        };

        self.send_with_status_fallback(|kind| self.client.patch(&url).json(&body(kind)))
            .await
            .with_context(|| format!("Failed to update record {page_id}"))
    }

    pub async fn archive(&self, page_id: &str) -> Result<()> {
        let url = format!("{NOTION_API}/pages/{page_id}");
        self.request(self.client.patch(&url).json(&json!({ "archived": true })))
            .await
            .with_context(|| format!("Failed to archive record {page_id}"))?;
        Ok(())
    }

    async fn send_with_status_fallback<F>(&self, make_request: F) -> Result<()>
    where
        F: Fn(StatusFieldKind) -> reqwest::RequestBuilder,
    {
        let first = self
            .authorize(make_request(StatusFieldKind::Status))
            .send()
            .await
            .context("Task database request failed")?;

        if first.status() != StatusCode::BAD_REQUEST {
            check_response(first).await?;
            return Ok(());
        }

        // The status property is configured as a plain select in this
        // database; re-encode and try once more.
        log::debug!("status encoding rejected, retrying as select");
        let second = self
            .authorize(make_request(StatusFieldKind::Select))
            .send()
            .await
            .context("Task database request failed")?;
        check_response(second).await?;
        Ok(())
    }

    async fn request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .context("Task database request failed")?;
        check_response(response).await
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("Task database responded HTTP {status}: {body}")
}
