//! Page property parsing and construction.
//!
//! Reads are deliberately lenient: every accessor yields an `Option`, and a
//! page that lacks a readable title or date range simply drops out of the
//! result set instead of failing the run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use daysync_core::record::{Category, Priority, Status, TaskRecord};

use crate::config::Schema;
use crate::reconcile::{DraftWhen, RecordDraft};
use crate::store::StatusFieldKind;

/// A task-database page, with its property bag kept as raw JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Page {
    pub fn to_record(&self, schema: &Schema) -> Option<TaskRecord> {
        let title = self.title(&schema.title)?;
        let (start, end, start_instant) = self.date_range(&schema.date)?;

        Some(TaskRecord {
            id: self.id.clone(),
            title,
            category: self
                .select(&schema.category)
                .map(|name| Category::from_label(&name))
                .unwrap_or(Category::Other),
            status: self
                .status_name(&schema.status)
                .and_then(|name| Status::from_label(&name)),
            priority: self
                .select(&schema.priority)
                .and_then(|name| Priority::parse(&name)),
            start,
            end,
            start_instant,
            event_id: self.rich_text(&schema.event_id),
            created: self.created_time,
        })
    }

    fn title(&self, property: &str) -> Option<String> {
        let fragments = self.properties.get(property)?.get("title")?.as_array()?;
        let text = plain_text(fragments);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn select(&self, property: &str) -> Option<String> {
        self.properties
            .get(property)?
            .get("select")?
            .get("name")?
            .as_str()
            .map(str::to_string)
    }

    /// The status property's option name, whichever way the database
    /// encodes it.
    fn status_name(&self, property: &str) -> Option<String> {
        let prop = self.properties.get(property)?;
        let value = match prop.get("type").and_then(Value::as_str)? {
            "status" => prop.get("status")?,
            "select" => prop.get("select")?,
            _ => return None,
        };
        value.get("name")?.as_str().map(str::to_string)
    }

    fn rich_text(&self, property: &str) -> Option<String> {
        let fragments = self.properties.get(property)?.get("rich_text")?.as_array()?;
        let text = plain_text(fragments);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// The date property as an inclusive day range, plus the exact start
    /// instant when the stored value carries a clock time. A missing end
    /// collapses to a single-day range.
    fn date_range(&self, property: &str) -> Option<(NaiveDate, NaiveDate, Option<DateTime<Utc>>)> {
        let date = self.properties.get(property)?.get("date")?;
        let start_raw = date.get("start")?.as_str()?;

        let start = parse_day(start_raw)?;
        let end = date
            .get("end")
            .and_then(Value::as_str)
            .and_then(parse_day)
            .unwrap_or(start);

        let start_instant = if start_raw.len() > 10 {
            DateTime::parse_from_rfc3339(start_raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        } else {
            None
        };

        Some((start, end, start_instant))
    }
}

fn plain_text(fragments: &[Value]) -> String {
    fragments
        .iter()
        .filter_map(|f| f.get("plain_text").and_then(Value::as_str))
        .collect()
}

/// Day part of a date or datetime string (both start "YYYY-MM-DD").
fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

/// Build the property payload for a draft, under the given status encoding.
pub fn draft_properties(draft: &RecordDraft, schema: &Schema, status_kind: StatusFieldKind) -> Value {
    let (date_start, date_end) = match &draft.when {
        DraftWhen::Timed { start, end } => (start.to_rfc3339(), Some(end.to_rfc3339())),
        DraftWhen::AllDay(date) => (date.to_string(), None),
    };

    let status_value = match status_kind {
        StatusFieldKind::Status => json!({ "status": { "name": draft.status.label() } }),
        StatusFieldKind::Select => json!({ "select": { "name": draft.status.label() } }),
    };

    let mut properties = Map::new();
    properties.insert(
        schema.title.clone(),
        json!({ "title": [ { "text": { "content": draft.title } } ] }),
    );
    properties.insert(
        schema.category.clone(),
        json!({ "select": { "name": draft.category.label() } }),
    );
    properties.insert(
        schema.priority.clone(),
        json!({ "select": { "name": draft.priority.as_str() } }),
    );
    properties.insert(
        schema.date.clone(),
        json!({ "date": { "start": date_start, "end": date_end } }),
    );
    properties.insert(
        schema.event_id.clone(),
        json!({ "rich_text": [ { "text": { "content": draft.event_id } } ] }),
    );
    properties.insert(schema.status.clone(), status_value);

    Value::Object(properties)
}
