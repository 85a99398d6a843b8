//! Daily digest rendering.
//!
//! Turns the day's task records into the message body: one section per
//! category in fixed order, calendar items sorted by start time, everything
//! else by priority. Statuses decorate each line with the destination
//! medium's markup (strikethrough for done, underline for on hold).

use chrono::{DateTime, NaiveDate, Utc};
use daysync_core::record::{priority_rank, Category, Status, TaskRecord};

/// Render the digest for `date` from records overlapping the window.
/// Records whose range does not cover `date` itself are filtered here.
pub fn render(records: &[TaskRecord], date: NaiveDate) -> String {
    let mut lines = vec![format!("📅 **{date}**"), String::new()];

    for (i, category) in Category::ORDER.into_iter().enumerate() {
        let mut items: Vec<&TaskRecord> = records
            .iter()
            .filter(|r| r.category == category && r.covers(date))
            .collect();

        if category == Category::Calendar {
            // Chronological: timed entries first by instant, undated last,
            // ties broken by title
            items.sort_by(|a, b| {
                instant_key(a)
                    .cmp(&instant_key(b))
                    .then_with(|| a.title.cmp(&b.title))
            });
        } else {
            items.sort_by(|a, b| {
                priority_rank(a.priority)
                    .cmp(&priority_rank(b.priority))
                    .then_with(|| a.title.cmp(&b.title))
            });
        }

        lines.push(format!("{} **{}**", category.icon(), category.label()));
        if items.is_empty() {
            lines.push("No tasks".to_string());
        } else {
            lines.extend(items.into_iter().map(task_line));
        }

        if i != Category::ORDER.len() - 1 {
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

fn instant_key(record: &TaskRecord) -> (bool, DateTime<Utc>) {
    match record.start_instant {
        Some(instant) => (false, instant),
        None => (true, DateTime::<Utc>::MAX_UTC),
    }
}

fn task_line(record: &TaskRecord) -> String {
    let status = record.status.unwrap_or(Status::NotStarted);
    let line = format!("({}) {}", status.label(), record.title);
    match status {
        Status::Done => format!("~~{line}~~"),
        Status::OnHold => format!("__{line}__"),
        _ => line,
    }
}
