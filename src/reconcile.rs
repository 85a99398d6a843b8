//! Calendar-to-task reconciliation.
//!
//! Maps the window's calendar events onto their mirrored task records and
//! produces the store mutations that keep the two in step:
//! - at most one live record per event id (duplicates self-heal, earliest
//!   creation wins),
//! - every valid event is upserted with freshly derived fields,
//! - records whose event vanished from the valid set are archived, but only
//!   when their stored range still touches the sync window.
//!
//! Planning is pure; `Plan::apply` performs the store calls sequentially.
//! Archives are best-effort: a failed archive is logged and the run
//! continues.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use daysync_core::event::{EventTime, ExternalEvent};
use daysync_core::record::{Category, Priority, Status, TaskRecord};
use daysync_core::timeutil::{self, Window};

use crate::store::NotionStore;

/// Fields a mirrored record should carry for one calendar event.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub title: String,
    pub status: Status,
    pub category: Category,
    pub priority: Priority,
    pub when: DraftWhen,
    pub event_id: String,
}

/// The date property to store: a clock-time range for timed events, a bare
/// date for all-day ones.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftWhen {
    Timed {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
    AllDay(NaiveDate),
}

/// One upsert: update `target` in place when the event already has a live
/// mirror, otherwise create (after a stray lookup at apply time).
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    pub draft: RecordDraft,
    pub target: Option<String>,
}

/// The mutations one reconciliation pass wants to make.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Extra records sharing an event id with an older sibling
    pub duplicate_archives: Vec<String>,
    pub upserts: Vec<Upsert>,
    /// Mirrors of events that vanished from the valid set
    pub stale_archives: Vec<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SyncStats {
    pub created: usize,
    pub updated: usize,
    pub archived: usize,
}

/// Compute the reconciliation plan.
///
/// `records` are the store's calendar-mirrored candidates for the window;
/// `now` drives status derivation. Pure: no store access.
pub fn plan(
    events: &[ExternalEvent],
    records: &[TaskRecord],
    window: Window,
    now: DateTime<Utc>,
    owner_email: Option<&str>,
) -> Plan {
    // Self-healing pass: group mirrors by event id, keep the oldest of any
    // duplicate set and archive the rest.
    let mut by_event: HashMap<&str, Vec<&TaskRecord>> = HashMap::new();
    for record in records {
        if let Some(event_id) = record.event_id.as_deref() {
            by_event.entry(event_id).or_default().push(record);
        }
    }

    let mut duplicate_archives = Vec::new();
    let mut kept: HashMap<&str, &TaskRecord> = HashMap::new();
    for (event_id, mut group) in by_event {
        group.sort_by_key(|r| r.created.unwrap_or(DateTime::<Utc>::MAX_UTC));
        let mut group = group.into_iter();
        if let Some(keep) = group.next() {
            kept.insert(event_id, keep);
            duplicate_archives.extend(group.map(|r| r.id.clone()));
        }
    }
    duplicate_archives.sort();

    let mut upserts = Vec::new();
    let mut valid_ids: HashSet<&str> = HashSet::new();
    for event in events {
        if event.cancelled || event.declined_by(owner_email) {
            continue;
        }
        valid_ids.insert(event.id.as_str());
        upserts.push(Upsert {
            draft: derive_draft(event, now),
            target: kept.get(event.id.as_str()).map(|r| r.id.clone()),
        });
    }

    // Archive pass: mirrors whose event is gone, bounded to the window so a
    // stale or partial fetch cannot reap records outside the current scope.
    let mut stale_archives: Vec<String> = kept
        .iter()
        .filter(|(event_id, _)| !valid_ids.contains(*event_id))
        .filter(|(_, record)| window.overlaps(record.start, record.end))
        .map(|(_, record)| record.id.clone())
        .collect();
    stale_archives.sort();

    Plan {
        duplicate_archives,
        upserts,
        stale_archives,
    }
}

/// Derive the record fields for one valid event.
///
/// Timed events get the local clock time appended to the title and a status
/// computed from `now` against `[start, end)`; a missing end defaults to one
/// hour after the start. All-day events keep the bare summary, store only
/// the date, and always start out as not started.
pub fn derive_draft(event: &ExternalEvent, now: DateTime<Utc>) -> RecordDraft {
    let zone = timeutil::digest_zone();

    let (title, status, when) = match event.start {
        EventTime::DateTime(start) => {
            let end = match event.end {
                Some(EventTime::DateTime(end)) => end,
                Some(EventTime::Date(date)) => timeutil::day_start_utc(date),
                None => start + Duration::hours(1),
            };

            let status = if now < start {
                Status::NotStarted
            } else if now < end {
                Status::InProgress
            } else {
                Status::Done
            };

            (
                format!("{} {}", event.summary, timeutil::format_clock(start)),
                status,
                DraftWhen::Timed {
                    start: start.with_timezone(&zone),
                    end: end.with_timezone(&zone),
                },
            )
        }
        EventTime::Date(date) => (
            event.summary.clone(),
            Status::NotStarted,
            DraftWhen::AllDay(date),
        ),
    };

    RecordDraft {
        title,
        status,
        category: Category::Calendar,
        priority: Priority::Unset,
        when,
        event_id: event.id.clone(),
    }
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.duplicate_archives.is_empty()
            && self.upserts.is_empty()
            && self.stale_archives.is_empty()
    }

    /// Apply the plan against the store, sequentially.
    ///
    /// Creates and updates propagate their errors; every archive is
    /// best-effort and only logged on failure.
    pub async fn apply(&self, store: &NotionStore) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        for record_id in &self.duplicate_archives {
            stats.archived += archive_best_effort(store, record_id).await;
        }

        for upsert in &self.upserts {
            match &upsert.target {
                Some(record_id) => {
                    store.update(record_id, &upsert.draft).await?;
                    stats.updated += 1;
                }
                None => {
                    // The window query can miss a mirror whose dates moved,
                    // so check the full store once before creating.
                    let mut strays = store.find_by_event_id(&upsert.draft.event_id).await?;
                    strays.sort_by_key(|r| r.created.unwrap_or(DateTime::<Utc>::MAX_UTC));

                    let mut strays = strays.into_iter();
                    match strays.next() {
                        Some(keep) => {
                            for extra in strays {
                                stats.archived += archive_best_effort(store, &extra.id).await;
                            }
                            store.update(&keep.id, &upsert.draft).await?;
                            stats.updated += 1;
                        }
                        None => {
                            store.create(&upsert.draft).await?;
                            stats.created += 1;
                        }
                    }
                }
            }
        }

        for record_id in &self.stale_archives {
            stats.archived += archive_best_effort(store, record_id).await;
        }

        Ok(stats)
    }
}

async fn archive_best_effort(store: &NotionStore, record_id: &str) -> usize {
    match store.archive(record_id).await {
        Ok(()) => 1,
        Err(e) => {
            log::warn!("leaving record {record_id} unarchived: {e:#}");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use daysync_core::event::Attendee;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        timeutil::digest_zone()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn timed_event(id: &str, summary: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> ExternalEvent {
        ExternalEvent {
            id: id.to_string(),
            summary: summary.to_string(),
            start: EventTime::DateTime(start),
            end: Some(EventTime::DateTime(end)),
            cancelled: false,
            attendees: vec![],
        }
    }

    fn mirror(id: &str, event_id: &str, day: NaiveDate, created_hour: u32) -> TaskRecord {
        TaskRecord {
            id: id.to_string(),
            title: "mirror".to_string(),
            category: Category::Calendar,
            status: Some(Status::NotStarted),
            priority: Some(Priority::Unset),
            start: day,
            end: day,
            start_instant: None,
            event_id: Some(event_id.to_string()),
            created: Some(local(2025, 6, 1, created_hour, 0)),
        }
    }

    fn window() -> Window {
        Window::around(date(2025, 6, 5))
    }

    #[test]
    fn test_derive_draft_appends_clock_time_and_tracks_progress() {
        // Standup 09:00-09:30 local, observed at 09:15
        let ev = timed_event(
            "e1",
            "Standup",
            local(2025, 6, 5, 9, 0),
            local(2025, 6, 5, 9, 30),
        );
        let draft = derive_draft(&ev, local(2025, 6, 5, 9, 15));

        assert_eq!(draft.title, "Standup 9am");
        assert_eq!(draft.status, Status::InProgress);
        assert_eq!(draft.category, Category::Calendar);
        assert_eq!(draft.priority, Priority::Unset);
        assert_eq!(draft.event_id, "e1");
    }

    #[test]
    fn test_derive_draft_status_boundaries() {
        let ev = timed_event(
            "e1",
            "Standup",
            local(2025, 6, 5, 9, 0),
            local(2025, 6, 5, 9, 30),
        );
        assert_eq!(derive_draft(&ev, local(2025, 6, 5, 8, 59)).status, Status::NotStarted);
        assert_eq!(derive_draft(&ev, local(2025, 6, 5, 9, 0)).status, Status::InProgress);
        // End is exclusive: at 09:30 the event is over
        assert_eq!(derive_draft(&ev, local(2025, 6, 5, 9, 30)).status, Status::Done);
    }

    #[test]
    fn test_derive_draft_missing_end_defaults_to_one_hour() {
        let mut ev = timed_event(
            "e1",
            "Call",
            local(2025, 6, 5, 14, 30),
            local(2025, 6, 5, 15, 0),
        );
        ev.end = None;

        let draft = derive_draft(&ev, local(2025, 6, 5, 15, 15));
        assert_eq!(draft.title, "Call 2:30pm");
        // 14:30 + 1h = 15:30, so 15:15 is still in progress
        assert_eq!(draft.status, Status::InProgress);
        match draft.when {
            DraftWhen::Timed { start, end } => {
                assert_eq!(end - start, Duration::hours(1));
            }
            DraftWhen::AllDay(_) => panic!("timed event must keep a timed range"),
        }
    }

    #[test]
    fn test_derive_draft_all_day_is_bare_and_not_started() {
        let ev = ExternalEvent {
            id: "e2".to_string(),
            summary: "Conference".to_string(),
            start: EventTime::Date(date(2025, 6, 5)),
            end: Some(EventTime::Date(date(2025, 6, 6))),
            cancelled: false,
            attendees: vec![],
        };

        // Even late in the day, all-day events stay not started
        let draft = derive_draft(&ev, local(2025, 6, 5, 23, 0));
        assert_eq!(draft.title, "Conference");
        assert_eq!(draft.status, Status::NotStarted);
        assert_eq!(draft.when, DraftWhen::AllDay(date(2025, 6, 5)));
    }

    #[test]
    fn test_plan_upserts_every_valid_event_exactly_once() {
        let events = vec![
            timed_event("e1", "A", local(2025, 6, 5, 9, 0), local(2025, 6, 5, 10, 0)),
            timed_event("e2", "B", local(2025, 6, 5, 11, 0), local(2025, 6, 5, 12, 0)),
        ];
        let records = vec![mirror("r1", "e1", date(2025, 6, 5), 1)];

        let plan = plan(&events, &records, window(), local(2025, 6, 5, 8, 0), None);

        assert_eq!(plan.upserts.len(), 2);
        let targets: HashMap<&str, &Option<String>> = plan
            .upserts
            .iter()
            .map(|u| (u.draft.event_id.as_str(), &u.target))
            .collect();
        assert_eq!(targets["e1"], &Some("r1".to_string()));
        assert_eq!(targets["e2"], &None);
        assert!(plan.duplicate_archives.is_empty());
        assert!(plan.stale_archives.is_empty());
    }

    #[test]
    fn test_plan_skips_cancelled_and_declined() {
        let mut cancelled =
            timed_event("e1", "A", local(2025, 6, 5, 9, 0), local(2025, 6, 5, 10, 0));
        cancelled.cancelled = true;

        let mut declined =
            timed_event("e2", "B", local(2025, 6, 5, 11, 0), local(2025, 6, 5, 12, 0));
        declined.attendees = vec![Attendee {
            email: Some("me@example.com".to_string()),
            response_status: Some("declined".to_string()),
            is_self: false,
        }];

        let plan = plan(
            &[cancelled, declined],
            &[],
            window(),
            local(2025, 6, 5, 8, 0),
            Some("me@example.com"),
        );
        assert!(plan.upserts.is_empty());
    }

    #[test]
    fn test_plan_dedupes_keeping_earliest_creation() {
        // Two records mirror "e1"; r_old was created first and must survive
        let records = vec![
            mirror("r_new", "e1", date(2025, 6, 5), 9),
            mirror("r_old", "e1", date(2025, 6, 5), 7),
        ];
        let events = vec![timed_event(
            "e1",
            "A",
            local(2025, 6, 5, 9, 0),
            local(2025, 6, 5, 10, 0),
        )];

        let plan = plan(&events, &records, window(), local(2025, 6, 5, 8, 0), None);

        assert_eq!(plan.duplicate_archives, vec!["r_new".to_string()]);
        assert_eq!(plan.upserts[0].target, Some("r_old".to_string()));
    }

    #[test]
    fn test_plan_dedupe_unknown_creation_time_loses() {
        let mut no_created = mirror("r_untimed", "e1", date(2025, 6, 5), 9);
        no_created.created = None;
        let records = vec![no_created, mirror("r_timed", "e1", date(2025, 6, 5), 9)];

        let plan = plan(&[], &records, window(), local(2025, 6, 5, 8, 0), None);
        assert_eq!(plan.duplicate_archives, vec!["r_untimed".to_string()]);
    }

    #[test]
    fn test_plan_archives_vanished_mirror_inside_window() {
        let records = vec![mirror("r1", "gone", date(2025, 6, 5), 1)];
        let plan = plan(&[], &records, window(), local(2025, 6, 5, 8, 0), None);
        assert_eq!(plan.stale_archives, vec!["r1".to_string()]);
    }

    #[test]
    fn test_plan_leaves_vanished_mirror_outside_window() {
        // A mirror dated outside the window is out of scope even if its
        // event is absent from this fetch.
        let records = vec![mirror("r1", "gone", date(2025, 6, 20), 1)];
        let plan = plan(&[], &records, window(), local(2025, 6, 5, 8, 0), None);
        assert!(plan.stale_archives.is_empty());
    }

    #[test]
    fn test_plan_declined_mirror_is_archived() {
        // Previously mirrored, now declined: drops out of the valid set and
        // is reaped like any vanished event.
        let mut declined =
            timed_event("e1", "A", local(2025, 6, 5, 9, 0), local(2025, 6, 5, 10, 0));
        declined.attendees = vec![Attendee {
            email: None,
            response_status: Some("declined".to_string()),
            is_self: true,
        }];
        let records = vec![mirror("r1", "e1", date(2025, 6, 5), 1)];

        let plan = plan(&[declined], &records, window(), local(2025, 6, 5, 8, 0), None);
        assert!(plan.upserts.is_empty());
        assert_eq!(plan.stale_archives, vec!["r1".to_string()]);
    }

    /// Simulate applying a plan to an in-memory record set, the way the
    /// store would.
    fn simulate(records: &[TaskRecord], plan: &Plan, now: DateTime<Utc>) -> Vec<TaskRecord> {
        let mut next: Vec<TaskRecord> = records
            .iter()
            .filter(|r| {
                !plan.duplicate_archives.contains(&r.id) && !plan.stale_archives.contains(&r.id)
            })
            .cloned()
            .collect();

        for (i, upsert) in plan.upserts.iter().enumerate() {
            let (start, end, instant) = match &upsert.draft.when {
                DraftWhen::Timed { start, end } => (
                    start.date_naive(),
                    end.date_naive(),
                    Some(start.with_timezone(&Utc)),
                ),
                DraftWhen::AllDay(d) => (*d, *d, None),
            };
            match &upsert.target {
                Some(id) => {
                    let record = next.iter_mut().find(|r| &r.id == id).expect("target exists");
                    record.title = upsert.draft.title.clone();
                    record.status = Some(upsert.draft.status);
                    record.start = start;
                    record.end = end;
                    record.start_instant = instant;
                }
                None => next.push(TaskRecord {
                    id: format!("created-{i}"),
                    title: upsert.draft.title.clone(),
                    category: upsert.draft.category,
                    status: Some(upsert.draft.status),
                    priority: Some(upsert.draft.priority),
                    start,
                    end,
                    start_instant: instant,
                    event_id: Some(upsert.draft.event_id.clone()),
                    created: Some(now),
                }),
            }
        }

        next
    }

    #[test]
    fn test_reconcile_is_idempotent_on_unchanged_feed() {
        let now = local(2025, 6, 5, 8, 0);
        let events = vec![
            timed_event("e1", "A", local(2025, 6, 5, 9, 0), local(2025, 6, 5, 10, 0)),
            timed_event("e2", "B", local(2025, 6, 5, 11, 0), local(2025, 6, 5, 12, 0)),
        ];
        let records = vec![
            mirror("r1", "e1", date(2025, 6, 5), 1),
            mirror("dup", "e1", date(2025, 6, 5), 2),
            mirror("stale", "gone", date(2025, 6, 5), 3),
        ];

        let first = plan(&events, &records, window(), now, None);
        assert_eq!(first.duplicate_archives.len(), 1);
        assert_eq!(first.stale_archives.len(), 1);
        assert_eq!(
            first.upserts.iter().filter(|u| u.target.is_none()).count(),
            1
        );

        let after = simulate(&records, &first, now);
        let second = plan(&events, &after, window(), now, None);

        // Second pass over an unchanged feed: no creates, no archives
        assert!(second.duplicate_archives.is_empty());
        assert!(second.stale_archives.is_empty());
        assert!(second.upserts.iter().all(|u| u.target.is_some()));

        // Uniqueness + liveness: exactly one live record per valid event id
        for event_id in ["e1", "e2"] {
            let live = after
                .iter()
                .filter(|r| r.event_id.as_deref() == Some(event_id))
                .count();
            assert_eq!(live, 1, "one live mirror for {event_id}");
        }
    }
}
