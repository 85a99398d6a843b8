//! Task records and their closed vocabularies.
//!
//! The task database stores these fields as free-form select/status options;
//! this module pins them down to closed enums with an exhaustive mapping to
//! the store's option names.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A task record, calendar-mirrored or manually entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Store-assigned record id
    pub id: String,
    pub title: String,
    pub category: Category,
    /// Absent when the store holds no (or an unknown) status option
    pub status: Option<Status>,
    /// Absent when the store holds a value outside the priority vocabulary
    pub priority: Option<Priority>,
    /// First day the record covers
    pub start: NaiveDate,
    /// Last day the record covers; equal to `start` for single-day records
    pub end: NaiveDate,
    /// Exact start instant, when the stored date carries a clock time.
    /// Drives the calendar section's ordering in the digest.
    pub start_instant: Option<DateTime<Utc>>,
    /// Source event id for calendar-mirrored records
    pub event_id: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// Whether this record's date range covers the given day (inclusive).
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Calendar,
    MainWork,
    Outsourcing,
    ProjectX,
    YouTube,
    Other,
}

impl Category {
    /// Fixed rendering order for the digest.
    pub const ORDER: [Category; 6] = [
        Category::Calendar,
        Category::MainWork,
        Category::Outsourcing,
        Category::ProjectX,
        Category::YouTube,
        Category::Other,
    ];

    /// The store's select option name.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Calendar => "Calendar",
            Category::MainWork => "Main work",
            Category::Outsourcing => "Outsourcing",
            Category::ProjectX => "Project X",
            Category::YouTube => "YouTube",
            Category::Other => "Other",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Calendar => "📧",
            Category::MainWork => "1️⃣",
            Category::Outsourcing => "2️⃣",
            Category::ProjectX => "3️⃣",
            Category::YouTube => "4️⃣",
            Category::Other => "ℹ️",
        }
    }

    /// Map a store option name back to a category. Unknown names land in
    /// `Other` so a stray option never drops a record from the digest.
    pub fn from_label(name: &str) -> Category {
        Category::ORDER
            .into_iter()
            .find(|c| c.label() == name)
            .unwrap_or(Category::Other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    NotStarted,
    InProgress,
    Done,
    OnHold,
}

impl Status {
    /// The store's option name, also used verbatim in the digest.
    pub fn label(&self) -> &'static str {
        match self {
            Status::NotStarted => "Not started",
            Status::InProgress => "In progress",
            Status::Done => "Done",
            Status::OnHold => "On hold",
        }
    }

    pub fn from_label(name: &str) -> Option<Status> {
        [
            Status::NotStarted,
            Status::InProgress,
            Status::Done,
            Status::OnHold,
        ]
        .into_iter()
        .find(|s| s.label() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
    P4,
    /// The explicit "-" marker used by calendar mirrors and unprioritized tasks
    Unset,
}

impl Priority {
    /// Sort order for the digest: "1" first, "-" last.
    pub const ORDER: [Priority; 5] = [
        Priority::P1,
        Priority::P2,
        Priority::P3,
        Priority::P4,
        Priority::Unset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P1 => "1",
            Priority::P2 => "2",
            Priority::P3 => "3",
            Priority::P4 => "4",
            Priority::Unset => "-",
        }
    }

    pub fn parse(value: &str) -> Option<Priority> {
        Priority::ORDER.into_iter().find(|p| p.as_str() == value)
    }

    pub fn rank(&self) -> usize {
        Priority::ORDER
            .iter()
            .position(|p| p == self)
            .unwrap_or(Priority::ORDER.len())
    }
}

/// Rank for sorting, treating values outside the vocabulary as last.
pub fn priority_rank(priority: Option<Priority>) -> usize {
    priority
        .map(|p| p.rank())
        .unwrap_or(Priority::ORDER.len())
}
