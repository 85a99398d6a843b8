//! Provider-neutral calendar event types.
//!
//! The feed client converts its API responses into these types; the
//! reconciler works exclusively with them and never sees wire JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single-occurrence calendar event as fetched from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Stable event id, unique within the calendar
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    /// Absent on some feeds; the reconciler defaults it to start + 1 hour
    pub end: Option<EventTime>,
    /// Set when the feed reports the event as cancelled
    pub cancelled: bool,
    pub attendees: Vec<Attendee>,
}

/// An event attendee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    pub email: Option<String>,
    /// Response status: "accepted", "declined", "tentative", "needsAction"
    pub response_status: Option<String>,
    /// Whether the feed marks this attendee as the authenticated account
    pub is_self: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl ExternalEvent {
    /// Whether the calendar owner has declined this event.
    ///
    /// Matches by exact address when the owner's email is configured, and
    /// falls back to the feed's own self marker otherwise.
    pub fn declined_by(&self, owner_email: Option<&str>) -> bool {
        let owner = owner_email.map(|e| e.trim().to_ascii_lowercase());

        self.attendees.iter().any(|a| {
            let declined = a
                .response_status
                .as_deref()
                .is_some_and(|s| s.trim().eq_ignore_ascii_case("declined"));
            if !declined {
                return false;
            }

            if let (Some(owner), Some(email)) = (&owner, &a.email) {
                if email.trim().to_ascii_lowercase() == *owner {
                    return true;
                }
            }

            a.is_self
        })
    }
}
