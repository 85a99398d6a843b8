//! Google Calendar event feed.
//!
//! Lists single-occurrence events for a time range and converts them into
//! the provider-neutral [`ExternalEvent`] type. Recurring events arrive
//! pre-expanded (`singleEvents=true`); items the feed has soft-deleted are
//! excluded at the source.

mod auth;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use daysync_core::event::{Attendee, EventTime, ExternalEvent};

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";
const LIST_PAGE_SIZE: u32 = 250;

pub struct EventFeed {
    client: reqwest::Client,
    calendar_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsPage {
    #[serde(default)]
    items: Vec<WireEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    status: String,
    start: Option<WireTime>,
    end: Option<WireTime>,
    #[serde(default)]
    attendees: Vec<WireAttendee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTime {
    date_time: Option<DateTime<Utc>>,
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAttendee {
    email: Option<String>,
    response_status: Option<String>,
    #[serde(default, rename = "self")]
    is_self: bool,
}

impl EventFeed {
    /// Exchange the service-account blob for a token and bind the feed to
    /// one calendar.
    pub async fn connect(service_account_json: &str, calendar_id: &str) -> Result<EventFeed> {
        let client = reqwest::Client::new();
        let key = auth::parse_key(service_account_json)?;
        let access_token = auth::fetch_access_token(&client, &key, Utc::now()).await?;

        Ok(EventFeed {
            client,
            calendar_id: calendar_id.to_string(),
            access_token,
        })
    }

    /// All events intersecting `[time_min, time_max)`, ordered by start
    /// time, paginated until exhausted.
    pub async fn events_between(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<ExternalEvent>> {
        let url = format!("{CALENDAR_API}/calendars/{}/events", self.calendar_id);
        let time_min = time_min.to_rfc3339();
        let time_max = time_max.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("timeMin", time_min.clone()),
                ("timeMax", time_max.clone()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("showDeleted", "false".to_string()),
                ("maxResults", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&query)
                .send()
                .await
                .context("Event feed request failed")?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("Event feed responded HTTP {status}: {body}");
            }

            let page: EventsPage = response
                .json()
                .await
                .context("Event feed returned an unreadable response")?;

            events.extend(page.items.into_iter().filter_map(convert));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(events)
    }
}

/// Convert a wire event, skipping items with no id or no usable start.
fn convert(wire: WireEvent) -> Option<ExternalEvent> {
    if wire.id.is_empty() {
        return None;
    }

    let start = wire.start.as_ref().and_then(wire_time)?;
    let end = wire.end.as_ref().and_then(wire_time);

    Some(ExternalEvent {
        id: wire.id,
        summary: if wire.summary.is_empty() {
            "(no title)".to_string()
        } else {
            wire.summary
        },
        start,
        end,
        cancelled: wire.status == "cancelled",
        attendees: wire
            .attendees
            .into_iter()
            .map(|a| Attendee {
                email: a.email,
                response_status: a.response_status,
                is_self: a.is_self,
            })
            .collect(),
    })
}

fn wire_time(time: &WireTime) -> Option<EventTime> {
    if let Some(instant) = time.date_time {
        Some(EventTime::DateTime(instant))
    } else {
        time.date.map(EventTime::Date)
    }
}
