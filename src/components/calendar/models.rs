use crate::utils::ics::IcsWriter;
use crate::utils::time::{format_ical_date, format_ical_duration, format_ical_utc};
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;

/// Days covered by an all-day entry, `end` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One concrete occurrence of an event, taken from the event's feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEvent {
    pub uid: Option<String>,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Set for all-day occurrences; `start`/`end` then hold the local midnights
    pub dates: Option<DateSpan>,
    pub url: Option<String>,
}

/// Normalized, calendar-ready representation of one upstream event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    /// Markup-free location
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub url: String,
    /// Subtitle, blank line, then the plain-text long description
    pub description: String,
    pub sub_events: Vec<SubEvent>,
}

impl CanonicalEvent {
    /// Turn the event into output entries: one per sub-event, or a single
    /// entry for the event itself when it has none.
    pub fn into_entries(self, creator: &str) -> Vec<CalendarEntry> {
        if self.sub_events.is_empty() {
            return vec![CalendarEntry {
                uid: format!("{}@{}", self.id, creator),
                summary: self.title,
                description: self.description,
                location: self.location,
                start: self.start,
                end: self.end,
                dates: None,
                url: Some(self.url).filter(|url| !url.is_empty()),
            }];
        }

        let id = self.id;
        self.sub_events
            .into_iter()
            .enumerate()
            .map(|(n, sub)| CalendarEntry {
                uid: match sub.uid {
                    Some(uid) => format!("custom-{}", uid),
                    None => format!("{}-{}@{}", id, n, creator),
                },
                summary: sub.name,
                description: sub.description,
                location: sub.location,
                start: sub.start,
                end: sub.end,
                dates: sub.dates,
                url: sub.url,
            })
            .collect()
    }
}

/// One VEVENT of the output calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub uid: String,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub dates: Option<DateSpan>,
    pub url: Option<String>,
}

/// The calendar document served to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCalendar {
    pub creator: String,
    pub name: String,
    /// Suggested polling interval for subscribers
    pub refresh_interval: Duration,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<CalendarEntry>,
}

impl OutputCalendar {
    pub fn new(creator: &str, name: &str, refresh_interval: Duration, generated_at: DateTime<Utc>) -> Self {
        Self {
            creator: creator.to_string(),
            name: name.to_string(),
            refresh_interval,
            generated_at,
            entries: Vec::new(),
        }
    }

    pub fn add_event(&mut self, event: CanonicalEvent) {
        let entries = event.into_entries(&self.creator);
        self.entries.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to an iCalendar document
    pub fn to_ics(&self) -> String {
        let refresh = format_ical_duration(self.refresh_interval);
        let stamp = format_ical_utc(&self.generated_at);

        let mut writer = IcsWriter::new();
        writer
            .begin("VCALENDAR")
            .raw("VERSION", "2.0")
            .text("PRODID", &self.creator)
            .raw("METHOD", "PUBLISH")
            .raw("CALSCALE", "GREGORIAN")
            .text("NAME", &self.name)
            .text("X-WR-CALNAME", &self.name)
            .raw("REFRESH-INTERVAL;VALUE=DURATION", &refresh)
            .raw("X-PUBLISHED-TTL", &refresh);

        for entry in &self.entries {
            writer
                .begin("VEVENT")
                .text("UID", &entry.uid)
                .raw("DTSTAMP", &stamp);
            match &entry.dates {
                Some(dates) => writer
                    .raw("DTSTART;VALUE=DATE", &format_ical_date(&dates.start))
                    .raw("DTEND;VALUE=DATE", &format_ical_date(&dates.end)),
                None => writer
                    .raw("DTSTART", &format_ical_utc(&entry.start))
                    .raw("DTEND", &format_ical_utc(&entry.end)),
            };
            writer.text("SUMMARY", &entry.summary);
            if !entry.location.is_empty() {
                writer.text("LOCATION", &entry.location);
            }
            if !entry.description.is_empty() {
                writer.text("DESCRIPTION", &entry.description);
            }
            if let Some(url) = &entry.url {
                writer.raw("URL", url);
            }
            writer.end("VEVENT");
        }

        writer.end("VCALENDAR");
        writer.finish()
    }
}
