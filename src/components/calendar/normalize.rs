use super::models::{CanonicalEvent, DateSpan, SubEvent};
use crate::components::upstream::{FeedDocument, FeedEntry, RawEventPayload};
use crate::error::{GatewayError, GatewayResult};
use crate::utils::time::{parse_ical_date, parse_ical_datetime, parse_iso8601, start_of_day};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

/// Length assumed for events that do not say when they end
pub const DEFAULT_EVENT_LENGTH: Duration = Duration::hours(2);

/// Rewrite the room markup: `<strong>Room</strong> A` becomes `Room: A`.
///
/// Only this tag pair is touched; other markup passes through.
pub fn clean_location(room: &str) -> String {
    room.replace("<strong>", "").replace("</strong>", ":")
}

/// Convert an HTML description to trimmed plain text without line wrapping
pub fn clean_description(html: &str) -> String {
    nanohtml2text::html2text(html).trim().to_string()
}

/// `subtitle`, a blank line, then `description`
pub fn compose_description(lead: &str, description: &str) -> String {
    format!("{}\n\n{}", lead, description)
}

/// Resolve the end of an event, defaulting to start + 2h.
///
/// An end before the start is treated like a missing one.
fn resolve_end(id: &str, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match end {
        Some(end) if end >= start => end,
        Some(end) => {
            warn!(event_id = id, %start, %end, "event ends before it starts, using default length");
            start + DEFAULT_EVENT_LENGTH
        }
        None => start + DEFAULT_EVENT_LENGTH,
    }
}

/// Keep a parsed end, treating a malformed one like a missing one
fn lenient_end(id: &str, value: &str, parsed: GatewayResult<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match parsed {
        Ok(end) => Some(end),
        Err(e) => {
            warn!(event_id = id, end = value, error = %e, "unreadable end, using default length");
            None
        }
    }
}

/// Build the canonical form of one upstream event
pub fn normalize(id: &str, raw: RawEventPayload, tz: &Tz) -> GatewayResult<CanonicalEvent> {
    let start = parse_iso8601(&raw.date_start, tz)?;
    let end = raw
        .date_end
        .as_deref()
        .and_then(|end| lenient_end(id, end, parse_iso8601(end, tz)));
    let end = resolve_end(id, start, end);

    let description = compose_description(&raw.subtitle, &clean_description(&raw.description));

    Ok(CanonicalEvent {
        id: id.to_string(),
        location: clean_location(&raw.room),
        title: raw.title,
        subtitle: raw.subtitle,
        start,
        end,
        url: raw.website_url,
        description,
        sub_events: Vec::new(),
    })
}

impl CanonicalEvent {
    /// Take every entry of the event's feed as a sub-event.
    ///
    /// Each sub-event is named after the event's subtitle and its description
    /// is prefixed with the event's title. Entries without a usable start are
    /// skipped.
    pub fn absorb_feed(&mut self, feed: FeedDocument, tz: &Tz) {
        for entry in feed.entries {
            match self.sub_event_from(entry, tz) {
                Ok(sub) => self.sub_events.push(sub),
                Err(e) => debug!(event_id = %self.id, error = %e, "skipping feed entry"),
            }
        }
    }

    fn sub_event_from(&self, entry: FeedEntry, tz: &Tz) -> GatewayResult<SubEvent> {
        let first = entry
            .start
            .ok_or_else(|| GatewayError::MalformedPayload("feed entry without DTSTART".to_string()))?;

        let (start, end, dates) = match parse_ical_date(&first.value) {
            Some(first_day) => {
                // all-day: DTEND is the exclusive last day, one day when missing
                let end_day = entry
                    .end
                    .as_ref()
                    .and_then(|end| parse_ical_date(&end.value))
                    .filter(|end_day| *end_day > first_day)
                    .or_else(|| first_day.succ_opt())
                    .unwrap_or(first_day);
                let dates = DateSpan {
                    start: first_day,
                    end: end_day,
                };
                (start_of_day(first_day, tz)?, start_of_day(end_day, tz)?, Some(dates))
            }
            None => {
                let start = parse_ical_datetime(&first.value, first.tzid.as_deref(), tz)?;
                let end = entry.end.as_ref().and_then(|end| {
                    lenient_end(
                        &self.id,
                        &end.value,
                        parse_ical_datetime(&end.value, end.tzid.as_deref(), tz),
                    )
                });
                (start, resolve_end(&self.id, start, end), None)
            }
        };

        Ok(SubEvent {
            uid: entry.uid.filter(|uid| !uid.trim().is_empty()),
            name: self.subtitle.clone(),
            description: compose_description(&self.title, &entry.description.unwrap_or_default()),
            location: entry
                .location
                .filter(|location| !location.trim().is_empty())
                .unwrap_or_else(|| self.location.clone()),
            start,
            end,
            dates,
            url: entry.url.or_else(|| Some(self.url.clone()).filter(|url| !url.is_empty())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::upstream::FeedDate;
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    fn raw_event() -> RawEventPayload {
        RawEventPayload {
            title: "Sinfoniekonzert".to_string(),
            subtitle: "NDR Elbphilharmonie Orchester".to_string(),
            description: "<p>Johannes <b>Brahms</b>: Sinfonie Nr. 1</p>".to_string(),
            room: "<strong>Großer Saal</strong> Elbphilharmonie".to_string(),
            website_url: "https://www.elbphilharmonie.de/de/programm/1234".to_string(),
            date_start: "2024-05-03T20:00:00+02:00".to_string(),
            date_end: Some("2024-05-03T22:30:00+02:00".to_string()),
        }
    }

    #[test]
    fn test_clean_location() {
        assert_eq!(clean_location("<strong>Saal</strong> 1"), "Saal: 1");
        assert_eq!(clean_location("Kleiner Saal"), "Kleiner Saal");
        let once = clean_location("<strong>Saal</strong> 1");
        assert_eq!(clean_location(&once), once);
    }

    #[test]
    fn test_compose_description_literal() {
        assert_eq!(compose_description("S", "D"), "S\n\nD");
    }

    #[test]
    fn test_clean_description_strips_markup() {
        let cleaned = clean_description("  <p>Johannes <b>Brahms</b></p>\n ");
        assert_eq!(cleaned, "Johannes Brahms");
    }

    #[test]
    fn test_normalize_copies_and_cleans() {
        let event = normalize("1234", raw_event(), &Berlin).unwrap();
        assert_eq!(event.id, "1234");
        assert_eq!(event.title, "Sinfoniekonzert");
        assert_eq!(event.location, "Großer Saal: Elbphilharmonie");
        assert_eq!(event.start, Utc.with_ymd_and_hms(2024, 5, 3, 18, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2024, 5, 3, 20, 30, 0).unwrap());
        assert!(event
            .description
            .starts_with("NDR Elbphilharmonie Orchester\n\nJohannes Brahms"));
        assert!(event.sub_events.is_empty());
    }

    #[test]
    fn test_missing_end_defaults_to_two_hours() {
        let raw = RawEventPayload {
            date_end: None,
            ..raw_event()
        };
        let event = normalize("1234", raw, &Berlin).unwrap();
        assert_eq!(event.end - event.start, Duration::hours(2));
    }

    #[test]
    fn test_end_before_start_is_replaced() {
        let raw = RawEventPayload {
            date_end: Some("2024-05-03T19:00:00+02:00".to_string()),
            ..raw_event()
        };
        let event = normalize("1234", raw, &Berlin).unwrap();
        assert_eq!(event.end - event.start, Duration::hours(2));
    }

    #[test]
    fn test_malformed_start_fails_the_event() {
        let raw = RawEventPayload {
            date_start: "tomorrow".to_string(),
            ..raw_event()
        };
        assert!(normalize("1234", raw, &Berlin).is_err());
    }

    #[test]
    fn test_absorb_feed_overrides_name_and_description() {
        let mut event = normalize("1234", raw_event(), &Berlin).unwrap();
        let feed = FeedDocument {
            entries: vec![
                FeedEntry {
                    uid: Some("evis-1234".to_string()),
                    summary: Some("Sinfoniekonzert 1".to_string()),
                    description: Some("Einführung 19 Uhr".to_string()),
                    location: Some("Großer Saal".to_string()),
                    start: Some(FeedDate {
                        value: "20240503T200000".to_string(),
                        tzid: Some("Europe/Berlin".to_string()),
                    }),
                    end: None,
                    ..Default::default()
                },
                FeedEntry {
                    summary: Some("no start".to_string()),
                    ..Default::default()
                },
            ],
        };
        event.absorb_feed(feed, &Berlin);

        assert_eq!(event.sub_events.len(), 1);
        let sub = &event.sub_events[0];
        assert_eq!(sub.name, "NDR Elbphilharmonie Orchester");
        assert_eq!(sub.description, "Sinfoniekonzert\n\nEinführung 19 Uhr");
        assert_eq!(sub.location, "Großer Saal");
        assert_eq!(sub.start, Utc.with_ymd_and_hms(2024, 5, 3, 18, 0, 0).unwrap());
        assert_eq!(sub.end - sub.start, Duration::hours(2));
        assert_eq!(sub.url.as_deref(), Some("https://www.elbphilharmonie.de/de/programm/1234"));
    }

    #[test]
    fn test_malformed_end_defaults_to_two_hours() {
        let raw = RawEventPayload {
            date_end: Some("später".to_string()),
            ..raw_event()
        };
        let event = normalize("1234", raw, &Berlin).unwrap();
        assert_eq!(event.end - event.start, Duration::hours(2));
    }

    #[test]
    fn test_all_day_feed_entry_keeps_its_dates() {
        let mut event = normalize("1234", raw_event(), &Berlin).unwrap();
        let feed = FeedDocument {
            entries: vec![
                FeedEntry {
                    uid: Some("evis-1".to_string()),
                    start: Some(FeedDate {
                        value: "20240503".to_string(),
                        tzid: None,
                    }),
                    ..Default::default()
                },
                FeedEntry {
                    uid: Some("evis-2".to_string()),
                    start: Some(FeedDate {
                        value: "20240510".to_string(),
                        tzid: None,
                    }),
                    end: Some(FeedDate {
                        value: "20240512".to_string(),
                        tzid: None,
                    }),
                    ..Default::default()
                },
            ],
        };
        event.absorb_feed(feed, &Berlin);

        let day = |d| chrono::NaiveDate::from_ymd_opt(2024, 5, d).unwrap();
        assert_eq!(
            event.sub_events[0].dates,
            Some(DateSpan {
                start: day(3),
                end: day(4),
            })
        );
        assert_eq!(event.sub_events[0].start, Utc.with_ymd_and_hms(2024, 5, 2, 22, 0, 0).unwrap());
        assert_eq!(
            event.sub_events[1].dates,
            Some(DateSpan {
                start: day(10),
                end: day(12),
            })
        );
    }

    #[test]
    fn test_malformed_feed_end_defaults_to_two_hours() {
        let mut event = normalize("1234", raw_event(), &Berlin).unwrap();
        let feed = FeedDocument {
            entries: vec![FeedEntry {
                start: Some(FeedDate {
                    value: "20240503T200000".to_string(),
                    tzid: Some("Europe/Berlin".to_string()),
                }),
                end: Some(FeedDate {
                    value: "bald".to_string(),
                    tzid: None,
                }),
                ..Default::default()
            }],
        };
        event.absorb_feed(feed, &Berlin);
        let sub = &event.sub_events[0];
        assert_eq!(sub.dates, None);
        assert_eq!(sub.end - sub.start, Duration::hours(2));
    }
}
