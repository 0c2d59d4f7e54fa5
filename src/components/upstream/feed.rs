use crate::error::{GatewayError, GatewayResult};
use crate::utils::ics::unescape_text;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;

/// A DTSTART/DTEND value together with the parameters needed to resolve it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDate {
    pub value: String,
    pub tzid: Option<String>,
}

/// One VEVENT of an upstream feed document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub uid: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub start: Option<FeedDate>,
    pub end: Option<FeedDate>,
}

/// A parsed upstream calendar document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub entries: Vec<FeedEntry>,
}

fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties
        .iter()
        .find(|property| property.name.eq_ignore_ascii_case(name))
}

fn find_param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(param, _)| param.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

fn text_value(properties: &[Property], name: &str) -> Option<String> {
    find_property(properties, name)
        .and_then(|property| property.value.as_deref())
        .map(unescape_text)
}

fn date_value(properties: &[Property], name: &str) -> Option<FeedDate> {
    let property = find_property(properties, name)?;
    let value = property.value.as_deref()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(FeedDate {
        value: value.to_string(),
        tzid: find_param(property, "TZID").map(str::to_string),
    })
}

impl From<&IcalEvent> for FeedEntry {
    fn from(event: &IcalEvent) -> Self {
        let properties = &event.properties;
        FeedEntry {
            uid: text_value(properties, "UID"),
            summary: text_value(properties, "SUMMARY"),
            description: text_value(properties, "DESCRIPTION"),
            location: text_value(properties, "LOCATION"),
            url: find_property(properties, "URL").and_then(|p| p.value.clone()),
            start: date_value(properties, "DTSTART"),
            end: date_value(properties, "DTEND"),
        }
    }
}

impl FeedDocument {
    /// Parse an iCalendar document. A document without any VEVENT is an error.
    pub fn parse(text: &str) -> GatewayResult<Self> {
        let mut entries = Vec::new();
        let mut calendars = 0;
        for calendar in ical::IcalParser::new(text.as_bytes()) {
            let calendar = calendar
                .map_err(|e| GatewayError::MalformedPayload(format!("invalid ics file: {}", e)))?;
            calendars += 1;
            entries.extend(calendar.events.iter().map(FeedEntry::from));
        }
        if calendars == 0 {
            return Err(GatewayError::MalformedPayload(
                "invalid ics file (no calendar)".to_string(),
            ));
        }
        if entries.is_empty() {
            return Err(GatewayError::MalformedPayload(
                "invalid ics file (no events)".to_string(),
            ));
        }
        Ok(FeedDocument { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Elbphilharmonie//DE\r\n\
BEGIN:VEVENT\r\n\
UID:evis-1234@elbphilharmonie.de\r\n\
SUMMARY:Sinfoniekonzert\r\n\
DESCRIPTION:Erste Zeile\\nZweite Zeile\\, mit Komma\r\n\
LOCATION:Elbphilharmonie Großer Saal\r\n\
DTSTART;TZID=Europe/Berlin:20240503T200000\r\n\
DTEND;TZID=Europe/Berlin:20240503T220000\r\n\
URL:https://www.elbphilharmonie.de/de/programm/sinfoniekonzert/1234\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_single_event_feed() {
        let document = FeedDocument::parse(FEED).unwrap();
        assert_eq!(document.entries.len(), 1);

        let entry = &document.entries[0];
        assert_eq!(entry.uid.as_deref(), Some("evis-1234@elbphilharmonie.de"));
        assert_eq!(
            entry.description.as_deref(),
            Some("Erste Zeile\nZweite Zeile, mit Komma")
        );
        assert_eq!(entry.location.as_deref(), Some("Elbphilharmonie Großer Saal"));
        assert_eq!(
            entry.start,
            Some(FeedDate {
                value: "20240503T200000".to_string(),
                tzid: Some("Europe/Berlin".to_string()),
            })
        );
        assert!(entry.end.is_some());
    }

    #[test]
    fn test_calendar_without_events_is_rejected() {
        let empty = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nEND:VCALENDAR\r\n";
        assert!(matches!(
            FeedDocument::parse(empty),
            Err(GatewayError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_html_page_is_rejected() {
        assert!(FeedDocument::parse("<html><body>Not found</body></html>").is_err());
    }
}
