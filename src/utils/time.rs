use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Formats accepted for timestamps that carry no offset
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

fn malformed(value: &str, what: &str) -> GatewayError {
    GatewayError::MalformedPayload(format!("invalid {}: {:?}", what, value))
}

/// Resolve a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant, times inside a
/// DST gap are moved forward by an hour.
pub fn localize(naive: &NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match tz.from_local_datetime(&(*naive + Duration::hours(1))) {
            LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            LocalResult::None => None,
        },
    }
}

/// Parse an ISO-8601 timestamp as sent by the event detail service.
///
/// Timestamps without an offset are interpreted in `tz`; a bare date means
/// midnight.
pub fn parse_iso8601(value: &str, tz: &Tz) -> GatewayResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return localize(&naive, tz).ok_or_else(|| malformed(value, "local time"));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return start_of_day(date, tz);
    }
    Err(malformed(value, "timestamp"))
}

/// First instant of `date` in `tz`
pub fn start_of_day(date: NaiveDate, tz: &Tz) -> GatewayResult<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| malformed(&date.to_string(), "date"))?;
    localize(&naive, tz).ok_or_else(|| malformed(&date.to_string(), "local time"))
}

/// Parse an iCalendar DATE value (`YYYYMMDD`); DATE-TIME values yield `None`
pub fn parse_ical_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != 8 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").ok()
}

/// Parse an iCalendar DATE or DATE-TIME value (RFC 5545 §3.3.4/§3.3.5).
///
/// `tzid` is the TZID parameter of the property, if any. Floating times and
/// unknown zones fall back to `default_tz`.
pub fn parse_ical_datetime(
    value: &str,
    tzid: Option<&str>,
    default_tz: &Tz,
) -> GatewayResult<DateTime<Utc>> {
    let value = value.trim();

    if value.len() == 8 {
        let date = parse_ical_date(value).ok_or_else(|| malformed(value, "date"))?;
        return start_of_day(date, default_tz);
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .map_err(|_| malformed(value, "date-time"))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .map_err(|_| malformed(value, "date-time"))?;
    let tz = tzid
        .and_then(|id| id.trim_matches('"').parse::<Tz>().ok())
        .unwrap_or(*default_tz);
    localize(&naive, &tz).ok_or_else(|| malformed(value, "local time"))
}

/// Format an instant as an iCalendar UTC DATE-TIME
pub fn format_ical_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Format a date as an iCalendar DATE
pub fn format_ical_date(date: &NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Format a duration as an iCalendar DURATION value (RFC 5545 §3.3.6)
pub fn format_ical_duration(duration: std::time::Duration) -> String {
    let total = duration.as_secs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rest / 3600, (rest % 3600) / 60, rest % 60);

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if rest > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if seconds > 0 || rest == 0 {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Berlin;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_parse_iso8601_with_offset() {
        let parsed = parse_iso8601("2024-05-03T20:00:00+02:00", &Berlin).unwrap();
        assert_eq!(parsed, utc(2024, 5, 3, 18, 0));

        let parsed = parse_iso8601("2024-05-03T20:00:00+0200", &Berlin).unwrap();
        assert_eq!(parsed, utc(2024, 5, 3, 18, 0));
    }

    #[test]
    fn test_parse_iso8601_naive_uses_timezone() {
        // Winter time, UTC+1
        let parsed = parse_iso8601("2024-01-10T19:30:00", &Berlin).unwrap();
        assert_eq!(parsed, utc(2024, 1, 10, 18, 30));

        let parsed = parse_iso8601("2024-01-10", &Berlin).unwrap();
        assert_eq!(parsed, utc(2024, 1, 9, 23, 0));
    }

    #[test]
    fn test_parse_iso8601_rejects_garbage() {
        assert!(matches!(
            parse_iso8601("next tuesday", &Berlin),
            Err(GatewayError::MalformedPayload(_))
        ));
        assert!(parse_iso8601("", &Berlin).is_err());
    }

    #[test]
    fn test_parse_ical_datetime_forms() {
        assert_eq!(
            parse_ical_datetime("20240503T180000Z", None, &Berlin).unwrap(),
            utc(2024, 5, 3, 18, 0)
        );
        assert_eq!(
            parse_ical_datetime("20240503T200000", Some("Europe/Berlin"), &chrono_tz::UTC).unwrap(),
            utc(2024, 5, 3, 18, 0)
        );
        assert_eq!(
            parse_ical_datetime("20240503T200000", None, &Berlin).unwrap(),
            utc(2024, 5, 3, 18, 0)
        );
        assert_eq!(
            parse_ical_datetime("20240503", None, &chrono_tz::UTC).unwrap(),
            utc(2024, 5, 3, 0, 0)
        );
        assert!(parse_ical_datetime("2024-05-03", None, &Berlin).is_err());
    }

    #[test]
    fn test_localize_dst_gap_moves_forward() {
        // 2024-03-31 02:30 does not exist in Berlin
        let naive = NaiveDate::from_ymd_opt(2024, 3, 31)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert_eq!(localize(&naive, &Berlin).unwrap(), utc(2024, 3, 31, 1, 30));
    }

    #[test]
    fn test_format_ical_duration() {
        use std::time::Duration as StdDuration;
        assert_eq!(format_ical_duration(StdDuration::from_secs(86_400)), "P1D");
        assert_eq!(format_ical_duration(StdDuration::from_secs(3600)), "PT1H");
        assert_eq!(format_ical_duration(StdDuration::from_secs(90_061)), "P1DT1H1M1S");
        assert_eq!(format_ical_duration(StdDuration::from_secs(0)), "PT0S");
    }

    #[test]
    fn test_ical_date_values() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        assert_eq!(parse_ical_date("20240503"), Some(date));
        assert_eq!(parse_ical_date("20240503T200000"), None);
        assert_eq!(parse_ical_date("2024050x"), None);
        assert_eq!(format_ical_date(&date), "20240503");
    }

    #[test]
    fn test_format_ical_utc() {
        assert_eq!(format_ical_utc(&utc(2024, 5, 3, 18, 0)), "20240503T180000Z");
    }
}
