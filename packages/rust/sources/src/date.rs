//! Date parsing for the timestamp formats feeds actually use.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse RFC 3339, RFC 2822, or a zone-less ISO timestamp (read as UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Some(stripped) = s.strip_suffix(" UTC") {
        if let Ok(d) = DateTime::parse_from_rfc2822(&format!("{stripped} +0000")) {
            return Some(d.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Human-readable timestamp used as a title for untitled posts,
/// e.g. `March 5, 2024 at 4:07:09 PM UTC`.
pub fn readable_date(date: &DateTime<Utc>) -> String {
    date.format("%B %-d, %Y at %-I:%M:%S %p UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_common_feed_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 16, 7, 9).unwrap();
        assert_eq!(parse_date("2024-03-05T16:07:09Z"), Some(expected));
        assert_eq!(parse_date("2024-03-05T17:07:09+01:00"), Some(expected));
        assert_eq!(parse_date("Tue, 05 Mar 2024 16:07:09 GMT"), Some(expected));
        assert_eq!(parse_date("Tue, 05 Mar 2024 16:07:09 +0000"), Some(expected));
        assert_eq!(parse_date("Tue, 05 Mar 2024 16:07:09 UTC"), Some(expected));
        assert_eq!(parse_date("2024-03-05T16:07:09"), Some(expected));
        assert_eq!(parse_date("2024-03-05 16:07:09"), Some(expected));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn readable() {
        let d = Utc.with_ymd_and_hms(2024, 3, 5, 16, 7, 9).unwrap();
        assert_eq!(readable_date(&d), "March 5, 2024 at 4:07:09 PM UTC");
    }
}
