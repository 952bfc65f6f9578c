//! Timestamp utilities
//!
//! Relational rows store local wall-clock time without an offset. The API
//! renders those values as `YYYY-MM-DD HH:MM:SS`.

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::{Error, Result};

/// Display format for row timestamps
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format accepted by range queries
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current local time, without offset
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Format a row timestamp for API output
pub fn format_display(value: &NaiveDateTime) -> String {
    value.format(DISPLAY_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date into the start of that day
pub fn parse_day_start(value: &str) -> Result<NaiveDateTime> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::InvalidDate(value.to_string()))
}

/// Serde helpers rendering `NaiveDateTime` with [`DISPLAY_FORMAT`]
pub mod display_format {
    use chrono::NaiveDateTime;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_display(value))
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::Serializer;

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => s.serialize_str(&super::super::format_display(v)),
                None => s.serialize_none(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_now_returns_recent_timestamp() {
        let timestamp = now();
        assert!(timestamp.and_utc().timestamp() > 946_684_800);
        assert!(timestamp.and_utc().timestamp() < 4_102_444_800);
    }

    #[test]
    fn test_format_display() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 1)
            .unwrap();
        assert_eq!(format_display(&dt), "2024-03-09 07:05:01");
    }

    #[test]
    fn test_parse_day_start() {
        let dt = parse_day_start("2024-01-31").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
        assert_eq!(dt.hour(), 0);
        assert_eq!(dt.minute(), 0);
    }

    #[test]
    fn test_parse_day_start_rejects_garbage() {
        let err = parse_day_start("31/01/2024").unwrap_err();
        assert!(matches!(err, Error::InvalidDate(ref v) if v == "31/01/2024"));
        assert!(parse_day_start("").is_err());
        assert!(parse_day_start("2024-02-30").is_err());
    }
}
