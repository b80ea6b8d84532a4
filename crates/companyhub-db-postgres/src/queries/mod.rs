//! SQL query implementations, one module per table.

pub mod company;
pub mod session;
pub mod user;

use chrono::{DateTime, Utc};
use time::OffsetDateTime;

/// Converts chrono DateTime to time OffsetDateTime.
pub(crate) fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos()))
}

/// Converts time OffsetDateTime to chrono DateTime.
pub(crate) fn time_to_chrono(dt: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_convert_both_ways() {
        let now = OffsetDateTime::now_utc();
        let back = chrono_to_time(time_to_chrono(now));
        assert_eq!(back, now);
    }
}
