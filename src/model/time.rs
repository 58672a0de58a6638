use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

// ---------------------------------------------------------------------------
// Calendar helpers shared by expansion and matching
// ---------------------------------------------------------------------------

/// Minutes elapsed since midnight, the unit used for overlap tests.
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Weekday index with Sunday = 0 through Saturday = 6.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Half-open interval overlap on minutes since midnight.
pub fn windows_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    minutes_since_midnight(a_start) < minutes_since_midnight(b_end)
        && minutes_since_midnight(b_start) < minutes_since_midnight(a_end)
}

/// Serde adapter for `HH:MM` clock times. Accepts `HH:MM:SS` on input.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|err| de::Error::custom(format!("invalid clock time '{raw}': {err}")))
    }
}
