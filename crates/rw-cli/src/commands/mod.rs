pub mod relative;
pub mod run;

use chrono::{DateTime, Utc};

/// Parse an RFC 3339 timestamp into UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{raw}': {e}"))
}
