//! RRULE expansion for recurring events.
//!
//! A recurring VEVENT is a master plus a rule; the scheduler only deals in
//! concrete time ranges, so masters are expanded into individual occurrences
//! within the sync window before the Timeline is built.

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;

use crate::error::{CalBlockError, CalBlockResult};

/// Upper bound on generated occurrences per master. A weekly event over a
/// few-day window stays far below this.
const MAX_OCCURRENCES: u16 = 365;

/// Expand a master's RRULE into `(start, end)` occurrence ranges within
/// `[range_start, range_end]`. Each occurrence keeps the master's duration.
pub fn expand_occurrences(
    uid: &str,
    start: DateTime<Utc>,
    duration: Duration,
    rrule: &str,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> CalBlockResult<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let rrule_str = format!(
        "DTSTART:{}\nRRULE:{}",
        start.format("%Y%m%dT%H%M%SZ"),
        rrule
    );

    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| CalBlockError::EventParse {
        uid: uid.to_string(),
        reason: format!("invalid RRULE '{}': {}", rrule, e),
    })?;

    // after/before are exclusive; widen by a second to make the window
    // inclusive on both ends.
    let tz = rrule::Tz::UTC;
    let after = (range_start - Duration::seconds(1)).with_timezone(&tz);
    let before = (range_end + Duration::seconds(1)).with_timezone(&tz);

    let result = rrule_set.after(after).before(before).all(MAX_OCCURRENCES);

    Ok(result
        .dates
        .iter()
        .map(|occ| {
            let occ_start = occ.with_timezone(&Utc);
            (occ_start, occ_start + duration)
        })
        .collect())
}
