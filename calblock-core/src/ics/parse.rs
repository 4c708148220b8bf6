//! ICS feed parsing using the icalendar crate's parser.

use chrono::{DateTime, Utc};
use icalendar::{
    DatePerhapsTime,
    parser::{read_calendar, unfold},
};

use crate::error::{CalBlockError, CalBlockResult};
use crate::event::Event;
use crate::recurrence::expand_occurrences;

/// One parsed feed: the schedulable events plus everything that had to be
/// dropped or recovered along the way, so the caller can log it.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub events: Vec<Event>,
    /// Events dropped entirely, with the reason ("uid: reason").
    pub skipped: Vec<String>,
    /// Directive parser recovery warnings, keyed by event uid.
    pub warnings: Vec<(String, String)>,
}

/// Parse raw ICS text into events overlapping `[range_start, range_end]`.
///
/// Recurring masters are expanded into concrete instances within the range.
/// Individual events with missing or inverted times are skipped and
/// reported, never fatal; only an unreadable feed is an error.
pub fn parse_feed(
    content: &str,
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
) -> CalBlockResult<ParsedFeed> {
    let unfolded = unfold(content);
    let calendar =
        read_calendar(&unfolded).map_err(|e| CalBlockError::FeedParse(e.to_string()))?;

    let mut feed = ParsedFeed::default();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        let uid = match vevent.find_prop("UID") {
            Some(p) => p.val.to_string(),
            None => {
                feed.skipped.push("(missing UID): dropped".to_string());
                continue;
            }
        };
        let summary = vevent
            .find_prop("SUMMARY")
            .map(|p| p.val.to_string())
            .unwrap_or_else(|| "(No title)".to_string());
        let description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
        let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());

        let start = vevent
            .find_prop("DTSTART")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .and_then(to_utc);
        let end = vevent
            .find_prop("DTEND")
            .and_then(|p| DatePerhapsTime::try_from(p).ok())
            .and_then(to_utc);

        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                feed.skipped
                    .push(format!("{}: missing or unparsable DTSTART/DTEND", uid));
                continue;
            }
        };

        let occurrences = match &rrule {
            Some(rule) => {
                match expand_occurrences(&uid, start, end - start, rule, range_start, range_end) {
                    Ok(ranges) => ranges,
                    Err(e) => {
                        feed.skipped.push(format!("{}: {}", uid, e));
                        continue;
                    }
                }
            }
            None => vec![(start, end)],
        };

        for (occ_start, occ_end) in occurrences {
            // Keep only events overlapping the sync window.
            if occ_end <= range_start || occ_start >= range_end {
                continue;
            }

            match Event::new(
                uid.clone(),
                summary.clone(),
                description.clone(),
                occ_start,
                occ_end,
            ) {
                Ok((event, warnings)) => {
                    feed.warnings
                        .extend(warnings.into_iter().map(|w| (uid.clone(), w)));
                    feed.events.push(event);
                }
                Err(e) => feed.skipped.push(format!("{}: {}", uid, e)),
            }
        }
    }

    Ok(feed)
}

/// Convert icalendar's DatePerhapsTime to UTC.
///
/// All-day dates become midnight UTC; floating times are read as UTC
/// (documented policy); zoned times are resolved through chrono-tz. An
/// unknown TZID or a nonexistent local time yields None and the event is
/// skipped upstream.
fn to_utc(dpt: DatePerhapsTime) -> Option<DateTime<Utc>> {
    match dpt {
        DatePerhapsTime::Date(d) => Some(d.and_hms_opt(0, 0, 0)?.and_utc()),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => Some(dt),
            icalendar::CalendarDateTime::Floating(naive) => Some(naive.and_utc()),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                let tz: chrono_tz::Tz = tzid.parse().ok()?;
                use chrono::TimeZone;
                tz.from_local_datetime(&date_time)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        },
    }
}
