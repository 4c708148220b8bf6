//! Normalized calendar events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directive::{self, BlockDirective};
use crate::error::{CalBlockError, CalBlockResult};

/// One calendar entry, normalized to UTC, with its block directive already
/// derived from the description. Created once per sync and never mutated;
/// the whole set is replaced wholesale on the next sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub directive: BlockDirective,
}

impl Event {
    /// Build an event, deriving the directive from the description.
    ///
    /// Returns the directive parser's warnings alongside the event so the
    /// caller can log them with the event identifier. `start >= end` is an
    /// `EventParse` error; such events are unschedulable.
    pub fn new(
        uid: String,
        summary: String,
        description: Option<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CalBlockResult<(Self, Vec<String>)> {
        if start >= end {
            return Err(CalBlockError::EventParse {
                uid,
                reason: format!("start {} is not before end {}", start, end),
            });
        }

        let parsed = description
            .as_deref()
            .map(directive::parse)
            .unwrap_or_default();

        let event = Event {
            uid,
            summary,
            description,
            start,
            end,
            directive: parsed.directive,
        };
        Ok((event, parsed.warnings))
    }

    /// Active iff `start <= now < end`: inclusive start, exclusive end, so
    /// back-to-back events neither double-trigger nor gap.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}
