//! The per-sync snapshot of upcoming events.

use chrono::{DateTime, Utc};

use crate::directive::BlockDirective;
use crate::event::Event;

/// Ordered, immutable collection of events covering one sync window.
///
/// A Timeline is built fresh on every sync and replaced as a whole value;
/// it is never edited in place. The scheduler owns it exclusively.
#[derive(Debug, Clone)]
pub struct Timeline {
    events: Vec<Event>,
    pub fetched_at: DateTime<Utc>,
}

impl Timeline {
    pub fn new(mut events: Vec<Event>, fetched_at: DateTime<Utc>) -> Self {
        events.sort_by_key(|e| e.start);
        Timeline { events, fetched_at }
    }

    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Timeline {
            events: Vec::new(),
            fetched_at,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Union of the directives of every event active at `now`.
    ///
    /// Zero active events gives the empty directive; overlapping events are
    /// additive, one event never overrides another.
    pub fn active_directive(&self, now: DateTime<Utc>) -> BlockDirective {
        let mut desired = BlockDirective::default();
        for event in self.events.iter().filter(|e| e.is_active_at(now)) {
            desired.merge(&event.directive);
        }
        desired
    }

    /// Events active at `now`, in start order.
    pub fn active_events(&self, now: DateTime<Utc>) -> Vec<&Event> {
        self.events.iter().filter(|e| e.is_active_at(now)).collect()
    }
}
