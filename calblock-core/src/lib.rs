//! Core types for the calblock ecosystem.
//!
//! This crate provides everything the daemon needs that is independent of
//! the OS and the network:
//! - `BlockDirective` and the `##BLOCKING` description parser
//! - `Event` and `Timeline` for resolving "what should be blocked right now"
//! - `BlockState` and `diff` for reconciling desired against actual
//! - ICS feed parsing and RRULE expansion

pub mod directive;
pub mod error;
pub mod event;
pub mod ics;
pub mod recurrence;
pub mod state;
pub mod timeline;

pub use directive::BlockDirective;
pub use error::{CalBlockError, CalBlockResult};
pub use event::Event;
pub use state::{BlockPlan, BlockState, ItemKind, diff};
pub use timeline::Timeline;
