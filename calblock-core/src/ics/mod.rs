//! ICS feed handling.

mod parse;

pub use parse::{ParsedFeed, parse_feed};
