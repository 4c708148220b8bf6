//! Block directives and the `##BLOCKING` description parser.
//!
//! A calendar event opts into blocking by carrying a marker-delimited region
//! in its description:
//!
//! ```text
//! ##BLOCKING
//! Block_apps: app1, app2, app3;
//! Block_websites: website1, website2;
//! ##BLOCKING
//! ```
//!
//! Both labeled lines are optional; absence of the whole region means the
//! event blocks nothing. Parsing is pure: same input, same directive, no
//! side effects.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Exact token that opens and closes the blocking region.
pub const BLOCKING_MARKER: &str = "##BLOCKING";

const APPS_LABEL: &str = "block_apps:";
const WEBSITES_LABEL: &str = "block_websites:";

/// The set of apps and websites one event wants blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDirective {
    pub apps: BTreeSet<String>,
    pub websites: BTreeSet<String>,
}

impl BlockDirective {
    /// A directive with both sets empty means "no blocking" and must never
    /// reach the actuator.
    pub fn is_empty(&self) -> bool {
        self.apps.is_empty() && self.websites.is_empty()
    }

    /// Union another directive into this one. Blocking is monotonically
    /// additive across overlapping events.
    pub fn merge(&mut self, other: &BlockDirective) {
        self.apps.extend(other.apps.iter().cloned());
        self.websites.extend(other.websites.iter().cloned());
    }
}

impl fmt::Display for BlockDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let apps: Vec<&str> = self.apps.iter().map(String::as_str).collect();
        let websites: Vec<&str> = self.websites.iter().map(String::as_str).collect();
        write!(
            f,
            "apps: [{}], websites: [{}]",
            apps.join(", "),
            websites.join(", ")
        )
    }
}

/// Result of parsing one event description.
///
/// Malformed markup never fails the parse; the deterministic recovery that
/// was applied is reported through `warnings` so the caller can log it with
/// the offending event's identifier.
#[derive(Debug, Clone, Default)]
pub struct ParsedDirective {
    pub directive: BlockDirective,
    pub warnings: Vec<String>,
}

/// Extract a block directive from a raw event description.
///
/// Recovery rules (all deterministic, all surfaced as warnings):
/// - opening marker without a closing marker: the region extends to the end
///   of the text;
/// - labeled list missing its terminating `;`: everything up to the closing
///   marker is taken as the list.
pub fn parse(description: &str) -> ParsedDirective {
    let text = clean_description(description);
    // ASCII-lowercased shadow copy: same byte offsets as `text`, so label
    // positions found here can slice the original, case-preserved text.
    let lower = text.to_ascii_lowercase();
    let marker = BLOCKING_MARKER.to_ascii_lowercase();

    let mut parsed = ParsedDirective::default();

    let Some(open) = lower.find(&marker) else {
        return parsed;
    };
    let region_start = open + marker.len();

    let region_end = match lower[region_start..].find(&marker) {
        Some(offset) => region_start + offset,
        None => {
            parsed
                .warnings
                .push("unterminated ##BLOCKING region; reading to end of description".into());
            text.len()
        }
    };

    let region = &text[region_start..region_end];
    let region_lower = &lower[region_start..region_end];

    parsed.directive.apps = extract_list(region, region_lower, APPS_LABEL, &mut parsed.warnings);
    parsed.directive.websites =
        extract_list(region, region_lower, WEBSITES_LABEL, &mut parsed.warnings);

    parsed
}

/// Pull one labeled, semicolon-terminated, comma-separated list out of the
/// region. A missing label yields an empty set; a missing `;` takes the rest
/// of the region.
fn extract_list(
    region: &str,
    region_lower: &str,
    label: &str,
    warnings: &mut Vec<String>,
) -> BTreeSet<String> {
    let Some(label_pos) = region_lower.find(label) else {
        return BTreeSet::new();
    };
    let value_start = label_pos + label.len();

    let raw = match region[value_start..].find(';') {
        Some(offset) => &region[value_start..value_start + offset],
        None => {
            warnings.push(format!(
                "list '{}' missing terminating ';'; taking remaining region text",
                label.trim_end_matches(':')
            ));
            &region[value_start..]
        }
    };

    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip the HTML-ish noise calendar providers put into descriptions and
/// undo ICS text escaping, so the region scan sees plain text.
fn clean_description(raw: &str) -> String {
    let unescaped = unescape_ics(&raw.replace('\r', ""));

    // <br> variants become newlines, every other tag is dropped.
    let mut out = String::with_capacity(unescaped.len());
    let mut rest = unescaped.as_str();
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        match rest[open..].find('>') {
            Some(close) => {
                let tag = rest[open + 1..open + close].trim().to_lowercase();
                if tag == "br" || tag == "br/" || tag == "br /" {
                    out.push('\n');
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                // Lone '<' with no closing '>': keep it literally.
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Undo RFC 5545 text escaping: `\n`, `\N`, `\,`, `\;`, `\\`.
fn unescape_ics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(',') => out.push(','),
            Some(';') => out.push(';'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
