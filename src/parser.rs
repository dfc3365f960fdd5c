//! Tag parsing for incoming messages.
//!
//! A message may open with one or more category tags:
//!
//! ```text
//! [Quick Question]: Is it better to use X or Y?
//! [Learning Question] + [Design Question] explain X and help me structure Y
//! ```
//!
//! Tags are only read from the leading run. A tag literal that shows up later
//! in the text is part of the content.

use tracing::debug;

use crate::category::{Category, CategorySet, Classification};

/// Characters skipped before the first tag (quote and list markers).
const LEAD_MARKERS: &[char] = &['>', '-', '*'];

/// Characters consumed between and after tags.
const JOINERS: &[char] = &['+', ',', ':'];

/// A message split into its tag classification and free-form content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub classification: Classification,
    /// The message with the tag prefix removed, trimmed.
    pub content: String,
}

/// Parse the leading category tags of a message.
///
/// Never fails: a message without a recognized tag is `Unclassified` and its
/// content is the whole message.
pub fn parse_message(input: &str) -> ParsedMessage {
    let mut rest = input.trim_start_matches(|c: char| c.is_whitespace() || LEAD_MARKERS.contains(&c));
    let mut set = CategorySet::new();
    let mut repeated = 0u32;

    while let Some((category, after)) = match_tag(rest) {
        if !set.insert(category) {
            repeated += 1;
        }
        rest = skip_joiners(after);
    }

    if set.is_empty() {
        debug!("message_unclassified");
        return ParsedMessage {
            classification: Classification::Unclassified,
            content: input.trim().to_string(),
        };
    }

    if repeated > 0 {
        debug!(repeated, "repeated_tags_collapsed");
    }

    ParsedMessage {
        classification: Classification::from_set(set),
        content: rest.trim().to_string(),
    }
}

/// Match one tag literal at the very start of `s`.
fn match_tag(s: &str) -> Option<(Category, &str)> {
    Category::ALL
        .into_iter()
        .find_map(|category| s.strip_prefix(category.tag()).map(|after| (category, after)))
}

fn skip_joiners(s: &str) -> &str {
    s.trim_start_matches(|c: char| c.is_whitespace() || JOINERS.contains(&c))
}
