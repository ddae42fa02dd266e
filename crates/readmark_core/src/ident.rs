//! Identifier to bit-index mapping.
//!
//! Extraction is a pure pattern match. Contextual exclusion (discussion
//! pages that merely embed a catalog link) is a separate policy so callers
//! can compose the two as needed instead of getting both baked into one
//! function.

use std::sync::OnceLock;

use regex::Regex;

fn ident_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:^|/)scp-(\d+)(?:$|/)").expect("valid pattern"))
}

/// Parses the catalog index out of `identifier`: the literal `scp-` at the
/// start of the string or after a `/`, then a digit run ending at `/` or
/// end-of-string. `None` when the shape does not match or the number does
/// not fit; malformed identifiers are never guessed at.
pub fn extract_index(identifier: &str) -> Option<usize> {
    let caps = ident_pattern().captures(identifier)?;
    caps[1].parse().ok()
}

/// True for discussion-thread links, which embed a catalog path segment
/// without being catalog pages themselves.
pub fn is_forum_context(identifier: &str) -> bool {
    identifier.contains("/forum/")
}
