//! Text processing utilities.

use std::sync::LazyLock;

use regex::Regex;

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n|[\r\n]").expect("valid line break pattern"));

/// Replace every line break with a single space.
pub fn flatten_newlines(text: &str) -> String {
    LINE_BREAKS.replace_all(text, " ").into_owned()
}

/// Make chunk text safe for a single CSV cell.
///
/// Line breaks become spaces and double quotes become single quotes.
pub fn sanitize_text(text: &str) -> String {
    flatten_newlines(text).replace('"', "'")
}
