//! Helpers for the `**bold**` markup the model uses in its answers.

use regex::Regex;
use std::sync::LazyLock;

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));

/// Drop the `**` markers, keeping the text between them.
///
/// Unpaired markers are left as they are.
pub fn strip_markdown_bold(text: &str) -> String {
    BOLD.replace_all(text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bold() {
        assert_eq!(strip_markdown_bold("**Exercise A**\n1. went"), "Exercise A\n1. went");
        assert_eq!(
            strip_markdown_bold("**First** and **second** bold"),
            "First and second bold"
        );
        assert_eq!(strip_markdown_bold("plain"), "plain");
        assert_eq!(strip_markdown_bold(""), "");
    }

    #[test]
    fn test_unclosed_marker_left_alone() {
        assert_eq!(strip_markdown_bold("**open"), "**open");
        assert_eq!(strip_markdown_bold("****"), "****");
    }
}
